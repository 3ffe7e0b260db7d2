use geostore_core::store::DataStore;
use geostore_core::{
    ErrorKind, Field, FieldType, FieldValue, GeoPoint, Geometry, GeometryType, Progress,
    ProgressStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn store_with_roads() -> DataStore {
    let store = DataStore::create_in_memory().unwrap();
    store
        .create_feature_class(
            "roads",
            &[
                Field::new("title", FieldType::Text),
                Field::new("lanes", FieldType::Integer),
            ],
            GeometryType::LineString,
            3857,
            &Progress::default(),
        )
        .unwrap();
    store
}

fn sample_line() -> Geometry {
    Geometry::LineString(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(100.0, 50.0)])
}

#[test]
fn insert_and_get_round_trip_with_geometry() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();

    let mut feature = roads.create_feature();
    feature.set_value(0, FieldValue::Text("main street".into()));
    feature.set_value(1, FieldValue::Integer(2));
    feature.geometry = Some(sample_line());

    let fid = roads.insert_feature(&feature).unwrap();
    assert!(fid > 0);

    let loaded = roads.feature(fid).unwrap().unwrap();
    assert_eq!(loaded.value(0), Some(&FieldValue::Text("main street".into())));
    assert_eq!(loaded.value(1), Some(&FieldValue::Integer(2)));
    assert_eq!(loaded.geometry, Some(sample_line()));
}

#[test]
fn update_and_delete_features() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();

    let mut feature = roads.create_feature();
    feature.set_value(0, FieldValue::Text("draft".into()));
    feature.geometry = Some(sample_line());
    let fid = roads.insert_feature(&feature).unwrap();

    let mut loaded = roads.feature(fid).unwrap().unwrap();
    loaded.set_value(0, FieldValue::Text("renamed".into()));
    roads.update_feature(&loaded).unwrap();
    assert_eq!(
        roads.feature(fid).unwrap().unwrap().value(0),
        Some(&FieldValue::Text("renamed".into()))
    );

    roads.delete_feature(fid).unwrap();
    assert!(roads.feature(fid).unwrap().is_none());
    let err = roads.delete_feature(fid).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn update_unpersisted_feature_is_invalid() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();
    let feature = roads.create_feature();
    let err = roads.update_feature(&feature).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn reserved_field_names_are_stored_with_suffix() {
    let store = DataStore::create_in_memory().unwrap();
    let stored = store
        .create_table(
            "imported",
            &[
                Field::new("fid", FieldType::Integer),
                Field::new("geom", FieldType::Text),
                Field::new("rid", FieldType::Integer),
            ],
            &Progress::default(),
        )
        .unwrap();
    assert_eq!(stored[0].name, "fid_");
    assert_eq!(stored[1].name, "geom_");
    assert_eq!(stored[2].name, "rid_");
    // Original names survive for the user.
    assert_eq!(stored[0].original_name, "fid");

    let table = store.table("imported").unwrap();
    assert_eq!(table.fields().len(), 3);
    assert_eq!(table.fields()[0].original_name, "fid");
}

#[test]
fn duplicate_table_name_is_rejected_case_insensitively() {
    let store = store_with_roads();
    let err = store
        .create_table("ROADS", &[Field::new("x", FieldType::Integer)], &Progress::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn table_listing_skips_system_tables() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();
    // Force the attachments table into existence.
    let _ = roads.attachments(1).unwrap();

    let names = store.table_names().unwrap();
    assert_eq!(names, vec!["roads".to_string()]);
}

#[test]
fn copy_rows_applies_field_mapping() {
    let store = DataStore::create_in_memory().unwrap();
    store
        .create_table(
            "src",
            &[
                Field::new("a", FieldType::Text),
                Field::new("b", FieldType::Integer),
            ],
            &Progress::default(),
        )
        .unwrap();
    store
        .create_table(
            "dst",
            &[
                Field::new("b_copy", FieldType::Integer),
                Field::new("ignored", FieldType::Text),
            ],
            &Progress::default(),
        )
        .unwrap();

    let src = store.table("src").unwrap();
    for index in 0..4 {
        let mut feature = src.create_feature();
        feature.set_value(0, FieldValue::Text(format!("row {index}")));
        feature.set_value(1, FieldValue::Integer(index));
        src.insert_feature(&feature).unwrap();
    }

    let dst = store.table("dst").unwrap();
    // a -> unmapped, b -> dst field 0.
    let copied = dst.copy_rows(&src, &[-1, 0], &Progress::default()).unwrap();
    assert_eq!(copied, 4);

    let rows = dst.features().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[2].value(0), Some(&FieldValue::Integer(2)));
    assert_eq!(rows[2].value(1), Some(&FieldValue::Null));
}

#[test]
fn copy_rows_cancellation_keeps_committed_rows() {
    let store = DataStore::create_in_memory().unwrap();
    store
        .create_table("src", &[Field::new("n", FieldType::Integer)], &Progress::default())
        .unwrap();
    store
        .create_table("dst", &[Field::new("n", FieldType::Integer)], &Progress::default())
        .unwrap();

    let src = store.table("src").unwrap();
    for index in 0..10 {
        let mut feature = src.create_feature();
        feature.set_value(0, FieldValue::Integer(index));
        src.insert_feature(&feature).unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let progress = Progress::with(move |status, _, _| {
        if status != ProgressStatus::InProcess {
            return true;
        }
        // Allow the start report plus three row checks.
        counted.fetch_add(1, Ordering::SeqCst) < 4
    });

    let dst = store.table("dst").unwrap();
    let err = dst.copy_rows(&src, &[0], &progress).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Canceled);

    // Partially copied rows are committed, not rolled back.
    let committed = dst.feature_count().unwrap();
    assert!(committed > 0 && committed < 10, "committed {committed}");
}

#[test]
fn copy_rows_rejects_mismatched_field_map() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();
    let err = roads.copy_rows(&roads, &[0], &Progress::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn remote_ids_round_trip() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();

    let mut feature = roads.create_feature();
    feature.geometry = Some(sample_line());
    let fid = roads.insert_feature(&feature).unwrap();

    // Unset remote id is the -1 sentinel.
    assert_eq!(roads.remote_id(fid).unwrap(), -1);
    assert!(roads.feature_by_remote_id(4242).unwrap().is_none());

    roads.set_remote_id(fid, 4242).unwrap();
    let found = roads.feature_by_remote_id(4242).unwrap().unwrap();
    assert_eq!(found.id, fid);
}

#[test]
fn remote_id_is_hidden_from_user_fields() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();
    assert!(roads
        .fields()
        .iter()
        .all(|field| field.name != "rid" && field.name != "fid" && field.name != "geom"));
}

#[test]
fn feature_class_requires_geometry_column() {
    let store = DataStore::create_in_memory().unwrap();
    store
        .create_table("plain", &[Field::new("x", FieldType::Integer)], &Progress::default())
        .unwrap();
    let err = store.feature_class("plain").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn feature_class_extent_merges_geometries() {
    let store = store_with_roads();
    let roads = store.feature_class("roads").unwrap();
    assert_eq!(roads.extent().unwrap(), None);

    for (x, y) in [(0.0, 0.0), (200.0, -50.0)] {
        let mut feature = roads.create_feature();
        feature.geometry = Some(Geometry::LineString(vec![
            GeoPoint::new(x, y),
            GeoPoint::new(x + 10.0, y + 10.0),
        ]));
        roads.insert_feature(&feature).unwrap();
    }

    let extent = roads.extent().unwrap().unwrap();
    assert_eq!(extent.min_x, 0.0);
    assert_eq!(extent.min_y, -50.0);
    assert_eq!(extent.max_x, 210.0);
    assert_eq!(extent.max_y, 10.0);
}

#[test]
fn overview_samples_decimate_by_zoom() {
    let store = store_with_roads();
    let mut roads = store.feature_class("roads").unwrap();
    for _ in 0..8 {
        let mut feature = roads.create_feature();
        feature.geometry = Some(sample_line());
        roads.insert_feature(&feature).unwrap();
    }

    roads.set_zoom_levels(&[0, 1, 3]).unwrap();
    roads.build_overviews(&Progress::default()).unwrap();

    let fine = roads.overview_samples(3).unwrap();
    let coarse = roads.overview_samples(0).unwrap();
    assert_eq!(fine.len(), 8);
    assert_eq!(coarse.len(), 1);
    assert!(roads.overview_samples(7).is_none());
}
