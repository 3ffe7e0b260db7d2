use geostore_core::catalog::object::{full_name, ObjectKind, VectorFormat};
use geostore_core::store::DataStore;
use geostore_core::{Catalog, Field, FieldType, GeometryType, Progress};
use std::fs;
use std::path::Path;
use std::rc::Rc;

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"").unwrap();
}

/// Builds a connection directory with a grouped shapefile, a lone main
/// file, a subdirectory and a store container.
fn seed_connection(dir: &Path) {
    let data = dir.join("data");
    fs::create_dir(&data).unwrap();
    touch(&data, "name.shp");
    touch(&data, "name.shx");
    touch(&data, "name.dbf");
    touch(&data, "other.shp");
    fs::create_dir(data.join("sub")).unwrap();

    let store = DataStore::create(data.join("base.gst")).unwrap();
    store
        .create_feature_class(
            "roads",
            &[Field::new("title", FieldType::Text)],
            GeometryType::LineString,
            3857,
            &Progress::default(),
        )
        .unwrap();
    store
        .create_table("notes", &[Field::new("body", FieldType::Text)], &Progress::default())
        .unwrap();
}

#[test]
fn factory_grouping_and_path_resolution() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    let data = catalog.object_by_path("gst://conn/data").unwrap();
    assert_eq!(data.borrow().kind(), ObjectKind::Folder);

    let children = catalog.children(&data);
    let kinds: Vec<ObjectKind> = children.iter().map(|c| c.borrow().kind()).collect();
    // Grouped shapefile, store container, the store's data folder and the
    // subdirectory; the lone `other.shp` has no companions and yields no
    // object.
    assert!(kinds.contains(&ObjectKind::SimpleDataset(VectorFormat::EsriShapefile)));
    assert!(kinds.contains(&ObjectKind::Store));
    assert!(kinds.contains(&ObjectKind::Folder));
    assert_eq!(children.len(), 4);

    let shapefile = catalog.object_by_path("gst://conn/data/name.shp").unwrap();
    assert_eq!(
        shapefile.borrow().sibling_files(),
        ["name.shx".to_string(), "name.dbf".to_string()]
    );
}

#[test]
fn resolution_round_trips_through_full_name() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    for path in [
        "gst://conn",
        "gst://conn/data",
        "gst://conn/data/name.shp",
        "gst://conn/data/base.gst",
        "gst://conn/data/base.gst/roads",
    ] {
        let object = catalog.object_by_path(path).unwrap();
        assert_eq!(full_name(&object), path);
        let again = catalog.object_by_path(&full_name(&object)).unwrap();
        assert!(Rc::ptr_eq(&object, &again), "identity lost for {path}");
    }
}

#[test]
fn unresolvable_paths_return_none() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    assert!(catalog.object_by_path("gst://missing").is_none());
    assert!(catalog.object_by_path("gst://conn/data/ghost.shp").is_none());
    assert!(catalog.object_by_path("no-prefix/conn").is_none());
}

#[test]
fn store_children_classify_tables_and_feature_classes() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    let roads = catalog
        .object_by_path("gst://conn/data/base.gst/roads")
        .unwrap();
    assert_eq!(roads.borrow().kind(), ObjectKind::FeatureClass);

    let notes = catalog
        .object_by_path("gst://conn/data/base.gst/notes")
        .unwrap();
    assert_eq!(notes.borrow().kind(), ObjectKind::Table);
}

#[test]
fn children_enumeration_is_a_one_way_latch_until_clear() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    let data = catalog.object_by_path("gst://conn/data").unwrap();
    assert!(catalog.has_children(&data));
    assert!(data.borrow().children_loaded());
    let first_pass = catalog.children(&data);

    // New files are invisible while the cache latch holds.
    touch(&dir.path().join("data"), "late.gst");
    assert_eq!(catalog.children(&data).len(), first_pass.len());

    data.borrow_mut().clear();
    assert!(!data.borrow().children_loaded());
    assert_eq!(catalog.children(&data).len(), first_pass.len() + 1);
}

#[test]
fn free_resources_clears_top_level_containers() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    let connection = catalog.add_local_connection("conn", dir.path()).unwrap();
    catalog.has_children(&connection);
    assert!(connection.borrow().children_loaded());

    catalog.free_resources();
    assert!(!connection.borrow().children_loaded());
}

#[test]
fn simple_dataset_exposes_internal_object() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    let shapefile = catalog.object_by_path("gst://conn/data/name.shp").unwrap();
    let inner = catalog.internal_object(&shapefile).unwrap();
    assert_eq!(inner.borrow().kind(), ObjectKind::FeatureClass);
    assert_eq!(inner.borrow().name(), "name.shp");

    // Only composites have an internal object.
    let folder = catalog.object_by_path("gst://conn/data/sub").unwrap();
    assert!(catalog.internal_object(&folder).is_none());
}

#[test]
fn local_path_lookup_maps_into_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    catalog.add_local_connection("conn", dir.path()).unwrap();

    let object = catalog
        .object_by_local_path(dir.path().join("data").join("name.shp"))
        .unwrap();
    assert_eq!(full_name(&object), "gst://conn/data/name.shp");

    assert!(catalog.object_by_local_path("/somewhere/else").is_none());
}

#[test]
fn unreadable_directory_degrades_to_no_children() {
    let catalog = Catalog::new();
    let dir = tempfile::tempdir().unwrap();
    let connection = catalog.add_local_connection("conn", dir.path()).unwrap();

    // Remove the backing directory after mounting.
    drop(dir);
    assert!(!catalog.has_children(&connection));
    assert!(connection.borrow().children_loaded());
}

#[test]
fn disabled_factory_stops_claiming_names() {
    let dir = tempfile::tempdir().unwrap();
    seed_connection(dir.path());

    let catalog = Catalog::new();
    assert!(catalog.set_factory_enabled("simple-dataset", false));
    assert!(!catalog.set_factory_enabled("unknown", false));
    catalog.add_local_connection("conn", dir.path()).unwrap();

    assert!(catalog.object_by_path("gst://conn/data/name.shp").is_none());
    // Other factories still run.
    assert!(catalog.object_by_path("gst://conn/data/base.gst").is_some());
}
