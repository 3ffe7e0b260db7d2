use geostore_core::{
    CoreResult, Envelope, Layer, LayerKind, Map, MapStore, Progress, ProgressStatus, Rgba,
    TileItem, TileRenderer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn bounds() -> Envelope {
    Envelope::new(-180.0, -90.0, 180.0, 90.0)
}

#[test]
fn save_and_open_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let mut map = Map::new("survey", "field survey", 3857, bounds());
    map.set_background(Rgba {
        r: 1,
        g: 2,
        b: 3,
        a: 255,
    });
    map.set_x_looped(true);
    map.create_layer(LayerKind::Vector, "roads", "gst://conn/base.gst/roads");
    map.create_layer(LayerKind::Raster, "base", "gst://conn/tiles");
    map.layer_mut(1).unwrap().visible = false;

    let saved_path = map.save(dir.path().join("survey")).unwrap();
    // The document extension is forced.
    assert_eq!(saved_path.extension().unwrap(), "gmap");

    let loaded = Map::open(&saved_path).unwrap();
    assert_eq!(loaded.uuid(), map.uuid());
    assert_eq!(loaded.name(), "survey");
    assert_eq!(loaded.description(), "field survey");
    assert_eq!(loaded.epsg(), 3857);
    assert_eq!(loaded.bounds(), bounds());
    assert_eq!(loaded.background().r, 1);
    assert!(loaded.is_x_looped());
    assert_eq!(loaded.layer_count(), 2);
    assert_eq!(loaded.layer(0).unwrap().name, "roads");
    assert_eq!(loaded.layer(0).unwrap().kind, LayerKind::Vector);
    assert!(loaded.layer(0).unwrap().visible);
    assert!(!loaded.layer(1).unwrap().visible);
    assert_eq!(loaded.layer(1).unwrap().source, "gst://conn/tiles");
}

#[test]
fn partial_document_opens_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.gmap");
    std::fs::write(&path, r#"{"name": "minimal"}"#).unwrap();

    let map = Map::open(&path).unwrap();
    assert_eq!(map.name(), "minimal");
    assert_eq!(map.epsg(), 3857);
    assert_eq!(map.layer_count(), 0);
    // Default pale-sky background.
    assert_eq!(map.background(), Rgba::default());
}

#[test]
fn malformed_document_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.gmap");
    std::fs::write(&path, "not json").unwrap();
    assert!(Map::open(&path).is_err());
}

#[test]
fn destroyed_map_refuses_save() {
    let dir = tempfile::tempdir().unwrap();
    let mut map = Map::new("doomed", "", 3857, bounds());
    let path = map.save(dir.path().join("doomed")).unwrap();
    assert!(path.is_file());

    map.destroy().unwrap();
    assert!(!path.exists());
    assert!(map.is_deleted());
    assert!(map.save(dir.path().join("again")).is_err());
    assert!(map.destroy().is_err());
}

#[test]
fn layer_reordering_preserves_the_set() {
    let mut map = Map::new("m", "", 3857, bounds());
    map.create_layer(LayerKind::Vector, "a", "gst://a");
    map.create_layer(LayerKind::Vector, "b", "gst://b");
    map.create_layer(LayerKind::Vector, "c", "gst://c");

    assert!(map.reorder_layer(2, 0));
    let names: Vec<&str> = map.layers().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["c", "a", "b"]);

    assert!(!map.reorder_layer(0, 9));
    assert!(map.delete_layer(1));
    assert_eq!(map.layer_count(), 2);
}

#[test]
fn map_store_round_trips_documents() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MapStore::new();

    let handle = store.create_map("trip", "", 3857, bounds(), 640, 480);
    store
        .map_view_mut(handle)
        .unwrap()
        .map_mut()
        .create_layer(LayerKind::Vector, "roads", "gst://conn/roads");
    let path = store.save_map(handle, dir.path().join("trip")).unwrap();

    let reopened = store.open_map(&path, 640, 480).unwrap();
    assert_ne!(reopened, handle);
    let view = store.map_view(reopened).unwrap();
    assert_eq!(view.map().name(), "trip");
    assert_eq!(view.map().layer_count(), 1);
}

struct CountingRenderer {
    tiles: usize,
    layers_seen: Vec<String>,
}

impl TileRenderer for CountingRenderer {
    fn draw_tile(&mut self, layer: &Layer, _tile: &TileItem, _background: Rgba) -> CoreResult<()> {
        self.tiles += 1;
        if !self.layers_seen.contains(&layer.name) {
            self.layers_seen.push(layer.name.clone());
        }
        Ok(())
    }
}

#[test]
fn draw_visits_visible_layers_only() {
    let mut store = MapStore::new();
    let handle = store.create_map("draw", "", 3857, bounds(), 640, 480);
    let view = store.map_view_mut(handle).unwrap();
    view.map_mut()
        .create_layer(LayerKind::Vector, "visible", "gst://a");
    view.map_mut()
        .create_layer(LayerKind::Vector, "hidden", "gst://b");
    view.map_mut().layer_mut(1).unwrap().visible = false;

    let mut renderer = CountingRenderer {
        tiles: 0,
        layers_seen: Vec::new(),
    };
    view.draw(&mut renderer, &Progress::default()).unwrap();
    assert!(renderer.tiles > 0);
    assert_eq!(renderer.layers_seen, ["visible".to_string()]);
}

#[test]
fn draw_cancellation_stops_between_tiles() {
    let mut store = MapStore::new();
    let handle = store.create_map("draw", "", 3857, bounds(), 640, 480);
    let view = store.map_view_mut(handle).unwrap();
    view.map_mut()
        .create_layer(LayerKind::Vector, "layer", "gst://a");

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let progress = Progress::with(move |status, _, _| {
        status != ProgressStatus::InProcess || counted.fetch_add(1, Ordering::SeqCst) < 2
    });

    let mut renderer = CountingRenderer {
        tiles: 0,
        layers_seen: Vec::new(),
    };
    let err = view.draw(&mut renderer, &progress).unwrap_err();
    assert_eq!(err.kind(), geostore_core::ErrorKind::Canceled);
}
