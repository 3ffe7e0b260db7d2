//! Core library of geostore: catalog, embedded spatial store and map
//! rendering support.
//! This crate is the single source of truth for business invariants.

pub mod catalog;
pub mod error;
pub mod logging;
pub mod map;
pub mod model;
pub mod progress;
pub mod store;

pub use catalog::object::{ObjectKind, ObjectRef, VectorFormat};
pub use catalog::{Catalog, CATALOG_PREFIX};
pub use error::{last_error, CoreError, CoreResult, ErrorKind};
pub use logging::{default_log_level, init_logging, logging_status};
pub use map::mapstore::{MapHandle, MapStore};
pub use map::overlay::{EditLayerOverlay, EditOutcome, OverlayKind};
pub use map::transform::{MapTransform, TileItem};
pub use map::view::{EditSaveResult, MapView, TileRenderer};
pub use map::{Layer, LayerKind, Map, Rgba};
pub use model::feature::{Feature, Field, FieldType, FieldValue};
pub use model::geometry::{Envelope, GeoPoint, Geometry, GeometryType, HitResult, PointId};
pub use progress::{ChangeCode, Progress, ProgressStatus};
pub use store::{AttachmentInfo, DataStore, FeatureClass, Table};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
