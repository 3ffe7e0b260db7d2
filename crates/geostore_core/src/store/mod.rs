//! Embedded transactional spatial data store.
//!
//! # Responsibility
//! - Own the SQLite-backed store bootstrap, schema versioning and journal
//!   control.
//! - Provide the table/feature-class row APIs and attachment storage.
//!
//! # Invariants
//! - System tables carry the `gst_` prefix and never appear in user-facing
//!   listings.
//! - Tables and feature classes borrow the store connection; they must not
//!   outlive the owning `DataStore`.

mod datastore;
mod featureclass;
mod table;

pub use datastore::{latest_version, DataStore, SqlLockGuard, Upgrade, STORE_EXT};
pub use featureclass::FeatureClass;
pub use table::{AttachmentInfo, Table};
