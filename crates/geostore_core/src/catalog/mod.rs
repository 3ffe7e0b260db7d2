//! Catalog: the hierarchical namespace over all known data sources.
//!
//! # Responsibility
//! - Own the root of the object tree and the factory set.
//! - Resolve `gst://` paths segment by segment with lazy child loading.
//!
//! # Invariants
//! - Resolution failure returns `None`, never an error: callers null-check.
//! - For any reachable object, `object_by_path(full_name(obj))` resolves
//!   back to the same node.
//! - Once enumerated, a container's children stay cached until `clear()`.

pub mod factory;
pub mod object;

use crate::catalog::factory::{
    DataStoreFactory, FolderFactory, ObjectFactory, SimpleDatasetFactory,
};
use crate::catalog::object::{add_child, child_by_name, Object, ObjectKind, ObjectRef};
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::store::DataStore;
use log::warn;
use std::cell::RefCell;
use std::path::Path;

/// Scheme prefix of catalog paths.
pub const CATALOG_PREFIX: &str = "gst://";

/// Explicitly constructed catalog root; there is no process-wide instance.
pub struct Catalog {
    root: ObjectRef,
    factories: RefCell<Vec<Box<dyn ObjectFactory>>>,
    show_hidden: bool,
}

impl Catalog {
    /// Creates an empty catalog with the default factory set
    /// (stores, simple datasets, folders, in claim order).
    pub fn new() -> Self {
        let root = Object::new_ref(ObjectKind::Root, "", "");
        // Root children are connections added explicitly; nothing to
        // enumerate lazily.
        root.borrow_mut().set_children_loaded(true);
        Self {
            root,
            factories: RefCell::new(vec![
                Box::new(DataStoreFactory::new()),
                Box::new(SimpleDatasetFactory::new()),
                Box::new(FolderFactory::new()),
            ]),
            show_hidden: true,
        }
    }

    pub fn root(&self) -> ObjectRef {
        self.root.clone()
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.show_hidden = show_hidden;
    }

    /// Enables or disables a factory by name; returns false for unknown
    /// names.
    pub fn set_factory_enabled(&self, name: &str, enabled: bool) -> bool {
        for factory in self.factories.borrow_mut().iter_mut() {
            if factory.name() == name {
                factory.set_enabled(enabled);
                return true;
            }
        }
        false
    }

    /// Mounts a local directory as a top-level connection.
    pub fn add_local_connection(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> CoreResult<ObjectRef> {
        let path = path.as_ref();
        if name.is_empty() || name.contains('/') {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                format!("invalid connection name `{name}`"),
            ));
        }
        if !path.is_dir() {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                format!("`{}` is not a directory", path.display()),
            ));
        }
        if child_by_name(&self.root, name).is_some() {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                format!("connection `{name}` already exists"),
            ));
        }
        let connection = Object::new_ref(ObjectKind::LocalConnection, name, path);
        add_child(&self.root, connection.clone());
        Ok(connection)
    }

    /// Resolves a `gst://` path to a node; `None` when any segment fails
    /// to resolve.
    pub fn object_by_path(&self, path: &str) -> Option<ObjectRef> {
        let rest = path.strip_prefix(CATALOG_PREFIX)?;
        let mut current = self.root.clone();
        for segment in rest.split('/').filter(|segment| !segment.is_empty()) {
            self.ensure_children(&current);
            current = child_by_name(&current, segment)?;
        }
        Some(current)
    }

    /// Maps an absolute filesystem path onto the catalog tree through the
    /// mounted connections.
    pub fn object_by_local_path(&self, path: impl AsRef<Path>) -> Option<ObjectRef> {
        let path = path.as_ref();
        for connection in self.root.borrow().children() {
            let base = connection.borrow().path().to_path_buf();
            let Ok(rest) = path.strip_prefix(&base) else {
                continue;
            };
            let mut current = connection.clone();
            for component in rest.components() {
                let segment = component.as_os_str().to_string_lossy();
                self.ensure_children(&current);
                current = child_by_name(&current, &segment)?;
            }
            return Some(current);
        }
        None
    }

    /// True when the container has at least one child, enumerating them on
    /// first access.
    pub fn has_children(&self, container: &ObjectRef) -> bool {
        self.ensure_children(container);
        container.borrow().child_count() > 0
    }

    /// Children of a container, enumerated on first access.
    pub fn children(&self, container: &ObjectRef) -> Vec<ObjectRef> {
        self.ensure_children(container);
        container.borrow().children()
    }

    /// The lazily constructed inner object of a composite dataset.
    pub fn internal_object(&self, simple_dataset: &ObjectRef) -> Option<ObjectRef> {
        if !matches!(simple_dataset.borrow().kind(), ObjectKind::SimpleDataset(_)) {
            return None;
        }
        self.ensure_children(simple_dataset);
        simple_dataset.borrow().children().first().cloned()
    }

    /// Clears every top-level container's cached children; used on low
    /// memory.
    pub fn free_resources(&self) {
        for child in self.root.borrow().children() {
            child.borrow_mut().clear();
        }
    }

    /// One-time, factory-driven child enumeration.
    ///
    /// An unreadable backing location degrades to "no children" rather
    /// than failing the catalog.
    fn ensure_children(&self, container: &ObjectRef) {
        let (kind, loaded) = {
            let borrowed = container.borrow();
            (borrowed.kind(), borrowed.children_loaded())
        };
        if loaded || !kind.is_container() {
            return;
        }

        match kind {
            ObjectKind::LocalConnection | ObjectKind::Folder => {
                self.load_directory_children(container)
            }
            ObjectKind::Store => self.load_store_children(container),
            ObjectKind::SimpleDataset(_) => load_internal_object(container),
            _ => {}
        }
        container.borrow_mut().set_children_loaded(true);
    }

    fn load_directory_children(&self, container: &ObjectRef) {
        let path = container.borrow().path().to_path_buf();
        let entries = match std::fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "event=catalog_enumerate module=catalog status=error path={} error={}",
                    path.display(),
                    err
                );
                return;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| self.show_hidden || !name.starts_with('.'))
            .collect();
        names.sort();

        for factory in self.factories.borrow().iter() {
            if factory.is_enabled() {
                factory.create_objects(container, &mut names);
            }
        }
    }

    fn load_store_children(&self, container: &ObjectRef) {
        let path = container.borrow().path().to_path_buf();
        let store = match DataStore::open(&path) {
            Ok(store) => store,
            Err(err) => {
                warn!(
                    "event=catalog_store_open module=catalog status=error path={} error={}",
                    path.display(),
                    err
                );
                return;
            }
        };
        let Ok(names) = store.table_names() else {
            return;
        };
        for name in names {
            let spatial = store
                .property(&name, "geometry_type", "")
                .map(|value| !value.is_empty())
                .unwrap_or(false);
            let kind = if spatial {
                ObjectKind::FeatureClass
            } else {
                ObjectKind::Table
            };
            let child = Object::new_ref(kind, name.clone(), path.join(&name));
            add_child(container, child);
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Seeds the internal leaf of a composite dataset: the main file exposed
/// as a feature class node.
fn load_internal_object(container: &ObjectRef) {
    let (name, path) = {
        let borrowed = container.borrow();
        (borrowed.name().to_string(), borrowed.path().to_path_buf())
    };
    let inner = Object::new_ref(ObjectKind::FeatureClass, name, path);
    add_child(container, inner);
}
