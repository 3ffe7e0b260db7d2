//! Catalog tree nodes.
//!
//! # Responsibility
//! - Define the polymorphic node of the hierarchical namespace and its
//!   ownership rules.
//!
//! # Invariants
//! - Children are held by shared ownership (`Rc`): external callers may
//!   keep a node alive across a catalog refresh.
//! - The parent link is a non-owning back-reference used only for lookup,
//!   never for lifetime management.
//! - `children_loaded` is a one-way latch until `clear()` resets it.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use super::CATALOG_PREFIX;

pub type ObjectRef = Rc<RefCell<Object>>;

/// Multi-file vector formats grouped into one composite catalog node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    EsriShapefile,
    MapInfoTab,
    MapInfoMif,
}

/// Closed set of catalog node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Root,
    LocalConnection,
    Folder,
    SimpleDataset(VectorFormat),
    Store,
    Table,
    FeatureClass,
    Raster,
}

impl ObjectKind {
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Root
                | Self::LocalConnection
                | Self::Folder
                | Self::SimpleDataset(_)
                | Self::Store
        )
    }
}

/// One node in the catalog tree.
pub struct Object {
    kind: ObjectKind,
    name: String,
    path: PathBuf,
    parent: Weak<RefCell<Object>>,
    children: Vec<ObjectRef>,
    children_loaded: bool,
    /// Companion file names of a composite (simple) dataset; drives atomic
    /// move/copy/delete.
    sibling_files: Vec<String>,
}

impl Object {
    /// Creates a detached node; attach it with [`add_child`].
    pub fn new_ref(kind: ObjectKind, name: impl Into<String>, path: impl Into<PathBuf>) -> ObjectRef {
        Rc::new(RefCell::new(Object {
            kind,
            name: name.into(),
            path: path.into(),
            parent: Weak::new(),
            children: Vec::new(),
            children_loaded: false,
            sibling_files: Vec::new(),
        }))
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> Option<ObjectRef> {
        self.parent.upgrade()
    }

    pub fn children_loaded(&self) -> bool {
        self.children_loaded
    }

    pub(crate) fn set_children_loaded(&mut self, loaded: bool) {
        self.children_loaded = loaded;
    }

    pub fn children(&self) -> Vec<ObjectRef> {
        self.children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn sibling_files(&self) -> &[String] {
        &self.sibling_files
    }

    pub fn set_sibling_files(&mut self, files: Vec<String>) {
        self.sibling_files = files;
    }

    /// Drops cached children and resets the lazy-load latch; used on
    /// memory pressure.
    pub fn clear(&mut self) {
        self.children.clear();
        self.children_loaded = false;
    }

    pub(crate) fn push_child(&mut self, child: ObjectRef) {
        self.children.push(child);
    }
}

/// Attaches `child` under `parent`, wiring the non-owning back-reference.
pub fn add_child(parent: &ObjectRef, child: ObjectRef) {
    child.borrow_mut().parent = Rc::downgrade(parent);
    parent.borrow_mut().push_child(child);
}

/// Stable unique name of a node, derived by walking parents up to the
/// catalog root.
pub fn full_name(object: &ObjectRef) -> String {
    let mut segments = Vec::new();
    let mut current = Some(object.clone());
    while let Some(node) = current {
        let borrowed = node.borrow();
        if borrowed.kind() == ObjectKind::Root {
            break;
        }
        segments.push(borrowed.name().to_string());
        current = borrowed.parent();
    }
    segments.reverse();
    format!("{CATALOG_PREFIX}{}", segments.join("/"))
}

/// Finds a direct child by name using platform name-equality rules.
pub fn child_by_name(parent: &ObjectRef, name: &str) -> Option<ObjectRef> {
    parent
        .borrow()
        .children
        .iter()
        .find(|child| names_equal(child.borrow().name(), name))
        .cloned()
}

/// Name comparison: case-insensitive only where the underlying filesystem
/// is.
pub(crate) fn names_equal(a: &str, b: &str) -> bool {
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}
