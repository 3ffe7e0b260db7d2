//! Object factories: grouping raw directory listings into catalog nodes.
//!
//! # Responsibility
//! - Turn the raw name listing of a backing location into typed catalog
//!   children.
//! - Group multi-file vector formats into one composite child per base
//!   name.
//!
//! # Invariants
//! - A name consumed by one factory is removed from the listing so no
//!   other factory can double-claim it.
//! - Composite grouping requires strictly more matched files than the
//!   main format marker alone; a lone `.shp` without its companions never
//!   groups.

use crate::catalog::object::{add_child, Object, ObjectKind, ObjectRef, VectorFormat};
use crate::store::STORE_EXT;
use std::collections::BTreeMap;

/// Strategy that may consume raw names and append children.
pub trait ObjectFactory {
    fn name(&self) -> &'static str;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    /// Inspects `names`, removes the ones it claims and appends the
    /// resulting children to `container`. Stat failures are skipped
    /// silently.
    fn create_objects(&self, container: &ObjectRef, names: &mut Vec<String>);
}

/// Extension table of one multi-file vector format.
struct FormatExt {
    format: VectorFormat,
    main: &'static str,
    required: &'static [&'static str],
    optional: &'static [&'static str],
}

const FORMATS: &[FormatExt] = &[
    FormatExt {
        format: VectorFormat::EsriShapefile,
        main: "shp",
        required: &["shx", "dbf"],
        optional: &["sbn", "sbx", "cpg", "prj", "qix"],
    },
    FormatExt {
        format: VectorFormat::MapInfoTab,
        main: "tab",
        required: &["dat", "map", "id", "ind"],
        optional: &["cpg", "qix"],
    },
    FormatExt {
        format: VectorFormat::MapInfoMif,
        main: "mif",
        required: &["mid"],
        optional: &["cpg", "qix"],
    },
];

struct FormatMatch {
    main_name: String,
    sibling_files: Vec<String>,
}

/// Groups `name.shp` + `name.shx` + `name.dbf` (+ optional siblings) into
/// one composite simple-dataset child.
pub struct SimpleDatasetFactory {
    enabled: bool,
}

impl SimpleDatasetFactory {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for SimpleDatasetFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFactory for SimpleDatasetFactory {
    fn name(&self) -> &'static str {
        "simple-dataset"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn create_objects(&self, container: &ObjectRef, names: &mut Vec<String>) {
        // Group the listing by base name so each candidate's extension set
        // can be tested against the format tables.
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in names.iter() {
            groups
                .entry(base_name(name).to_string())
                .or_default()
                .push(name.clone());
        }

        let container_path = container.borrow().path().to_path_buf();
        for (_, group) in groups {
            for format in FORMATS {
                let Some(matched) = match_format(&group, format) else {
                    continue;
                };
                let child = Object::new_ref(
                    ObjectKind::SimpleDataset(format.format),
                    matched.main_name.clone(),
                    container_path.join(&matched.main_name),
                );
                child
                    .borrow_mut()
                    .set_sibling_files(matched.sibling_files.clone());
                add_child(container, child);

                names.retain(|name| {
                    *name != matched.main_name && !matched.sibling_files.contains(name)
                });
            }
        }
    }
}

/// Applies the over-inclusion guard: the main extension plus required
/// siblings must strictly outnumber the required list, so all required
/// companions have to be present. Optional extensions join the sibling
/// set but never the count.
fn match_format(group: &[String], format: &FormatExt) -> Option<FormatMatch> {
    let mut counter = 0usize;
    let mut main_name = None;
    let mut sibling_files = Vec::new();

    for name in group {
        let ext = extension(name);
        if ext.eq_ignore_ascii_case(format.main) {
            counter += 1;
            main_name = Some(name.clone());
        } else if format.required.iter().any(|r| ext.eq_ignore_ascii_case(r)) {
            counter += 1;
            sibling_files.push(name.clone());
        } else if format.optional.iter().any(|o| ext.eq_ignore_ascii_case(o)) {
            sibling_files.push(name.clone());
        }
    }

    if counter > format.required.len() {
        Some(FormatMatch {
            main_name: main_name?,
            sibling_files,
        })
    } else {
        None
    }
}

/// Claims `*.gst` store container files.
pub struct DataStoreFactory {
    enabled: bool,
}

impl DataStoreFactory {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for DataStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFactory for DataStoreFactory {
    fn name(&self) -> &'static str {
        "data-store"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn create_objects(&self, container: &ObjectRef, names: &mut Vec<String>) {
        let container_path = container.borrow().path().to_path_buf();
        names.retain(|name| {
            if !extension(name).eq_ignore_ascii_case(STORE_EXT) {
                return true;
            }
            let child = Object::new_ref(
                ObjectKind::Store,
                name.clone(),
                container_path.join(name),
            );
            add_child(container, child);
            false
        });
    }
}

/// Claims subdirectories as folder containers.
pub struct FolderFactory {
    enabled: bool,
}

impl FolderFactory {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for FolderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFactory for FolderFactory {
    fn name(&self) -> &'static str {
        "folder"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn create_objects(&self, container: &ObjectRef, names: &mut Vec<String>) {
        let container_path = container.borrow().path().to_path_buf();
        names.retain(|name| {
            let path = container_path.join(name);
            if !path.is_dir() {
                return true;
            }
            let child = Object::new_ref(ObjectKind::Folder, name.clone(), path);
            add_child(container, child);
            false
        });
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(base, _)| base)
}

fn extension(name: &str) -> &str {
    name.rsplit_once('.').map_or("", |(_, ext)| ext)
}
