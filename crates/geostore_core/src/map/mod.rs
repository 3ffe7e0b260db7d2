//! Map model, transform, overlays, view and registry.
//!
//! # Responsibility
//! - Define the serializable map document (layer list + view parameters)
//!   and compose it with the transform engine and the edit overlay.
//!
//! # Invariants
//! - The map document tolerates missing fields on load by falling back to
//!   defaults.
//! - Layer source references are catalog paths; whether they are absolute
//!   or relative to the map document is the caller's save-time choice.

pub mod mapstore;
pub mod overlay;
pub mod transform;
pub mod view;

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::model::geometry::Envelope;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension forced onto persisted map documents.
pub const MAP_DOCUMENT_EXT: &str = "gmap";
pub const DEFAULT_EPSG: u32 = 3857;

const DEFAULT_MAP_NAME: &str = "new map";
const DEFAULT_BOUNDS: Envelope = Envelope {
    min_x: -20_037_508.342_789_2,
    min_y: -20_037_508.342_789_2,
    max_x: 20_037_508.342_789_2,
    max_y: 20_037_508.342_789_2,
};

/// Background color; persisted packed into one integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Packs channels as `0xAARRGGBB`.
    pub fn to_packed(self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }

    pub fn from_packed(packed: u32) -> Self {
        Self {
            a: (packed >> 24) as u8,
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        }
    }
}

impl Default for Rgba {
    /// Pale-sky default background.
    fn default() -> Self {
        Self {
            r: 210,
            g: 245,
            b: 255,
            a: 255,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Vector,
    Raster,
}

/// One entry of the ordered layer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub kind: LayerKind,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Catalog path of the data source, absolute or map-relative as the
    /// caller chose at save time.
    pub source: String,
    /// Feature temporarily hidden while edited in the overlay; never
    /// persisted.
    #[serde(skip)]
    pub hidden_feature: Option<i64>,
}

fn default_true() -> bool {
    true
}

impl Layer {
    pub fn new(kind: LayerKind, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            visible: true,
            source: source.into(),
            hidden_feature: None,
        }
    }
}

/// Persisted shape of the map document. Every field defaults so old or
/// partial documents still open.
#[derive(Debug, Serialize, Deserialize)]
struct MapDocument {
    #[serde(default = "Uuid::new_v4")]
    uuid: Uuid,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_epsg")]
    epsg: u32,
    #[serde(default = "default_bounds")]
    bounds: Envelope,
    #[serde(default = "default_background")]
    background: u32,
    #[serde(default)]
    x_looped: bool,
    #[serde(default)]
    rotations: [f64; 3],
    #[serde(default)]
    layers: Vec<Layer>,
}

fn default_epsg() -> u32 {
    DEFAULT_EPSG
}

fn default_bounds() -> Envelope {
    DEFAULT_BOUNDS
}

fn default_background() -> u32 {
    Rgba::default().to_packed()
}

/// The serializable map: identity, view parameters and the layer list.
#[derive(Debug, Clone)]
pub struct Map {
    uuid: Uuid,
    name: String,
    description: String,
    epsg: u32,
    bounds: Envelope,
    background: Rgba,
    x_looped: bool,
    rotations: [f64; 3],
    layers: Vec<Layer>,
    path: Option<PathBuf>,
    deleted: bool,
}

impl Map {
    pub fn new(name: impl Into<String>, description: impl Into<String>, epsg: u32, bounds: Envelope) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            epsg,
            bounds,
            background: Rgba::default(),
            x_looped: false,
            rotations: [0.0; 3],
            layers: Vec::new(),
            path: None,
            deleted: false,
        }
    }

    /// Loads a map document from disk.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Map> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            CoreError::new(
                ErrorKind::OpenFailed,
                format!("read map document `{}` failed: {err}", path.display()),
            )
        })?;
        let doc: MapDocument = serde_json::from_str(&raw).map_err(|err| {
            CoreError::new(
                ErrorKind::OpenFailed,
                format!("parse map document `{}` failed: {err}", path.display()),
            )
        })?;
        Ok(Map {
            uuid: doc.uuid,
            name: if doc.name.is_empty() {
                DEFAULT_MAP_NAME.to_string()
            } else {
                doc.name
            },
            description: doc.description,
            epsg: doc.epsg,
            bounds: doc.bounds,
            background: Rgba::from_packed(doc.background),
            x_looped: doc.x_looped,
            rotations: doc.rotations,
            layers: doc.layers,
            path: Some(path.to_path_buf()),
            deleted: false,
        })
    }

    /// Writes the map document, forcing the `.gmap` extension.
    pub fn save(&mut self, path: impl AsRef<Path>) -> CoreResult<PathBuf> {
        if self.deleted {
            return Err(CoreError::new(ErrorKind::SaveFailed, "map is deleted"));
        }
        let path = path.as_ref().with_extension(MAP_DOCUMENT_EXT);
        let doc = MapDocument {
            uuid: self.uuid,
            name: self.name.clone(),
            description: self.description.clone(),
            epsg: self.epsg,
            bounds: self.bounds,
            background: self.background.to_packed(),
            x_looped: self.x_looped,
            rotations: self.rotations,
            layers: self.layers.clone(),
        };
        let raw = serde_json::to_string_pretty(&doc).map_err(|err| {
            CoreError::new(ErrorKind::SaveFailed, format!("encode map failed: {err}"))
        })?;
        std::fs::write(&path, raw).map_err(|err| {
            CoreError::new(
                ErrorKind::SaveFailed,
                format!("write map document `{}` failed: {err}", path.display()),
            )
        })?;
        self.path = Some(path.clone());
        Ok(path)
    }

    /// Marks the map deleted and removes its document file when present.
    pub fn destroy(&mut self) -> CoreResult<()> {
        if self.deleted {
            return Err(CoreError::new(ErrorKind::DeleteFailed, "map already deleted"));
        }
        if let Some(path) = &self.path {
            if path.is_file() {
                std::fs::remove_file(path).map_err(|err| {
                    CoreError::new(
                        ErrorKind::DeleteFailed,
                        format!("remove map document failed: {err}"),
                    )
                })?;
            }
        }
        self.layers.clear();
        self.deleted = true;
        Ok(())
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn bounds(&self) -> Envelope {
        self.bounds
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    pub fn set_background(&mut self, color: Rgba) {
        self.background = color;
    }

    pub fn is_x_looped(&self) -> bool {
        self.x_looped
    }

    pub fn set_x_looped(&mut self, looped: bool) {
        self.x_looped = looped;
    }

    pub fn rotations(&self) -> [f64; 3] {
        self.rotations
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends a layer; returns its index.
    pub fn create_layer(&mut self, kind: LayerKind, name: &str, source: &str) -> usize {
        self.layers.push(Layer::new(kind, name, source));
        self.layers.len() - 1
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn layer_by_name_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.name == name)
    }

    pub fn delete_layer(&mut self, index: usize) -> bool {
        if index < self.layers.len() {
            self.layers.remove(index);
            true
        } else {
            false
        }
    }

    /// Moves a layer to a new position in draw order.
    pub fn reorder_layer(&mut self, from: usize, to: usize) -> bool {
        if from >= self.layers.len() || to >= self.layers.len() {
            return false;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        true
    }
}
