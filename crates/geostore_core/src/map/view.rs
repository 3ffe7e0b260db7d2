//! Map view: transform + layers + overlays + draw loop.
//!
//! # Responsibility
//! - Compose the map document with the coordinate transform and the edit
//!   overlay.
//! - Drive the per-layer/per-tile draw loop through the abstract renderer
//!   collaborator.
//!
//! # Invariants
//! - Rendering is consumed through [`TileRenderer`] only; the view never
//!   touches GPU state.
//! - Cancellation is checked per layer and per tile.

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::map::overlay::{EditLayerOverlay, EditOutcome};
use crate::map::transform::{MapTransform, TileItem};
use crate::map::{Layer, Map, Rgba};
use crate::progress::{Progress, ProgressStatus};
use crate::store::FeatureClass;
use log::info;

/// Abstract render backend: "draw this tile of this layer with this
/// style". Implemented outside the core.
pub trait TileRenderer {
    fn draw_tile(&mut self, layer: &Layer, tile: &TileItem, background: Rgba) -> CoreResult<()>;
}

/// Outcome of applying the edit overlay's state to its data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSaveResult {
    Nothing,
    Inserted(i64),
    Updated(i64),
    Deleted(i64),
}

/// A displayable map: document, transform and overlays.
pub struct MapView {
    map: Map,
    transform: MapTransform,
    edit_overlay: EditLayerOverlay,
}

impl MapView {
    pub fn new(map: Map, width: u32, height: u32) -> Self {
        let mut transform = MapTransform::new(width, height);
        transform.set_x_looped(map.is_x_looped());
        for (axis, angle) in map.rotations().into_iter().enumerate() {
            transform.set_rotation(axis, angle);
        }
        transform.set_extent(map.bounds());
        Self {
            map,
            transform,
            edit_overlay: EditLayerOverlay::new(),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    pub fn transform(&self) -> &MapTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut MapTransform {
        &mut self.transform
    }

    pub fn edit_overlay(&self) -> &EditLayerOverlay {
        &self.edit_overlay
    }

    pub fn edit_overlay_mut(&mut self) -> &mut EditLayerOverlay {
        &mut self.edit_overlay
    }

    pub fn set_display_size(&mut self, width: u32, height: u32, y_inverted: bool) {
        self.transform.set_display_size(width, height, y_inverted);
    }

    /// Draws all visible layers tile by tile through `renderer`.
    ///
    /// The tile set is recomputed from the current extent and zoom on
    /// every call; cancellation aborts with `Canceled` between tiles.
    pub fn draw(&self, renderer: &mut dyn TileRenderer, progress: &Progress) -> CoreResult<()> {
        let extent = self.transform.extent();
        let zoom = self.transform.zoom();
        let tiles = self.transform.tiles_for_extent(
            &extent,
            zoom,
            self.transform.is_y_inverted(),
            self.transform.is_x_looped(),
        );
        let visible: Vec<&Layer> = self.map.layers().iter().filter(|l| l.visible).collect();
        let total = (visible.len() * tiles.len()).max(1) as f64;
        let background = self.map.background();

        let mut done = 0usize;
        for layer in visible {
            if !progress.on_progress(
                ProgressStatus::InProcess,
                done as f64 / total,
                &format!("drawing layer `{}`", layer.name),
            ) {
                return Err(CoreError::new(ErrorKind::Canceled, "draw canceled"));
            }
            for tile in &tiles {
                if !progress.on_progress(ProgressStatus::InProcess, done as f64 / total, "") {
                    return Err(CoreError::new(ErrorKind::Canceled, "draw canceled"));
                }
                renderer.draw_tile(layer, tile, background)?;
                done += 1;
            }
        }
        progress.on_progress(ProgressStatus::Finished, 1.0, "draw complete");
        Ok(())
    }

    /// Starts editing an existing feature: loads its geometry into the
    /// overlay and hides the feature on its source layer.
    pub fn edit_feature(
        &mut self,
        layer_name: &str,
        source: &FeatureClass<'_>,
        fid: i64,
    ) -> CoreResult<()> {
        let feature = source.feature(fid)?.ok_or_else(|| {
            CoreError::new(ErrorKind::NotFound, format!("feature {fid} not found"))
        })?;
        let geometry = feature.geometry.ok_or_else(|| {
            CoreError::new(
                ErrorKind::InvalidArgument,
                format!("feature {fid} has no geometry"),
            )
        })?;
        if !self.edit_overlay.edit_geometry(layer_name, fid, geometry) {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                "geometry is not editable",
            ));
        }
        if let Some(layer) = self.map.layer_by_name_mut(layer_name) {
            layer.hidden_feature = Some(fid);
        }
        Ok(())
    }

    /// Starts a new feature draft seeded from the source geometry type.
    pub fn create_feature_draft(
        &mut self,
        layer_name: &str,
        source: &FeatureClass<'_>,
    ) -> bool {
        self.edit_overlay
            .create_geometry(layer_name, source.geometry_type(), &self.transform)
    }

    /// Persists the overlay's edit state into `source` and resets the
    /// overlay, unhiding the source feature.
    pub fn save_edit(&mut self, source: &FeatureClass<'_>) -> CoreResult<EditSaveResult> {
        let result = match self.edit_overlay.save_state() {
            EditOutcome::Nothing => EditSaveResult::Nothing,
            EditOutcome::Insert(geometry) => {
                let mut feature = source.create_feature();
                feature.geometry = Some(geometry);
                EditSaveResult::Inserted(source.insert_feature(&feature)?)
            }
            EditOutcome::Update(fid, geometry) => {
                let mut feature = source.feature(fid)?.ok_or_else(|| {
                    CoreError::new(ErrorKind::NotFound, format!("feature {fid} not found"))
                })?;
                feature.geometry = Some(geometry);
                source.update_feature(&feature)?;
                EditSaveResult::Updated(fid)
            }
            EditOutcome::DeleteExisting(fid) => {
                source.delete_feature(fid)?;
                EditSaveResult::Deleted(fid)
            }
        };
        info!(
            "event=edit_save module=map status=ok result={:?} layer={:?}",
            result,
            self.edit_overlay.layer_name()
        );
        self.finish_edit();
        Ok(result)
    }

    /// Abandons the edit session, unhiding the source feature.
    pub fn cancel_edit(&mut self) {
        self.finish_edit();
    }

    fn finish_edit(&mut self) {
        if let Some(layer_name) = self.edit_overlay.layer_name().map(str::to_string) {
            if let Some(layer) = self.map.layer_by_name_mut(&layer_name) {
                layer.hidden_feature = None;
            }
        }
        self.edit_overlay.reset();
    }
}
