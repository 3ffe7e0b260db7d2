//! Interactive map overlays and the geometry-editing state machine.
//!
//! # Responsibility
//! - Hold the editable geometry, the bounded undo/redo snapshot history
//!   and the vertex selection of the edit overlay.
//!
//! # Invariants
//! - Every mutating operation that changes geometry pushes a history
//!   snapshot and truncates any redo tail; the history never holds more
//!   than the initial state plus `MAX_UNDO` snapshots.
//! - Refused mutations (minimum-vertex guards, invalid addresses) leave
//!   geometry, history and selection untouched.
//! - Selection is not part of history; undo/redo re-select the first
//!   vertex instead of restoring the old selection.

use crate::map::transform::MapTransform;
use crate::model::geometry::{
    Envelope, GeoPoint, Geometry, GeometryType, HitResult, PartDeleted, PointId,
};
use std::collections::VecDeque;

/// Undo depth of the edit overlay.
pub const MAX_UNDO: usize = 10;
/// Default tap tolerance in display pixels.
pub const TOLERANCE_PX: f64 = 7.0;
/// Pixel half-size of template geometries seeded at the map center.
pub const GEOMETRY_SIZE_PX: f64 = 50.0;

/// Overlay kinds, stored per map in fixed reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Edit,
    Location,
    Track,
}

/// Index of an overlay kind in the per-map overlay list; only the edit
/// overlay is implemented.
pub fn overlay_index(kind: OverlayKind) -> Option<usize> {
    match kind {
        OverlayKind::Edit => Some(0),
        OverlayKind::Location | OverlayKind::Track => None,
    }
}

/// What `save` should do with the edited geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Nothing to persist (no geometry and no pre-existing feature).
    Nothing,
    /// Insert a new feature with this geometry.
    Insert(Geometry),
    /// Update the geometry of an existing feature.
    Update(i64, Geometry),
    /// The geometry was deleted or emptied; delete the feature.
    DeleteExisting(i64),
}

/// The interactive geometry-editing overlay of one map view.
pub struct EditLayerOverlay {
    visible: bool,
    tolerance_px: f64,
    layer_name: Option<String>,
    feature_id: Option<i64>,
    geometry: Option<Geometry>,
    history: VecDeque<Geometry>,
    cursor: usize,
    selected: Option<(PointId, GeoPoint)>,
}

impl EditLayerOverlay {
    pub fn new() -> Self {
        Self {
            visible: false,
            tolerance_px: TOLERANCE_PX,
            layer_name: None,
            feature_id: None,
            geometry: None,
            history: VecDeque::new(),
            cursor: 0,
            selected: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    pub fn set_tolerance_px(&mut self, tolerance_px: f64) {
        self.tolerance_px = tolerance_px;
    }

    pub fn is_editing(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn layer_name(&self) -> Option<&str> {
        self.layer_name.as_deref()
    }

    /// Id of the feature being edited; `None` for a new draft.
    pub fn feature_id(&self) -> Option<i64> {
        self.feature_id
    }

    pub fn selected_point(&self) -> Option<PointId> {
        self.selected.map(|(id, _)| id)
    }

    pub fn selected_coordinates(&self) -> Option<GeoPoint> {
        self.selected.map(|(_, pt)| pt)
    }

    /// Starts editing a new draft feature: seeds a template geometry at
    /// the map center, pushes the initial history state and selects the
    /// first vertex.
    pub fn create_geometry(
        &mut self,
        layer_name: &str,
        kind: GeometryType,
        transform: &MapTransform,
    ) -> bool {
        let half = transform.map_distance(GEOMETRY_SIZE_PX, GEOMETRY_SIZE_PX);
        let geometry = Geometry::template(kind, transform.center(), half);
        self.start_editing(layer_name, None, geometry);
        true
    }

    /// Starts editing an existing feature's geometry.
    pub fn edit_geometry(&mut self, layer_name: &str, feature_id: i64, geometry: Geometry) -> bool {
        if geometry.is_empty() {
            return false;
        }
        self.start_editing(layer_name, Some(feature_id), geometry);
        true
    }

    fn start_editing(&mut self, layer_name: &str, feature_id: Option<i64>, geometry: Geometry) {
        self.layer_name = Some(layer_name.to_string());
        self.feature_id = feature_id;
        self.geometry = Some(geometry);
        self.history.clear();
        self.cursor = 0;
        self.save_to_history();
        self.select_first_point();
        self.visible = true;
    }

    /// Drops the edited geometry, turning a later `save` into a delete
    /// request for pre-existing features.
    pub fn delete_geometry(&mut self) -> bool {
        if self.geometry.is_none() {
            return false;
        }
        self.geometry = None;
        self.history.clear();
        self.cursor = 0;
        self.selected = None;
        true
    }

    /// Abandons the edit session without persisting anything.
    pub fn cancel(&mut self) {
        self.reset();
    }

    /// Clears all edit state; the overlay returns to inactive.
    pub fn reset(&mut self) {
        self.layer_name = None;
        self.feature_id = None;
        self.geometry = None;
        self.history.clear();
        self.cursor = 0;
        self.selected = None;
        self.visible = false;
    }

    fn select_first_point(&mut self) {
        self.selected = self
            .geometry
            .as_ref()
            .and_then(|geometry| geometry.first_vertex());
    }

    /// Selects the vertex near `coords` within the pixel tolerance,
    /// preferring the currently selected vertex when several are in range.
    pub fn select_point(&mut self, transform: &MapTransform, coords: GeoPoint) -> bool {
        let Some(geometry) = self.geometry.as_ref() else {
            return false;
        };
        let tolerance = transform.map_distance(self.tolerance_px, self.tolerance_px);
        let env = Envelope::around(coords, tolerance.x, tolerance.y);
        let hint = self.selected.map(|(id, _)| id);
        match geometry.hit_test(&env, hint) {
            HitResult::Vertex { id, coordinates } => {
                self.selected = Some((id, coordinates));
                true
            }
            _ => false,
        }
    }

    /// True when a vertex is selected; with `coords` given, additionally
    /// requires the selection to lie within tolerance of that location.
    pub fn has_selected_point(
        &self,
        transform: &MapTransform,
        coords: Option<GeoPoint>,
    ) -> bool {
        let Some((_, selected_coords)) = self.selected else {
            return false;
        };
        match coords {
            Some(coords) => {
                let tolerance = transform.map_distance(self.tolerance_px, self.tolerance_px);
                Envelope::around(coords, tolerance.x, tolerance.y).contains(selected_coords)
            }
            None => true,
        }
    }

    /// Moves the selected vertex by a world offset.
    pub fn shift_point(&mut self, offset: GeoPoint) -> bool {
        let Some((id, _)) = self.selected else {
            return false;
        };
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        let Some(coordinates) = geometry.shift_vertex(id, offset) else {
            return false;
        };
        self.selected = Some((id, coordinates));
        self.save_to_history();
        true
    }

    /// Inserts a vertex after the selected one and selects it.
    pub fn add_point(&mut self, coords: GeoPoint) -> bool {
        let Some((id, _)) = self.selected else {
            return false;
        };
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        let Some(new_id) = geometry.insert_vertex_after(id, coords) else {
            return false;
        };
        self.selected = Some((new_id, coords));
        self.save_to_history();
        true
    }

    /// Deletes the selected vertex, honoring minimum-vertex guards, and
    /// selects the previous one.
    pub fn delete_point(&mut self) -> bool {
        let Some((id, _)) = self.selected else {
            return false;
        };
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        let Some(new_id) = geometry.delete_vertex(id) else {
            return false;
        };
        let coordinates = geometry.vertex(new_id);
        self.selected = coordinates.map(|pt| (new_id, pt));
        self.save_to_history();
        true
    }

    /// Appends a template part to a multi-geometry and selects it.
    pub fn add_geometry_part(&mut self, transform: &MapTransform) -> bool {
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        let half = transform.map_distance(GEOMETRY_SIZE_PX, GEOMETRY_SIZE_PX);
        let Some(new_id) = geometry.add_part(transform.center(), half) else {
            return false;
        };
        let coordinates = geometry.vertex(new_id);
        self.selected = coordinates.map(|pt| (new_id, pt));
        self.save_to_history();
        true
    }

    /// Deletes the selected part of a multi-geometry. Removing the last
    /// part leaves an empty collection that `save_state` treats as a
    /// deletion request.
    pub fn delete_geometry_part(&mut self) -> bool {
        let Some((id, _)) = self.selected else {
            return false;
        };
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        match geometry.delete_part(id.geometry) {
            Some(PartDeleted::Remaining(new_id)) => {
                let coordinates = geometry.vertex(new_id);
                self.selected = coordinates.map(|pt| (new_id, pt));
                self.save_to_history();
                true
            }
            Some(PartDeleted::Emptied) => {
                self.selected = None;
                self.save_to_history();
                true
            }
            None => false,
        }
    }

    /// Appends the current geometry to the history, discarding any redo
    /// tail and evicting the oldest state beyond the cap.
    fn save_to_history(&mut self) {
        let Some(geometry) = self.geometry.as_ref() else {
            return;
        };
        while self.history.len() > self.cursor + 1 {
            self.history.pop_back();
        }
        if self.history.len() > MAX_UNDO {
            self.history.pop_front();
        }
        self.history.push_back(geometry.clone());
        self.cursor = self.history.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.history.is_empty() && self.cursor + 1 < self.history.len()
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        self.restore_from_history()
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        self.restore_from_history()
    }

    fn restore_from_history(&mut self) -> bool {
        let Some(snapshot) = self.history.get(self.cursor) else {
            return false;
        };
        self.geometry = Some(snapshot.clone());
        self.select_first_point();
        true
    }

    /// Decides what persisting the current edit state means.
    ///
    /// A missing or emptied geometry deletes a pre-existing feature and is
    /// a no-op for a never-persisted draft; otherwise the geometry is
    /// inserted (new) or updated (existing).
    pub fn save_state(&self) -> EditOutcome {
        let geometry = self.geometry.clone().filter(|geometry| !geometry.is_empty());
        match (geometry, self.feature_id) {
            (None, Some(fid)) => EditOutcome::DeleteExisting(fid),
            (None, None) => EditOutcome::Nothing,
            (Some(geometry), Some(fid)) => EditOutcome::Update(fid, geometry),
            (Some(geometry), None) => EditOutcome::Insert(geometry),
        }
    }
}

impl Default for EditLayerOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{overlay_index, EditLayerOverlay, EditOutcome, OverlayKind};
    use crate::map::transform::MapTransform;
    use crate::model::geometry::{GeoPoint, Geometry};

    fn overlay_with_line() -> EditLayerOverlay {
        let mut overlay = EditLayerOverlay::new();
        let line = Geometry::LineString(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(10.0, 0.0),
            GeoPoint::new(20.0, 0.0),
        ]);
        assert!(overlay.edit_geometry("roads", 7, line));
        overlay
    }

    #[test]
    fn edit_geometry_selects_first_vertex() {
        let overlay = overlay_with_line();
        assert!(overlay.is_editing());
        assert_eq!(overlay.selected_coordinates(), Some(GeoPoint::new(0.0, 0.0)));
        assert!(!overlay.can_undo());
    }

    #[test]
    fn save_state_maps_states_to_outcomes() {
        let mut overlay = overlay_with_line();
        assert!(matches!(overlay.save_state(), EditOutcome::Update(7, _)));

        overlay.delete_geometry();
        assert_eq!(overlay.save_state(), EditOutcome::DeleteExisting(7));

        overlay.reset();
        assert_eq!(overlay.save_state(), EditOutcome::Nothing);
    }

    #[test]
    fn new_draft_saves_as_insert() {
        let mut overlay = EditLayerOverlay::new();
        let transform = MapTransform::new(640, 480);
        assert!(overlay.create_geometry(
            "points",
            crate::model::geometry::GeometryType::Point,
            &transform
        ));
        assert!(matches!(overlay.save_state(), EditOutcome::Insert(_)));
        assert_eq!(overlay.feature_id(), None);
    }

    #[test]
    fn only_edit_overlay_has_an_index() {
        assert_eq!(overlay_index(OverlayKind::Edit), Some(0));
        assert_eq!(overlay_index(OverlayKind::Location), None);
        assert_eq!(overlay_index(OverlayKind::Track), None);
    }
}
