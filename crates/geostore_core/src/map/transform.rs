//! Coordinate transform engine between world and display space.
//!
//! # Responsibility
//! - Maintain the bidirectional world/display mapping derived from size,
//!   center, scale, extent and rotation.
//! - Enumerate the tile set covering a world extent at a zoom level.
//!
//! # Invariants
//! - Extent, center and scale are mutually derivable; setting one
//!   recomputes the others.
//! - Derived scale is clamped to configured limits; direct out-of-limit
//!   requests are refused without changing state.
//! - `world_to_display` and `display_to_world` are exact inverses within
//!   floating-point tolerance.

use crate::model::geometry::{Envelope, GeoPoint};

/// Default world bounds used when no extent limit is configured
/// (spherical-mercator full extent).
pub const WORLD_BOUNDS: Envelope = Envelope {
    min_x: -20_037_508.342_789_2,
    min_y: -20_037_508.342_789_2,
    max_x: 20_037_508.342_789_2,
    max_y: 20_037_508.342_789_2,
};

const TILE_SIZE_PX: f64 = 256.0;

/// One tile of the rendering partition at a given zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileItem {
    pub x: i64,
    pub y: i64,
    pub z: u8,
    /// World-widths of horizontal wraparound shift applied to this tile.
    pub cross_extent: i32,
    pub env: Envelope,
}

/// Pure coordinate-transform state of one map view.
#[derive(Debug, Clone)]
pub struct MapTransform {
    width: u32,
    height: u32,
    y_inverted: bool,
    x_looped: bool,
    center: GeoPoint,
    /// Rotation angles around the x, y and z axes; only z participates in
    /// the 2D transform.
    rotations: [f64; 3],
    scale: f64,
    extent: Envelope,
    scale_limits: Option<(f64, f64)>,
    extent_limit: Option<Envelope>,
    extra_zoom: i32,
}

impl MapTransform {
    pub fn new(width: u32, height: u32) -> Self {
        let mut transform = Self {
            width: width.max(1),
            height: height.max(1),
            y_inverted: false,
            x_looped: false,
            center: GeoPoint::default(),
            rotations: [0.0; 3],
            scale: 1.0,
            extent: WORLD_BOUNDS,
            scale_limits: None,
            extent_limit: None,
            extra_zoom: 0,
        };
        transform.update_extent();
        transform
    }

    pub fn display_width(&self) -> u32 {
        self.width
    }

    pub fn display_height(&self) -> u32 {
        self.height
    }

    pub fn is_y_inverted(&self) -> bool {
        self.y_inverted
    }

    pub fn is_x_looped(&self) -> bool {
        self.x_looped
    }

    pub fn set_x_looped(&mut self, looped: bool) {
        self.x_looped = looped;
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn extent(&self) -> Envelope {
        self.extent
    }

    pub fn rotation(&self, axis: usize) -> f64 {
        self.rotations.get(axis).copied().unwrap_or(0.0)
    }

    pub fn set_rotation(&mut self, axis: usize, angle: f64) {
        if let Some(slot) = self.rotations.get_mut(axis) {
            *slot = angle;
        }
    }

    pub fn extent_limit(&self) -> Option<Envelope> {
        self.extent_limit
    }

    pub fn set_extent_limit(&mut self, limit: Option<Envelope>) {
        self.extent_limit = limit;
    }

    pub fn set_scale_limits(&mut self, limits: Option<(f64, f64)>) {
        self.scale_limits = limits;
    }

    pub fn extra_zoom(&self) -> i32 {
        self.extra_zoom
    }

    /// Integer bias added to the derived zoom, used when source tiles are
    /// coarser than the display warrants.
    pub fn set_extra_zoom(&mut self, extra_zoom: i32) {
        self.extra_zoom = extra_zoom;
    }

    /// Resizes the display surface, preserving scale and center.
    pub fn set_display_size(&mut self, width: u32, height: u32, y_inverted: bool) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.y_inverted = y_inverted;
        self.update_extent();
    }

    /// Makes `env` the authoritative view: derives scale and center from
    /// it, then refits the stored extent to the display ratio.
    pub fn set_extent(&mut self, env: Envelope) -> bool {
        if !env.is_valid() {
            return false;
        }
        let scale_x = f64::from(self.width) / env.width();
        let scale_y = f64::from(self.height) / env.height();
        self.scale = self.clamp_scale(scale_x.min(scale_y));
        self.center = self.clamp_center(env.center());
        self.update_extent();
        true
    }

    /// Sets the scale directly; refused when limits exclude the request.
    pub fn set_scale(&mut self, scale: f64) -> bool {
        if scale <= 0.0 || !self.scale_allowed(scale) {
            return false;
        }
        self.scale = scale;
        self.update_extent();
        true
    }

    /// Moves the view center; refused when the extent limit excludes it.
    pub fn set_center(&mut self, x: f64, y: f64) -> bool {
        let center = GeoPoint::new(x, y);
        if !self.center_allowed(center) {
            return false;
        }
        self.center = center;
        self.update_extent();
        true
    }

    pub fn set_scale_and_center(&mut self, scale: f64, x: f64, y: f64) -> bool {
        let center = GeoPoint::new(x, y);
        if scale <= 0.0 || !self.scale_allowed(scale) || !self.center_allowed(center) {
            return false;
        }
        self.scale = scale;
        self.center = center;
        self.update_extent();
        true
    }

    fn scale_allowed(&self, scale: f64) -> bool {
        match self.scale_limits {
            Some((min, max)) => scale >= min && scale <= max,
            None => true,
        }
    }

    fn center_allowed(&self, center: GeoPoint) -> bool {
        match &self.extent_limit {
            Some(limit) => limit.contains(center),
            None => true,
        }
    }

    fn clamp_scale(&self, scale: f64) -> f64 {
        match self.scale_limits {
            Some((min, max)) => scale.clamp(min, max),
            None => scale,
        }
    }

    fn clamp_center(&self, center: GeoPoint) -> GeoPoint {
        match &self.extent_limit {
            Some(limit) => GeoPoint::new(
                center.x.clamp(limit.min_x, limit.max_x),
                center.y.clamp(limit.min_y, limit.max_y),
            ),
            None => center,
        }
    }

    fn update_extent(&mut self) {
        let half_w = f64::from(self.width) / (2.0 * self.scale);
        let half_h = f64::from(self.height) / (2.0 * self.scale);
        self.extent = Envelope::around(self.center, half_w, half_h);
    }

    /// World distance covered by a pixel distance at the current scale.
    pub fn map_distance(&self, dx_px: f64, dy_px: f64) -> GeoPoint {
        GeoPoint::new(dx_px / self.scale, dy_px / self.scale)
    }

    pub fn world_to_display(&self, pt: GeoPoint) -> GeoPoint {
        let rotated = self.rotate_about_center(pt, -self.rotations[2]);
        let x = (rotated.x - self.extent.min_x) * self.scale;
        let y = (rotated.y - self.extent.min_y) * self.scale;
        if self.y_inverted {
            GeoPoint::new(x, f64::from(self.height) - y)
        } else {
            GeoPoint::new(x, y)
        }
    }

    pub fn display_to_world(&self, pt: GeoPoint) -> GeoPoint {
        let y = if self.y_inverted {
            f64::from(self.height) - pt.y
        } else {
            pt.y
        };
        let world = GeoPoint::new(
            pt.x / self.scale + self.extent.min_x,
            y / self.scale + self.extent.min_y,
        );
        self.rotate_about_center(world, self.rotations[2])
    }

    fn rotate_about_center(&self, pt: GeoPoint, angle: f64) -> GeoPoint {
        if angle == 0.0 {
            return pt;
        }
        let (sin, cos) = angle.sin_cos();
        let dx = pt.x - self.center.x;
        let dy = pt.y - self.center.y;
        GeoPoint::new(
            self.center.x + dx * cos - dy * sin,
            self.center.y + dx * sin + dy * cos,
        )
    }

    /// Zoom level derived from the scale: the level whose 256-px tiles of
    /// the world bound are at least as fine as the current scale, biased
    /// by `extra_zoom`.
    pub fn zoom(&self) -> u8 {
        let world = self.extent_limit.unwrap_or(WORLD_BOUNDS);
        let tiles_across = world.width() * self.scale / TILE_SIZE_PX;
        let zoom = if tiles_across > 1.0 {
            tiles_across.log2().ceil() as i32
        } else {
            0
        };
        (zoom + self.extra_zoom).clamp(0, 30) as u8
    }

    /// Tiles of the world partition at `zoom` intersecting `extent`.
    ///
    /// Pure and restartable: recomputed per call with no side effects.
    /// With `unlimit_x` the x range extends past the world seam and each
    /// tile carries the wraparound shift in `cross_extent`; `reverse_y`
    /// flips the row numbering for tile schemes counting from the top.
    pub fn tiles_for_extent(
        &self,
        extent: &Envelope,
        zoom: u8,
        reverse_y: bool,
        unlimit_x: bool,
    ) -> Vec<TileItem> {
        let world = self.extent_limit.unwrap_or(WORLD_BOUNDS);
        let side = 1i64 << zoom;
        let tile_w = world.width() / side as f64;
        let tile_h = world.height() / side as f64;

        let mut begin_x = ((extent.min_x - world.min_x) / tile_w).floor() as i64;
        let mut end_x = ((extent.max_x - world.min_x) / tile_w).floor() as i64;
        if !unlimit_x {
            begin_x = begin_x.clamp(0, side - 1);
            end_x = end_x.clamp(0, side - 1);
        }
        let begin_y = (((extent.min_y - world.min_y) / tile_h).floor() as i64).clamp(0, side - 1);
        let end_y = (((extent.max_y - world.min_y) / tile_h).floor() as i64).clamp(0, side - 1);

        let mut tiles = Vec::new();
        for x in begin_x..=end_x {
            let cross_extent = x.div_euclid(side) as i32;
            let tile_x = x.rem_euclid(side);
            for y in begin_y..=end_y {
                let tile_y = if reverse_y { side - 1 - y } else { y };
                let shift = f64::from(cross_extent) * world.width();
                let env = Envelope::new(
                    world.min_x + x.rem_euclid(side) as f64 * tile_w + shift,
                    world.min_y + y as f64 * tile_h,
                    world.min_x + (x.rem_euclid(side) + 1) as f64 * tile_w + shift,
                    world.min_y + (y + 1) as f64 * tile_h,
                );
                tiles.push(TileItem {
                    x: tile_x,
                    y: tile_y,
                    z: zoom,
                    cross_extent,
                    env,
                });
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::{MapTransform, TileItem};
    use crate::model::geometry::{Envelope, GeoPoint};

    fn anchored_transform() -> MapTransform {
        let mut transform = MapTransform::new(640, 480);
        transform.set_display_size(640, 480, true);
        assert!(transform.set_extent(Envelope::new(-1560.0, -1420.0, 3560.0, 2420.0)));
        transform
    }

    #[test]
    fn extent_derives_scale() {
        let transform = anchored_transform();
        assert!((transform.scale() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn halving_extent_doubles_scale() {
        let mut transform = MapTransform::new(640, 480);
        transform.set_display_size(640, 480, true);
        transform.set_extent(Envelope::new(-780.0, -710.0, 1780.0, 1210.0));
        assert!((transform.scale() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn world_to_display_anchor_points() {
        let transform = anchored_transform();

        let corner = transform.world_to_display(GeoPoint::new(-1560.0, 2420.0));
        assert!(corner.x.abs() < 1e-9);
        assert!(corner.y.abs() < 1e-9);

        let origin = transform.world_to_display(GeoPoint::new(0.0, 0.0));
        assert!((origin.x - 195.0).abs() < 1e-9);
        assert!((origin.y - 302.5).abs() < 1e-9);
    }

    #[test]
    fn display_world_round_trip() {
        let transform = anchored_transform();
        for pt in [
            GeoPoint::new(-1560.0, -1420.0),
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1234.5, -987.25),
            GeoPoint::new(3560.0, 2420.0),
        ] {
            let back = transform.display_to_world(transform.world_to_display(pt));
            assert!((back.x - pt.x).abs() < 1e-9, "x mismatch for {pt:?}");
            assert!((back.y - pt.y).abs() < 1e-9, "y mismatch for {pt:?}");
        }
    }

    #[test]
    fn out_of_limit_scale_is_refused() {
        let mut transform = MapTransform::new(640, 480);
        transform.set_scale_limits(Some((0.1, 1.0)));
        let before = transform.scale();
        assert!(!transform.set_scale(5.0));
        assert!((transform.scale() - before).abs() < 1e-12);
        assert!(transform.set_scale(0.5));
    }

    #[test]
    fn out_of_limit_center_is_refused() {
        let mut transform = MapTransform::new(640, 480);
        transform.set_extent_limit(Some(Envelope::new(-10.0, -10.0, 10.0, 10.0)));
        assert!(!transform.set_center(100.0, 0.0));
        assert!(transform.set_center(5.0, 5.0));
    }

    #[test]
    fn tile_enumeration_covers_extent() {
        let mut transform = MapTransform::new(512, 512);
        transform.set_extent_limit(Some(Envelope::new(0.0, 0.0, 1024.0, 1024.0)));
        let tiles = transform.tiles_for_extent(
            &Envelope::new(0.0, 0.0, 1024.0, 1024.0),
            1,
            false,
            false,
        );
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|tile| tile.cross_extent == 0));
    }

    #[test]
    fn tile_enumeration_wraps_across_the_seam() {
        let mut transform = MapTransform::new(512, 512);
        transform.set_extent_limit(Some(Envelope::new(-180.0, -90.0, 180.0, 90.0)));
        // Query extends one world-width east of the seam.
        let tiles = transform.tiles_for_extent(
            &Envelope::new(100.0, -90.0, 260.0, 90.0),
            0,
            false,
            true,
        );
        let crossed: Vec<&TileItem> = tiles.iter().filter(|t| t.cross_extent == 1).collect();
        assert!(!crossed.is_empty());
        assert!(crossed.iter().all(|tile| tile.x == 0));
    }

    #[test]
    fn reverse_y_flips_row_numbering() {
        let mut transform = MapTransform::new(512, 512);
        transform.set_extent_limit(Some(Envelope::new(0.0, 0.0, 100.0, 100.0)));
        let bottom = Envelope::new(1.0, 1.0, 2.0, 2.0);
        let normal = transform.tiles_for_extent(&bottom, 2, false, false);
        let reversed = transform.tiles_for_extent(&bottom, 2, true, false);
        assert_eq!(normal[0].y, 0);
        assert_eq!(reversed[0].y, 3);
    }

    #[test]
    fn zoom_grows_with_scale_and_extra_zoom_biases() {
        let mut transform = MapTransform::new(640, 480);
        transform.set_extent_limit(Some(Envelope::new(0.0, 0.0, 4096.0, 4096.0)));
        transform.set_scale_and_center(0.25, 2048.0, 2048.0);
        let base = transform.zoom();
        transform.set_scale_and_center(0.5, 2048.0, 2048.0);
        assert!(transform.zoom() > base);

        transform.set_extra_zoom(2);
        let biased = transform.zoom();
        transform.set_extra_zoom(0);
        assert_eq!(biased, transform.zoom() + 2);
    }
}
