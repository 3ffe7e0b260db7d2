//! Geometry model: envelopes, vertex addressing, hit-testing and editing.
//!
//! # Responsibility
//! - Define the closed set of geometry variants the store and map layers
//!   operate on.
//! - Provide the vertex-level operations used by the edit overlay:
//!   tolerance hit-testing with continuity bias, shift/insert/delete of
//!   vertices, add/delete of multi-geometry parts.
//!
//! # Invariants
//! - Polygon rings do not repeat the closing vertex; a valid ring has at
//!   least 3 points, a valid line at least 2.
//! - Mutating operations refuse (return `None`) instead of producing a
//!   structurally invalid geometry.

use serde::{Deserialize, Serialize};

/// A position in map/world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds a tolerance rectangle centered on `center` with the given
    /// half-extents.
    pub fn around(center: GeoPoint, half_x: f64, half_y: f64) -> Self {
        Self {
            min_x: center.x - half_x,
            min_y: center.y - half_y,
            max_x: center.x + half_x,
            max_y: center.y + half_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.max_x > self.min_x && self.max_y > self.min_y
    }

    pub fn contains(&self, pt: GeoPoint) -> bool {
        pt.x >= self.min_x && pt.x <= self.max_x && pt.y >= self.min_y && pt.y <= self.max_y
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grows this envelope to include `pt`.
    pub fn merge_point(&mut self, pt: GeoPoint) {
        self.min_x = self.min_x.min(pt.x);
        self.min_y = self.min_y.min(pt.y);
        self.max_x = self.max_x.max(pt.x);
        self.max_y = self.max_y.max(pt.y);
    }

    pub fn merge(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }
}

/// Closed set of geometry variants supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::LineString => "line_string",
            Self::Polygon => "polygon",
            Self::MultiPoint => "multi_point",
            Self::MultiLineString => "multi_line_string",
            Self::MultiPolygon => "multi_polygon",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "point" => Some(Self::Point),
            "line_string" => Some(Self::LineString),
            "polygon" => Some(Self::Polygon),
            "multi_point" => Some(Self::MultiPoint),
            "multi_line_string" => Some(Self::MultiLineString),
            "multi_polygon" => Some(Self::MultiPolygon),
            _ => None,
        }
    }
}

/// A polygon ring; ring 0 of a polygon is the exterior ring.
pub type Ring = Vec<GeoPoint>;

/// Geometry value owned by a feature or by the edit overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates", rename_all = "snake_case")]
pub enum Geometry {
    Point(GeoPoint),
    LineString(Vec<GeoPoint>),
    Polygon(Vec<Ring>),
    MultiPoint(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// Address of one vertex inside a (possibly multi-part, possibly ringed)
/// geometry. Fields that do not apply to a variant stay 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointId {
    /// Sub-geometry index for multi variants.
    pub geometry: usize,
    /// Ring index for polygons; 0 is the exterior ring.
    pub ring: usize,
    /// Vertex index within the ring/line.
    pub point: usize,
}

impl PointId {
    pub fn new(geometry: usize, ring: usize, point: usize) -> Self {
        Self {
            geometry,
            ring,
            point,
        }
    }
}

/// Outcome of a tolerance hit-test.
///
/// `Region` reports "this sub-geometry contains the hit area but no vertex
/// lies within tolerance"; callers must distinguish it from an exact
/// `Vertex` match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitResult {
    NoMatch,
    Region { geometry: usize, ring: usize },
    Vertex { id: PointId, coordinates: GeoPoint },
}

impl HitResult {
    pub fn is_vertex(&self) -> bool {
        matches!(self, Self::Vertex { .. })
    }

    /// True for both vertex and region matches.
    pub fn intersects(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// Result of deleting a multi-geometry part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartDeleted {
    /// Parts remain; the returned id is the suggested new selection.
    Remaining(PointId),
    /// The last part was removed; the geometry is now empty.
    Emptied,
}

const MIN_LINE_POINTS: usize = 2;
const MIN_RING_POINTS: usize = 3;

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Self::Point(_) => GeometryType::Point,
            Self::LineString(_) => GeometryType::LineString,
            Self::Polygon(_) => GeometryType::Polygon,
            Self::MultiPoint(_) => GeometryType::MultiPoint,
            Self::MultiLineString(_) => GeometryType::MultiLineString,
            Self::MultiPolygon(_) => GeometryType::MultiPolygon,
        }
    }

    /// Creates the template geometry seeded when editing starts on an
    /// empty feature: centered on `center`, sized by `half` map units.
    pub fn template(kind: GeometryType, center: GeoPoint, half: GeoPoint) -> Self {
        let lo = GeoPoint::new(center.x - half.x, center.y - half.y);
        let hi = GeoPoint::new(center.x + half.x, center.y + half.y);
        let triangle = vec![
            lo,
            GeoPoint::new(hi.x, lo.y),
            GeoPoint::new(center.x, hi.y),
        ];
        match kind {
            GeometryType::Point => Self::Point(center),
            GeometryType::LineString => Self::LineString(vec![lo, hi]),
            GeometryType::Polygon => Self::Polygon(vec![triangle]),
            GeometryType::MultiPoint => Self::MultiPoint(vec![center]),
            GeometryType::MultiLineString => Self::MultiLineString(vec![vec![lo, hi]]),
            GeometryType::MultiPolygon => Self::MultiPolygon(vec![vec![triangle]]),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(_) => false,
            Self::LineString(points) => points.is_empty(),
            Self::Polygon(rings) => rings.is_empty(),
            Self::MultiPoint(points) => points.is_empty(),
            Self::MultiLineString(lines) => lines.is_empty(),
            Self::MultiPolygon(polygons) => polygons.is_empty(),
        }
    }

    pub fn envelope(&self) -> Option<Envelope> {
        let mut env: Option<Envelope> = None;
        self.for_each_vertex(&mut |pt| match env.as_mut() {
            Some(env) => env.merge_point(pt),
            None => env = Some(Envelope::new(pt.x, pt.y, pt.x, pt.y)),
        });
        env
    }

    fn for_each_vertex(&self, visit: &mut dyn FnMut(GeoPoint)) {
        match self {
            Self::Point(pt) => visit(*pt),
            Self::LineString(points) | Self::MultiPoint(points) => {
                points.iter().copied().for_each(visit)
            }
            Self::Polygon(rings) | Self::MultiLineString(rings) => {
                rings.iter().flatten().copied().for_each(visit)
            }
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .flatten()
                .copied()
                .for_each(visit),
        }
    }

    /// Returns the address and coordinates of the first vertex, if any.
    pub fn first_vertex(&self) -> Option<(PointId, GeoPoint)> {
        let id = PointId::default();
        self.vertex(id).map(|pt| (id, pt))
    }

    /// Looks up the vertex addressed by `id`.
    pub fn vertex(&self, id: PointId) -> Option<GeoPoint> {
        match self {
            Self::Point(pt) => (id.point == 0).then_some(*pt),
            Self::LineString(points) => points.get(id.point).copied(),
            Self::Polygon(rings) => rings.get(id.ring)?.get(id.point).copied(),
            Self::MultiPoint(points) => (id.point == 0)
                .then(|| points.get(id.geometry).copied())
                .flatten(),
            Self::MultiLineString(lines) => lines.get(id.geometry)?.get(id.point).copied(),
            Self::MultiPolygon(polygons) => polygons
                .get(id.geometry)?
                .get(id.ring)?
                .get(id.point)
                .copied(),
        }
    }

    /// Moves the addressed vertex by `offset`; returns the new coordinates.
    pub fn shift_vertex(&mut self, id: PointId, offset: GeoPoint) -> Option<GeoPoint> {
        let target = match self {
            Self::Point(pt) => (id.point == 0).then_some(pt),
            Self::LineString(points) => points.get_mut(id.point),
            Self::Polygon(rings) => rings.get_mut(id.ring)?.get_mut(id.point),
            Self::MultiPoint(points) => {
                (id.point == 0).then(|| points.get_mut(id.geometry)).flatten()
            }
            Self::MultiLineString(lines) => lines.get_mut(id.geometry)?.get_mut(id.point),
            Self::MultiPolygon(polygons) => polygons
                .get_mut(id.geometry)?
                .get_mut(id.ring)?
                .get_mut(id.point),
        }?;
        target.x += offset.x;
        target.y += offset.y;
        Some(*target)
    }

    /// Inserts `pt` after the addressed vertex; returns the new vertex id.
    ///
    /// Refused for point-like variants which have no insertable sequence.
    pub fn insert_vertex_after(&mut self, id: PointId, pt: GeoPoint) -> Option<PointId> {
        let points = match self {
            Self::Point(_) | Self::MultiPoint(_) => return None,
            Self::LineString(points) => points,
            Self::Polygon(rings) => rings.get_mut(id.ring)?,
            Self::MultiLineString(lines) => lines.get_mut(id.geometry)?,
            Self::MultiPolygon(polygons) => polygons.get_mut(id.geometry)?.get_mut(id.ring)?,
        };
        if id.point >= points.len() {
            return None;
        }
        points.insert(id.point + 1, pt);
        Some(PointId::new(id.geometry, id.ring, id.point + 1))
    }

    /// Deletes the addressed vertex; returns the suggested new selection.
    ///
    /// Refused when deletion would drop a line below 2 points or a ring
    /// below 3 points, and for point-like variants (delete the part
    /// instead).
    pub fn delete_vertex(&mut self, id: PointId) -> Option<PointId> {
        let (points, minimum) = match self {
            Self::Point(_) | Self::MultiPoint(_) => return None,
            Self::LineString(points) => (points, MIN_LINE_POINTS),
            Self::Polygon(rings) => (rings.get_mut(id.ring)?, MIN_RING_POINTS),
            Self::MultiLineString(lines) => (lines.get_mut(id.geometry)?, MIN_LINE_POINTS),
            Self::MultiPolygon(polygons) => (
                polygons.get_mut(id.geometry)?.get_mut(id.ring)?,
                MIN_RING_POINTS,
            ),
        };
        if id.point >= points.len() || points.len() <= minimum {
            return None;
        }
        points.remove(id.point);
        let new_point = id.point.saturating_sub(1);
        Some(PointId::new(id.geometry, id.ring, new_point))
    }

    /// Appends a template part to a multi-geometry; returns the id of the
    /// new part's first vertex. Refused for single-part variants.
    pub fn add_part(&mut self, center: GeoPoint, half: GeoPoint) -> Option<PointId> {
        let lo = GeoPoint::new(center.x - half.x, center.y - half.y);
        let hi = GeoPoint::new(center.x + half.x, center.y + half.y);
        match self {
            Self::MultiPoint(points) => {
                points.push(center);
                Some(PointId::new(points.len() - 1, 0, 0))
            }
            Self::MultiLineString(lines) => {
                lines.push(vec![lo, hi]);
                Some(PointId::new(lines.len() - 1, 0, 0))
            }
            Self::MultiPolygon(polygons) => {
                polygons.push(vec![vec![
                    lo,
                    GeoPoint::new(hi.x, lo.y),
                    GeoPoint::new(center.x, hi.y),
                ]]);
                Some(PointId::new(polygons.len() - 1, 0, 0))
            }
            _ => None,
        }
    }

    /// Removes one part of a multi-geometry.
    ///
    /// Deleting the only remaining part leaves the collection empty and
    /// reports `Emptied` so the caller can treat the geometry as gone.
    pub fn delete_part(&mut self, geometry_id: usize) -> Option<PartDeleted> {
        let remaining = match self {
            Self::MultiPoint(points) => {
                if geometry_id >= points.len() {
                    return None;
                }
                points.remove(geometry_id);
                points.len()
            }
            Self::MultiLineString(lines) => {
                if geometry_id >= lines.len() {
                    return None;
                }
                lines.remove(geometry_id);
                lines.len()
            }
            Self::MultiPolygon(polygons) => {
                if geometry_id >= polygons.len() {
                    return None;
                }
                polygons.remove(geometry_id);
                polygons.len()
            }
            _ => return None,
        };
        if remaining == 0 {
            Some(PartDeleted::Emptied)
        } else {
            Some(PartDeleted::Remaining(PointId::new(remaining - 1, 0, 0)))
        }
    }

    /// Tolerance hit-test with continuity bias.
    ///
    /// The vertex search starts at the previously selected index given by
    /// `hint` and wraps around, so repeated taps near a cluster of close
    /// vertices stay on the last selected one. A polygon's ring search
    /// prefers the hinted ring, then falls back to exterior-then-interior
    /// order; multi variants prefer the hinted sub-geometry first.
    pub fn hit_test(&self, env: &Envelope, hint: Option<PointId>) -> HitResult {
        match self {
            Self::Point(pt) => {
                if env.contains(*pt) {
                    HitResult::Vertex {
                        id: PointId::default(),
                        coordinates: *pt,
                    }
                } else {
                    HitResult::NoMatch
                }
            }
            Self::LineString(points) => {
                line_hit(points, env, hint.map(|id| id.point), 0, 0)
            }
            Self::Polygon(rings) => polygon_hit(rings, env, hint, 0),
            Self::MultiPoint(points) => {
                let start = hint.map_or(0, |id| id.geometry);
                for index in wrapped_indices(points.len(), start) {
                    if env.contains(points[index]) {
                        return HitResult::Vertex {
                            id: PointId::new(index, 0, 0),
                            coordinates: points[index],
                        };
                    }
                }
                HitResult::NoMatch
            }
            Self::MultiLineString(lines) => {
                let start = hint.map_or(0, |id| id.geometry);
                let mut region = HitResult::NoMatch;
                for index in wrapped_indices(lines.len(), start) {
                    let line_hint =
                        hint.filter(|id| id.geometry == index).map(|id| id.point);
                    match line_hit(&lines[index], env, line_hint, index, 0) {
                        HitResult::Vertex { id, coordinates } => {
                            return HitResult::Vertex { id, coordinates }
                        }
                        HitResult::Region { .. } if region == HitResult::NoMatch => {
                            region = HitResult::Region {
                                geometry: index,
                                ring: 0,
                            };
                        }
                        _ => {}
                    }
                }
                region
            }
            Self::MultiPolygon(polygons) => {
                let start = hint.map_or(0, |id| id.geometry);
                let mut region = HitResult::NoMatch;
                for index in wrapped_indices(polygons.len(), start) {
                    let part_hint = hint.filter(|id| id.geometry == index);
                    match polygon_hit(&polygons[index], env, part_hint, index) {
                        HitResult::Vertex { id, coordinates } => {
                            return HitResult::Vertex { id, coordinates }
                        }
                        HitResult::Region { ring, .. } if region == HitResult::NoMatch => {
                            region = HitResult::Region {
                                geometry: index,
                                ring,
                            };
                        }
                        _ => {}
                    }
                }
                region
            }
        }
    }
}

/// Yields `start, start+1, …, len-1, 0, …, start-1`.
fn wrapped_indices(len: usize, start: usize) -> impl Iterator<Item = usize> {
    let start = if len == 0 { 0 } else { start.min(len - 1) };
    (0..len).map(move |offset| (start + offset) % len)
}

fn line_hit(
    points: &[GeoPoint],
    env: &Envelope,
    hint: Option<usize>,
    geometry: usize,
    ring: usize,
) -> HitResult {
    for index in wrapped_indices(points.len(), hint.unwrap_or(0)) {
        if env.contains(points[index]) {
            return HitResult::Vertex {
                id: PointId::new(geometry, ring, index),
                coordinates: points[index],
            };
        }
    }
    if line_intersects(points, env, false) {
        HitResult::Region { geometry, ring }
    } else {
        HitResult::NoMatch
    }
}

fn polygon_hit(
    rings: &[Ring],
    env: &Envelope,
    hint: Option<PointId>,
    geometry: usize,
) -> HitResult {
    let start_ring = hint.map_or(0, |id| id.ring);
    for ring_index in wrapped_indices(rings.len(), start_ring) {
        let ring_hint = hint.filter(|id| id.ring == ring_index).map(|id| id.point);
        for index in wrapped_indices(rings[ring_index].len(), ring_hint.unwrap_or(0)) {
            if env.contains(rings[ring_index][index]) {
                return HitResult::Vertex {
                    id: PointId::new(geometry, ring_index, index),
                    coordinates: rings[ring_index][index],
                };
            }
        }
    }
    for (ring_index, ring) in rings.iter().enumerate() {
        if line_intersects(ring, env, true) {
            return HitResult::Region {
                geometry,
                ring: ring_index,
            };
        }
    }
    if let Some(exterior) = rings.first() {
        if point_in_ring(env.center(), exterior) {
            return HitResult::Region { geometry, ring: 0 };
        }
    }
    HitResult::NoMatch
}

/// True when any segment of the polyline crosses or enters `env`.
fn line_intersects(points: &[GeoPoint], env: &Envelope, closed: bool) -> bool {
    if points.len() < 2 {
        return points.first().is_some_and(|pt| env.contains(*pt));
    }
    let mut segments: Vec<(GeoPoint, GeoPoint)> =
        points.windows(2).map(|pair| (pair[0], pair[1])).collect();
    if closed {
        segments.push((points[points.len() - 1], points[0]));
    }
    segments
        .iter()
        .any(|(a, b)| segment_intersects_env(*a, *b, env))
}

fn segment_intersects_env(a: GeoPoint, b: GeoPoint, env: &Envelope) -> bool {
    if env.contains(a) || env.contains(b) {
        return true;
    }
    let corners = [
        GeoPoint::new(env.min_x, env.min_y),
        GeoPoint::new(env.max_x, env.min_y),
        GeoPoint::new(env.max_x, env.max_y),
        GeoPoint::new(env.min_x, env.max_y),
    ];
    (0..4).any(|i| segments_cross(a, b, corners[i], corners[(i + 1) % 4]))
}

fn segments_cross(p1: GeoPoint, p2: GeoPoint, p3: GeoPoint, p4: GeoPoint) -> bool {
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);
    (d1 * d2 < 0.0) && (d3 * d4 < 0.0)
}

fn cross(a: GeoPoint, b: GeoPoint, c: GeoPoint) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Ray-cast point-in-ring test; the ring is treated as closed.
fn point_in_ring(pt: GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < MIN_RING_POINTS {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > pt.y) != (pj.y > pt.y)
            && pt.x < (pj.x - pi.x) * (pt.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
