//! Feature class: a table with geometry, projection and overview support.
//!
//! # Responsibility
//! - Add geometry-column metadata and the zoom-level overview cache on top
//!   of plain table access.
//!
//! # Invariants
//! - Opening a table without a geometry column as a feature class fails
//!   with `Unsupported`.
//! - Overview samples are a cache keyed by zoom level; they are derived
//!   data and can be rebuilt at any time.

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::model::geometry::{Envelope, GeometryType};
use crate::progress::{Progress, ProgressStatus};
use crate::store::datastore::DataStore;
use crate::store::table::Table;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;

const GEOMETRY_TYPE_KEY: &str = "geometry_type";
const EPSG_KEY: &str = "epsg";
const ZOOM_LEVELS_KEY: &str = "zoom_levels";

/// A spatial table; derefs to [`Table`] for row access.
#[derive(Debug)]
pub struct FeatureClass<'a> {
    table: Table<'a>,
    geometry_type: GeometryType,
    epsg: u32,
    zoom_levels: Vec<u8>,
    overviews: RefCell<HashMap<u8, Vec<i64>>>,
}

impl<'a> FeatureClass<'a> {
    pub(crate) fn open(store: &'a DataStore, name: &str) -> CoreResult<FeatureClass<'a>> {
        let table = Table::open(store, name)?;
        if !table.has_geometry() {
            return Err(CoreError::new(
                ErrorKind::Unsupported,
                format!("table `{name}` has no geometry column"),
            ));
        }
        let geometry_type = GeometryType::parse(&table.property(GEOMETRY_TYPE_KEY, "")?)
            .ok_or_else(|| {
                CoreError::new(
                    ErrorKind::OpenFailed,
                    format!("table `{name}` has no geometry type recorded"),
                )
            })?;
        let epsg = table.property(EPSG_KEY, "0")?.parse().unwrap_or(0);
        let zoom_levels = parse_zoom_levels(&table.property(ZOOM_LEVELS_KEY, "")?);
        Ok(FeatureClass {
            table,
            geometry_type,
            epsg,
            zoom_levels,
            overviews: RefCell::new(HashMap::new()),
        })
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn zoom_levels(&self) -> &[u8] {
        &self.zoom_levels
    }

    /// Persists the zoom levels used by overview generation.
    pub fn set_zoom_levels(&mut self, levels: &[u8]) -> CoreResult<()> {
        let encoded: Vec<String> = levels.iter().map(|z| z.to_string()).collect();
        self.table.set_property(ZOOM_LEVELS_KEY, &encoded.join(","))?;
        self.zoom_levels = levels.to_vec();
        self.overviews.borrow_mut().clear();
        Ok(())
    }

    /// Combined envelope of all feature geometries, `None` for an empty
    /// class.
    pub fn extent(&self) -> CoreResult<Option<Envelope>> {
        let mut extent: Option<Envelope> = None;
        for feature in self.table.features()? {
            if let Some(env) = feature.geometry.as_ref().and_then(|g| g.envelope()) {
                match extent.as_mut() {
                    Some(extent) => extent.merge(&env),
                    None => extent = Some(env),
                }
            }
        }
        Ok(extent)
    }

    /// Rebuilds the overview cache: for each configured zoom level a
    /// decimated sample of feature ids, coarser zooms keeping fewer
    /// features. Cancellation is checked per zoom level.
    pub fn build_overviews(&self, progress: &Progress) -> CoreResult<()> {
        let ids: Vec<i64> = self.table.features()?.iter().map(|f| f.id).collect();
        let max_zoom = self.zoom_levels.iter().copied().max().unwrap_or(0);
        let total = self.zoom_levels.len() as f64;

        let mut cache = self.overviews.borrow_mut();
        cache.clear();
        for (index, zoom) in self.zoom_levels.iter().copied().enumerate() {
            if !progress.on_progress(
                ProgressStatus::InProcess,
                index as f64 / total.max(1.0),
                &format!("building overview for zoom {zoom}"),
            ) {
                cache.clear();
                return Err(CoreError::new(ErrorKind::Canceled, "overview build canceled"));
            }
            let step = 1usize << (max_zoom - zoom).min(31);
            cache.insert(zoom, ids.iter().copied().step_by(step.max(1)).collect());
        }
        progress.on_progress(ProgressStatus::Finished, 1.0, "overviews ready");
        Ok(())
    }

    /// Sampled feature ids for one zoom level, when built.
    pub fn overview_samples(&self, zoom: u8) -> Option<Vec<i64>> {
        self.overviews.borrow().get(&zoom).cloned()
    }
}

impl<'a> Deref for FeatureClass<'a> {
    type Target = Table<'a>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

fn parse_zoom_levels(encoded: &str) -> Vec<u8> {
    encoded
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
