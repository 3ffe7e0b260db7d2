//! Registry of open maps keyed by small integer handles.
//!
//! # Responsibility
//! - Mediate all external access to map views through stable handles.
//!
//! # Invariants
//! - Handles are assigned monotonically and never reused within one
//!   registry, so a stale handle can never address a newer map.
//! - Change notifications fire synchronously at the mutation point.

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::map::view::MapView;
use crate::map::Map;
use crate::model::geometry::Envelope;
use crate::progress::{ChangeCode, NotifyFn};
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub type MapHandle = u32;

/// Process-local registry of open map views. Explicitly constructed;
/// there is no global instance.
pub struct MapStore {
    maps: HashMap<MapHandle, MapView>,
    next_handle: MapHandle,
    notify: Option<NotifyFn>,
}

impl MapStore {
    pub fn new() -> Self {
        Self {
            maps: HashMap::new(),
            next_handle: 1,
            notify: None,
        }
    }

    pub fn set_notify(&mut self, notify: NotifyFn) {
        self.notify = Some(notify);
    }

    pub fn unset_notify(&mut self) {
        self.notify = None;
    }

    fn notify(&self, uri: &str, code: ChangeCode) {
        if let Some(callback) = &self.notify {
            callback(uri, code);
        }
    }

    /// Creates a new map and returns its handle.
    pub fn create_map(
        &mut self,
        name: &str,
        description: &str,
        epsg: u32,
        bounds: Envelope,
        width: u32,
        height: u32,
    ) -> MapHandle {
        let view = MapView::new(Map::new(name, description, epsg, bounds), width, height);
        let handle = self.insert(view);
        info!(
            "event=map_create module=map status=ok handle={} name={}",
            handle, name
        );
        self.notify(name, ChangeCode::CreateObject);
        handle
    }

    /// Opens a persisted map document and returns its handle.
    pub fn open_map(
        &mut self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> CoreResult<MapHandle> {
        let map = Map::open(path.as_ref())?;
        let handle = self.insert(MapView::new(map, width, height));
        info!(
            "event=map_open module=map status=ok handle={} path={}",
            handle,
            path.as_ref().display()
        );
        Ok(handle)
    }

    fn insert(&mut self, view: MapView) -> MapHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.maps.insert(handle, view);
        handle
    }

    /// Saves the map behind `handle` to `path`.
    pub fn save_map(&mut self, handle: MapHandle, path: impl AsRef<Path>) -> CoreResult<PathBuf> {
        let view = self.maps.get_mut(&handle).ok_or_else(|| {
            CoreError::new(ErrorKind::NotFound, format!("no map with handle {handle}"))
        })?;
        let saved = view.map_mut().save(path)?;
        let name = view.map().name().to_string();
        self.notify(&name, ChangeCode::ChangeObject);
        Ok(saved)
    }

    /// Closes a map, dropping its view state.
    pub fn close_map(&mut self, handle: MapHandle) -> CoreResult<()> {
        let view = self.maps.remove(&handle).ok_or_else(|| {
            CoreError::new(ErrorKind::NotFound, format!("no map with handle {handle}"))
        })?;
        self.notify(view.map().name(), ChangeCode::DeleteObject);
        Ok(())
    }

    pub fn map_view(&self, handle: MapHandle) -> Option<&MapView> {
        self.maps.get(&handle)
    }

    pub fn map_view_mut(&mut self, handle: MapHandle) -> Option<&mut MapView> {
        self.maps.get_mut(&handle)
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    /// Frees all cached maps under memory pressure.
    pub fn on_low_memory(&mut self) {
        self.maps.clear();
    }
}

impl Default for MapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::MapStore;
    use crate::model::geometry::Envelope;

    fn bounds() -> Envelope {
        Envelope::new(-180.0, -90.0, 180.0, 90.0)
    }

    #[test]
    fn handles_are_monotonic_and_never_reused() {
        let mut store = MapStore::new();
        let first = store.create_map("a", "", 3857, bounds(), 640, 480);
        let second = store.create_map("b", "", 3857, bounds(), 640, 480);
        assert!(second > first);

        store.close_map(first).unwrap();
        let third = store.create_map("c", "", 3857, bounds(), 640, 480);
        assert!(third > second);
        assert!(store.map_view(first).is_none());
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut store = MapStore::new();
        let handle = store.create_map("a", "", 3857, bounds(), 640, 480);
        store.close_map(handle).unwrap();
        assert!(store.close_map(handle).is_err());
        assert!(store.save_map(handle, "/tmp/nope").is_err());
    }

    #[test]
    fn low_memory_clears_all_maps() {
        let mut store = MapStore::new();
        store.create_map("a", "", 3857, bounds(), 640, 480);
        store.create_map("b", "", 3857, bounds(), 640, 480);
        store.on_low_memory();
        assert_eq!(store.map_count(), 0);
    }
}
