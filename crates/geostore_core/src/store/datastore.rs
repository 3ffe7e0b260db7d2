//! Data store bootstrap, schema versioning and shared-handle discipline.
//!
//! # Responsibility
//! - Open/create the physical store file, apply fail-closed schema
//!   upgrades, manage the sibling blob folder.
//! - Gate raw SQL execution behind a re-entrant scoped guard and expose
//!   the reference-counted journal toggle for bulk loads.
//!
//! # Invariants
//! - A store handle is only returned after its schema version matches the
//!   library version; a failed upgrade aborts `open` with no handle leaked.
//! - The journal counter and SQL guard assume single-writer-thread
//!   discipline; they are not atomic.

use crate::error::{sql_error, CoreError, CoreResult, ErrorKind};
use crate::model::feature::{Field, FieldType};
use crate::model::geometry::GeometryType;
use crate::progress::{ChangeCode, NotifyFn, Progress, ProgressStatus};
use crate::store::featureclass::FeatureClass;
use crate::store::table::Table;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File extension of store container files.
pub const STORE_EXT: &str = "gst";
/// Prefix reserved for internal bookkeeping tables.
pub(crate) const RESERVED_PREFIX: &str = "gst_";
pub(crate) const ATTACH_TABLE_PREFIX: &str = "gst_attach_";

/// Synthetic columns present on every store table, reserved for the
/// engine: row id, remote id and the geometry blob.
pub(crate) const FID_COLUMN: &str = "fid";
pub(crate) const REMOTE_ID_COLUMN: &str = "rid";
pub(crate) const GEOMETRY_COLUMN: &str = "geom";

const VERSION_KEY: &str = "version";
const GEOMETRY_TYPE_KEY: &str = "geometry_type";
const EPSG_KEY: &str = "epsg";

/// One schema upgrade step; steps are registered in strictly increasing
/// version order and applied atomically.
#[derive(Clone, Copy)]
pub struct Upgrade {
    pub version: u32,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

fn upgrade_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE gst_meta (
            tbl TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT,
            PRIMARY KEY (tbl, key)
        );",
    )
}

fn upgrade_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE INDEX IF NOT EXISTS gst_meta_tbl ON gst_meta (tbl);")
}

const UPGRADES: &[Upgrade] = &[
    Upgrade {
        version: 1,
        apply: upgrade_v1,
    },
    Upgrade {
        version: 2,
        apply: upgrade_v2,
    },
];

/// Latest schema version known by this build.
pub fn latest_version() -> u32 {
    UPGRADES.last().map_or(0, |upgrade| upgrade.version)
}

/// The embedded transactional spatial data store.
///
/// Owns the backing connection exclusively; `Table`/`FeatureClass`
/// children borrow it and must not outlive the store.
pub struct DataStore {
    conn: Connection,
    path: PathBuf,
    data_path: PathBuf,
    journal_off: Cell<u8>,
    sql_lock_depth: Cell<u32>,
    notify: RefCell<Option<NotifyFn>>,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("path", &self.path)
            .field("data_path", &self.data_path)
            .field("journal_off", &self.journal_off)
            .field("sql_lock_depth", &self.sql_lock_depth)
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Creates a new store file, its system tables and the sibling data
    /// folder, and records the current schema version.
    pub fn create(path: impl AsRef<Path>) -> CoreResult<DataStore> {
        let path = path.as_ref();
        let started_at = Instant::now();
        if path.as_os_str().is_empty() {
            return Err(CoreError::new(ErrorKind::CreateFailed, "path not specified"));
        }
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|err| {
                    CoreError::new(
                        ErrorKind::CreateFailed,
                        format!("create store directory failed: {err}"),
                    )
                })?;
            }
        }

        let conn = Connection::open(path).map_err(sql_error(ErrorKind::CreateFailed))?;
        bootstrap_connection(&conn).map_err(sql_error(ErrorKind::CreateFailed))?;
        apply_upgrades(&conn, 0, UPGRADES).map_err(sql_error(ErrorKind::CreateFailed))?;

        let data_path = derived_data_path(path);
        if !data_path.exists() {
            std::fs::create_dir_all(&data_path).map_err(|err| {
                CoreError::new(
                    ErrorKind::CreateFailed,
                    format!("create data folder failed: {err}"),
                )
            })?;
        }

        info!(
            "event=store_create module=store status=ok path={} version={} duration_ms={}",
            path.display(),
            latest_version(),
            started_at.elapsed().as_millis()
        );
        Ok(Self::assemble(conn, path.to_path_buf(), data_path))
    }

    /// Opens an existing store, upgrading its schema when it is older than
    /// this build. Upgrades are fail-closed: any failure aborts the open.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<DataStore> {
        Self::open_with_upgrades(path, UPGRADES)
    }

    /// As [`DataStore::open`], with an explicit upgrade registry. Exposed
    /// so upgrade failure handling stays testable.
    pub fn open_with_upgrades(
        path: impl AsRef<Path>,
        upgrades: &[Upgrade],
    ) -> CoreResult<DataStore> {
        let path = path.as_ref();
        let started_at = Instant::now();
        if path.as_os_str().is_empty() {
            return Err(CoreError::new(ErrorKind::OpenFailed, "path not specified"));
        }
        if !path.is_file() {
            return Err(CoreError::new(
                ErrorKind::OpenFailed,
                format!("no store at `{}`", path.display()),
            ));
        }

        let conn = Connection::open(path).map_err(sql_error(ErrorKind::OpenFailed))?;
        bootstrap_connection(&conn).map_err(sql_error(ErrorKind::OpenFailed))?;

        let stored = stored_version(&conn).ok_or_else(|| {
            CoreError::new(
                ErrorKind::OpenFailed,
                format!("`{}` has no store metadata", path.display()),
            )
        })?;
        let latest = upgrades.last().map_or(0, |upgrade| upgrade.version);
        if stored > latest {
            return Err(CoreError::new(
                ErrorKind::OpenFailed,
                format!("store version {stored} is newer than supported {latest}"),
            ));
        }
        if stored < latest {
            apply_upgrades(&conn, stored, upgrades).map_err(|err| {
                CoreError::new(
                    ErrorKind::OpenFailed,
                    format!("store upgrade from version {stored} failed: {err}"),
                )
            })?;
            info!(
                "event=store_upgrade module=store status=ok path={} from={} to={}",
                path.display(),
                stored,
                latest
            );
        }

        let data_path = derived_data_path(path);
        info!(
            "event=store_open module=store status=ok path={} duration_ms={}",
            path.display(),
            started_at.elapsed().as_millis()
        );
        Ok(Self::assemble(conn, path.to_path_buf(), data_path))
    }

    /// Opens the store at `path`, creating it first when absent.
    pub fn open_or_create(path: impl AsRef<Path>) -> CoreResult<DataStore> {
        let path = path.as_ref();
        if path.is_file() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Creates an in-memory store for tests and scratch work. In-memory
    /// stores have no data folder, so attachment blobs are unavailable.
    pub fn create_in_memory() -> CoreResult<DataStore> {
        let conn = Connection::open_in_memory().map_err(sql_error(ErrorKind::CreateFailed))?;
        bootstrap_connection(&conn).map_err(sql_error(ErrorKind::CreateFailed))?;
        apply_upgrades(&conn, 0, UPGRADES).map_err(sql_error(ErrorKind::CreateFailed))?;
        Ok(Self::assemble(conn, PathBuf::new(), PathBuf::new()))
    }

    fn assemble(conn: Connection, path: PathBuf, data_path: PathBuf) -> DataStore {
        DataStore {
            conn,
            path,
            data_path,
            journal_off: Cell::new(0),
            sql_lock_depth: Cell::new(0),
            notify: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling folder holding attachment blobs; empty for in-memory
    /// stores.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Registers the change-notification callback invoked synchronously at
    /// mutation points.
    pub fn set_notify(&self, notify: NotifyFn) {
        *self.notify.borrow_mut() = Some(notify);
    }

    pub fn unset_notify(&self) {
        *self.notify.borrow_mut() = None;
    }

    pub(crate) fn notify(&self, uri: &str, code: ChangeCode) {
        if let Some(callback) = self.notify.borrow().as_ref() {
            callback(uri, code);
        }
    }

    pub(crate) fn store_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "memory".to_string())
    }

    /// Takes the re-entrant scoped guard serializing raw statement
    /// execution against the shared handle.
    pub fn lock_sql(&self) -> SqlLockGuard<'_> {
        self.sql_lock_depth.set(self.sql_lock_depth.get() + 1);
        SqlLockGuard { store: self }
    }

    /// Executes one raw SQL statement under the execution guard.
    pub fn execute_sql(&self, statement: &str) -> CoreResult<usize> {
        let _guard = self.lock_sql();
        self.conn
            .execute(statement, [])
            .map_err(sql_error(ErrorKind::InvalidArgument))
    }

    /// Reference-counted durability toggle for bulk loads.
    ///
    /// `enable_journal(false)` increments the disable counter and turns
    /// durability pragmas off on the 0→1 transition; `enable_journal(true)`
    /// decrements and restores them on the 1→0 transition, so nested bulk
    /// regions share one journal-off window.
    pub fn enable_journal(&self, enable: bool) -> CoreResult<()> {
        let current = self.journal_off.get();
        if enable {
            if current == 0 {
                warn!("event=journal_enable module=store status=noop counter=0");
                return Ok(());
            }
            self.journal_off.set(current - 1);
            if current == 1 {
                self.set_durability(true)?;
            }
        } else {
            if current == u8::MAX {
                return Err(CoreError::new(
                    ErrorKind::InvalidArgument,
                    "too many nested journal-disable requests",
                ));
            }
            self.journal_off.set(current + 1);
            if current == 0 {
                self.set_durability(false)?;
            }
        }
        Ok(())
    }

    /// True when durability pragmas are active (no bulk load in flight).
    pub fn is_journal_enabled(&self) -> bool {
        self.journal_off.get() == 0
    }

    fn set_durability(&self, durable: bool) -> CoreResult<()> {
        let (sync, journal) = if durable {
            ("FULL", "DELETE")
        } else {
            ("OFF", "MEMORY")
        };
        self.conn
            .pragma_update(None, "synchronous", sync)
            .map_err(sql_error(ErrorKind::InvalidArgument))?;
        // journal_mode reports the new mode as a result row.
        self.conn
            .query_row(&format!("PRAGMA journal_mode = {journal}"), [], |_| Ok(()))
            .map_err(sql_error(ErrorKind::InvalidArgument))?;
        Ok(())
    }

    /// Lists user tables, skipping internal bookkeeping tables.
    pub fn table_names(&self) -> CoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table'
                   AND name NOT LIKE 'gst\\_%' ESCAPE '\\'
                   AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
                 ORDER BY name;",
            )
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt.query([]).map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            names.push(row.get(0).map_err(sql_error(ErrorKind::OpenFailed))?);
        }
        Ok(names)
    }

    /// Validates a candidate table/feature-class name.
    ///
    /// Rejected: empty or malformed names (separators included), names
    /// under the reserved `gst_`/engine prefixes and case-insensitive
    /// collisions with existing tables.
    pub fn is_name_valid(&self, name: &str) -> CoreResult<()> {
        static NAME_RE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static pattern"));

        if name.is_empty() {
            return Err(CoreError::new(ErrorKind::InvalidArgument, "name is empty"));
        }
        if !NAME_RE.is_match(name) {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                format!("name `{name}` contains unsupported characters"),
            ));
        }
        let lower = name.to_ascii_lowercase();
        if lower.starts_with(RESERVED_PREFIX) || lower.starts_with("sqlite_") {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                format!("name `{name}` uses a reserved prefix"),
            ));
        }
        for existing in self.table_names()? {
            if existing.eq_ignore_ascii_case(name) {
                return Err(CoreError::new(
                    ErrorKind::InvalidArgument,
                    format!("name `{name}` already exists"),
                ));
            }
        }
        Ok(())
    }

    /// Creates an attribute-only table. Returns the field descriptors as
    /// stored, with any normalization applied.
    pub fn create_table(
        &self,
        name: &str,
        fields: &[Field],
        progress: &Progress,
    ) -> CoreResult<Vec<Field>> {
        self.create_table_inner(name, fields, None, progress)
    }

    /// Creates a feature class: a table with a geometry column of the
    /// given type and projection.
    pub fn create_feature_class(
        &self,
        name: &str,
        fields: &[Field],
        geometry_type: GeometryType,
        epsg: u32,
        progress: &Progress,
    ) -> CoreResult<Vec<Field>> {
        self.create_table_inner(name, fields, Some((geometry_type, epsg)), progress)
    }

    fn create_table_inner(
        &self,
        name: &str,
        fields: &[Field],
        geometry: Option<(GeometryType, u32)>,
        progress: &Progress,
    ) -> CoreResult<Vec<Field>> {
        self.is_name_valid(name)?;

        let stored_fields = normalize_fields(name, fields, progress);
        let mut columns = vec![
            format!("\"{FID_COLUMN}\" INTEGER PRIMARY KEY AUTOINCREMENT"),
            format!("\"{REMOTE_ID_COLUMN}\" INTEGER NOT NULL DEFAULT -1"),
        ];
        for field in &stored_fields {
            columns.push(format!(
                "\"{}\" {}",
                field.name,
                field.field_type.sql_type()
            ));
        }
        if geometry.is_some() {
            columns.push(format!("\"{GEOMETRY_COLUMN}\" BLOB"));
        }

        let sql = format!("CREATE TABLE \"{name}\" ({});", columns.join(", "));
        self.conn
            .execute_batch(&sql)
            .map_err(sql_error(ErrorKind::CreateFailed))?;

        for (index, field) in stored_fields.iter().enumerate() {
            self.set_property(name, &format!("FIELD_{index}_ALIAS"), &field.alias)?;
            self.set_property(name, &format!("FIELD_{index}_NAME"), &field.original_name)?;
        }
        if let Some((geometry_type, epsg)) = geometry {
            self.set_property(name, GEOMETRY_TYPE_KEY, geometry_type.as_str())?;
            self.set_property(name, EPSG_KEY, &epsg.to_string())?;
        }

        info!(
            "event=table_create module=store status=ok table={} fields={} spatial={}",
            name,
            stored_fields.len(),
            geometry.is_some()
        );
        self.notify(
            &format!("{}/{}", self.store_name(), name),
            ChangeCode::CreateObject,
        );
        Ok(stored_fields)
    }

    /// Opens an attribute table by name.
    pub fn table(&self, name: &str) -> CoreResult<Table<'_>> {
        Table::open(self, name)
    }

    /// Opens a feature class by name; fails with `Unsupported` for tables
    /// without a geometry column.
    pub fn feature_class(&self, name: &str) -> CoreResult<FeatureClass<'_>> {
        FeatureClass::open(self, name)
    }

    /// Drops a table together with its attachments table, properties and
    /// blob folder.
    pub fn destroy_table(&self, name: &str) -> CoreResult<()> {
        if !self.table_names()?.iter().any(|table| table == name) {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("no table `{name}`"),
            ));
        }
        self.conn
            .execute_batch(&format!(
                "DROP TABLE \"{name}\";
                 DROP TABLE IF EXISTS \"{ATTACH_TABLE_PREFIX}{name}\";"
            ))
            .map_err(sql_error(ErrorKind::DeleteFailed))?;
        self.conn
            .execute("DELETE FROM gst_meta WHERE tbl = ?1;", [name])
            .map_err(sql_error(ErrorKind::DeleteFailed))?;
        if !self.data_path.as_os_str().is_empty() {
            let blob_dir = self.data_path.join(name);
            if blob_dir.is_dir() {
                let _ = std::fs::remove_dir_all(blob_dir);
            }
        }
        self.notify(
            &format!("{}/{}", self.store_name(), name),
            ChangeCode::DeleteObject,
        );
        Ok(())
    }

    /// Deletes the store file and its data folder.
    pub fn destroy(self) -> CoreResult<()> {
        let path = self.path.clone();
        let data_path = self.data_path.clone();
        drop(self);
        if !data_path.as_os_str().is_empty() && data_path.is_dir() {
            std::fs::remove_dir_all(&data_path).map_err(|err| {
                CoreError::new(
                    ErrorKind::DeleteFailed,
                    format!("remove data folder failed: {err}"),
                )
            })?;
        }
        if !path.as_os_str().is_empty() && path.is_file() {
            std::fs::remove_file(&path).map_err(|err| {
                CoreError::new(
                    ErrorKind::DeleteFailed,
                    format!("remove store file failed: {err}"),
                )
            })?;
        }
        Ok(())
    }

    /// Deterministic filesystem location of one attachment blob.
    pub fn attachment_path(&self, table: &str, fid: i64, aid: i64) -> PathBuf {
        self.data_path
            .join(table)
            .join(fid.to_string())
            .join(aid.to_string())
    }

    /// Reads one store or table property; `table` is empty for store-level
    /// keys.
    pub fn property(&self, table: &str, key: &str, default: &str) -> CoreResult<String> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM gst_meta WHERE tbl = ?1 AND key = ?2;",
                [table, key],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(sql_error(ErrorKind::OpenFailed)(other)),
            })?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    pub fn set_property(&self, table: &str, key: &str, value: &str) -> CoreResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO gst_meta (tbl, key, value) VALUES (?1, ?2, ?3);",
                [table, key, value],
            )
            .map_err(sql_error(ErrorKind::SaveFailed))?;
        Ok(())
    }

    /// All properties of one table as a key/value map.
    pub fn properties(&self, table: &str) -> CoreResult<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM gst_meta WHERE tbl = ?1;")
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt
            .query([table])
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut out = HashMap::new();
        while let Some(row) = rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            let key: String = row.get(0).map_err(sql_error(ErrorKind::OpenFailed))?;
            let value: Option<String> = row.get(1).map_err(sql_error(ErrorKind::OpenFailed))?;
            out.insert(key, value.unwrap_or_default());
        }
        Ok(out)
    }

    /// Stored schema version of this store.
    pub fn version(&self) -> CoreResult<u32> {
        stored_version(&self.conn).ok_or_else(|| {
            CoreError::new(ErrorKind::OpenFailed, "store metadata is unreadable")
        })
    }

    /// Frees cached resources under memory pressure.
    pub fn on_low_memory(&self) {
        self.conn.flush_prepared_statement_cache();
    }
}

/// RAII guard for the SQL execution section; re-entrant within one thread.
pub struct SqlLockGuard<'a> {
    store: &'a DataStore,
}

impl Drop for SqlLockGuard<'_> {
    fn drop(&mut self) {
        let depth = self.store.sql_lock_depth.get();
        self.store.sql_lock_depth.set(depth.saturating_sub(1));
    }
}

fn bootstrap_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

fn apply_upgrades(conn: &Connection, from: u32, upgrades: &[Upgrade]) -> rusqlite::Result<()> {
    conn.execute_batch("BEGIN;")?;
    let result = (|| -> rusqlite::Result<()> {
        let mut version = from;
        for upgrade in upgrades {
            if upgrade.version <= from {
                continue;
            }
            (upgrade.apply)(conn)?;
            version = upgrade.version;
        }
        conn.execute(
            "INSERT OR REPLACE INTO gst_meta (tbl, key, value) VALUES ('', ?1, ?2);",
            (VERSION_KEY, version.to_string()),
        )?;
        Ok(())
    })();
    match result {
        Ok(()) => conn.execute_batch("COMMIT;"),
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

fn stored_version(conn: &Connection) -> Option<u32> {
    conn.query_row(
        "SELECT value FROM gst_meta WHERE tbl = '' AND key = ?1;",
        [VERSION_KEY],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|value| value.parse().ok())
}

fn derived_data_path(path: &Path) -> PathBuf {
    let base = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{base}.data"))
}

/// Normalizes field names against engine-reserved identifiers and
/// duplicates; renames are reported as warnings, never failures.
fn normalize_fields(table: &str, fields: &[Field], progress: &Progress) -> Vec<Field> {
    let reserved = [FID_COLUMN, REMOTE_ID_COLUMN, GEOMETRY_COLUMN];
    let mut used: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let mut name: String = field
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() {
            name.push('_');
        }
        while reserved.iter().any(|r| name.eq_ignore_ascii_case(r))
            || used.iter().any(|u| name.eq_ignore_ascii_case(u))
        {
            name.push('_');
        }
        if name != field.name {
            warn!(
                "event=field_rename module=store status=warning table={} from={} to={}",
                table, field.name, name
            );
            progress.on_progress(
                ProgressStatus::Warning,
                0.0,
                &format!("field `{}` stored as `{name}`", field.name),
            );
        }
        used.push(name.clone());
        out.push(Field {
            field_type: field.field_type,
            alias: field.alias.clone(),
            original_name: field.name.clone(),
            name,
        });
    }
    out
}

/// Looks up a field's declared type from its SQL column type.
pub(crate) fn field_type_from_sql(decl: &str) -> FieldType {
    match decl.to_ascii_uppercase().as_str() {
        "INTEGER" => FieldType::Integer,
        "REAL" => FieldType::Real,
        "BLOB" => FieldType::Blob,
        _ => FieldType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::{latest_version, normalize_fields, DataStore};
    use crate::model::feature::{Field, FieldType};
    use crate::progress::{Progress, ProgressStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn latest_version_is_positive() {
        assert!(latest_version() >= 1);
    }

    #[test]
    fn reserved_field_names_are_suffixed_with_warning() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&warnings);
        let progress = Progress::with(move |status, _, _| {
            if status == ProgressStatus::Warning {
                counted.fetch_add(1, Ordering::SeqCst);
            }
            true
        });

        let fields = vec![
            Field::new("fid", FieldType::Integer),
            Field::new("name", FieldType::Text),
        ];
        let stored = normalize_fields("roads", &fields, &progress);
        assert_eq!(stored[0].name, "fid_");
        assert_eq!(stored[0].original_name, "fid");
        assert_eq!(stored[1].name, "name");
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_field_names_are_disambiguated() {
        let fields = vec![
            Field::new("value", FieldType::Real),
            Field::new("VALUE", FieldType::Text),
        ];
        let stored = normalize_fields("t", &fields, &Progress::default());
        assert_eq!(stored[0].name, "value");
        assert_eq!(stored[1].name, "VALUE_");
    }

    #[test]
    fn name_validation_rejects_reserved_and_malformed() {
        let store = DataStore::create_in_memory().unwrap();
        assert!(store.is_name_valid("roads").is_ok());
        assert!(store.is_name_valid("").is_err());
        assert!(store.is_name_valid("gst_meta").is_err());
        assert!(store.is_name_valid("GST_other").is_err());
        assert!(store.is_name_valid("bad/name").is_err());
        assert!(store.is_name_valid("sqlite_master").is_err());
    }
}
