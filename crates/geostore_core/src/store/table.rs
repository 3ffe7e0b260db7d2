//! Table row access, bulk copy and attachment storage.
//!
//! # Responsibility
//! - Provide CRUD over one store table, keeping SQL details inside the
//!   store boundary.
//! - Manage the lazily created per-table attachments table and its blob
//!   folder.
//!
//! # Invariants
//! - The synthetic `fid`/`rid`/`geom` columns never appear in the
//!   user-facing field list.
//! - Deleting a feature does not cascade to its attachments; attachment
//!   cleanup is an explicit, separate operation.

use crate::error::{sql_error, CoreError, CoreResult, ErrorKind};
use crate::model::feature::{Feature, Field, FieldValue};
use crate::model::geometry::Geometry;
use crate::progress::{ChangeCode, Progress, ProgressStatus};
use crate::store::datastore::{
    field_type_from_sql, DataStore, ATTACH_TABLE_PREFIX, FID_COLUMN, GEOMETRY_COLUMN,
    REMOTE_ID_COLUMN,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use std::path::PathBuf;

/// View over one attachment row plus its blob file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub id: i64,
    pub feature_id: i64,
    pub name: String,
    pub description: String,
    pub rid: i64,
    /// Size of the blob file; 0 when the file is absent.
    pub size: u64,
    pub path: PathBuf,
}

/// A row-set over one store table.
///
/// Borrows the owning [`DataStore`]; must not outlive it.
#[derive(Debug)]
pub struct Table<'a> {
    store: &'a DataStore,
    name: String,
    fields: Vec<Field>,
    has_geometry: bool,
}

impl<'a> Table<'a> {
    pub(crate) fn open(store: &'a DataStore, name: &str) -> CoreResult<Table<'a>> {
        let mut stmt = store
            .conn()
            .prepare(&format!("PRAGMA table_info(\"{name}\");"))
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt.query([]).map_err(sql_error(ErrorKind::OpenFailed))?;

        let mut fields = Vec::new();
        let mut has_geometry = false;
        let mut any_column = false;
        while let Some(row) = rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            any_column = true;
            let column: String = row.get(1).map_err(sql_error(ErrorKind::OpenFailed))?;
            let declared: String = row.get(2).map_err(sql_error(ErrorKind::OpenFailed))?;
            match column.as_str() {
                FID_COLUMN | REMOTE_ID_COLUMN => {}
                GEOMETRY_COLUMN => has_geometry = true,
                _ => fields.push(Field::new(column, field_type_from_sql(&declared))),
            }
        }
        if !any_column {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("no table `{name}`"),
            ));
        }

        // Restore user aliases and source names recorded at creation.
        let properties = store.properties(name)?;
        for (index, field) in fields.iter_mut().enumerate() {
            if let Some(alias) = properties.get(&format!("FIELD_{index}_ALIAS")) {
                field.alias = alias.clone();
            }
            if let Some(original) = properties.get(&format!("FIELD_{index}_NAME")) {
                field.original_name = original.clone();
            }
        }

        Ok(Table {
            store,
            name: name.to_string(),
            fields,
            has_geometry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// User-visible field descriptors, synthetic columns excluded.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn has_geometry(&self) -> bool {
        self.has_geometry
    }

    fn uri(&self) -> String {
        format!("{}/{}", self.store.store_name(), self.name)
    }

    /// Creates an unpersisted feature shaped for this table.
    pub fn create_feature(&self) -> Feature {
        Feature::with_fields(self.fields.len())
    }

    fn column_list(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        if self.has_geometry {
            columns.push(GEOMETRY_COLUMN.to_string());
        }
        columns
    }

    fn bind_values(&self, feature: &Feature) -> CoreResult<Vec<Value>> {
        let mut values: Vec<Value> = feature.values.iter().map(to_sql_value).collect();
        if self.has_geometry {
            values.push(match &feature.geometry {
                Some(geometry) => Value::Blob(encode_geometry(geometry)?),
                None => Value::Null,
            });
        }
        Ok(values)
    }

    /// Inserts a feature and returns its assigned id.
    pub fn insert_feature(&self, feature: &Feature) -> CoreResult<i64> {
        if feature.values.len() != self.fields.len() {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                "feature shape does not match table fields",
            ));
        }
        let columns = self.column_list();
        if columns.is_empty() {
            self.store
                .conn()
                .execute(&format!("INSERT INTO \"{}\" DEFAULT VALUES;", self.name), [])
                .map_err(sql_error(ErrorKind::CreateFailed))?;
        } else {
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
            let sql = format!(
                "INSERT INTO \"{}\" ({}) VALUES ({});",
                self.name,
                quoted.join(", "),
                placeholders.join(", ")
            );
            self.store
                .conn()
                .execute(&sql, params_from_iter(self.bind_values(feature)?))
                .map_err(sql_error(ErrorKind::CreateFailed))?;
        }
        let fid = self.store.conn().last_insert_rowid();
        self.store.notify(&self.uri(), ChangeCode::CreateFeature);
        Ok(fid)
    }

    /// Updates a persisted feature by id.
    pub fn update_feature(&self, feature: &Feature) -> CoreResult<()> {
        if !feature.is_persisted() {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                "feature has no id",
            ));
        }
        if feature.values.len() != self.fields.len() {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                "feature shape does not match table fields",
            ));
        }
        let columns = self.column_list();
        if columns.is_empty() {
            return Ok(());
        }
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("\"{c}\" = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"{FID_COLUMN}\" = ?{};",
            self.name,
            assignments.join(", "),
            columns.len() + 1
        );
        let mut values = self.bind_values(feature)?;
        values.push(Value::Integer(feature.id));
        let changed = self
            .store
            .conn()
            .execute(&sql, params_from_iter(values))
            .map_err(sql_error(ErrorKind::SaveFailed))?;
        if changed == 0 {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("feature {} not found in `{}`", feature.id, self.name),
            ));
        }
        self.store.notify(&self.uri(), ChangeCode::ChangeFeature);
        Ok(())
    }

    /// Deletes one feature row. Attachments are left untouched.
    pub fn delete_feature(&self, fid: i64) -> CoreResult<()> {
        let changed = self
            .store
            .conn()
            .execute(
                &format!("DELETE FROM \"{}\" WHERE \"{FID_COLUMN}\" = ?1;", self.name),
                [fid],
            )
            .map_err(sql_error(ErrorKind::DeleteFailed))?;
        if changed == 0 {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("feature {fid} not found in `{}`", self.name),
            ));
        }
        self.store.notify(&self.uri(), ChangeCode::DeleteFeature);
        Ok(())
    }

    fn select_sql(&self, filter: &str) -> String {
        let mut columns = vec![format!("\"{FID_COLUMN}\""), format!("\"{REMOTE_ID_COLUMN}\"")];
        columns.extend(self.fields.iter().map(|f| format!("\"{}\"", f.name)));
        if self.has_geometry {
            columns.push(format!("\"{GEOMETRY_COLUMN}\""));
        }
        format!(
            "SELECT {} FROM \"{}\" {filter};",
            columns.join(", "),
            self.name
        )
    }

    fn parse_feature(&self, row: &Row<'_>) -> CoreResult<Feature> {
        let fid: i64 = row.get(0).map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut values = Vec::with_capacity(self.fields.len());
        for index in 0..self.fields.len() {
            let value: Value = row
                .get(index + 2)
                .map_err(sql_error(ErrorKind::OpenFailed))?;
            values.push(from_sql_value(value));
        }
        let geometry = if self.has_geometry {
            let blob: Option<Vec<u8>> = row
                .get(2 + self.fields.len())
                .map_err(sql_error(ErrorKind::OpenFailed))?;
            match blob {
                Some(bytes) => Some(decode_geometry(&bytes)?),
                None => None,
            }
        } else {
            None
        };
        Ok(Feature {
            id: fid,
            geometry,
            values,
        })
    }

    /// Loads one feature by id.
    pub fn feature(&self, fid: i64) -> CoreResult<Option<Feature>> {
        let sql = self.select_sql(&format!("WHERE \"{FID_COLUMN}\" = ?1"));
        let mut stmt = self
            .store
            .conn()
            .prepare(&sql)
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt.query([fid]).map_err(sql_error(ErrorKind::OpenFailed))?;
        match rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            Some(row) => Ok(Some(self.parse_feature(row)?)),
            None => Ok(None),
        }
    }

    /// Loads all features in id order.
    pub fn features(&self) -> CoreResult<Vec<Feature>> {
        let sql = self.select_sql(&format!("ORDER BY \"{FID_COLUMN}\" ASC"));
        let mut stmt = self
            .store
            .conn()
            .prepare(&sql)
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt.query([]).map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut features = Vec::new();
        while let Some(row) = rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            features.push(self.parse_feature(row)?);
        }
        Ok(features)
    }

    pub fn feature_count(&self) -> CoreResult<i64> {
        self.store
            .conn()
            .query_row(&format!("SELECT count(*) FROM \"{}\";", self.name), [], |row| {
                row.get(0)
            })
            .map_err(sql_error(ErrorKind::OpenFailed))
    }

    /// Copies rows from `src` using an explicit field-index mapping
    /// (`field_map[src_index] = dst_index`, `-1` = unmapped).
    ///
    /// Progress is reported per row; cancellation aborts immediately with
    /// `Canceled`. Rows already inserted are not rolled back.
    pub fn copy_rows(
        &self,
        src: &Table<'_>,
        field_map: &[i64],
        progress: &Progress,
    ) -> CoreResult<usize> {
        if field_map.len() != src.fields.len() {
            return Err(CoreError::new(
                ErrorKind::InvalidArgument,
                "field map does not match source fields",
            ));
        }
        progress.on_progress(
            ProgressStatus::InProcess,
            0.0,
            &format!("start copy rows from `{}` to `{}`", src.name, self.name),
        );

        let total = src.feature_count()? as f64;
        let mut copied = 0usize;
        for (counter, feature) in src.features()?.into_iter().enumerate() {
            let complete = if total > 0.0 {
                counter as f64 / total
            } else {
                1.0
            };
            if !progress.on_progress(ProgressStatus::InProcess, complete, "copy in process") {
                return Err(CoreError::new(ErrorKind::Canceled, "copy rows canceled"));
            }

            let mut dst_feature = self.create_feature();
            for (src_index, dst_index) in field_map.iter().enumerate() {
                if *dst_index < 0 {
                    continue;
                }
                if let Some(value) = feature.value(src_index) {
                    dst_feature.set_value(*dst_index as usize, value.clone());
                }
            }
            if self.has_geometry {
                dst_feature.geometry = feature.geometry.clone();
            }

            if let Err(err) = self.insert_feature(&dst_feature) {
                if !progress.on_progress(
                    ProgressStatus::Warning,
                    complete,
                    &format!("create feature failed, source fid {}: {err}", feature.id),
                ) {
                    return Err(CoreError::new(ErrorKind::Canceled, "copy rows canceled"));
                }
                continue;
            }
            copied += 1;
        }

        progress.on_progress(
            ProgressStatus::Finished,
            1.0,
            &format!("done, copied {copied} rows"),
        );
        info!(
            "event=copy_rows module=store status=ok src={} dst={} rows={}",
            src.name, self.name, copied
        );
        Ok(copied)
    }

    /// Finds the feature carrying the given remote id.
    pub fn feature_by_remote_id(&self, rid: i64) -> CoreResult<Option<Feature>> {
        let _guard = self.store.lock_sql();
        let sql = self.select_sql(&format!("WHERE \"{REMOTE_ID_COLUMN}\" = ?1"));
        let mut stmt = self
            .store
            .conn()
            .prepare(&sql)
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt.query([rid]).map_err(sql_error(ErrorKind::OpenFailed))?;
        match rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            Some(row) => Ok(Some(self.parse_feature(row)?)),
            None => Ok(None),
        }
    }

    pub fn set_remote_id(&self, fid: i64, rid: i64) -> CoreResult<()> {
        let changed = self
            .store
            .conn()
            .execute(
                &format!(
                    "UPDATE \"{}\" SET \"{REMOTE_ID_COLUMN}\" = ?1 WHERE \"{FID_COLUMN}\" = ?2;",
                    self.name
                ),
                [rid, fid],
            )
            .map_err(sql_error(ErrorKind::SaveFailed))?;
        if changed == 0 {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("feature {fid} not found in `{}`", self.name),
            ));
        }
        Ok(())
    }

    pub fn remote_id(&self, fid: i64) -> CoreResult<i64> {
        self.store
            .conn()
            .query_row(
                &format!(
                    "SELECT \"{REMOTE_ID_COLUMN}\" FROM \"{}\" WHERE \"{FID_COLUMN}\" = ?1;",
                    self.name
                ),
                [fid],
                |row| row.get(0),
            )
            .map_err(sql_error(ErrorKind::NotFound))
    }

    fn attachments_table(&self) -> String {
        format!("{ATTACH_TABLE_PREFIX}{}", self.name)
    }

    /// Creates the companion attachments table on first access.
    fn init_attachments_table(&self) -> CoreResult<()> {
        self.store
            .conn()
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    aid INTEGER PRIMARY KEY AUTOINCREMENT,
                    fid INTEGER NOT NULL,
                    file_name TEXT,
                    description TEXT,
                    rid INTEGER NOT NULL DEFAULT -1
                );",
                self.attachments_table()
            ))
            .map_err(sql_error(ErrorKind::CreateFailed))
    }

    /// Lists attachments of one feature with resolved blob paths.
    pub fn attachments(&self, fid: i64) -> CoreResult<Vec<AttachmentInfo>> {
        self.init_attachments_table()?;
        let _guard = self.store.lock_sql();
        let mut stmt = self
            .store
            .conn()
            .prepare(&format!(
                "SELECT aid, fid, file_name, description, rid FROM \"{}\"
                 WHERE fid = ?1 ORDER BY aid ASC;",
                self.attachments_table()
            ))
            .map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut rows = stmt.query([fid]).map_err(sql_error(ErrorKind::OpenFailed))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(sql_error(ErrorKind::OpenFailed))? {
            let id: i64 = row.get(0).map_err(sql_error(ErrorKind::OpenFailed))?;
            let feature_id: i64 = row.get(1).map_err(sql_error(ErrorKind::OpenFailed))?;
            let name: Option<String> = row.get(2).map_err(sql_error(ErrorKind::OpenFailed))?;
            let description: Option<String> =
                row.get(3).map_err(sql_error(ErrorKind::OpenFailed))?;
            let rid: i64 = row.get(4).map_err(sql_error(ErrorKind::OpenFailed))?;
            let path = self.store.attachment_path(&self.name, feature_id, id);
            let size = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
            out.push(AttachmentInfo {
                id,
                feature_id,
                name: name.unwrap_or_default(),
                description: description.unwrap_or_default(),
                rid,
                size,
                path,
            });
        }
        Ok(out)
    }

    /// Adds an attachment row and stores the blob under the deterministic
    /// per-table/per-feature path. A missing source file leaves only the
    /// row.
    pub fn add_attachment(
        &self,
        fid: i64,
        file_name: &str,
        description: &str,
        file_path: &std::path::Path,
        move_file: bool,
        rid: i64,
    ) -> CoreResult<i64> {
        if self.store.data_path().as_os_str().is_empty() {
            return Err(CoreError::new(
                ErrorKind::CreateFailed,
                "store has no data folder for attachments",
            ));
        }
        self.init_attachments_table()?;
        self.store
            .conn()
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (fid, file_name, description, rid)
                     VALUES (?1, ?2, ?3, ?4);",
                    self.attachments_table()
                ),
                (fid, file_name, description, rid),
            )
            .map_err(sql_error(ErrorKind::CreateFailed))?;
        let aid = self.store.conn().last_insert_rowid();

        let dst = self.store.attachment_path(&self.name, fid, aid);
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir).map_err(|err| {
                CoreError::new(
                    ErrorKind::CreateFailed,
                    format!("create attachment folder failed: {err}"),
                )
            })?;
        }
        if file_path.is_file() {
            let result = if move_file {
                std::fs::rename(file_path, &dst)
                    .or_else(|_| std::fs::copy(file_path, &dst).map(|_| ()))
            } else {
                std::fs::copy(file_path, &dst).map(|_| ())
            };
            result.map_err(|err| {
                CoreError::new(
                    ErrorKind::CopyFailed,
                    format!("store attachment blob failed: {err}"),
                )
            })?;
        }
        self.store.notify(&self.uri(), ChangeCode::CreateAttachment);
        Ok(aid)
    }

    /// Removes an attachment row and its blob file.
    pub fn delete_attachment(&self, aid: i64) -> CoreResult<()> {
        self.init_attachments_table()?;
        let fid: i64 = self
            .store
            .conn()
            .query_row(
                &format!(
                    "SELECT fid FROM \"{}\" WHERE aid = ?1;",
                    self.attachments_table()
                ),
                [aid],
                |row| row.get(0),
            )
            .map_err(|_| {
                CoreError::new(ErrorKind::NotFound, format!("no attachment {aid}"))
            })?;
        self.store
            .conn()
            .execute(
                &format!("DELETE FROM \"{}\" WHERE aid = ?1;", self.attachments_table()),
                [aid],
            )
            .map_err(sql_error(ErrorKind::DeleteFailed))?;
        let path = self.store.attachment_path(&self.name, fid, aid);
        if path.is_file() {
            let _ = std::fs::remove_file(path);
        }
        self.store.notify(&self.uri(), ChangeCode::DeleteAttachment);
        Ok(())
    }

    /// Updates attachment metadata (name/description).
    pub fn update_attachment(
        &self,
        aid: i64,
        file_name: &str,
        description: &str,
    ) -> CoreResult<()> {
        self.init_attachments_table()?;
        let changed = self
            .store
            .conn()
            .execute(
                &format!(
                    "UPDATE \"{}\" SET file_name = ?1, description = ?2 WHERE aid = ?3;",
                    self.attachments_table()
                ),
                (file_name, description, aid),
            )
            .map_err(sql_error(ErrorKind::SaveFailed))?;
        if changed == 0 {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("no attachment {aid}"),
            ));
        }
        self.store.notify(&self.uri(), ChangeCode::ChangeAttachment);
        Ok(())
    }

    pub fn set_attachment_remote_id(&self, aid: i64, rid: i64) -> CoreResult<()> {
        self.init_attachments_table()?;
        let _guard = self.store.lock_sql();
        let changed = self
            .store
            .conn()
            .execute(
                &format!(
                    "UPDATE \"{}\" SET rid = ?1 WHERE aid = ?2;",
                    self.attachments_table()
                ),
                [rid, aid],
            )
            .map_err(sql_error(ErrorKind::SaveFailed))?;
        if changed == 0 {
            return Err(CoreError::new(
                ErrorKind::NotFound,
                format!("no attachment {aid}"),
            ));
        }
        Ok(())
    }

    /// Reads one table property with a default.
    pub fn property(&self, key: &str, default: &str) -> CoreResult<String> {
        self.store.property(&self.name, key, default)
    }

    pub fn set_property(&self, key: &str, value: &str) -> CoreResult<()> {
        self.store.set_property(&self.name, key, value)
    }

    /// Drops this table from the store.
    pub fn destroy(self) -> CoreResult<()> {
        self.store.destroy_table(&self.name)
    }
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(v) => Value::Integer(*v),
        FieldValue::Real(v) => Value::Real(*v),
        FieldValue::Text(v) => Value::Text(v.clone()),
        FieldValue::Blob(v) => Value::Blob(v.clone()),
    }
}

fn from_sql_value(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Integer(v) => FieldValue::Integer(v),
        Value::Real(v) => FieldValue::Real(v),
        Value::Text(v) => FieldValue::Text(v),
        Value::Blob(v) => FieldValue::Blob(v),
    }
}

pub(crate) fn encode_geometry(geometry: &Geometry) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(geometry).map_err(|err| {
        CoreError::new(
            ErrorKind::SaveFailed,
            format!("encode geometry failed: {err}"),
        )
    })
}

pub(crate) fn decode_geometry(bytes: &[u8]) -> CoreResult<Geometry> {
    serde_json::from_slice(bytes).map_err(|err| {
        CoreError::new(
            ErrorKind::OpenFailed,
            format!("invalid persisted geometry: {err}"),
        )
    })
}
