// crates/update-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Update Store
// Description: Durable UpdateStore backed by SQLite.
// Purpose: Persist update and asset records with integrity-checked manifests.
// Dependencies: update-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`UpdateStore`] using `SQLite`. Every
//! mutation runs inside one transaction on a mutex-guarded connection, so
//! operations on the same update id are serialized and snapshots are
//! consistent. Manifests are persisted as canonical JSON alongside their
//! digest; loads fail closed when the digest no longer matches. A partial
//! unique index keeps at most one embedded update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use update_gate_core::Asset;
use update_gate_core::AssetKey;
use update_gate_core::AssetResolution;
use update_gate_core::AssetStatus;
use update_gate_core::DEFAULT_FAILED_LAUNCH_THRESHOLD;
use update_gate_core::InsertOutcome;
use update_gate_core::LaunchOutcome;
use update_gate_core::ManifestFilters;
use update_gate_core::RuntimeVersion;
use update_gate_core::ScopeKey;
use update_gate_core::StoreError;
use update_gate_core::Timestamp;
use update_gate_core::Update;
use update_gate_core::UpdateId;
use update_gate_core::UpdateSnapshot;
use update_gate_core::UpdateStateError;
use update_gate_core::UpdateStatus;
use update_gate_core::UpdateStore;
use update_gate_core::core::hashing::DEFAULT_HASH_ALGORITHM;
use update_gate_core::core::hashing::HashAlgorithm;
use update_gate_core::core::hashing::canonical_json_bytes;
use update_gate_core::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// `json_data` key holding the saved manifest filters of a scope.
const MANIFEST_FILTERS_KEY: &str = "manifest_filters";
/// Maximum canonical manifest size accepted by the store.
pub const MAX_MANIFEST_BYTES: usize = 4 * 1024 * 1024;

/// Columns selected for an update row, in [`UpdateRow`] order.
const UPDATE_COLUMNS: &str = "id, scope_key, project_id, runtime_version, created_at, \
                              manifest_json, manifest_hash, hash_algorithm, status, is_verified, \
                              successful_launch_count, failed_launch_count, \
                              consecutive_failed_launch_count, ineligible, last_accessed";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` update store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Requested record does not exist.
    #[error("sqlite store record not found: {0}")]
    NotFound(String),
    /// Status transition refused by the update record.
    #[error(transparent)]
    Transition(#[from] UpdateStateError),
    /// Manifest exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Transition(err) => Self::from(err),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "manifest_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed update store.
#[derive(Clone)]
pub struct SqliteUpdateStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Consecutive failed launches that make an update ineligible.
    failed_launch_threshold: u32,
}

impl SqliteUpdateStore {
    /// Opens an `SQLite`-backed update store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
            failed_launch_threshold: DEFAULT_FAILED_LAUNCH_THRESHOLD,
        })
    }

    /// Sets the consecutive failed launch threshold (minimum 1).
    #[must_use]
    pub fn with_failed_launch_threshold(mut self, failed_launch_threshold: u32) -> Self {
        self.failed_launch_threshold = failed_launch_threshold.max(1);
        self
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Runs `work` inside one transaction and commits on success.
    fn transact<T, F>(&self, work: F) -> Result<T, SqliteStoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
    {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let value = work(&tx)?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(value)
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Loads one update, applies `mutate`, and writes the mutable state back.
    fn modify<F>(&self, update_id: &UpdateId, mutate: F) -> Result<Update, SqliteStoreError>
    where
        F: FnOnce(&mut Update) -> Result<(), SqliteStoreError>,
    {
        self.transact(|tx| {
            let mut update = load_update(tx, update_id)?
                .ok_or_else(|| SqliteStoreError::NotFound(format!("update {update_id}")))?;
            mutate(&mut update)?;
            write_update_state(tx, &update)?;
            Ok(update)
        })
    }

    /// Inserts an update unless its id is already known.
    fn insert_update(&self, mut update: Update) -> Result<InsertOutcome, SqliteStoreError> {
        let manifest_json = canonical_json_bytes(&update.manifest)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if manifest_json.len() > MAX_MANIFEST_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_MANIFEST_BYTES,
                actual_bytes: manifest_json.len(),
            });
        }
        self.transact(|tx| {
            if let Some(existing) = load_update(tx, &update.id)? {
                return Ok(InsertOutcome::AlreadyExists(existing));
            }
            if update.is_embedded() {
                let embedded: Option<String> = tx
                    .query_row(
                        "SELECT id FROM updates WHERE status = ?1 LIMIT 1",
                        params![UpdateStatus::Embedded.as_str()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                if let Some(embedded) = embedded {
                    return Err(SqliteStoreError::Invalid(format!(
                        "embedded update {embedded} already installed; refusing {}",
                        update.id
                    )));
                }
            }
            update.promote_if_complete();
            insert_update_rows(tx, &update, &manifest_json)?;
            Ok(InsertOutcome::Inserted(update))
        })
    }

    /// Deletes non-embedded updates and returns the removed records.
    fn delete(&self, update_ids: &[UpdateId]) -> Result<Vec<Update>, SqliteStoreError> {
        self.transact(|tx| {
            let mut deleted = Vec::new();
            for update_id in update_ids {
                let Some(update) = load_update(tx, update_id)? else {
                    continue;
                };
                if update.is_embedded() {
                    continue;
                }
                tx.execute("DELETE FROM updates WHERE id = ?1", params![update_id.to_string()])
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                deleted.push(update);
            }
            Ok(deleted)
        })
    }

    /// Loads the saved filters for a scope.
    fn load_filters(
        &self,
        scope_key: &ScopeKey,
    ) -> Result<Option<ManifestFilters>, SqliteStoreError> {
        self.transact(|tx| {
            let value: Option<String> = tx
                .query_row(
                    "SELECT value_json FROM json_data WHERE scope_key = ?1 AND data_key = ?2",
                    params![scope_key.as_str(), MANIFEST_FILTERS_KEY],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            value
                .map(|json| {
                    serde_json::from_str(&json).map_err(|err| {
                        SqliteStoreError::Corrupt(format!("filters for {scope_key}: {err}"))
                    })
                })
                .transpose()
        })
    }

    /// Saves the filters for a scope.
    fn save_filters(
        &self,
        scope_key: &ScopeKey,
        filters: &ManifestFilters,
        at: Timestamp,
    ) -> Result<(), SqliteStoreError> {
        let json = serde_json::to_string(filters)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        self.transact(|tx| {
            tx.execute(
                "INSERT INTO json_data (scope_key, data_key, value_json, updated_at) VALUES (?1, \
                 ?2, ?3, ?4) ON CONFLICT(scope_key, data_key) DO UPDATE SET value_json = \
                 excluded.value_json, updated_at = excluded.updated_at",
                params![scope_key.as_str(), MANIFEST_FILTERS_KEY, json, at.as_unix_millis()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }
}

impl UpdateStore for SqliteUpdateStore {
    fn insert(&self, update: Update) -> Result<InsertOutcome, StoreError> {
        self.insert_update(update).map_err(StoreError::from)
    }

    fn mark_asset_resolved(
        &self,
        update_id: &UpdateId,
        asset_key: &AssetKey,
        resolution: AssetResolution,
    ) -> Result<Update, StoreError> {
        self.modify(update_id, |update| {
            update.apply_asset_resolution(asset_key, resolution).map_err(SqliteStoreError::from)
        })
        .map_err(StoreError::from)
    }

    fn record_launch_outcome(
        &self,
        update_id: &UpdateId,
        outcome: LaunchOutcome,
    ) -> Result<Update, StoreError> {
        let threshold = self.failed_launch_threshold;
        self.modify(update_id, |update| {
            update.apply_launch_outcome(outcome, threshold);
            Ok(())
        })
        .map_err(StoreError::from)
    }

    fn all(&self) -> Result<UpdateSnapshot, StoreError> {
        let updates = self.transact(|tx| load_all(tx)).map_err(StoreError::from)?;
        Ok(UpdateSnapshot {
            updates,
        })
    }

    fn get(&self, update_id: &UpdateId) -> Result<Option<Update>, StoreError> {
        self.transact(|tx| load_update(tx, update_id)).map_err(StoreError::from)
    }

    fn mark_assets_missing(
        &self,
        update_id: &UpdateId,
        asset_keys: &[AssetKey],
    ) -> Result<Update, StoreError> {
        self.modify(update_id, |update| {
            update.mark_assets_missing(asset_keys).map_err(SqliteStoreError::from)
        })
        .map_err(StoreError::from)
    }

    fn mark_accessed(&self, update_id: &UpdateId, at: Timestamp) -> Result<(), StoreError> {
        self.modify(update_id, |update| {
            update.last_accessed = Some(at);
            Ok(())
        })
        .map(|_| ())
        .map_err(StoreError::from)
    }

    fn delete_updates(&self, update_ids: &[UpdateId]) -> Result<Vec<Update>, StoreError> {
        self.delete(update_ids).map_err(StoreError::from)
    }

    fn manifest_filters(
        &self,
        scope_key: &ScopeKey,
    ) -> Result<Option<ManifestFilters>, StoreError> {
        self.load_filters(scope_key).map_err(StoreError::from)
    }

    fn set_manifest_filters(
        &self,
        scope_key: &ScopeKey,
        filters: &ManifestFilters,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.save_filters(scope_key, filters, at).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw `updates` row before validation.
struct UpdateRow {
    /// Update id text.
    id: String,
    /// Scope key.
    scope_key: String,
    /// Project id, when declared.
    project_id: Option<String>,
    /// Runtime version.
    runtime_version: String,
    /// Creation time (unix ms).
    created_at: i64,
    /// Canonical manifest JSON.
    manifest_json: Vec<u8>,
    /// Manifest digest (hex).
    manifest_hash: String,
    /// Digest algorithm label.
    hash_algorithm: String,
    /// Status label.
    status: String,
    /// Signature verification flag.
    is_verified: bool,
    /// Successful launches.
    successful_launch_count: i64,
    /// Failed launches.
    failed_launch_count: i64,
    /// Consecutive failed launches.
    consecutive_failed_launch_count: i64,
    /// Terminal ineligibility flag.
    ineligible: bool,
    /// Last selection time (unix ms).
    last_accessed: Option<i64>,
}

impl UpdateRow {
    /// Reads a row selected with [`UPDATE_COLUMNS`].
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scope_key: row.get(1)?,
            project_id: row.get(2)?,
            runtime_version: row.get(3)?,
            created_at: row.get(4)?,
            manifest_json: row.get(5)?,
            manifest_hash: row.get(6)?,
            hash_algorithm: row.get(7)?,
            status: row.get(8)?,
            is_verified: row.get(9)?,
            successful_launch_count: row.get(10)?,
            failed_launch_count: row.get(11)?,
            consecutive_failed_launch_count: row.get(12)?,
            ineligible: row.get(13)?,
            last_accessed: row.get(14)?,
        })
    }

    /// Validates the row and attaches its assets.
    fn into_update(self, assets: Vec<Asset>) -> Result<Update, SqliteStoreError> {
        let id = UpdateId::parse(&self.id)
            .map_err(|err| SqliteStoreError::Corrupt(format!("update id {}: {err}", self.id)))?;
        let algorithm = parse_hash_algorithm(&self.hash_algorithm)?;
        if hash_bytes(algorithm, &self.manifest_json).value != self.manifest_hash {
            return Err(SqliteStoreError::Corrupt(format!(
                "manifest hash mismatch for update {id}"
            )));
        }
        let manifest = serde_json::from_slice(&self.manifest_json)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let status = UpdateStatus::parse(&self.status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("unknown status {} for update {id}", self.status))
        })?;
        Ok(Update {
            id,
            scope_key: ScopeKey::new(self.scope_key),
            project_id: self.project_id,
            runtime_version: RuntimeVersion::new(self.runtime_version),
            created_at: Timestamp::from_unix_millis(self.created_at),
            manifest,
            status,
            is_verified: self.is_verified,
            successful_launch_count: counter(self.successful_launch_count, &id)?,
            failed_launch_count: counter(self.failed_launch_count, &id)?,
            consecutive_failed_launch_count: counter(self.consecutive_failed_launch_count, &id)?,
            ineligible: self.ineligible,
            last_accessed: self.last_accessed.map(Timestamp::from_unix_millis),
            assets,
        })
    }
}

/// Converts a stored counter into `u32`.
fn counter(value: i64, update_id: &UpdateId) -> Result<u32, SqliteStoreError> {
    u32::try_from(value).map_err(|_| {
        SqliteStoreError::Corrupt(format!("launch counter out of range for update {update_id}"))
    })
}

/// Loads one update with its assets.
fn load_update(
    connection: &Connection,
    update_id: &UpdateId,
) -> Result<Option<Update>, SqliteStoreError> {
    let row = connection
        .query_row(
            &format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE id = ?1"),
            params![update_id.to_string()],
            UpdateRow::from_row,
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let Some(row) = row else {
        return Ok(None);
    };
    check_manifest_length(row.manifest_json.len())?;
    let assets = load_assets(connection, &row.id)?;
    row.into_update(assets).map(Some)
}

/// Loads every update ordered by creation time.
fn load_all(connection: &Connection) -> Result<Vec<Update>, SqliteStoreError> {
    let mut statement = connection
        .prepare(&format!("SELECT {UPDATE_COLUMNS} FROM updates ORDER BY created_at, id"))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = statement
        .query_map(params![], UpdateRow::from_row)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut updates = Vec::with_capacity(rows.len());
    for row in rows {
        check_manifest_length(row.manifest_json.len())?;
        let assets = load_assets(connection, &row.id)?;
        updates.push(row.into_update(assets)?);
    }
    Ok(updates)
}

/// Loads the assets owned by an update in manifest order.
fn load_assets(connection: &Connection, update_id: &str) -> Result<Vec<Asset>, SqliteStoreError> {
    let mut statement = connection
        .prepare(
            "SELECT asset_key, url, content_type, file_extension, expected_hash, \
             is_launch_asset, embedded, embedded_asset_filename, resources_folder, \
             resources_filename, scale, status, relative_path, download_time FROM assets WHERE \
             update_id = ?1 ORDER BY position",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = statement
        .query_map(params![update_id], |row| {
            let mut asset = Asset::new(row.get::<_, String>(0)?);
            asset.url = row.get(1)?;
            asset.content_type = row.get(2)?;
            asset.file_extension = row.get(3)?;
            asset.expected_hash = row.get(4)?;
            asset.is_launch_asset = row.get(5)?;
            asset.embedded = row.get(6)?;
            asset.embedded_asset_filename = row.get(7)?;
            asset.resources_folder = row.get(8)?;
            asset.resources_filename = row.get(9)?;
            asset.scale = row.get(10)?;
            let status: String = row.get(11)?;
            asset.relative_path = row.get(12)?;
            asset.download_time = row.get::<_, Option<i64>>(13)?.map(Timestamp::from_unix_millis);
            Ok((asset, status))
        })
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut assets = Vec::new();
    for row in rows {
        let (mut asset, status) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        asset.status = AssetStatus::parse(&status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("unknown status {status} for asset {}", asset.key))
        })?;
        assets.push(asset);
    }
    Ok(assets)
}

/// Inserts the update row and its asset rows.
fn insert_update_rows(
    tx: &Transaction<'_>,
    update: &Update,
    manifest_json: &[u8],
) -> Result<(), SqliteStoreError> {
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, manifest_json);
    let id = update.id.to_string();
    tx.execute(
        &format!("INSERT INTO updates ({UPDATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, \
                  ?9, ?10, ?11, ?12, ?13, ?14, ?15)"),
        params![
            id,
            update.scope_key.as_str(),
            update.project_id,
            update.runtime_version.as_str(),
            update.created_at.as_unix_millis(),
            manifest_json,
            digest.value,
            digest.algorithm.as_str(),
            update.status.as_str(),
            update.is_verified,
            update.successful_launch_count,
            update.failed_launch_count,
            update.consecutive_failed_launch_count,
            update.ineligible,
            update.last_accessed.map(Timestamp::as_unix_millis),
        ],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    for (position, asset) in update.assets.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| SqliteStoreError::Invalid("too many assets".to_string()))?;
        tx.execute(
            "INSERT INTO assets (update_id, position, asset_key, url, content_type, \
             file_extension, expected_hash, is_launch_asset, embedded, embedded_asset_filename, \
             resources_folder, resources_filename, scale, status, relative_path, download_time) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                id,
                position,
                asset.key.as_str(),
                asset.url,
                asset.content_type,
                asset.file_extension,
                asset.expected_hash,
                asset.is_launch_asset,
                asset.embedded,
                asset.embedded_asset_filename,
                asset.resources_folder,
                asset.resources_filename,
                asset.scale,
                asset.status.as_str(),
                asset.relative_path,
                asset.download_time.map(Timestamp::as_unix_millis),
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

/// Writes the mutable columns of an update and its assets.
fn write_update_state(tx: &Transaction<'_>, update: &Update) -> Result<(), SqliteStoreError> {
    let id = update.id.to_string();
    tx.execute(
        "UPDATE updates SET status = ?2, successful_launch_count = ?3, failed_launch_count = ?4, \
         consecutive_failed_launch_count = ?5, ineligible = ?6, last_accessed = ?7 WHERE id = ?1",
        params![
            id,
            update.status.as_str(),
            update.successful_launch_count,
            update.failed_launch_count,
            update.consecutive_failed_launch_count,
            update.ineligible,
            update.last_accessed.map(Timestamp::as_unix_millis),
        ],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    for asset in &update.assets {
        tx.execute(
            "UPDATE assets SET status = ?3, relative_path = ?4, download_time = ?5, embedded = ?6 \
             WHERE update_id = ?1 AND asset_key = ?2",
            params![
                id,
                asset.key.as_str(),
                asset.status.as_str(),
                asset.relative_path,
                asset.download_time.map(Timestamp::as_unix_millis),
                asset.embedded,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects stored manifests above the size limit before decoding.
const fn check_manifest_length(length: usize) -> Result<(), SqliteStoreError> {
    if length > MAX_MANIFEST_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_MANIFEST_BYTES,
            actual_bytes: length,
        });
    }
    Ok(())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS updates (
                    id TEXT PRIMARY KEY,
                    scope_key TEXT NOT NULL,
                    project_id TEXT,
                    runtime_version TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    manifest_json BLOB NOT NULL,
                    manifest_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    status TEXT NOT NULL,
                    is_verified INTEGER NOT NULL,
                    successful_launch_count INTEGER NOT NULL,
                    failed_launch_count INTEGER NOT NULL,
                    consecutive_failed_launch_count INTEGER NOT NULL,
                    ineligible INTEGER NOT NULL,
                    last_accessed INTEGER
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_updates_single_embedded
                    ON updates (status) WHERE status = 'embedded';
                CREATE INDEX IF NOT EXISTS idx_updates_scope_created
                    ON updates (scope_key, created_at);
                CREATE TABLE IF NOT EXISTS assets (
                    update_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    asset_key TEXT NOT NULL,
                    url TEXT,
                    content_type TEXT,
                    file_extension TEXT,
                    expected_hash TEXT,
                    is_launch_asset INTEGER NOT NULL,
                    embedded INTEGER NOT NULL,
                    embedded_asset_filename TEXT,
                    resources_folder TEXT,
                    resources_filename TEXT,
                    scale REAL,
                    status TEXT NOT NULL,
                    relative_path TEXT,
                    download_time INTEGER,
                    PRIMARY KEY (update_id, asset_key),
                    FOREIGN KEY (update_id) REFERENCES updates(id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS json_data (
                    scope_key TEXT NOT NULL,
                    data_key TEXT NOT NULL,
                    value_json TEXT NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (scope_key, data_key)
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {other}"))),
    }
}
