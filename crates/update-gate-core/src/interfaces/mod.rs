// crates/update-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Update Gate Interfaces
// Description: Backend-agnostic interfaces for storage, transport, and platform access.
// Purpose: Define the contract surfaces the trust gate and launch selector depend on.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces describe how Update Gate integrates with persistence, the
//! network transport, native resource lookup, and time without embedding any
//! backend. Implementations must fail closed on missing or invalid data.
//!
//! Every collaborator is `Send + Sync` so a single runtime instance can be
//! shared across threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ManifestEnvelope;
use crate::core::ManifestFilters;
use crate::core::identifiers::AssetKey;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::model::Asset;
use crate::core::model::AssetResolution;
use crate::core::model::LaunchOutcome;
use crate::core::model::Update;
use crate::core::model::UpdateStateError;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Update Store
// ============================================================================

/// Update store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("update store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("update store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("update store version mismatch: {0}")]
    VersionMismatch(String),
    /// Request or stored data is invalid.
    #[error("update store invalid data: {0}")]
    Invalid(String),
    /// Referenced update or asset does not exist.
    #[error("update store record not found: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("update store error: {0}")]
    Store(String),
}

impl From<UpdateStateError> for StoreError {
    fn from(err: UpdateStateError) -> Self {
        match err {
            UpdateStateError::UnknownAsset {
                ..
            } => Self::NotFound(err.to_string()),
            UpdateStateError::EmbeddedImmutable(_) => Self::Invalid(err.to_string()),
        }
    }
}

/// Result of an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The update was new and is now stored.
    Inserted(Update),
    /// An update with the same id already existed; nothing changed.
    AlreadyExists(Update),
}

impl InsertOutcome {
    /// Returns the stored record.
    #[must_use]
    pub const fn update(&self) -> &Update {
        match self {
            Self::Inserted(update) | Self::AlreadyExists(update) => update,
        }
    }

    /// Returns true when the record was newly inserted.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Consistent snapshot of every stored update with its assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSnapshot {
    /// Stored updates ordered by id.
    pub updates: Vec<Update>,
}

impl UpdateSnapshot {
    /// Returns the embedded update, if installed.
    #[must_use]
    pub fn embedded(&self) -> Option<&Update> {
        self.updates.iter().find(|update| update.is_embedded())
    }

    /// Looks up an update by id.
    #[must_use]
    pub fn get(&self, id: &UpdateId) -> Option<&Update> {
        self.updates.iter().find(|update| &update.id == id)
    }

    /// Returns the number of stored updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Persistent record of known updates and assets.
///
/// Mutations are serialized by the implementation; [`UpdateStore::all`]
/// returns a snapshot that never observes a half-applied mutation.
pub trait UpdateStore: Send + Sync {
    /// Inserts an update keyed by id; existing ids are returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when a second embedded update is inserted.
    fn insert(&self, update: Update) -> Result<InsertOutcome, StoreError>;

    /// Applies a download outcome to one asset and returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown updates or assets.
    fn mark_asset_resolved(
        &self,
        update_id: &UpdateId,
        asset_key: &AssetKey,
        resolution: AssetResolution,
    ) -> Result<Update, StoreError>;

    /// Records a launch attempt and returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown updates.
    fn record_launch_outcome(
        &self,
        update_id: &UpdateId,
        outcome: LaunchOutcome,
    ) -> Result<Update, StoreError>;

    /// Returns a consistent snapshot of every update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when reading fails.
    fn all(&self) -> Result<UpdateSnapshot, StoreError>;

    /// Loads one update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when reading fails.
    fn get(&self, update_id: &UpdateId) -> Result<Option<Update>, StoreError>;

    /// Marks assets whose local copy is gone and demotes the update to pending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for the embedded update and
    /// [`StoreError::NotFound`] for unknown updates or assets.
    fn mark_assets_missing(
        &self,
        update_id: &UpdateId,
        asset_keys: &[AssetKey],
    ) -> Result<Update, StoreError>;

    /// Records when an update was last selected for launch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown updates.
    fn mark_accessed(&self, update_id: &UpdateId, at: Timestamp) -> Result<(), StoreError>;

    /// Deletes updates and their assets, skipping the embedded update.
    ///
    /// Returns the records that were deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when deletion fails.
    fn delete_updates(&self, update_ids: &[UpdateId]) -> Result<Vec<Update>, StoreError>;

    /// Loads the manifest filters saved for a scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when reading fails.
    fn manifest_filters(&self, scope_key: &ScopeKey) -> Result<Option<ManifestFilters>, StoreError>;

    /// Saves the manifest filters for a scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when writing fails.
    fn set_manifest_filters(
        &self,
        scope_key: &ScopeKey,
        filters: &ManifestFilters,
        at: Timestamp,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Transport collaborator errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request timed out.
    #[error("transport timed out: {0}")]
    Timeout(String),
    /// The request was cancelled.
    #[error("transport cancelled")]
    Cancelled,
    /// The request failed.
    #[error("transport failed: {0}")]
    Failed(String),
}

/// Fetches the latest manifest for this client.
pub trait ManifestSource: Send + Sync {
    /// Returns the latest manifest envelope, or `None` when no update is offered.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the fetch fails.
    fn fetch_manifest(&self) -> Result<Option<ManifestEnvelope>, TransportError>;
}

/// Downloads asset bytes.
pub trait AssetFetcher: Send + Sync {
    /// Returns the bytes of `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the download fails, times out, or is cancelled.
    fn fetch_asset(&self, asset: &Asset) -> Result<Vec<u8>, TransportError>;
}

// ============================================================================
// SECTION: Platform
// ============================================================================

/// Checks the application bundle for native resources.
pub trait EmbeddedResources: Send + Sync {
    /// Returns true when the `file:///android_asset/` or `file:///android_res/`
    /// reference exists in the bundle.
    fn contains(&self, reference: &str) -> bool;
}

/// Time source for runtime operations.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}
