// crates/update-gate-core/src/core/model.rs
// ============================================================================
// Module: Update Gate Data Model
// Description: Updates, assets, and their status state machines.
// Purpose: Keep status transitions in one place so every store applies them identically.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! An [`Update`] owns its [`Asset`] records. Status moves
//! `Pending -> Ready -> Launchable`; an update whose consecutive failed launches
//! reach the configured threshold is marked ineligible, which is terminal and
//! only removes it from selection. The embedded update sits outside this
//! machine: it is never demoted and never marked ineligible.
//!
//! Stores call the mutation helpers on this type inside their own
//! serialization (lock or transaction) and persist the result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::AssetKey;
use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of consecutive failed launches that makes an update ineligible.
pub const DEFAULT_FAILED_LAUNCH_THRESHOLD: u32 = 1;

// ============================================================================
// SECTION: Status Enums
// ============================================================================

/// Update lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Admitted; at least one asset is not resolved yet.
    Pending,
    /// Every asset is resolved; never launched successfully.
    Ready,
    /// Launched successfully at least once.
    Launchable,
    /// Bundled into the application build.
    Embedded,
}

impl UpdateStatus {
    /// Returns the stable persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Launchable => "launchable",
            Self::Embedded => "embedded",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "launchable" => Some(Self::Launchable),
            "embedded" => Some(Self::Embedded),
            _ => None,
        }
    }
}

/// Asset resolution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Not downloaded (or cache entry lost).
    Unresolved,
    /// Available locally.
    Resolved,
    /// Last resolution attempt failed.
    Failed,
}

impl AssetStatus {
    /// Returns the stable persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unresolved" => Some(Self::Unresolved),
            "resolved" => Some(Self::Resolved),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Result of one launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// The update booted successfully.
    Succeeded,
    /// The update crashed or failed to boot.
    Failed,
}

impl LaunchOutcome {
    /// Maps a boolean success flag to an outcome.
    #[must_use]
    pub const fn from_success(succeeded: bool) -> Self {
        if succeeded { Self::Succeeded } else { Self::Failed }
    }
}

/// Outcome reported by the asset download collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetResolution {
    /// Asset bytes are in the cache under `relative_path`.
    Resolved {
        /// Cache file name relative to the cache directory.
        relative_path: String,
        /// When the download completed.
        download_time: Timestamp,
    },
    /// Download or verification failed (timeouts included).
    Failed {
        /// Failure detail.
        reason: String,
    },
    /// Download was cancelled before completion.
    Cancelled,
    /// Asset ships in the application bundle as part of the embedded update.
    Embedded,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by status transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateStateError {
    /// The update has no asset with the given key.
    #[error("update {update_id} has no asset {asset_key}")]
    UnknownAsset {
        /// Update identifier.
        update_id: UpdateId,
        /// Missing asset key.
        asset_key: AssetKey,
    },
    /// The embedded update cannot be demoted.
    #[error("embedded update {0} cannot be demoted")]
    EmbeddedImmutable(UpdateId),
}

// ============================================================================
// SECTION: Asset
// ============================================================================

/// Asset record owned by one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Content-derived key declared by the manifest.
    pub key: AssetKey,
    /// Declared download URL.
    pub url: Option<String>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Declared file extension (with or without a leading dot).
    pub file_extension: Option<String>,
    /// Declared base64url SHA-256 of the content.
    pub expected_hash: Option<String>,
    /// True for the bundle entry point.
    pub is_launch_asset: bool,
    /// True when the asset ships inside the application build.
    pub embedded: bool,
    /// Bundle file name for `file:///android_asset/` references.
    pub embedded_asset_filename: Option<String>,
    /// Resource folder for density-qualified references.
    pub resources_folder: Option<String>,
    /// Resource file name (without extension) for density-qualified references.
    pub resources_filename: Option<String>,
    /// Density scale factor for density-qualified references.
    pub scale: Option<f64>,
    /// Resolution status.
    pub status: AssetStatus,
    /// Cache file name once resolved.
    pub relative_path: Option<String>,
    /// When the asset was resolved.
    pub download_time: Option<Timestamp>,
}

impl Asset {
    /// Creates an unresolved, non-embedded asset with no declared metadata.
    #[must_use]
    pub fn new(key: impl Into<AssetKey>) -> Self {
        Self {
            key: key.into(),
            url: None,
            content_type: None,
            file_extension: None,
            expected_hash: None,
            is_launch_asset: false,
            embedded: false,
            embedded_asset_filename: None,
            resources_folder: None,
            resources_filename: None,
            scale: None,
            status: AssetStatus::Unresolved,
            relative_path: None,
            download_time: None,
        }
    }

    /// Returns true when the asset is resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status == AssetStatus::Resolved
    }

    /// Returns the file extension without a leading dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.file_extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
    }

    /// Returns the cache file name: the key followed by `.<extension>` when declared.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        self.extension().map_or_else(
            || self.key.as_str().to_string(),
            |ext| format!("{}.{ext}", self.key.as_str()),
        )
    }
}

// ============================================================================
// SECTION: Update
// ============================================================================

/// Update record with its owned assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Manifest identifier.
    pub id: UpdateId,
    /// Application scope.
    pub scope_key: ScopeKey,
    /// Project identifier declared by the manifest.
    pub project_id: Option<String>,
    /// Runtime version the update targets.
    pub runtime_version: RuntimeVersion,
    /// Manifest creation time.
    pub created_at: Timestamp,
    /// Parsed manifest body.
    pub manifest: Value,
    /// Lifecycle status.
    pub status: UpdateStatus,
    /// True when the manifest passed code-signing verification.
    pub is_verified: bool,
    /// Total successful launches.
    pub successful_launch_count: u32,
    /// Total failed launches.
    pub failed_launch_count: u32,
    /// Failed launches since the last success.
    pub consecutive_failed_launch_count: u32,
    /// Terminal flag removing the update from selection.
    pub ineligible: bool,
    /// Last time the update was selected for launch.
    pub last_accessed: Option<Timestamp>,
    /// Owned assets in manifest order.
    pub assets: Vec<Asset>,
}

impl Update {
    /// Returns true for the bundled update.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.status == UpdateStatus::Embedded
    }

    /// Returns true when the update may be considered for launch.
    #[must_use]
    pub fn is_launch_eligible(&self) -> bool {
        !self.ineligible && matches!(self.status, UpdateStatus::Ready | UpdateStatus::Launchable)
    }

    /// Looks up an asset by key.
    #[must_use]
    pub fn asset(&self, key: &AssetKey) -> Option<&Asset> {
        self.assets.iter().find(|asset| &asset.key == key)
    }

    /// Returns the launch asset, if declared.
    #[must_use]
    pub fn launch_asset(&self) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.is_launch_asset)
    }

    /// Returns true when every asset is resolved.
    #[must_use]
    pub fn all_assets_resolved(&self) -> bool {
        self.assets.iter().all(Asset::is_resolved)
    }

    /// Returns the manifest `metadata` object used for filter matching.
    #[must_use]
    pub fn manifest_metadata(&self) -> Option<&Map<String, Value>> {
        self.manifest.get("metadata").and_then(Value::as_object)
    }

    /// Promotes `Pending` to `Ready` when every asset is resolved.
    ///
    /// Returns true when the transition happened.
    pub fn promote_if_complete(&mut self) -> bool {
        if self.status == UpdateStatus::Pending && self.all_assets_resolved() {
            self.status = UpdateStatus::Ready;
            return true;
        }
        false
    }

    /// Applies a download outcome to one asset.
    ///
    /// Cancellation never resolves an asset; a failure demotes a ready or
    /// launchable update back to `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateStateError::UnknownAsset`] when the key is not owned by this update.
    pub fn apply_asset_resolution(
        &mut self,
        key: &AssetKey,
        resolution: AssetResolution,
    ) -> Result<(), UpdateStateError> {
        let update_id = self.id;
        let asset =
            self.assets.iter_mut().find(|asset| &asset.key == key).ok_or_else(|| {
                UpdateStateError::UnknownAsset {
                    update_id,
                    asset_key: key.clone(),
                }
            })?;
        let mut failed = false;
        match resolution {
            AssetResolution::Resolved {
                relative_path,
                download_time,
            } => {
                asset.status = AssetStatus::Resolved;
                asset.relative_path = Some(relative_path);
                asset.download_time = Some(download_time);
            }
            AssetResolution::Failed {
                ..
            } => {
                asset.status = AssetStatus::Failed;
                failed = true;
            }
            AssetResolution::Cancelled => {
                if asset.status != AssetStatus::Resolved {
                    asset.status = AssetStatus::Unresolved;
                }
            }
            AssetResolution::Embedded => {
                asset.status = AssetStatus::Resolved;
                asset.embedded = true;
                asset.relative_path = None;
                asset.download_time = None;
            }
        }
        if failed && matches!(self.status, UpdateStatus::Ready | UpdateStatus::Launchable) {
            self.status = UpdateStatus::Pending;
        }
        self.promote_if_complete();
        Ok(())
    }

    /// Marks assets whose local copy disappeared and demotes the update to `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateStateError::EmbeddedImmutable`] for the embedded update and
    /// [`UpdateStateError::UnknownAsset`] for keys the update does not own.
    pub fn mark_assets_missing(&mut self, keys: &[AssetKey]) -> Result<(), UpdateStateError> {
        if self.is_embedded() {
            return Err(UpdateStateError::EmbeddedImmutable(self.id));
        }
        for key in keys {
            if self.asset(key).is_none() {
                return Err(UpdateStateError::UnknownAsset {
                    update_id: self.id,
                    asset_key: key.clone(),
                });
            }
        }
        for asset in &mut self.assets {
            if keys.contains(&asset.key) {
                asset.status = AssetStatus::Unresolved;
                asset.relative_path = None;
                asset.download_time = None;
            }
        }
        if !keys.is_empty() {
            self.status = UpdateStatus::Pending;
        }
        Ok(())
    }

    /// Records one launch attempt.
    ///
    /// A success resets the consecutive failure count and promotes `Ready` to
    /// `Launchable`. Consecutive failures reaching `failed_launch_threshold`
    /// make a non-embedded update ineligible for good.
    pub fn apply_launch_outcome(&mut self, outcome: LaunchOutcome, failed_launch_threshold: u32) {
        match outcome {
            LaunchOutcome::Succeeded => {
                self.successful_launch_count = self.successful_launch_count.saturating_add(1);
                self.consecutive_failed_launch_count = 0;
                if self.status == UpdateStatus::Ready {
                    self.status = UpdateStatus::Launchable;
                }
            }
            LaunchOutcome::Failed => {
                self.failed_launch_count = self.failed_launch_count.saturating_add(1);
                self.consecutive_failed_launch_count =
                    self.consecutive_failed_launch_count.saturating_add(1);
                if !self.is_embedded()
                    && self.consecutive_failed_launch_count >= failed_launch_threshold.max(1)
                {
                    self.ineligible = true;
                }
            }
        }
    }
}
