// crates/update-gate-core/src/runtime/updates.rs
// ============================================================================
// Module: Updates Runtime
// Description: Process-wide wiring of gate, store, selector, and cache.
// Purpose: Drive fetch, admission, download, launch, and cleanup flows.
// Dependencies: crate::audit, crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`UpdatesRuntime`] receives every collaborator at construction and holds no
//! global state. It is `Send + Sync` and intended to be created once per
//! process and shared.
//!
//! Assets a downloaded update declares as bundled resolve from the bundle only
//! when they match an asset of the installed embedded update; otherwise they
//! are downloaded like any other asset.
//!
//! Download outcomes: a transport failure or timeout marks the asset
//! `Failed`; a cancellation leaves it `Unresolved`; bytes whose hash differs
//! from the manifest declaration are never written to the cache.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::audit::LifecycleAction;
use crate::audit::LifecycleAuditEvent;
use crate::audit::UpdatesAuditSink;
use crate::core::hashing::same_asset_digest;
use crate::core::identifiers::AssetKey;
use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::UpdateId;
use crate::core::manifest::ManifestError;
use crate::core::manifest::parse_embedded_manifest;
use crate::core::model::Asset;
use crate::core::model::AssetResolution;
use crate::core::model::LaunchOutcome;
use crate::core::model::Update;
use crate::core::model::UpdateStatus;
use crate::interfaces::AssetFetcher;
use crate::interfaces::Clock;
use crate::interfaces::InsertOutcome;
use crate::interfaces::ManifestSource;
use crate::interfaces::StoreError;
use crate::interfaces::TransportError;
use crate::interfaces::UpdateStore;
use crate::runtime::assets::AssetCache;
use crate::runtime::assets::embedded_reference;
use crate::runtime::gate::AdmissionError;
use crate::runtime::gate::ManifestTrustGate;
use crate::runtime::reaper::ReapError;
use crate::runtime::reaper::ReapReport;
use crate::runtime::reaper::Reaper;
use crate::runtime::selector::LaunchCandidate;
use crate::runtime::selector::LaunchError;
use crate::runtime::selector::LaunchSelector;
use crate::runtime::selector::newest_update;
use crate::runtime::selector::should_load_new_update;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by runtime flows.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Embedded manifest is malformed.
    #[error("embedded manifest invalid: {0}")]
    EmbeddedManifest(#[from] ManifestError),
    /// Manifest admission failed.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// Manifest fetch failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Launch selection failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// Reaping failed.
    #[error(transparent)]
    Reap(#[from] ReapError),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Collaborators required to build an [`UpdatesRuntime`].
pub struct UpdatesRuntimeParts {
    /// Manifest admission gate.
    pub gate: ManifestTrustGate,
    /// Launch selector.
    pub selector: LaunchSelector,
    /// Update store.
    pub store: Arc<dyn UpdateStore>,
    /// Download cache.
    pub cache: AssetCache,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Audit sink.
    pub audit: Arc<dyn UpdatesAuditSink>,
    /// Runtime version of the running binary.
    pub runtime_version: RuntimeVersion,
}

/// Outcome of one update check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Admitted update, when a manifest was offered.
    pub update_id: Option<UpdateId>,
    /// True when the update was new to the store.
    pub inserted: bool,
    /// Status after downloads.
    pub status: Option<UpdateStatus>,
    /// Assets resolved in this check, from the bundle or by verified download.
    pub resolved_assets: Vec<AssetKey>,
    /// Assets whose download or verification failed.
    pub failed_assets: Vec<AssetKey>,
    /// Assets whose download was cancelled.
    pub cancelled_assets: Vec<AssetKey>,
}

/// Process-wide updates runtime.
pub struct UpdatesRuntime {
    /// Manifest admission gate.
    gate: ManifestTrustGate,
    /// Launch selector.
    selector: LaunchSelector,
    /// Superseded update cleanup.
    reaper: Reaper,
    /// Update store.
    store: Arc<dyn UpdateStore>,
    /// Download cache.
    cache: AssetCache,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn UpdatesAuditSink>,
    /// Runtime version of the running binary.
    runtime_version: RuntimeVersion,
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

impl UpdatesRuntime {
    /// Builds the runtime from its parts.
    #[must_use]
    pub fn new(parts: UpdatesRuntimeParts) -> Self {
        Self {
            reaper: Reaper::new(Arc::clone(&parts.audit)),
            gate: parts.gate,
            selector: parts.selector,
            store: parts.store,
            cache: parts.cache,
            clock: parts.clock,
            audit: parts.audit,
            runtime_version: parts.runtime_version,
        }
    }

    /// Returns the update store.
    #[must_use]
    pub fn store(&self) -> &dyn UpdateStore {
        self.store.as_ref()
    }

    /// Returns the admission gate.
    #[must_use]
    pub const fn gate(&self) -> &ManifestTrustGate {
        &self.gate
    }

    /// Returns the download cache.
    #[must_use]
    pub const fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Returns the running runtime version.
    #[must_use]
    pub const fn runtime_version(&self) -> &RuntimeVersion {
        &self.runtime_version
    }

    /// Installs the manifest bundled with the application as the embedded update.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the manifest is malformed or the store
    /// already holds a different embedded update.
    pub fn install_embedded_update(
        &self,
        manifest_body: &[u8],
    ) -> Result<InsertOutcome, RuntimeError> {
        let update = parse_embedded_manifest(manifest_body, self.gate.scope_key())?;
        let outcome = self.store.insert(update)?;
        if outcome.is_inserted() {
            let stored = outcome.update();
            self.audit.record_lifecycle(
                &LifecycleAuditEvent::new(self.clock.now(), &stored.id, LifecycleAction::Inserted)
                    .with_status(stored.status.as_str()),
            );
        }
        Ok(outcome)
    }

    /// Fetches, admits, and downloads the latest update.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the manifest fetch fails, the manifest is
    /// rejected, or the store fails. Asset download failures are recorded on
    /// the asset and reported in [`CheckReport`].
    pub fn check_for_update(
        &self,
        source: &dyn ManifestSource,
        fetcher: &dyn AssetFetcher,
    ) -> Result<CheckReport, RuntimeError> {
        let Some(envelope) = source.fetch_manifest()? else {
            return Ok(CheckReport::default());
        };
        let outcome = self.gate.admit_into(&envelope, self.clock.now(), self.store.as_ref())?;
        let mut report = CheckReport {
            update_id: Some(outcome.update().id),
            inserted: outcome.is_inserted(),
            ..CheckReport::default()
        };
        let mut update = outcome.update().clone();
        let embedded = self.store.all()?.embedded().cloned();
        let pending: Vec<Asset> =
            update.assets.iter().filter(|asset| !asset.is_resolved()).cloned().collect();
        for asset in pending {
            let resolution = self
                .bundled_resolution(&asset, embedded.as_ref())
                .unwrap_or_else(|| self.download(&asset, fetcher));
            match &resolution {
                AssetResolution::Resolved {
                    ..
                }
                | AssetResolution::Embedded => report.resolved_assets.push(asset.key.clone()),
                AssetResolution::Failed {
                    ..
                } => report.failed_assets.push(asset.key.clone()),
                AssetResolution::Cancelled => report.cancelled_assets.push(asset.key.clone()),
            }
            update = self.record_asset_resolution(&update.id, &asset.key, resolution)?;
        }
        report.status = Some(update.status);
        Ok(report)
    }

    /// Records the outcome of resolving one asset of a stored update.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] when the update or asset is unknown.
    pub fn record_asset_resolution(
        &self,
        update_id: &UpdateId,
        asset_key: &AssetKey,
        resolution: AssetResolution,
    ) -> Result<Update, RuntimeError> {
        let (action, message) = match &resolution {
            AssetResolution::Resolved {
                ..
            } => (LifecycleAction::AssetResolved, None),
            AssetResolution::Embedded => {
                (LifecycleAction::AssetResolved, Some("served from application bundle".to_string()))
            }
            AssetResolution::Failed {
                reason,
            } => (LifecycleAction::AssetFailed, Some(reason.clone())),
            AssetResolution::Cancelled => (LifecycleAction::AssetCancelled, None),
        };
        let update = self.store.mark_asset_resolved(update_id, asset_key, resolution)?;
        let mut event = LifecycleAuditEvent::new(self.clock.now(), update_id, action)
            .with_asset(asset_key)
            .with_status(update.status.as_str());
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.audit.record_lifecycle(&event);
        Ok(update)
    }

    /// Verifies downloaded bytes for one asset and records the outcome.
    ///
    /// Bytes whose hash differs from the declaration mark the asset `Failed`
    /// and are not written to the cache.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] when the update or asset is unknown.
    pub fn resolve_asset_bytes(
        &self,
        update_id: &UpdateId,
        asset_key: &AssetKey,
        bytes: &[u8],
    ) -> Result<Update, RuntimeError> {
        let update = self
            .store
            .get(update_id)?
            .ok_or_else(|| StoreError::NotFound(format!("update {update_id}")))?;
        let asset = update
            .assets
            .iter()
            .find(|asset| &asset.key == asset_key)
            .ok_or_else(|| StoreError::NotFound(format!("asset {asset_key}")))?;
        let resolution = match self.cache.store_verified(asset, bytes) {
            Ok(relative_path) => AssetResolution::Resolved {
                relative_path,
                download_time: self.clock.now(),
            },
            Err(err) => AssetResolution::Failed {
                reason: err.to_string(),
            },
        };
        self.record_asset_resolution(update_id, asset_key, resolution)
    }

    /// Resolves an asset from the application bundle instead of downloading it.
    ///
    /// The asset must declare the same key and bundle location as an asset of
    /// the installed embedded update, a declared hash must equal the shipped
    /// one, and the bundle must actually hold the reference.
    fn bundled_resolution(
        &self,
        asset: &Asset,
        embedded: Option<&Update>,
    ) -> Option<AssetResolution> {
        let reference = embedded_reference(asset)?;
        let shipped = embedded?.asset(&asset.key)?;
        if embedded_reference(shipped).as_deref() != Some(reference.as_str()) {
            return None;
        }
        if let Some(declared) = asset.expected_hash.as_deref() {
            let shipped_hash = shipped.expected_hash.as_deref()?;
            if !same_asset_digest(declared, shipped_hash) {
                return None;
            }
        }
        self.selector.locator().is_bundled(&reference).then_some(AssetResolution::Embedded)
    }

    /// Downloads one asset into the cache.
    fn download(&self, asset: &Asset, fetcher: &dyn AssetFetcher) -> AssetResolution {
        match fetcher.fetch_asset(asset) {
            Ok(bytes) => match self.cache.store_verified(asset, &bytes) {
                Ok(relative_path) => AssetResolution::Resolved {
                    relative_path,
                    download_time: self.clock.now(),
                },
                Err(err) => AssetResolution::Failed {
                    reason: err.to_string(),
                },
            },
            Err(TransportError::Cancelled) => AssetResolution::Cancelled,
            Err(err) => AssetResolution::Failed {
                reason: err.to_string(),
            },
        }
    }

    /// Selects the update for the next launch.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Launch`] when nothing can be launched.
    pub fn select_for_launch(&self) -> Result<LaunchCandidate, RuntimeError> {
        Ok(self.selector.select_for_launch(
            self.store.as_ref(),
            &self.runtime_version,
            self.clock.now(),
        )?)
    }

    /// Returns true when the newest launchable update should replace `launched`.
    ///
    /// `launched` is the update the running process booted, if any. Ids the
    /// store does not know are treated as nothing launched.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] when the store cannot be read.
    pub fn should_reload(&self, launched: Option<&UpdateId>) -> Result<bool, RuntimeError> {
        let snapshot = self.store.all()?;
        let filters = self.store.manifest_filters(self.gate.scope_key())?;
        let candidate = newest_update(snapshot.updates.iter().filter(|update| {
            self.selector.is_candidate(update, &self.runtime_version, filters.as_ref())
        }));
        let launched = launched.and_then(|id| snapshot.get(id));
        Ok(should_load_new_update(candidate, launched, filters.as_ref()))
    }

    /// Records the outcome of launching `update_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] when the update is unknown.
    pub fn record_launch_outcome(
        &self,
        update_id: &UpdateId,
        outcome: LaunchOutcome,
    ) -> Result<Update, RuntimeError> {
        let was_ineligible = self.store.get(update_id)?.is_some_and(|update| update.ineligible);
        let update = self.store.record_launch_outcome(update_id, outcome)?;
        let at = self.clock.now();
        let action = match outcome {
            LaunchOutcome::Succeeded => LifecycleAction::LaunchSucceeded,
            LaunchOutcome::Failed => LifecycleAction::LaunchFailed,
        };
        self.audit.record_lifecycle(
            &LifecycleAuditEvent::new(at, update_id, action).with_status(update.status.as_str()),
        );
        if update.ineligible && !was_ineligible {
            self.audit.record_lifecycle(
                &LifecycleAuditEvent::new(at, update_id, LifecycleAction::MarkedIneligible)
                    .with_message(format!(
                        "{} consecutive failed launches",
                        update.consecutive_failed_launch_count
                    )),
            );
        }
        Ok(update)
    }

    /// Deletes updates superseded by the launched one.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Reap`] when cleanup fails.
    pub fn reap(&self, launched: &UpdateId) -> Result<ReapReport, RuntimeError> {
        Ok(self.reaper.reap(self.store.as_ref(), &self.cache, launched, self.clock.now())?)
    }
}
