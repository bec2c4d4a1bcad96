// crates/update-gate-core/src/runtime/selector.rs
// ============================================================================
// Module: Launch Selector
// Description: Chooses the update to boot and resolves its assets.
// Purpose: Never launch an ineligible, incompatible, or incomplete update.
// Dependencies: crate::audit, crate::core, crate::interfaces, crate::runtime::assets
// ============================================================================

//! ## Overview
//! Selection runs against a store snapshot:
//! - Candidates are `Ready`/`Launchable`, eligible, in the selector's scope,
//!   runtime-compatible, and match the scope's saved manifest filters.
//! - The newest candidate wins (`created_at`, then id).
//! - Without a candidate the embedded update is used.
//!
//! Every asset of the winner must resolve to a bundle reference or a cache
//! file. A candidate with missing assets is demoted in the store and
//! selection restarts without it. The embedded update failing to resolve is
//! the one fatal startup condition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::audit::LaunchAuditAction;
use crate::audit::LaunchAuditEvent;
use crate::audit::UpdatesAuditSink;
use crate::core::ManifestFilters;
use crate::core::identifiers::AssetKey;
use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::model::Update;
use crate::core::time::Timestamp;
use crate::interfaces::StoreError;
use crate::interfaces::UpdateStore;
use crate::runtime::assets::AssetLocation;
use crate::runtime::assets::AssetLocator;

// ============================================================================
// SECTION: Runtime Compatibility
// ============================================================================

/// Decides whether an update built for one runtime version may run on another.
pub trait RuntimeCompatibility: Send + Sync {
    /// Returns true when `update` can run on the `running` runtime.
    fn is_compatible(&self, update: &RuntimeVersion, running: &RuntimeVersion) -> bool;
}

/// Built-in runtime compatibility policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeCompatibilityPolicy {
    /// Versions must be identical.
    #[default]
    Exact,
    /// Leading dot-separated components must be identical.
    MajorVersion,
}

impl RuntimeCompatibility for RuntimeCompatibilityPolicy {
    fn is_compatible(&self, update: &RuntimeVersion, running: &RuntimeVersion) -> bool {
        match self {
            Self::Exact => update == running,
            Self::MajorVersion => update.major_component() == running.major_component(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Launch selection errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Nothing can be launched, not even the embedded update.
    #[error("no launchable update: {0}")]
    NoLaunchableUpdate(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Update chosen for launch with every asset resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchCandidate {
    /// Selected update.
    pub update: Update,
    /// Location of every asset by key.
    pub assets: BTreeMap<AssetKey, AssetLocation>,
    /// Location of the bundle entry point.
    pub launch_asset: AssetLocation,
    /// True when the embedded update was used because nothing newer qualified.
    pub is_embedded_fallback: bool,
}

/// Launch selector bound to one scope.
pub struct LaunchSelector {
    /// Scope whose updates are considered.
    scope_key: ScopeKey,
    /// Runtime compatibility predicate.
    compatibility: Arc<dyn RuntimeCompatibility>,
    /// Asset resolution.
    locator: AssetLocator,
    /// Selection log.
    audit: Arc<dyn UpdatesAuditSink>,
}

// ============================================================================
// SECTION: Selection
// ============================================================================

impl LaunchSelector {
    /// Creates a selector.
    #[must_use]
    pub fn new(
        scope_key: ScopeKey,
        compatibility: Arc<dyn RuntimeCompatibility>,
        locator: AssetLocator,
        audit: Arc<dyn UpdatesAuditSink>,
    ) -> Self {
        Self {
            scope_key,
            compatibility,
            locator,
            audit,
        }
    }

    /// Returns the asset locator.
    #[must_use]
    pub const fn locator(&self) -> &AssetLocator {
        &self.locator
    }

    /// Returns true when `update` may be selected ahead of the embedded fallback.
    #[must_use]
    pub fn is_candidate(
        &self,
        update: &Update,
        runtime_version: &RuntimeVersion,
        filters: Option<&ManifestFilters>,
    ) -> bool {
        update.is_launch_eligible()
            && update.scope_key == self.scope_key
            && self.compatibility.is_compatible(&update.runtime_version, runtime_version)
            && filters.is_none_or(|filters| filters.matches(update))
    }

    /// Picks the update to launch and resolves its assets.
    ///
    /// Candidates with unresolvable assets are demoted in `store` and skipped.
    /// The chosen update's `last_accessed` is set to `at`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::NoLaunchableUpdate`] when neither a candidate nor
    /// the embedded update can be launched, and [`LaunchError::Store`] on store
    /// failure.
    pub fn select_for_launch(
        &self,
        store: &dyn UpdateStore,
        runtime_version: &RuntimeVersion,
        at: Timestamp,
    ) -> Result<LaunchCandidate, LaunchError> {
        let filters = store.manifest_filters(&self.scope_key)?;
        let mut excluded: BTreeSet<UpdateId> = BTreeSet::new();
        loop {
            let snapshot = store.all()?;
            let newest = newest_update(snapshot.updates.iter().filter(|update| {
                !excluded.contains(&update.id)
                    && self.is_candidate(update, runtime_version, filters.as_ref())
            }));
            let (update, is_embedded_fallback) = match newest {
                Some(update) => (update.clone(), false),
                None => match snapshot.embedded() {
                    Some(embedded) => (embedded.clone(), true),
                    None => {
                        return Err(self.fatal(at, None, "no candidate and no embedded update"));
                    }
                },
            };

            match self.resolve_assets(&update) {
                Ok((assets, launch_asset)) => {
                    store.mark_accessed(&update.id, at)?;
                    let action = if is_embedded_fallback {
                        LaunchAuditAction::EmbeddedFallback
                    } else {
                        LaunchAuditAction::Selected
                    };
                    self.audit.record_launch(&LaunchAuditEvent::new(
                        at,
                        Some(&update.id),
                        action,
                        None,
                    ));
                    return Ok(LaunchCandidate {
                        update,
                        assets,
                        launch_asset,
                        is_embedded_fallback,
                    });
                }
                Err(missing) => {
                    let keys = join_keys(&missing);
                    if update.is_embedded() {
                        return Err(self.fatal(
                            at,
                            Some(&update.id),
                            &format!("embedded update has unresolvable assets: {keys}"),
                        ));
                    }
                    store.mark_assets_missing(&update.id, &missing)?;
                    self.audit.record_launch(&LaunchAuditEvent::new(
                        at,
                        Some(&update.id),
                        LaunchAuditAction::Demoted,
                        Some(format!("unresolvable assets: {keys}")),
                    ));
                    excluded.insert(update.id);
                }
            }
        }
    }

    /// Resolves every asset, or returns the keys that could not be resolved.
    fn resolve_assets(
        &self,
        update: &Update,
    ) -> Result<(BTreeMap<AssetKey, AssetLocation>, AssetLocation), Vec<AssetKey>> {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();
        for asset in &update.assets {
            match self.locator.locate(asset) {
                Some(location) => {
                    resolved.insert(asset.key.clone(), location);
                }
                None => missing.push(asset.key.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(missing);
        }
        let launch_asset = update
            .launch_asset()
            .and_then(|asset| resolved.get(&asset.key))
            .cloned()
            .ok_or_else(Vec::new)?;
        Ok((resolved, launch_asset))
    }

    /// Records and builds the fatal selection error.
    fn fatal(&self, at: Timestamp, update_id: Option<&UpdateId>, message: &str) -> LaunchError {
        self.audit.record_launch(&LaunchAuditEvent::new(
            at,
            update_id,
            LaunchAuditAction::NoLaunchableUpdate,
            Some(message.to_string()),
        ));
        LaunchError::NoLaunchableUpdate(message.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the newest update by creation time, breaking ties by the larger id.
pub fn newest_update<'a>(updates: impl IntoIterator<Item = &'a Update>) -> Option<&'a Update> {
    updates.into_iter().max_by_key(|update| (update.created_at, update.id))
}

/// Returns true when `candidate` should replace the `launched` update.
///
/// The candidate must match `filters`. It wins when nothing is launched, when
/// the launched update no longer matches `filters`, or when it is newer.
#[must_use]
pub fn should_load_new_update(
    candidate: Option<&Update>,
    launched: Option<&Update>,
    filters: Option<&ManifestFilters>,
) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    if let Some(filters) = filters
        && !filters.matches(candidate)
    {
        return false;
    }
    let Some(launched) = launched else {
        return true;
    };
    if let Some(filters) = filters
        && !filters.matches(launched)
    {
        return true;
    }
    candidate.created_at > launched.created_at
}

/// Joins asset keys for messages.
fn join_keys(keys: &[AssetKey]) -> String {
    keys.iter().map(AssetKey::as_str).collect::<Vec<_>>().join(", ")
}
