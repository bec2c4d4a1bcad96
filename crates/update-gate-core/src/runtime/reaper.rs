// crates/update-gate-core/src/runtime/reaper.rs
// ============================================================================
// Module: Update Reaper
// Description: Removes superseded updates and their cache files.
// Purpose: Bound storage while keeping one rollback target.
// Dependencies: crate::audit, crate::core, crate::interfaces, crate::runtime::assets
// ============================================================================

//! ## Overview
//! After a successful launch, every same-scope update older than the launched
//! one is deleted except the newest of them, which stays as a rollback target
//! (one that matches the manifest filters is preferred). The embedded update
//! is never deleted. Cache files are removed only when no remaining update
//! references their key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::audit::LifecycleAction;
use crate::audit::LifecycleAuditEvent;
use crate::audit::UpdatesAuditSink;
use crate::core::ManifestFilters;
use crate::core::identifiers::UpdateId;
use crate::core::model::Update;
use crate::core::time::Timestamp;
use crate::interfaces::StoreError;
use crate::interfaces::UpdateStore;
use crate::runtime::assets::AssetCache;
use crate::runtime::assets::AssetCacheError;
use crate::runtime::selector::newest_update;

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Returns the ids of updates superseded by `launched`.
#[must_use]
pub fn select_updates_to_delete(
    updates: &[Update],
    launched: &Update,
    filters: Option<&ManifestFilters>,
) -> Vec<UpdateId> {
    let older: Vec<&Update> = updates
        .iter()
        .filter(|update| {
            update.id != launched.id
                && !update.is_embedded()
                && update.scope_key == launched.scope_key
                && update.created_at < launched.created_at
        })
        .collect();
    let retained = filters
        .and_then(|filters| {
            newest_update(older.iter().copied().filter(|update| filters.matches(update)))
        })
        .or_else(|| newest_update(older.iter().copied()))
        .map(|update| update.id);
    older
        .into_iter()
        .map(|update| update.id)
        .filter(|id| Some(*id) != retained)
        .collect()
}

// ============================================================================
// SECTION: Reaper
// ============================================================================

/// Reaper errors.
#[derive(Debug, Error)]
pub enum ReapError {
    /// Store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Cache cleanup failed.
    #[error(transparent)]
    Cache(#[from] AssetCacheError),
    /// The launched update is not stored.
    #[error("launched update {0} not found")]
    UnknownLaunched(UpdateId),
}

/// Summary of one reap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Deleted update ids.
    pub deleted_updates: Vec<UpdateId>,
    /// Removed cache file names.
    pub removed_files: Vec<String>,
}

/// Deletes superseded updates.
pub struct Reaper {
    /// Deletion log.
    audit: Arc<dyn UpdatesAuditSink>,
}

impl Reaper {
    /// Creates a reaper.
    #[must_use]
    pub fn new(audit: Arc<dyn UpdatesAuditSink>) -> Self {
        Self {
            audit,
        }
    }

    /// Deletes updates superseded by `launched` and their unreferenced cache files.
    ///
    /// # Errors
    ///
    /// Returns [`ReapError`] when the launched update is unknown or store or
    /// cache access fails.
    pub fn reap(
        &self,
        store: &dyn UpdateStore,
        cache: &AssetCache,
        launched: &UpdateId,
        at: Timestamp,
    ) -> Result<ReapReport, ReapError> {
        let snapshot = store.all()?;
        let launched_update =
            snapshot.get(launched).ok_or(ReapError::UnknownLaunched(*launched))?;
        let filters = store.manifest_filters(&launched_update.scope_key)?;
        let doomed = select_updates_to_delete(&snapshot.updates, launched_update, filters.as_ref());
        if doomed.is_empty() {
            return Ok(ReapReport::default());
        }
        let deleted = store.delete_updates(&doomed)?;

        let remaining = store.all()?;
        let referenced: BTreeSet<String> = remaining
            .updates
            .iter()
            .flat_map(|update| update.assets.iter())
            .map(AssetCache::file_name_for)
            .collect();
        let mut removed_files = Vec::new();
        for update in &deleted {
            for asset in update.assets.iter().filter(|asset| !asset.embedded) {
                let name = AssetCache::file_name_for(asset);
                if !referenced.contains(&name)
                    && !removed_files.contains(&name)
                    && cache.remove(&name)?
                {
                    removed_files.push(name);
                }
            }
            self.audit.record_lifecycle(&LifecycleAuditEvent::new(
                at,
                &update.id,
                LifecycleAction::Deleted,
            ));
        }
        Ok(ReapReport {
            deleted_updates: deleted.iter().map(|update| update.id).collect(),
            removed_files,
        })
    }
}
