// crates/update-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Update Gate In-Memory Store
// Description: In-memory update store for tests and ephemeral clients.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`UpdateStore`].
//! Writers take the write lock for the whole mutation, so two admissions of
//! the same manifest id are serialized and snapshots never observe a
//! half-applied change. Nothing survives the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::core::ManifestFilters;
use crate::core::identifiers::AssetKey;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::model::AssetResolution;
use crate::core::model::DEFAULT_FAILED_LAUNCH_THRESHOLD;
use crate::core::model::LaunchOutcome;
use crate::core::model::Update;
use crate::core::time::Timestamp;
use crate::interfaces::InsertOutcome;
use crate::interfaces::StoreError;
use crate::interfaces::UpdateSnapshot;
use crate::interfaces::UpdateStore;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Store contents guarded by one lock.
#[derive(Debug, Default)]
struct StoreState {
    /// Updates keyed by id.
    updates: BTreeMap<UpdateId, Update>,
    /// Manifest filters keyed by scope.
    filters: BTreeMap<ScopeKey, ManifestFilters>,
}

/// In-memory update store.
#[derive(Debug, Clone)]
pub struct InMemoryUpdateStore {
    /// Shared state.
    state: Arc<RwLock<StoreState>>,
    /// Consecutive failed launches that make an update ineligible.
    failed_launch_threshold: u32,
}

impl Default for InMemoryUpdateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUpdateStore {
    /// Creates an empty store with the default failed-launch threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_failed_launch_threshold(DEFAULT_FAILED_LAUNCH_THRESHOLD)
    }

    /// Creates an empty store with an explicit failed-launch threshold.
    #[must_use]
    pub fn with_failed_launch_threshold(failed_launch_threshold: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            failed_launch_threshold: failed_launch_threshold.max(1),
        }
    }

    /// Acquires the read lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Store("update store lock poisoned".to_string()))
    }

    /// Acquires the write lock.
    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Store("update store lock poisoned".to_string()))
    }

    /// Applies `mutate` to one stored update and returns the result.
    fn modify<F>(&self, update_id: &UpdateId, mutate: F) -> Result<Update, StoreError>
    where
        F: FnOnce(&mut Update) -> Result<(), StoreError>,
    {
        let mut guard = self.write()?;
        let stored = guard
            .updates
            .get_mut(update_id)
            .ok_or_else(|| StoreError::NotFound(format!("update {update_id}")))?;
        let mut next = stored.clone();
        mutate(&mut next)?;
        *stored = next.clone();
        drop(guard);
        Ok(next)
    }
}

impl UpdateStore for InMemoryUpdateStore {
    fn insert(&self, mut update: Update) -> Result<InsertOutcome, StoreError> {
        let mut guard = self.write()?;
        if let Some(existing) = guard.updates.get(&update.id) {
            return Ok(InsertOutcome::AlreadyExists(existing.clone()));
        }
        if update.is_embedded() && guard.updates.values().any(Update::is_embedded) {
            return Err(StoreError::Invalid(format!(
                "embedded update already installed; refusing {}",
                update.id
            )));
        }
        update.promote_if_complete();
        guard.updates.insert(update.id, update.clone());
        drop(guard);
        Ok(InsertOutcome::Inserted(update))
    }

    fn mark_asset_resolved(
        &self,
        update_id: &UpdateId,
        asset_key: &AssetKey,
        resolution: AssetResolution,
    ) -> Result<Update, StoreError> {
        self.modify(update_id, |update| {
            update.apply_asset_resolution(asset_key, resolution).map_err(StoreError::from)
        })
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
    }

    fn all(&self) -> Result<UpdateSnapshot, StoreError> {
        let guard = self.read()?;
        Ok(UpdateSnapshot {
            updates: guard.updates.values().cloned().collect(),
        })
    }

    fn get(&self, update_id: &UpdateId) -> Result<Option<Update>, StoreError> {
        Ok(self.read()?.updates.get(update_id).cloned())
    }

    fn mark_assets_missing(
        &self,
        update_id: &UpdateId,
        asset_keys: &[AssetKey],
    ) -> Result<Update, StoreError> {
        self.modify(update_id, |update| {
            update.mark_assets_missing(asset_keys).map_err(StoreError::from)
        })
    }

    fn mark_accessed(&self, update_id: &UpdateId, at: Timestamp) -> Result<(), StoreError> {
        self.modify(update_id, |update| {
            update.last_accessed = Some(at);
            Ok(())
        })
        .map(|_| ())
    }

    fn delete_updates(&self, update_ids: &[UpdateId]) -> Result<Vec<Update>, StoreError> {
        let mut guard = self.write()?;
        let mut deleted = Vec::new();
        for update_id in update_ids {
            if guard.updates.get(update_id).is_some_and(|update| !update.is_embedded())
                && let Some(update) = guard.updates.remove(update_id)
            {
                deleted.push(update);
            }
        }
        drop(guard);
        Ok(deleted)
    }

    fn manifest_filters(
        &self,
        scope_key: &ScopeKey,
    ) -> Result<Option<ManifestFilters>, StoreError> {
        Ok(self.read()?.filters.get(scope_key).cloned())
    }

    fn set_manifest_filters(
        &self,
        scope_key: &ScopeKey,
        filters: &ManifestFilters,
        _at: Timestamp,
    ) -> Result<(), StoreError> {
        self.write()?.filters.insert(scope_key.clone(), filters.clone());
        Ok(())
    }
}
