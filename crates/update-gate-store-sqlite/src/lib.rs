// crates/update-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Update Store
// Description: Durable UpdateStore backend using SQLite.
// Purpose: Persist updates, assets, and per-scope data across restarts.
// Dependencies: update-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`UpdateStore`] implementation. Update
//! and asset records live in relational tables; manifests are stored as
//! canonical JSON with a digest that is verified on every load.
//!
//! [`UpdateStore`]: update_gate_core::UpdateStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_MANIFEST_BYTES;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteUpdateStore;
