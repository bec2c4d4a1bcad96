// crates/update-gate-config/src/lib.rs
// ============================================================================
// Module: Update Gate Config Library
// Description: Canonical config model, validation, and runtime assembly.
// Purpose: Single source of truth for update-gate.toml semantics.
// Dependencies: update-gate-core, update-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `update-gate-config` defines the configuration model for the update
//! client. It loads `update-gate.toml` with strict, fail-closed validation and
//! assembles the store, audit sink, trust gate, and runtime it describes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assembly;
pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assembly::*;
pub use config::*;
