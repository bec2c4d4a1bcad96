// crates/update-gate-core/src/core/mod.rs
// ============================================================================
// Module: Update Gate Core Types
// Description: Canonical update, asset, manifest, and identifier types.
// Purpose: Provide stable, serializable types shared by stores, gate, and selector.
// Dependencies: serde, serde_json, time, uuid
// ============================================================================

//! ## Overview
//! Core types describe updates and their assets, the manifest schema they are
//! materialized from, timestamps, hashing helpers, and the structured header
//! grammar used by signature and filter headers.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod manifest;
pub mod model;
pub mod structured_headers;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::AssetKey;
pub use identifiers::IdentifierError;
pub use identifiers::RuntimeVersion;
pub use identifiers::ScopeKey;
pub use identifiers::UpdateId;
pub use manifest::ManifestEnvelope;
pub use manifest::ManifestError;
pub use manifest::ManifestFilters;
pub use manifest::UpdateManifest;
pub use manifest::parse_embedded_manifest;
pub use model::Asset;
pub use model::AssetResolution;
pub use model::AssetStatus;
pub use model::DEFAULT_FAILED_LAUNCH_THRESHOLD;
pub use model::LaunchOutcome;
pub use model::Update;
pub use model::UpdateStateError;
pub use model::UpdateStatus;
pub use time::TimeError;
pub use time::Timestamp;
