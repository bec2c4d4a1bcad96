// crates/update-gate-core/src/lib.rs
// ============================================================================
// Module: Update Gate Core Library
// Description: Public API surface for the Update Gate core.
// Purpose: Expose trust primitives, data model, interfaces, and runtime flows.
// Dependencies: crate::{audit, codesigning, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Update Gate core is the trust-and-launch engine of an over-the-air update
//! client. It validates manifest certificate chains and signatures before a
//! manifest is trusted, keeps the update/asset records, and decides which
//! update is safe to launch. Persistence, transport, and native resource
//! access are reached only through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod codesigning;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::UpdatesAuditSink;
pub use codesigning::CertificateChainValidator;
pub use codesigning::CodeSigningAlgorithm;
pub use codesigning::CodeSigningConfiguration;
pub use codesigning::ProjectInformation;
pub use codesigning::SignatureError;
pub use codesigning::SignatureVerifier;
pub use codesigning::TrustError;
pub use interfaces::AssetFetcher;
pub use interfaces::Clock;
pub use interfaces::EmbeddedResources;
pub use interfaces::InsertOutcome;
pub use interfaces::ManifestSource;
pub use interfaces::StoreError;
pub use interfaces::TransportError;
pub use interfaces::UpdateSnapshot;
pub use interfaces::UpdateStore;
pub use runtime::AdmissionError;
pub use runtime::AdmittedUpdate;
pub use runtime::AssetCache;
pub use runtime::AssetLocation;
pub use runtime::AssetLocator;
pub use runtime::BundledResources;
pub use runtime::InMemoryUpdateStore;
pub use runtime::LaunchCandidate;
pub use runtime::LaunchError;
pub use runtime::LaunchSelector;
pub use runtime::ManifestTrustGate;
pub use runtime::RejectionError;
pub use runtime::RuntimeCompatibility;
pub use runtime::RuntimeCompatibilityPolicy;
pub use runtime::SystemClock;
pub use runtime::UpdatesRuntime;
pub use runtime::UpdatesRuntimeParts;
