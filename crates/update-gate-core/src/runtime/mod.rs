// crates/update-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Update Gate Runtime
// Description: Trust gate, stores, launch selection, and lifecycle wiring.
// Purpose: Provide the stateful flows built on the pure core and code signing modules.
// Dependencies: crate::audit, crate::codesigning, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime turns fetched manifests into stored updates and stored updates
//! into a launch decision. Collaborators are injected explicitly.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod assets;
pub mod clock;
pub mod gate;
pub mod reaper;
pub mod selector;
pub mod store;
pub mod updates;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assets::AssetCache;
pub use assets::AssetCacheError;
pub use assets::AssetLocation;
pub use assets::AssetLocator;
pub use assets::BundledResources;
pub use assets::density_qualifier;
pub use assets::embedded_reference;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use gate::AdmissionError;
pub use gate::AdmittedUpdate;
pub use gate::ManifestTrustGate;
pub use gate::RejectionError;
pub use reaper::ReapError;
pub use reaper::ReapReport;
pub use reaper::Reaper;
pub use reaper::select_updates_to_delete;
pub use selector::LaunchCandidate;
pub use selector::LaunchError;
pub use selector::LaunchSelector;
pub use selector::RuntimeCompatibility;
pub use selector::RuntimeCompatibilityPolicy;
pub use selector::newest_update;
pub use selector::should_load_new_update;
pub use store::InMemoryUpdateStore;
pub use updates::CheckReport;
pub use updates::RuntimeError;
pub use updates::UpdatesRuntime;
pub use updates::UpdatesRuntimeParts;
