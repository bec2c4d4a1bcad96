// crates/update-gate-core/src/codesigning/mod.rs
// ============================================================================
// Module: Update Gate Code Signing
// Description: Certificates, chain validation, and manifest signature checks.
// Purpose: Group the pure trust primitives used by the manifest trust gate.
// Dependencies: der, rsa, rustls-pki-types, sha2, x509-cert
// ============================================================================

//! ## Overview
//! Everything in this module is pure and synchronous: certificates are parsed
//! from bytes, chains are validated at an explicit time, and signatures are
//! checked against a public key. Failures are typed and terminal.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod certificate;
pub mod chain;
pub mod config;
pub mod error;
pub mod extensions;
pub mod signature;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use certificate::Certificate;
pub use certificate::parse_pem_chain;
pub use chain::CertificateChainValidator;
pub use chain::ValidatedChain;
pub use config::CodeSigningConfigError;
pub use config::CodeSigningConfiguration;
pub use config::DEFAULT_KEY_ID;
pub use config::SignatureHeader;
pub use config::SignatureHeaderError;
pub use error::SignatureError;
pub use error::TrustError;
pub use extensions::CODE_SIGNING_OID;
pub use extensions::PROJECT_INFORMATION_OID;
pub use extensions::ProjectInformation;
pub use signature::CodeSigningAlgorithm;
pub use signature::SignatureVerifier;
