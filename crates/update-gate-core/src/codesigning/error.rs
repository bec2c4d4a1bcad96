// crates/update-gate-core/src/codesigning/error.rs
// ============================================================================
// Module: Code Signing Errors
// Description: Typed failures for certificate chains and signature checks.
// Purpose: Give every trust failure a distinct, terminal variant.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Chain validation and signature verification fail fast with these errors
//! and never recover internally. Only the manifest trust gate turns them into
//! a rejection decision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Certificate and chain-of-trust failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// No certificates were supplied.
    #[error("certificate chain is empty")]
    CertificateEmpty,
    /// A certificate buffer could not be parsed.
    #[error("certificate parse error: {0}")]
    CertificateParse(String),
    /// The validation time falls outside a certificate's validity window.
    #[error("certificate not valid at requested time: {0}")]
    CertificateValidity(String),
    /// The leaf lacks code signing usage.
    #[error("leaf certificate is not a code signing certificate")]
    CertificateMissingCodeSigning,
    /// The chain is broken or violates CA constraints.
    #[error("certificate chain error: {0}")]
    CertificateChain(String),
    /// The last certificate is not self-signed.
    #[error("root certificate is not self-signed")]
    CertificateRootNotSelfSigned,
    /// Certificates in the chain disagree on project information.
    #[error("certificate chain project information is inconsistent")]
    CertificateProjectInformationChain,
}

impl TrustError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CertificateEmpty => "certificate_empty",
            Self::CertificateParse(_) => "certificate_parse",
            Self::CertificateValidity(_) => "certificate_validity",
            Self::CertificateMissingCodeSigning => "certificate_missing_code_signing",
            Self::CertificateChain(_) => "certificate_chain",
            Self::CertificateRootNotSelfSigned => "certificate_root_not_self_signed",
            Self::CertificateProjectInformationChain => "certificate_project_information_chain",
        }
    }
}

/// Signature verification failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The algorithm identifier is not in the supported table.
    #[error("unsupported signing algorithm: {0}")]
    AlgorithmParse(String),
    /// Inputs were malformed (bad base64, wrong signature size).
    #[error("signature verification engine error: {0}")]
    Engine(String),
}

impl SignatureError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AlgorithmParse(_) => "algorithm_parse",
            Self::Engine(_) => "signature_engine",
        }
    }
}
