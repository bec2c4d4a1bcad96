// crates/update-gate-core/src/codesigning/config.rs
// ============================================================================
// Module: Code Signing Configuration
// Description: Build-time trust anchors, signing metadata, and signature headers.
// Purpose: Resolve which certificate chain verifies a given manifest.
// Dependencies: crate::codesigning, crate::core
// ============================================================================

//! ## Overview
//! A [`CodeSigningConfiguration`] is fixed for the process lifetime. It holds
//! the embedded certificate chain, the expected `keyid` and algorithm, whether
//! the server may deliver leaf and intermediate certificates alongside the
//! manifest, and whether unsigned manifests are tolerated.
//!
//! Security posture: when response certificates are allowed they are only
//! ever prepended to the embedded chain, so the embedded root still anchors
//! trust.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::codesigning::certificate::parse_pem_chain;
use crate::codesigning::error::SignatureError;
use crate::codesigning::error::TrustError;
use crate::codesigning::signature::CodeSigningAlgorithm;
use crate::codesigning::signature::SignatureVerifier;
use crate::core::structured_headers::HeaderError;
use crate::core::structured_headers::StructuredItem;
use crate::core::structured_headers::parse_dictionary;
use crate::core::structured_headers::serialize_dictionary;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default key identifier for the embedded certificate.
pub const DEFAULT_KEY_ID: &str = "root";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building a configuration or reading signature headers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodeSigningConfigError {
    /// Embedded certificate material is unusable.
    #[error("embedded certificate invalid: {0}")]
    Certificate(#[from] TrustError),
    /// Configured algorithm is unsupported.
    #[error(transparent)]
    Algorithm(#[from] SignatureError),
    /// Key identifier is empty.
    #[error("code signing keyid must be non-empty")]
    EmptyKeyId,
    /// Key identifier cannot be carried in a structured header.
    #[error("code signing keyid not representable in a header: {0}")]
    UnrepresentableKeyId(#[from] HeaderError),
}

/// Errors raised while parsing a signature header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureHeaderError {
    /// Header was not a structured dictionary.
    #[error("signature header malformed: {0}")]
    Malformed(String),
    /// Header lacked a string `sig` member.
    #[error("signature header missing sig")]
    MissingSignature,
    /// A member had the wrong item type.
    #[error("signature header member {0} must be a string")]
    WrongType(&'static str),
}

// ============================================================================
// SECTION: Signature Header
// ============================================================================

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Base64 signature.
    pub signature: String,
    /// Key identifier (defaults to [`DEFAULT_KEY_ID`]).
    pub key_id: String,
    /// Declared algorithm, if any.
    pub algorithm: Option<String>,
}

impl SignatureHeader {
    /// Parses a `sig="…", keyid="…", alg="…"` dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureHeaderError`] when the header is malformed or lacks `sig`.
    pub fn parse(header: &str) -> Result<Self, SignatureHeaderError> {
        let dictionary = parse_dictionary(header)
            .map_err(|err| SignatureHeaderError::Malformed(err.to_string()))?;
        let signature = match dictionary.get("sig") {
            Some(StructuredItem::String(value)) => value.clone(),
            Some(_) => return Err(SignatureHeaderError::WrongType("sig")),
            None => return Err(SignatureHeaderError::MissingSignature),
        };
        let key_id = match dictionary.get("keyid") {
            Some(StructuredItem::String(value)) => value.clone(),
            Some(_) => return Err(SignatureHeaderError::WrongType("keyid")),
            None => DEFAULT_KEY_ID.to_string(),
        };
        let algorithm = match dictionary.get("alg") {
            Some(StructuredItem::String(value)) => Some(value.clone()),
            Some(_) => return Err(SignatureHeaderError::WrongType("alg")),
            None => None,
        };
        Ok(Self {
            signature,
            key_id,
            algorithm,
        })
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Build-time code signing configuration.
#[derive(Debug, Clone)]
pub struct CodeSigningConfiguration {
    /// Embedded chain as DER buffers, leaf (or sole root) first.
    embedded_certificates: Vec<Vec<u8>>,
    /// Expected key identifier.
    key_id: String,
    /// Expected algorithm.
    algorithm: CodeSigningAlgorithm,
    /// Whether response certificates are prepended to the embedded chain.
    include_manifest_response_certificate_chain: bool,
    /// Whether manifests without a signature header are admitted unverified.
    allow_unsigned_manifests: bool,
    /// Serialized `expo-expect-signature` header value.
    accept_signature_header: String,
}

impl CodeSigningConfiguration {
    /// Builds a configuration from an embedded PEM chain.
    ///
    /// `algorithm` follows [`SignatureVerifier::algorithm_from_header`]: `None`
    /// selects the default.
    ///
    /// # Errors
    ///
    /// Returns [`CodeSigningConfigError`] when the PEM holds no certificates,
    /// the keyid is empty or not representable in a header, or the algorithm
    /// is unknown.
    pub fn new(
        embedded_certificate_pem: &str,
        key_id: Option<&str>,
        algorithm: Option<&str>,
        include_manifest_response_certificate_chain: bool,
        allow_unsigned_manifests: bool,
    ) -> Result<Self, CodeSigningConfigError> {
        let embedded_certificates = parse_pem_chain(embedded_certificate_pem)?;
        if embedded_certificates.is_empty() {
            return Err(CodeSigningConfigError::Certificate(TrustError::CertificateEmpty));
        }
        let key_id = key_id.unwrap_or(DEFAULT_KEY_ID).trim().to_string();
        if key_id.is_empty() {
            return Err(CodeSigningConfigError::EmptyKeyId);
        }
        let algorithm = SignatureVerifier::algorithm_from_header(algorithm)?;
        let accept_signature_header = serialize_dictionary(vec![
            ("sig", StructuredItem::Boolean(true)),
            ("keyid", StructuredItem::String(key_id.clone())),
            ("alg", StructuredItem::String(algorithm.as_str().to_string())),
        ])?;
        Ok(Self {
            embedded_certificates,
            key_id,
            algorithm,
            include_manifest_response_certificate_chain,
            allow_unsigned_manifests,
            accept_signature_header,
        })
    }

    /// Returns the expected key identifier.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> CodeSigningAlgorithm {
        self.algorithm
    }

    /// Returns the embedded chain.
    #[must_use]
    pub fn embedded_certificates(&self) -> &[Vec<u8>] {
        &self.embedded_certificates
    }

    /// Returns true when response certificates are prepended to the embedded chain.
    #[must_use]
    pub const fn includes_manifest_response_certificate_chain(&self) -> bool {
        self.include_manifest_response_certificate_chain
    }

    /// Returns true when unsigned manifests are admitted unverified.
    #[must_use]
    pub const fn allows_unsigned_manifests(&self) -> bool {
        self.allow_unsigned_manifests
    }

    /// Returns the header value advertising the expected signature.
    #[must_use]
    pub fn accept_signature_header(&self) -> &str {
        &self.accept_signature_header
    }

    /// Returns the chain that verifies a manifest with the given response certificates.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::CertificateParse`] when the response PEM is malformed.
    pub fn resolve_chain(
        &self,
        response_certificate_pem: Option<&str>,
    ) -> Result<Vec<Vec<u8>>, TrustError> {
        let mut chain = Vec::new();
        if self.include_manifest_response_certificate_chain
            && let Some(pem) = response_certificate_pem
        {
            chain.extend(parse_pem_chain(pem)?);
        }
        chain.extend(self.embedded_certificates.iter().cloned());
        Ok(chain)
    }
}
