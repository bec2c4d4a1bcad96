// crates/update-gate-core/src/codesigning/signature.rs
// ============================================================================
// Module: Signature Verifier
// Description: Closed algorithm table and manifest signature verification.
// Purpose: Check a manifest body against the leaf certificate's public key.
// Dependencies: base64, rsa, sha2
// ============================================================================

//! ## Overview
//! The algorithm table is closed: an absent identifier means the default
//! (`rsa-v1_5-sha256`), a known identifier maps to its algorithm, and anything
//! else is rejected so unknown algorithms never fall back silently.
//!
//! [`SignatureVerifier::verify`] returns `Ok(false)` for a well-formed but
//! incorrect signature and an error only for malformed inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::Signature;
use rsa::pkcs1v15::VerifyingKey;
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::codesigning::error::SignatureError;

// ============================================================================
// SECTION: Algorithms
// ============================================================================

/// Supported manifest signing algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeSigningAlgorithm {
    /// RSA, PKCS#1 v1.5 padding, SHA-256 digest.
    #[default]
    #[serde(rename = "rsa-v1_5-sha256")]
    RsaSha256,
}

impl CodeSigningAlgorithm {
    /// Returns the canonical header identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa-v1_5-sha256",
        }
    }
}

impl fmt::Display for CodeSigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeSigningAlgorithm {
    type Err = SignatureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rsa-v1_5-sha256" => Ok(Self::RsaSha256),
            other => Err(SignatureError::AlgorithmParse(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Stateless manifest signature verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Maps an optional algorithm identifier to an algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::AlgorithmParse`] for unknown identifiers.
    pub fn algorithm_from_header(
        value: Option<&str>,
    ) -> Result<CodeSigningAlgorithm, SignatureError> {
        value.map_or(Ok(CodeSigningAlgorithm::default()), CodeSigningAlgorithm::from_str)
    }

    /// Verifies a base64 signature over `body`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Engine`] when the signature is not base64 or its
    /// length differs from the key modulus.
    pub fn verify(
        body: &[u8],
        signature_base64: &str,
        algorithm: CodeSigningAlgorithm,
        public_key: &RsaPublicKey,
    ) -> Result<bool, SignatureError> {
        let signature_bytes = STANDARD
            .decode(signature_base64.trim())
            .map_err(|err| SignatureError::Engine(format!("signature is not base64: {err}")))?;
        if signature_bytes.len() != public_key.size() {
            return Err(SignatureError::Engine(format!(
                "signature is {} bytes, key modulus is {} bytes",
                signature_bytes.len(),
                public_key.size()
            )));
        }
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|err| SignatureError::Engine(err.to_string()))?;
        match algorithm {
            CodeSigningAlgorithm::RsaSha256 => Ok(VerifyingKey::<Sha256>::new(public_key.clone())
                .verify(body, &signature)
                .is_ok()),
        }
    }
}
