// crates/update-gate-core/src/codesigning/extensions.rs
// ============================================================================
// Module: Certificate Extension Decoder
// Description: Typed decoding of the X.509 extensions trust decisions depend on.
// Purpose: Turn raw extension octets into typed fields on a certificate.
// Dependencies: der, x509-cert, serde
// ============================================================================

//! ## Overview
//! Chain validation needs four extensions: basic constraints, key usage,
//! extended key usage, and the project information extension that binds a
//! certificate to one application. Each is decoded into a typed field here so
//! a missing extension (`None`) is distinct from a present but mismatched one.
//!
//! The project information extension value is the UTF-8 text
//! `"<projectId>,<scopeKey>"`, either as raw octets or wrapped in a DER
//! `UTF8String`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use der::Decode;
use der::oid::AssociatedOid;
use der::oid::ObjectIdentifier;
use serde::Deserialize;
use serde::Serialize;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::BasicConstraints;
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::ext::pkix::KeyUsage;

use crate::codesigning::error::TrustError;

// ============================================================================
// SECTION: Object Identifiers
// ============================================================================

/// Extended key usage `id-kp-codeSigning`.
pub const CODE_SIGNING_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");

/// Project information extension.
pub const PROJECT_INFORMATION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap(
    "1.2.840.113556.1.8000.2554.43437.254.128.102.157.7894389.20439.2.1",
);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Project scope claim carried by a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectInformation {
    /// Application scope key.
    pub scope_key: String,
    /// Project identifier.
    pub project_id: String,
}

/// Key usage bits relevant to code signing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsageFlags {
    /// `digitalSignature` bit.
    pub digital_signature: bool,
    /// `keyCertSign` bit.
    pub key_cert_sign: bool,
}

/// Decoded extension fields for one certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateExtensions {
    /// Basic constraints `cA` flag.
    pub is_ca: bool,
    /// Basic constraints `pathLenConstraint`.
    pub path_len_constraint: Option<u8>,
    /// Key usage bits; `None` when the extension is absent.
    pub key_usage: Option<KeyUsageFlags>,
    /// Extended key usage purposes.
    pub extended_key_usage: Vec<ObjectIdentifier>,
    /// Project information claim.
    pub project_information: Option<ProjectInformation>,
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes the extensions of one certificate.
///
/// # Errors
///
/// Returns [`TrustError::CertificateParse`] when a recognized extension is malformed.
pub fn decode_extensions(extensions: &[Extension]) -> Result<CertificateExtensions, TrustError> {
    let mut decoded = CertificateExtensions::default();
    for extension in extensions {
        let value = extension.extn_value.as_bytes();
        if extension.extn_id == BasicConstraints::OID {
            let constraints = BasicConstraints::from_der(value).map_err(|err| {
                TrustError::CertificateParse(format!("basic constraints: {err}"))
            })?;
            decoded.is_ca = constraints.ca;
            decoded.path_len_constraint = constraints.path_len_constraint;
        } else if extension.extn_id == KeyUsage::OID {
            let usage = KeyUsage::from_der(value)
                .map_err(|err| TrustError::CertificateParse(format!("key usage: {err}")))?;
            decoded.key_usage = Some(KeyUsageFlags {
                digital_signature: usage.digital_signature(),
                key_cert_sign: usage.key_cert_sign(),
            });
        } else if extension.extn_id == ExtendedKeyUsage::OID {
            let usage = ExtendedKeyUsage::from_der(value).map_err(|err| {
                TrustError::CertificateParse(format!("extended key usage: {err}"))
            })?;
            decoded.extended_key_usage = usage.0;
        } else if extension.extn_id == PROJECT_INFORMATION_OID {
            decoded.project_information = Some(decode_project_information(value)?);
        }
    }
    Ok(decoded)
}

/// Decodes a project information extension value.
///
/// # Errors
///
/// Returns [`TrustError::CertificateParse`] unless the value is UTF-8 text with
/// exactly two non-empty comma-separated components.
pub fn decode_project_information(value: &[u8]) -> Result<ProjectInformation, TrustError> {
    let text = match String::from_der(value) {
        Ok(text) => text,
        Err(_) => String::from_utf8(value.to_vec()).map_err(|_| {
            TrustError::CertificateParse("project information is not utf-8".to_string())
        })?,
    };
    let components: Vec<&str> = text.split(',').map(str::trim).collect();
    match components.as_slice() {
        [project_id, scope_key] if !project_id.is_empty() && !scope_key.is_empty() => {
            Ok(ProjectInformation {
                scope_key: (*scope_key).to_string(),
                project_id: (*project_id).to_string(),
            })
        }
        _ => Err(TrustError::CertificateParse(
            "project information must be \"<projectId>,<scopeKey>\"".to_string(),
        )),
    }
}
