// crates/update-gate-core/src/codesigning/certificate.rs
// ============================================================================
// Module: Certificate Store
// Description: Parsed X.509 certificates and PEM chain splitting.
// Purpose: Represent untrusted certificate bytes as immutable typed values.
// Dependencies: der, rsa, rustls-pki-types, sha2, x509-cert
// ============================================================================

//! ## Overview
//! A [`Certificate`] is built once from DER bytes and never mutated. It keeps
//! the encoded TBS section and signature so that chain validation can check
//! issuer signatures, plus the decoded fields trust decisions depend on.
//! Only RSA subject keys are accepted; certificate signatures may use
//! SHA-256, SHA-384, or SHA-512 with PKCS#1 v1.5.
//!
//! Security posture: all inputs are untrusted; any decoding failure is a
//! [`TrustError::CertificateParse`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use der::Decode;
use der::Encode;
use der::oid::ObjectIdentifier;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::Signature;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use sha2::Sha256;
use sha2::Sha384;
use sha2::Sha512;
use x509_cert::name::Name;
use x509_cert::time::Time;

use crate::codesigning::error::TrustError;
use crate::codesigning::extensions::CODE_SIGNING_OID;
use crate::codesigning::extensions::CertificateExtensions;
use crate::codesigning::extensions::ProjectInformation;
use crate::codesigning::extensions::decode_extensions;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Signature Algorithms
// ============================================================================

/// `sha256WithRSAEncryption`.
pub const SHA256_WITH_RSA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
/// `sha384WithRSAEncryption`.
pub const SHA384_WITH_RSA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
/// `sha512WithRSAEncryption`.
pub const SHA512_WITH_RSA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

// ============================================================================
// SECTION: Certificate
// ============================================================================

/// Parsed, immutable certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// Original DER encoding.
    der: Vec<u8>,
    /// DER encoding of the signed TBS section.
    tbs_der: Vec<u8>,
    /// Algorithm the issuer used to sign the TBS section.
    signature_algorithm: ObjectIdentifier,
    /// Issuer signature over the TBS section.
    signature: Vec<u8>,
    /// Start of the validity window.
    not_before: Timestamp,
    /// End of the validity window.
    not_after: Timestamp,
    /// Subject RSA public key.
    public_key: RsaPublicKey,
    /// Issuer distinguished name.
    issuer: Name,
    /// Subject distinguished name.
    subject: Name,
    /// Decoded extensions.
    extensions: CertificateExtensions,
}

impl Certificate {
    /// Parses a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::CertificateParse`] for malformed DER, a non-RSA subject
    /// key, inconsistent signature algorithms, or malformed extensions.
    pub fn from_der(bytes: &[u8]) -> Result<Self, TrustError> {
        let parsed = x509_cert::Certificate::from_der(bytes)
            .map_err(|err| TrustError::CertificateParse(err.to_string()))?;
        let tbs = parsed.tbs_certificate;
        if tbs.signature.oid != parsed.signature_algorithm.oid {
            return Err(TrustError::CertificateParse(
                "tbs and outer signature algorithms differ".to_string(),
            ));
        }
        let tbs_der = tbs.to_der().map_err(|err| TrustError::CertificateParse(err.to_string()))?;
        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|err| TrustError::CertificateParse(err.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|err| TrustError::CertificateParse(format!("unsupported public key: {err}")))?;
        let extensions = decode_extensions(tbs.extensions.as_deref().unwrap_or_default())?;
        Ok(Self {
            der: bytes.to_vec(),
            tbs_der,
            signature_algorithm: parsed.signature_algorithm.oid,
            signature: parsed.signature.raw_bytes().to_vec(),
            not_before: x509_time_to_timestamp(tbs.validity.not_before)?,
            not_after: x509_time_to_timestamp(tbs.validity.not_after)?,
            public_key,
            issuer: tbs.issuer,
            subject: tbs.subject,
            extensions,
        })
    }

    /// Returns the original DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the start of the validity window.
    #[must_use]
    pub const fn not_before(&self) -> Timestamp {
        self.not_before
    }

    /// Returns the end of the validity window.
    #[must_use]
    pub const fn not_after(&self) -> Timestamp {
        self.not_after
    }

    /// Returns the subject public key.
    #[must_use]
    pub const fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Returns the issuer name.
    #[must_use]
    pub const fn issuer(&self) -> &Name {
        &self.issuer
    }

    /// Returns the subject name.
    #[must_use]
    pub const fn subject(&self) -> &Name {
        &self.subject
    }

    /// Returns true when basic constraints mark the certificate as a CA.
    #[must_use]
    pub const fn is_ca(&self) -> bool {
        self.extensions.is_ca
    }

    /// Returns the declared path length constraint.
    #[must_use]
    pub const fn path_len_constraint(&self) -> Option<u8> {
        self.extensions.path_len_constraint
    }

    /// Returns the project information claim, if any.
    #[must_use]
    pub const fn project_information(&self) -> Option<&ProjectInformation> {
        self.extensions.project_information.as_ref()
    }

    /// Returns true when the certificate may sign manifests: `digitalSignature`
    /// key usage plus the `codeSigning` extended key usage.
    #[must_use]
    pub fn is_code_signing(&self) -> bool {
        let digital_signature =
            self.extensions.key_usage.is_some_and(|usage| usage.digital_signature);
        digital_signature && self.extensions.extended_key_usage.contains(&CODE_SIGNING_OID)
    }

    /// Returns true when the certificate may issue other certificates.
    #[must_use]
    pub fn is_certificate_authority(&self) -> bool {
        self.extensions.is_ca && self.extensions.key_usage.is_some_and(|usage| usage.key_cert_sign)
    }

    /// Returns true when `at` lies inside the validity window (inclusive).
    #[must_use]
    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Returns true when the TBS signature verifies under `issuer_key`.
    #[must_use]
    pub fn is_signed_by(&self, issuer_key: &RsaPublicKey) -> bool {
        verify_pkcs1v15(self.signature_algorithm, issuer_key, &self.tbs_der, &self.signature)
    }

    /// Returns true when `issuer` names and signed this certificate.
    #[must_use]
    pub fn is_issued_by(&self, issuer: &Self) -> bool {
        self.issuer == issuer.subject && self.is_signed_by(&issuer.public_key)
    }

    /// Returns true when the certificate names itself as issuer and verifies
    /// under its own key.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject && self.is_signed_by(&self.public_key)
    }
}

// ============================================================================
// SECTION: PEM
// ============================================================================

/// Splits a PEM bundle into DER certificate buffers in order.
///
/// # Errors
///
/// Returns [`TrustError::CertificateParse`] when a PEM section is malformed.
pub fn parse_pem_chain(pem: &str) -> Result<Vec<Vec<u8>>, TrustError> {
    let mut certificates = Vec::new();
    for item in CertificateDer::pem_slice_iter(pem.as_bytes()) {
        let der = item.map_err(|err| TrustError::CertificateParse(format!("pem: {err}")))?;
        certificates.push(der.as_ref().to_vec());
    }
    Ok(certificates)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts an X.509 time to a millisecond timestamp.
fn x509_time_to_timestamp(time: Time) -> Result<Timestamp, TrustError> {
    let millis = i64::try_from(time.to_unix_duration().as_millis())
        .map_err(|_| TrustError::CertificateParse("validity out of range".to_string()))?;
    Ok(Timestamp::from_unix_millis(millis))
}

/// Verifies an RSA PKCS#1 v1.5 signature for a certificate signature algorithm.
fn verify_pkcs1v15(
    algorithm: ObjectIdentifier,
    key: &RsaPublicKey,
    message: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    if algorithm == SHA256_WITH_RSA_OID {
        VerifyingKey::<Sha256>::new(key.clone()).verify(message, &signature).is_ok()
    } else if algorithm == SHA384_WITH_RSA_OID {
        VerifyingKey::<Sha384>::new(key.clone()).verify(message, &signature).is_ok()
    } else if algorithm == SHA512_WITH_RSA_OID {
        VerifyingKey::<Sha512>::new(key.clone()).verify(message, &signature).is_ok()
    } else {
        false
    }
}
