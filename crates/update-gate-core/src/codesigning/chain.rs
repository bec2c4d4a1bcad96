// crates/update-gate-core/src/codesigning/chain.rs
// ============================================================================
// Module: Certificate Chain Validator
// Description: Ordered chain-of-trust validation with project scope extraction.
// Purpose: Decide whether a leaf certificate may be trusted to sign manifests.
// Dependencies: crate::codesigning, crate::core
// ============================================================================

//! ## Overview
//! The validator walks an ordered chain (index 0 = leaf, last = root) and
//! fails at the first violation, in this order: empty chain, parse failure,
//! validity window, leaf code-signing usage, issuer linkage and signatures,
//! CA status of every issuer, path length constraints, self-signed root, and
//! project information consistency.
//!
//! A path length constraint on the certificate at index `k` bounds the number
//! of intermediates strictly between the leaf and that certificate (`k - 1`).
//! For the root this is the total number of intermediates in the chain.
//!
//! Project information may first appear anywhere in the chain; from there
//! down to the leaf every certificate must repeat it exactly.
//!
//! Validation is pure and synchronous; the validation time is always passed in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::codesigning::certificate::Certificate;
use crate::codesigning::error::TrustError;
use crate::codesigning::extensions::ProjectInformation;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of a successful chain validation.
#[derive(Debug, Clone)]
pub struct ValidatedChain {
    /// Leaf certificate whose key signs manifests.
    pub leaf: Certificate,
    /// Project scope claim shared by the chain, if any.
    pub project_information: Option<ProjectInformation>,
}

/// Stateless certificate chain validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateChainValidator;

// ============================================================================
// SECTION: Validation
// ============================================================================

impl CertificateChainValidator {
    /// Validates `certificates` (DER, leaf first) at time `at`.
    ///
    /// # Errors
    ///
    /// Returns the [`TrustError`] for the first violated rule.
    pub fn validate<B: AsRef<[u8]>>(
        certificates: &[B],
        at: Timestamp,
    ) -> Result<ValidatedChain, TrustError> {
        if certificates.is_empty() {
            return Err(TrustError::CertificateEmpty);
        }
        let chain = certificates
            .iter()
            .map(|buffer| Certificate::from_der(buffer.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        for (index, certificate) in chain.iter().enumerate() {
            if !certificate.is_valid_at(at) {
                return Err(TrustError::CertificateValidity(format!(
                    "certificate {index} valid from {} to {}, checked at {at}",
                    certificate.not_before(),
                    certificate.not_after()
                )));
            }
        }

        let (leaf, ancestors) = match chain.split_first() {
            Some(split) => split,
            None => return Err(TrustError::CertificateEmpty),
        };
        if !leaf.is_code_signing() {
            return Err(TrustError::CertificateMissingCodeSigning);
        }

        for (index, pair) in chain.windows(2).enumerate() {
            if let [child, issuer] = pair
                && !child.is_issued_by(issuer)
            {
                return Err(TrustError::CertificateChain(format!(
                    "certificate {index} is not issued by certificate {}",
                    index + 1
                )));
            }
        }

        for (offset, ancestor) in ancestors.iter().enumerate() {
            let index = offset + 1;
            if !ancestor.is_certificate_authority() {
                return Err(TrustError::CertificateChain(format!(
                    "certificate {index} is not a certificate authority"
                )));
            }
        }

        for (offset, ancestor) in ancestors.iter().enumerate() {
            let intermediates_below = offset;
            if let Some(limit) = ancestor.path_len_constraint()
                && intermediates_below > usize::from(limit)
            {
                return Err(TrustError::CertificateChain(format!(
                    "certificate {} allows {limit} intermediates, chain has {intermediates_below}",
                    offset + 1
                )));
            }
        }

        let root = chain.last().unwrap_or(leaf);
        if !root.is_self_signed() {
            return Err(TrustError::CertificateRootNotSelfSigned);
        }

        let project_information = consistent_project_information(&chain)?;
        Ok(ValidatedChain {
            leaf: leaf.clone(),
            project_information,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the project claim of the chain.
///
/// Walking from the root toward the leaf, once a certificate carries a claim
/// every certificate below it must carry the identical claim. Distinct claims
/// therefore always fail, and the leaf's claim is the chain's claim.
fn consistent_project_information(
    chain: &[Certificate],
) -> Result<Option<ProjectInformation>, TrustError> {
    let mut inherited: Option<&ProjectInformation> = None;
    for certificate in chain.iter().rev() {
        let claim = certificate.project_information();
        if inherited.is_some() && claim != inherited {
            return Err(TrustError::CertificateProjectInformationChain);
        }
        if claim.is_some() {
            inherited = claim;
        }
    }
    Ok(chain.first().and_then(Certificate::project_information).cloned())
}
