// crates/update-gate-core/tests/chain_validation.rs
// ============================================================================
// Module: Certificate Chain Validation Tests
// Description: Chain-of-trust rules over rcgen-issued RSA certificates.
// ============================================================================
//! ## Overview
//! Covers single-certificate chains, broken chains, root self-signature,
//! validity windows, CA constraints, and project information consistency.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]
#![allow(dead_code, reason = "Common module may have unused helpers.")]

mod common;

use rcgen::IsCa;
use update_gate_core::CertificateChainValidator;
use update_gate_core::ProjectInformation;
use update_gate_core::Timestamp;
use update_gate_core::TrustError;
use update_gate_core::codesigning::Certificate;

use crate::common::INTERMEDIATE_KEY;
use crate::common::LEAF_KEY;
use crate::common::OTHER_KEY;
use crate::common::PROJECT_ID;
use crate::common::ROOT_KEY;
use crate::common::SCOPE_KEY;
use crate::common::StandardChain;
use crate::common::ca_params;
use crate::common::ders;
use crate::common::issue;
use crate::common::issue_ca;
use crate::common::leaf_params;
use crate::common::self_signed;
use crate::common::self_signed_ca;
use crate::common::test_time;
use crate::common::with_project;

fn expected_project() -> ProjectInformation {
    ProjectInformation {
        scope_key: SCOPE_KEY.to_string(),
        project_id: PROJECT_ID.to_string(),
    }
}

// ============================================================================
// SECTION: Single Certificate
// ============================================================================

#[test]
fn single_self_signed_code_signing_certificate_validates() {
    let cert = self_signed(&leaf_params("Solo Signer"), LEAF_KEY);
    let validated = CertificateChainValidator::validate(&ders(&[&cert]), test_time()).unwrap();
    assert!(validated.project_information.is_none());
    assert_eq!(validated.leaf.der(), cert.der().as_ref());
}

#[test]
fn single_certificate_without_code_signing_is_rejected() {
    let mut params = leaf_params("No Code Signing");
    params.extended_key_usages.clear();
    let cert = self_signed(&params, LEAF_KEY);
    let err = CertificateChainValidator::validate(&ders(&[&cert]), test_time()).unwrap_err();
    assert_eq!(err, TrustError::CertificateMissingCodeSigning);
}

#[test]
fn single_expired_certificate_is_rejected() {
    let mut params = leaf_params("Expired Signer");
    params.not_after = rcgen::date_time_ymd(2021, 1, 1);
    let cert = self_signed(&params, LEAF_KEY);
    let err = CertificateChainValidator::validate(&ders(&[&cert]), test_time()).unwrap_err();
    assert!(matches!(err, TrustError::CertificateValidity(_)), "{err:?}");
}

#[test]
fn certificate_is_rejected_before_its_validity_window() {
    let cert = self_signed(&leaf_params("Future Signer"), LEAF_KEY);
    let before = Timestamp::parse_rfc3339("2019-06-01T00:00:00Z").unwrap();
    let err = CertificateChainValidator::validate(&ders(&[&cert]), before).unwrap_err();
    assert!(matches!(err, TrustError::CertificateValidity(_)), "{err:?}");
}

#[test]
fn single_certificate_issued_by_another_key_is_not_self_signed() {
    let root = self_signed_ca(ca_params("Hidden Root", None), ROOT_KEY);
    let leaf = issue(&leaf_params("Orphan Leaf"), LEAF_KEY, &root);
    let err = CertificateChainValidator::validate(&ders(&[&leaf]), test_time()).unwrap_err();
    assert_eq!(err, TrustError::CertificateRootNotSelfSigned);
}

#[test]
fn empty_chain_is_rejected() {
    let chain: Vec<Vec<u8>> = Vec::new();
    let err = CertificateChainValidator::validate(&chain, test_time()).unwrap_err();
    assert_eq!(err, TrustError::CertificateEmpty);
}

#[test]
fn garbage_bytes_are_a_parse_error() {
    let err = CertificateChainValidator::validate(&[b"not a certificate".to_vec()], test_time())
        .unwrap_err();
    assert!(matches!(err, TrustError::CertificateParse(_)), "{err:?}");
    assert_eq!(err.kind(), "certificate_parse");
}

// ============================================================================
// SECTION: Three Certificate Chains
// ============================================================================

#[test]
fn valid_three_certificate_chain_returns_project_information() {
    let chain = StandardChain::new();
    let validated = CertificateChainValidator::validate(&chain.ders(), test_time()).unwrap();
    assert_eq!(validated.project_information, Some(expected_project()));
    let leaf = Certificate::from_der(chain.leaf.der()).unwrap();
    assert_eq!(validated.leaf.public_key(), leaf.public_key());
}

#[test]
fn omitting_the_intermediate_breaks_the_chain() {
    let chain = StandardChain::new();
    let err = CertificateChainValidator::validate(
        &ders(&[&chain.leaf, &chain.root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateChain(_)), "{err:?}");
}

#[test]
fn substituted_intermediate_breaks_the_chain() {
    let chain = StandardChain::new();
    let impostor = issue_ca(ca_params("Impostor Intermediate", None), OTHER_KEY, &chain.root);
    let err = CertificateChainValidator::validate(
        &ders(&[&chain.leaf, &impostor.cert, &chain.root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateChain(_)), "{err:?}");
}

#[test]
fn intermediate_with_same_name_but_other_key_fails_signature_check() {
    let chain = StandardChain::new();
    let forged = issue_ca(
        with_project(ca_params("Update Gate Test Intermediate", Some(0)), PROJECT_ID, SCOPE_KEY),
        OTHER_KEY,
        &chain.root,
    );
    let err = CertificateChainValidator::validate(
        &ders(&[&chain.leaf, &forged.cert, &chain.root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateChain(_)), "{err:?}");
}

#[test]
fn chain_ending_in_a_non_self_signed_certificate_is_rejected() {
    let chain = StandardChain::new();
    let err = CertificateChainValidator::validate(
        &ders(&[&chain.leaf, &chain.intermediate.cert]),
        test_time(),
    )
    .unwrap_err();
    assert_eq!(err, TrustError::CertificateRootNotSelfSigned);
}

#[test]
fn non_ca_intermediate_is_rejected() {
    let root = self_signed_ca(ca_params("Root", None), ROOT_KEY);
    let mut params = ca_params("Not A CA", None);
    params.is_ca = IsCa::ExplicitNoCa;
    let intermediate = issue_ca(params, INTERMEDIATE_KEY, &root);
    let leaf = issue(&leaf_params("Leaf"), LEAF_KEY, &intermediate);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &intermediate.cert, &root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateChain(_)), "{err:?}");
}

#[test]
fn expired_intermediate_is_rejected() {
    let root = self_signed_ca(ca_params("Root", None), ROOT_KEY);
    let mut params = ca_params("Expired Intermediate", None);
    params.not_after = rcgen::date_time_ymd(2021, 1, 1);
    let intermediate = issue_ca(params, INTERMEDIATE_KEY, &root);
    let leaf = issue(&leaf_params("Leaf"), LEAF_KEY, &intermediate);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &intermediate.cert, &root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateValidity(_)), "{err:?}");
}

#[test]
fn leaf_without_code_signing_is_rejected_in_a_chain() {
    let chain = StandardChain::new();
    let mut params = leaf_params("Server Leaf");
    params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];
    let leaf = issue(&params, LEAF_KEY, &chain.intermediate);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &chain.intermediate.cert, &chain.root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert_eq!(err, TrustError::CertificateMissingCodeSigning);
}

// ============================================================================
// SECTION: Path Length
// ============================================================================

#[test]
fn root_path_length_zero_forbids_intermediates() {
    let root = self_signed_ca(ca_params("Tight Root", Some(0)), ROOT_KEY);
    let intermediate = issue_ca(ca_params("Intermediate", None), INTERMEDIATE_KEY, &root);
    let leaf = issue(&leaf_params("Leaf"), LEAF_KEY, &intermediate);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &intermediate.cert, &root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateChain(_)), "{err:?}");
}

#[test]
fn root_path_length_one_allows_one_intermediate() {
    let root = self_signed_ca(ca_params("Root", Some(1)), ROOT_KEY);
    let intermediate = issue_ca(ca_params("Intermediate", Some(0)), INTERMEDIATE_KEY, &root);
    let leaf = issue(&leaf_params("Leaf"), LEAF_KEY, &intermediate);
    let chain = ders(&[&leaf, &intermediate.cert, &root.cert]);
    CertificateChainValidator::validate(&chain, test_time()).unwrap();
}

#[test]
fn tightest_ancestor_constraint_applies() {
    let root = self_signed_ca(ca_params("Root", None), ROOT_KEY);
    let upper = issue_ca(ca_params("Upper", Some(0)), INTERMEDIATE_KEY, &root);
    let lower = issue_ca(ca_params("Lower", None), OTHER_KEY, &upper);
    let leaf = issue(&leaf_params("Leaf"), LEAF_KEY, &lower);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &lower.cert, &upper.cert, &root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustError::CertificateChain(_)), "{err:?}");
}

// ============================================================================
// SECTION: Project Information
// ============================================================================

#[test]
fn differing_scope_keys_between_leaf_and_intermediate_are_rejected() {
    let root = self_signed_ca(ca_params("Root", None), ROOT_KEY);
    let intermediate = issue_ca(
        with_project(ca_params("Intermediate", None), PROJECT_ID, SCOPE_KEY),
        INTERMEDIATE_KEY,
        &root,
    );
    let params = with_project(leaf_params("Leaf"), PROJECT_ID, "@other/app");
    let leaf = issue(&params, LEAF_KEY, &intermediate);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &intermediate.cert, &root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert_eq!(err, TrustError::CertificateProjectInformationChain);
}

#[test]
fn leaf_dropping_an_inherited_claim_is_rejected() {
    let root = self_signed_ca(ca_params("Root", None), ROOT_KEY);
    let intermediate = issue_ca(
        with_project(ca_params("Intermediate", None), PROJECT_ID, SCOPE_KEY),
        INTERMEDIATE_KEY,
        &root,
    );
    let leaf = issue(&leaf_params("Leaf"), LEAF_KEY, &intermediate);
    let err = CertificateChainValidator::validate(
        &ders(&[&leaf, &intermediate.cert, &root.cert]),
        test_time(),
    )
    .unwrap_err();
    assert_eq!(err, TrustError::CertificateProjectInformationChain);
}

#[test]
fn claim_on_leaf_only_is_returned() {
    let root = self_signed_ca(ca_params("Root", None), ROOT_KEY);
    let intermediate = issue_ca(ca_params("Intermediate", None), INTERMEDIATE_KEY, &root);
    let params = with_project(leaf_params("Leaf"), PROJECT_ID, SCOPE_KEY);
    let leaf = issue(&params, LEAF_KEY, &intermediate);
    let validated = CertificateChainValidator::validate(
        &ders(&[&leaf, &intermediate.cert, &root.cert]),
        test_time(),
    )
    .unwrap();
    assert_eq!(validated.project_information, Some(expected_project()));
}

#[test]
fn malformed_project_information_is_a_parse_error() {
    let mut params = leaf_params("Bad Claim");
    params.custom_extensions.push(rcgen::CustomExtension::from_oid_content(
        &common::PROJECT_INFORMATION_ARCS,
        b"only-one-component".to_vec(),
    ));
    let cert = self_signed(&params, LEAF_KEY);
    let err = CertificateChainValidator::validate(&ders(&[&cert]), test_time()).unwrap_err();
    assert!(matches!(err, TrustError::CertificateParse(_)), "{err:?}");
}
