// crates/update-gate-core/tests/signature.rs
// ============================================================================
// Module: Signature Verifier Tests
// Description: Algorithm selection and RSA PKCS#1 v1.5 verification.
// ============================================================================
//! ## Overview
//! Signature mismatches are a `false` result; malformed inputs are engine
//! errors; unknown algorithms never fall back to the default.

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

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPublicKey;
use update_gate_core::CodeSigningAlgorithm;
use update_gate_core::SignatureError;
use update_gate_core::SignatureVerifier;
use update_gate_core::codesigning::Certificate;

use crate::common::LEAF_KEY;
use crate::common::OTHER_KEY;
use crate::common::leaf_params;
use crate::common::self_signed;
use crate::common::sign_body;
use crate::common::test_key;

const BODY: &[u8] = br#"{"id":"0754dad0-d200-d634-113c-ef1f26106028"}"#;

fn leaf_public_key() -> RsaPublicKey {
    RsaPublicKey::from(&test_key(LEAF_KEY).private)
}

#[test]
fn default_algorithm_equals_explicit_canonical_identifier() {
    let implicit = SignatureVerifier::algorithm_from_header(None).unwrap();
    let explicit = SignatureVerifier::algorithm_from_header(Some("rsa-v1_5-sha256")).unwrap();
    assert_eq!(implicit, explicit);
    assert_eq!(implicit, CodeSigningAlgorithm::RsaSha256);
    assert_eq!(implicit.as_str(), "rsa-v1_5-sha256");
}

#[test]
fn unknown_algorithm_is_rejected() {
    let err = SignatureVerifier::algorithm_from_header(Some("ecdsa-p256-sha256")).unwrap_err();
    assert!(matches!(err, SignatureError::AlgorithmParse(_)), "{err:?}");
    assert_eq!(err.kind(), "algorithm_parse");
}

#[test]
fn matching_signature_verifies() {
    let signature = sign_body(LEAF_KEY, BODY);
    let key = leaf_public_key();
    let verified =
        SignatureVerifier::verify(BODY, &signature, CodeSigningAlgorithm::RsaSha256, &key).unwrap();
    assert!(verified);
}

#[test]
fn certificate_public_key_verifies_its_own_signatures() {
    let cert = self_signed(&leaf_params("Signer"), LEAF_KEY);
    let parsed = Certificate::from_der(cert.der()).unwrap();
    let signature = sign_body(LEAF_KEY, BODY);
    assert!(
        SignatureVerifier::verify(
            BODY,
            &signature,
            CodeSigningAlgorithm::default(),
            parsed.public_key()
        )
        .unwrap()
    );
}

#[test]
fn tampered_body_does_not_verify() {
    let signature = sign_body(LEAF_KEY, BODY);
    let mut tampered = BODY.to_vec();
    tampered.push(b' ');
    let verified = SignatureVerifier::verify(
        &tampered,
        &signature,
        CodeSigningAlgorithm::RsaSha256,
        &leaf_public_key(),
    )
    .unwrap();
    assert!(!verified);
}

#[test]
fn signature_from_another_key_does_not_verify() {
    let signature = sign_body(OTHER_KEY, BODY);
    let key = leaf_public_key();
    let verified =
        SignatureVerifier::verify(BODY, &signature, CodeSigningAlgorithm::RsaSha256, &key).unwrap();
    assert!(!verified);
}

#[test]
fn non_base64_signature_is_an_engine_error() {
    let err = SignatureVerifier::verify(
        BODY,
        "***not base64***",
        CodeSigningAlgorithm::RsaSha256,
        &leaf_public_key(),
    )
    .unwrap_err();
    assert!(matches!(err, SignatureError::Engine(_)), "{err:?}");
}

#[test]
fn truncated_signature_is_an_engine_error() {
    let signature = STANDARD.encode([7_u8; 16]);
    let err = SignatureVerifier::verify(
        BODY,
        &signature,
        CodeSigningAlgorithm::RsaSha256,
        &leaf_public_key(),
    )
    .unwrap_err();
    assert!(matches!(err, SignatureError::Engine(_)), "{err:?}");
}
