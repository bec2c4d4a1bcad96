// crates/update-gate-config/tests/assembly.rs
// ============================================================================
// Module: Runtime Assembly Tests
// Description: Build stores, sinks, and runtimes from validated config.
// Purpose: Ensure configured collaborators are wired and fail closed.
// ============================================================================

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

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use update_gate_config::AssemblyError;
use update_gate_config::ConfigError;
use update_gate_config::UpdateGateConfig;
use update_gate_core::LaunchError;
use update_gate_core::Timestamp;
use update_gate_core::TrustError;
use update_gate_core::UpdateStatus;
use update_gate_core::codesigning::CodeSigningConfigError;
use update_gate_core::runtime::ManualClock;
use update_gate_core::runtime::RuntimeError;

const UPDATES: &str = r#"
[updates]
scope_key = "https://updates.example.test/app"
runtime_version = "1.0.0"
"#;

/// Minimal DER-shaped certificate block; parsing only extracts PEM payloads.
const PLACEHOLDER_PEM: &str = "-----BEGIN CERTIFICATE-----\nMAA=\n-----END CERTIFICATE-----\n";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Timestamp::from_unix_millis(1_780_000_000_000)))
}

fn embedded_manifest(dir: &Path) -> String {
    let path = dir.join("app.manifest");
    let manifest = json!({
        "id": "9f0e8d7c-6b5a-4938-a7b6-c5d4e3f2a1b0",
        "createdAt": "2026-01-01T00:00:00.000Z",
        "runtimeVersion": "1.0.0",
        "launchAsset": {
            "key": "app-bundle",
            "fileExtension": ".bundle",
            "embeddedAssetFilename": "app.bundle",
        },
        "assets": [],
    });
    fs::write(&path, manifest.to_string()).unwrap();
    path.display().to_string()
}

#[test]
fn memory_runtime_without_embedded_update_has_nothing_to_launch() {
    let config = UpdateGateConfig::from_toml(&format!("{UPDATES}\n[audit]\nsink = \"none\"\n"))
        .unwrap();
    let runtime = config.assemble(clock()).unwrap();
    let err = runtime.select_for_launch().unwrap_err();
    assert!(matches!(err, RuntimeError::Launch(LaunchError::NoLaunchableUpdate(_))), "{err:?}");
}

#[test]
fn sqlite_runtime_installs_embedded_update_once() {
    let dir = TempDir::new().unwrap();
    let manifest = embedded_manifest(dir.path());
    let store = dir.path().join("state").join("updates.sqlite");
    let content = format!(
        "[updates]\nscope_key = 'app'\nruntime_version = '1.0.0'\nembedded_manifest = \
         '{manifest}'\n\n[store]\ntype = 'sqlite'\npath = '{}'\n\n[audit]\nsink = 'none'\n",
        store.display()
    );
    let config = UpdateGateConfig::from_toml(&content).unwrap();

    let runtime = config.assemble(clock()).unwrap();
    let candidate = runtime.select_for_launch().unwrap();
    assert!(candidate.is_embedded_fallback);
    assert_eq!(candidate.update.status, UpdateStatus::Embedded);
    drop(runtime);

    let reopened = config.assemble(clock()).unwrap();
    assert_eq!(reopened.store().all().unwrap().len(), 1);
}

#[test]
fn file_audit_sink_applies_retention_on_open() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("logs").join("audit.jsonl");
    fs::create_dir_all(log.parent().unwrap()).unwrap();
    fs::write(
        &log,
        "{\"event\":\"update_lifecycle\",\"timestamp_ms\":1,\"action\":\"deleted\"}\n\
         {\"event\":\"update_lifecycle\",\"timestamp_ms\":1779999999500,\"action\":\"inserted\"}\n",
    )
    .unwrap();
    let content = format!(
        "{UPDATES}\n[audit]\nsink = 'file'\npath = '{}'\nretention_ms = 1000\n",
        log.display()
    );
    let config = UpdateGateConfig::from_toml(&content).unwrap();
    config.build_audit_sink(Timestamp::from_unix_millis(1_780_000_000_000)).unwrap();

    let sink = config.open_audit_log().unwrap().unwrap();
    let records = sink.read_since(Timestamp::from_unix_millis(0)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields["action"], "inserted");
}

#[test]
fn file_audit_sink_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("nested").join("audit.jsonl");
    let content = format!("{UPDATES}\n[audit]\nsink = 'file'\npath = '{}'\n", log.display());
    let config = UpdateGateConfig::from_toml(&content).unwrap();
    assert!(config.open_audit_log().unwrap().is_some());
    assert!(log.is_file());
}

#[test]
fn code_signing_reads_certificate_chain() {
    let dir = TempDir::new().unwrap();
    let chain = dir.path().join("chain.pem");
    fs::write(&chain, PLACEHOLDER_PEM).unwrap();
    let content = format!(
        "{UPDATES}\n[code_signing]\ncertificate_chain = '{}'\nallow_unsigned_manifests = true\n",
        chain.display()
    );
    let config = UpdateGateConfig::from_toml(&content).unwrap();
    let code_signing = config.build_code_signing().unwrap().unwrap();
    assert_eq!(code_signing.key_id(), "root");
    assert!(code_signing.allows_unsigned_manifests());
    assert_eq!(code_signing.embedded_certificates().len(), 1);
}

#[test]
fn empty_certificate_chain_is_rejected() {
    let dir = TempDir::new().unwrap();
    let chain = dir.path().join("chain.pem");
    fs::write(&chain, "no certificates here\n").unwrap();
    let content =
        format!("{UPDATES}\n[code_signing]\ncertificate_chain = '{}'\n", chain.display());
    let config = UpdateGateConfig::from_toml(&content).unwrap();
    let err = config.build_code_signing().unwrap_err();
    assert!(
        matches!(
            err,
            AssemblyError::CodeSigning(CodeSigningConfigError::Certificate(
                TrustError::CertificateEmpty
            ))
        ),
        "{err:?}"
    );
}

#[test]
fn missing_certificate_chain_fails_closed() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{UPDATES}\n[code_signing]\ncertificate_chain = '{}'\n",
        dir.path().join("absent.pem").display()
    );
    let config = UpdateGateConfig::from_toml(&content).unwrap();
    let err = config.assemble(clock()).err().unwrap();
    assert!(matches!(err, AssemblyError::Config(ConfigError::Io(_))), "{err:?}");
}

#[test]
fn malformed_embedded_manifest_is_rejected() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("app.manifest");
    fs::write(&manifest, "{\"id\": 42}").unwrap();
    let content = format!(
        "[updates]\nscope_key = 'app'\nruntime_version = '1.0.0'\nembedded_manifest = '{}'\n\n\
         [audit]\nsink = 'none'\n",
        manifest.display()
    );
    let config = UpdateGateConfig::from_toml(&content).unwrap();
    let err = config.embedded_update().unwrap_err();
    assert!(matches!(err, AssemblyError::EmbeddedManifest(_)), "{err:?}");
}
