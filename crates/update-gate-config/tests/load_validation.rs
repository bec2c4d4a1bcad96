// crates/update-gate-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
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

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use update_gate_config::AuditSinkType;
use update_gate_config::ConfigError;
use update_gate_config::UpdateGateConfig;
use update_gate_config::UpdateStoreType;
use update_gate_core::RuntimeCompatibilityPolicy;
use update_gate_store_sqlite::SqliteStoreMode;
use update_gate_store_sqlite::SqliteSyncMode;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<UpdateGateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(UpdateGateConfig::load(Some(path)), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let component = "a".repeat(300);
    let path = Path::new(&component);
    assert_invalid(UpdateGateConfig::load(Some(path)), "config path component too long")
}

#[test]
fn load_reports_missing_file_as_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = UpdateGateConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)), "{err:?}");
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let file = write_config(&vec![b'#'; 1024 * 1024 + 1]);
    assert_invalid(UpdateGateConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let file = write_config(&[0xff, 0xfe, 0xfd]);
    assert_invalid(UpdateGateConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_rejects_malformed_toml() {
    let file = write_config(b"[updates\nscope_key = ");
    let err = UpdateGateConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
}

#[test]
fn load_rejects_missing_updates_section() {
    let file = write_config(b"[assets]\ncache_dir = \"cache\"\n");
    let err = UpdateGateConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
}

#[test]
fn load_reads_every_section() {
    let file = write_config(
        br#"
[updates]
scope_key = "https://updates.example.test/app"
runtime_version = "2.1.0"
runtime_compatibility = "major_version"
failed_launch_threshold = 3
embedded_manifest = "bundle/app.manifest"

[code_signing]
certificate_chain = "certs/chain.pem"
keyid = "main"
alg = "rsa-v1_5-sha256"
include_manifest_response_certificate_chain = true

[store]
type = "sqlite"
path = "state/updates.sqlite"
busy_timeout_ms = 250
journal_mode = "delete"
sync_mode = "normal"

[assets]
cache_dir = "state/assets"

[audit]
sink = "file"
path = "state/audit.jsonl"
retention_ms = 86400000
"#,
    );
    let config = UpdateGateConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.updates.runtime_compatibility, RuntimeCompatibilityPolicy::MajorVersion);
    assert_eq!(config.updates.failed_launch_threshold, 3);
    let code_signing = config.code_signing.as_ref().unwrap();
    assert_eq!(code_signing.keyid.as_deref(), Some("main"));
    assert!(code_signing.include_manifest_response_certificate_chain);
    assert!(!code_signing.allow_unsigned_manifests);
    assert_eq!(config.store.store_type, UpdateStoreType::Sqlite);
    assert_eq!(config.store.busy_timeout_ms, 250);
    assert_eq!(config.store.journal_mode, SqliteStoreMode::Delete);
    assert_eq!(config.store.sync_mode, SqliteSyncMode::Normal);
    assert_eq!(config.audit.sink, AuditSinkType::File);
    assert_eq!(config.audit.retention_ms, Some(86_400_000));
}

#[test]
fn load_rejects_empty_runtime_version() -> TestResult {
    let file = write_config(b"[updates]\nscope_key = \"app\"\nruntime_version = \"  \"\n");
    assert_invalid(UpdateGateConfig::load(Some(file.path())), "updates.runtime_version")
}
