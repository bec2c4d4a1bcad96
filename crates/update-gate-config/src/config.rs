// crates/update-gate-config/src/config.rs
// ============================================================================
// Module: Update Gate Configuration
// Description: Configuration loading and validation for the update client.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: update-gate-core, update-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a client that cannot read
//! its trust settings must not fall back to accepting unsigned manifests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use update_gate_core::DEFAULT_FAILED_LAUNCH_THRESHOLD;
use update_gate_core::RuntimeCompatibilityPolicy;
use update_gate_core::SignatureVerifier;
use update_gate_store_sqlite::SqliteStoreMode;
use update_gate_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "update-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "UPDATE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a scope key.
const MAX_SCOPE_KEY_LENGTH: usize = 2048;
/// Maximum length of a runtime version string.
const MAX_RUNTIME_VERSION_LENGTH: usize = 256;
/// Default `SQLite` busy timeout (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default asset cache directory.
const DEFAULT_ASSET_CACHE_DIR: &str = "update-gate-assets";

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Update client configuration loaded from `update-gate.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGateConfig {
    /// Update identity and launch policy.
    pub updates: UpdatesConfig,
    /// Code signing policy. Absent means manifests are admitted unverified.
    #[serde(default)]
    pub code_signing: Option<CodeSigningConfig>,
    /// Update store backend.
    #[serde(default)]
    pub store: UpdateStoreConfig,
    /// Asset cache settings.
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl UpdateGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then [`CONFIG_ENV_VAR`], then
    /// `update-gate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.updates.validate()?;
        if let Some(code_signing) = &self.code_signing {
            code_signing.validate()?;
        }
        self.store.validate()?;
        self.assets.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Updates
// ============================================================================

/// Update identity and launch policy.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatesConfig {
    /// Scope key identifying this application's updates.
    pub scope_key: String,
    /// Runtime version of the running binary.
    pub runtime_version: String,
    /// Runtime compatibility rule used during launch selection.
    #[serde(default)]
    pub runtime_compatibility: RuntimeCompatibilityPolicy,
    /// Consecutive failed launches that make an update ineligible.
    #[serde(default = "default_failed_launch_threshold")]
    pub failed_launch_threshold: u32,
    /// Manifest bundled with the application, installed as the embedded update.
    #[serde(default)]
    pub embedded_manifest: Option<PathBuf>,
}

impl UpdatesConfig {
    /// Validates update identity settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_label("updates.scope_key", &self.scope_key, MAX_SCOPE_KEY_LENGTH)?;
        validate_label(
            "updates.runtime_version",
            &self.runtime_version,
            MAX_RUNTIME_VERSION_LENGTH,
        )?;
        if self.failed_launch_threshold == 0 {
            return Err(ConfigError::Invalid(
                "updates.failed_launch_threshold must be greater than zero".to_string(),
            ));
        }
        if let Some(path) = &self.embedded_manifest {
            validate_path_string("updates.embedded_manifest", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Returns the default failed launch threshold.
const fn default_failed_launch_threshold() -> u32 {
    DEFAULT_FAILED_LAUNCH_THRESHOLD
}

// ============================================================================
// SECTION: Code Signing
// ============================================================================

/// Code signing policy.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeSigningConfig {
    /// PEM file holding the embedded certificate chain.
    pub certificate_chain: PathBuf,
    /// Expected key identifier (defaults to `root`).
    #[serde(default)]
    pub keyid: Option<String>,
    /// Expected signature algorithm (defaults to `rsa-v1_5-sha256`).
    #[serde(default)]
    pub alg: Option<String>,
    /// Prepend certificates delivered with the manifest to the embedded chain.
    #[serde(default)]
    pub include_manifest_response_certificate_chain: bool,
    /// Admit manifests without a signature header as unverified.
    #[serde(default)]
    pub allow_unsigned_manifests: bool,
}

impl CodeSigningConfig {
    /// Validates code signing settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string(
            "code_signing.certificate_chain",
            &self.certificate_chain.to_string_lossy(),
        )?;
        if let Some(keyid) = &self.keyid
            && keyid.trim().is_empty()
        {
            return Err(ConfigError::Invalid("code_signing.keyid must be non-empty".to_string()));
        }
        SignatureVerifier::algorithm_from_header(self.alg.as_deref())
            .map_err(|err| ConfigError::Invalid(format!("code_signing.alg: {err}")))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Update store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: UpdateStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for UpdateStoreConfig {
    fn default() -> Self {
        Self {
            store_type: UpdateStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl UpdateStoreConfig {
    /// Validates update store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            UpdateStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            UpdateStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
        }
    }
}

/// Update store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Returns the default busy timeout for `SQLite` stores.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Assets
// ============================================================================

/// Asset cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory holding downloaded asset files.
    #[serde(default = "default_asset_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_asset_cache_dir(),
        }
    }
}

impl AssetsConfig {
    /// Validates asset cache settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("assets.cache_dir", &self.cache_dir.to_string_lossy())
    }
}

/// Returns the default asset cache directory.
fn default_asset_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ASSET_CACHE_DIR)
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Records older than this are purged when the file sink opens.
    #[serde(default)]
    pub retention_ms: Option<u64>,
}

impl AuditConfig {
    /// Validates audit sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "audit.retention_ms must be greater than zero".to_string(),
            ));
        }
        match self.sink {
            AuditSinkType::File => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires path".to_string())
                })?;
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            AuditSinkType::Stderr | AuditSinkType::None => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "audit.path is only valid for the file sink".to_string(),
                    ));
                }
                if self.retention_ms.is_some() {
                    return Err(ConfigError::Invalid(
                        "audit.retention_ms is only valid for the file sink".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// Append-only JSON lines file.
    File,
    /// Discard audit events.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
pub(crate) fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a free-form label for emptiness, length, and control characters.
fn validate_label(field: &str, value: &str, max_length: usize) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > max_length {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    const MINIMAL: &str = r#"
[updates]
scope_key = "https://updates.example.test/app"
runtime_version = "1.0.0"
"#;

    fn invalid_message(content: &str) -> String {
        match UpdateGateConfig::from_toml(content) {
            Err(ConfigError::Invalid(message)) => message,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = UpdateGateConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.updates.failed_launch_threshold, 1);
        assert_eq!(config.updates.runtime_compatibility, RuntimeCompatibilityPolicy::Exact);
        assert!(config.code_signing.is_none());
        assert_eq!(config.store.store_type, UpdateStoreType::Memory);
        assert_eq!(config.audit.sink, AuditSinkType::Stderr);
        assert_eq!(config.assets.cache_dir, PathBuf::from(DEFAULT_ASSET_CACHE_DIR));
    }

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        assert!(validate_path_string("field", "   ").is_err());
    }

    #[test]
    fn validate_path_string_rejects_overlong_component() {
        let component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        assert!(validate_path_string("field", &format!("dir/{component}")).is_err());
        assert!(validate_path_string("field", "dir/file.sqlite").is_ok());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let content = format!("{MINIMAL}failed_launch_threshold = 0\n");
        assert!(invalid_message(&content).contains("failed_launch_threshold"));
    }

    #[test]
    fn control_characters_in_scope_key_are_rejected() {
        let content = "[updates]\nscope_key = \"app\\u0007\"\nruntime_version = \"1.0.0\"\n";
        assert!(invalid_message(content).contains("control characters"));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let content = format!(
            "{MINIMAL}\n[code_signing]\ncertificate_chain = \"chain.pem\"\nalg = \"ed25519\"\n"
        );
        assert!(invalid_message(&content).contains("code_signing.alg"));
    }

    #[test]
    fn memory_store_rejects_path() {
        let content = format!("{MINIMAL}\n[store]\ntype = \"memory\"\npath = \"updates.sqlite\"\n");
        assert!(invalid_message(&content).contains("memory store must not set path"));
    }

    #[test]
    fn sqlite_store_requires_path() {
        let content = format!("{MINIMAL}\n[store]\ntype = \"sqlite\"\n");
        assert!(invalid_message(&content).contains("sqlite store requires path"));
    }

    #[test]
    fn audit_retention_requires_file_sink() {
        let content = format!("{MINIMAL}\n[audit]\nsink = \"stderr\"\nretention_ms = 1000\n");
        assert!(invalid_message(&content).contains("retention_ms"));
        let content = format!("{MINIMAL}\n[audit]\nsink = \"file\"\n");
        assert!(invalid_message(&content).contains("requires path"));
    }
}
