// crates/update-gate-config/src/assembly.rs
// ============================================================================
// Module: Runtime Assembly
// Description: Builds stores, sinks, trust gates, and runtimes from config.
// Purpose: Turn a validated config into wired runtime collaborators.
// Dependencies: update-gate-core, update-gate-store-sqlite
// ============================================================================

//! ## Overview
//! Assembly reads the files a validated config points at (certificate chain,
//! embedded manifest) under size limits, opens the configured store and
//! audit sink, and wires them into an [`UpdatesRuntime`]. Opening a file
//! audit sink applies the configured retention window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use update_gate_core::AssetCache;
use update_gate_core::AssetLocator;
use update_gate_core::BundledResources;
use update_gate_core::Clock;
use update_gate_core::CodeSigningConfiguration;
use update_gate_core::FileAuditSink;
use update_gate_core::InMemoryUpdateStore;
use update_gate_core::LaunchSelector;
use update_gate_core::ManifestError;
use update_gate_core::ManifestTrustGate;
use update_gate_core::NoopAuditSink;
use update_gate_core::RuntimeVersion;
use update_gate_core::ScopeKey;
use update_gate_core::StderrAuditSink;
use update_gate_core::Timestamp;
use update_gate_core::Update;
use update_gate_core::UpdateStore;
use update_gate_core::UpdatesAuditSink;
use update_gate_core::UpdatesRuntime;
use update_gate_core::UpdatesRuntimeParts;
use update_gate_core::codesigning::CodeSigningConfigError;
use update_gate_core::core::manifest::MAX_MANIFEST_BYTES;
use update_gate_core::parse_embedded_manifest;
use update_gate_core::runtime::RuntimeError;
use update_gate_store_sqlite::SqliteStoreConfig;
use update_gate_store_sqlite::SqliteStoreError;
use update_gate_store_sqlite::SqliteUpdateStore;

use crate::config::AuditSinkType;
use crate::config::ConfigError;
use crate::config::UpdateGateConfig;
use crate::config::UpdateStoreType;
use crate::config::validate_path;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum certificate chain PEM size in bytes.
const MAX_CERTIFICATE_CHAIN_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while assembling runtime collaborators.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Referenced file could not be read or is out of bounds.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Update store could not be opened.
    #[error("update store unavailable: {0}")]
    Store(#[from] SqliteStoreError),
    /// Certificate chain or code signing settings are unusable.
    #[error("code signing unavailable: {0}")]
    CodeSigning(#[from] CodeSigningConfigError),
    /// Audit log could not be opened or purged.
    #[error("audit log unavailable: {0}")]
    Audit(String),
    /// Embedded manifest is malformed.
    #[error("embedded manifest invalid: {0}")]
    EmbeddedManifest(#[from] ManifestError),
    /// Embedded update could not be installed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

impl UpdateGateConfig {
    /// Returns the configured scope key.
    #[must_use]
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::new(self.updates.scope_key.clone())
    }

    /// Returns the configured runtime version.
    #[must_use]
    pub fn runtime_version(&self) -> RuntimeVersion {
        RuntimeVersion::new(self.updates.runtime_version.clone())
    }

    /// Opens the configured update store.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Store`] when the `SQLite` store cannot be opened.
    pub fn build_store(&self) -> Result<Arc<dyn UpdateStore>, AssemblyError> {
        let threshold = self.updates.failed_launch_threshold;
        match (self.store.store_type, &self.store.path) {
            (UpdateStoreType::Sqlite, Some(path)) => {
                let store = SqliteUpdateStore::new(SqliteStoreConfig {
                    path: path.clone(),
                    busy_timeout_ms: self.store.busy_timeout_ms,
                    journal_mode: self.store.journal_mode,
                    sync_mode: self.store.sync_mode,
                })?;
                Ok(Arc::new(store.with_failed_launch_threshold(threshold)))
            }
            (UpdateStoreType::Sqlite, None) => {
                Err(ConfigError::Invalid("sqlite store requires path".to_string()).into())
            }
            (UpdateStoreType::Memory, _) => {
                Ok(Arc::new(InMemoryUpdateStore::with_failed_launch_threshold(threshold)))
            }
        }
    }

    /// Reads the certificate chain and builds the code signing policy.
    ///
    /// Returns `None` when code signing is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when the chain cannot be read or parsed.
    pub fn build_code_signing(&self) -> Result<Option<CodeSigningConfiguration>, AssemblyError> {
        let Some(settings) = &self.code_signing else {
            return Ok(None);
        };
        let bytes = read_limited(&settings.certificate_chain, MAX_CERTIFICATE_CHAIN_BYTES)?;
        let pem = String::from_utf8(bytes).map_err(|_| {
            ConfigError::Invalid("code_signing.certificate_chain must be utf-8".to_string())
        })?;
        let configuration = CodeSigningConfiguration::new(
            &pem,
            settings.keyid.as_deref(),
            settings.alg.as_deref(),
            settings.include_manifest_response_certificate_chain,
            settings.allow_unsigned_manifests,
        )?;
        Ok(Some(configuration))
    }

    /// Opens the file audit log, when the file sink is configured.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Audit`] when the log cannot be opened.
    pub fn open_audit_log(&self) -> Result<Option<FileAuditSink>, AssemblyError> {
        let (AuditSinkType::File, Some(path)) = (self.audit.sink, &self.audit.path) else {
            return Ok(None);
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| AssemblyError::Audit(err.to_string()))?;
        }
        FileAuditSink::new(path).map(Some).map_err(|err| AssemblyError::Audit(err.to_string()))
    }

    /// Builds the configured audit sink, purging expired file records.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Audit`] when the file sink cannot be opened or purged.
    pub fn build_audit_sink(
        &self,
        now: Timestamp,
    ) -> Result<Arc<dyn UpdatesAuditSink>, AssemblyError> {
        match self.audit.sink {
            AuditSinkType::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkType::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkType::File => {
                let sink = self.open_audit_log()?.ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires path".to_string())
                })?;
                if let Some(retention_ms) = self.audit.retention_ms {
                    let window = i64::try_from(retention_ms).unwrap_or(i64::MAX);
                    sink.purge_before(now.saturating_sub_millis(window))
                        .map_err(|err| AssemblyError::Audit(err.to_string()))?;
                }
                Ok(Arc::new(sink))
            }
        }
    }

    /// Reads the embedded manifest body, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Config`] when the file cannot be read.
    pub fn read_embedded_manifest(&self) -> Result<Option<Vec<u8>>, AssemblyError> {
        self.updates
            .embedded_manifest
            .as_deref()
            .map(|path| read_limited(path, MAX_MANIFEST_BYTES).map_err(AssemblyError::from))
            .transpose()
    }

    /// Parses the embedded manifest into the embedded update, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when the manifest cannot be read or parsed.
    pub fn embedded_update(&self) -> Result<Option<Update>, AssemblyError> {
        let scope_key = self.scope_key();
        self.read_embedded_manifest()?
            .map(|body| parse_embedded_manifest(&body, &scope_key).map_err(AssemblyError::from))
            .transpose()
    }

    /// Wires the configured collaborators into a runtime.
    ///
    /// The embedded manifest, when configured, defines the bundled resources
    /// and is installed as the embedded update.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when any collaborator cannot be built.
    pub fn assemble(&self, clock: Arc<dyn Clock>) -> Result<UpdatesRuntime, AssemblyError> {
        let audit = self.build_audit_sink(clock.now())?;
        let store = self.build_store()?;
        let scope_key = self.scope_key();
        let embedded_body = self.read_embedded_manifest()?;
        let bundle = match &embedded_body {
            Some(body) => {
                let embedded = parse_embedded_manifest(body, &scope_key)?;
                BundledResources::from_assets(&embedded.assets)
            }
            None => BundledResources::default(),
        };
        let cache = AssetCache::new(self.assets.cache_dir.clone());
        let code_signing = self.build_code_signing()?;
        let gate = ManifestTrustGate::new(code_signing, scope_key.clone(), Arc::clone(&audit));
        let selector = LaunchSelector::new(
            scope_key,
            Arc::new(self.updates.runtime_compatibility),
            AssetLocator::new(cache.clone(), Arc::new(bundle)),
            Arc::clone(&audit),
        );
        let runtime = UpdatesRuntime::new(UpdatesRuntimeParts {
            gate,
            selector,
            store,
            cache,
            clock,
            audit,
            runtime_version: self.runtime_version(),
        });
        if let Some(body) = embedded_body {
            runtime.install_embedded_update(&body)?;
        }
        Ok(runtime)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a referenced file, enforcing path and size limits.
fn read_limited(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ConfigError> {
    validate_path(path)?;
    let metadata = fs::metadata(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    if metadata.len() > u64::try_from(max_bytes).unwrap_or(u64::MAX) {
        return Err(ConfigError::Invalid(format!(
            "{} exceeds size limit of {max_bytes} bytes",
            path.display()
        )));
    }
    fs::read(path).map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))
}
