// crates/update-gate-core/src/audit.rs
// ============================================================================
// Module: Update Gate Audit Logging
// Description: Structured audit events for admission, launch, and lifecycle changes.
// Purpose: Emit JSON-line audit records and support reading and purging them by time.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Trust and launch decisions are reported through [`UpdatesAuditSink`].
//! Events are serialized as one JSON object per line. They carry identifiers
//! and stable error-kind labels but never manifest bodies or key material.
//!
//! [`FileAuditSink`] satisfies the log storage contract: append, read records
//! at or after a timestamp, and purge records older than a timestamp.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::AssetKey;
use crate::core::identifiers::UpdateId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Admission decision recorded for one manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionOutcome {
    /// Manifest passed code signing and was admitted.
    AdmittedVerified,
    /// Manifest was admitted without signature verification.
    AdmittedUnverified,
    /// Manifest was rejected.
    Rejected,
}

/// Manifest admission audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Manifest id when it could be parsed.
    pub update_id: Option<String>,
    /// Admission decision.
    pub outcome: AdmissionOutcome,
    /// Normalized error kind label on rejection.
    pub error_kind: Option<&'static str>,
    /// Rejection detail.
    pub message: Option<String>,
    /// Scope key from the certificate chain, when present.
    pub certificate_scope_key: Option<String>,
    /// Project id from the certificate chain, when present.
    pub certificate_project_id: Option<String>,
}

/// Inputs required to construct an admission audit event.
pub struct AdmissionAuditEventParams {
    /// Decision time.
    pub at: Timestamp,
    /// Manifest id when it could be parsed.
    pub update_id: Option<UpdateId>,
    /// Admission decision.
    pub outcome: AdmissionOutcome,
    /// Normalized error kind label on rejection.
    pub error_kind: Option<&'static str>,
    /// Rejection detail.
    pub message: Option<String>,
    /// Scope key from the certificate chain, when present.
    pub certificate_scope_key: Option<String>,
    /// Project id from the certificate chain, when present.
    pub certificate_project_id: Option<String>,
}

impl AdmissionAuditEvent {
    /// Creates a new admission audit event.
    #[must_use]
    pub fn new(params: AdmissionAuditEventParams) -> Self {
        Self {
            event: "manifest_admission",
            timestamp_ms: params.at.as_unix_millis(),
            update_id: params.update_id.map(|id| id.to_string()),
            outcome: params.outcome,
            error_kind: params.error_kind,
            message: params.message,
            certificate_scope_key: params.certificate_scope_key,
            certificate_project_id: params.certificate_project_id,
        }
    }
}

/// Launch selection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchAuditAction {
    /// A downloaded update was selected.
    Selected,
    /// No downloaded update qualified; the embedded update was selected.
    EmbeddedFallback,
    /// A candidate had unresolvable assets and was demoted.
    Demoted,
    /// Nothing could be launched.
    NoLaunchableUpdate,
}

/// Launch selection audit event.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Update involved, when any.
    pub update_id: Option<String>,
    /// Selection step.
    pub action: LaunchAuditAction,
    /// Detail message.
    pub message: Option<String>,
}

impl LaunchAuditEvent {
    /// Creates a new launch audit event.
    #[must_use]
    pub fn new(
        at: Timestamp,
        update_id: Option<&UpdateId>,
        action: LaunchAuditAction,
        message: Option<String>,
    ) -> Self {
        Self {
            event: "launch_selection",
            timestamp_ms: at.as_unix_millis(),
            update_id: update_id.map(ToString::to_string),
            action,
            message,
        }
    }
}

/// Update lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Update inserted into the store.
    Inserted,
    /// Update already present; insert was a no-op.
    AlreadyExists,
    /// Asset downloaded and verified.
    AssetResolved,
    /// Asset download or verification failed.
    AssetFailed,
    /// Asset download cancelled.
    AssetCancelled,
    /// Launch recorded as successful.
    LaunchSucceeded,
    /// Launch recorded as failed.
    LaunchFailed,
    /// Update crossed the failed-launch threshold.
    MarkedIneligible,
    /// Update removed by the reaper.
    Deleted,
}

/// Update lifecycle audit event.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Update identifier.
    pub update_id: String,
    /// Lifecycle change.
    pub action: LifecycleAction,
    /// Asset involved, when any.
    pub asset_key: Option<String>,
    /// Update status label after the change.
    pub status: Option<&'static str>,
    /// Detail message.
    pub message: Option<String>,
}

impl LifecycleAuditEvent {
    /// Creates a new lifecycle audit event.
    #[must_use]
    pub fn new(at: Timestamp, update_id: &UpdateId, action: LifecycleAction) -> Self {
        Self {
            event: "update_lifecycle",
            timestamp_ms: at.as_unix_millis(),
            update_id: update_id.to_string(),
            action,
            asset_key: None,
            status: None,
            message: None,
        }
    }

    /// Attaches the asset involved.
    #[must_use]
    pub fn with_asset(mut self, asset_key: &AssetKey) -> Self {
        self.asset_key = Some(asset_key.to_string());
        self
    }

    /// Attaches the resulting status label.
    #[must_use]
    pub fn with_status(mut self, status: &'static str) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Audit record read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Event identifier.
    pub event: String,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Remaining event fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for update trust and launch events.
pub trait UpdatesAuditSink: Send + Sync {
    /// Record a manifest admission decision.
    fn record_admission(&self, event: &AdmissionAuditEvent);

    /// Record a launch selection step.
    fn record_launch(&self, _event: &LaunchAuditEvent) {}

    /// Record an update lifecycle change.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one event as a JSON line.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl UpdatesAuditSink for StderrAuditSink {
    fn record_admission(&self, event: &AdmissionAuditEvent) {
        Self::emit(event);
    }

    fn record_launch(&self, event: &LaunchAuditEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file and supports read and purge by time.
pub struct FileAuditSink {
    /// Log file location.
    path: PathBuf,
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Returns the log file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one event as a JSON line.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }

    /// Returns records with `timestamp_ms >= since`, in append order.
    ///
    /// Lines that are not audit records are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the log cannot be read.
    pub fn read_since(&self, since: Timestamp) -> io::Result<Vec<AuditRecord>> {
        let _guard = self.file.lock().map_err(|_| io::Error::other("audit log mutex poisoned"))?;
        Ok(read_records(&self.path)?
            .into_iter()
            .filter(|record| record.timestamp_ms >= since.as_unix_millis())
            .collect())
    }

    /// Removes records with `timestamp_ms < before` and returns how many were removed.
    ///
    /// Lines that are not audit records are kept.
    ///
    /// # Errors
    ///
    /// Returns an error when the log cannot be rewritten.
    pub fn purge_before(&self, before: Timestamp) -> io::Result<usize> {
        let mut file =
            self.file.lock().map_err(|_| io::Error::other("audit log mutex poisoned"))?;
        let contents = fs::read_to_string(&self.path)?;
        let mut kept = String::with_capacity(contents.len());
        let mut removed = 0_usize;
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            let expired = serde_json::from_str::<AuditRecord>(line)
                .is_ok_and(|record| record.timestamp_ms < before.as_unix_millis());
            if expired {
                removed += 1;
            } else {
                kept.push_str(line);
                kept.push('\n');
            }
        }
        let staging = self.path.with_extension("purge.tmp");
        fs::write(&staging, kept)?;
        fs::rename(&staging, &self.path)?;
        *file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(removed)
    }
}

impl UpdatesAuditSink for FileAuditSink {
    fn record_admission(&self, event: &AdmissionAuditEvent) {
        self.emit(event);
    }

    fn record_launch(&self, event: &LaunchAuditEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.emit(event);
    }
}

/// Audit sink that keeps records in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events.
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Returns recorded events with the given `event` identifier.
    #[must_use]
    pub fn records_for(&self, event: &str) -> Vec<AuditRecord> {
        self.records().into_iter().filter(|record| record.event == event).collect()
    }

    /// Converts and stores one event.
    fn push<T: Serialize>(&self, event: &T) {
        let record = serde_json::to_value(event)
            .ok()
            .and_then(|value| serde_json::from_value::<AuditRecord>(value).ok());
        if let Some(record) = record
            && let Ok(mut records) = self.records.lock()
        {
            records.push(record);
        }
    }
}

impl UpdatesAuditSink for MemoryAuditSink {
    fn record_admission(&self, event: &AdmissionAuditEvent) {
        self.push(event);
    }

    fn record_launch(&self, event: &LaunchAuditEvent) {
        self.push(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.push(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl UpdatesAuditSink for NoopAuditSink {
    fn record_admission(&self, _event: &AdmissionAuditEvent) {}

    fn record_launch(&self, _event: &LaunchAuditEvent) {}

    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads every parseable audit record from a JSON-lines file.
fn read_records(path: &Path) -> io::Result<Vec<AuditRecord>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    Ok(contents.lines().filter_map(|line| serde_json::from_str::<AuditRecord>(line).ok()).collect())
}
