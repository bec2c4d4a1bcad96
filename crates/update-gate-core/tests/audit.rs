// crates/update-gate-core/tests/audit.rs
// ============================================================================
// Module: Audit Log Tests
// Description: File-backed audit log append, read, and purge.
// ============================================================================
//! ## Overview
//! The file sink appends JSON lines, reads records at or after a timestamp,
//! and purges records older than a timestamp while keeping foreign lines.

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
use std::fs::OpenOptions;
use std::io::Write;

use tempfile::TempDir;
use update_gate_core::FileAuditSink;
use update_gate_core::MemoryAuditSink;
use update_gate_core::Timestamp;
use update_gate_core::UpdateId;
use update_gate_core::UpdatesAuditSink;
use update_gate_core::audit::AdmissionAuditEvent;
use update_gate_core::audit::AdmissionAuditEventParams;
use update_gate_core::audit::AdmissionOutcome;
use update_gate_core::audit::LaunchAuditAction;
use update_gate_core::audit::LaunchAuditEvent;
use update_gate_core::audit::LifecycleAction;
use update_gate_core::audit::LifecycleAuditEvent;

const UPDATE_ID: &str = "0754dad0-d200-d634-113c-ef1f26106028";

fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn rejection(millis: i64) -> AdmissionAuditEvent {
    AdmissionAuditEvent::new(AdmissionAuditEventParams {
        at: at(millis),
        update_id: Some(UpdateId::parse(UPDATE_ID).unwrap()),
        outcome: AdmissionOutcome::Rejected,
        error_kind: Some("signature_mismatch"),
        message: Some("manifest signature does not match".to_string()),
        certificate_scope_key: None,
        certificate_project_id: None,
    })
}

fn record_three(sink: &dyn UpdatesAuditSink) {
    let id = UpdateId::parse(UPDATE_ID).unwrap();
    sink.record_admission(&rejection(1_000));
    sink.record_launch(&LaunchAuditEvent::new(
        at(2_000),
        Some(&id),
        LaunchAuditAction::Selected,
        None,
    ));
    sink.record_lifecycle(&LifecycleAuditEvent::new(at(3_000), &id, LifecycleAction::Deleted));
}

#[test]
fn read_since_returns_records_at_or_after_timestamp() {
    let dir = TempDir::new().unwrap();
    let sink = FileAuditSink::new(&dir.path().join("audit.jsonl")).unwrap();
    record_three(&sink);

    let records = sink.read_since(at(2_000)).unwrap();
    let events: Vec<&str> = records.iter().map(|record| record.event.as_str()).collect();
    assert_eq!(events, vec!["launch_selection", "update_lifecycle"]);
    assert_eq!(records[0].fields["action"], "selected");
    assert_eq!(sink.read_since(at(0)).unwrap().len(), 3);
}

#[test]
fn purge_before_removes_old_records_and_keeps_foreign_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = FileAuditSink::new(&path).unwrap();
    record_three(&sink);
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "not an audit record").unwrap();
    drop(file);

    assert_eq!(sink.purge_before(at(2_500)).unwrap(), 2);
    let remaining = sink.read_since(at(0)).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].event, "update_lifecycle");
    assert!(fs::read_to_string(&path).unwrap().contains("not an audit record"));

    sink.record_admission(&rejection(4_000));
    assert_eq!(sink.read_since(at(0)).unwrap().len(), 2, "sink keeps appending after purge");
}

#[test]
fn records_carry_error_kind_but_no_manifest_body() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = FileAuditSink::new(&path).unwrap();
    sink.record_admission(&rejection(1_000));

    let line = fs::read_to_string(&path).unwrap();
    let record: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record["event"], "manifest_admission");
    assert_eq!(record["outcome"], "rejected");
    assert_eq!(record["error_kind"], "signature_mismatch");
    assert_eq!(record["update_id"], UPDATE_ID);
    assert!(record.get("body").is_none());
}

#[test]
fn memory_sink_filters_by_event() {
    let sink = MemoryAuditSink::new();
    record_three(&sink);
    assert_eq!(sink.records().len(), 3);
    let lifecycle = sink.records_for("update_lifecycle");
    assert_eq!(lifecycle.len(), 1);
    assert_eq!(lifecycle[0].timestamp_ms, 3_000);
    assert_eq!(lifecycle[0].fields["action"], "deleted");
}
