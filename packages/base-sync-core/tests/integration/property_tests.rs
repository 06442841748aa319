//! Delivery properties of the ingest pipeline.

use base_sync_core::{FieldRef, FieldType};
use ntest::timeout;
use serde_json::json;

use super::helpers::{create_table, delete_table, notification, seeded_engine};

/// Replaying an accepted notification leaves the replica unchanged.
#[test]
#[timeout(1000)]
fn test_replay_is_idempotent() {
    let engine = seeded_engine();
    let batch = notification(
        1,
        json!([
            create_table("T2", "People"),
            {
                "type": "update",
                "resourceAddress": { "is": "record", "tableId": "T1", "recordId": "R1" },
                "data": { "cells": { "F1": "Ship it" } }
            }
        ]),
    );

    assert!(engine.ingest(&batch).accepted);
    let after_first = engine.store().get().unwrap();

    let replay = engine.ingest(&batch);
    assert!(!replay.accepted);
    assert_eq!(*engine.store().get().unwrap(), *after_first);
}

/// Only numbers above the high-water mark are applied, whatever the order.
#[test]
#[timeout(1000)]
fn test_monotonic_rejection() {
    let engine = seeded_engine();
    let older = notification(4, json!([create_table("T4", "Four")]));
    let newer = notification(7, json!([create_table("T7", "Seven")]));

    assert!(engine.ingest(&newer).accepted);
    assert!(!engine.ingest(&older).accepted);

    let base = engine.store().get().unwrap();
    assert!(base.tables.contains_key("T7"));
    assert!(!base.tables.contains_key("T4"));
    assert_eq!(engine.gate().last_processed(), 7);
}

/// A zero-numbered notification is rejected even before anything was accepted.
#[test]
#[timeout(1000)]
fn test_zero_rejected_on_fresh_engine() {
    let engine = seeded_engine();
    let report = engine.ingest(&notification(0, json!([create_table("T0", "Zero")])));
    assert!(!report.accepted);
    assert!(!engine.store().get().unwrap().tables.contains_key("T0"));
}

/// Delete then create of the same table nets to the create.
#[test]
#[timeout(1000)]
fn test_delete_then_create_keeps_table() {
    let engine = seeded_engine();
    engine.ingest(&notification(
        1,
        json!([delete_table("T1"), create_table("T1", "Tasks v2")]),
    ));
    let base = engine.store().get().unwrap();
    assert_eq!(base.tables["T1"].name, "Tasks v2");
    assert!(base.tables["T1"].records.is_empty());
}

/// Create then delete of the same table nets to nothing.
#[test]
#[timeout(1000)]
fn test_create_then_delete_removes_table() {
    let engine = seeded_engine();
    engine.ingest(&notification(
        1,
        json!([create_table("T2", "Scratch"), delete_table("T2")]),
    ));
    assert!(!engine.store().get().unwrap().tables.contains_key("T2"));
}

/// An explicitly empty cell value is applied, not treated as absent.
#[test]
#[timeout(1000)]
fn test_empty_cell_value_is_applied() {
    let engine = seeded_engine();
    engine.ingest(&notification(
        1,
        json!([{
            "type": "update",
            "resourceAddress": { "is": "record", "tableId": "T1" },
            "data": { "id": "R1", "cells": { "F1": "" } }
        }]),
    ));
    let base = engine.store().get().unwrap();
    assert_eq!(base.tables["T1"].records["R1"].cells["F1"], json!(""));
}

/// An explicitly empty name is applied to tables and fields.
#[test]
#[timeout(1000)]
fn test_empty_names_are_applied() {
    let engine = seeded_engine();
    engine.ingest(&notification(
        1,
        json!([
            { "type": "update", "resourceAddress": { "is": "table", "tableId": "T1" },
              "data": { "id": "T1", "name": "" } },
            { "type": "update", "resourceAddress": { "is": "field", "tableId": "T1" },
              "data": { "id": "F1", "name": "", "description": "" } }
        ]),
    ));
    let base = engine.store().get().unwrap();
    assert_eq!(base.tables["T1"].name, "");
    assert_eq!(base.tables["T1"].fields["F1"].name, "");
    assert_eq!(base.tables["T1"].fields["F1"].description.as_deref(), Some(""));
}

/// A type change is flagged for resync and the in-memory type is updated.
#[test]
#[timeout(1000)]
fn test_type_change_flags_resync() {
    let engine = seeded_engine();
    let report = engine.ingest(&notification(
        1,
        json!([{
            "type": "update",
            "resourceAddress": { "is": "field", "tableId": "T1" },
            "data": { "id": "F1", "type": "multipleSelects" }
        }]),
    ));
    assert_eq!(report.resync, vec![FieldRef::new("T1", "F1")]);
    let base = engine.store().get().unwrap();
    assert_eq!(
        base.tables["T1"].fields["F1"].field_type,
        FieldType::MultipleSelects
    );
}

/// A delete of the base empties the replica; later changes are skipped.
#[test]
#[timeout(1000)]
fn test_delete_base_then_changes() {
    let engine = seeded_engine();
    let report = engine.ingest(&notification(
        1,
        json!([
            { "type": "delete", "resourceAddress": { "is": "base" } },
            create_table("T2", "Too late")
        ]),
    ));
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 1);
    assert!(engine.store().get().is_none());
}
