//! End-to-end scenario: snapshot, then a sequence of notifications
//! including a redelivered duplicate.

use base_sync_core::{Base, SyncEngine};
use ntest::timeout;
use serde_json::json;

use super::helpers::{create_table, delete_table, notification};

#[test]
#[timeout(1000)]
fn test_snapshot_then_notifications() {
    let engine = SyncEngine::default();
    let snapshot: Base =
        serde_json::from_value(json!({ "id": "B1", "name": "Demo", "tables": {} })).unwrap();
    engine.install_snapshot(snapshot);

    // #1 creates T1
    let first = notification(1, json!([create_table("T1", "Tasks")]));
    assert!(engine.ingest(&first).accepted);
    assert!(engine.store().get().unwrap().tables.contains_key("T1"));

    // #1 again changes nothing
    let before_replay = engine.store().get().unwrap();
    assert!(!engine.ingest(&first).accepted);
    assert_eq!(*engine.store().get().unwrap(), *before_replay);

    // #2 renames T1 and adds F1
    let second = notification(
        2,
        json!([
            { "type": "update", "resourceAddress": { "is": "table", "tableId": "T1" },
              "data": { "id": "T1", "name": "Renamed" } },
            { "type": "create", "resourceAddress": { "is": "field", "tableId": "T1" },
              "data": { "id": "F1", "name": "Title", "type": "singleLineText" } }
        ]),
    );
    let report = engine.ingest(&second);
    assert_eq!(report.applied, 2);
    let base = engine.store().get().unwrap();
    assert_eq!(base.tables["T1"].name, "Renamed");
    assert!(base.tables["T1"].fields.contains_key("F1"));

    // #3 deletes T1
    engine.ingest(&notification(3, json!([delete_table("T1")])));
    assert!(!engine.store().get().unwrap().tables.contains_key("T1"));
    assert_eq!(engine.gate().last_processed(), 3);
}

#[test]
#[timeout(1000)]
fn test_records_follow_their_table() {
    let engine = SyncEngine::default();
    engine.install_snapshot(Base::new("B1", "Demo"));

    engine.ingest(&notification(
        1,
        json!([
            create_table("T1", "Inventory"),
            { "type": "create", "resourceAddress": { "is": "field", "tableId": "T1" },
              "data": { "id": "Fqty", "name": "Quantity", "type": "number",
                        "options": { "precision": 0 } } },
            { "type": "create", "resourceAddress": { "is": "record", "tableId": "T1" },
              "data": { "id": "R1", "cells": { "Fqty": 3 } } },
            { "type": "create", "resourceAddress": { "is": "record", "tableId": "T1" },
              "data": { "id": "R2", "cells": { "Fqty": 8 } } }
        ]),
    ));
    engine.ingest(&notification(
        2,
        json!([
            { "type": "update",
              "resourceAddress": { "is": "record", "tableId": "T1", "recordId": "R1" },
              "data": { "cells": { "Fqty": 2 } } },
            { "type": "delete",
              "resourceAddress": { "is": "record", "tableId": "T1", "recordId": "R2" } }
        ]),
    ));

    let base = engine.store().get().unwrap();
    let inventory = &base.tables["T1"];
    assert_eq!(inventory.records.len(), 1);
    assert_eq!(inventory.records["R1"].cells["Fqty"], json!(2));
    assert_eq!(base.record_count(), 1);
    assert_eq!(base.field_count(), 1);
}
