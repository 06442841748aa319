//! Shared fixtures for integration tests.

use base_sync_core::{Base, Field, FieldType, Record, SyncEngine, SyncNotification, Table};
use serde_json::{json, Value};

/// Decodes a notification from JSON, panicking on malformed fixtures.
pub fn notification(number: u64, changes: Value) -> SyncNotification {
    SyncNotification::from_value(json!({
        "number": number,
        "timestamp": 1_700_000_000_000i64 + number as i64,
        "changes": changes,
    }))
    .expect("fixture notification must decode")
}

/// Engine seeded with a one-table base.
pub fn seeded_engine() -> SyncEngine {
    let engine = SyncEngine::default();
    engine.install_snapshot(
        Base::new("B1", "Demo").with_table(
            Table::new("T1", "Tasks")
                .with_field(Field::new("F1", "Title", FieldType::SingleLineText))
                .with_record(Record::new("R1").with_cell("F1", json!("Write tests"))),
        ),
    );
    engine
}

pub fn create_table(id: &str, name: &str) -> Value {
    json!({
        "type": "create",
        "resourceAddress": { "is": "table" },
        "data": { "id": id, "name": name, "fields": {}, "records": {} }
    })
}

pub fn delete_table(id: &str) -> Value {
    json!({ "type": "delete", "resourceAddress": { "is": "table", "tableId": id } })
}
