//! Replica data model: base, tables, fields, and records.
//!
//! Shapes mirror the JSON the server emits in snapshots and create payloads
//! (camelCase keys, `type` for the field kind). Unknown keys are ignored so
//! additions on the server side do not break decoding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base identifier.
pub type BaseId = String;
/// Table identifier.
pub type TableId = String;
/// Field identifier; also the key of a record cell.
pub type FieldId = String;
/// Record identifier.
pub type RecordId = String;

/// Root of the replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub id: BaseId,
    pub name: String,
    #[serde(default)]
    pub tables: HashMap<TableId, Table>,
}

impl Base {
    /// Creates an empty base.
    pub fn new(id: impl Into<BaseId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tables: HashMap::new(),
        }
    }

    /// Adds a table, replacing any table with the same id.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.insert(table.id.clone(), table);
        self
    }

    /// Returns the table with the given id.
    pub fn table(&self, table_id: &str) -> Option<&Table> {
        self.tables.get(table_id)
    }

    /// Returns the field addressed by `field_ref`.
    pub fn field(&self, field_ref: &FieldRef) -> Option<&Field> {
        self.tables
            .get(&field_ref.table_id)
            .and_then(|table| table.fields.get(&field_ref.field_id))
    }

    /// Total number of fields across all tables.
    pub fn field_count(&self) -> usize {
        self.tables.values().map(|t| t.fields.len()).sum()
    }

    /// Total number of records across all tables.
    pub fn record_count(&self) -> usize {
        self.tables.values().map(|t| t.records.len()).sum()
    }
}

/// A table within a base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: HashMap<FieldId, Field>,
    #[serde(default)]
    pub records: HashMap<RecordId, Record>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(id: impl Into<TableId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            fields: HashMap::new(),
            records: HashMap::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.insert(field.id.clone(), field);
        self
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.insert(record.id.clone(), record);
        self
    }
}

/// A column definition.
///
/// `options` are type-specific (select choices, number precision, linked
/// table...) and are only ever delivered by a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl Field {
    pub fn new(id: impl Into<FieldId>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            field_type,
            options: None,
        }
    }
}

/// A row; cells are keyed by field id and opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub cells: HashMap<FieldId, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            cells: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, field_id: impl Into<FieldId>, value: Value) -> Self {
        self.cells.insert(field_id.into(), value);
        self
    }
}

/// Field kind.
///
/// Kinds this client does not know about decode into `Other` with the raw
/// tag preserved, so a newer server never breaks an older client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    SingleLineText,
    MultilineText,
    RichText,
    Email,
    Url,
    PhoneNumber,
    Number,
    Percent,
    Currency,
    Rating,
    Duration,
    Checkbox,
    SingleSelect,
    MultipleSelects,
    SingleCollaborator,
    MultipleCollaborators,
    MultipleRecordLinks,
    MultipleAttachments,
    Date,
    DateTime,
    CreatedTime,
    LastModifiedTime,
    CreatedBy,
    LastModifiedBy,
    AutoNumber,
    Barcode,
    Button,
    Formula,
    Rollup,
    Count,
    MultipleLookupValues,
    #[serde(untagged)]
    Other(String),
}

/// Address of a field inside the replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    pub table_id: TableId,
    pub field_id: FieldId,
}

impl FieldRef {
    pub fn new(table_id: impl Into<TableId>, field_id: impl Into<FieldId>) -> Self {
        Self {
            table_id: table_id.into(),
            field_id: field_id.into(),
        }
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.table_id, self.field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;
    use serde_json::json;

    #[test]
    #[timeout(1000)]
    fn test_decode_snapshot() {
        let base: Base = serde_json::from_value(json!({
            "id": "B1",
            "name": "Demo",
            "tables": {
                "T1": {
                    "id": "T1",
                    "name": "Tasks",
                    "fields": {
                        "F1": {
                            "id": "F1",
                            "name": "Status",
                            "type": "singleSelect",
                            "options": { "choices": [{ "name": "Todo" }] }
                        }
                    },
                    "records": {
                        "R1": { "id": "R1", "cells": { "F1": "Todo" }, "createdTime": "2024-01-01" }
                    }
                }
            }
        }))
        .unwrap();

        let table = base.table("T1").unwrap();
        assert_eq!(table.description, None);
        assert_eq!(table.fields["F1"].field_type, FieldType::SingleSelect);
        assert!(table.fields["F1"].options.is_some());
        assert_eq!(table.records["R1"].cells["F1"], json!("Todo"));
        assert_eq!(base.field_count(), 1);
        assert_eq!(base.record_count(), 1);
    }

    #[test]
    #[timeout(1000)]
    fn test_missing_collections_default_to_empty() {
        let base: Base = serde_json::from_value(json!({ "id": "B1", "name": "Demo" })).unwrap();
        assert!(base.tables.is_empty());

        let table: Table = serde_json::from_value(json!({ "id": "T1", "name": "Empty" })).unwrap();
        assert!(table.fields.is_empty());
        assert!(table.records.is_empty());
    }

    #[test]
    #[timeout(1000)]
    fn test_unknown_field_type_is_preserved() {
        let field: Field = serde_json::from_value(json!({
            "id": "F9",
            "name": "Magic",
            "type": "aiText"
        }))
        .unwrap();
        assert_eq!(field.field_type, FieldType::Other("aiText".to_string()));
        assert_eq!(serde_json::to_value(&field).unwrap()["type"], json!("aiText"));
    }

    #[test]
    #[timeout(1000)]
    fn test_known_field_type_tags() {
        let tags = [
            ("dateTime", FieldType::DateTime),
            ("url", FieldType::Url),
            ("multipleRecordLinks", FieldType::MultipleRecordLinks),
            ("checkbox", FieldType::Checkbox),
        ];
        for (tag, expected) in tags {
            let decoded: FieldType = serde_json::from_value(json!(tag)).unwrap();
            assert_eq!(decoded, expected);
        }
    }

    #[test]
    #[timeout(1000)]
    fn test_field_lookup_by_ref() {
        let base = Base::new("B1", "Demo").with_table(
            Table::new("T1", "Tasks")
                .with_field(Field::new("F1", "Title", FieldType::SingleLineText)),
        );
        assert!(base.field(&FieldRef::new("T1", "F1")).is_some());
        assert!(base.field(&FieldRef::new("T1", "F2")).is_none());
        assert!(base.field(&FieldRef::new("T2", "F1")).is_none());
        assert_eq!(FieldRef::new("T1", "F1").to_string(), "T1/F1");
    }
}
