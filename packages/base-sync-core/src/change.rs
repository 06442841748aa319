//! Change set: wire shape and the typed sum type the applier consumes.
//!
//! A [`WireChange`] is decoded leniently so that one unrecognized or broken
//! entry never fails the whole notification. Each entry is then converted
//! into a [`Change`], one variant per (operation, resource) pair, and
//! conversion failures are reported per change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::model::{Field, FieldId, FieldType, Record, RecordId, Table, TableId};

/// Change operation as it appears in the `type` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    #[serde(untagged)]
    Unknown(String),
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => f.write_str("create"),
            Operation::Update => f.write_str("update"),
            Operation::Delete => f.write_str("delete"),
            Operation::Unknown(other) => f.write_str(other),
        }
    }
}

/// Resource kind as it appears in `resourceAddress.is`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Base,
    Table,
    Field,
    Record,
    #[serde(untagged)]
    Unknown(String),
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Base => f.write_str("base"),
            ResourceKind::Table => f.write_str("table"),
            ResourceKind::Field => f.write_str("field"),
            ResourceKind::Record => f.write_str("record"),
            ResourceKind::Unknown(other) => f.write_str(other),
        }
    }
}

/// `resourceAddress` of a wire change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
}

/// One change exactly as delivered inside a notification.
///
/// Deserialization never fails: an entry whose keys have the wrong shape
/// keeps what did decode and records the problem in `malformed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct WireChange {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(default)]
    pub resource_address: WireAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Why the entry did not decode; such a change is skipped when applied
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl From<Value> for WireChange {
    fn from(value: Value) -> Self {
        let mut wire = WireChange::default();
        let mut entry = match value {
            Value::Object(entry) => entry,
            other => {
                wire.malformed = Some(format!("expected an object, got {}", other));
                return wire;
            }
        };

        let mut problems = Vec::new();
        if let Some(operation) = entry.remove("type").filter(|v| !v.is_null()) {
            match serde_json::from_value(operation) {
                Ok(operation) => wire.operation = Some(operation),
                Err(e) => problems.push(format!("type: {}", e)),
            }
        }
        if let Some(address) = entry.remove("resourceAddress") {
            match serde_json::from_value(address) {
                Ok(address) => wire.resource_address = address,
                Err(e) => problems.push(format!("resourceAddress: {}", e)),
            }
        }
        wire.data = entry.remove("data").filter(|v| !v.is_null());
        if !problems.is_empty() {
            wire.malformed = Some(problems.join("; "));
        }
        wire
    }
}

/// Partial base payload of an `update base` change.
///
/// `None` means the key was absent (or null); `Some("")` is a real update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Partial table payload of an `update table` change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial field payload of an `update field` change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

/// Partial record payload of an `update record` change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub cells: HashMap<FieldId, Value>,
}

/// A decoded change, one variant per (operation, resource) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    CreateBase,
    CreateTable {
        table: Table,
    },
    CreateField {
        table_id: TableId,
        field: Field,
    },
    CreateRecord {
        table_id: TableId,
        record: Record,
    },
    UpdateBase {
        update: BaseUpdate,
    },
    UpdateTable {
        table_id: TableId,
        update: TableUpdate,
    },
    UpdateField {
        table_id: TableId,
        field_id: FieldId,
        update: FieldUpdate,
    },
    UpdateRecord {
        table_id: TableId,
        record_id: RecordId,
        update: RecordUpdate,
    },
    DeleteBase,
    DeleteTable {
        table_id: TableId,
    },
    DeleteField {
        table_id: TableId,
        field_id: FieldId,
    },
    DeleteRecord {
        table_id: TableId,
        record_id: RecordId,
    },
}

impl Change {
    pub fn operation(&self) -> Operation {
        match self {
            Change::CreateBase
            | Change::CreateTable { .. }
            | Change::CreateField { .. }
            | Change::CreateRecord { .. } => Operation::Create,
            Change::UpdateBase { .. }
            | Change::UpdateTable { .. }
            | Change::UpdateField { .. }
            | Change::UpdateRecord { .. } => Operation::Update,
            Change::DeleteBase
            | Change::DeleteTable { .. }
            | Change::DeleteField { .. }
            | Change::DeleteRecord { .. } => Operation::Delete,
        }
    }

    pub fn resource(&self) -> ResourceKind {
        match self {
            Change::CreateBase | Change::UpdateBase { .. } | Change::DeleteBase => {
                ResourceKind::Base
            }
            Change::CreateTable { .. }
            | Change::UpdateTable { .. }
            | Change::DeleteTable { .. } => ResourceKind::Table,
            Change::CreateField { .. }
            | Change::UpdateField { .. }
            | Change::DeleteField { .. } => ResourceKind::Field,
            Change::CreateRecord { .. }
            | Change::UpdateRecord { .. }
            | Change::DeleteRecord { .. } => ResourceKind::Record,
        }
    }

    /// Decodes a wire change into its typed form.
    ///
    /// # Errors
    /// `UnrecognizedChange` for an operation or resource outside the known
    /// set, `MalformedChange` when the entry had the wrong shape or a
    /// required id or payload is missing or does not decode.
    pub fn from_wire(wire: &WireChange) -> Result<Self, SyncError> {
        if let Some(reason) = &wire.malformed {
            return Err(SyncError::MalformedChange {
                operation: wire.operation.as_ref().map(|o| o.to_string()).unwrap_or_default(),
                resource: wire
                    .resource_address
                    .is
                    .as_ref()
                    .map(|k| k.to_string())
                    .unwrap_or_default(),
                reason: reason.clone(),
            });
        }
        let (operation, resource) = match (&wire.operation, &wire.resource_address.is) {
            (Some(op), Some(kind)) => (op, kind),
            (op, kind) => {
                return Err(SyncError::MalformedChange {
                    operation: op.as_ref().map(|o| o.to_string()).unwrap_or_default(),
                    resource: kind.as_ref().map(|k| k.to_string()).unwrap_or_default(),
                    reason: "missing operation or resource kind".to_string(),
                })
            }
        };
        let decoder = WireDecoder {
            wire,
            operation,
            resource,
        };
        let address = &wire.resource_address;

        match (operation, resource) {
            (Operation::Create, ResourceKind::Base) => Ok(Change::CreateBase),
            (Operation::Create, ResourceKind::Table) => Ok(Change::CreateTable {
                table: decoder.data()?,
            }),
            (Operation::Create, ResourceKind::Field) => Ok(Change::CreateField {
                table_id: decoder.require(&address.table_id, "resourceAddress.tableId")?,
                field: decoder.data()?,
            }),
            (Operation::Create, ResourceKind::Record) => Ok(Change::CreateRecord {
                table_id: decoder.require(&address.table_id, "resourceAddress.tableId")?,
                record: decoder.data()?,
            }),
            (Operation::Update, ResourceKind::Base) => Ok(Change::UpdateBase {
                update: decoder.data()?,
            }),
            (Operation::Update, ResourceKind::Table) => {
                let update: TableUpdate = decoder.data()?;
                let table_id = decoder.require_either(
                    &address.table_id,
                    &update.id,
                    "resourceAddress.tableId or data.id",
                )?;
                Ok(Change::UpdateTable { table_id, update })
            }
            (Operation::Update, ResourceKind::Field) => {
                let update: FieldUpdate = decoder.data()?;
                let table_id = decoder.require(&address.table_id, "resourceAddress.tableId")?;
                let field_id = decoder.require_either(
                    &address.field_id,
                    &update.id,
                    "resourceAddress.fieldId or data.id",
                )?;
                Ok(Change::UpdateField {
                    table_id,
                    field_id,
                    update,
                })
            }
            (Operation::Update, ResourceKind::Record) => {
                let update: RecordUpdate = decoder.data()?;
                let table_id = decoder.require(&address.table_id, "resourceAddress.tableId")?;
                let record_id = decoder.require_either(
                    &address.record_id,
                    &update.id,
                    "resourceAddress.recordId or data.id",
                )?;
                Ok(Change::UpdateRecord {
                    table_id,
                    record_id,
                    update,
                })
            }
            (Operation::Delete, ResourceKind::Base) => Ok(Change::DeleteBase),
            (Operation::Delete, ResourceKind::Table) => Ok(Change::DeleteTable {
                table_id: decoder.require(&address.table_id, "resourceAddress.tableId")?,
            }),
            (Operation::Delete, ResourceKind::Field) => Ok(Change::DeleteField {
                table_id: decoder.require(&address.table_id, "resourceAddress.tableId")?,
                field_id: decoder.require(&address.field_id, "resourceAddress.fieldId")?,
            }),
            (Operation::Delete, ResourceKind::Record) => Ok(Change::DeleteRecord {
                table_id: decoder.require(&address.table_id, "resourceAddress.tableId")?,
                record_id: decoder.require(&address.record_id, "resourceAddress.recordId")?,
            }),
            (Operation::Unknown(_), _) | (_, ResourceKind::Unknown(_)) => {
                Err(SyncError::UnrecognizedChange {
                    operation: operation.to_string(),
                    resource: resource.to_string(),
                })
            }
        }
    }
}

impl TryFrom<&WireChange> for Change {
    type Error = SyncError;

    fn try_from(wire: &WireChange) -> Result<Self, Self::Error> {
        Change::from_wire(wire)
    }
}

/// Builds `MalformedChange` errors tagged with the change being decoded.
struct WireDecoder<'a> {
    wire: &'a WireChange,
    operation: &'a Operation,
    resource: &'a ResourceKind,
}

impl WireDecoder<'_> {
    fn malformed(&self, reason: String) -> SyncError {
        SyncError::MalformedChange {
            operation: self.operation.to_string(),
            resource: self.resource.to_string(),
            reason,
        }
    }

    fn data<T: serde::de::DeserializeOwned>(&self) -> Result<T, SyncError> {
        let data = self
            .wire
            .data
            .clone()
            .ok_or_else(|| self.malformed("missing data".to_string()))?;
        serde_json::from_value(data).map_err(|e| self.malformed(format!("invalid data: {}", e)))
    }

    fn require(&self, id: &Option<String>, what: &str) -> Result<String, SyncError> {
        id.clone()
            .ok_or_else(|| self.malformed(format!("missing {}", what)))
    }

    fn require_either(
        &self,
        preferred: &Option<String>,
        fallback: &Option<String>,
        what: &str,
    ) -> Result<String, SyncError> {
        preferred
            .clone()
            .or_else(|| fallback.clone())
            .ok_or_else(|| self.malformed(format!("missing {}", what)))
    }
}
