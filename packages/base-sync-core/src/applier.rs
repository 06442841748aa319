//! Applies one decoded change to a replica.
//!
//! The applier is a plain function over `Option<Base>`: it has no access to
//! the store, the gate or the transport. Missing parents are reported as
//! errors rather than panics; deleting something that is already gone is a
//! no-op.

use crate::change::Change;
use crate::error::{Result, SyncError};
use crate::model::{Base, FieldRef, Table};

/// What applying a change did to the replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Replica was modified
    Applied,
    /// Change had nothing to do
    Ignored,
    /// Replica was modified, but the field's type changed and its options
    /// can only be refreshed from a full snapshot
    ResyncRequired(FieldRef),
}

/// Applies `change` to `replica`.
///
/// # Arguments
/// * `replica` - Replica to mutate; `None` when absent
/// * `change` - Decoded change
///
/// # Returns
/// The outcome on success, or the reason the change could not be applied.
/// The replica is left untouched on error.
pub fn apply_change(replica: &mut Option<Base>, change: Change) -> Result<ApplyOutcome> {
    match change {
        // A subscriber is scoped to an existing base; nothing to create.
        Change::CreateBase => Ok(ApplyOutcome::Ignored),
        Change::CreateTable { table } => {
            let base = base_mut(replica)?;
            base.tables.insert(table.id.clone(), table);
            Ok(ApplyOutcome::Applied)
        }
        Change::CreateField { table_id, field } => {
            let table = table_mut(replica, &table_id)?;
            table.fields.insert(field.id.clone(), field);
            Ok(ApplyOutcome::Applied)
        }
        Change::CreateRecord { table_id, record } => {
            let table = table_mut(replica, &table_id)?;
            table.records.insert(record.id.clone(), record);
            Ok(ApplyOutcome::Applied)
        }
        Change::UpdateBase { update } => match update.name {
            Some(name) => {
                base_mut(replica)?.name = name;
                Ok(ApplyOutcome::Applied)
            }
            None => Ok(ApplyOutcome::Ignored),
        },
        Change::UpdateTable { table_id, update } => {
            let table = table_mut(replica, &table_id)?;
            if update.name.is_none() && update.description.is_none() {
                return Ok(ApplyOutcome::Ignored);
            }
            if let Some(name) = update.name {
                table.name = name;
            }
            if let Some(description) = update.description {
                table.description = Some(description);
            }
            Ok(ApplyOutcome::Applied)
        }
        Change::UpdateField {
            table_id,
            field_id,
            update,
        } => {
            let table = table_mut(replica, &table_id)?;
            let field = table
                .fields
                .get_mut(&field_id)
                .ok_or_else(|| SyncError::FieldNotFound {
                    table_id: table_id.clone(),
                    field_id: field_id.clone(),
                })?;

            let mut outcome = ApplyOutcome::Ignored;
            if let Some(name) = update.name {
                field.name = name;
                outcome = ApplyOutcome::Applied;
            }
            if let Some(description) = update.description {
                field.description = Some(description);
                outcome = ApplyOutcome::Applied;
            }
            if let Some(field_type) = update.field_type {
                if field.field_type != field_type {
                    field.field_type = field_type;
                    outcome = ApplyOutcome::ResyncRequired(FieldRef::new(table_id, field_id));
                }
            }
            Ok(outcome)
        }
        Change::UpdateRecord {
            table_id,
            record_id,
            update,
        } => {
            let table = table_mut(replica, &table_id)?;
            let record =
                table
                    .records
                    .get_mut(&record_id)
                    .ok_or_else(|| SyncError::RecordNotFound {
                        table_id: table_id.clone(),
                        record_id: record_id.clone(),
                    })?;
            if update.cells.is_empty() {
                return Ok(ApplyOutcome::Ignored);
            }
            record.cells.extend(update.cells);
            Ok(ApplyOutcome::Applied)
        }
        Change::DeleteTable { table_id } => {
            let base = base_mut(replica)?;
            Ok(removed(base.tables.remove(&table_id).is_some()))
        }
        Change::DeleteField { table_id, field_id } => {
            let table = table_mut(replica, &table_id)?;
            Ok(removed(table.fields.remove(&field_id).is_some()))
        }
        Change::DeleteRecord {
            table_id,
            record_id,
        } => {
            let table = table_mut(replica, &table_id)?;
            Ok(removed(table.records.remove(&record_id).is_some()))
        }
        Change::DeleteBase => Ok(removed(replica.take().is_some())),
    }
}

fn base_mut(replica: &mut Option<Base>) -> Result<&mut Base> {
    replica.as_mut().ok_or(SyncError::ReplicaAbsent)
}

fn table_mut<'a>(replica: &'a mut Option<Base>, table_id: &str) -> Result<&'a mut Table> {
    base_mut(replica)?
        .tables
        .get_mut(table_id)
        .ok_or_else(|| SyncError::TableNotFound {
            table_id: table_id.to_string(),
        })
}

fn removed(existed: bool) -> ApplyOutcome {
    if existed {
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::Ignored
    }
}
