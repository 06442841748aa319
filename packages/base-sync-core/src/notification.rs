//! Sequence-numbered change batches delivered over the change channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::change::WireChange;
use crate::error::Result;

/// Emission time of a notification; the server may send epoch millis or text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

/// One batch of changes, applied as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncNotification {
    /// Strictly increasing per base.
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub changes: Vec<WireChange>,
}

impl SyncNotification {
    pub fn new(number: u64, changes: Vec<WireChange>) -> Self {
        Self {
            number,
            timestamp: None,
            changes,
        }
    }

    /// Decodes a raw event message.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Operation, ResourceKind};
    use crate::error::SyncError;
    use ntest::timeout;
    use serde_json::json;

    #[test]
    #[timeout(1000)]
    fn test_decode_notification() {
        let notification = SyncNotification::from_value(json!({
            "number": 4,
            "timestamp": 1700000000000i64,
            "changes": [
                { "type": "delete", "resourceAddress": { "is": "table", "tableId": "T1" } },
                { "type": "rename", "resourceAddress": { "is": "table", "tableId": "T1" } }
            ]
        }))
        .unwrap();

        assert_eq!(notification.number, 4);
        assert_eq!(notification.timestamp, Some(Timestamp::Millis(1_700_000_000_000)));
        assert_eq!(notification.changes.len(), 2);
        assert_eq!(notification.changes[0].operation, Some(Operation::Delete));
        assert_eq!(
            notification.changes[1].operation,
            Some(Operation::Unknown("rename".to_string()))
        );
        assert_eq!(
            notification.changes[1].resource_address.is,
            Some(ResourceKind::Table)
        );
    }

    #[test]
    #[timeout(1000)]
    fn test_text_timestamp_and_missing_changes() {
        let notification = SyncNotification::from_value(json!({
            "number": 1,
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert!(notification.is_empty());
        assert!(matches!(notification.timestamp, Some(Timestamp::Text(_))));
    }

    #[test]
    #[timeout(1000)]
    fn test_missing_number_is_a_decode_error() {
        let err = SyncNotification::from_value(json!({ "changes": [] })).unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
