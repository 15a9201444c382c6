//! Operation payloads routed to a room's document.

use collab_kit::clock::Stamp;
use collab_kit::{LWWMap, MapOp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommitError;
use crate::room::RoomId;
use crate::user::UserId;

/// The replicated document bound to a room.
pub type Document = LWWMap<String, Value, Stamp>;

/// An edit to a document, as sent by a client.
///
/// The stamp is optional on the wire so that a request missing it can be
/// told apart from a valid one and rejected as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Write `value` and mark `key` present.
    Insert {
        /// Target key.
        key: String,
        /// New value.
        value: Value,
        /// Causal stamp of the edit.
        stamp: Option<Stamp>,
    },
    /// Write `value` without touching presence.
    Update {
        /// Target key.
        key: String,
        /// New value.
        value: Value,
        /// Causal stamp of the edit.
        stamp: Option<Stamp>,
    },
    /// Mark `key` removed.
    Remove {
        /// Target key.
        key: String,
        /// Causal stamp of the edit.
        stamp: Option<Stamp>,
    },
}

impl Operation {
    /// Insert `value` under `key` at `stamp`.
    pub fn insert(key: impl Into<String>, value: impl Into<Value>, stamp: Stamp) -> Self {
        Self::Insert {
            key: key.into(),
            value: value.into(),
            stamp: Some(stamp),
        }
    }

    /// Overwrite the value under `key` at `stamp`.
    pub fn update(key: impl Into<String>, value: impl Into<Value>, stamp: Stamp) -> Self {
        Self::Update {
            key: key.into(),
            value: value.into(),
            stamp: Some(stamp),
        }
    }

    /// Remove `key` at `stamp`.
    pub fn remove(key: impl Into<String>, stamp: Stamp) -> Self {
        Self::Remove {
            key: key.into(),
            stamp: Some(stamp),
        }
    }

    /// The key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Remove { key, .. } => key,
        }
    }

    /// The stamp carried by this operation, if any.
    pub fn stamp(&self) -> Option<Stamp> {
        match self {
            Self::Insert { stamp, .. } | Self::Update { stamp, .. } | Self::Remove { stamp, .. } => {
                *stamp
            }
        }
    }

    /// Validate the payload and convert it into a document operation.
    pub fn to_map_op(&self) -> Result<MapOp<String, Value>, CommitError> {
        if self.key().is_empty() {
            return Err(CommitError::Malformed("empty key"));
        }
        let stamp = self.stamp().ok_or(CommitError::Malformed("missing stamp"))?;

        let op = match self {
            Self::Insert { key, value, .. } => MapOp::Insert {
                key: key.clone(),
                value: value.clone(),
                stamp,
            },
            Self::Update { key, value, .. } => MapOp::Update {
                key: key.clone(),
                value: value.clone(),
                stamp,
            },
            Self::Remove { key, .. } => MapOp::Remove {
                key: key.clone(),
                stamp,
            },
        };
        Ok(op)
    }
}

/// An operation together with its origin, built per inbound request.
///
/// After a successful commit the same value is handed to the
/// [`Broadcaster`](crate::Broadcaster); each recipient gets its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Author of the operation.
    pub user_id: UserId,
    /// Room whose document it targets.
    pub room_id: RoomId,
    /// The edit itself.
    pub operation: Operation,
}

impl OperationInfo {
    /// Bundle an operation with its author and target room.
    pub fn new(user_id: UserId, room_id: RoomId, operation: Operation) -> Self {
        Self {
            user_id,
            room_id,
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_stamp_is_malformed() {
        let op = Operation::Insert {
            key: "x".into(),
            value: json!(1),
            stamp: None,
        };
        assert_eq!(op.to_map_op(), Err(CommitError::Malformed("missing stamp")));
    }

    #[test]
    fn empty_key_is_malformed() {
        let op = Operation::remove("", Stamp::new(1, 1));
        assert_eq!(op.to_map_op(), Err(CommitError::Malformed("empty key")));
    }

    #[test]
    fn valid_operation_converts() {
        let op = Operation::update("x", 2, Stamp::new(3, 1));
        assert_eq!(
            op.to_map_op(),
            Ok(MapOp::Update {
                key: "x".to_string(),
                value: json!(2),
                stamp: Stamp::new(3, 1),
            })
        );
    }

    #[test]
    fn wire_shape_is_tagged() {
        let op = Operation::insert("x", 1, Stamp::new(1, 7));
        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(
            encoded,
            json!({"op": "insert", "key": "x", "value": 1, "stamp": {"counter": 1, "replica": 7}})
        );
    }

    #[test]
    fn wire_without_stamp_decodes_as_none() {
        let op: Operation = serde_json::from_value(json!({"op": "remove", "key": "x"})).unwrap();
        assert_eq!(op.stamp(), None);
    }
}
