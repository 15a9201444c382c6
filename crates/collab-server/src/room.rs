use std::collections::BTreeSet;
use std::fmt;

use collab_kit::OpCrdt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommitError;
use crate::operation::{Document, OperationInfo};
use crate::user::UserId;

/// Identifier of a room, unique for the server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the logical document a room is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataId(pub u32);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One document and the users currently editing it.
///
/// The room is the serialization point for its document: operations are
/// applied one at a time through [`commit`](Room::commit).
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    data_id: DataId,
    document: Document,
    members: BTreeSet<UserId>,
}

impl Room {
    pub(crate) fn new(id: RoomId, data_id: DataId) -> Self {
        Self {
            id,
            data_id,
            document: Document::new(),
            members: BTreeSet::new(),
        }
    }

    /// Get this room's id.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// The logical document this room serves.
    pub fn data_id(&self) -> DataId {
        self.data_id
    }

    /// The replicated document, including tombstones.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Add a member. Returns `false` if the user was already a member.
    pub fn join(&mut self, user: UserId) -> bool {
        self.members.insert(user)
    }

    /// Remove a member. Returns `false` if the user was not a member.
    pub fn leave(&mut self, user: UserId) -> bool {
        self.members.remove(&user)
    }

    /// Whether `user` is currently in this room.
    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Whether the room has no members, and so may be deleted.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current members in ascending id order.
    pub fn members(&self) -> impl Iterator<Item = UserId> + '_ {
        self.members.iter().copied()
    }

    /// Number of current members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Visible value of `key` in this room's document.
    pub fn query(&self, key: &str) -> Option<&Value> {
        self.document.query(&key.to_string())
    }

    /// Apply an operation to the document.
    ///
    /// On success returns the committed operation, addressed to this room,
    /// ready for broadcast. On failure the document is untouched.
    pub fn commit(&mut self, op: &OperationInfo) -> Result<OperationInfo, CommitError> {
        let map_op = op.operation.to_map_op()?;
        if !self.document.apply(&map_op) {
            return Err(CommitError::Stale);
        }
        Ok(OperationInfo::new(op.user_id, self.id, op.operation.clone()))
    }
}

#[cfg(test)]
mod tests {
    use collab_kit::clock::Stamp;
    use serde_json::json;

    use super::*;
    use crate::operation::Operation;

    fn room() -> Room {
        Room::new(RoomId(1), DataId(10))
    }

    fn op(operation: Operation) -> OperationInfo {
        OperationInfo::new(UserId(1), RoomId(1), operation)
    }

    #[test]
    fn join_is_idempotent() {
        let mut room = room();
        assert!(room.is_empty());
        assert!(room.join(UserId(1)));
        assert!(!room.join(UserId(1)));
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn leave_empties_room() {
        let mut room = room();
        room.join(UserId(1));
        assert!(room.leave(UserId(1)));
        assert!(!room.leave(UserId(1)));
        assert!(room.is_empty());
    }

    #[test]
    fn commit_applies_to_document() {
        let mut room = room();
        let committed = room
            .commit(&op(Operation::insert("x", 1, Stamp::new(1, 1))))
            .unwrap();

        assert_eq!(committed.room_id, RoomId(1));
        assert_eq!(room.query("x"), Some(&json!(1)));
    }

    #[test]
    fn stale_commit_leaves_document_untouched() {
        let mut room = room();
        room.commit(&op(Operation::insert("x", 1, Stamp::new(5, 1))))
            .unwrap();
        let before = room.document().clone();

        let err = room
            .commit(&op(Operation::remove("x", Stamp::new(2, 1))))
            .unwrap_err();

        assert_eq!(err, CommitError::Stale);
        assert_eq!(room.document(), &before);
    }

    #[test]
    fn malformed_commit_is_rejected() {
        let mut room = room();
        let err = room
            .commit(&op(Operation::Remove {
                key: "x".into(),
                stamp: None,
            }))
            .unwrap_err();

        assert!(matches!(err, CommitError::Malformed(_)));
        assert!(room.document().get(&"x".to_string()).is_none());
    }
}
