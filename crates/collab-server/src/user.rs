use std::fmt;

use serde::{Deserialize, Serialize};

use crate::room::RoomId;

/// Identifier of a connected user, unique for the server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected user.
///
/// A user is either unjoined or joined to exactly one room. The
/// [`CollabServer`](crate::CollabServer) keeps this reference and the room's
/// member set in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    room: Option<RoomId>,
}

impl User {
    pub(crate) fn new(id: UserId) -> Self {
        Self { id, room: None }
    }

    /// Get this user's id.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// The room this user is joined to, if any.
    pub fn current_room(&self) -> Option<RoomId> {
        self.room
    }

    pub(crate) fn enter(&mut self, room: RoomId) {
        self.room = Some(room);
    }

    pub(crate) fn exit(&mut self) -> Option<RoomId> {
        self.room.take()
    }
}
