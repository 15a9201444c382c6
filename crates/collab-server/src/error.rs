//! Error types for the session layer.
//!
//! Every fallible session operation rejects before mutating anything, so an
//! error always means "nothing happened". The transport collapses all of
//! them into a generic error response; the variants exist for logging and
//! for callers embedding the server directly.

use thiserror::Error;

use crate::room::RoomId;
use crate::user::UserId;

/// Why an operation could not be committed to a room's document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// The payload cannot be interpreted (missing stamp, empty key).
    #[error("malformed operation: {0}")]
    Malformed(&'static str),

    /// The document already holds newer state; applying changed nothing.
    #[error("stale operation: superseded by newer state")]
    Stale,
}

impl CommitError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Stale => "stale",
        }
    }
}

/// Errors returned by [`CollabServer`](crate::CollabServer) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No user with this id is registered.
    #[error("no such user: {0}")]
    UnknownUser(UserId),

    /// No room with this id is registered.
    #[error("no such room: {0}")]
    UnknownRoom(RoomId),

    /// Every id of this kind has been handed out.
    #[error("{0} ids exhausted")]
    IdsExhausted(&'static str),

    /// Join requested while the user is in another room.
    #[error("user {user} is already in room {room}")]
    AlreadyJoined {
        /// The joining user.
        user: UserId,
        /// The room it is currently in.
        room: RoomId,
    },

    /// Leave requested by a user that is not in any room.
    #[error("user {0} is not in a room")]
    NotJoined(UserId),

    /// The user must leave its room before it can be deleted.
    #[error("user {user} is still in room {room}")]
    StillJoined {
        /// The user to delete.
        user: UserId,
        /// The room it is still in.
        room: RoomId,
    },

    /// The room must be emptied before it can be deleted.
    #[error("room {room} still has {members} member(s)")]
    RoomNotEmpty {
        /// The room to delete.
        room: RoomId,
        /// How many users are still in it.
        members: usize,
    },

    /// Only members of a room may commit operations to it.
    #[error("user {user} is not a member of room {room}")]
    NotMember {
        /// The committing user.
        user: UserId,
        /// The room it tried to write to.
        room: RoomId,
    },

    /// The room's document rejected the operation.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl SessionError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownUser(_) => "unknown_user",
            Self::UnknownRoom(_) => "unknown_room",
            Self::IdsExhausted(_) => "ids_exhausted",
            Self::AlreadyJoined { .. } => "already_joined",
            Self::NotJoined(_) => "not_joined",
            Self::StillJoined { .. } => "still_joined",
            Self::RoomNotEmpty { .. } => "room_not_empty",
            Self::NotMember { .. } => "not_member",
            Self::Commit(e) => e.code(),
        }
    }

    /// Whether the error names an id that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownUser(_) | Self::UnknownRoom(_))
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors while loading a [`ServerConfig`](crate::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path as given by the caller.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown or mistyped keys.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parsed but cannot be served.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
