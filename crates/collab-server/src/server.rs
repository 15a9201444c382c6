use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::error::{SessionError, SessionResult};
use crate::operation::OperationInfo;
use crate::room::{DataId, Room, RoomId};
use crate::user::{User, UserId};

/// Directory of users and rooms, and the router of operations between them.
///
/// Ids are allocated monotonically from 1 and never reused. A user can only
/// be deleted once it has left its room; a room can only be deleted once it
/// has no members. Every method either succeeds or leaves the directory
/// exactly as it was.
///
/// ```
/// use collab_kit::clock::Stamp;
/// use collab_server::{CollabServer, DataId, NoopBroadcaster, Operation, OperationInfo};
///
/// let mut server = CollabServer::new(NoopBroadcaster);
/// let user = server.create_new_user().unwrap();
/// let room = server.create_new_room(DataId(1)).unwrap();
/// server.user_join_room(user, room).unwrap();
///
/// let op = OperationInfo::new(user, room, Operation::insert("x", 1, Stamp::new(1, 1)));
/// server.commit_operation_in_room(&op, room).unwrap();
/// assert_eq!(server.query(room, "x").unwrap(), Some(serde_json::json!(1)));
/// ```
pub struct CollabServer<B> {
    users: HashMap<UserId, User>,
    rooms: HashMap<RoomId, Room>,
    next_user: u32,
    next_room: u32,
    broadcaster: B,
}

impl<B: Broadcaster> CollabServer<B> {
    /// Create a server with the default configuration.
    pub fn new(broadcaster: B) -> Self {
        Self::with_config(&ServerConfig::default(), broadcaster)
    }

    /// Create a server, reserving directory space from `config`.
    pub fn with_config(config: &ServerConfig, broadcaster: B) -> Self {
        debug!(
            user_capacity = config.user_capacity,
            room_capacity = config.room_capacity,
            "creating collab server"
        );
        Self {
            users: HashMap::with_capacity(config.user_capacity),
            rooms: HashMap::with_capacity(config.room_capacity),
            next_user: 1,
            next_room: 1,
            broadcaster,
        }
    }

    /// The broadcaster committed operations are handed to.
    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    /// Register a new, unjoined user.
    ///
    /// Fails once every `u32` id has been handed out; ids are never reused.
    pub fn create_new_user(&mut self) -> SessionResult<UserId> {
        let id = UserId(self.next_user);
        self.next_user = self
            .next_user
            .checked_add(1)
            .ok_or(SessionError::IdsExhausted("user"))?;
        self.users.insert(id, User::new(id));
        info!(user_id = %id, "user created");
        Ok(id)
    }

    /// Remove a user that is not joined to any room.
    pub fn delete_user(&mut self, id: UserId) -> SessionResult<()> {
        let user = self.users.get(&id).ok_or(SessionError::UnknownUser(id))?;
        if let Some(room) = user.current_room() {
            return Err(SessionError::StillJoined { user: id, room });
        }
        self.users.remove(&id);
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Look up a user.
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Whether `id` names a registered user.
    pub fn has_user(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // ---------------------------------------------------------------------
    // Rooms
    // ---------------------------------------------------------------------

    /// Register a new, empty room bound to `data_id`.
    ///
    /// Fails once every `u32` id has been handed out; ids are never reused.
    pub fn create_new_room(&mut self, data_id: DataId) -> SessionResult<RoomId> {
        let id = RoomId(self.next_room);
        self.next_room = self
            .next_room
            .checked_add(1)
            .ok_or(SessionError::IdsExhausted("room"))?;
        self.rooms.insert(id, Room::new(id, data_id));
        info!(room_id = %id, data_id = %data_id, "room created");
        Ok(id)
    }

    /// Remove a room that has no members.
    pub fn delete_room(&mut self, id: RoomId) -> SessionResult<()> {
        let room = self.rooms.get(&id).ok_or(SessionError::UnknownRoom(id))?;
        if !room.is_empty() {
            return Err(SessionError::RoomNotEmpty {
                room: id,
                members: room.member_count(),
            });
        }
        self.rooms.remove(&id);
        info!(room_id = %id, "room deleted");
        Ok(())
    }

    /// Look up a room.
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// Whether `id` names a registered room.
    pub fn has_room(&self, id: RoomId) -> bool {
        self.rooms.contains_key(&id)
    }

    /// Number of registered rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // ---------------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------------

    /// Join `user` to `room`.
    ///
    /// Joining the room the user is already in succeeds without change. A
    /// user in another room must leave it first.
    pub fn user_join_room(&mut self, user_id: UserId, room_id: RoomId) -> SessionResult<()> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(SessionError::UnknownUser(user_id))?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(SessionError::UnknownRoom(room_id))?;

        match user.current_room() {
            Some(current) if current == room_id => return Ok(()),
            Some(current) => {
                return Err(SessionError::AlreadyJoined {
                    user: user_id,
                    room: current,
                })
            }
            None => {}
        }

        room.join(user_id);
        user.enter(room_id);
        info!(user_id = %user_id, room_id = %room_id, "user joined room");
        Ok(())
    }

    /// Remove `user` from the room it is in, returning that room.
    pub fn user_leave_current_room(&mut self, user_id: UserId) -> SessionResult<RoomId> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(SessionError::UnknownUser(user_id))?;
        let room_id = user.exit().ok_or(SessionError::NotJoined(user_id))?;

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.leave(user_id);
        }
        info!(user_id = %user_id, room_id = %room_id, "user left room");
        Ok(room_id)
    }

    /// Create a room bound to `data_id` and join `user` to it.
    ///
    /// Nothing is created if the user is unknown or already in a room.
    pub fn create_document(&mut self, user_id: UserId, data_id: DataId) -> SessionResult<RoomId> {
        let user = self
            .users
            .get(&user_id)
            .ok_or(SessionError::UnknownUser(user_id))?;
        if let Some(room) = user.current_room() {
            return Err(SessionError::AlreadyJoined {
                user: user_id,
                room,
            });
        }

        let room_id = self.create_new_room(data_id)?;
        self.user_join_room(user_id, room_id)?;
        Ok(room_id)
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Apply `op` to the document of `room_id` and broadcast it.
    ///
    /// The author must be a member of the room. Nothing is broadcast unless
    /// the document accepted the operation.
    pub fn commit_operation_in_room(
        &mut self,
        op: &OperationInfo,
        room_id: RoomId,
    ) -> SessionResult<()> {
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(SessionError::UnknownRoom(room_id))?;
        if !room.is_member(op.user_id) {
            return Err(SessionError::NotMember {
                user: op.user_id,
                room: room_id,
            });
        }

        let committed = room.commit(op)?;
        debug!(
            user_id = %op.user_id,
            room_id = %room_id,
            key = op.operation.key(),
            "operation committed"
        );

        let members: Vec<UserId> = room.members().collect();
        self.broadcaster
            .broadcast_operation_to_room(&committed, room_id, &members);
        Ok(())
    }

    /// Visible value of `key` in the document of `room_id`.
    pub fn query(&self, room_id: RoomId, key: &str) -> SessionResult<Option<Value>> {
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(SessionError::UnknownRoom(room_id))?;
        Ok(room.query(key).cloned())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Make `user` leave its room, if it is in one, and delete it.
    ///
    /// Returns the room the user was in.
    pub fn release_user(&mut self, id: UserId) -> SessionResult<Option<RoomId>> {
        let room = match self.user_leave_current_room(id) {
            Ok(room) => Some(room),
            Err(SessionError::NotJoined(_)) => None,
            Err(err) => return Err(err),
        };
        self.delete_user(id)?;
        Ok(room)
    }

    /// Make every user leave, then delete all users and rooms.
    pub fn shutdown(&mut self) {
        info!(
            users = self.users.len(),
            rooms = self.rooms.len(),
            "shutting down collab server"
        );

        let mut users: Vec<UserId> = self.users.keys().copied().collect();
        users.sort_unstable();
        for id in users {
            // Only registered ids are drained, so this cannot fail.
            let _ = self.release_user(id);
        }

        let mut rooms: Vec<RoomId> = self.rooms.keys().copied().collect();
        rooms.sort_unstable();
        for id in rooms {
            let _ = self.delete_room(id);
        }
    }
}
