use crate::operation::OperationInfo;
use crate::room::RoomId;
use crate::user::UserId;

/// Dissemination of committed operations to other users.
///
/// Calls are fire-and-forget: the server never waits for delivery and its
/// local state is authoritative as soon as a commit succeeds. Implementations
/// live in the transport layer.
pub trait Broadcaster {
    /// Deliver a committed operation to a single user.
    fn send_operation_to_user(&self, op: &OperationInfo, user: UserId);

    /// Deliver a committed operation to the members of a room.
    ///
    /// The default sends to every member except the author of the operation.
    fn broadcast_operation_to_room(&self, op: &OperationInfo, room: RoomId, members: &[UserId]) {
        tracing::trace!(room_id = %room, recipients = members.len(), "broadcasting operation");
        for &member in members {
            if member != op.user_id {
                self.send_operation_to_user(op, member);
            }
        }
    }
}

impl<B: Broadcaster + ?Sized> Broadcaster for &B {
    fn send_operation_to_user(&self, op: &OperationInfo, user: UserId) {
        (**self).send_operation_to_user(op, user);
    }

    fn broadcast_operation_to_room(&self, op: &OperationInfo, room: RoomId, members: &[UserId]) {
        (**self).broadcast_operation_to_room(op, room, members);
    }
}

/// A broadcaster that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn send_operation_to_user(&self, _op: &OperationInfo, _user: UserId) {}
}
