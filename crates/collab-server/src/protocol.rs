//! Requests and responses exchanged with the transport layer.
//!
//! Every [`Request`] produces exactly one [`Response`]. Failures of any kind
//! collapse into [`Response::Error`]; the reason is logged, not sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::broadcast::Broadcaster;
use crate::error::SessionError;
use crate::operation::{Operation, OperationInfo};
use crate::room::{DataId, RoomId};
use crate::server::CollabServer;
use crate::user::UserId;

/// An inbound request from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Register a new user.
    Connect,
    /// Delete a user that has left its room.
    Disconnect {
        /// User to delete.
        user_id: UserId,
    },
    /// Create a room for `data_id` and join the user to it.
    CreateDocument {
        /// Creating user, joined to the new room.
        user_id: UserId,
        /// Logical document the room serves.
        data_id: DataId,
    },
    /// Join an existing room.
    JoinDocument {
        /// Joining user.
        user_id: UserId,
        /// Room to join.
        room_id: RoomId,
    },
    /// Leave the user's current room.
    LeaveDocument {
        /// Leaving user.
        user_id: UserId,
    },
    /// Delete an empty room.
    DeleteDocument {
        /// Room to delete.
        room_id: RoomId,
    },
    /// Commit an operation to a room's document.
    RoomOperation {
        /// Author, who must be a member of the room.
        user_id: UserId,
        /// Target room.
        room_id: RoomId,
        /// The edit.
        operation: Operation,
    },
    /// Read the visible value of a key.
    Query {
        /// Room whose document to read.
        room_id: RoomId,
        /// Key to look up.
        key: String,
    },
}

impl Request {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::CreateDocument { .. } => "create_document",
            Self::JoinDocument { .. } => "join_document",
            Self::LeaveDocument { .. } => "leave_document",
            Self::DeleteDocument { .. } => "delete_document",
            Self::RoomOperation { .. } => "room_operation",
            Self::Query { .. } => "query",
        }
    }
}

/// The single reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// The user was registered.
    Connected {
        /// Id allocated to the new user.
        user_id: UserId,
    },
    /// The user was deleted.
    Disconnected,
    /// The room was created and the creator joined.
    DocumentCreated {
        /// Id allocated to the new room.
        room_id: RoomId,
    },
    /// The user is in the room.
    Joined,
    /// The user left its room.
    Left,
    /// The room was deleted.
    DocumentDeleted,
    /// The operation was applied and broadcast.
    Committed,
    /// Result of a query; `None` when the key is absent or removed.
    Value {
        /// Visible value of the key.
        value: Option<Value>,
    },
    /// The request failed; see the server log for the reason.
    Error,
}

impl Response {
    /// Whether this is [`Response::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Everything the transport writes to a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to the client's last request.
    Response(Response),
    /// An operation committed by another member of the client's room.
    Operation(OperationInfo),
}

impl<B: Broadcaster> CollabServer<B> {
    /// Run one request to completion and produce its response.
    pub fn handle(&mut self, request: Request) -> Response {
        let kind = request.kind();
        debug!(request = kind, "request received");

        match self.route(request) {
            Ok(response) => response,
            Err(err) => {
                warn!(request = kind, error = err.code(), "request rejected: {err}");
                Response::Error
            }
        }
    }

    fn route(&mut self, request: Request) -> Result<Response, SessionError> {
        let response = match request {
            Request::Connect => Response::Connected {
                user_id: self.create_new_user()?,
            },
            Request::Disconnect { user_id } => {
                self.delete_user(user_id)?;
                Response::Disconnected
            }
            Request::CreateDocument { user_id, data_id } => Response::DocumentCreated {
                room_id: self.create_document(user_id, data_id)?,
            },
            Request::JoinDocument { user_id, room_id } => {
                self.user_join_room(user_id, room_id)?;
                Response::Joined
            }
            Request::LeaveDocument { user_id } => {
                self.user_leave_current_room(user_id)?;
                Response::Left
            }
            Request::DeleteDocument { room_id } => {
                self.delete_room(room_id)?;
                Response::DocumentDeleted
            }
            Request::RoomOperation {
                user_id,
                room_id,
                operation,
            } => {
                let op = OperationInfo::new(user_id, room_id, operation);
                self.commit_operation_in_room(&op, room_id)?;
                Response::Committed
            }
            Request::Query { room_id, key } => Response::Value {
                value: self.query(room_id, &key)?,
            },
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use collab_kit::clock::Stamp;
    use serde_json::json;

    use super::*;
    use crate::broadcast::NoopBroadcaster;

    #[test]
    fn requests_decode_from_tagged_json() {
        let request: Request =
            serde_json::from_value(json!({"type": "join_document", "user_id": 1, "room_id": 2}))
                .unwrap();
        assert_eq!(
            request,
            Request::JoinDocument {
                user_id: UserId(1),
                room_id: RoomId(2),
            }
        );

        let request: Request = serde_json::from_str(r#"{"type":"connect"}"#).unwrap();
        assert_eq!(request, Request::Connect);
    }

    #[test]
    fn room_operation_carries_payload() {
        let request: Request = serde_json::from_value(json!({
            "type": "room_operation",
            "user_id": 1,
            "room_id": 1,
            "operation": {"op": "insert", "key": "x", "value": 1, "stamp": {"counter": 1, "replica": 1}}
        }))
        .unwrap();

        let Request::RoomOperation { operation, .. } = request else {
            panic!("wrong variant");
        };
        assert_eq!(operation, Operation::insert("x", 1, Stamp::new(1, 1)));
    }

    #[test]
    fn server_message_envelope() {
        let msg = ServerMessage::Response(Response::Connected { user_id: UserId(4) });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"kind": "response", "body": {"type": "connected", "user_id": 4}})
        );
    }

    #[test]
    fn every_request_gets_one_response() {
        let mut server = CollabServer::new(NoopBroadcaster);

        let Response::Connected { user_id } = server.handle(Request::Connect) else {
            panic!("connect failed");
        };
        let Response::DocumentCreated { room_id } = server.handle(Request::CreateDocument {
            user_id,
            data_id: DataId(1),
        }) else {
            panic!("create failed");
        };

        assert_eq!(server.handle(Request::Disconnect { user_id }), Response::Error);
        assert_eq!(server.handle(Request::DeleteDocument { room_id }), Response::Error);
        assert_eq!(server.handle(Request::LeaveDocument { user_id }), Response::Left);
        assert_eq!(server.handle(Request::DeleteDocument { room_id }), Response::DocumentDeleted);
        assert_eq!(server.handle(Request::Disconnect { user_id }), Response::Disconnected);
    }

    #[test]
    fn malformed_operation_is_an_error_response() {
        let mut server = CollabServer::new(NoopBroadcaster);
        let Response::Connected { user_id } = server.handle(Request::Connect) else {
            panic!("connect failed");
        };
        let Response::DocumentCreated { room_id } = server.handle(Request::CreateDocument {
            user_id,
            data_id: DataId(1),
        }) else {
            panic!("create failed");
        };

        let response = server.handle(Request::RoomOperation {
            user_id,
            room_id,
            operation: Operation::Insert {
                key: "x".into(),
                value: json!(1),
                stamp: None,
            },
        });

        assert!(response.is_error());
        assert_eq!(
            server.handle(Request::Query {
                room_id,
                key: "x".into()
            }),
            Response::Value { value: None }
        );
    }
}
