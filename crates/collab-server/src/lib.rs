//! # collab-server
//!
//! Session model for collaborative editing on top of [`collab-kit`].
//!
//! A [`CollabServer`] keeps a directory of [`User`]s and [`Room`]s. Each room
//! binds one replicated [`Document`] to the users editing it. Client
//! operations are routed to the room owning the target document, applied
//! there, and only on success handed to a [`Broadcaster`] for dissemination.
//!
//! ```text
//! Request ──▶ CollabServer::handle ──▶ Room::commit ──▶ Document (LWWMap)
//!                    │                                     │
//!                    ◀──────────── Response                │ accepted
//!                                                          ▼
//!                                        Broadcaster::broadcast_operation_to_room
//! ```
//!
//! Requests are processed one at a time. Embedders that serve several
//! connections must funnel them into a single owner of the server, as the
//! `collabd` binary does.
//!
//! [`collab-kit`]: collab_kit

#![warn(missing_docs)]

mod broadcast;
mod config;
mod error;
mod operation;
mod protocol;
mod room;
mod server;
mod user;

pub use broadcast::{Broadcaster, NoopBroadcaster};
pub use config::ServerConfig;
pub use error::{CommitError, ConfigError, SessionError, SessionResult};
pub use operation::{Document, Operation, OperationInfo};
pub use protocol::{Request, Response, ServerMessage};
pub use room::{DataId, Room, RoomId};
pub use server::CollabServer;
pub use user::{User, UserId};
