//! Line-delimited JSON transport over TCP.
//!
//! Each connection sends one [`Request`] per line and receives one
//! [`ServerMessage`] per line: the response to each request, interleaved
//! with operations committed by other members of its room.
//!
//! All connections feed a single core task that owns the [`CollabServer`],
//! so requests are applied strictly one at a time. Every user connected
//! through a connection is released when that connection closes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use collab_server::{
    Broadcaster, CollabServer, OperationInfo, Request, Response, ServerConfig, ServerMessage,
    UserId,
};
use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, trace, warn};

/// Bound on requests waiting for the core task.
const CORE_QUEUE: usize = 256;

/// Bound on messages waiting to be written to one connection.
const OUTBOUND_QUEUE: usize = 32;

/// Write side of one connection as seen by the broadcaster.
#[derive(Clone)]
struct Peer {
    outbound: mpsc::Sender<ServerMessage>,
    evicted: Arc<Notify>,
}

/// Broadcaster delivering operations to the connections of joined users.
///
/// A connection whose outbound queue is full when an operation arrives is
/// evicted: it stops receiving operations and is told to close.
#[derive(Clone, Default)]
pub struct ChannelBroadcaster {
    sessions: Arc<DashMap<UserId, Peer>>,
}

impl ChannelBroadcaster {
    fn register(&self, user: UserId, peer: Peer) {
        self.sessions.insert(user, peer);
    }

    fn unregister(&self, user: UserId) {
        self.sessions.remove(&user);
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn send_operation_to_user(&self, op: &OperationInfo, user: UserId) {
        let Some(peer) = self.sessions.get(&user).map(|peer| peer.clone()) else {
            trace!(user_id = %user, "no connection for user, dropping operation");
            return;
        };
        match peer.outbound.try_send(ServerMessage::Operation(op.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(user_id = %user, "outbound queue full, evicting connection");
                self.sessions.remove(&user);
                peer.evicted.notify_one();
            }
            Err(TrySendError::Closed(_)) => {
                debug!(user_id = %user, "connection closed, dropping operation");
            }
        }
    }
}

enum CoreMessage {
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// Users whose connection closed.
    Release(Vec<UserId>),
    Shutdown,
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve(config: ServerConfig, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve_listener(listener, config, shutdown).await
}

/// Serve connections accepted on `listener` until `shutdown` resolves.
pub async fn serve_listener(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");

    let broadcaster = ChannelBroadcaster::default();
    let server = CollabServer::with_config(&config, broadcaster.clone());
    let (core_tx, core_rx) = mpsc::channel(CORE_QUEUE);
    let core = tokio::spawn(run_core(server, core_rx));

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        core_tx.clone(),
                        broadcaster.clone(),
                    ));
                }
                Err(e) => warn!("accept failed: {e}"),
            },
        }
    }

    info!("shutdown requested");
    // The core may already be gone if it panicked; nothing left to stop then.
    let _ = core_tx.send(CoreMessage::Shutdown).await;
    core.await?;
    Ok(())
}

async fn run_core(
    mut server: CollabServer<ChannelBroadcaster>,
    mut inbox: mpsc::Receiver<CoreMessage>,
) {
    while let Some(message) = inbox.recv().await {
        match message {
            CoreMessage::Request { request, reply } => {
                let response = server.handle(request);
                // The requester may have hung up; the state change still stands.
                let _ = reply.send(response);
            }
            CoreMessage::Release(users) => {
                for user_id in users {
                    // Another connection may have disconnected this user already.
                    if let Err(err) = server.release_user(user_id) {
                        debug!(user_id = %user_id, error = err.code(), "release skipped: {err}");
                    }
                }
            }
            CoreMessage::Shutdown => break,
        }
    }
    server.shutdown();
}

async fn call(core: &mpsc::Sender<CoreMessage>, request: Request) -> Option<Response> {
    let (reply, response) = oneshot::channel();
    core.send(CoreMessage::Request { request, reply })
        .await
        .ok()?;
    response.await.ok()
}

/// Users connected through one connection and not yet disconnected.
#[derive(Default)]
struct Session {
    users: Vec<UserId>,
}

impl Session {
    fn observe(
        &mut self,
        request: &Request,
        response: &Response,
        broadcaster: &ChannelBroadcaster,
        peer: &Peer,
    ) {
        match (request, response) {
            (_, Response::Connected { user_id }) => {
                self.users.push(*user_id);
                broadcaster.register(*user_id, peer.clone());
            }
            (Request::Disconnect { user_id }, Response::Disconnected) => {
                self.users.retain(|user| user != user_id);
                broadcaster.unregister(*user_id);
            }
            _ => {}
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    core: mpsc::Sender<CoreMessage>,
    broadcaster: ChannelBroadcaster,
) {
    debug!(peer = %addr, "connection opened");
    let (reader, writer) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let peer = Peer {
        outbound,
        evicted: Arc::new(Notify::new()),
    };
    let writer = tokio::spawn(write_messages(writer, outbound_rx));

    let mut lines = BufReader::new(reader).lines();
    let mut session = Session::default();
    let mut evicted = false;

    loop {
        let read = tokio::select! {
            read = lines.next_line() => read,
            () = peer.evicted.notified() => {
                evicted = true;
                break;
            }
        };
        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(peer = %addr, "read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let Some(response) = call(&core, request.clone()).await else {
                    break;
                };
                session.observe(&request, &response, &broadcaster, &peer);
                response
            }
            Err(e) => {
                warn!(peer = %addr, "undecodable request: {e}");
                Response::Error
            }
        };

        let sent = tokio::select! {
            sent = peer.outbound.send(ServerMessage::Response(response)) => sent.is_ok(),
            () = peer.evicted.notified() => {
                evicted = true;
                break;
            }
        };
        if !sent {
            break;
        }
    }

    if !session.users.is_empty() {
        for &user_id in &session.users {
            broadcaster.unregister(user_id);
        }
        debug!(peer = %addr, users = session.users.len(), "releasing users");
        // Fails only when the core is already shutting down and draining everything.
        let _ = core.send(CoreMessage::Release(session.users)).await;
    }

    if evicted {
        warn!(peer = %addr, "slow connection evicted");
        writer.abort();
    } else {
        drop(peer);
        match writer.await {
            Ok(Err(e)) => debug!(peer = %addr, "write failed: {e}"),
            Err(e) => warn!(peer = %addr, "writer task failed: {e}"),
            Ok(Ok(())) => {}
        }
    }
    debug!(peer = %addr, "connection closed");
}

async fn write_messages(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<ServerMessage>,
) -> std::io::Result<()> {
    while let Some(message) = outbound.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
    }
    writer.shutdown().await
}
