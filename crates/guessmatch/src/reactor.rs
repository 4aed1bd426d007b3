//! The connection multiplexer.
//!
//! One task accepts sockets. Each socket then gets a reader task (read,
//! decode, post) and a writer task (drain the player's outbox, encode,
//! write). Everything the readers decode, and everything finished on the
//! blocking pool, lands on a single event channel drained by the
//! [`Reactor`]. The reactor handles one event at a time and never waits
//! on I/O, so handlers observe registry changes in arrival order.

use std::sync::Arc;

use guessmatch_matchmaking::MatchmakingState;
use guessmatch_protocol::{FrameDecoder, Message, MessageKind, PlayerId, encode};
use guessmatch_session::{SessionError, UserRecord, UserStore};
use guessmatch_transport::{Connection, ConnectionId, TcpConnection, TcpTransport, Transport};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::handler;
use crate::server::ServerContext;

/// Work for the reactor.
pub(crate) enum Event {
    /// A socket was accepted.
    Opened(TcpConnection),
    /// A complete frame arrived.
    Frame {
        conn: ConnectionId,
        message: Message,
    },
    /// The socket hit end-of-stream or a read error.
    Closed { conn: ConnectionId },
    /// A password check finished on the blocking pool.
    LoginResolved {
        conn: ConnectionId,
        player: PlayerId,
        result: Result<UserRecord, SessionError>,
    },
}

/// Accepts connections forever and hands them to the reactor.
pub(crate) async fn accept_loop(mut transport: TcpTransport, events: mpsc::UnboundedSender<Event>) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                if events.send(Event::Opened(conn)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

/// Single consumer of the event channel.
pub(crate) struct Reactor<S: UserStore> {
    ctx: Arc<ServerContext<S>>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl<S: UserStore> Reactor<S> {
    pub(crate) fn new(ctx: Arc<ServerContext<S>>, events: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { ctx, events }
    }

    /// Handles events until every sender is gone.
    pub(crate) async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.dispatch(event).await;
        }
        tracing::info!("event channel closed, reactor stopping");
    }

    async fn dispatch(&self, event: Event) {
        let mut state = self.ctx.state.lock().await;
        match event {
            Event::Opened(conn) => self.open(&mut state, conn),
            Event::Frame { conn, message } => handler::on_message(&self.ctx, &mut state, conn, message),
            Event::Closed { conn } => handler::on_closed(&self.ctx, &mut state, conn),
            Event::LoginResolved {
                conn,
                player,
                result,
            } => handler::on_login_resolved(&mut state, conn, player, result),
        }
    }

    /// Registers a fresh player for the socket and starts its I/O tasks.
    fn open(&self, state: &mut MatchmakingState, conn: TcpConnection) {
        let conn = Arc::new(conn);
        let conn_id = conn.id();
        let (outbox, inbox) = mpsc::unbounded_channel();

        let _ = outbox.send(Message::bare(MessageKind::AuthenticationRequest));
        let player_id = state.registry.connect(conn_id, outbox);
        tracing::info!(%conn_id, %player_id, peer = %conn.peer_addr(), "connection accepted");

        let reader = tokio::spawn(read_loop(Arc::clone(&conn), self.ctx.events.clone()));
        tokio::spawn(write_loop(conn, inbox, reader.abort_handle()));
    }
}

/// Reads chunks, cuts them into frames and posts each one in order.
async fn read_loop(conn: Arc<TcpConnection>, events: mpsc::UnboundedSender<Event>) {
    let conn_id = conn.id();
    let mut decoder = FrameDecoder::new();

    loop {
        match conn.recv().await {
            Ok(Some(bytes)) => {
                for message in decoder.feed(&bytes) {
                    if events.send(Event::Frame { conn: conn_id, message }).is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::info!(%conn_id, error = %e, "connection lost");
                break;
            }
        }
    }

    let _ = events.send(Event::Closed { conn: conn_id });
}

/// Writes queued messages until every sender of the outbox is dropped,
/// then shuts the socket down.
///
/// Messages queued before the last sender went away are still written,
/// so a `Disconnect` sent just before removing a player reaches them.
/// A drained outbox means the player is gone, so the reader is stopped
/// too and the socket is released. After a failed write the reader is
/// left running: it reports the disconnect.
async fn write_loop(
    conn: Arc<TcpConnection>,
    mut inbox: mpsc::UnboundedReceiver<Message>,
    reader: AbortHandle,
) {
    let conn_id = conn.id();
    let mut drained = true;

    while let Some(message) = inbox.recv().await {
        let bytes = match encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, kind = %message.kind, error = %e, "dropping unencodable message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "write failed");
            drained = false;
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    if drained {
        reader.abort();
        tracing::debug!(%conn_id, "connection released");
    }
}
