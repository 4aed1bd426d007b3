//! Message routing: what each inbound frame does to the registry, the
//! queues and the running games.
//!
//! Every function here runs on the reactor with the matchmaking state
//! already locked, and returns without awaiting. Anything slow (password
//! checks, store writes) is pushed to the blocking pool and comes back,
//! if it needs to, as a reactor event.

use std::sync::Arc;
use std::time::Instant;

use guessmatch_game::GameError;
use guessmatch_matchmaking::MatchmakingState;
use guessmatch_protocol::{Credentials, Message, MessageKind, ModeSelection, PlayerId};
use guessmatch_session::{Player, PlayerState, SessionError, UserRecord, UserStore};
use guessmatch_transport::ConnectionId;

use crate::flush::Flush;
use crate::reactor::Event;
use crate::server::ServerContext;

/// Routes one decoded frame from `conn`.
pub(crate) fn on_message<S: UserStore>(
    ctx: &Arc<ServerContext<S>>,
    state: &mut MatchmakingState,
    conn: ConnectionId,
    message: Message,
) {
    let Some(id) = state.registry.by_connection(conn) else {
        tracing::debug!(conn_id = %conn, kind = %message.kind, "frame from unregistered connection");
        return;
    };

    match message.kind {
        MessageKind::KeepAlive => {}
        MessageKind::AuthenticationAttempt => login_attempt(ctx, state, conn, id, &message.payload),
        MessageKind::AuthenticationAttemptToken => token_attempt(state, id, &message.payload),
        MessageKind::GameModeResponse => mode_response(ctx, state, id, &message.payload),
        MessageKind::GameGuess => guess(ctx, state, id, &message.payload),
        MessageKind::Disconnect => {
            tracing::info!(player_id = %id, "client said goodbye");
            leave(ctx, state, id);
        }
        MessageKind::Default => {
            tracing::debug!(player_id = %id, payload = %message.payload, "unrecognised frame ignored");
        }
        other => {
            tracing::debug!(player_id = %id, kind = %other, "server-only message from client");
            send(state, id, Message::info(format!("Unexpected {other} message.")));
        }
    }
}

/// The socket behind `conn` is gone.
///
/// Queued players are suspended and keep their place; anyone else is
/// removed, leaving their game if they were in one.
pub(crate) fn on_closed<S: UserStore>(
    ctx: &Arc<ServerContext<S>>,
    state: &mut MatchmakingState,
    conn: ConnectionId,
) {
    let Some(id) = state.registry.by_connection(conn) else {
        return;
    };
    let queued = state
        .registry
        .get(id)
        .is_some_and(|p| matches!(p.state, PlayerState::Queued(_)));

    if queued {
        state.registry.suspend(id, Instant::now());
    } else {
        tracing::info!(player_id = %id, conn_id = %conn, "player disconnected");
        leave(ctx, state, id);
    }
}

/// A password check came back from the blocking pool.
pub(crate) fn on_login_resolved(
    state: &mut MatchmakingState,
    conn: ConnectionId,
    id: PlayerId,
    result: Result<UserRecord, SessionError>,
) {
    if state.registry.by_connection(conn) != Some(id) {
        tracing::debug!(player_id = %id, "connection gone before login finished");
        return;
    }

    match result.and_then(|record| state.registry.login(id, record)) {
        Ok(player) => welcome(state, player),
        Err(err) => {
            let reason = match &err {
                SessionError::Store(e) => {
                    tracing::warn!(player_id = %id, error = %e, "credential store unavailable");
                    "credential store unavailable, try again later".to_string()
                }
                other => {
                    tracing::info!(player_id = %id, error = %other, "login rejected");
                    other.to_string()
                }
            };
            if let Some(player) = state.registry.get(id) {
                reject(player, reason);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

fn login_attempt<S: UserStore>(
    ctx: &Arc<ServerContext<S>>,
    state: &MatchmakingState,
    conn: ConnectionId,
    id: PlayerId,
    payload: &str,
) {
    let Some(player) = unauthenticated(state, id) else {
        return;
    };
    let credentials: Credentials = match payload.parse() {
        Ok(credentials) => credentials,
        Err(e) => {
            reject(player, e.to_string());
            return;
        }
    };

    tracing::debug!(player_id = %id, username = %credentials.username, "checking credentials");
    let auth = ctx.auth.clone();
    let events = ctx.events.clone();
    tokio::task::spawn_blocking(move || {
        let result = auth.login(&credentials);
        let _ = events.send(Event::LoginResolved {
            conn,
            player: id,
            result,
        });
    });
}

fn token_attempt(state: &mut MatchmakingState, id: PlayerId, payload: &str) {
    if unauthenticated(state, id).is_none() {
        return;
    }
    match state.registry.resume_with_token(id, payload.trim()) {
        Ok(player) => {
            tracing::info!(player_id = %player, "session resumed with token");
            welcome(state, player);
        }
        Err(err) => {
            tracing::info!(player_id = %id, error = %err, "token rejected");
            if let Some(player) = state.registry.get(id) {
                reject(player, err.to_string());
            }
        }
    }
}

/// The player, if they still need to log in. Tells them otherwise.
fn unauthenticated(state: &MatchmakingState, id: PlayerId) -> Option<&Player> {
    let player = state.registry.get(id)?;
    if !player.is_authenticated() {
        Some(player)
    } else {
        player.send(Message::info("You are already logged in."));
        None
    }
}

/// Confirms a login and tells the player what comes next: mode selection,
/// or the queue they were already waiting in.
fn welcome(state: &MatchmakingState, id: PlayerId) {
    let Some(player) = state.registry.get(id) else {
        return;
    };
    let token = player.token.as_deref().unwrap_or_default();
    player.send(Message::new(
        MessageKind::AuthenticationSuccessful,
        format!(
            "{};{token};{};{}",
            player.display_name(),
            player.score,
            player.games_played
        ),
    ));

    if let PlayerState::Queued(mode) = player.state {
        player.send(Message::info(format!(
            "Welcome back! You are still in the {mode} queue."
        )));
    } else {
        player.send(Message::bare(MessageKind::GameModeRequest));
    }
}

fn reject(player: &Player, reason: impl Into<String>) {
    player.send(Message::new(MessageKind::AuthenticationFailure, reason));
    player.send(Message::bare(MessageKind::AuthenticationRequest));
}

// ---------------------------------------------------------------------------
// Mode selection
// ---------------------------------------------------------------------------

fn mode_response<S: UserStore>(
    ctx: &Arc<ServerContext<S>>,
    state: &mut MatchmakingState,
    id: PlayerId,
    payload: &str,
) {
    let Some(player) = state.registry.get(id) else {
        return;
    };
    if player.state != PlayerState::Idle {
        player.send(Message::info(format!(
            "You can't choose a game mode while {}.",
            player.state.name()
        )));
        return;
    }

    match payload.parse::<ModeSelection>() {
        Err(e) => {
            player.send(Message::info(e.to_string()));
            player.send(Message::bare(MessageKind::GameModeRequest));
        }
        Ok(ModeSelection::Quit) => quit(ctx, state, id),
        Ok(ModeSelection::Play(mode)) => match state.enqueue(id, mode, Instant::now()) {
            Ok(()) => send(
                state,
                id,
                Message::info(format!("Joined the {mode} queue. Waiting for opponents...")),
            ),
            Err(e) => send(state, id, Message::info(e.to_string())),
        },
    }
}

/// Logs the player out: progress flushed, record removed, socket closed.
fn quit<S: UserStore>(ctx: &Arc<ServerContext<S>>, state: &mut MatchmakingState, id: PlayerId) {
    let Some(player) = state.remove_player(id) else {
        return;
    };
    tracing::info!(player_id = %id, username = ?player.username, "player quit");
    player.send(Message::new(MessageKind::Disconnect, "Goodbye!"));
    if let Some(flush) = Flush::departed(&player) {
        flush.spawn(ctx);
    }
    // Dropping `player` drops the last outbox sender; the writer task
    // sends the goodbye and closes the socket.
}

// ---------------------------------------------------------------------------
// Guesses
// ---------------------------------------------------------------------------

fn guess<S: UserStore>(ctx: &Arc<ServerContext<S>>, state: &MatchmakingState, id: PlayerId, payload: &str) {
    let Some(player) = state.registry.get(id) else {
        return;
    };
    let PlayerState::InGame(game_id) = player.state else {
        player.send(Message::info("You are not in a game."));
        return;
    };
    let Some(game) = ctx.game(game_id) else {
        player.send(Message::info("Your game has not started yet."));
        return;
    };

    match game.submit_guess(id, payload) {
        Ok(round) => {
            tracing::debug!(player_id = %id, %game_id, round, "guess accepted");
        }
        Err(GameError::InvalidGuess(reason)) => {
            player.send(Message::info(format!("Invalid guess: {reason}")));
            if let Some(prompt) = game.guess_prompt() {
                player.send(prompt);
            }
        }
        Err(err) => {
            tracing::debug!(player_id = %id, %game_id, error = %err, "guess rejected");
            player.send(Message::info(err.to_string()));
        }
    }
}

// ---------------------------------------------------------------------------
// Leaving
// ---------------------------------------------------------------------------

/// Removes a player for good, pulling them out of their game first.
fn leave<S: UserStore>(ctx: &Arc<ServerContext<S>>, state: &mut MatchmakingState, id: PlayerId) {
    let game_id = match state.registry.get(id).map(|p| p.state) {
        Some(PlayerState::InGame(game_id)) => Some(game_id),
        _ => None,
    };
    if let Some(game) = game_id.and_then(|game_id| ctx.game(game_id)) {
        game.remove_player(id);
    }

    if let Some(player) = state.remove_player(id) {
        if let Some(flush) = Flush::departed(&player) {
            flush.spawn(ctx);
        }
    }
}

fn send(state: &MatchmakingState, id: PlayerId, message: Message) {
    if let Some(player) = state.registry.get(id) {
        player.send(message);
    }
}
