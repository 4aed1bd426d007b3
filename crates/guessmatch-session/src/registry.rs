//! The player registry: every player the server currently knows about.
//!
//! Players are keyed by [`PlayerId`]. Three secondary indices are kept in
//! sync with the primary map:
//!
//! - connection id → player, so inbound frames find their sender,
//! - session token → player, for `AuthenticationAttemptToken`,
//! - username → player, so one account is never logged in twice.
//!
//! # Concurrency note
//!
//! Like the rest of the matchmaking state this is a plain struct with no
//! interior locking. The server wraps it (together with the queues) in a
//! single mutex, which is what keeps queue membership and player state
//! consistent with each other.
//!
//! # Reconnection
//!
//! A player whose socket drops while queued is not removed. They become
//! [`PlayerState::Absent`], keep their place and waiting time in the
//! queue, and can be re-attached to a new connection either by token or
//! by logging in again with the same username.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use guessmatch_protocol::PlayerId;
use guessmatch_transport::ConnectionId;
use rand::Rng;

use crate::{Outbox, Player, PlayerState, SessionError, UserRecord};

/// All players known to the server, connected or absent.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    connections: HashMap<ConnectionId, PlayerId>,
    tokens: HashMap<String, PlayerId>,
    usernames: HashMap<String, PlayerId>,
    next_id: u64,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection as an unauthenticated
    /// player and returns its new id.
    pub fn connect(&mut self, connection: ConnectionId, outbox: Outbox) -> PlayerId {
        self.next_id += 1;
        let id = PlayerId(self.next_id);
        self.players.insert(id, Player::new(id, connection, outbox));
        self.connections.insert(connection, id);
        tracing::debug!(player_id = %id, %connection, "player registered");
        id
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// The player currently attached to `connection`, if any.
    pub fn by_connection(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&connection).copied()
    }

    /// Completes a password login for the unauthenticated player `id`.
    ///
    /// If the account belongs to an absent player, the connection is moved
    /// onto that player instead and the absent player's id is returned;
    /// `id` no longer exists afterwards. Either way the returned player
    /// holds a freshly issued token.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if `id` is unknown.
    /// - [`SessionError::InvalidState`] if `id` is already logged in.
    /// - [`SessionError::AlreadyConnected`] if the account is in use by a
    ///   player whose socket is live.
    pub fn login(&mut self, id: PlayerId, record: UserRecord) -> Result<PlayerId, SessionError> {
        self.ensure_unauthenticated(id, "log in")?;

        if let Some(&existing) = self.usernames.get(&record.username) {
            let absent = self.players.get(&existing).is_some_and(Player::is_absent);
            if !absent {
                return Err(SessionError::AlreadyConnected(record.username));
            }
            return Ok(self.rebind(id, existing));
        }

        let token = self.issue_token(id);
        let player = self.players.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        player.username = Some(record.username.clone());
        player.score = record.score;
        player.games_played = record.games_played;
        player.token = Some(token);
        player.make_idle();
        self.usernames.insert(record.username, id);

        tracing::info!(player_id = %id, username = ?player.username, "player logged in");
        Ok(id)
    }

    /// Re-attaches the connection of unauthenticated player `id` to the
    /// absent player holding `token`.
    ///
    /// Returns the resumed player's id; `id` is removed.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] if the token was never issued or
    ///   has been superseded by a later login.
    /// - [`SessionError::AlreadyConnected`] if the token's owner still has
    ///   a live socket.
    pub fn resume_with_token(&mut self, id: PlayerId, token: &str) -> Result<PlayerId, SessionError> {
        self.ensure_unauthenticated(id, "resume a session")?;

        let owner = self.tokens.get(token).copied().ok_or(SessionError::InvalidToken)?;
        let player = self.players.get(&owner).ok_or(SessionError::InvalidToken)?;
        if !player.is_absent() {
            return Err(SessionError::AlreadyConnected(player.display_name()));
        }
        Ok(self.rebind(id, owner))
    }

    /// Detaches a queued player from their dropped connection, keeping
    /// their queue position.
    ///
    /// Returns `false` (and changes nothing) if the player is not queued;
    /// the caller should [`remove`](Self::remove) them instead.
    pub fn suspend(&mut self, id: PlayerId, now: Instant) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        let PlayerState::Queued(queue) = player.state else {
            return false;
        };

        player.state = PlayerState::Absent { queue, since: now };
        player.outbox = None;
        if let Some(connection) = player.connection.take() {
            self.connections.remove(&connection);
        }
        tracing::info!(player_id = %id, %queue, "player absent, queue slot kept");
        true
    }

    /// Forgets a player entirely and returns their record so the caller
    /// can flush unsaved progress.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        if let Some(connection) = player.connection {
            self.connections.remove(&connection);
        }
        if let Some(token) = &player.token {
            self.tokens.remove(token);
        }
        if let Some(username) = &player.username {
            // Only drop the index entry if it still points at this player.
            if self.usernames.get(username) == Some(&id) {
                self.usernames.remove(username);
            }
        }
        tracing::debug!(player_id = %id, "player removed");
        Some(player)
    }

    /// Removes every absent player who has been gone longer than `grace`.
    pub fn evict_absent(&mut self, now: Instant, grace: Duration) -> Vec<Player> {
        let expired: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| match p.state {
                PlayerState::Absent { since, .. } => now.saturating_duration_since(since) > grace,
                _ => false,
            })
            .map(|p| p.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| {
                tracing::info!(player_id = %id, "absent player evicted");
                self.remove(id)
            })
            .collect()
    }

    /// Every registered player, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn ensure_unauthenticated(&self, id: PlayerId, action: &'static str) -> Result<(), SessionError> {
        let player = self.players.get(&id).ok_or(SessionError::NotFound(id))?;
        if player.state != PlayerState::Unauthenticated {
            return Err(SessionError::InvalidState {
                player: id,
                action,
                state: player.state.name(),
            });
        }
        Ok(())
    }

    /// Moves the connection of the temporary player `from` onto the absent
    /// player `to`, restoring `to` to its queue.
    fn rebind(&mut self, from: PlayerId, to: PlayerId) -> PlayerId {
        let (connection, outbox) = match self.players.remove(&from) {
            Some(mut temp) => (temp.connection.take(), temp.outbox.take()),
            None => (None, None),
        };
        let token = self.issue_token(to);

        if let Some(player) = self.players.get_mut(&to) {
            if let PlayerState::Absent { queue, .. } = player.state {
                // waiting_since is left alone: the wait resumes, not restarts.
                player.state = PlayerState::Queued(queue);
            }
            player.connection = connection;
            player.outbox = outbox;
            player.token = Some(token);
        }
        if let Some(connection) = connection {
            self.connections.insert(connection, to);
        }

        tracing::info!(player_id = %to, "player resumed");
        to
    }

    /// Issues a fresh token for `id`, retiring any previous one.
    fn issue_token(&mut self, id: PlayerId) -> String {
        if let Some(old) = self.players.get(&id).and_then(|p| p.token.clone()) {
            self.tokens.remove(&old);
        }
        let token = generate_token();
        self.tokens.insert(token.clone(), id);
        token
    }
}

/// A random 32-character hex string (128 bits).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}
