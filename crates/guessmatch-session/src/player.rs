//! The server's record of one connected (or briefly absent) player.

use std::time::{Duration, Instant};

use guessmatch_protocol::{GameId, GameMode, Message, PlayerId};
use guessmatch_transport::ConnectionId;
use tokio::sync::mpsc;

/// Outbound channel drained by a connection's writer task.
pub type Outbox = mpsc::UnboundedSender<Message>;

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// Where a player currently is in the connect → play lifecycle.
///
/// ```text
///  Unauthenticated ──(login)──→ Idle ──(mode)──→ Queued ──(match)──→ InGame
///                                ↑                 │  ↑                 │
///                                │          (drop) ▼  │ (reconnect)     │
///                                │               Absent                 │
///                                └────────────(game finished)───────────┘
/// ```
///
/// A player is in at most one queue or game at a time; the state is the
/// single source of truth for which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Connected, not yet logged in.
    Unauthenticated,
    /// Logged in and choosing a matchmaking mode.
    Idle,
    /// Waiting in one of the matchmaking queues.
    Queued(GameMode),
    /// Playing in the given session.
    InGame(GameId),
    /// Socket lost while queued. Queue membership and waiting time are
    /// retained until reconnection or eviction.
    Absent { queue: GameMode, since: Instant },
}

impl PlayerState {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Idle => "idle",
            Self::Queued(_) => "queued",
            Self::InGame(_) => "in game",
            Self::Absent { .. } => "absent",
        }
    }

    /// The queue the player belongs to, whether present or absent.
    pub fn queue(&self) -> Option<GameMode> {
        match self {
            Self::Queued(mode) | Self::Absent { queue: mode, .. } => Some(*mode),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A single player known to the server.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    /// Set once authenticated.
    pub username: Option<String>,
    /// Never negative; game deltas are applied with a floor of 0.
    pub score: u32,
    pub games_played: u32,
    /// Reissued on every successful authentication.
    pub token: Option<String>,
    pub state: PlayerState,
    /// When the player entered their current queue. Drives ranked
    /// tolerance; reset whenever queue membership changes.
    pub waiting_since: Option<Instant>,
    /// `score`/`games_played` differ from what the store holds.
    pub dirty: bool,
    pub(crate) connection: Option<ConnectionId>,
    pub(crate) outbox: Option<Outbox>,
}

impl Player {
    pub(crate) fn new(id: PlayerId, connection: ConnectionId, outbox: Outbox) -> Self {
        Self {
            id,
            username: None,
            score: 0,
            games_played: 0,
            token: None,
            state: PlayerState::Unauthenticated,
            waiting_since: None,
            dirty: false,
            connection: Some(connection),
            outbox: Some(outbox),
        }
    }

    /// Queues a message for this player's socket.
    ///
    /// Returns `false` if the player has no live connection (absent, or
    /// the writer task already shut down).
    pub fn send(&self, message: Message) -> bool {
        match &self.outbox {
            Some(outbox) => outbox.send(message).is_ok(),
            None => false,
        }
    }

    /// A clone of the outbound channel, for handing to a game session.
    pub fn outbox(&self) -> Option<Outbox> {
        self.outbox.clone()
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.state, PlayerState::Absent { .. })
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Name to show other players: the username, or the id before login.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    /// How long the player has been in their current queue.
    pub fn waiting_time(&self, now: Instant) -> Duration {
        self.waiting_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    /// Moves the player into a queue and starts their waiting clock.
    pub fn enqueue(&mut self, mode: GameMode, now: Instant) {
        self.state = PlayerState::Queued(mode);
        self.waiting_since = Some(now);
    }

    /// Returns the player to mode selection, clearing queue bookkeeping.
    pub fn make_idle(&mut self) {
        self.state = PlayerState::Idle;
        self.waiting_since = None;
    }

    /// Applies a finished game's result and marks the record for flushing.
    pub fn record_game(&mut self, final_score: u32) {
        self.score = final_score;
        self.games_played += 1;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> (Player, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Player::new(PlayerId(1), ConnectionId::new(1), tx), rx)
    }

    #[test]
    fn test_new_player_is_unauthenticated_and_clean() {
        let (p, _rx) = player();
        assert_eq!(p.state, PlayerState::Unauthenticated);
        assert!(!p.is_authenticated());
        assert!(!p.dirty);
        assert_eq!(p.display_name(), "P-1");
    }

    #[test]
    fn test_send_delivers_to_outbox() {
        let (p, mut rx) = player();
        assert!(p.send(Message::info("hi")));
        assert_eq!(rx.try_recv().unwrap(), Message::info("hi"));
    }

    #[test]
    fn test_send_without_connection_returns_false() {
        let (mut p, _rx) = player();
        p.outbox = None;
        assert!(!p.send(Message::info("hi")));
    }

    #[test]
    fn test_enqueue_then_idle_resets_waiting_clock() {
        let (mut p, _rx) = player();
        let now = Instant::now();
        p.enqueue(GameMode::Ranked, now);
        assert_eq!(p.state, PlayerState::Queued(GameMode::Ranked));
        assert_eq!(p.waiting_time(now + Duration::from_secs(3)), Duration::from_secs(3));

        p.make_idle();
        assert_eq!(p.state, PlayerState::Idle);
        assert_eq!(p.waiting_time(now + Duration::from_secs(3)), Duration::ZERO);
    }

    #[test]
    fn test_record_game_bumps_games_and_marks_dirty() {
        let (mut p, _rx) = player();
        p.record_game(140);
        assert_eq!(p.score, 140);
        assert_eq!(p.games_played, 1);
        assert!(p.dirty);
    }

    #[test]
    fn test_state_queue_covers_absent() {
        let since = Instant::now();
        assert_eq!(PlayerState::Queued(GameMode::Normal).queue(), Some(GameMode::Normal));
        assert_eq!(
            PlayerState::Absent { queue: GameMode::Ranked, since }.queue(),
            Some(GameMode::Ranked)
        );
        assert_eq!(PlayerState::Idle.queue(), None);
    }
}
