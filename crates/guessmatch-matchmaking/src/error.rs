//! Error types for the matchmaking layer.

use guessmatch_protocol::PlayerId;

/// Errors that can occur while moving players in and out of queues.
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    /// No player is registered under this id.
    #[error("player {0} not found")]
    UnknownPlayer(PlayerId),

    /// Only players at mode selection may join a queue.
    #[error("player {player} cannot join a queue while {state}")]
    NotIdle {
        player: PlayerId,
        state: &'static str,
    },
}
