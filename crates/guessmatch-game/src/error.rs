//! Error types for the game layer.

use guessmatch_protocol::{GameId, PlayerId};

/// Errors that can occur while a game session is running.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Non-numeric or out-of-range guess. The player is re-prompted.
    #[error("invalid guess: {0}")]
    InvalidGuess(String),

    /// A guess arrived while no round is accepting guesses.
    #[error("no round is open for guesses in game {0}")]
    RoundClosed(GameId),

    /// The player already guessed in the current round.
    #[error("you already guessed in round {0}")]
    AlreadyGuessed(u32),

    /// A guess came from a player who is not part of this session.
    #[error("player {player} is not part of game {game}")]
    NotAPlayer { game: GameId, player: PlayerId },

    /// The session broke one of its own invariants and was stopped.
    #[error("game {game} aborted: {reason}")]
    Aborted { game: GameId, reason: String },

    /// A per-player round task failed to run to completion.
    #[error("round task in game {0} failed")]
    TaskFailed(GameId),
}
