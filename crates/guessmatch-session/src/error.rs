//! Error types for the session layer.

use guessmatch_protocol::PlayerId;

use crate::StoreError;

/// Errors that can occur while authenticating or tracking players.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credentials were rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No player is registered under this id.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// The token was never issued or has been superseded.
    #[error("invalid session token")]
    InvalidToken,

    /// The account is in use by a player whose socket is still live.
    #[error("{0} is already connected")]
    AlreadyConnected(String),

    /// The player is not in a state that allows this operation.
    #[error("player {player} cannot {action} while {state}")]
    InvalidState {
        player: PlayerId,
        action: &'static str,
        state: &'static str,
    },

    /// The credential store could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
