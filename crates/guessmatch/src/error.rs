//! Unified error type for the Guessmatch server.

use guessmatch_game::GameError;
use guessmatch_matchmaking::MatchmakingError;
use guessmatch_protocol::ProtocolError;
use guessmatch_session::SessionError;
use guessmatch_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GuessmatchError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, malformed payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, tokens, credential store).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game-level error (bad guess, aborted session).
    #[error(transparent)]
    Game(#[from] GameError),

    /// A matchmaking error (queue entry from the wrong state).
    #[error(transparent)]
    Matchmaking(#[from] MatchmakingError),

    /// A socket-level failure outside a connection (e.g. reading the
    /// bound address).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid server configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use guessmatch_protocol::{GameId, PlayerId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Accept(std::io::Error::other("gone"));
        let server_err: GuessmatchError = err.into();
        assert!(matches!(server_err, GuessmatchError::Transport(_)));
        assert!(server_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidPayload("bad".into());
        let server_err: GuessmatchError = err.into();
        assert!(matches!(server_err, GuessmatchError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let server_err: GuessmatchError = err.into();
        assert!(matches!(server_err, GuessmatchError::Session(_)));
    }

    #[test]
    fn test_from_game_error() {
        let err = GameError::RoundClosed(GameId(4));
        let server_err: GuessmatchError = err.into();
        assert!(matches!(server_err, GuessmatchError::Game(_)));
        assert!(server_err.to_string().contains("G-4"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let server_err: GuessmatchError = err.into();
        assert!(matches!(server_err, GuessmatchError::Io(_)));
        assert_eq!(server_err.to_string(), "taken");
    }

    #[test]
    fn test_from_matchmaking_error() {
        let err = MatchmakingError::UnknownPlayer(PlayerId(9));
        let server_err: GuessmatchError = err.into();
        assert!(matches!(server_err, GuessmatchError::Matchmaking(_)));
    }
}
