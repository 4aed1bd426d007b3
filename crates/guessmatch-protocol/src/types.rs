//! Core protocol types for the Guessmatch wire format.
//!
//! Every frame on the wire is `<Kind>payload\t`. This module defines the
//! closed set of message kinds, the decoded [`Message`], and the typed
//! views over the few payloads that carry structure (`username;password`,
//! mode selections, guesses).

use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

/// Separator between fields of a multi-valued payload.
pub const FIELD_SEPARATOR: char = ';';

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identity of a connected player.
///
/// Assigned on accept and never reused within a server run. Every
/// container (queues, sessions, the registry) indexes players by this
/// value rather than by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Monotonic identity of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The closed set of message kinds the server understands.
///
/// Decoding maps the `<Kind>` header onto one of these once; handlers
/// then `match` on the variant. Anything unrecognised becomes
/// [`MessageKind::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Server → client: please authenticate.
    AuthenticationRequest,
    /// Client → server: `username;password`.
    AuthenticationAttempt,
    /// Client → server: a session token from a previous login.
    AuthenticationAttemptToken,
    /// Server → client: `username;token;score;gamesPlayed`.
    AuthenticationSuccessful,
    /// Server → client: reason text.
    AuthenticationFailure,
    /// Server → client: pick a matchmaking mode.
    GameModeRequest,
    /// Client → server: `1` (normal), `2` (ranked) or `quit`.
    GameModeResponse,
    /// Server → client: `min;max;round`.
    GameGuessRequest,
    /// Client → server: an integer literal.
    GameGuess,
    /// Server → client: free text for the user.
    Info,
    /// Server → client: `finalScore;gamesPlayed`.
    GameEnd,
    /// Either direction: the connection is ending.
    Disconnect,
    /// Client → server: liveness ping, ignored.
    KeepAlive,
    /// Anything without a recognised header.
    Default,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 14] = [
        Self::AuthenticationRequest,
        Self::AuthenticationAttempt,
        Self::AuthenticationAttemptToken,
        Self::AuthenticationSuccessful,
        Self::AuthenticationFailure,
        Self::GameModeRequest,
        Self::GameModeResponse,
        Self::GameGuessRequest,
        Self::GameGuess,
        Self::Info,
        Self::GameEnd,
        Self::Disconnect,
        Self::KeepAlive,
        Self::Default,
    ];

    /// The header name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationRequest => "AuthenticationRequest",
            Self::AuthenticationAttempt => "AuthenticationAttempt",
            Self::AuthenticationAttemptToken => "AuthenticationAttemptToken",
            Self::AuthenticationSuccessful => "AuthenticationSuccessful",
            Self::AuthenticationFailure => "AuthenticationFailure",
            Self::GameModeRequest => "GameModeRequest",
            Self::GameModeResponse => "GameModeResponse",
            Self::GameGuessRequest => "GameGuessRequest",
            Self::GameGuess => "GameGuess",
            Self::Info => "Info",
            Self::GameEnd => "GameEnd",
            Self::Disconnect => "Disconnect",
            Self::KeepAlive => "KeepAlive",
            Self::Default => "Default",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One decoded frame: a kind plus its raw payload text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: String,
}

impl Message {
    pub fn new(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// A message with an empty payload.
    pub fn bare(kind: MessageKind) -> Self {
        Self::new(kind, String::new())
    }

    /// A user-displayable `Info` message.
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Info, text)
    }

    /// Splits the payload on [`FIELD_SEPARATOR`].
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.payload.split(FIELD_SEPARATOR)
    }
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

/// The two matchmaking queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameMode {
    /// FIFO matching.
    Normal,
    /// Score-proximity matching with a tolerance that widens over time.
    Ranked,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Ranked => f.write_str("ranked"),
        }
    }
}

/// What a player answered to a `GameModeRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelection {
    Play(GameMode),
    Quit,
}

impl FromStr for ModeSelection {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::Play(GameMode::Normal)),
            "2" => Ok(Self::Play(GameMode::Ranked)),
            "quit" => Ok(Self::Quit),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown game mode {other:?}, expected 1, 2 or quit"
            ))),
        }
    }
}

/// `username;password` from an `AuthenticationAttempt`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Hand-written so passwords never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FromStr for Credentials {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (username, password) = s.split_once(FIELD_SEPARATOR).ok_or_else(|| {
            ProtocolError::InvalidPayload("expected username;password".into())
        })?;
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ProtocolError::InvalidPayload(
                "username and password must not be empty".into(),
            ));
        }
        if password.contains(FIELD_SEPARATOR) {
            return Err(ProtocolError::InvalidPayload(
                "password must not contain ';'".into(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Parses a `GameGuess` payload as an integer literal.
///
/// Range checking is the game's job; this only rejects non-numeric text.
pub fn parse_guess(payload: &str) -> Result<i64, ProtocolError> {
    payload
        .trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidPayload(format!("{payload:?} is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_from_str_round_trips_every_kind() {
        for kind in MessageKind::ALL {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_message_kind_from_str_unknown_returns_error() {
        let result = "FlyToMoon".parse::<MessageKind>();
        assert!(matches!(result, Err(ProtocolError::UnknownKind(k)) if k == "FlyToMoon"));
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(GameId(3).to_string(), "G-3");
    }

    #[test]
    fn test_mode_selection_parses_all_choices() {
        assert_eq!("1".parse::<ModeSelection>().unwrap(), ModeSelection::Play(GameMode::Normal));
        assert_eq!("2".parse::<ModeSelection>().unwrap(), ModeSelection::Play(GameMode::Ranked));
        assert_eq!(" quit ".parse::<ModeSelection>().unwrap(), ModeSelection::Quit);
        assert!("3".parse::<ModeSelection>().is_err());
    }

    #[test]
    fn test_credentials_parse_valid() {
        let c: Credentials = "alice;s3cret".parse().unwrap();
        assert_eq!(c.username, "alice");
        assert_eq!(c.password, "s3cret");
    }

    #[test]
    fn test_credentials_parse_missing_separator_fails() {
        assert!("alice".parse::<Credentials>().is_err());
    }

    #[test]
    fn test_credentials_parse_empty_fields_fail() {
        assert!(";pw".parse::<Credentials>().is_err());
        assert!("alice;".parse::<Credentials>().is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let c: Credentials = "alice;hunter2".parse().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn test_parse_guess_accepts_integers_and_rejects_text() {
        assert_eq!(parse_guess(" 42 ").unwrap(), 42);
        assert_eq!(parse_guess("-5").unwrap(), -5);
        assert!(parse_guess("forty").is_err());
        assert!(parse_guess("").is_err());
    }

    #[test]
    fn test_message_fields_split_on_separator() {
        let msg = Message::new(MessageKind::GameGuessRequest, "1;100;2");
        let fields: Vec<_> = msg.fields().collect();
        assert_eq!(fields, ["1", "100", "2"]);
    }
}
