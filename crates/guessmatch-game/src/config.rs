//! Game configuration and the round state machine.

use std::fmt;

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Rules for one game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Players per session.
    pub match_size: usize,

    /// Rounds played before the session finishes.
    pub rounds: u32,

    /// Smallest valid guess (and secret), inclusive.
    pub min_range: i64,

    /// Largest valid guess (and secret), inclusive.
    pub max_range: i64,

    /// Flat round score for hitting the secret exactly.
    pub exact_bonus: i64,
}

impl GameConfig {
    /// Returns `true` if `value` lies inside the guess range.
    pub fn in_range(&self, value: i64) -> bool {
        (self.min_range..=self.max_range).contains(&value)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            match_size: 2,
            rounds: 3,
            min_range: 1,
            max_range: 100,
            exact_bonus: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// Where a session is in its round cycle.
///
/// ```text
/// Created → RoundActive(1) → RoundSettling(1) → RoundActive(2) → … → Finished
/// ```
///
/// Guesses are only accepted in `RoundActive`. Settlement of round `n`
/// always completes before round `n + 1` opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Created,
    RoundActive(u32),
    RoundSettling(u32),
    Finished,
}

impl GamePhase {
    /// The phase that follows this one in a game of `rounds` rounds.
    ///
    /// Returns `None` once finished.
    pub fn next(self, rounds: u32) -> Option<Self> {
        match self {
            Self::Created => Some(Self::RoundActive(1)),
            Self::RoundActive(n) => Some(Self::RoundSettling(n)),
            Self::RoundSettling(n) if n < rounds => Some(Self::RoundActive(n + 1)),
            Self::RoundSettling(_) => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// The round currently open for guesses, if any.
    pub fn open_round(self) -> Option<u32> {
        match self {
            Self::RoundActive(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::RoundActive(n) => write!(f, "RoundActive({n})"),
            Self::RoundSettling(n) => write!(f, "RoundSettling({n})"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
