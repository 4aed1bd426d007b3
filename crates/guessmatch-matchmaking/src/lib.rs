//! Matchmaking for Guessmatch.
//!
//! Players wait in one of two queues until a periodic pass groups them
//! into games:
//!
//! - **normal**: first come, first served.
//! - **ranked**: players are grouped only with opponents whose score is
//!   close to theirs. "Close" widens the longer they wait.
//!
//! # Key types
//!
//! - [`MatchmakingState`]: the player registry and both queues, owned
//!   together so they never disagree
//! - [`MatchmakingScheduler`]: the fixed-interval loop that runs passes
//! - [`MatchLauncher`]: where formed matches and evicted players go
//! - [`TickScheduler`]: the interval timer underneath

mod error;
mod queue;
pub mod ranked;
mod scheduler;
mod state;
mod ticker;

pub use error::MatchmakingError;
pub use queue::MatchQueue;
pub use scheduler::{MatchLauncher, MatchmakingScheduler, SharedState};
pub use state::{FormedMatch, MatchmakingConfig, MatchmakingState, TickOutcome};
pub use ticker::{TickConfig, TickInfo, TickScheduler};
