//! Game sessions for Guessmatch.
//!
//! A session is a fixed group of players guessing a secret number over a
//! few rounds. Every round waits for all remaining players to guess
//! before anyone learns the answer.
//!
//! # Key types
//!
//! - [`GameSession`]: the per-match state machine and its round rendezvous
//! - [`GameSlotPool`] / [`GameSlot`]: caps how many games run at once
//! - [`GameConfig`] / [`GamePhase`]: rules and round lifecycle
//! - [`GameReport`]: final standings handed back to the server

mod config;
mod error;
pub mod scoring;
mod session;
mod slot;

pub use config::{GameConfig, GamePhase};
pub use error::GameError;
pub use session::{FinalScore, GameReport, GameSession, RoundOutcome, SessionPlayer};
pub use slot::{GameSlot, GameSlotPool};
