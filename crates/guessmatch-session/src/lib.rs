//! Player identity and persistence for Guessmatch.
//!
//! This crate owns everything the server knows about a player outside of
//! a running game:
//!
//! 1. **Registry**: who is connected, under which connection, in which
//!    lifecycle state ([`PlayerRegistry`], [`Player`], [`PlayerState`])
//! 2. **Authentication**: password checks with auto-registration
//!    ([`Authenticator`])
//! 3. **Reconnection**: session tokens and the absent state for players
//!    who drop while queued
//! 4. **Persistence**: the [`UserStore`] contract and its file and
//!    in-memory implementations
//!
//! # How it fits in the stack
//!
//! ```text
//! Matchmaking (above)  ← reads queued players and their scores
//!     ↕
//! Session Layer (this crate)  ← player records, tokens, credential store
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, Message, ConnectionId
//! ```

mod auth;
mod error;
mod player;
mod registry;
mod store;

pub use auth::{Authenticator, hash_password, verify_password};
pub use error::SessionError;
pub use player::{Outbox, Player, PlayerState};
pub use registry::PlayerRegistry;
pub use store::{FileUserStore, MemoryUserStore, StoreError, UserRecord, UserStore};
