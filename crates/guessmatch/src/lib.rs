//! # Guessmatch
//!
//! A matchmaking server for a multiplayer number-guessing game.
//!
//! Clients connect over TCP and speak `<Kind>payload\t` frames. They log
//! in (or resume with a session token), pick the normal or ranked queue,
//! are grouped into fixed-size games by a once-per-second matchmaking
//! pass, and play a few rounds of guessing a secret number. Every round
//! waits for all remaining players before anyone learns the answer.
//!
//! This crate wires the layers together and owns the socket-facing side:
//! the connection reactor, message routing and the game launcher.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guessmatch::prelude::*;
//!
//! # async fn start() -> Result<(), GuessmatchError> {
//! let server = GuessmatchServer::builder()
//!     .bind("0.0.0.0:12345")
//!     .users_file("users.json")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod flush;
mod handler;
mod launcher;
mod reactor;
mod server;

pub use config::ServerConfig;
pub use error::GuessmatchError;
pub use server::{GuessmatchServer, GuessmatchServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{GuessmatchError, GuessmatchServer, GuessmatchServerBuilder, ServerConfig};

    pub use guessmatch_game::GameConfig;
    pub use guessmatch_matchmaking::MatchmakingConfig;
    pub use guessmatch_protocol::{GameMode, Message, MessageKind};
    pub use guessmatch_session::{FileUserStore, MemoryUserStore, UserStore};
}
