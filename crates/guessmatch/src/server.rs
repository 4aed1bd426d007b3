//! `GuessmatchServer` builder and top-level run loop.
//!
//! This is the entry point for running a Guessmatch server. It ties the
//! layers together: transport → protocol → session → matchmaking → game.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use guessmatch_game::{GameConfig, GameSession, GameSlotPool};
use guessmatch_matchmaking::{
    MatchmakingConfig, MatchmakingScheduler, MatchmakingState, SharedState, TickConfig,
};
use guessmatch_protocol::GameId;
use guessmatch_session::{Authenticator, FileUserStore, UserStore};
use guessmatch_transport::{TcpTransport, Transport};
use tokio::sync::{Mutex, mpsc};

use crate::launcher::GameLauncher;
use crate::reactor::{Event, Reactor, accept_loop};
use crate::{GuessmatchError, ServerConfig};

/// Shared server state handed to the reactor, the launcher and every
/// background task.
pub(crate) struct ServerContext<S: UserStore> {
    /// Registry and queues. Locked briefly per event and per tick.
    pub(crate) state: SharedState,
    /// Running sessions, for routing guesses and disconnects.
    games: StdMutex<HashMap<GameId, Arc<GameSession>>>,
    pub(crate) pool: Arc<GameSlotPool>,
    pub(crate) auth: Authenticator<S>,
    pub(crate) config: ServerConfig,
    /// Back channel into the reactor for work finished off-thread.
    pub(crate) events: mpsc::UnboundedSender<Event>,
}

impl<S: UserStore> ServerContext<S> {
    pub(crate) fn new(config: ServerConfig, store: Arc<S>, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MatchmakingState::new(config.matchmaking.clone()))),
            games: StdMutex::new(HashMap::new()),
            pool: Arc::new(GameSlotPool::new(config.max_games, config.game.match_size)),
            auth: Authenticator::new(store),
            config,
            events,
        }
    }

    pub(crate) fn game(&self, id: GameId) -> Option<Arc<GameSession>> {
        self.games_lock().get(&id).cloned()
    }

    pub(crate) fn insert_game(&self, session: Arc<GameSession>) {
        self.games_lock().insert(session.id(), session);
    }

    pub(crate) fn remove_game(&self, id: GameId) -> Option<Arc<GameSession>> {
        self.games_lock().remove(&id)
    }

    fn games_lock(&self) -> std::sync::MutexGuard<'_, HashMap<GameId, Arc<GameSession>>> {
        self.games.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for configuring and starting a Guessmatch server.
///
/// # Example
///
/// ```rust,ignore
/// use guessmatch::prelude::*;
///
/// let server = GuessmatchServer::builder()
///     .bind("0.0.0.0:12345")
///     .users_file("users.json")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct GuessmatchServerBuilder {
    config: ServerConfig,
}

impl GuessmatchServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the credential file used by [`build`](Self::build).
    pub fn users_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.users_file = path.into();
        self
    }

    /// Sets how many games may run at once.
    pub fn max_games(mut self, max_games: usize) -> Self {
        self.config.max_games = max_games;
        self
    }

    pub fn game_config(mut self, game: GameConfig) -> Self {
        self.config.game = game;
        self
    }

    pub fn matchmaking_config(mut self, matchmaking: MatchmakingConfig) -> Self {
        self.config.matchmaking = matchmaking;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener, storing credentials in the configured JSON file.
    pub async fn build(self) -> Result<GuessmatchServer<FileUserStore>, GuessmatchError> {
        let store = FileUserStore::new(self.config.users_file.clone());
        self.build_with_store(Arc::new(store)).await
    }

    /// Binds the listener with a caller-supplied credential store.
    pub async fn build_with_store<S: UserStore>(
        self,
        store: Arc<S>,
    ) -> Result<GuessmatchServer<S>, GuessmatchError> {
        let config = self.config.validate()?;
        let transport = TcpTransport::bind(&config.bind_addr).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let ctx = Arc::new(ServerContext::new(config, store, events_tx));

        Ok(GuessmatchServer {
            transport,
            ctx,
            events: events_rx,
        })
    }
}

impl Default for GuessmatchServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Guessmatch server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GuessmatchServer<S: UserStore> {
    transport: TcpTransport,
    ctx: Arc<ServerContext<S>>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl GuessmatchServer<FileUserStore> {
    /// Creates a new builder.
    pub fn builder() -> GuessmatchServerBuilder {
        GuessmatchServerBuilder::new()
    }
}

impl<S: UserStore> GuessmatchServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.ctx.config
    }

    /// Runs the server.
    ///
    /// Spawns the acceptor and the matchmaking loop, then drives the
    /// reactor on the current task. Runs until the process is terminated.
    pub async fn run(self) -> Result<(), GuessmatchError> {
        let Self {
            transport,
            ctx,
            events,
        } = self;

        tracing::info!(
            addr = ?transport.local_addr().ok(),
            max_games = ctx.pool.capacity(),
            match_size = ctx.config.game.match_size,
            "Guessmatch server running"
        );

        let scheduler = MatchmakingScheduler::new(
            Arc::clone(&ctx.state),
            Arc::clone(&ctx.pool),
            GameLauncher::new(Arc::clone(&ctx)),
            TickConfig::with_interval(ctx.config.matchmaking.tick_interval),
        );
        let matchmaking = tokio::spawn(scheduler.run());
        let acceptor = tokio::spawn(accept_loop(transport, ctx.events.clone()));

        Reactor::new(ctx, events).run().await;

        acceptor.abort();
        matchmaking.abort();
        Ok(())
    }
}
