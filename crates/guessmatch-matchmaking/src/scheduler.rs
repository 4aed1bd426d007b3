//! The background matchmaking loop.
//!
//! Once per tick the scheduler locks the shared [`MatchmakingState`],
//! runs a matching pass, releases the lock and hands the results to a
//! [`MatchLauncher`]. Starting games and flushing evicted players is the
//! launcher's business, so neither happens while the state is locked.

use std::sync::Arc;
use std::time::Instant;

use guessmatch_game::GameSlotPool;
use guessmatch_session::Player;
use tokio::sync::Mutex;

use crate::{FormedMatch, MatchmakingState, TickConfig, TickScheduler};

/// State shared between the reactor and the matchmaking loop.
pub type SharedState = Arc<Mutex<MatchmakingState>>;

/// Receives the output of each matching pass.
pub trait MatchLauncher: Send + Sync + 'static {
    /// Starts a game for a freshly formed match. Must not block.
    fn launch(&self, formed: FormedMatch);

    /// Handles absent players whose grace period ran out.
    fn evicted(&self, players: Vec<Player>);
}

/// Runs matching passes on a fixed interval.
pub struct MatchmakingScheduler<L: MatchLauncher> {
    state: SharedState,
    pool: Arc<GameSlotPool>,
    launcher: L,
    ticker: TickScheduler,
}

impl<L: MatchLauncher> MatchmakingScheduler<L> {
    pub fn new(state: SharedState, pool: Arc<GameSlotPool>, launcher: L, tick: TickConfig) -> Self {
        Self {
            state,
            pool,
            launcher,
            ticker: TickScheduler::new(tick),
        }
    }

    /// Runs one matching pass immediately. Returns the number of games
    /// started.
    pub async fn run_pass(&self) -> usize {
        let outcome = {
            let mut state = self.state.lock().await;
            state.form_matches(Instant::now(), &self.pool)
        };

        if !outcome.evicted.is_empty() {
            self.launcher.evicted(outcome.evicted);
        }
        let started = outcome.matches.len();
        for formed in outcome.matches {
            self.launcher.launch(formed);
        }
        started
    }

    /// Ticks forever. Stop it by aborting its task.
    pub async fn run(mut self) {
        tracing::info!(interval_ms = self.ticker.interval().as_millis() as u64, "matchmaking loop started");
        loop {
            let tick = self.ticker.wait_for_tick().await;
            let started = self.run_pass().await;
            if started > 0 {
                tracing::debug!(tick = tick.tick, started, "matchmaking pass");
            }
            self.ticker.record_tick_end();
        }
    }
}
