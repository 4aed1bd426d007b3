//! The matchmaking state: registry plus both queues, owned together.
//!
//! Queue membership and [`PlayerState`] must agree at all times (a player
//! is in at most one queue or game), so they live in one struct behind
//! one lock. The reactor and the matchmaking loop both receive it by
//! constructor injection; nothing here is global.

use std::time::{Duration, Instant};

use guessmatch_game::{GameSlot, GameSlotPool, SessionPlayer};
use guessmatch_protocol::{GameId, GameMode, PlayerId};
use guessmatch_session::{Player, PlayerRegistry, PlayerState};

use crate::ranked::{Candidate, find_ranked_group};
use crate::{MatchQueue, MatchmakingError};

/// Matchmaking rules.
#[derive(Debug, Clone)]
pub struct MatchmakingConfig {
    /// Players per game.
    pub match_size: usize,
    /// Ranked tolerance, in score points per second waited.
    pub ratio: f64,
    /// Time between matchmaking passes.
    pub tick_interval: Duration,
    /// How long an absent player keeps their queue slot. Zero evicts
    /// them on the first pass after they drop.
    pub absent_grace: Duration,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            match_size: 2,
            ratio: 10.0,
            tick_interval: Duration::from_secs(1),
            absent_grace: Duration::ZERO,
        }
    }
}

/// A group pulled out of a queue and bound to a game slot, ready to play.
#[derive(Debug)]
pub struct FormedMatch {
    pub game_id: GameId,
    pub mode: GameMode,
    pub slot: GameSlot,
    pub players: Vec<SessionPlayer>,
}

/// Everything one matchmaking pass produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub matches: Vec<FormedMatch>,
    /// Absent players whose grace ran out. Already removed from the
    /// registry; their unsaved progress still needs flushing.
    pub evicted: Vec<Player>,
}

/// Registry and queues, mutated together.
#[derive(Debug)]
pub struct MatchmakingState {
    pub registry: PlayerRegistry,
    normal: MatchQueue,
    ranked: MatchQueue,
    config: MatchmakingConfig,
    next_game_id: u64,
}

impl MatchmakingState {
    pub fn new(config: MatchmakingConfig) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            normal: MatchQueue::new(GameMode::Normal),
            ranked: MatchQueue::new(GameMode::Ranked),
            config,
            next_game_id: 0,
        }
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    pub fn queue(&self, mode: GameMode) -> &MatchQueue {
        match mode {
            GameMode::Normal => &self.normal,
            GameMode::Ranked => &self.ranked,
        }
    }

    fn queue_mut(&mut self, mode: GameMode) -> &mut MatchQueue {
        match mode {
            GameMode::Normal => &mut self.normal,
            GameMode::Ranked => &mut self.ranked,
        }
    }

    /// Puts an idle player into a queue and starts their waiting clock.
    ///
    /// # Errors
    /// [`MatchmakingError::NotIdle`] unless the player is at mode
    /// selection.
    pub fn enqueue(&mut self, id: PlayerId, mode: GameMode, now: Instant) -> Result<(), MatchmakingError> {
        let player = self
            .registry
            .get_mut(id)
            .ok_or(MatchmakingError::UnknownPlayer(id))?;
        if player.state != PlayerState::Idle {
            return Err(MatchmakingError::NotIdle {
                player: id,
                state: player.state.name(),
            });
        }
        player.enqueue(mode, now);
        self.queue_mut(mode).push(id);
        tracing::info!(player_id = %id, %mode, "player queued");
        Ok(())
    }

    /// Removes a player from the registry and from whichever queue holds
    /// them.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.normal.remove(id);
        self.ranked.remove(id);
        self.registry.remove(id)
    }

    /// One matchmaking pass: evict expired absentees, then fill as many
    /// games from each queue as free slots allow.
    ///
    /// Running out of slots simply ends the pass; the players stay queued
    /// for the next one.
    pub fn form_matches(&mut self, now: Instant, pool: &GameSlotPool) -> TickOutcome {
        let evicted = self.registry.evict_absent(now, self.config.absent_grace);
        for player in &evicted {
            self.normal.remove(player.id);
            self.ranked.remove(player.id);
        }

        let mut matches = Vec::new();
        for mode in [GameMode::Ranked, GameMode::Normal] {
            while let Some(group) = self.next_group(mode, now) {
                let Some(slot) = pool.acquire() else {
                    tracing::debug!(%mode, "no free game slot, retrying next tick");
                    break;
                };
                matches.push(self.bind(mode, group, slot));
            }
        }

        TickOutcome { matches, evicted }
    }

    /// The next matchable group in `mode`'s queue, without removing it.
    /// Absent players are skipped.
    fn next_group(&self, mode: GameMode, now: Instant) -> Option<Vec<PlayerId>> {
        let size = self.config.match_size;
        let present = self.queue(mode).iter().filter_map(|id| {
            let player = self.registry.get(id)?;
            (player.state == PlayerState::Queued(mode)).then_some(player)
        });

        match mode {
            GameMode::Normal => {
                let group: Vec<PlayerId> = present.take(size).map(|p| p.id).collect();
                (size > 0 && group.len() == size).then_some(group)
            }
            GameMode::Ranked => {
                let candidates: Vec<Candidate> = present
                    .map(|p| Candidate {
                        id: p.id,
                        score: p.score,
                        waited: p.waiting_time(now),
                    })
                    .collect();
                let picked = find_ranked_group(&candidates, size, self.config.ratio)?;
                Some(picked.into_iter().map(|i| candidates[i].id).collect())
            }
        }
    }

    /// Takes `group` out of its queue and marks everyone in-game.
    fn bind(&mut self, mode: GameMode, group: Vec<PlayerId>, slot: GameSlot) -> FormedMatch {
        self.next_game_id += 1;
        let game_id = GameId(self.next_game_id);
        self.queue_mut(mode).remove_all(&group);

        let mut players = Vec::with_capacity(group.len());
        for id in group {
            let Some(player) = self.registry.get_mut(id) else {
                continue;
            };
            player.state = PlayerState::InGame(game_id);
            player.waiting_since = None;
            if let Some(outbox) = player.outbox() {
                players.push(SessionPlayer::new(id, player.display_name(), player.score, outbox));
            }
        }

        tracing::info!(
            %game_id,
            %mode,
            slot = slot.index(),
            players = ?players.iter().map(|p| p.id).collect::<Vec<_>>(),
            "match formed"
        );
        FormedMatch {
            game_id,
            mode,
            slot,
            players,
        }
    }
}
