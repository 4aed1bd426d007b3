//! Starting and finishing games.
//!
//! The matchmaking loop hands every formed match to [`GameLauncher`],
//! which runs the session on its own task and, once it ends, puts the
//! players back at mode selection and gives the slot back to the pool.

use std::sync::Arc;

use guessmatch_game::{FinalScore, GameError, GameReport, GameSession};
use guessmatch_matchmaking::{FormedMatch, MatchLauncher};
use guessmatch_protocol::{GameId, Message, MessageKind, PlayerId};
use guessmatch_session::{Player, PlayerRegistry, PlayerState, UserStore};

use crate::flush::Flush;
use crate::server::ServerContext;

/// [`MatchLauncher`] backed by the server context.
pub(crate) struct GameLauncher<S: UserStore> {
    ctx: Arc<ServerContext<S>>,
}

impl<S: UserStore> GameLauncher<S> {
    pub(crate) fn new(ctx: Arc<ServerContext<S>>) -> Self {
        Self { ctx }
    }
}

impl<S: UserStore> MatchLauncher for GameLauncher<S> {
    fn launch(&self, formed: FormedMatch) {
        tokio::spawn(run_game(Arc::clone(&self.ctx), formed));
    }

    fn evicted(&self, players: Vec<Player>) {
        for player in &players {
            if let Some(flush) = Flush::departed(player) {
                flush.spawn(&self.ctx);
            }
        }
    }
}

/// Runs one game from first prompt to slot release.
async fn run_game<S: UserStore>(ctx: Arc<ServerContext<S>>, formed: FormedMatch) {
    let FormedMatch {
        game_id,
        mode,
        slot,
        players,
    } = formed;
    let session = Arc::new(GameSession::new(game_id, ctx.config.game.clone(), players));

    {
        // Publish the session under the state lock. Anyone who
        // disconnected between matching and now is already gone from the
        // registry and must not be waited for.
        let state = ctx.state.lock().await;
        for id in session.player_ids() {
            let present = state
                .registry
                .get(id)
                .is_some_and(|p| p.state == PlayerState::InGame(game_id));
            if !present {
                session.remove_player(id);
            }
        }
        ctx.insert_game(Arc::clone(&session));
    }

    tracing::info!(%game_id, %mode, slot = slot.index(), "game launched");
    let result = Arc::clone(&session).run(slot.workers()).await;
    finish_game(&ctx, game_id, result).await;
    ctx.pool.release(slot);
}

/// Returns everyone still in the game to mode selection.
///
/// On a clean finish the final scores are applied, `GameEnd` is sent and
/// the new totals are flushed. On an abort nobody's score changes.
async fn finish_game<S: UserStore>(
    ctx: &Arc<ServerContext<S>>,
    game_id: GameId,
    result: Result<GameReport, GameError>,
) {
    let mut flushes = Vec::new();

    {
        let mut state = ctx.state.lock().await;
        // Unpublish under the lock so a guess routed before this point
        // still finds the session, and one routed after finds the player
        // back at mode selection.
        ctx.remove_game(game_id);
        match result {
            Ok(report) => {
                for FinalScore { player: id, score } in report.players {
                    let Some(player) = in_game(&mut state.registry, id, game_id) else {
                        continue;
                    };
                    player.record_game(score);
                    player.make_idle();
                    player.send(Message::new(
                        MessageKind::GameEnd,
                        format!("{};{}", player.score, player.games_played),
                    ));
                    player.send(Message::bare(MessageKind::GameModeRequest));
                    flushes.extend(Flush::registered(player));
                }
            }
            Err(err) => {
                tracing::error!(%game_id, error = %err, "game ended abnormally, scores unchanged");
                let members: Vec<PlayerId> = state
                    .registry
                    .iter()
                    .filter(|p| p.state == PlayerState::InGame(game_id))
                    .map(|p| p.id)
                    .collect();
                for id in members {
                    let Some(player) = in_game(&mut state.registry, id, game_id) else {
                        continue;
                    };
                    player.make_idle();
                    player.send(Message::info("The game was aborted. Your score is unchanged."));
                    player.send(Message::bare(MessageKind::GameModeRequest));
                }
            }
        }
    }

    for flush in flushes {
        flush.spawn(ctx);
    }
}

fn in_game(
    registry: &mut PlayerRegistry,
    id: PlayerId,
    game_id: GameId,
) -> Option<&mut Player> {
    registry
        .get_mut(id)
        .filter(|p| p.state == PlayerState::InGame(game_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guessmatch_game::SessionPlayer;
    use guessmatch_session::{MemoryUserStore, UserRecord};
    use guessmatch_transport::ConnectionId;
    use tokio::sync::mpsc;

    use crate::ServerConfig;

    #[tokio::test]
    async fn test_finish_game_unpublishes_session_under_state_lock() {
        let store = Arc::new(MemoryUserStore::new());
        store.create("amy", "").unwrap();
        let (events, _events_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(ServerContext::new(ServerConfig::default(), store, events));
        let game_id = GameId(1);
        let (outbox, mut inbox) = mpsc::unbounded_channel();

        let id = {
            let mut state = ctx.state.lock().await;
            let id = state.registry.connect(ConnectionId::new(1), outbox.clone());
            let record = UserRecord {
                username: "amy".into(),
                password_hash: String::new(),
                score: 10,
                games_played: 0,
            };
            state.registry.login(id, record).unwrap();
            state.registry.get_mut(id).unwrap().state = PlayerState::InGame(game_id);
            id
        };
        let players = vec![SessionPlayer::new(id, "amy", 10, outbox)];
        let session = GameSession::with_secret(game_id, ctx.config.game.clone(), players, 50);
        ctx.insert_game(Arc::new(session));

        // Hold the lock the way the reactor does while it routes a guess.
        let state = ctx.state.lock().await;
        let report = GameReport {
            game_id,
            players: vec![FinalScore { player: id, score: 85 }],
        };
        let finishing = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { finish_game(&ctx, game_id, Ok(report)).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(ctx.game(game_id).is_some(), "session must stay routable until the lock is free");
        assert_eq!(state.registry.get(id).unwrap().state, PlayerState::InGame(game_id));
        drop(state);

        finishing.await.unwrap();
        assert!(ctx.game(game_id).is_none());
        {
            let state = ctx.state.lock().await;
            let player = state.registry.get(id).unwrap();
            assert_eq!(player.state, PlayerState::Idle);
            assert_eq!((player.score, player.games_played), (85, 1));
        }

        let end = inbox.try_recv().unwrap();
        assert_eq!(end, Message::new(MessageKind::GameEnd, "85;1"));
        assert_eq!(inbox.try_recv().unwrap().kind, MessageKind::GameModeRequest);
    }
}
