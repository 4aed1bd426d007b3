//! Writing player progress back to the credential store.
//!
//! Store I/O blocks, so every write runs on the blocking pool and is
//! fire-and-forget from the caller's point of view. A failed write is
//! logged and the record stays dirty.

use std::sync::Arc;

use guessmatch_protocol::PlayerId;
use guessmatch_session::{Player, UserStore};

use crate::server::ServerContext;

/// One pending store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Flush {
    /// Still-registered player whose `dirty` flag is cleared on success.
    player: Option<PlayerId>,
    username: String,
    score: u32,
    games_played: u32,
}

impl Flush {
    /// A flush for a player who stays in the registry.
    pub(crate) fn registered(player: &Player) -> Option<Self> {
        Self::dirty(player).map(|flush| Self {
            player: Some(player.id),
            ..flush
        })
    }

    /// A flush for a player who has already been removed.
    pub(crate) fn departed(player: &Player) -> Option<Self> {
        Self::dirty(player)
    }

    fn dirty(player: &Player) -> Option<Self> {
        if !player.dirty {
            return None;
        }
        Some(Self {
            player: None,
            username: player.username.clone()?,
            score: player.score,
            games_played: player.games_played,
        })
    }

    /// Runs the write on the blocking pool.
    pub(crate) fn spawn<S: UserStore>(self, ctx: &Arc<ServerContext<S>>) {
        let ctx = Arc::clone(ctx);
        tokio::spawn(async move {
            let Self {
                player,
                username,
                score,
                games_played,
            } = self;

            let auth = ctx.auth.clone();
            let name = username.clone();
            let written =
                tokio::task::spawn_blocking(move || auth.persist(&name, score, games_played)).await;

            match written {
                Ok(Ok(())) => {
                    tracing::debug!(%username, score, games_played, "player record flushed");
                    let Some(id) = player else {
                        return;
                    };
                    let mut state = ctx.state.lock().await;
                    if let Some(p) = state.registry.get_mut(id) {
                        // A game may have finished again while we were writing.
                        if p.score == score && p.games_played == games_played {
                            p.dirty = false;
                        }
                    }
                }
                Ok(Err(e)) => tracing::warn!(%username, error = %e, "failed to flush player record"),
                Err(e) => tracing::warn!(%username, error = %e, "flush task failed"),
            }
        });
    }
}
