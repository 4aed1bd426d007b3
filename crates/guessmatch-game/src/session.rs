//! A running game: rounds of synchronized guessing.
//!
//! Each round is a rendezvous. The controller ([`GameSession::run`])
//! spawns one task per player on the slot's worker pool; each task parks
//! until its own player's guess arrives, scores it, tells the player to
//! wait if others are still thinking, and parks again until everyone
//! still in the game has guessed. The controller joins all of them and
//! then settles the round.
//!
//! The wait-set is the session's player list itself. A player who
//! disconnects is removed from it, so a round never waits on someone who
//! cannot answer; a round whose wait-set empties completes at once.
//!
//! All rendezvous state lives behind one `std::sync::Mutex` that is never
//! held across an `.await`. Waiters are woken with
//! [`Notify::notify_waiters`] after every change.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use guessmatch_protocol::{GameId, Message, MessageKind, PlayerId, parse_guess};
use guessmatch_session::Outbox;
use rand::Rng;
use tokio::sync::{Notify, Semaphore};

use crate::scoring::{apply_delta, distance, round_delta};
use crate::{GameConfig, GameError, GamePhase};

/// A participant as the session sees them.
#[derive(Debug)]
pub struct SessionPlayer {
    pub id: PlayerId,
    pub name: String,
    /// Cumulative score, starting from the player's stored score.
    pub score: u32,
    outbox: Outbox,
}

impl SessionPlayer {
    pub fn new(id: PlayerId, name: impl Into<String>, score: u32, outbox: Outbox) -> Self {
        Self {
            id,
            name: name.into(),
            score,
            outbox,
        }
    }
}

/// How one player's guess scored in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub guess: i64,
    pub distance: u32,
    pub delta: i64,
}

/// A player's standing when the game finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalScore {
    pub player: PlayerId,
    pub score: u32,
}

/// Result of a game that ran to completion.
///
/// Only players still present at the end are listed; leavers forfeit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameReport {
    pub game_id: GameId,
    pub players: Vec<FinalScore>,
}

/// Everything the controller and the round tasks share.
#[derive(Debug)]
struct Rendezvous {
    phase: GamePhase,
    players: Vec<SessionPlayer>,
    guesses: HashMap<PlayerId, i64>,
    outcomes: HashMap<PlayerId, RoundOutcome>,
    violation: Option<String>,
}

impl Rendezvous {
    fn is_member(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    /// Vacuously true once every player has left.
    fn all_guessed(&self) -> bool {
        self.players.iter().all(|p| self.guesses.contains_key(&p.id))
    }

    fn broadcast(&self, message: &Message) {
        for player in &self.players {
            let _ = player.outbox.send(message.clone());
        }
    }

    fn send_to(&self, id: PlayerId, message: Message) {
        if let Some(player) = self.players.iter().find(|p| p.id == id) {
            let _ = player.outbox.send(message);
        }
    }
}

/// One match between a fixed group of players.
#[derive(Debug)]
pub struct GameSession {
    id: GameId,
    secret: i64,
    config: GameConfig,
    state: Mutex<Rendezvous>,
    changed: Notify,
}

impl GameSession {
    /// Creates a session with a secret drawn uniformly from the guess
    /// range.
    pub fn new(id: GameId, config: GameConfig, players: Vec<SessionPlayer>) -> Self {
        let secret = rand::rng().random_range(config.min_range..=config.max_range);
        Self::with_secret(id, config, players, secret)
    }

    /// Creates a session with a known secret.
    pub fn with_secret(
        id: GameId,
        config: GameConfig,
        players: Vec<SessionPlayer>,
        secret: i64,
    ) -> Self {
        Self {
            id,
            secret,
            config,
            state: Mutex::new(Rendezvous {
                phase: GamePhase::Created,
                players,
                guesses: HashMap::new(),
                outcomes: HashMap::new(),
                violation: None,
            }),
            changed: Notify::new(),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn secret(&self) -> i64 {
        self.secret
    }

    pub fn phase(&self) -> GamePhase {
        self.lock().phase
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.lock().players.iter().map(|p| p.id).collect()
    }

    /// Number of guesses recorded for the open round.
    pub fn guess_count(&self) -> usize {
        self.lock().guesses.len()
    }

    /// The `GameGuessRequest` for the open round, for re-prompting.
    pub fn guess_prompt(&self) -> Option<Message> {
        self.lock().phase.open_round().map(|round| self.prompt(round))
    }

    /// Records a guess for the open round and wakes the rendezvous.
    ///
    /// Returns the round the guess counted for.
    ///
    /// # Errors
    /// - [`GameError::InvalidGuess`] for non-numeric or out-of-range
    ///   input. Nothing is recorded.
    /// - [`GameError::RoundClosed`] between rounds.
    /// - [`GameError::AlreadyGuessed`] on a second guess in one round.
    /// - [`GameError::NotAPlayer`] if `player` is not in this session.
    ///   This aborts the session.
    pub fn submit_guess(&self, player: PlayerId, payload: &str) -> Result<u32, GameError> {
        let value = parse_guess(payload)
            .map_err(|_| GameError::InvalidGuess(format!("{:?} is not a number", payload.trim())))?;
        if !self.config.in_range(value) {
            return Err(GameError::InvalidGuess(format!(
                "{value} is not between {} and {}",
                self.config.min_range, self.config.max_range
            )));
        }

        let mut state = self.lock();
        if let Some(reason) = &state.violation {
            return Err(GameError::Aborted {
                game: self.id,
                reason: reason.clone(),
            });
        }
        if !state.is_member(player) {
            state.violation = Some(format!("guess submitted by non-member {player}"));
            drop(state);
            tracing::error!(game_id = %self.id, player_id = %player, "guess from a player outside the session");
            self.changed.notify_waiters();
            return Err(GameError::NotAPlayer {
                game: self.id,
                player,
            });
        }
        let round = state.phase.open_round().ok_or(GameError::RoundClosed(self.id))?;
        if state.guesses.contains_key(&player) {
            return Err(GameError::AlreadyGuessed(round));
        }

        state.guesses.insert(player, value);
        if state.guesses.len() > state.players.len() {
            state.violation = Some(format!(
                "{} guesses for {} players",
                state.guesses.len(),
                state.players.len()
            ));
        }
        drop(state);

        tracing::debug!(game_id = %self.id, player_id = %player, round, "guess recorded");
        self.changed.notify_waiters();
        Ok(round)
    }

    /// Drops a player from the session and its wait-set.
    ///
    /// Returns `false` if the player was not a member. Remaining players
    /// are told who left.
    pub fn remove_player(&self, player: PlayerId) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.players.iter().position(|p| p.id == player) else {
            return false;
        };
        let left = state.players.remove(pos);
        state.guesses.remove(&player);
        state.outcomes.remove(&player);
        state.broadcast(&Message::info(format!("{} left the game.", left.name)));
        let remaining = state.players.len();
        drop(state);

        tracing::info!(game_id = %self.id, player_id = %player, remaining, "player left game");
        self.changed.notify_waiters();
        true
    }

    /// Drives the session through every round.
    ///
    /// `workers` is the slot's worker pool; each round runs one task per
    /// player on it. Ends early if every player leaves.
    ///
    /// # Errors
    /// [`GameError::Aborted`] if an invariant broke, or
    /// [`GameError::TaskFailed`] if a round task panicked. Scores are not
    /// meant to be applied in either case.
    pub async fn run(self: Arc<Self>, workers: Arc<Semaphore>) -> Result<GameReport, GameError> {
        tracing::info!(game_id = %self.id, players = ?self.player_ids(), "game started");
        self.lock().broadcast(&Message::info(format!(
            "Game started! {} rounds, guess a number between {} and {}.",
            self.config.rounds, self.config.min_range, self.config.max_range
        )));

        for round in 1..=self.config.rounds {
            if !self.open_round(round) {
                tracing::info!(game_id = %self.id, round, "every player left, ending early");
                break;
            }

            let tasks = self.player_ids().into_iter().map(|id| {
                let session = Arc::clone(&self);
                let workers = Arc::clone(&workers);
                tokio::spawn(async move {
                    let Ok(_permit) = workers.acquire_owned().await else {
                        return;
                    };
                    session.await_round(id).await;
                })
            });

            for result in join_all(tasks).await {
                if result.is_err() {
                    self.abort("round task panicked");
                    return Err(GameError::TaskFailed(self.id));
                }
            }

            let violation = self.lock().violation.clone();
            if let Some(reason) = violation {
                self.abort(&reason);
                return Err(GameError::Aborted {
                    game: self.id,
                    reason,
                });
            }

            self.settle(round);
        }

        Ok(self.finish())
    }

    fn lock(&self) -> MutexGuard<'_, Rendezvous> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prompt(&self, round: u32) -> Message {
        Message::new(
            MessageKind::GameGuessRequest,
            format!("{};{};{round}", self.config.min_range, self.config.max_range),
        )
    }

    /// Opens `round` and prompts everyone. Returns `false` if nobody is
    /// left to play it.
    fn open_round(&self, round: u32) -> bool {
        let mut state = self.lock();
        if state.players.is_empty() {
            return false;
        }
        state.phase = GamePhase::RoundActive(round);
        state.guesses.clear();
        state.outcomes.clear();
        state.broadcast(&Message::info(format!("Round {round} of {}.", self.config.rounds)));
        state.broadcast(&self.prompt(round));
        tracing::debug!(game_id = %self.id, round, "round opened");
        true
    }

    /// One player's side of the rendezvous.
    async fn await_round(&self, id: PlayerId) {
        loop {
            let mut notified = pin!(self.changed.notified());
            // Register before looking at the state so a change made between
            // the check and the await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.violation.is_some() || !state.is_member(id) {
                    return;
                }
                let everyone = state.all_guessed();
                if !state.outcomes.contains_key(&id) {
                    if let Some(&guess) = state.guesses.get(&id) {
                        let distance = distance(self.secret, guess);
                        let delta = round_delta(&self.config, distance);
                        state.outcomes.insert(id, RoundOutcome { guess, distance, delta });
                        if !everyone {
                            state.send_to(id, Message::info("Guess received. Waiting for the other players..."));
                        }
                    }
                }
                if everyone {
                    return;
                }
            }

            notified.await;
        }
    }

    fn settle(&self, round: u32) {
        let mut state = self.lock();
        state.phase = GamePhase::RoundSettling(round);

        let outcomes = std::mem::take(&mut state.outcomes);
        let mut lines = vec![format!("Round {round} over! The secret number was {}.", self.secret)];
        for player in &mut state.players {
            if let Some(outcome) = outcomes.get(&player.id) {
                player.score = apply_delta(player.score, outcome.delta);
                lines.push(format!(
                    "{} guessed {} ({} away, {:+} points) and now has {} points.",
                    player.name, outcome.guess, outcome.distance, outcome.delta, player.score
                ));
            }
        }
        state.guesses.clear();
        for line in lines {
            state.broadcast(&Message::info(line));
        }
        tracing::debug!(game_id = %self.id, round, "round settled");
    }

    fn finish(&self) -> GameReport {
        let mut state = self.lock();
        state.phase = GamePhase::Finished;
        let players = state
            .players
            .iter()
            .map(|p| FinalScore {
                player: p.id,
                score: p.score,
            })
            .collect();
        tracing::info!(game_id = %self.id, "game finished");
        GameReport {
            game_id: self.id,
            players,
        }
    }

    fn abort(&self, reason: &str) {
        self.lock().phase = GamePhase::Finished;
        tracing::error!(game_id = %self.id, reason, "game aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session(n: u64) -> (GameSession, Vec<mpsc::UnboundedReceiver<Message>>) {
        let mut players = Vec::new();
        let mut inboxes = Vec::new();
        for i in 1..=n {
            let (tx, rx) = mpsc::unbounded_channel();
            players.push(SessionPlayer::new(PlayerId(i), format!("p{i}"), 0, tx));
            inboxes.push(rx);
        }
        let game = GameSession::with_secret(GameId(1), GameConfig::default(), players, 40);
        (game, inboxes)
    }

    fn open(game: &GameSession) {
        assert!(game.open_round(1));
    }

    #[test]
    fn test_submit_guess_before_round_opens_is_rejected() {
        let (game, _rx) = session(2);
        let result = game.submit_guess(PlayerId(1), "40");
        assert!(matches!(result, Err(GameError::RoundClosed(_))));
    }

    #[test]
    fn test_submit_guess_non_numeric_is_invalid() {
        let (game, _rx) = session(2);
        open(&game);
        let result = game.submit_guess(PlayerId(1), "forty");
        assert!(matches!(result, Err(GameError::InvalidGuess(_))));
        assert_eq!(game.guess_count(), 0);
    }

    #[test]
    fn test_submit_guess_out_of_range_is_invalid() {
        let (game, _rx) = session(2);
        open(&game);
        assert!(matches!(game.submit_guess(PlayerId(1), "0"), Err(GameError::InvalidGuess(_))));
        assert!(matches!(game.submit_guess(PlayerId(1), "101"), Err(GameError::InvalidGuess(_))));
        assert_eq!(game.guess_count(), 0);
    }

    #[test]
    fn test_submit_guess_twice_in_one_round_is_rejected() {
        let (game, _rx) = session(2);
        open(&game);
        assert_eq!(game.submit_guess(PlayerId(1), "10").unwrap(), 1);
        assert!(matches!(game.submit_guess(PlayerId(1), "11"), Err(GameError::AlreadyGuessed(1))));
    }

    #[test]
    fn test_submit_guess_from_non_member_marks_violation() {
        let (game, _rx) = session(2);
        open(&game);
        let result = game.submit_guess(PlayerId(99), "10");
        assert!(matches!(result, Err(GameError::NotAPlayer { .. })));

        // The session is now poisoned for everyone.
        let result = game.submit_guess(PlayerId(1), "10");
        assert!(matches!(result, Err(GameError::Aborted { .. })));
    }

    #[test]
    fn test_guess_count_never_exceeds_players() {
        let (game, _rx) = session(2);
        open(&game);
        for (id, guess) in [(1, "5"), (2, "6"), (1, "7"), (2, "8")] {
            let _ = game.submit_guess(PlayerId(id), guess);
            assert!(game.guess_count() <= game.player_ids().len());
        }
    }

    #[test]
    fn test_remove_player_drops_their_guess_and_tells_the_rest() {
        let (game, mut rx) = session(2);
        open(&game);
        game.submit_guess(PlayerId(2), "50").unwrap();

        assert!(game.remove_player(PlayerId(2)));
        assert!(!game.remove_player(PlayerId(2)));
        assert_eq!(game.guess_count(), 0);
        assert_eq!(game.player_ids(), vec![PlayerId(1)]);

        let last = std::iter::from_fn(|| rx[0].try_recv().ok()).last();
        assert_eq!(last, Some(Message::info("p2 left the game.")));
    }

    #[test]
    fn test_guess_prompt_carries_range_and_round() {
        let (game, _rx) = session(1);
        assert_eq!(game.guess_prompt(), None);
        open(&game);
        assert_eq!(
            game.guess_prompt(),
            Some(Message::new(MessageKind::GameGuessRequest, "1;100;1"))
        );
    }

    #[tokio::test]
    async fn test_await_round_returns_once_everyone_guessed() {
        let (game, _rx) = session(2);
        let game = Arc::new(game);
        open(&game);

        let waiter = tokio::spawn({
            let game = Arc::clone(&game);
            async move { game.await_round(PlayerId(1)).await }
        });

        game.submit_guess(PlayerId(1), "42").unwrap();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        game.submit_guess(PlayerId(2), "40").unwrap();
        waiter.await.unwrap();

        let outcome = game.lock().outcomes[&PlayerId(1)];
        assert_eq!(outcome, RoundOutcome { guess: 42, distance: 2, delta: 48 });
    }
}
