//! Server configuration.

use std::path::PathBuf;

use guessmatch_game::GameConfig;
use guessmatch_matchmaking::MatchmakingConfig;

use crate::GuessmatchError;

/// Everything needed to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,
    /// JSON file backing the credential store.
    pub users_file: PathBuf,
    /// Number of games that may run at the same time.
    pub max_games: usize,
    pub game: GameConfig,
    pub matchmaking: MatchmakingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:12345".to_string(),
            users_file: PathBuf::from("users.json"),
            max_games: 5,
            game: GameConfig::default(),
            matchmaking: MatchmakingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Checks the settings that would otherwise stall matchmaking forever.
    ///
    /// The game's and the matchmaker's idea of a full match must agree, so
    /// `matchmaking.match_size` is overwritten with `game.match_size`.
    pub fn validate(mut self) -> Result<Self, GuessmatchError> {
        if self.game.match_size == 0 {
            return Err(GuessmatchError::Config("match size must be at least 1".into()));
        }
        if self.max_games == 0 {
            return Err(GuessmatchError::Config("max games must be at least 1".into()));
        }
        if self.game.rounds == 0 {
            return Err(GuessmatchError::Config("a game needs at least one round".into()));
        }
        if self.game.min_range > self.game.max_range {
            return Err(GuessmatchError::Config(format!(
                "guess range {}..={} is empty",
                self.game.min_range, self.game.max_range
            )));
        }
        if self.matchmaking.tick_interval.is_zero() {
            return Err(GuessmatchError::Config("tick interval must be positive".into()));
        }
        self.matchmaking.match_size = self.game.match_size;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:12345");
        assert_eq!(config.max_games, 5);
        assert_eq!(config.game.rounds, 3);
        assert_eq!(config.matchmaking.match_size, 2);
    }

    #[test]
    fn test_validate_syncs_match_size() {
        let mut config = ServerConfig::default();
        config.game.match_size = 3;
        let config = config.validate().unwrap();
        assert_eq!(config.matchmaking.match_size, 3);
    }

    #[test]
    fn test_validate_rejects_zero_games() {
        let config = ServerConfig {
            max_games: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(GuessmatchError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let mut config = ServerConfig::default();
        config.game.min_range = 10;
        config.game.max_range = 1;
        assert!(config.validate().is_err());
    }
}
