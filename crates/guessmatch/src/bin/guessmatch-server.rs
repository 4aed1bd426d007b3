use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use guessmatch::prelude::*;
use tracing_subscriber::EnvFilter;

/// Matchmaking and number-guessing game server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    bind: String,

    /// JSON file holding user accounts
    #[arg(short, long, default_value = "users.json")]
    users: PathBuf,

    /// Games allowed to run at the same time
    #[arg(short = 'g', long, default_value_t = 5)]
    max_games: usize,

    /// Players per game
    #[arg(short = 'p', long, default_value_t = 2)]
    match_size: usize,

    /// Rounds per game
    #[arg(short, long, default_value_t = 3)]
    rounds: u32,

    /// Ranked tolerance, in score points per second waited
    #[arg(long, default_value_t = 10.0)]
    ratio: f64,

    /// Seconds an absent player keeps their queue place (0: until the next matchmaking pass)
    #[arg(long, default_value_t = 0)]
    absent_grace: u64,
}

#[tokio::main]
async fn main() -> Result<(), GuessmatchError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let game = GameConfig {
        match_size: args.match_size,
        rounds: args.rounds,
        ..GameConfig::default()
    };
    let matchmaking = MatchmakingConfig {
        ratio: args.ratio,
        absent_grace: Duration::from_secs(args.absent_grace),
        ..MatchmakingConfig::default()
    };

    let server = GuessmatchServer::builder()
        .bind(&args.bind)
        .users_file(args.users)
        .max_games(args.max_games)
        .game_config(game)
        .matchmaking_config(matchmaking)
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
