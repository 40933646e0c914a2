//! Command-line interface for prompt_whispers.

use clap::{Parser, Subcommand};

/// Prompt Whispers - play the prompt/image telephone game from a terminal
#[derive(Parser, Debug)]
#[command(name = "prompt_whispers")]
#[command(about = "Headless client for the Prompt Whispers game", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, default_value = "prompt_whispers.toml")]
    pub config: std::path::PathBuf,

    /// Backend URL (overrides config and environment)
    #[arg(long)]
    pub url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a running game: watch your round and answer prompt requests from stdin
    Play {
        /// Game to play
        #[arg(long)]
        game_id: String,

        /// Your player ID. Looked up from the backend if omitted.
        #[arg(long)]
        player_id: Option<String>,
    },

    /// Wait in a lobby. Reads `join`, `leave`, `start` and `quit` from stdin.
    Lobby {
        /// Lobby to watch. A new lobby is created if omitted.
        #[arg(long)]
        lobby_id: Option<String>,

        /// Your player ID. Looked up from the backend if omitted.
        #[arg(long)]
        player_id: Option<String>,
    },

    /// Show every round of a game
    Replay {
        /// Game to replay
        #[arg(long)]
        game_id: String,

        /// Only show this player's round (zero-based)
        #[arg(long)]
        tab: Option<usize>,
    },

    /// List your games, newest first
    History,
}
