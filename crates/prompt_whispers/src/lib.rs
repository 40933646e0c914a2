//! Prompt Whispers client library
//!
//! Polls a Prompt Whispers backend (a prompt → image → prompt telephone
//! game) and derives, from each snapshot, what the local player should see.
//!
//! # Architecture
//!
//! - **Model**: typed snapshots of games, rounds, turns and lobbies
//! - **Phase**: the backend's game phases and the per-phase policy table
//! - **Reconciler**: round rotation, input state, displayable image, finish detection
//! - **Poller**: owned, cancellable polling task for a game view
//! - **Lobby**: the same polling pattern for lobbies, plus roles and actions
//! - **Client**: REST client for every backend endpoint
//!
//! # Example
//!
//! ```no_run
//! use prompt_whispers::{
//!     ClientConfig, GamePoller, PollEvent, RestGameClient, RestSnapshotSource,
//!     RoundStateReconciler,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::new("http://localhost:8080");
//! let client = RestGameClient::new(&config)?;
//! let source = RestSnapshotSource::new(client, "game-1");
//! let reconciler = RoundStateReconciler::new("player-1".to_string());
//!
//! let (poller, mut events) = GamePoller::start(source, reconciler, config.poll_interval());
//! while let Some(event) = events.recv().await {
//!     if let PollEvent::Paused(_) = event {
//!         poller.submit_prompt("A potato king leads an uprising");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod lobby;
mod model;
mod phase;
mod poller;
mod reconciler;
mod replay;

// Crate-level exports - Errors
pub use error::{ApiError, ApiErrorKind, ConfigError, PromptError};

// Crate-level exports - Configuration
pub use config::{ClientConfig, ENV_POLL_MS, ENV_SESSION, ENV_URL};

// Crate-level exports - Wire model
pub use model::{
    Game, GameId, Lobby, Player, PlayerId, PromptCreate, Round, Turn, TurnContent, TurnKind,
};

// Crate-level exports - Phases
pub use phase::{GamePhase, PhasePolicy, PollDirective};

// Crate-level exports - Reconciliation
pub use reconciler::{
    MAX_PROMPT_CHARS, RoundIndex, RoundStateReconciler, ViewState, active_round,
    completed_image_turns, is_game_finished, last_displayable_image, round_index,
    validate_prompt,
};

// Crate-level exports - REST client
pub use client::RestGameClient;

// Crate-level exports - Polling
pub use poller::{GamePoller, PollEvent, RestSnapshotSource, SnapshotSource};

// Crate-level exports - Lobby
pub use lobby::{LobbyAction, LobbyEvent, LobbyRole, LobbySource, LobbyWatcher, RestLobbySource};

// Crate-level exports - Replay
pub use replay::{GameHistory, GameReplay};
