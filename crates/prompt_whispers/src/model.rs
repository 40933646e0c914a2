//! Wire models for the Prompt Whispers backend.
//!
//! All of these are read-only snapshots. The backend sends camelCase JSON.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::phase::GamePhase;

/// Unique identifier for a game.
pub type GameId = String;

/// Unique identifier for a player.
pub type PlayerId = String;

/// A participant. Identity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Player's unique ID.
    id: PlayerId,
    /// Name shown to other players. The backend sends the account email.
    #[serde(alias = "email")]
    display_name: String,
}

/// Discriminant of a turn, as sent in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnKind {
    /// Text typed by a player.
    Prompt,
    /// Image generated from the preceding prompt.
    Image,
}

/// What a turn contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnContent {
    /// Prompt text.
    Prompt(String),
    /// URL of the generated image.
    Image(String),
}

impl TurnContent {
    /// Returns the discriminant.
    pub fn kind(&self) -> TurnKind {
        match self {
            TurnContent::Prompt(_) => TurnKind::Prompt,
            TurnContent::Image(_) => TurnKind::Image,
        }
    }

    /// Returns the prompt text or image URL.
    pub fn as_str(&self) -> &str {
        match self {
            TurnContent::Prompt(s) | TurnContent::Image(s) => s,
        }
    }
}

/// One contribution to a round. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(from = "TurnWire", into = "TurnWire")]
pub struct Turn {
    /// Turn's unique ID.
    id: String,
    /// Prompt text or image URL.
    content: TurnContent,
    /// Who contributed it, when the backend includes it.
    author: Option<Player>,
    /// Creation time.
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Returns the discriminant of this turn's content.
    pub fn kind(&self) -> TurnKind {
        self.content.kind()
    }

    /// Returns true if this turn is a generated image.
    pub fn is_image(&self) -> bool {
        self.kind() == TurnKind::Image
    }
}

/// Flat shape of a turn on the wire.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnWire {
    id: String,
    #[serde(rename = "type")]
    kind: TurnKind,
    content: String,
    #[serde(default, alias = "player", skip_serializing_if = "Option::is_none")]
    author: Option<Player>,
    created_at: DateTime<Utc>,
}

impl From<TurnWire> for Turn {
    fn from(wire: TurnWire) -> Self {
        let content = match wire.kind {
            TurnKind::Prompt => TurnContent::Prompt(wire.content),
            TurnKind::Image => TurnContent::Image(wire.content),
        };
        Self {
            id: wire.id,
            content,
            author: wire.author,
            created_at: wire.created_at,
        }
    }
}

impl From<Turn> for TurnWire {
    fn from(turn: Turn) -> Self {
        let kind = turn.content.kind();
        let content = match turn.content {
            TurnContent::Prompt(s) | TurnContent::Image(s) => s,
        };
        Self {
            id: turn.id,
            kind,
            content,
            author: turn.author,
            created_at: turn.created_at,
        }
    }
}

/// Full snapshot of a game: every player and every round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Game ID.
    id: GameId,
    /// Players in seating order. A player's index is their home round.
    #[serde(default)]
    players: Vec<Player>,
    /// `rounds[i]` is the chronological chain of turns in round `i`.
    #[serde(default)]
    rounds: Vec<Vec<Turn>>,
    /// Backend phase.
    game_state: GamePhase,
    /// Creation time, when sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[new(default)]
    created_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Returns the seat of the given player, if they are in this game.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    /// Returns true once every player has a round.
    pub fn is_initialized(&self) -> bool {
        !self.players.is_empty() && self.players.len() == self.rounds.len()
    }
}

/// The round the backend selected for the calling player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    /// Game this round belongs to.
    game_id: GameId,
    /// Chronological turns.
    #[serde(default)]
    turns: Vec<Turn>,
    /// Backend phase.
    game_state: GamePhase,
}

/// A waiting room that turns into a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    /// Lobby ID.
    id: String,
    /// Player who created the lobby and may start the game.
    host: Player,
    /// Everyone in the lobby, host included.
    #[serde(default)]
    players: Vec<Player>,
    /// Set once the host started the game.
    #[serde(default)]
    game_id: Option<GameId>,
    /// Whether the game has started.
    #[serde(default)]
    is_game_started: bool,
    /// Whether the game has finished.
    #[serde(default)]
    is_game_finished: bool,
    /// Creation time, when sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[new(default)]
    created_at: Option<DateTime<Utc>>,
}

impl Lobby {
    /// Returns true if the given player is in the lobby.
    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }
}

/// Request body for submitting a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct PromptCreate {
    /// Prompt text.
    pub prompt: String,
}
