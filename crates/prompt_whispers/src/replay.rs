//! Browsing finished games.

use tracing::{debug, instrument};

use crate::client::RestGameClient;
use crate::error::ApiError;
use crate::model::{Game, Turn};

/// Tabbed view over every round of a game, one tab per player.
#[derive(Debug, Clone)]
pub struct GameReplay {
    game: Game,
    active_tab: usize,
}

impl GameReplay {
    /// Opens the replay on the first tab.
    #[instrument(skip(game), fields(game_id = %game.id(), players = game.players().len()))]
    pub fn new(game: Game) -> Self {
        Self { game, active_tab: 0 }
    }

    /// Fetches a game and opens its replay.
    #[instrument(skip(client))]
    pub async fn load(client: &RestGameClient, game_id: &str) -> Result<Self, ApiError> {
        Ok(Self::new(client.get_game(game_id).await?))
    }

    /// The replayed game.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Tab labels: each player's display name.
    pub fn tabs(&self) -> Vec<&str> {
        self.game
            .players()
            .iter()
            .map(|p| p.display_name().as_str())
            .collect()
    }

    /// Index of the selected tab.
    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    /// Selects a tab, clamped to the last one. Returns the selected index.
    #[instrument(skip(self), fields(game_id = %self.game.id()))]
    pub fn select_tab(&mut self, index: usize) -> usize {
        let last = self.game.players().len().saturating_sub(1);
        self.active_tab = index.min(last);
        debug!(active_tab = self.active_tab, "Tab selected");
        self.active_tab
    }

    /// Turns of the selected tab's round. Empty if that round does not exist.
    #[instrument(skip(self), fields(game_id = %self.game.id(), active_tab = self.active_tab))]
    pub fn active_turns(&self) -> &[Turn] {
        self.game
            .rounds()
            .get(self.active_tab)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// The viewer's past games.
#[derive(Debug, Clone, Default)]
pub struct GameHistory {
    games: Vec<Game>,
}

impl GameHistory {
    /// Orders games newest first. Games without a creation time go last.
    #[instrument(skip(games), fields(count = games.len()))]
    pub fn new(mut games: Vec<Game>) -> Self {
        games.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        Self { games }
    }

    /// Fetches the viewer's games.
    #[instrument(skip(client))]
    pub async fn load(client: &RestGameClient) -> Result<Self, ApiError> {
        Ok(Self::new(client.list_games().await?))
    }

    /// Games, newest first.
    pub fn games(&self) -> &[Game] {
        &self.games
    }

    /// Number of games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Returns true if there are no games.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
