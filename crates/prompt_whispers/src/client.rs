//! Type-safe HTTP client for the Prompt Whispers REST API.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::model::{Game, Lobby, Player, PromptCreate, Round};

/// REST client bound to one backend.
#[derive(Debug, Clone)]
pub struct RestGameClient {
    base_url: String,
    image_timeout: Duration,
    client: reqwest::Client,
}

impl RestGameClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the session cookie is not a valid header
    /// value or the HTTP client cannot be built.
    #[instrument(skip(config), fields(base_url = %config.base_url()))]
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ConfigError::new(format!("Invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build HTTP client: {}", e)))?;

        info!("REST client ready");
        Ok(Self {
            base_url: config.base_url().clone(),
            image_timeout: config.image_timeout(),
            client,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Gets the round the backend selected for the caller.
    #[instrument(skip(self))]
    pub async fn get_round(&self, game_id: &str) -> Result<Round, ApiError> {
        debug!("Getting round");
        let response = self
            .client
            .get(self.url(&format!("/api/games/{}", game_id)))
            .send()
            .await?;
        let round: Round = decode(response).await?;
        debug!(phase = %round.game_state(), turns = round.turns().len(), "Got round");
        Ok(round)
    }

    /// Gets the full game with every round.
    #[instrument(skip(self))]
    pub async fn get_game(&self, game_id: &str) -> Result<Game, ApiError> {
        debug!("Getting full game");
        let response = self
            .client
            .get(self.url(&format!("/api/games/{}/all", game_id)))
            .send()
            .await?;
        let game: Game = decode(response).await?;
        debug!(
            phase = %game.game_state(),
            players = game.players().len(),
            rounds = game.rounds().len(),
            "Got game"
        );
        Ok(game)
    }

    /// Lists the caller's games.
    #[instrument(skip(self))]
    pub async fn list_games(&self) -> Result<Vec<Game>, ApiError> {
        let response = self.client.get(self.url("/api/games")).send().await?;
        let games: Vec<Game> = decode(response).await?;
        debug!(count = games.len(), "Listed games");
        Ok(games)
    }

    /// Starts a game from a lobby. Returns the host's first round.
    #[instrument(skip(self, lobby), fields(lobby_id = %lobby.id()))]
    pub async fn create_game(&self, lobby: &Lobby) -> Result<Round, ApiError> {
        info!("Creating game from lobby");
        let response = self
            .client
            .post(self.url("/api/games"))
            .json(lobby)
            .send()
            .await?;
        let round: Round = decode(response).await?;
        info!(game_id = %round.game_id(), "Game created");
        Ok(round)
    }

    /// Deletes a game.
    #[instrument(skip(self))]
    pub async fn delete_game(&self, game_id: &str) -> Result<(), ApiError> {
        info!("Deleting game");
        let response = self
            .client
            .delete(self.url(&format!("/api/games/{}", game_id)))
            .send()
            .await?;
        expect_success(response).await
    }

    /// Submits a prompt into the caller's current round.
    #[instrument(skip(self, prompt))]
    pub async fn submit_prompt(
        &self,
        game_id: &str,
        prompt: &PromptCreate,
    ) -> Result<Round, ApiError> {
        info!(chars = prompt.prompt.chars().count(), "Submitting prompt");
        let response = self
            .client
            .post(self.url(&format!("/api/games/{}/prompt", game_id)))
            .json(prompt)
            .send()
            .await?;
        decode(response).await
    }

    /// Asks the backend to generate an image for the most recent prompt.
    ///
    /// The backend answers only once the image exists, so this uses the
    /// longer image timeout.
    #[instrument(skip(self))]
    pub async fn generate_image(&self, game_id: &str) -> Result<Round, ApiError> {
        info!(timeout_ms = self.image_timeout.as_millis() as u64, "Requesting image generation");
        let response = self
            .client
            .post(self.url(&format!("/api/games/{}/generateImage", game_id)))
            .timeout(self.image_timeout)
            .send()
            .await?;
        decode(response).await
    }

    /// Creates a lobby hosted by the caller.
    #[instrument(skip(self))]
    pub async fn create_lobby(&self) -> Result<Lobby, ApiError> {
        info!("Creating lobby");
        let response = self.client.post(self.url("/api/lobbies")).send().await?;
        decode(response).await
    }

    /// Gets a lobby.
    #[instrument(skip(self))]
    pub async fn get_lobby(&self, lobby_id: &str) -> Result<Lobby, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/lobbies/{}", lobby_id)))
            .send()
            .await?;
        decode(response).await
    }

    /// Joins a lobby.
    #[instrument(skip(self))]
    pub async fn join_lobby(&self, lobby_id: &str) -> Result<Lobby, ApiError> {
        info!("Joining lobby");
        let response = self
            .client
            .put(self.url(&format!("/api/lobbies/{}/join", lobby_id)))
            .send()
            .await?;
        decode(response).await
    }

    /// Leaves a lobby. The host cannot leave.
    #[instrument(skip(self))]
    pub async fn leave_lobby(&self, lobby_id: &str) -> Result<Lobby, ApiError> {
        info!("Leaving lobby");
        let response = self
            .client
            .put(self.url(&format!("/api/lobbies/{}/leave", lobby_id)))
            .send()
            .await?;
        decode(response).await
    }

    /// Deletes a lobby. Only the host may do this.
    #[instrument(skip(self))]
    pub async fn delete_lobby(&self, lobby_id: &str) -> Result<(), ApiError> {
        info!("Deleting lobby");
        let response = self
            .client
            .delete(self.url(&format!("/api/lobbies/{}", lobby_id)))
            .send()
            .await?;
        expect_success(response).await
    }

    /// Gets the logged-in user.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<Player, ApiError> {
        let response = self.client.get(self.url("/api/users")).send().await?;
        decode(response).await
    }
}

async fn expect_success(response: reqwest::Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "Request failed");
    Err(ApiError::status(status.as_u16(), body))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!(status = %status, body = %body, "Request failed");
        return Err(ApiError::status(status.as_u16(), body));
    }
    Ok(serde_json::from_str(&body)?)
}
