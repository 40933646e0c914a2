//! Lobby polling and the viewer's role in a lobby.

use std::time::Duration;

use strum::{Display, EnumIter};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::client::RestGameClient;
use crate::error::ApiError;
use crate::model::{GameId, Lobby, PlayerId};
use crate::poller::effective_interval;

/// How the viewer relates to a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum LobbyRole {
    /// Created the lobby.
    Host,
    /// Joined the lobby.
    Member,
    /// Not in the lobby.
    Visitor,
}

/// Something the viewer may do in a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LobbyAction {
    /// Join as a player.
    Join,
    /// Leave the lobby.
    Leave,
    /// Start the game with everyone present.
    StartGame,
}

impl LobbyRole {
    /// Determines the viewer's role.
    #[instrument(skip(lobby), fields(lobby_id = %lobby.id()))]
    pub fn of(lobby: &Lobby, viewer_id: &str) -> Self {
        if lobby.host().id() == viewer_id {
            LobbyRole::Host
        } else if lobby.has_player(viewer_id) {
            LobbyRole::Member
        } else {
            LobbyRole::Visitor
        }
    }

    /// Actions offered to this role.
    #[instrument]
    pub fn actions(self) -> &'static [LobbyAction] {
        match self {
            LobbyRole::Host => &[LobbyAction::StartGame],
            LobbyRole::Member => &[LobbyAction::Leave],
            LobbyRole::Visitor => &[LobbyAction::Join],
        }
    }
}

/// Where lobby snapshots come from.
#[async_trait::async_trait]
pub trait LobbySource: Send + Sync {
    /// Fetches the current lobby snapshot.
    async fn fetch_lobby(&self) -> Result<Lobby, ApiError>;
}

/// [`LobbySource`] backed by the REST API.
#[derive(Debug, Clone)]
pub struct RestLobbySource {
    client: RestGameClient,
    lobby_id: String,
}

impl RestLobbySource {
    /// Polls the given lobby through `client`.
    pub fn new(client: RestGameClient, lobby_id: impl Into<String>) -> Self {
        Self {
            client,
            lobby_id: lobby_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl LobbySource for RestLobbySource {
    async fn fetch_lobby(&self) -> Result<Lobby, ApiError> {
        self.client.get_lobby(&self.lobby_id).await
    }
}

/// Messages sent from the lobby watcher to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// The lobby changed.
    Updated {
        /// Latest snapshot.
        lobby: Lobby,
        /// Viewer's role in it.
        role: LobbyRole,
    },
    /// A fetch failed; the previous snapshot still stands.
    FetchFailed {
        /// Failures in a row.
        consecutive: u32,
        /// Error text.
        message: String,
    },
    /// The host started the game. The watcher has stopped.
    GameStarted {
        /// Game to play.
        game_id: GameId,
    },
}

/// Handle to a running lobby poll task.
#[derive(Debug)]
pub struct LobbyWatcher {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LobbyWatcher {
    /// Spawns the poll task. The first fetch happens immediately.
    ///
    /// Intervals shorter than one millisecond are clamped.
    #[instrument(skip(source))]
    pub fn start<S>(
        source: S,
        viewer_id: PlayerId,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LobbyEvent>)
    where
        S: LobbySource + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let interval = effective_interval(interval);
        let task = tokio::spawn(watch_loop(source, viewer_id, interval, stop_rx, event_tx));
        (
            Self {
                stop_tx,
                task: Some(task),
            },
            event_rx,
        )
    }

    /// Returns true while the task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops polling and waits for the task to end.
    #[instrument(skip(self))]
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Lobby task ended abnormally");
            }
        }
    }
}

impl Drop for LobbyWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[instrument(skip(source, stop_rx, event_tx))]
async fn watch_loop<S: LobbySource>(
    source: S,
    viewer_id: PlayerId,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
    event_tx: mpsc::UnboundedSender<LobbyEvent>,
) {
    info!("Watching lobby");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Lobby> = None;
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => return,
            _ = ticker.tick() => {}
        }

        let event = match source.fetch_lobby().await {
            Ok(lobby) => {
                failures = 0;
                if *lobby.is_game_started() {
                    if let Some(game_id) = lobby.game_id().clone() {
                        info!(game_id = %game_id, "Game started");
                        let _ = event_tx.send(LobbyEvent::GameStarted { game_id });
                        return;
                    }
                    warn!("Lobby reports a started game without a game id");
                }
                if last.as_ref() == Some(&lobby) {
                    debug!("Lobby unchanged");
                    continue;
                }
                let role = LobbyRole::of(&lobby, &viewer_id);
                debug!(players = lobby.players().len(), role = %role, "Lobby changed");
                last = Some(lobby.clone());
                LobbyEvent::Updated { lobby, role }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(error = %e, consecutive = failures, "Failed to poll lobby");
                LobbyEvent::FetchFailed {
                    consecutive: failures,
                    message: e.to_string(),
                }
            }
        };

        if event_tx.send(event).is_err() {
            return;
        }
    }
}
