//! Timer-driven polling of a game, owned by the view that shows it.
//!
//! A [`GamePoller`] owns one tokio task. The task fetches a snapshot, hands
//! it to the [`RoundStateReconciler`] and reports the derived view. It
//! pauses while a prompt is requested, resumes after the viewer submits,
//! and ends by itself once the game is finished. Stopping or dropping the
//! handle ends the task, so no fetch outlives the view.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::client::RestGameClient;
use crate::error::ApiError;
use crate::model::{Game, GameId, PromptCreate};
use crate::phase::PollDirective;
use crate::reconciler::{RoundStateReconciler, ViewState};

/// Where snapshots come from, and where local submissions go.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the current game snapshot.
    async fn fetch(&self) -> Result<Game, ApiError>;

    /// Submits the viewer's prompt.
    async fn submit_prompt(&self, prompt: &PromptCreate) -> Result<(), ApiError>;

    /// Triggers image generation for the viewer's most recent prompt.
    async fn request_image(&self) -> Result<(), ApiError>;
}

/// [`SnapshotSource`] backed by the REST API.
#[derive(Debug, Clone)]
pub struct RestSnapshotSource {
    client: RestGameClient,
    game_id: GameId,
}

impl RestSnapshotSource {
    /// Polls the given game through `client`.
    pub fn new(client: RestGameClient, game_id: impl Into<GameId>) -> Self {
        Self {
            client,
            game_id: game_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for RestSnapshotSource {
    async fn fetch(&self) -> Result<Game, ApiError> {
        self.client.get_game(&self.game_id).await
    }

    async fn submit_prompt(&self, prompt: &PromptCreate) -> Result<(), ApiError> {
        self.client.submit_prompt(&self.game_id, prompt).await?;
        Ok(())
    }

    async fn request_image(&self) -> Result<(), ApiError> {
        self.client.generate_image(&self.game_id).await?;
        Ok(())
    }
}

/// Messages sent from the poller to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A snapshot arrived.
    ViewChanged(ViewState),
    /// A prompt is requested; polling waits for the viewer.
    Paused(ViewState),
    /// A fetch failed. The previous view still stands.
    FetchFailed {
        /// Failures in a row.
        consecutive: u32,
        /// Error text.
        message: String,
    },
    /// The viewer's prompt was rejected locally or by the backend.
    /// Input is as it was before the attempt.
    SubmitFailed {
        /// Error text.
        message: String,
    },
    /// The prompt was accepted but the image request failed. Input stays
    /// disabled and polling resumes; the backend still owns the round.
    ImageRequestFailed {
        /// Error text.
        message: String,
    },
    /// The game is over. Polling has stopped.
    Finished(ViewState),
}

enum PollCommand {
    Submit(String),
}

/// Shortest interval a poll task will tick at.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Clamps `interval` to [`MIN_POLL_INTERVAL`]; a zero period would panic the timer.
pub(crate) fn effective_interval(interval: Duration) -> Duration {
    if interval < MIN_POLL_INTERVAL {
        warn!(
            requested_ms = interval.as_millis() as u64,
            "Poll interval too short, clamping"
        );
        return MIN_POLL_INTERVAL;
    }
    interval
}

/// How a submission ended.
enum SubmitOutcome {
    /// Prompt and image request both went through.
    Accepted,
    /// The prompt never reached the round.
    Rejected(String),
    /// The prompt is in, but the image request failed.
    ImageFailed(String),
}

/// Handle to a running poll task.
#[derive(Debug)]
pub struct GamePoller {
    cmd_tx: mpsc::UnboundedSender<PollCommand>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl GamePoller {
    /// Spawns the poll task. The first fetch happens immediately.
    ///
    /// Intervals shorter than one millisecond are clamped.
    /// Must be called from within a tokio runtime.
    #[instrument(skip(source, reconciler), fields(viewer_id = %reconciler.viewer_id()))]
    pub fn start<S>(
        source: S,
        reconciler: RoundStateReconciler,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>)
    where
        S: SnapshotSource + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let interval = effective_interval(interval);

        info!(interval_ms = interval.as_millis() as u64, "Starting game poller");
        let task = tokio::spawn(poll_loop(
            source, reconciler, interval, cmd_rx, stop_rx, event_tx,
        ));

        (
            Self {
                cmd_tx,
                stop_tx,
                task: Some(task),
            },
            event_rx,
        )
    }

    /// Queues the viewer's prompt. Returns false if the task has ended.
    #[instrument(skip(self, text))]
    pub fn submit_prompt(&self, text: impl Into<String>) -> bool {
        self.cmd_tx.send(PollCommand::Submit(text.into())).is_ok()
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
                warn!(error = %e, "Poll task ended abnormally");
            }
        }
        info!("Game poller stopped");
    }
}

impl Drop for GamePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Aborting poll task on drop");
            task.abort();
        }
    }
}

#[instrument(skip_all, fields(viewer_id = %reconciler.viewer_id()))]
async fn poll_loop<S: SnapshotSource>(
    source: S,
    mut reconciler: RoundStateReconciler,
    interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
    mut stop_rx: watch::Receiver<bool>,
    event_tx: mpsc::UnboundedSender<PollEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut paused = false;
    let mut last_view: Option<ViewState> = None;

    loop {
        let event = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                info!("Stop requested");
                return;
            }
            cmd = cmd_rx.recv() => {
                let Some(PollCommand::Submit(text)) = cmd else {
                    return;
                };
                let outcome = submit(&source, &mut reconciler, &text, &event_tx).await;
                last_view = reconciler.view();
                match outcome {
                    SubmitOutcome::Accepted => {
                        paused = false;
                        ticker.reset_immediately();
                        continue;
                    }
                    SubmitOutcome::Rejected(message) => PollEvent::SubmitFailed { message },
                    SubmitOutcome::ImageFailed(message) => {
                        paused = false;
                        ticker.reset_immediately();
                        PollEvent::ImageRequestFailed { message }
                    }
                }
            }
            _ = ticker.tick(), if !paused => {
                match source.fetch().await {
                    Ok(game) => {
                        let view = reconciler.apply(game);
                        debug!(
                            phase = %view.phase(),
                            round_index = ?view.round_index(),
                            completed = view.completed_image_turns(),
                            poll = %view.poll(),
                            "Applied snapshot"
                        );
                        match *view.poll() {
                            PollDirective::Continue => {
                                if last_view.as_ref() == Some(&view) {
                                    debug!("View unchanged");
                                    continue;
                                }
                                last_view = Some(view.clone());
                                PollEvent::ViewChanged(view)
                            }
                            PollDirective::Pause => {
                                info!("Prompt requested, pausing");
                                paused = true;
                                last_view = Some(view.clone());
                                PollEvent::Paused(view)
                            }
                            PollDirective::Stop => {
                                info!("Game finished, poller done");
                                let _ = event_tx.send(PollEvent::Finished(view));
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let consecutive = reconciler.record_failure();
                        warn!(error = %e, consecutive, "Failed to poll server, keeping last snapshot");
                        PollEvent::FetchFailed {
                            consecutive,
                            message: e.to_string(),
                        }
                    }
                }
            }
        };

        if event_tx.send(event).is_err() {
            debug!("View dropped its receiver, ending poll task");
            return;
        }
    }
}

/// Submits a prompt and triggers its image.
///
/// Only a rejected prompt hands input back to the viewer. Once the prompt is
/// in, resubmitting would add a second prompt to the round.
async fn submit<S: SnapshotSource>(
    source: &S,
    reconciler: &mut RoundStateReconciler,
    text: &str,
    event_tx: &mpsc::UnboundedSender<PollEvent>,
) -> SubmitOutcome {
    let prompt = match reconciler.begin_submit(text) {
        Ok(prompt) => prompt,
        Err(e) => return SubmitOutcome::Rejected(e.to_string()),
    };
    if let Some(view) = reconciler.view() {
        let _ = event_tx.send(PollEvent::ViewChanged(view));
    }

    if let Err(e) = source.submit_prompt(&prompt).await {
        warn!(error = %e, "Prompt submission failed");
        reconciler.submit_failed();
        return SubmitOutcome::Rejected(e.to_string());
    }

    match source.request_image().await {
        Ok(()) => SubmitOutcome::Accepted,
        Err(e) => {
            warn!(error = %e, "Image request failed, prompt stays submitted");
            SubmitOutcome::ImageFailed(e.to_string())
        }
    }
}
