//! Derives the viewer's state from game snapshots.
//!
//! Every derivation here is a pure function of the latest snapshot plus a
//! little local state (prompt text, input flag). Applying the same snapshot
//! twice yields the same view.

use derive_getters::Getters;
use tracing::{debug, info, instrument, warn};

use crate::error::PromptError;
use crate::model::{Game, PlayerId, PromptCreate, Turn};
use crate::phase::{GamePhase, PollDirective};

/// Longest prompt the client will submit, in characters.
pub const MAX_PROMPT_CHARS: usize = 140;

/// Which round the viewer should be looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundIndex {
    /// The snapshot cannot place the viewer yet.
    NotReady,
    /// Index into `Game::rounds`.
    Ready(usize),
}

impl RoundIndex {
    /// Returns the index if ready.
    pub fn get(self) -> Option<usize> {
        match self {
            RoundIndex::Ready(i) => Some(i),
            RoundIndex::NotReady => None,
        }
    }
}

/// Number of full cycles completed: the fewest images in any round.
///
/// Returns 0 while the game is not fully initialized.
#[instrument(skip(game), fields(game_id = %game.id()))]
pub fn completed_image_turns(game: &Game) -> usize {
    if !game.is_initialized() {
        debug!(
            players = game.players().len(),
            rounds = game.rounds().len(),
            "Game not initialized, no completed cycles"
        );
        return 0;
    }

    game.rounds()
        .iter()
        .map(|turns| turns.iter().filter(|t| t.is_image()).count())
        .min()
        .unwrap_or(0)
}

/// Round-robin rotation: `(player_index + completed) mod player_count`.
///
/// Returns `None` when there are no players.
#[instrument]
pub fn round_index(player_index: usize, completed: usize, player_count: usize) -> Option<usize> {
    if player_count == 0 {
        return None;
    }
    Some((player_index % player_count + completed % player_count) % player_count)
}

/// Locates the round the given viewer should see in this snapshot.
#[instrument(skip(game), fields(game_id = %game.id()))]
pub fn active_round(game: &Game, viewer_id: &str) -> RoundIndex {
    if !game.is_initialized() {
        return RoundIndex::NotReady;
    }
    let Some(player_index) = game.player_index(viewer_id) else {
        warn!(viewer_id, "Viewer is not a player in this game");
        return RoundIndex::NotReady;
    };
    match round_index(player_index, completed_image_turns(game), game.players().len()) {
        Some(i) => RoundIndex::Ready(i),
        None => RoundIndex::NotReady,
    }
}

/// Returns the last turn if it is an image that can be shown.
///
/// A prompt always precedes its image, so a round needs two turns before it
/// can end in one. While prompts or images are pending the previous image
/// is hidden.
#[instrument(skip(turns), fields(turns = turns.len(), phase = %phase))]
pub fn last_displayable_image(turns: &[Turn], phase: GamePhase) -> Option<&Turn> {
    if turns.len() < 2 || phase.policy().image_pending {
        return None;
    }
    turns.last().filter(|t| t.is_image())
}

/// True when the backend says so, or when every round has an image per player.
#[instrument(skip(game), fields(game_id = %game.id()))]
pub fn is_game_finished(game: &Game) -> bool {
    if *game.game_state() == GamePhase::Finished {
        return true;
    }
    let player_count = game.players().len();
    player_count > 0 && completed_image_turns(game) >= player_count
}

/// Everything a view needs to render one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ViewState {
    /// Phase reported by the backend.
    phase: GamePhase,
    /// Round the viewer is looking at.
    round_index: RoundIndex,
    /// Turns of that round, empty when not ready.
    active_turns: Vec<Turn>,
    /// Image to show, if any.
    last_image: Option<Turn>,
    /// Whether the prompt input accepts text.
    input_enabled: bool,
    /// Current prompt text.
    prompt: String,
    /// Cycles completed by the slowest round.
    completed_image_turns: usize,
    /// Whether the game is over.
    finished: bool,
    /// What the polling loop should do next.
    poll: PollDirective,
    /// Fetches failed since the last successful one.
    consecutive_failures: u32,
}

/// Holds the latest snapshot and the viewer's local state.
#[derive(Debug, Clone)]
pub struct RoundStateReconciler {
    viewer_id: PlayerId,
    snapshot: Option<Game>,
    prompt: String,
    input_enabled: bool,
    max_completed: usize,
    submitted_at_cycle: Option<usize>,
    consecutive_failures: u32,
}

impl RoundStateReconciler {
    /// Creates a reconciler for the given viewer with no snapshot yet.
    #[instrument]
    pub fn new(viewer_id: PlayerId) -> Self {
        Self {
            viewer_id,
            snapshot: None,
            prompt: String::new(),
            input_enabled: false,
            max_completed: 0,
            submitted_at_cycle: None,
            consecutive_failures: 0,
        }
    }

    /// The viewer this reconciler derives state for.
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Latest snapshot received.
    pub fn snapshot(&self) -> Option<&Game> {
        self.snapshot.as_ref()
    }

    /// Replaces the snapshot and returns the derived view.
    ///
    /// The most recently received snapshot always wins, even if it looks
    /// older than the previous one.
    #[instrument(skip(self, game), fields(viewer_id = %self.viewer_id, game_id = %game.id(), phase = %game.game_state()))]
    pub fn apply(&mut self, game: Game) -> ViewState {
        let phase = *game.game_state();
        let completed = completed_image_turns(&game);
        let previous_phase = self.snapshot.as_ref().map(|g| *g.game_state());

        if let Some(prev) = previous_phase {
            if !prev.can_transition_to(phase) {
                warn!(from = %prev, to = %phase, "Unexpected phase transition");
            }
        }

        if completed < self.max_completed {
            warn!(
                completed,
                max_completed = self.max_completed,
                "Completed image turns regressed, snapshot is older than a previous one"
            );
        } else {
            self.max_completed = completed;
        }

        if phase.policy().accepts_input {
            let entered = previous_phase != Some(phase);
            let new_cycle = self.submitted_at_cycle.is_some_and(|c| completed > c);
            if (entered || new_cycle) && !self.input_enabled {
                info!(completed, "New prompt requested");
                self.prompt.clear();
                self.input_enabled = true;
                self.submitted_at_cycle = None;
            }
        } else {
            self.input_enabled = false;
        }

        self.consecutive_failures = 0;
        let view = self.derive(&game);
        self.snapshot = Some(game);
        view
    }

    /// Records a failed fetch. The previous snapshot stays in place.
    #[instrument(skip(self), fields(viewer_id = %self.viewer_id))]
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// Replaces the prompt text. Ignored while input is disabled.
    #[instrument(skip(self, text), fields(viewer_id = %self.viewer_id))]
    pub fn edit_prompt(&mut self, text: impl Into<String>) -> bool {
        if !self.input_enabled {
            return false;
        }
        self.prompt = text.into();
        true
    }

    /// Validates the prompt and disables input until the next request.
    ///
    /// Fails with [`PromptError::NotRequested`] while input is disabled.
    /// The prompt is trimmed before checking its length.
    #[instrument(skip(self, text), fields(viewer_id = %self.viewer_id))]
    pub fn begin_submit(&mut self, text: &str) -> Result<PromptCreate, PromptError> {
        if !self.input_enabled {
            return Err(PromptError::NotRequested);
        }
        let prompt = validate_prompt(text)?;
        self.prompt = prompt.clone();
        self.input_enabled = false;
        self.submitted_at_cycle = Some(self.max_completed);
        info!(chars = prompt.chars().count(), "Prompt submitted");
        Ok(PromptCreate::new(prompt))
    }

    /// Undoes [`begin_submit`](Self::begin_submit) after the backend rejected it.
    #[instrument(skip(self), fields(viewer_id = %self.viewer_id))]
    pub fn submit_failed(&mut self) {
        let still_requested = self
            .snapshot
            .as_ref()
            .is_some_and(|g| g.game_state().policy().accepts_input);
        if still_requested {
            self.input_enabled = true;
            self.submitted_at_cycle = None;
        }
    }

    /// Derived view of the current snapshot, if any.
    #[instrument(skip(self), fields(viewer_id = %self.viewer_id))]
    pub fn view(&self) -> Option<ViewState> {
        self.snapshot.as_ref().map(|game| self.derive(game))
    }

    fn derive(&self, game: &Game) -> ViewState {
        let phase = *game.game_state();
        let completed = completed_image_turns(game);
        let round_index = active_round(game, &self.viewer_id);
        let active_turns = round_index
            .get()
            .and_then(|i| game.rounds().get(i))
            .cloned()
            .unwrap_or_default();
        let last_image = last_displayable_image(&active_turns, phase).cloned();
        let finished = is_game_finished(game);

        let poll = if finished {
            PollDirective::Stop
        } else {
            match phase.policy().poll {
                // Already submitted: keep polling until the next request arrives.
                PollDirective::Pause if !self.input_enabled => PollDirective::Continue,
                other => other,
            }
        };

        ViewState {
            phase,
            round_index,
            active_turns,
            last_image,
            input_enabled: self.input_enabled && !finished,
            prompt: self.prompt.clone(),
            completed_image_turns: completed,
            finished,
            poll,
            consecutive_failures: self.consecutive_failures,
        }
    }
}

/// Trims a prompt and checks it against [`MAX_PROMPT_CHARS`].
#[instrument(skip(text), fields(chars = text.chars().count()))]
pub fn validate_prompt(text: &str) -> Result<String, PromptError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PromptError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_PROMPT_CHARS {
        return Err(PromptError::TooLong {
            len,
            max: MAX_PROMPT_CHARS,
        });
    }
    Ok(trimmed.to_string())
}
