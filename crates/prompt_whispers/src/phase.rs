//! Game phases as reported by the backend, and the one table every
//! phase-dependent decision in the client is read from.
//!
//! The client never computes a transition. It only reacts to the phase in
//! the latest snapshot, so everything here is a pure lookup.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tracing::instrument;

/// Phase of a game, mirroring the backend's `gameState`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Game created, nobody has submitted anything yet.
    New,
    /// Every player owes a fresh prompt.
    RequestNewPrompts,
    /// Waiting for the remaining players to submit prompts.
    WaitForPrompts,
    /// Prompts are in, images are being generated.
    WaitForImages,
    /// Terminal.
    Finished,
}

/// What the polling loop does after seeing a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PollDirective {
    /// Fetch again after the poll interval.
    Continue,
    /// Stop fetching until the viewer submits a prompt.
    Pause,
    /// Stop fetching for good.
    Stop,
}

/// Per-phase behaviour of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    /// Polling behaviour.
    pub poll: PollDirective,
    /// Whether the prompt input accepts text.
    pub accepts_input: bool,
    /// Whether an image for the last prompt is still being produced.
    pub image_pending: bool,
}

impl GamePhase {
    /// Looks up this phase's row in the policy table.
    #[instrument]
    pub fn policy(self) -> PhasePolicy {
        use PollDirective::*;
        let (poll, accepts_input, image_pending) = match self {
            GamePhase::New => (Continue, false, false),
            GamePhase::RequestNewPrompts => (Pause, true, false),
            GamePhase::WaitForPrompts => (Continue, false, true),
            GamePhase::WaitForImages => (Continue, false, true),
            GamePhase::Finished => (Stop, false, false),
        };
        PhasePolicy {
            poll,
            accepts_input,
            image_pending,
        }
    }

    /// Returns true if the backend is expected to move from `self` to `next`.
    ///
    /// Staying in the same phase is always expected.
    #[instrument]
    pub fn can_transition_to(self, next: GamePhase) -> bool {
        use GamePhase::*;
        if self == next {
            return true;
        }
        match self {
            New => matches!(next, RequestNewPrompts | WaitForPrompts | Finished),
            RequestNewPrompts => matches!(next, WaitForPrompts | WaitForImages | Finished),
            WaitForPrompts => matches!(next, RequestNewPrompts | WaitForImages | Finished),
            WaitForImages => matches!(next, RequestNewPrompts | WaitForPrompts | Finished),
            Finished => false,
        }
    }

    /// Returns true for the terminal phase.
    pub fn is_terminal(self) -> bool {
        self.policy().poll == PollDirective::Stop
    }
}
