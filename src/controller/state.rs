use std::fmt;
use std::time::Instant;

use crate::action::{ActionOutcome, ActionRequest, Confirmation, CorrelationToken};
use crate::streams::LogStream;

/// Everything the controller owns for the one invocation in flight
pub(crate) struct Invocation {
    pub token: CorrelationToken,
    pub request: ActionRequest,
    pub stream: Option<Box<dyn LogStream>>,
    /// A `start` frame arrived; the UI is in full log mode
    pub streaming: bool,
    pub outcome: Option<ActionOutcome>,
    pub dismissed: bool,
    pub started: Instant,
}

impl Invocation {
    pub fn new(token: CorrelationToken, request: ActionRequest, stream: Box<dyn LogStream>) -> Self {
        Self {
            token,
            request,
            stream: Some(stream),
            streaming: false,
            outcome: None,
            dismissed: false,
            started: Instant::now(),
        }
    }

    pub fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }

    /// Both completion sources have reported
    pub fn is_resolvable(&self) -> bool {
        self.outcome.is_some() && self.dismissed
    }
}

pub(crate) enum ControllerState {
    Idle,
    AwaitingConfirmation {
        request: ActionRequest,
        confirmation: Confirmation,
    },
    InFlight(Invocation),
    /// A custom response replaced the page; nothing more happens here
    Unloaded,
}

impl ControllerState {
    pub fn phase(&self) -> ControllerPhase {
        match self {
            ControllerState::Idle => ControllerPhase::Idle,
            ControllerState::AwaitingConfirmation { .. } => ControllerPhase::AwaitingConfirmation,
            ControllerState::InFlight(inv) => ControllerPhase::InFlight {
                streaming: inv.streaming,
            },
            ControllerState::Unloaded => ControllerPhase::Unloaded,
        }
    }
}

/// Observable view of the controller state.
///
/// `Resolved` is not listed: resolution delivers the result callback and
/// returns to `Idle` while handling a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    AwaitingConfirmation,
    InFlight { streaming: bool },
    Unloaded,
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerPhase::Idle => write!(f, "idle"),
            ControllerPhase::AwaitingConfirmation => write!(f, "awaiting confirmation"),
            ControllerPhase::InFlight { streaming: false } => write!(f, "in flight"),
            ControllerPhase::InFlight { streaming: true } => write!(f, "in flight (streaming)"),
            ControllerPhase::Unloaded => write!(f, "unloaded"),
        }
    }
}
