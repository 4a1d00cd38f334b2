//! ActionController - single-flight action execution with live logs
//!
//! The controller is one task that owns all invocation state. Triggers from
//! the host, frames from the log stream, the invoker's result and the user's
//! dismissal all arrive as [`ControllerEvent`]s on one channel, so the two
//! completion sources (outcome and dismissal) are joined with plain flags
//! instead of locks or nested callbacks.

mod state;


pub use state::ControllerPhase;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::action::{ActionRequest, Confirmation, CorrelationToken, FormPayload, TriggerElement};
use crate::error::{ActionError, Result};
use crate::invoker::{ActionSubmitter, Submission};
use crate::presentation::{HeadlessPresenter, Presenter};
use crate::streams::{CommandSink, LogCommand, LogStreamEvent, LogStreamOpener};

use state::{ControllerState, Invocation};

/// `(action_name, trigger, message)`
pub type ResultCallback = Box<dyn FnMut(&str, &TriggerElement, &str) + Send>;

/// Host callbacks; exactly one of them runs per resolved invocation
pub struct ResultCallbacks {
    on_success: ResultCallback,
    on_error: ResultCallback,
}

impl ResultCallbacks {
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnMut(&str, &TriggerElement, &str) + Send + 'static,
        E: FnMut(&str, &TriggerElement, &str) + Send + 'static,
    {
        Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        }
    }
}

#[derive(Debug)]
pub enum ControllerEvent {
    /// Direct trigger, no confirmation
    Trigger(ActionRequest),
    /// Confirmation-gated trigger; the host shows the dialog
    RequestConfirmation(ActionRequest, Confirmation),
    /// Dialog submitted, with the dialog's form contents if it had a form
    Confirm(Option<FormPayload>),
    CancelConfirmation,
    Stream {
        token: CorrelationToken,
        event: LogStreamEvent,
    },
    Submitted {
        token: CorrelationToken,
        submission: Submission,
    },
    /// The user closed the waiting UI
    Dismissed,
    Shutdown,
}

/// Cloneable sender side used by the host and the presenter
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ControllerHandle {
    fn send(&self, event: ControllerEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| ActionError::ChannelClosed)
    }

    pub fn trigger(&self, request: ActionRequest) -> Result<()> {
        self.send(ControllerEvent::Trigger(request))
    }

    pub fn request_confirmation(&self, request: ActionRequest, confirmation: Confirmation) -> Result<()> {
        self.send(ControllerEvent::RequestConfirmation(request, confirmation))
    }

    pub fn confirm(&self, form: Option<FormPayload>) -> Result<()> {
        self.send(ControllerEvent::Confirm(form))
    }

    pub fn cancel_confirmation(&self) -> Result<()> {
        self.send(ControllerEvent::CancelConfirmation)
    }

    pub fn dismiss(&self) -> Result<()> {
        self.send(ControllerEvent::Dismissed)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ControllerEvent::Shutdown)
    }

    /// Handle wired to a bare receiver, for exercising presenters alone
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

pub struct ActionController {
    state: ControllerState,
    presenter: Box<dyn Presenter>,
    submitter: Arc<dyn ActionSubmitter>,
    opener: Arc<dyn LogStreamOpener>,
    callbacks: ResultCallbacks,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ControllerEvent>>,
}

impl ActionController {
    /// Starts with a [`HeadlessPresenter`], which closes finalized logs on its
    /// own. Hosts that show UI attach their presenter with
    /// [`ActionController::with_presenter`], usually after handing it a
    /// [`ControllerHandle`] so it can report dismissal.
    pub fn new(
        submitter: Arc<dyn ActionSubmitter>,
        opener: Arc<dyn LogStreamOpener>,
        callbacks: ResultCallbacks,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let headless = HeadlessPresenter::new(ControllerHandle {
            tx: event_tx.clone(),
        });
        Self {
            state: ControllerState::Idle,
            presenter: Box::new(headless),
            submitter,
            opener,
            callbacks,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.event_tx.clone(),
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.state.phase()
    }

    /// Token of the invocation in flight, if any
    pub fn current_token(&self) -> Option<&CorrelationToken> {
        match &self.state {
            ControllerState::InFlight(inv) => Some(&inv.token),
            _ => None,
        }
    }

    pub fn pending_confirmation(&self) -> Option<&Confirmation> {
        match &self.state {
            ControllerState::AwaitingConfirmation { confirmation, .. } => Some(confirmation),
            _ => None,
        }
    }

    /// Process events until shutdown or until a custom response unloads the page
    pub async fn run(mut self) {
        let Some(mut event_rx) = self.event_rx.take() else {
            tracing::error!("Controller event receiver already taken");
            return;
        };

        while let Some(event) = event_rx.recv().await {
            if matches!(event, ControllerEvent::Shutdown) {
                self.shutdown();
                break;
            }
            self.handle_event(event);
            if matches!(self.state, ControllerState::Unloaded) {
                break;
            }
        }
        tracing::debug!("Action controller stopped ({})", self.phase());
    }

    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Trigger(request) => self.on_trigger(request),
            ControllerEvent::RequestConfirmation(request, confirmation) => {
                self.on_request_confirmation(request, confirmation)
            }
            ControllerEvent::Confirm(form) => self.on_confirm(form),
            ControllerEvent::CancelConfirmation => self.on_cancel_confirmation(),
            ControllerEvent::Stream { token, event } => self.on_stream_event(&token, event),
            ControllerEvent::Submitted { token, submission } => self.on_submitted(&token, submission),
            ControllerEvent::Dismissed => self.on_dismissed(),
            ControllerEvent::Shutdown => self.shutdown(),
        }
    }

    fn on_trigger(&mut self, request: ActionRequest) {
        match &self.state {
            ControllerState::Idle => self.begin(request),
            ControllerState::InFlight(inv) => {
                tracing::warn!(
                    "Action '{}' already in progress, ignoring '{}'",
                    inv.request.name(),
                    request.name()
                );
            }
            ControllerState::AwaitingConfirmation { request: pending, .. } => {
                tracing::warn!(
                    "Confirmation for '{}' is open, ignoring '{}'",
                    pending.name(),
                    request.name()
                );
            }
            ControllerState::Unloaded => {
                tracing::debug!("Page unloaded, ignoring '{}'", request.name());
            }
        }
    }

    fn on_request_confirmation(&mut self, request: ActionRequest, confirmation: Confirmation) {
        match &self.state {
            // Re-opening the dialog replaces whatever it showed before
            ControllerState::Idle | ControllerState::AwaitingConfirmation { .. } => {
                tracing::debug!("Awaiting confirmation for '{}'", request.name());
                self.state = ControllerState::AwaitingConfirmation {
                    request,
                    confirmation,
                };
            }
            ControllerState::InFlight(inv) => {
                tracing::warn!(
                    "Action '{}' already in progress, ignoring confirmation for '{}'",
                    inv.request.name(),
                    request.name()
                );
            }
            ControllerState::Unloaded => {}
        }
    }

    fn on_confirm(&mut self, form: Option<FormPayload>) {
        match std::mem::replace(&mut self.state, ControllerState::Idle) {
            ControllerState::AwaitingConfirmation { request, .. } => {
                let request = match form {
                    Some(form) => request.with_form(form),
                    None => request,
                };
                self.begin(request);
            }
            other => {
                tracing::warn!("Confirm received with no pending confirmation");
                self.state = other;
            }
        }
    }

    fn on_cancel_confirmation(&mut self) {
        if let ControllerState::AwaitingConfirmation { request, .. } = &self.state {
            tracing::debug!("Confirmation for '{}' cancelled", request.name());
            self.state = ControllerState::Idle;
        }
    }

    /// Idle -> InFlight
    fn begin(&mut self, request: ActionRequest) {
        let token = CorrelationToken::mint();
        tracing::info!("Starting action '{}' (key {})", request.name(), token);

        let stream = self.opener.open(&token, self.stream_sink(token.clone()));
        self.presenter.enter_waiting_mode(false);

        let submitter = self.submitter.clone();
        let event_tx = self.event_tx.clone();
        let task_request = request.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let submission = submitter.submit(&task_request, &task_token).await;
            let _ = event_tx.send(ControllerEvent::Submitted {
                token: task_token,
                submission,
            });
        });

        self.state = ControllerState::InFlight(Invocation::new(token, request, stream));
    }

    fn stream_sink(&self, token: CorrelationToken) -> CommandSink {
        let event_tx = self.event_tx.clone();
        Arc::new(move |event| {
            let _ = event_tx.send(ControllerEvent::Stream {
                token: token.clone(),
                event,
            });
        })
    }

    fn on_stream_event(&mut self, token: &CorrelationToken, event: LogStreamEvent) {
        let inv = match &mut self.state {
            ControllerState::InFlight(inv) if inv.token == *token => inv,
            _ => {
                tracing::debug!("Dropping log stream event for stale key {}", token);
                return;
            }
        };

        match event {
            LogStreamEvent::Connected => {
                tracing::debug!("Log stream connected for '{}'", inv.request.name());
            }
            LogStreamEvent::Command(command) => match command {
                LogCommand::Start => {
                    inv.streaming = true;
                    self.presenter.enter_waiting_mode(true);
                }
                LogCommand::Log(text) => self.presenter.append_log_line(&text),
                LogCommand::UseSteps => self.presenter.enable_step_progress(),
                LogCommand::Step(percent) => self.presenter.set_step_progress(percent),
                LogCommand::Finalize => {
                    self.presenter.enable_final_controls();
                    inv.close_stream();
                }
                LogCommand::Unknown(tag) => {
                    tracing::warn!("Unknown log command received: {}", tag);
                }
            },
            LogStreamEvent::Disconnected(reason) => {
                if inv.stream.is_some() {
                    tracing::warn!(
                        "Log stream for '{}' dropped: {}",
                        inv.request.name(),
                        reason.as_deref().unwrap_or("no reason")
                    );
                    self.end_log_early();
                }
            }
            LogStreamEvent::Error(e) => {
                tracing::warn!("Log stream for '{}' failed: {}", inv.request.name(), e);
                self.end_log_early();
            }
        }
    }

    /// The stream ended without `finalize`. A log that is already on screen
    /// gets its close controls so dismissal, and with it resolution, can
    /// still happen.
    fn end_log_early(&mut self) {
        let ControllerState::InFlight(inv) = &mut self.state else {
            return;
        };
        if inv.stream.is_none() {
            return;
        }
        inv.close_stream();
        if inv.streaming {
            self.presenter.enable_final_controls();
        }
    }

    fn on_submitted(&mut self, token: &CorrelationToken, submission: Submission) {
        let inv = match &mut self.state {
            ControllerState::InFlight(inv) if inv.token == *token => inv,
            _ => {
                tracing::warn!("Dropping outcome for stale key {}", token);
                return;
            }
        };

        match submission {
            Submission::Navigated => {
                tracing::info!(
                    "Action '{}' answered with a custom response, unloading",
                    inv.request.name()
                );
                self.presenter.dismiss();
                // The stream is abandoned with the page, not closed
                self.state = ControllerState::Unloaded;
            }
            Submission::Completed(outcome) => {
                tracing::debug!(
                    "Outcome for '{}' recorded (error: {})",
                    inv.request.name(),
                    outcome.is_error
                );
                inv.outcome = Some(outcome);
                if !inv.streaming && !inv.dismissed {
                    self.presenter.dismiss();
                    inv.dismissed = true;
                    inv.close_stream();
                }
                self.try_resolve();
            }
        }
    }

    fn on_dismissed(&mut self) {
        match &mut self.state {
            ControllerState::InFlight(inv) if !inv.dismissed => {
                tracing::debug!("Waiting UI for '{}' dismissed", inv.request.name());
                inv.dismissed = true;
                self.try_resolve();
            }
            _ => {}
        }
    }

    /// InFlight -> Resolved -> Idle, once outcome and dismissal are both in
    fn try_resolve(&mut self) {
        let resolvable = matches!(&self.state, ControllerState::InFlight(inv) if inv.is_resolvable());
        if !resolvable {
            return;
        }

        let ControllerState::InFlight(mut inv) =
            std::mem::replace(&mut self.state, ControllerState::Idle)
        else {
            return;
        };
        inv.close_stream();

        let Some(outcome) = inv.outcome.take() else {
            return;
        };
        tracing::info!(
            "Action '{}' resolved after {:?} (error: {})",
            outcome.action_name,
            inv.started.elapsed(),
            outcome.is_error
        );

        if outcome.is_error {
            (self.callbacks.on_error)(&outcome.action_name, &outcome.trigger, &outcome.message);
        } else {
            (self.callbacks.on_success)(&outcome.action_name, &outcome.trigger, &outcome.message);
        }
    }

    fn shutdown(&mut self) {
        if let ControllerState::InFlight(inv) = &mut self.state {
            tracing::warn!("Shutting down with '{}' still in flight", inv.request.name());
            inv.close_stream();
            self.presenter.dismiss();
        }
        self.state = ControllerState::Idle;
    }
}
