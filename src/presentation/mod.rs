//! Presentation adapter
//!
//! The controller drives the waiting UI only through this trait, so hosts
//! can render it however they like. All calls are synchronous and happen on
//! the controller task.

mod terminal;

use crate::controller::ControllerHandle;

pub use terminal::{TerminalPresenter, TerminalPresenterOptions};

pub trait Presenter: Send {
    /// Show the waiting UI. `streaming_expected` selects the full log view;
    /// without it a compact spinner is shown.
    fn enter_waiting_mode(&mut self, streaming_expected: bool);

    fn append_log_line(&mut self, text: &str);

    fn enable_step_progress(&mut self);

    fn set_step_progress(&mut self, percent: u8);

    /// Reveal the close and copy controls once the log is complete
    fn enable_final_controls(&mut self);

    /// Hide the waiting UI
    fn dismiss(&mut self);
}

/// Renders nothing and closes the log as soon as it is finalized. Used when
/// no host UI is attached.
#[derive(Clone)]
pub struct HeadlessPresenter {
    handle: ControllerHandle,
}

impl HeadlessPresenter {
    pub fn new(handle: ControllerHandle) -> Self {
        Self { handle }
    }
}

impl Presenter for HeadlessPresenter {
    fn enter_waiting_mode(&mut self, _streaming_expected: bool) {}

    fn append_log_line(&mut self, text: &str) {
        tracing::debug!("action log: {}", text);
    }

    fn enable_step_progress(&mut self) {}

    fn set_step_progress(&mut self, _percent: u8) {}

    fn enable_final_controls(&mut self) {
        if self.handle.dismiss().is_err() {
            tracing::debug!("Controller gone before the log could be closed");
        }
    }

    fn dismiss(&mut self) {}
}
