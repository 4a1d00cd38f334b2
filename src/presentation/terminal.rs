// Terminal rendition of the waiting dialog

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveTime};
use crossterm::style::Stylize;

use super::Presenter;
use crate::controller::ControllerHandle;

const PROGRESS_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPresenterOptions {
    /// Close the log as soon as it is finalized instead of waiting for Enter
    pub auto_dismiss: bool,
    /// Put the full transcript on the system clipboard once finalized
    pub copy_log_on_finalize: bool,
}

/// Shared between the presenter and its input thread. Enter only closes the
/// log while the presenter has armed it.
#[derive(Default)]
struct CloseKey {
    armed: AtomicBool,
    input_closed: AtomicBool,
}

impl CloseKey {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Returns false once the controller is gone
    fn line_entered(&self, handle: &ControllerHandle) -> bool {
        if self.armed.swap(false, Ordering::SeqCst) {
            return handle.dismiss().is_ok();
        }
        true
    }

    /// With no input left, an armed log closes right away and later ones
    /// never wait
    fn close_input(&self, handle: &ControllerHandle) {
        self.input_closed.store(true, Ordering::SeqCst);
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = handle.dismiss();
        }
    }
}

pub struct TerminalPresenter {
    handle: ControllerHandle,
    options: TerminalPresenterOptions,
    out: Box<dyn Write + Send>,
    input: Option<Box<dyn BufRead + Send>>,
    close_key: Arc<CloseKey>,
    transcript: Vec<String>,
    steps_enabled: bool,
    visible: bool,
}

impl TerminalPresenter {
    pub fn new(handle: ControllerHandle, options: TerminalPresenterOptions) -> Self {
        Self::with_writer(handle, options, Box::new(io::stderr()))
    }

    pub fn with_writer(
        handle: ControllerHandle,
        options: TerminalPresenterOptions,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            handle,
            options,
            out,
            input: Some(Box::new(io::BufReader::new(io::stdin()))),
            close_key: Arc::new(CloseKey::default()),
            transcript: Vec::new(),
            steps_enabled: false,
            visible: false,
        }
    }

    /// Read the close key from `input` instead of stdin
    pub fn with_input(mut self, input: Box<dyn BufRead + Send>) -> Self {
        self.input = Some(input);
        self
    }

    /// Log lines received so far, joined the way the copy action exports them
    pub fn transcript(&self) -> String {
        self.transcript.join("\n")
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
        let _ = self.out.flush();
    }

    fn copy_transcript(&mut self) {
        let text = self.transcript();
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        match result {
            Ok(()) => self.line("  log copied to clipboard".dim()),
            Err(e) => tracing::warn!("Clipboard write failed: {}", e),
        }
    }

    fn wait_for_close(&mut self) {
        // Armed before the closed check so a reader hitting end of input
        // concurrently still sees it
        self.close_key.arm();
        if self.close_key.input_closed.load(Ordering::SeqCst) {
            if self.close_key.armed.swap(false, Ordering::SeqCst) {
                let _ = self.handle.dismiss();
            }
            return;
        }
        self.line("  press Enter to close".dim());
        if let Some(input) = self.input.take() {
            spawn_input_reader(input, self.handle.clone(), self.close_key.clone());
        }
    }
}

/// One reader per presenter, reused by every invocation
fn spawn_input_reader(
    mut input: Box<dyn BufRead + Send>,
    handle: ControllerHandle,
    close_key: Arc<CloseKey>,
) {
    let reader = {
        let close_key = close_key.clone();
        let handle = handle.clone();
        move || {
            let mut line = String::new();
            loop {
                line.clear();
                match input.read_line(&mut line) {
                    Ok(0) => {
                        tracing::debug!("Terminal input closed");
                        close_key.close_input(&handle);
                        break;
                    }
                    Ok(_) => {
                        if !close_key.line_entered(&handle) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read terminal input: {}", e);
                        close_key.close_input(&handle);
                        break;
                    }
                }
            }
        }
    };

    if let Err(e) = std::thread::Builder::new()
        .name("actionctl-input".to_string())
        .spawn(reader)
    {
        tracing::warn!("Failed to start terminal input reader: {}", e);
        close_key.close_input(&handle);
    }
}

fn format_log_line(at: NaiveTime, text: &str) -> String {
    format!("  {} │ {}", at.format("%H:%M:%S"), text)
}

fn progress_bar(percent: u8) -> String {
    let filled = PROGRESS_WIDTH * usize::from(percent.min(100)) / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(PROGRESS_WIDTH - filled),
        percent
    )
}

impl Presenter for TerminalPresenter {
    fn enter_waiting_mode(&mut self, streaming_expected: bool) {
        self.close_key.disarm();
        self.transcript.clear();
        self.steps_enabled = false;
        self.visible = true;
        if streaming_expected {
            self.line("● action log".bold());
        } else {
            self.line("◌ running…".dim());
        }
    }

    fn append_log_line(&mut self, text: &str) {
        self.transcript.push(text.to_string());
        self.line(format_log_line(Local::now().time(), text));
    }

    fn enable_step_progress(&mut self) {
        self.steps_enabled = true;
        self.line(format!("  {}", progress_bar(0)).cyan());
    }

    fn set_step_progress(&mut self, percent: u8) {
        if self.steps_enabled {
            self.line(format!("  {}", progress_bar(percent)).cyan());
        }
    }

    fn enable_final_controls(&mut self) {
        self.line("✓ log complete".green());
        if self.options.copy_log_on_finalize {
            self.copy_transcript();
        }
        if self.options.auto_dismiss {
            let _ = self.handle.dismiss();
        } else {
            self.wait_for_close();
        }
    }

    fn dismiss(&mut self) {
        self.close_key.disarm();
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::controller::ControllerEvent;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn presenter(options: TerminalPresenterOptions) -> (TerminalPresenter, SharedBuf, tokio::sync::mpsc::UnboundedReceiver<ControllerEvent>) {
        let (handle, rx) = ControllerHandle::detached();
        let buf = SharedBuf::default();
        let presenter = TerminalPresenter::with_writer(handle, options, Box::new(buf.clone()));
        (presenter, buf, rx)
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", ".".repeat(PROGRESS_WIDTH)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(PROGRESS_WIDTH)));
        assert!(progress_bar(50).starts_with(&format!("[{}.", "#".repeat(15))));
    }

    #[test]
    fn test_transcript_and_step_gating() {
        let (mut presenter, buf, _rx) = presenter(TerminalPresenterOptions::default());

        presenter.enter_waiting_mode(true);
        presenter.set_step_progress(40);
        presenter.append_log_line("first");
        presenter.append_log_line("second");
        presenter.enable_step_progress();
        presenter.set_step_progress(50);

        assert_eq!(presenter.transcript(), "first\nsecond");
        let out = buf.text();
        assert!(out.contains("│ first"));
        assert!(!out.contains(" 40%"));
        assert!(out.contains(" 50%"));

        presenter.enter_waiting_mode(false);
        assert_eq!(presenter.transcript(), "");
    }

    #[test]
    fn test_auto_dismiss_on_finalize() {
        let (mut presenter, buf, mut rx) = presenter(TerminalPresenterOptions {
            auto_dismiss: true,
            copy_log_on_finalize: false,
        });

        presenter.enter_waiting_mode(true);
        presenter.enable_final_controls();

        assert!(matches!(rx.try_recv(), Ok(ControllerEvent::Dismissed)));
        assert!(buf.text().contains("log complete"));
    }

    #[test]
    fn test_log_lines_carry_timestamps() {
        let at = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
        assert_eq!(format_log_line(at, "copied 3 rows"), "  09:05:07 │ copied 3 rows");

        let (mut presenter, buf, _rx) = presenter(TerminalPresenterOptions::default());
        presenter.enter_waiting_mode(true);
        presenter.append_log_line("first");
        let out = buf.text();
        let logged = out.lines().find(|l| l.ends_with("│ first")).unwrap();
        let stamp = logged.trim_start().split(' ').next().unwrap();
        assert!(NaiveTime::parse_from_str(stamp, "%H:%M:%S").is_ok(), "{}", logged);
        // The copied transcript keeps the raw text
        assert_eq!(presenter.transcript(), "first");
    }

    #[test]
    fn test_close_key_only_fires_when_armed() {
        let (handle, mut rx) = ControllerHandle::detached();
        let key = CloseKey::default();

        assert!(key.line_entered(&handle));
        assert!(rx.try_recv().is_err());

        key.arm();
        assert!(key.line_entered(&handle));
        assert!(matches!(rx.try_recv(), Ok(ControllerEvent::Dismissed)));
        assert!(key.line_entered(&handle));
        assert!(rx.try_recv().is_err());

        key.arm();
        key.disarm();
        key.close_input(&handle);
        assert!(rx.try_recv().is_err());
        assert!(key.input_closed.load(Ordering::SeqCst));

        drop(rx);
        key.arm();
        assert!(!key.line_entered(&handle));
    }

    #[test]
    fn test_enter_closes_log_and_reader_is_reused() {
        let (handle, mut rx) = ControllerHandle::detached();
        let mut presenter = TerminalPresenter::with_writer(
            handle,
            TerminalPresenterOptions::default(),
            Box::new(io::sink()),
        )
        .with_input(Box::new(io::Cursor::new(b"\n".to_vec())));

        presenter.enter_waiting_mode(true);
        presenter.enable_final_controls();
        assert!(presenter.input.is_none());
        assert!(matches!(rx.blocking_recv(), Some(ControllerEvent::Dismissed)));

        // Input runs dry after the first line; the next log closes without
        // a second reader
        presenter.dismiss();
        presenter.enter_waiting_mode(true);
        presenter.enable_final_controls();
        assert!(matches!(rx.blocking_recv(), Some(ControllerEvent::Dismissed)));
    }

    #[test]
    fn test_dismiss_hides() {
        let (mut presenter, _buf, mut rx) = presenter(TerminalPresenterOptions::default());
        presenter.enter_waiting_mode(false);
        assert!(presenter.is_visible());
        presenter.dismiss();
        assert!(!presenter.is_visible());
        // Controller-initiated dismissal does not report back
        assert!(rx.try_recv().is_err());
    }
}
