//! Crossterm frontend: raw-mode terminal lifecycle, the input thread, and
//! presenting the cell grid through the diff presenter.

use std::io::stdout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Sender;
use crossterm::{
    cursor::{Hide, Show},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use tracing::{debug, warn};

use pat_editor::{EditorMsg, Frontend};
use pat_events::Event;
use pat_render::{ColorMode, FrameBuffer, Presenter};

use crate::translate::translate;

const INPUT_POLL: Duration = Duration::from_millis(100);

pub struct CrosstermFrontend {
    presenter: Presenter,
    entered: bool,
    input_thread: Option<std::thread::JoinHandle<()>>,
}

impl CrosstermFrontend {
    pub fn new() -> Self {
        Self {
            presenter: Presenter::new(detect_color_mode()),
            entered: false,
            input_thread: None,
        }
    }
}

impl Default for CrosstermFrontend {
    fn default() -> Self {
        Self::new()
    }
}

/// Truecolor terminals advertise themselves via COLORTERM; everything else
/// gets the xterm-256 palette.
fn detect_color_mode() -> ColorMode {
    match std::env::var("COLORTERM") {
        Ok(value) if value.contains("truecolor") || value.contains("24bit") => {
            ColorMode::TrueColor
        }
        _ => ColorMode::Xterm256,
    }
}

impl Frontend for CrosstermFrontend {
    fn initialize(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, EnableMouseCapture, Hide)?;
            self.entered = true;
            self.presenter.invalidate();
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        if let Some(handle) = self.input_thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn size(&self) -> (usize, usize) {
        match crossterm::terminal::size() {
            Ok((w, h)) => (w as usize, h as usize),
            Err(_) => (80, 24),
        }
    }

    fn present(&mut self, buffer: &FrameBuffer) -> Result<()> {
        let mut out = stdout().lock();
        self.presenter.present(buffer, &mut out)?;
        Ok(())
    }

    fn spawn_input(&mut self, sender: Sender<EditorMsg>, running: Arc<AtomicBool>) -> Result<()> {
        let handle = std::thread::Builder::new()
            .name("input".to_string())
            .spawn(move || {
                debug!(target: "term.input", "input thread started");
                while running.load(Ordering::Acquire) {
                    match crossterm::event::poll(INPUT_POLL) {
                        Ok(false) => continue,
                        Ok(true) => {}
                        Err(err) => {
                            warn!(target: "term.input", %err, "event poll failed");
                            break;
                        }
                    }
                    match crossterm::event::read() {
                        Ok(native) => {
                            if let Some(event) = translate(native) {
                                let close = matches!(event, Event::Close);
                                if sender.send(EditorMsg::Input(event)).is_err() || close {
                                    break;
                                }
                            }
                        }
                        Err(err) => {
                            warn!(target: "term.input", %err, "event read failed");
                            break;
                        }
                    }
                }
                debug!(target: "term.input", "input thread stopped");
            })?;
        self.input_thread = Some(handle);
        Ok(())
    }
}

impl Drop for CrosstermFrontend {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
