//! External-process fuzzy finding.
//!
//! Two-phase IPC: an enumeration child fills the `total` list once, then
//! every query change spawns a fresh filter child that is fed `total` over
//! stdin and streams matches into `filters`. Spawning a new filter destroys
//! the previous one first, which kills its child: cancellation is
//! by-replacement. Both lists are mutex-guarded; the locks are never held
//! across IPC teardown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use pat_ipc::{Ipc, IpcOptions, OutputCallback};
use pat_text::Coord;

use crate::UiCommand;

/// Result lists shared with the IPC callback threads.
#[derive(Clone, Default)]
pub struct FinderShared {
    pub total: Arc<Mutex<Vec<String>>>,
    pub filters: Arc<Mutex<Vec<String>>>,
    pub changed: Arc<AtomicBool>,
    pub error: Arc<Mutex<Option<String>>>,
}

impl FinderShared {
    fn set_error(&self, message: String) {
        *self.error.lock().expect("error lock") = Some(message);
        self.changed.store(true, Ordering::Release);
    }
}

/// Accumulate chunk bytes until newlines and push whole lines into `target`.
/// Partial tails wait for the next chunk; empty lines are dropped.
fn line_collector(target: Arc<Mutex<Vec<String>>>, changed: Arc<AtomicBool>) -> OutputCallback {
    let mut pending = String::new();
    Box::new(move |chunk: &[u8]| {
        pending.push_str(&String::from_utf8_lossy(chunk));
        let mut new_lines = Vec::new();
        while let Some(nl) = pending.find('\n') {
            let line: String = pending.drain(..=nl).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                new_lines.push(line.to_string());
            }
        }
        if !new_lines.is_empty() {
            target.lock().expect("finder list lock").extend(new_lines);
            changed.store(true, Ordering::Release);
        }
    })
}

/// What a concrete finder runs and how it interprets a chosen line.
pub trait FinderBackend: Send {
    fn title(&self) -> &'static str;
    /// Enumeration phase, run once when the finder opens.
    fn start(&mut self, shared: &FinderShared);
    /// Filter phase, run on every query change.
    fn set_query(&mut self, shared: &FinderShared, query: &str);
    /// Interpret a selected result line.
    fn select(&self, line: &str) -> Option<UiCommand>;
}

pub struct Finder {
    shared: FinderShared,
    backend: Box<dyn FinderBackend>,
}

impl Finder {
    pub fn new(mut backend: Box<dyn FinderBackend>) -> Self {
        let shared = FinderShared::default();
        backend.start(&shared);
        Self { shared, backend }
    }

    pub fn title(&self) -> &'static str {
        self.backend.title()
    }

    pub fn set_query(&mut self, query: &str) {
        self.backend.set_query(&self.shared, query);
    }

    pub fn select(&self, line: &str) -> Option<UiCommand> {
        self.backend.select(line)
    }

    pub fn error(&self) -> Option<String> {
        self.shared.error.lock().expect("error lock").clone()
    }

    /// Run `f` over the current result list: `filters` when a query is
    /// active, the full enumeration otherwise. The lock is held only for
    /// the duration of `f`.
    pub fn with_items<R>(&self, query_active: bool, f: impl FnOnce(&[String]) -> R) -> R {
        let list = if query_active {
            self.shared.filters.lock().expect("filters lock")
        } else {
            self.shared.total.lock().expect("total lock")
        };
        f(&list)
    }

    /// True once per change; drives redraws.
    pub fn take_changed(&self) -> bool {
        self.shared.changed.swap(false, Ordering::AcqRel)
    }
}

// ----------------------------------------------------------------------
// Files finder: enumerate with `find`, narrow with `fzf --filter`.
// ----------------------------------------------------------------------

pub struct FilesFinder {
    list_ipc: Option<Ipc>,
    filter_ipc: Option<Ipc>,
}

impl FilesFinder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            list_ipc: None,
            filter_ipc: None,
        }
    }
}

impl FinderBackend for FilesFinder {
    fn title(&self) -> &'static str {
        "files"
    }

    fn start(&mut self, shared: &FinderShared) {
        let mut options = IpcOptions::new("find");
        options.argv = vec![
            ".".to_string(),
            "-type".to_string(),
            "f".to_string(),
            "!".to_string(),
            "-path".to_string(),
            "*/.git/*".to_string(),
        ];
        options.on_stdout = Some(line_collector(
            shared.total.clone(),
            shared.changed.clone(),
        ));
        match Ipc::spawn(options) {
            Ok(ipc) => self.list_ipc = Some(ipc),
            Err(err) => {
                warn!(target: "ui.finder", %err, "file enumeration failed");
                shared.set_error(format!("file listing unavailable: {err}"));
            }
        }
    }

    fn set_query(&mut self, shared: &FinderShared, query: &str) {
        // Kill the previous filter before touching the list it was writing.
        self.filter_ipc = None;
        shared.filters.lock().expect("filters lock").clear();
        shared.changed.store(true, Ordering::Release);
        if query.is_empty() {
            return;
        }

        let mut options = IpcOptions::new("fzf");
        options.argv = vec!["--filter".to_string(), query.to_string()];
        options.sending_inputs = true;
        options.on_stdout = Some(line_collector(
            shared.filters.clone(),
            shared.changed.clone(),
        ));
        match Ipc::spawn(options) {
            Ok(mut ipc) => {
                let lines = {
                    let total = shared.total.lock().expect("total lock");
                    total.join("\n")
                };
                ipc.write_to_stdin(lines.into_bytes());
                ipc.write_to_stdin(b"\n".to_vec());
                ipc.stop_listening();
                self.filter_ipc = Some(ipc);
            }
            Err(err) => {
                warn!(target: "ui.finder", %err, "filter spawn failed");
                shared.set_error(format!("fuzzy filter unavailable: {err}"));
            }
        }
    }

    fn select(&self, line: &str) -> Option<UiCommand> {
        let path = line.strip_prefix("./").unwrap_or(line);
        Some(UiCommand::OpenFile {
            path: PathBuf::from(path),
            coord: None,
        })
    }
}

// ----------------------------------------------------------------------
// Live grep: every query respawns ripgrep; results carry coordinates.
// ----------------------------------------------------------------------

pub struct LiveGrepFinder {
    grep_ipc: Option<Ipc>,
}

impl LiveGrepFinder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { grep_ipc: None }
    }
}

impl FinderBackend for LiveGrepFinder {
    fn title(&self) -> &'static str {
        "live grep"
    }

    fn start(&mut self, _shared: &FinderShared) {
        // Nothing to enumerate: the grep itself is the filter phase.
    }

    fn set_query(&mut self, shared: &FinderShared, query: &str) {
        self.grep_ipc = None;
        shared.filters.lock().expect("filters lock").clear();
        shared.changed.store(true, Ordering::Release);
        if query.is_empty() {
            return;
        }

        let mut options = IpcOptions::new("rg");
        options.argv = vec![
            "--vimgrep".to_string(),
            "--no-heading".to_string(),
            query.to_string(),
            ".".to_string(),
        ];
        options.on_stdout = Some(line_collector(
            shared.filters.clone(),
            shared.changed.clone(),
        ));
        match Ipc::spawn(options) {
            Ok(ipc) => self.grep_ipc = Some(ipc),
            Err(err) => {
                warn!(target: "ui.finder", %err, "grep spawn failed");
                shared.set_error(format!("live grep unavailable: {err}"));
            }
        }
    }

    /// Lines look like `path:line:col:text`.
    fn select(&self, line: &str) -> Option<UiCommand> {
        let mut parts = line.splitn(4, ':');
        let path = parts.next()?;
        let line_no: usize = parts.next()?.parse().ok()?;
        let col_no: usize = parts.next()?.parse().ok()?;
        let path = path.strip_prefix("./").unwrap_or(path);
        if path.is_empty() {
            debug!(target: "ui.finder", line, "unparseable grep line");
            return None;
        }
        Some(UiCommand::OpenFile {
            path: PathBuf::from(path),
            coord: Some(Coord::new(
                line_no.saturating_sub(1),
                col_no.saturating_sub(1),
            )),
        })
    }
}
