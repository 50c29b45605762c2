//! The editor proper: owns the window, the registries, and the queues, and
//! runs the main loop.
//!
//! Thread topology: the UI thread (this loop) performs every document and
//! window mutation. An input thread translates native terminal events onto
//! the message queue; each language server's IPC threads parse traffic and
//! push typed [`LspEvent`]s through a bridge onto the same queue. A frame is
//! drawn only between fully applied messages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use pat_config::Config;
use pat_doc::Document;
use pat_doc::document::{DocumentHandle, position_to_coord};
use pat_events::{Event, EventQueue};
use pat_keymap::KeyTree;
use pat_lsp::{LspClient, LspEvent, Uri};
use pat_render::{FrameBuffer, Icons, Position, Theme, draw_text_line};
use pat_text::{Buffer, Coord};
use pat_ui::{DocumentWindow, PaneCtx, UiCommand, Window};

use crate::bindings::default_keytree;
use crate::clock::{Clock, WallClock};
use crate::languages::{Language, LanguageRegistry};

/// How long an ambiguous key combination waits for more input before the
/// shorter binding fires.
const KEY_DISAMBIGUATION_MS: u64 = 600;
/// Status messages linger this long.
const STATUS_TTL_MS: u64 = 4000;

/// Everything the UI thread consumes, in arrival order.
pub enum EditorMsg {
    Input(Event),
    Lsp(LspEvent),
}

/// The frontend boundary: a cell grid sized to the terminal plus an input
/// pump. The editor owns the back buffer; the frontend diffs on present.
pub trait Frontend {
    fn initialize(&mut self) -> Result<()>;
    fn cleanup(&mut self) -> Result<()>;
    /// Current terminal dimensions in cells.
    fn size(&self) -> (usize, usize);
    /// Present the back buffer (diffing against the front internally).
    fn present(&mut self, buffer: &FrameBuffer) -> Result<()>;
    /// Start the blocking input thread; it pushes translated events until
    /// `running` clears.
    fn spawn_input(&mut self, sender: Sender<EditorMsg>, running: Arc<AtomicBool>) -> Result<()>;
}

pub struct Editor {
    config: Config,
    themes: HashMap<String, Theme>,
    theme: Theme,
    icons: Icons,
    keytree: Arc<KeyTree>,
    languages: LanguageRegistry,

    documents: HashMap<Uri, DocumentHandle>,
    lsp_clients: HashMap<String, Arc<LspClient>>,

    window: Window,
    queue: EventQueue<EditorMsg>,
    lsp_tx: Option<Sender<LspEvent>>,
    lsp_bridge: Option<std::thread::JoinHandle<()>>,

    running: Arc<AtomicBool>,
    redraw: Arc<AtomicBool>,
    clock: Box<dyn Clock>,

    back: FrameBuffer,
    status: Option<(String, u64)>,
    held_since: Option<u64>,
    next_untitled: usize,
}

impl Editor {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Box::new(WallClock::default()))
    }

    pub fn with_clock(config: Config, clock: Box<dyn Clock>) -> Self {
        let keytree = Arc::new(default_keytree());

        let mut themes = HashMap::new();
        let dark = Theme::default_dark();
        themes.insert(dark.name().to_string(), dark);
        let theme = themes
            .get(&config.theme)
            .cloned()
            .unwrap_or_else(Theme::default_dark);

        let queue: EventQueue<EditorMsg> = EventQueue::new();

        // Bridge: language-server events hop from their IPC threads onto
        // the single UI queue.
        let (lsp_tx, lsp_rx) = crossbeam_channel::unbounded::<LspEvent>();
        let bridge_sender = queue.sender();
        let lsp_bridge = std::thread::Builder::new()
            .name("lsp-bridge".to_string())
            .spawn(move || {
                while let Ok(event) = lsp_rx.recv() {
                    if bridge_sender.send(EditorMsg::Lsp(event)).is_err() {
                        break;
                    }
                }
            })
            .expect("thread spawn");

        // The initial scratch document.
        let mut scratch_buffer = Buffer::from_str("");
        scratch_buffer.set_tab_size(config.tabsize);
        let scratch = Document::new(Uri::untitled(0), scratch_buffer).into_handle();
        let initial = DocumentWindow::new(keytree.clone(), scratch.clone());
        let mut documents = HashMap::new();
        documents.insert(scratch.borrow().uri().clone(), scratch.clone());

        Self {
            window: Window::new(keytree.clone(), Box::new(initial)),
            keytree,
            themes,
            theme,
            icons: Icons::default(),
            languages: LanguageRegistry::with_defaults(),
            documents,
            lsp_clients: HashMap::new(),
            queue,
            lsp_tx: Some(lsp_tx),
            lsp_bridge: Some(lsp_bridge),
            running: Arc::new(AtomicBool::new(true)),
            redraw: Arc::new(AtomicBool::new(true)),
            clock,
            back: FrameBuffer::new(0, 0),
            status: None,
            held_since: None,
            next_untitled: 1,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn documents(&self) -> &HashMap<Uri, DocumentHandle> {
        &self.documents
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wake the main loop into repainting; safe from any thread.
    pub fn request_redraw(&self) {
        self.redraw.store(true, Ordering::Release);
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), self.clock.now_ms()));
        self.request_redraw();
    }

    /// Open (or refocus) a file in the active pane, optionally jumping to a
    /// coordinate. Read failures surface as status messages; the editor
    /// keeps going.
    pub fn open_file(&mut self, path: &Path, coord: Option<Coord>) {
        let uri = Uri::from_path(path);
        let handle = match self.documents.get(&uri) {
            Some(handle) => handle.clone(),
            None => match self.load_document(path, &uri) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(target: "editor", path = %path.display(), %err, "open failed");
                    self.set_status(format!("cannot open {}: {err}", path.display()));
                    return;
                }
            },
        };

        if let Some(coord) = coord {
            handle.borrow_mut().jump_to(coord);
        }

        let pane = DocumentWindow::new(self.keytree.clone(), handle);
        self.window.replace_active_pane(Box::new(pane));
        self.window.close_popup();
        self.request_redraw();
    }

    fn load_document(&mut self, path: &Path, uri: &Uri) -> Result<DocumentHandle> {
        let bytes = std::fs::read(path)?;
        let mut buffer = Buffer::from_bytes(bytes);
        buffer.set_tab_size(self.config.tabsize);

        let mut document = Document::new(uri.clone(), buffer);
        let language = self.languages.for_path(path).cloned();
        if let Some(language) = &language {
            document.set_language(language.id.clone());
            document.set_completion_triggers(language.completion_triggers.clone());
        }

        let handle = document.into_handle();
        if let Some(language) = &language
            && let Some(client) = self.client_for(language)
        {
            handle.borrow_mut().attach_lsp(client);
        }

        info!(target: "editor", uri = %uri, "document opened");
        self.documents.insert(uri.clone(), handle.clone());
        Ok(handle)
    }

    /// One client per server command, shared across documents of the same
    /// language. A spawn failure disables LSP for that language but nothing
    /// else.
    fn client_for(&mut self, language: &Language) -> Option<Arc<LspClient>> {
        let (file, argv) = language.server.as_ref()?;
        if let Some(client) = self.lsp_clients.get(file) {
            return Some(client.clone());
        }
        let events = self.lsp_tx.as_ref()?.clone();
        let root = std::env::current_dir().ok();
        match LspClient::start(
            language.id.clone(),
            file,
            argv.clone(),
            root.as_deref(),
            events,
        ) {
            Ok(client) => {
                let client = Arc::new(client);
                self.lsp_clients.insert(file.clone(), client.clone());
                Some(client)
            }
            Err(err) => {
                warn!(target: "editor", server = file, %err, "language server unavailable");
                self.set_status(format!("{file}: {err}"));
                None
            }
        }
    }

    /// Remove a document from the registry, sending `didClose`.
    pub fn close_document(&mut self, uri: &Uri) {
        if let Some(handle) = self.documents.remove(uri) {
            handle.borrow_mut().close();
        }
    }

    // ------------------------------------------------------------------
    // Message application (UI thread only)
    // ------------------------------------------------------------------

    pub fn apply_msg(&mut self, msg: EditorMsg) {
        match msg {
            EditorMsg::Input(event) => self.apply_input(event),
            EditorMsg::Lsp(event) => self.apply_lsp(event),
        }
    }

    fn apply_input(&mut self, event: Event) {
        match event {
            Event::Close => {
                self.running.store(false, Ordering::Release);
            }
            Event::Resize { .. } => {
                self.request_redraw();
            }
            _ => {
                let ctx = PaneCtx {
                    theme: &self.theme,
                    config: &self.config,
                    icons: &self.icons,
                    focused: true,
                    now_ms: self.clock.now_ms(),
                };
                self.window.handle_event(&event, &ctx);
                self.request_redraw();
                self.drain_commands();
            }
        }
    }

    fn apply_lsp(&mut self, event: LspEvent) {
        match event {
            LspEvent::Initialized { server } => {
                debug!(target: "editor", server, "language server ready");
            }
            LspEvent::Completion {
                uri,
                version,
                items,
            } => {
                if let Some(doc) = self.documents.get(&uri) {
                    doc.borrow_mut().on_completion_results(version, items);
                    self.request_redraw();
                }
            }
            LspEvent::SignatureHelp { uri, version, help } => {
                if let Some(doc) = self.documents.get(&uri) {
                    doc.borrow_mut().on_signature_help(version, help);
                    self.request_redraw();
                }
            }
            LspEvent::Hover { contents, .. } => {
                if let Some(contents) = contents {
                    let first = contents.lines().next().unwrap_or_default().to_string();
                    self.set_status(first);
                }
            }
            LspEvent::Definition { locations, .. } => {
                if let Some(location) = locations.first() {
                    let target = Uri::from(location.uri.clone());
                    if let Some(path) = target.to_path() {
                        let coord = position_to_coord(location.range.start);
                        self.open_file(&path, Some(coord));
                    }
                }
            }
            LspEvent::Diagnostics {
                uri,
                version,
                diagnostics,
            } => {
                if let Some(doc) = self.documents.get(&uri) {
                    doc.borrow_mut().push_diagnostics(version, diagnostics);
                    self.request_redraw();
                }
            }
            LspEvent::ServerExited { server, code } => {
                self.lsp_clients
                    .retain(|_, client| client.server_name() != server);
                self.set_status(format!("language server {server} exited ({code:?})"));
            }
        }
    }

    fn drain_commands(&mut self) {
        for command in self.window.take_commands() {
            match command {
                UiCommand::OpenFile { path, coord } => self.open_file(&path, coord),
                UiCommand::StatusMessage(message) => self.set_status(message),
                UiCommand::Quit => self.running.store(false, Ordering::Release),
            }
        }
    }

    // ------------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------------

    pub fn run(&mut self, frontend: &mut dyn Frontend) -> Result<()> {
        frontend.initialize()?;
        frontend.spawn_input(self.queue.sender(), self.running.clone())?;
        let result = self.run_inner(frontend);
        self.shutdown();
        frontend.cleanup()?;
        result
    }

    fn run_inner(&mut self, frontend: &mut dyn Frontend) -> Result<()> {
        let frame = Duration::from_millis(1000 / self.config.fps.max(1) as u64);

        while self.running.load(Ordering::Acquire) {
            // Apply everything queued, blocking at most one frame.
            if let Some(msg) = self.queue.dequeue_timeout(frame) {
                self.apply_msg(msg);
                while let Some(msg) = self.queue.try_dequeue() {
                    self.apply_msg(msg);
                }
            }

            self.tick_key_timeout();
            self.tick_status();

            let ctx = PaneCtx {
                theme: &self.theme,
                config: &self.config,
                icons: &self.icons,
                focused: true,
                now_ms: self.clock.now_ms(),
            };
            if self.window.update(&ctx) {
                self.redraw.store(true, Ordering::Release);
            }

            if self.redraw.swap(false, Ordering::AcqRel) {
                let (width, height) = frontend.size();
                self.draw_frame(width, height);
                frontend.present(&self.back)?;
            }
        }
        Ok(())
    }

    /// Fire a held ambiguous binding once the disambiguation window lapses.
    fn tick_key_timeout(&mut self) {
        let now = self.clock.now_ms();
        if !self.window.has_held_binding() {
            self.held_since = None;
            return;
        }
        match self.held_since {
            None => self.held_since = Some(now),
            Some(since) if now.saturating_sub(since) >= KEY_DISAMBIGUATION_MS => {
                let ctx = PaneCtx {
                    theme: &self.theme,
                    config: &self.config,
                    icons: &self.icons,
                    focused: true,
                    now_ms: now,
                };
                if self.window.on_key_timeout(&ctx) {
                    self.request_redraw();
                }
                self.held_since = None;
                self.drain_commands();
            }
            Some(_) => {}
        }
    }

    fn tick_status(&mut self) {
        if let Some((_, shown_at)) = &self.status
            && self.clock.now_ms().saturating_sub(*shown_at) >= STATUS_TTL_MS
        {
            self.status = None;
            self.request_redraw();
        }
    }

    fn draw_frame(&mut self, width: usize, height: usize) {
        self.back.resize(width, height);
        let ctx = PaneCtx {
            theme: &self.theme,
            config: &self.config,
            icons: &self.icons,
            focused: true,
            now_ms: self.clock.now_ms(),
        };
        self.window.draw(&mut self.back, &ctx);

        // Editor-level status message paints over the bottom row.
        if let Some((message, _)) = &self.status
            && height > 0
        {
            let style = self.theme.get("ui.statusline");
            draw_text_line(
                &mut self.back,
                message,
                Position::new(0, height as i32 - 1),
                width,
                &style,
                &self.icons,
                true,
                false,
            );
        }
    }

    /// Tear down collaborators: close documents (didClose), shut servers
    /// down, and let the bridge thread drain.
    pub fn shutdown(&mut self) {
        for handle in self.documents.values() {
            handle.borrow_mut().close();
        }
        for client in self.lsp_clients.values() {
            client.shutdown();
        }
        self.lsp_clients.clear();
        self.lsp_tx = None;
        if let Some(bridge) = self.lsp_bridge.take() {
            let _ = bridge.join();
        }
    }

    /// A fresh scratch document for `:new`-style workflows.
    pub fn new_scratch(&mut self) -> DocumentHandle {
        let uri = Uri::untitled(self.next_untitled);
        self.next_untitled += 1;
        let mut buffer = Buffer::from_str("");
        buffer.set_tab_size(self.config.tabsize);
        let handle = Document::new(uri.clone(), buffer).into_handle();
        self.documents.insert(uri, handle.clone());
        handle
    }

    /// Available theme names plus activation; unknown names are reported on
    /// the status surface.
    pub fn set_theme(&mut self, name: &str) {
        match self.themes.get(name) {
            Some(theme) => {
                self.theme = theme.clone();
                self.request_redraw();
            }
            None => {
                let message = format!("unknown theme: {name}");
                self.set_status(message);
            }
        }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pat_events::{KeyEvent, Keycode, KeyMods};
    use std::io::Write;

    fn editor() -> Editor {
        Editor::with_clock(Config::default(), Box::new(ManualClock::default()))
    }

    fn key(ch: char) -> EditorMsg {
        EditorMsg::Input(Event::Key(KeyEvent::text(ch as u32)))
    }

    fn code(code: Keycode) -> EditorMsg {
        EditorMsg::Input(Event::Key(KeyEvent::key(code, KeyMods::empty())))
    }

    #[test]
    fn typing_reaches_the_scratch_document() {
        let mut ed = editor();
        ed.apply_msg(key('i')); // insert mode
        for ch in "hello".chars() {
            ed.apply_msg(key(ch));
        }
        let doc = ed.documents().values().next().unwrap();
        assert_eq!(doc.borrow().buffer().data(), b"hello");
    }

    #[test]
    fn close_event_stops_the_editor() {
        let mut ed = editor();
        assert!(ed.is_running());
        ed.apply_msg(EditorMsg::Input(Event::Close));
        assert!(!ed.is_running());
    }

    #[test]
    fn quit_binding_stops_the_editor() {
        let mut ed = editor();
        ed.apply_msg(EditorMsg::Input(Event::Key(KeyEvent::key(
            Keycode::Q,
            KeyMods::CTRL,
        ))));
        assert!(!ed.is_running());
    }

    #[test]
    fn open_file_loads_and_jumps() {
        let mut ed = editor();
        let mut file = tempfile::NamedTempFile::with_suffix(".rs").unwrap();
        writeln!(file, "fn main() {{}}\nstruct Foo;").unwrap();

        ed.open_file(file.path(), Some(Coord::new(1, 7)));
        let uri = Uri::from_path(file.path());
        let doc = ed.documents().get(&uri).expect("document registered");
        let doc = doc.borrow();
        assert_eq!(doc.language(), "rust");
        assert_eq!(doc.cursors().primary().coord(), Coord::new(1, 7));
    }

    #[test]
    fn open_missing_file_sets_status() {
        let mut ed = editor();
        ed.open_file(Path::new("/definitely/not/here.txt"), None);
        assert!(ed.status.is_some());
    }

    #[test]
    fn status_expires_with_the_clock() {
        let clock = Arc::new(ManualClock::default());
        struct SharedClock(Arc<ManualClock>);
        impl Clock for SharedClock {
            fn now_ms(&self) -> u64 {
                self.0.now_ms()
            }
        }
        let mut ed = Editor::with_clock(Config::default(), Box::new(SharedClock(clock.clone())));
        ed.set_status("hello");
        ed.tick_status();
        assert!(ed.status.is_some());
        clock.advance(STATUS_TTL_MS);
        ed.tick_status();
        assert!(ed.status.is_none());
    }

    #[test]
    fn lsp_diagnostics_route_by_uri() {
        let mut ed = editor();
        let mut file = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "text").unwrap();
        ed.open_file(file.path(), None);
        let uri = Uri::from_path(file.path());

        ed.apply_msg(EditorMsg::Lsp(LspEvent::Diagnostics {
            uri: uri.clone(),
            version: None,
            diagnostics: vec![pat_lsp::types::Diagnostic {
                range: pat_lsp::types::Range::default(),
                severity: None,
                message: "problem".into(),
                source: None,
            }],
        }));

        let doc = ed.documents().get(&uri).unwrap();
        assert_eq!(doc.borrow().diagnostics().len(), 1);
    }

    #[test]
    fn finder_open_command_replaces_pane() {
        let mut ed = editor();
        let mut file = tempfile::NamedTempFile::with_suffix(".md").unwrap();
        writeln!(file, "# doc").unwrap();

        // Open the files finder, then simulate the accept command path.
        ed.apply_msg(EditorMsg::Input(Event::Key(KeyEvent::key(
            Keycode::O,
            KeyMods::CTRL,
        ))));
        assert!(ed.window().has_popup());
        ed.open_file(file.path(), None);
        assert!(!ed.window().has_popup());
    }

    #[test]
    fn escape_closes_popup() {
        let mut ed = editor();
        ed.apply_msg(EditorMsg::Input(Event::Key(KeyEvent::key(
            Keycode::O,
            KeyMods::CTRL,
        ))));
        assert!(ed.window().has_popup());
        ed.apply_msg(code(Keycode::Escape));
        assert!(!ed.window().has_popup());
    }
}
