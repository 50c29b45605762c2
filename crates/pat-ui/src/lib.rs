//! The pane/split/tab/window layer: recursive split layout, the bubbling
//! event-handler chain, and the concrete panes (document windows and the
//! finder popup).
//!
//! Event flow: the window routes to its popup first, then down the tab to
//! the active split leaf. Each handler delegates to its children before
//! consulting its own key-tree cursor; a handler whose cursor is mid-combo
//! swallows anything its children decline.

pub mod docwindow;
pub mod finder;
pub mod findpane;
pub mod handler;
pub mod split;
pub mod tab;
pub mod window;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use docwindow::DocumentWindow;
pub use finder::{FilesFinder, Finder, FinderBackend, FinderShared, LiveGrepFinder};
pub use findpane::FindPane;
pub use handler::EventHandler;
pub use split::{Split, SplitAxis};
pub use tab::Tab;
pub use window::Window;

use pat_config::Config;
use pat_events::Event;
use pat_keymap::KeyActor;
use pat_render::{Area, FrameBuffer, Icons, Position, Theme};
use pat_text::Coord;

/// Requests a pane cannot satisfy itself; the editor shell drains and
/// executes them after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    OpenFile {
        path: PathBuf,
        coord: Option<Coord>,
    },
    StatusMessage(String),
    Quit,
}

/// Identifies a pane across the split tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaneId(usize);

impl PaneId {
    pub fn next() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Read-only surroundings handed to panes for events, updates, and drawing.
/// `now_ms` comes from the editor's clock so blink state is testable.
pub struct PaneCtx<'a> {
    pub theme: &'a Theme,
    pub config: &'a Config,
    pub icons: &'a Icons,
    pub focused: bool,
    pub now_ms: u64,
}

/// A secondary frame buffer composed over the main one after all panes have
/// drawn; used for completion popups.
pub struct Overlay {
    pub buffer: FrameBuffer,
    pub at: Position,
}

/// The drawable content of a split leaf.
pub trait Pane: KeyActor {
    fn id(&self) -> PaneId;

    /// Full dispatch for one event: own key-tree first, then any default
    /// behavior (character insertion for document panes). Returns whether
    /// the event was consumed.
    fn handle_event(&mut self, event: &Event, ctx: &PaneCtx) -> bool;

    /// Per-frame housekeeping (cursor blink, collaborator polls). Returns
    /// true when the pane wants a redraw.
    fn update(&mut self, ctx: &PaneCtx) -> bool {
        let _ = ctx;
        false
    }

    fn draw(
        &mut self,
        buff: &mut FrameBuffer,
        pos: Position,
        area: Area,
        ctx: &PaneCtx,
        overlays: &mut Vec<Overlay>,
    );

    /// Commands produced by the last dispatch.
    fn take_commands(&mut self) -> Vec<UiCommand> {
        Vec::new()
    }

    /// A second view of the same content, for splits. Panes that cannot be
    /// duplicated (popups) return `None`.
    fn duplicate(&self) -> Option<Box<dyn Pane>> {
        None
    }

    /// The key-combination disambiguation window elapsed; fire any held
    /// binding. Returns true when something fired.
    fn on_key_timeout(&mut self) -> bool {
        false
    }

    /// Whether a binding is waiting out a disambiguation window; the main
    /// loop arms a timer while any handler reports true.
    fn has_held_binding(&self) -> bool {
        false
    }
}
