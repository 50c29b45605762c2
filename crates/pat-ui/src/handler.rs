//! The per-handler key-tree cursor wrapper implementing the standard
//! dispatch policy.
//!
//! Every participant in the event chain (window, tab members, panes) owns
//! one of these. Delegation order is the caller's job; once a child has
//! consumed an event the parent resets its own cursor so half-entered
//! combinations cannot linger.

use std::sync::Arc;

use pat_events::{Event, KeyEvent};
use pat_keymap::{Consumed, KeyActor, KeyTree, KeyTreeCursor};

pub struct EventHandler {
    cursor: KeyTreeCursor,
}

impl EventHandler {
    pub fn new(tree: Arc<KeyTree>) -> Self {
        Self {
            cursor: KeyTreeCursor::new(tree),
        }
    }

    /// Feed a key event through the cursor on behalf of `actor`.
    pub fn consume(&mut self, actor: &mut dyn KeyActor, key: KeyEvent) -> Consumed {
        self.cursor.consume_event(actor, key)
    }

    /// Convenience for the full policy on an arbitrary event: non-key
    /// events pass through untouched.
    pub fn consume_event(&mut self, actor: &mut dyn KeyActor, event: &Event) -> Consumed {
        match event {
            Event::Key(key) => self.consume(actor, *key),
            _ => Consumed::Pass,
        }
    }

    /// A child consumed the event: abandon any prefix this handler was
    /// tracking.
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    pub fn is_mid_combination(&self) -> bool {
        !self.cursor.is_root()
    }

    pub fn is_held(&self) -> bool {
        self.cursor.is_held()
    }

    /// Disambiguation timeout: fire the held ancestor binding, if any.
    pub fn on_timeout(&mut self, actor: &mut dyn KeyActor) -> bool {
        self.cursor.on_timeout(actor)
    }
}
