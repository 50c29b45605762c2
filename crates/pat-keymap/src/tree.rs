//! The prefix trie of encoded key events and its traversal cursor.
//!
//! Bindings are stored at trie nodes keyed by `(actor class, mode)`; the
//! mode `"*"` is a wildcard consulted after an exact mode miss. The trie
//! itself stores action *names*; actors execute them through
//! [`KeyActor::invoke`], so an unknown name is a runtime report rather than
//! a registration failure elsewhere in the editor.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::encode::encode_key_event;
use crate::parse::parse_key_combination;
use crate::KeymapError;
use pat_events::KeyEvent;

/// Mode that matches any actor mode after an exact lookup fails.
pub const WILDCARD_MODE: &str = "*";

/// Something that owns a mode and can execute named actions. Panes and
/// windows implement this; the trie never knows concrete types.
pub trait KeyActor {
    fn actor_class(&self) -> &'static str;
    fn mode(&self) -> &str;
    /// Execute a named action; returns true when the action handled it.
    fn invoke(&mut self, action: &str) -> bool;
}

#[derive(Default)]
struct Node {
    edges: SmallVec<[(u32, usize); 4]>,
    // actor class -> mode -> action name
    bindings: HashMap<String, HashMap<String, String>>,
}

/// Immutable after registration; shared between every cursor via `Arc`.
pub struct KeyTree {
    nodes: Vec<Node>,
}

impl Default for KeyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    /// Walk (creating as needed) the node path for `combo` and store
    /// `action` under `(actor_class, mode)` at the terminal node.
    pub fn register_binding(
        &mut self,
        actor_class: &str,
        mode: &str,
        combo: &str,
        action: &str,
    ) -> Result<(), KeymapError> {
        let events = parse_key_combination(combo)?;
        let mut node = 0usize;
        for event in events {
            node = match self.child(node, event) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].edges.push((event, next));
                    next
                }
            };
        }
        trace!(
            target: "input.keytree",
            actor = actor_class,
            mode,
            combo,
            action,
            node,
            "binding registered"
        );
        self.nodes[node]
            .bindings
            .entry(actor_class.to_string())
            .or_default()
            .insert(mode.to_string(), action.to_string());
        Ok(())
    }

    fn child(&self, node: usize, event: u32) -> Option<usize> {
        self.nodes[node]
            .edges
            .iter()
            .find(|(e, _)| *e == event)
            .map(|(_, n)| *n)
    }

    fn has_children(&self, node: usize) -> bool {
        !self.nodes[node].edges.is_empty()
    }

    fn binding(&self, node: usize, actor_class: &str, mode: &str) -> Option<&str> {
        let by_mode = self.nodes[node].bindings.get(actor_class)?;
        by_mode
            .get(mode)
            .or_else(|| by_mode.get(WILDCARD_MODE))
            .map(String::as_str)
    }

    /// Whether `node` or any descendant carries a binding visible to this
    /// actor and mode. A subtree bound only for other actors or modes is
    /// invisible: descending into it would swallow keys that should fall
    /// through to default handling.
    fn subtree_has_binding(&self, node: usize, actor_class: &str, mode: &str) -> bool {
        if self.binding(node, actor_class, mode).is_some() {
            return true;
        }
        self.nodes[node]
            .edges
            .iter()
            .any(|(_, next)| self.subtree_has_binding(*next, actor_class, mode))
    }
}

/// Outcome of feeding one event to a [`KeyTreeCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumed {
    /// A leaf binding fired; the cursor is back at the root.
    Fired,
    /// A binding matched but longer sequences exist. The cursor stays put;
    /// the owner should arm a disambiguation timer and call
    /// [`KeyTreeCursor::on_timeout`] if no further event arrives.
    Held,
    /// Valid prefix of one or more bindings; waiting for more input.
    Pending,
    /// The event aborted an in-flight combination; it was swallowed and the
    /// cursor reset.
    Swallowed,
    /// The event means nothing to this cursor; the caller decides.
    Pass,
}

impl Consumed {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Consumed::Pass)
    }
}

/// Stateful traversal of a [`KeyTree`]. One cursor per event handler.
pub struct KeyTreeCursor {
    tree: Arc<KeyTree>,
    node: usize,
    recorded: Vec<u32>,
    pending: Option<String>,
}

impl KeyTreeCursor {
    pub fn new(tree: Arc<KeyTree>) -> Self {
        Self {
            tree,
            node: 0,
            recorded: Vec::new(),
            pending: None,
        }
    }

    pub fn reset(&mut self) {
        self.node = 0;
        self.recorded.clear();
        self.pending = None;
    }

    /// True when no events have been recorded.
    pub fn is_root(&self) -> bool {
        self.node == 0
    }

    /// True when an ancestor binding is waiting out a disambiguation window.
    pub fn is_held(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one event. Implements the standard policy: descend and fire a
    /// leaf binding; hold an ambiguous binding; report a bare prefix as
    /// pending; swallow an event that aborts a combination; otherwise pass.
    pub fn consume_event(&mut self, actor: &mut dyn KeyActor, event: KeyEvent) -> Consumed {
        let encoded = encode_key_event(event);

        // A child node counts only when its subtree is visible to this
        // actor's class and mode; otherwise the event is treated as unbound.
        let child = self.tree.child(self.node, encoded).filter(|next| {
            self.tree
                .subtree_has_binding(*next, actor.actor_class(), actor.mode())
        });
        let Some(next) = child else {
            // A held ancestor is shadowed only by matching input. Anything
            // else fires it now, then the current event restarts from root.
            if let Some(action) = self.pending.take() {
                self.fire(actor, &action);
                self.reset();
                return match self.consume_event(actor, event) {
                    Consumed::Pass => Consumed::Pass,
                    other => other,
                };
            }
            if !self.is_root() {
                trace!(target: "input.keytree", "aborted combination swallowed");
                self.reset();
                return Consumed::Swallowed;
            }
            return Consumed::Pass;
        };

        self.node = next;
        self.recorded.push(encoded);
        self.pending = None;

        let action = self
            .tree
            .binding(next, actor.actor_class(), actor.mode())
            .map(str::to_string);
        let more = self.tree.has_children(next);

        match (action, more) {
            (Some(action), false) => {
                self.fire(actor, &action);
                self.reset();
                Consumed::Fired
            }
            (Some(action), true) => {
                self.pending = Some(action);
                Consumed::Held
            }
            (None, true) => Consumed::Pending,
            (None, false) => {
                // Cannot happen: a visible leaf always carries a binding.
                self.reset();
                Consumed::Swallowed
            }
        }
    }

    /// The disambiguation window closed with no further input: fire the held
    /// ancestor binding. Returns true if something fired.
    pub fn on_timeout(&mut self, actor: &mut dyn KeyActor) -> bool {
        match self.pending.take() {
            Some(action) => {
                self.fire(actor, &action);
                self.reset();
                true
            }
            None => false,
        }
    }

    fn fire(&self, actor: &mut dyn KeyActor, action: &str) {
        trace!(
            target: "input.keytree",
            actor = actor.actor_class(),
            mode = actor.mode(),
            action,
            depth = self.recorded.len(),
            "firing action"
        );
        actor.invoke(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pat_events::{KeyMods, Keycode};
    use pretty_assertions::assert_eq;

    struct Recorder {
        mode: String,
        fired: Vec<String>,
    }

    impl Recorder {
        fn new(mode: &str) -> Self {
            Self {
                mode: mode.to_string(),
                fired: Vec::new(),
            }
        }
    }

    impl KeyActor for Recorder {
        fn actor_class(&self) -> &'static str {
            "recorder"
        }
        fn mode(&self) -> &str {
            &self.mode
        }
        fn invoke(&mut self, action: &str) -> bool {
            self.fired.push(action.to_string());
            true
        }
    }

    fn tree_with(bindings: &[(&str, &str, &str)]) -> Arc<KeyTree> {
        let mut tree = KeyTree::new();
        for (mode, combo, action) in bindings {
            tree.register_binding("recorder", mode, combo, action).unwrap();
        }
        Arc::new(tree)
    }

    fn ctrl(code: Keycode) -> KeyEvent {
        KeyEvent::key(code, KeyMods::CTRL)
    }

    fn ch(c: char) -> KeyEvent {
        KeyEvent::text(c as u32)
    }

    #[test]
    fn sequence_fires_exactly_once_and_returns_to_root() {
        let tree = tree_with(&[("*", "<C-x>i", "open")]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");

        assert_eq!(cursor.consume_event(&mut actor, ctrl(Keycode::X)), Consumed::Pending);
        assert_eq!(cursor.consume_event(&mut actor, ch('i')), Consumed::Fired);
        assert_eq!(actor.fired, vec!["open".to_string()]);
        assert!(cursor.is_root());
    }

    #[test]
    fn unbound_continuation_swallows_and_resets() {
        let tree = tree_with(&[("*", "<C-x>i", "open")]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");

        assert_eq!(cursor.consume_event(&mut actor, ctrl(Keycode::X)), Consumed::Pending);
        assert_eq!(cursor.consume_event(&mut actor, ctrl(Keycode::G)), Consumed::Swallowed);
        assert!(cursor.is_root());
        assert!(actor.fired.is_empty());
    }

    #[test]
    fn unbound_event_at_root_passes() {
        let tree = tree_with(&[("*", "<C-x>i", "open")]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");
        assert_eq!(cursor.consume_event(&mut actor, ch('q')), Consumed::Pass);
        assert!(cursor.is_root());
    }

    #[test]
    fn exact_mode_beats_wildcard() {
        let tree = tree_with(&[("*", "x", "wild"), ("insert", "x", "exact")]);
        let mut cursor = KeyTreeCursor::new(tree.clone());

        let mut insert = Recorder::new("insert");
        cursor.consume_event(&mut insert, ch('x'));
        assert_eq!(insert.fired, vec!["exact".to_string()]);

        let mut normal = Recorder::new("normal");
        let mut cursor = KeyTreeCursor::new(tree);
        cursor.consume_event(&mut normal, ch('x'));
        assert_eq!(normal.fired, vec!["wild".to_string()]);
    }

    #[test]
    fn mode_scoped_binding_is_invisible_elsewhere() {
        let tree = tree_with(&[("insert", "z", "only-insert")]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");
        // The path exists but is invisible to this mode: the event passes
        // through to default handling instead of being eaten.
        assert_eq!(cursor.consume_event(&mut actor, ch('z')), Consumed::Pass);
        assert!(cursor.is_root());
        assert!(actor.fired.is_empty());
    }

    #[test]
    fn ambiguous_binding_is_held_then_shadowed() {
        let tree = tree_with(&[("*", "d", "delete"), ("*", "dd", "delete-line")]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");

        assert_eq!(cursor.consume_event(&mut actor, ch('d')), Consumed::Held);
        assert!(cursor.is_held());
        assert_eq!(cursor.consume_event(&mut actor, ch('d')), Consumed::Fired);
        assert_eq!(actor.fired, vec!["delete-line".to_string()]);
    }

    #[test]
    fn held_binding_fires_on_timeout() {
        let tree = tree_with(&[("*", "d", "delete"), ("*", "dd", "delete-line")]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");

        assert_eq!(cursor.consume_event(&mut actor, ch('d')), Consumed::Held);
        assert!(cursor.on_timeout(&mut actor));
        assert_eq!(actor.fired, vec!["delete".to_string()]);
        assert!(cursor.is_root());
        assert!(!cursor.on_timeout(&mut actor));
    }

    #[test]
    fn held_binding_fires_before_unrelated_input() {
        let tree = tree_with(&[
            ("*", "d", "delete"),
            ("*", "dd", "delete-line"),
            ("*", "x", "cut"),
        ]);
        let mut cursor = KeyTreeCursor::new(tree);
        let mut actor = Recorder::new("normal");

        assert_eq!(cursor.consume_event(&mut actor, ch('d')), Consumed::Held);
        // 'x' does not extend 'd': the ancestor fires, then 'x' resolves
        // from the root.
        assert_eq!(cursor.consume_event(&mut actor, ch('x')), Consumed::Fired);
        assert_eq!(
            actor.fired,
            vec!["delete".to_string(), "cut".to_string()]
        );
    }

    #[test]
    fn malformed_binding_is_rejected() {
        let mut tree = KeyTree::new();
        let err = tree.register_binding("recorder", "*", "<nope>", "noop");
        assert!(err.is_err());
    }
}
