//! Change/Action records and the undo/redo history.
//!
//! A `Change` is one atomic buffer mutation (bytes added or removed at an
//! index). An `Action` groups the changes of one undo step together with the
//! cursor sets before and after. The history is a vector of actions plus a
//! pointer:
//!
//! ```text
//!    a1 -> a2 -> a3 |        undo: ptr -= 1, apply a3 reversed+inverted
//!                   ^ ptr    redo: apply actions[ptr] forward, ptr += 1
//! ```
//!
//! Successive commits append their changes to the same open action. A
//! cursor motion closes it ([`History::interrupt`]) unless an explicit
//! [`History::start_action`] group is in progress; undo/redo always close
//! it. The document version increments on every commit, undo, and redo,
//! mirroring the LSP document version.

use pat_text::{Buffer, Coord};
use tracing::trace;

use crate::cursor::MultiCursor;

/// A single atomic buffer mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub index: usize,
    pub added: bool,
    pub text: Vec<u8>,
}

/// An edit expressed in coordinates, as the LSP wants it: replace the span
/// `[start, end)` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub start: Coord,
    pub end: Coord,
    pub text: String,
}

/// One undo step.
#[derive(Debug, Clone, Default)]
pub struct Action {
    pub before: MultiCursor,
    pub after: MultiCursor,
    pub changes: Vec<Change>,
}

impl Action {
    /// Append a change, coalescing with the last one when the two are
    /// adjacent: addition extending an addition, removal extending a removal
    /// backwards, or a removal trimming the tail of an addition. Anything
    /// more complex stays a separate change.
    pub fn push_change(&mut self, change: Change) {
        let Some(last) = self.changes.last_mut() else {
            self.changes.push(change);
            return;
        };

        if last.added && change.added && last.index + last.text.len() == change.index {
            last.text.extend_from_slice(&change.text);
            return;
        }

        if !last.added && !change.added && change.index + change.text.len() == last.index {
            last.index = change.index;
            let mut text = change.text;
            text.extend_from_slice(&last.text);
            last.text = text;
            return;
        }

        if last.added
            && !change.added
            && last.text.len() >= change.text.len()
            && last.index + last.text.len() == change.index + change.text.len()
        {
            debug_assert!(last.text.ends_with(&change.text));
            let keep = last.text.len() - change.text.len();
            last.text.truncate(keep);
            return;
        }

        self.changes.push(change);
    }
}

/// Direction of a character removal commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Backspace: remove the byte before the caret.
    Backward,
    /// Delete: remove the byte under the caret.
    Forward,
}

/// Result of a commit or an undo/redo: the cursor set to adopt and the
/// coordinate-space changes to forward to the language server.
#[derive(Debug, Clone)]
pub struct Commit {
    pub cursors: MultiCursor,
    pub changes: Vec<DocumentChange>,
}

type HistoryListener = Box<dyn FnMut(u32, &[DocumentChange]) + Send>;

/// Handle for unregistering a history listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryListenerId(u64);

#[derive(Default)]
pub struct History {
    actions: Vec<Action>,
    ptr: usize,
    version: u32,
    /// An explicit macro group is in progress; only `end_action` (or
    /// undo/redo) closes it.
    listening: bool,
    /// The current group's action exists at `actions[ptr - 1]`. Created
    /// lazily by the group's first commit, so it is valid regardless of
    /// whether `start_action` was called before or after any edit, and
    /// regardless of a pending redo tail.
    action_open: bool,
    listeners: Vec<(HistoryListenerId, HistoryListener)>,
    next_listener: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document version per the LSP: bumped on every commit, undo, and redo.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn has_undo(&self) -> bool {
        self.ptr >= 1
    }

    pub fn has_redo(&self) -> bool {
        self.ptr < self.actions.len()
    }

    /// Group everything committed until [`History::end_action`] into one
    /// undo step (macro grouping). The group's action is opened by its
    /// first commit, not here.
    pub fn start_action(&mut self) {
        self.listening = true;
    }

    pub fn end_action(&mut self) {
        self.listening = false;
        self.action_open = false;
    }

    /// A cursor motion breaks implicit coalescing so the next commit opens
    /// a fresh action. An explicit group stays open: macros move cursors
    /// between edits without splitting their undo step.
    pub fn interrupt(&mut self) {
        if !self.listening {
            self.action_open = false;
        }
    }

    pub fn register_listener(&mut self, listener: HistoryListener) -> HistoryListenerId {
        let id = HistoryListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister_listener(&mut self, id: HistoryListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    /// For each cursor: delete its selection if it has one, then insert
    /// `text` at the caret, shifting every later cursor by the net delta.
    /// Returns the adjusted cursor set and the per-cursor LSP changes.
    pub fn commit_insert_text(
        &mut self,
        buffer: &mut Buffer,
        cursors: &MultiCursor,
        text: &[u8],
    ) -> Commit {
        let mut cursors = cursors.clone();
        let action_index = self.listening_action(&cursors);
        let mut lsp_changes = Vec::new();

        for i in 0..cursors.len() {
            let mut delta_removed = 0usize;

            let cursor = &mut cursors.cursors_mut()[i];
            let lsp_change = if let Some(selection) = cursor.selection() {
                let change = DocumentChange {
                    start: buffer.index_to_coord(selection.start),
                    end: buffer.index_to_coord(selection.end),
                    text: String::from_utf8_lossy(text).into_owned(),
                };
                if !selection.is_empty() {
                    self.actions[action_index].push_change(Change {
                        index: selection.start,
                        added: false,
                        text: buffer.substring(selection.start, selection.len()),
                    });
                    buffer.remove_text(selection.start, selection.len());
                    delta_removed = selection.len();
                    cursor.set_index(buffer, selection.start);
                }
                cursor.clear_selection();
                change
            } else {
                let coord = cursor.coord();
                DocumentChange {
                    start: coord,
                    end: coord,
                    text: String::from_utf8_lossy(text).into_owned(),
                }
            };

            let cursor_index = cursor.index();
            self.actions[action_index].push_change(Change {
                index: cursor_index,
                added: true,
                text: text.to_vec(),
            });
            lsp_changes.push(lsp_change);

            buffer.insert_text(cursor_index, text);

            let cursor = &mut cursors.cursors_mut()[i];
            cursor.set_index(buffer, cursor_index + text.len());
            cursor.update_intended_column(buffer);

            shift_following(&mut cursors, buffer, i, text.len(), delta_removed);
        }

        cursors.changed(buffer);
        self.actions[action_index].after = cursors.clone();
        self.bump_version();
        self.notify(&lsp_changes);
        Commit {
            cursors,
            changes: lsp_changes,
        }
    }

    /// Backspace/delete at every cursor: a selection is removed whole, an
    /// empty selection is ignored, and otherwise one byte goes in the given
    /// direction. When nothing changed the original cursors come back and no
    /// event is emitted.
    pub fn commit_remove_text(
        &mut self,
        buffer: &mut Buffer,
        cursors: &MultiCursor,
        direction: Direction,
    ) -> Commit {
        let mut cursors = cursors.clone();
        let action_index = self.listening_action(&cursors);
        let mut lsp_changes = Vec::new();
        let mut changed = false;

        for i in 0..cursors.len() {
            let mut delta_removed = 0usize;

            let cursor = &mut cursors.cursors_mut()[i];
            if let Some(selection) = cursor.selection()
                && selection.is_empty()
            {
                cursor.clear_selection();
            }

            if let Some(selection) = cursor.selection() {
                self.actions[action_index].push_change(Change {
                    index: selection.start,
                    added: false,
                    text: buffer.substring(selection.start, selection.len()),
                });
                lsp_changes.push(DocumentChange {
                    start: buffer.index_to_coord(selection.start),
                    end: buffer.index_to_coord(selection.end),
                    text: String::new(),
                });
                buffer.remove_text(selection.start, selection.len());
                changed = true;
                delta_removed = selection.len();
                cursor.set_index(buffer, selection.start);
                cursor.clear_selection();
                cursor.update_intended_column(buffer);
            } else {
                let index = cursor.index();
                let removal = match direction {
                    Direction::Backward if index >= 1 => Some(index - 1),
                    Direction::Forward if index < buffer.len() => Some(index),
                    _ => None,
                };
                if let Some(index) = removal {
                    self.actions[action_index].push_change(Change {
                        index,
                        added: false,
                        text: buffer.substring(index, 1),
                    });
                    lsp_changes.push(DocumentChange {
                        start: buffer.index_to_coord(index),
                        end: buffer.index_to_coord(index + 1),
                        text: String::new(),
                    });
                    buffer.remove_text(index, 1);
                    changed = true;
                    delta_removed = 1;
                    cursor.set_index(buffer, index);
                    cursor.update_intended_column(buffer);
                }
            }

            shift_following(&mut cursors, buffer, i, 0, delta_removed);
        }

        if !changed {
            return Commit {
                cursors,
                changes: Vec::new(),
            };
        }

        cursors.changed(buffer);
        self.actions[action_index].after = cursors.clone();
        self.bump_version();
        self.notify(&lsp_changes);
        Commit {
            cursors,
            changes: lsp_changes,
        }
    }

    /// Step back one action: apply its changes in reverse order with each
    /// change inverted. Returns the cursor set from before the action.
    pub fn undo(&mut self, buffer: &mut Buffer) -> Option<Commit> {
        if !self.has_undo() {
            return None;
        }
        self.ptr -= 1;
        let action = self.actions[self.ptr].clone();
        let mut lsp_changes = Vec::new();

        for change in action.changes.iter().rev() {
            if change.added {
                debug_assert_eq!(
                    change.text,
                    buffer.substring(change.index, change.text.len())
                );
                lsp_changes.push(DocumentChange {
                    start: buffer.index_to_coord(change.index),
                    end: buffer.index_to_coord(change.index + change.text.len()),
                    text: String::new(),
                });
                buffer.remove_text(change.index, change.text.len());
            } else {
                let start = buffer.index_to_coord(change.index);
                lsp_changes.push(DocumentChange {
                    start,
                    end: start,
                    text: String::from_utf8_lossy(&change.text).into_owned(),
                });
                buffer.insert_text(change.index, &change.text);
            }
        }

        self.bump_version();
        self.end_action();
        self.notify(&lsp_changes);
        trace!(target: "doc.history", ptr = self.ptr, version = self.version, "undo");
        Some(Commit {
            cursors: action.before,
            changes: lsp_changes,
        })
    }

    /// Re-apply the next action forward. Returns its after-cursors.
    pub fn redo(&mut self, buffer: &mut Buffer) -> Option<Commit> {
        if !self.has_redo() {
            return None;
        }
        let action = self.actions[self.ptr].clone();
        self.ptr += 1;
        let mut lsp_changes = Vec::new();

        for change in &action.changes {
            if change.added {
                let start = buffer.index_to_coord(change.index);
                lsp_changes.push(DocumentChange {
                    start,
                    end: start,
                    text: String::from_utf8_lossy(&change.text).into_owned(),
                });
                buffer.insert_text(change.index, &change.text);
            } else {
                debug_assert_eq!(
                    change.text,
                    buffer.substring(change.index, change.text.len())
                );
                lsp_changes.push(DocumentChange {
                    start: buffer.index_to_coord(change.index),
                    end: buffer.index_to_coord(change.index + change.text.len()),
                    text: String::new(),
                });
                buffer.remove_text(change.index, change.text.len());
            }
        }

        self.bump_version();
        self.end_action();
        self.notify(&lsp_changes);
        trace!(target: "doc.history", ptr = self.ptr, version = self.version, "redo");
        Some(Commit {
            cursors: action.after,
            changes: lsp_changes,
        })
    }

    /// The action new changes append to. The first commit of a group opens
    /// a fresh action (truncating any redo tail) whether or not
    /// `start_action` already ran; later commits of the same group return
    /// the open one.
    fn listening_action(&mut self, cursors: &MultiCursor) -> usize {
        if !self.action_open {
            if self.ptr == self.actions.len() {
                self.actions.push(Action::default());
                self.ptr += 1;
            } else {
                self.actions[self.ptr] = Action::default();
                self.ptr += 1;
                self.actions.truncate(self.ptr);
            }
            self.actions[self.ptr - 1].before = cursors.clone();
            self.action_open = true;
        }
        debug_assert!(self.ptr == self.actions.len() && self.ptr > 0);
        self.ptr - 1
    }

    fn bump_version(&mut self) {
        self.version += 1;
    }

    fn notify(&mut self, changes: &[DocumentChange]) {
        let version = self.version;
        for (_, listener) in &mut self.listeners {
            listener(version, changes);
        }
    }
}

/// Move every cursor after `i` (and its selection anchor) by the net byte
/// delta the i-th cursor's edit produced.
fn shift_following(
    cursors: &mut MultiCursor,
    buffer: &Buffer,
    i: usize,
    added: usize,
    removed: usize,
) {
    let delta = added as isize - removed as isize;
    for j in (i + 1)..cursors.len() {
        let cursor = &mut cursors.cursors_mut()[j];
        let index = cursor.index().saturating_add_signed(delta);
        cursor.set_index(buffer, index);
        if let Some(anchor) = cursor.selection_start() {
            cursor.set_selection_start(anchor.saturating_add_signed(delta));
        }
    }
}
