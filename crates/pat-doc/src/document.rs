//! A document: buffer + cursors + history + syntax, plus the language-server
//! state that arrives asynchronously (diagnostics, completion, signature
//! help).
//!
//! Documents are owned by the editor's registry and viewed by panes through
//! `Rc<RefCell<_>>`; every mutation happens on the UI thread. The
//! collaborator state is mutex-guarded so drawing code can borrow it behind
//! a lock guard while results are being applied.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use pat_lsp::types::{
    CompletionItem, Diagnostic, Position, Range, SignatureHelp, TextDocumentContentChangeEvent,
    TextEdit,
};
use pat_lsp::{LspClient, Uri};
use pat_text::{Buffer, Coord, codepoint};

use crate::cursor::MultiCursor;
use crate::history::{Commit, Direction, DocumentChange, History};
use crate::syntax::{HighlightSpan, Highlighter, NoHighlight};

/// Shared ownership handle: the registry is the primary owner, panes are
/// viewers.
pub type DocumentHandle = Rc<RefCell<Document>>;

/// Completion popup state. `start_index` is where the completed word begins;
/// the span `[start_index, caret)` is replaced on selection.
#[derive(Debug, Default)]
pub struct CompletionState {
    pub items: Vec<CompletionItem>,
    pub selected: usize,
    pub start_index: Option<usize>,
    pub filter: String,
    pub visible: bool,
}

impl CompletionState {
    /// Items surviving the typed-prefix filter, in server order.
    pub fn visible_items(&self) -> Vec<&CompletionItem> {
        if self.filter.is_empty() {
            return self.items.iter().collect();
        }
        let needle = self.filter.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.label.to_lowercase().starts_with(&needle))
            .collect()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.selected = 0;
        self.start_index = None;
        self.filter.clear();
        self.visible = false;
    }
}

pub struct Document {
    buffer: Buffer,
    cursors: MultiCursor,
    history: History,
    highlighter: Box<dyn Highlighter>,
    highlights: Vec<HighlightSpan>,
    syntax_dirty: bool,

    uri: Uri,
    language: String,
    readonly: bool,

    lsp: Option<Arc<LspClient>>,
    completion_triggers: Vec<char>,

    diagnostics: Mutex<Vec<Diagnostic>>,
    completion: Mutex<CompletionState>,
    signature_help: Mutex<Option<SignatureHelp>>,
}

impl Document {
    pub fn new(uri: Uri, buffer: Buffer) -> Self {
        Self {
            buffer,
            cursors: MultiCursor::new(),
            history: History::new(),
            highlighter: Box::new(NoHighlight),
            highlights: Vec::new(),
            syntax_dirty: true,
            uri,
            language: String::new(),
            readonly: false,
            lsp: None,
            completion_triggers: Vec::new(),
            diagnostics: Mutex::new(Vec::new()),
            completion: Mutex::new(CompletionState::default()),
            signature_help: Mutex::new(None),
        }
    }

    pub fn into_handle(self) -> DocumentHandle {
        Rc::new(RefCell::new(self))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn cursors(&self) -> &MultiCursor {
        &self.cursors
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
        self.syntax_dirty = true;
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    pub fn version(&self) -> u32 {
        self.history.version()
    }

    pub fn has_undo(&self) -> bool {
        self.history.has_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.history.has_redo()
    }

    pub fn set_highlighter(&mut self, highlighter: Box<dyn Highlighter>) {
        self.highlighter = highlighter;
        self.syntax_dirty = true;
    }

    pub fn set_completion_triggers(&mut self, triggers: Vec<char>) {
        self.completion_triggers = triggers;
    }

    /// Current highlight spans, reparsing the whole buffer when stale.
    pub fn highlights(&mut self) -> &[HighlightSpan] {
        if self.syntax_dirty {
            self.highlights = self.highlighter.highlight(&self.buffer, &self.language);
            self.syntax_dirty = false;
        }
        &self.highlights
    }

    pub fn diagnostics(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().expect("diagnostics lock")
    }

    pub fn completion(&self) -> MutexGuard<'_, CompletionState> {
        self.completion.lock().expect("completion lock")
    }

    pub fn signature_help(&self) -> MutexGuard<'_, Option<SignatureHelp>> {
        self.signature_help.lock().expect("signature lock")
    }

    // ------------------------------------------------------------------
    // Language server attachment
    // ------------------------------------------------------------------

    pub fn attach_lsp(&mut self, client: Arc<LspClient>) {
        client.did_open(
            &self.uri,
            &self.language,
            self.history.version(),
            &String::from_utf8_lossy(self.buffer.data()),
        );
        self.lsp = Some(client);
    }

    pub fn lsp(&self) -> Option<&Arc<LspClient>> {
        self.lsp.as_ref()
    }

    /// Called when the document leaves the registry.
    pub fn close(&mut self) {
        if let Some(lsp) = self.lsp.take() {
            lsp.did_close(&self.uri);
        }
    }

    // ------------------------------------------------------------------
    // Cursor motions
    // ------------------------------------------------------------------

    pub fn cursor_right(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            if let Some(selection) = cursor.selection() {
                cursor.set_index(&self.buffer, selection.end);
                cursor.clear_selection();
            } else if cursor.index() < self.buffer.len() {
                let next = cursor.index() + 1;
                cursor.set_index(&self.buffer, next);
            }
            cursor.update_intended_column(&self.buffer);
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn cursor_left(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            if let Some(selection) = cursor.selection() {
                cursor.set_index(&self.buffer, selection.start);
                cursor.clear_selection();
            } else if cursor.index() > 0 {
                let prev = cursor.index() - 1;
                cursor.set_index(&self.buffer, prev);
            }
            cursor.update_intended_column(&self.buffer);
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn cursor_up(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            cursor.clear_selection();
            let coord = cursor.coord();
            if coord.line == 0 {
                cursor.set_index(&self.buffer, 0);
                cursor.set_intended_column(0);
            } else {
                let (index, _) = self
                    .buffer
                    .column_to_index(cursor.intended_column(), coord.line - 1);
                cursor.set_index(&self.buffer, index);
            }
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn cursor_down(&mut self) {
        self.motion_boundary();
        let last_line = self.buffer.line_count() - 1;
        for cursor in self.cursors.cursors_mut() {
            cursor.clear_selection();
            let coord = cursor.coord();
            if coord.line == last_line {
                let end = self.buffer.line(last_line).end;
                cursor.set_index(&self.buffer, end);
                cursor.update_intended_column(&self.buffer);
            } else {
                let (index, _) = self
                    .buffer
                    .column_to_index(cursor.intended_column(), coord.line + 1);
                cursor.set_index(&self.buffer, index);
            }
        }
        self.cursors.changed(&self.buffer);
    }

    /// Two-stage home: first to the first non-whitespace byte, then to
    /// column zero.
    pub fn cursor_home(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            cursor.clear_selection();
            let target = home_index(&self.buffer, cursor.coord());
            cursor.set_index(&self.buffer, target);
            cursor.update_intended_column(&self.buffer);
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn cursor_end(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            cursor.clear_selection();
            let end = self.buffer.line(cursor.coord().line).end;
            cursor.set_index(&self.buffer, end);
            cursor.update_intended_column(&self.buffer);
        }
        self.cursors.changed(&self.buffer);
    }

    // ------------------------------------------------------------------
    // Selecting motions: anchor before moving, collapse when the caret
    // returns to the anchor.
    // ------------------------------------------------------------------

    pub fn select_right(&mut self) {
        self.motion_boundary();
        let len = self.buffer.len();
        for cursor in self.cursors.cursors_mut() {
            let index = cursor.index();
            if index < len {
                if !cursor.has_selection() {
                    cursor.set_selection_start(index);
                }
                cursor.set_index(&self.buffer, index + 1);
                if cursor.selection_start() == Some(cursor.index()) {
                    cursor.clear_selection();
                }
            }
            cursor.update_intended_column(&self.buffer);
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn select_left(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            let index = cursor.index();
            if index > 0 {
                if !cursor.has_selection() {
                    cursor.set_selection_start(index);
                }
                cursor.set_index(&self.buffer, index - 1);
                if cursor.selection_start() == Some(cursor.index()) {
                    cursor.clear_selection();
                }
            }
            cursor.update_intended_column(&self.buffer);
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn select_up(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            let coord = cursor.coord();
            let index = cursor.index();
            if index == 0 {
                continue;
            }
            if !cursor.has_selection() {
                cursor.set_selection_start(index);
            }
            if coord.line == 0 {
                cursor.set_index(&self.buffer, 0);
                cursor.update_intended_column(&self.buffer);
                continue;
            }
            let (target, _) = self
                .buffer
                .column_to_index(cursor.intended_column(), coord.line - 1);
            cursor.set_index(&self.buffer, target);
            if cursor.selection_start() == Some(cursor.index()) {
                cursor.clear_selection();
            }
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn select_down(&mut self) {
        self.motion_boundary();
        let last_line = self.buffer.line_count() - 1;
        let len = self.buffer.len();
        for cursor in self.cursors.cursors_mut() {
            let coord = cursor.coord();
            let index = cursor.index();
            if coord.line == last_line && index == len {
                continue;
            }
            if !cursor.has_selection() {
                cursor.set_selection_start(index);
            }
            if coord.line == last_line {
                let end = self.buffer.line(last_line).end;
                cursor.set_index(&self.buffer, end);
                cursor.update_intended_column(&self.buffer);
                continue;
            }
            let (target, _) = self
                .buffer
                .column_to_index(cursor.intended_column(), coord.line + 1);
            cursor.set_index(&self.buffer, target);
            if cursor.selection_start() == Some(cursor.index()) {
                cursor.clear_selection();
            }
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn select_home(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            if !cursor.has_selection() {
                cursor.set_selection_start(cursor.index());
            }
            let target = home_index(&self.buffer, cursor.coord());
            cursor.set_index(&self.buffer, target);
            cursor.update_intended_column(&self.buffer);
            if cursor.selection_start() == Some(cursor.index()) {
                cursor.clear_selection();
            }
        }
        self.cursors.changed(&self.buffer);
    }

    pub fn select_end(&mut self) {
        self.motion_boundary();
        for cursor in self.cursors.cursors_mut() {
            let coord = cursor.coord();
            let line = self.buffer.line(coord.line);
            if coord.character == line.len() {
                continue;
            }
            if !cursor.has_selection() {
                cursor.set_selection_start(cursor.index());
            }
            cursor.set_index(&self.buffer, line.end);
            cursor.update_intended_column(&self.buffer);
            if cursor.selection_start() == Some(cursor.index()) {
                cursor.clear_selection();
            }
        }
        self.cursors.changed(&self.buffer);
    }

    // ------------------------------------------------------------------
    // Multi-cursor
    // ------------------------------------------------------------------

    pub fn add_cursor_down(&mut self) {
        self.motion_boundary();
        self.cursors.add_cursor_down(&self.buffer);
    }

    pub fn add_cursor_up(&mut self) {
        self.motion_boundary();
        self.cursors.add_cursor_up(&self.buffer);
    }

    pub fn clear_multi_cursors(&mut self) {
        self.cursors.clear_multi_cursors();
    }

    /// Collapse to a single cursor at (a clamped) `coord`; used for jumps
    /// from the finder and go-to-definition.
    pub fn jump_to(&mut self, coord: Coord) {
        self.motion_boundary();
        let line = coord.line.min(self.buffer.line_count() - 1);
        let character = coord.character.min(self.buffer.line(line).len());
        let index = self.buffer.coord_to_index(Coord::new(line, character));
        self.cursors.clear_multi_cursors();
        let cursor = self.cursors.primary_mut();
        cursor.clear_selection();
        cursor.set_index(&self.buffer, index);
        cursor.update_intended_column(&self.buffer);
        self.cursors.changed(&self.buffer);
    }

    pub fn clear_selections(&mut self) {
        self.cursors.clear_selections();
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    pub fn insert_text(&mut self, text: &str) {
        if self.readonly {
            return;
        }
        let commit = self
            .history
            .commit_insert_text(&mut self.buffer, &self.cursors, text.as_bytes());
        self.after_commit(commit);
    }

    /// Insert one typed character, driving the completion machinery: a
    /// trigger character opens a completion request; a word character
    /// narrows an open popup; anything else closes it.
    pub fn enter_character(&mut self, ch: char) {
        if self.readonly {
            return;
        }
        let mut encoded = [0u8; 4];
        let text = ch.encode_utf8(&mut encoded);
        let commit = self
            .history
            .commit_insert_text(&mut self.buffer, &self.cursors, text.as_bytes());
        self.after_commit(commit);

        if self.lsp.is_none() {
            return;
        }
        if self.completion_triggers.contains(&ch) {
            let caret = self.cursors.primary().index();
            {
                let mut completion = self.completion();
                completion.clear();
                completion.start_index = Some(caret);
            }
            self.request_completion();
        } else {
            let mut completion = self.completion();
            if completion.visible {
                if codepoint::is_word_char(ch as u32) {
                    completion.filter.push(ch);
                } else {
                    completion.clear();
                }
            }
        }
    }

    pub fn backspace(&mut self) {
        if self.readonly {
            return;
        }
        let commit =
            self.history
                .commit_remove_text(&mut self.buffer, &self.cursors, Direction::Backward);
        self.after_commit(commit);

        let mut completion = self.completion();
        if completion.visible && completion.filter.pop().is_none() {
            completion.clear();
        }
    }

    pub fn delete_forward(&mut self) {
        if self.readonly {
            return;
        }
        let commit =
            self.history
                .commit_remove_text(&mut self.buffer, &self.cursors, Direction::Forward);
        self.after_commit(commit);
    }

    pub fn undo(&mut self) {
        if self.readonly {
            return;
        }
        if let Some(commit) = self.history.undo(&mut self.buffer) {
            self.after_commit(commit);
        }
    }

    pub fn redo(&mut self) {
        if self.readonly {
            return;
        }
        if let Some(commit) = self.history.redo(&mut self.buffer) {
            self.after_commit(commit);
        }
    }

    /// Group the edits of a macro run into one undo step. Cursor motions
    /// inside the group do not split it; only [`Document::end_action_group`]
    /// (or an undo/redo) closes it.
    pub fn begin_action_group(&mut self) {
        self.history.start_action();
    }

    pub fn end_action_group(&mut self) {
        self.history.end_action();
    }

    fn after_commit(&mut self, commit: Commit) {
        self.cursors = commit.cursors;
        if commit.changes.is_empty() {
            return;
        }
        self.syntax_dirty = true;
        if let Some(lsp) = &self.lsp {
            lsp.did_change(
                &self.uri,
                self.history.version(),
                to_lsp_changes(&commit.changes),
            );
        }
    }

    /// A motion breaks implicit undo coalescing (explicit groups stay open)
    /// and closes any completion popup.
    fn motion_boundary(&mut self) {
        self.history.interrupt();
        self.completion.lock().expect("completion lock").clear();
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Manually open completion at the primary cursor; the word under the
    /// caret becomes the initial filter.
    pub fn trigger_completion(&mut self) {
        if self.lsp.is_none() {
            return;
        }
        let caret = self.cursors.primary().index();
        let mut start = caret;
        while start > 0 && codepoint::is_word_char(self.buffer.at(start - 1)) {
            start -= 1;
        }
        {
            let mut completion = self.completion();
            completion.clear();
            completion.start_index = Some(start);
            completion.filter =
                String::from_utf8_lossy(&self.buffer.substring(start, caret - start)).into_owned();
        }
        self.request_completion();
    }

    fn request_completion(&self) {
        let Some(lsp) = &self.lsp else { return };
        let coord = self.cursors.primary().coord();
        lsp.completion(&self.uri, self.history.version(), coord_to_position(coord));
    }

    pub fn request_signature_help(&self) {
        let Some(lsp) = &self.lsp else { return };
        let coord = self.cursors.primary().coord();
        lsp.signature_help(&self.uri, self.history.version(), coord_to_position(coord));
    }

    /// Completion results arriving from the server. Stale responses (sent
    /// for an older document version) are discarded.
    pub fn on_completion_results(&mut self, version: u32, items: Vec<CompletionItem>) {
        if version != self.history.version() {
            debug!(
                target: "doc.completion",
                uri = %self.uri,
                stale = version,
                current = self.history.version(),
                "discarding stale completion response"
            );
            return;
        }
        let mut completion = self.completion();
        if completion.start_index.is_none() {
            completion.start_index = Some(self.cursors.primary().index());
        }
        completion.visible = !items.is_empty();
        completion.selected = 0;
        completion.items = items;
    }

    pub fn on_signature_help(&mut self, version: u32, help: Option<SignatureHelp>) {
        if version != self.history.version() {
            return;
        }
        *self.signature_help.lock().expect("signature lock") = help;
    }

    pub fn cycle_completion_list(&mut self, reversed: bool) {
        let mut completion = self.completion();
        let count = completion.visible_items().len();
        if count == 0 {
            return;
        }
        completion.selected = if reversed {
            (completion.selected + count - 1) % count
        } else {
            (completion.selected + 1) % count
        };
    }

    pub fn clear_completion_items(&mut self) {
        self.completion().clear();
    }

    /// Apply the selected item: replace `[start_index, caret)` at every
    /// cursor with the insertion text, then apply any additional edits the
    /// server attached (imports and the like).
    pub fn select_completion_item(&mut self) {
        let (insertion, additional, prefix_len) = {
            let completion = self.completion();
            let Some(start) = completion.start_index else {
                return;
            };
            let visible = completion.visible_items();
            let Some(item) = visible.get(completion.selected) else {
                return;
            };
            let caret = self.cursors.primary().index();
            (
                item.insertion().to_string(),
                item.additional_text_edits.clone().unwrap_or_default(),
                caret.saturating_sub(start),
            )
        };

        self.begin_action_group();
        for cursor in self.cursors.cursors_mut() {
            cursor.set_selection_start(cursor.index().saturating_sub(prefix_len));
        }
        let commit =
            self.history
                .commit_insert_text(&mut self.buffer, &self.cursors, insertion.as_bytes());
        self.after_commit(commit);
        self.apply_text_edits(&additional);
        self.end_action_group();

        self.completion().clear();
    }

    /// Apply server-provided edits bottom-up so earlier ranges stay valid.
    fn apply_text_edits(&mut self, edits: &[TextEdit]) {
        let mut edits: Vec<&TextEdit> = edits.iter().collect();
        edits.sort_by_key(|edit| std::cmp::Reverse((edit.range.start.line, edit.range.start.character)));

        for edit in edits {
            let Some(start) = self
                .buffer
                .is_valid_coord(position_to_coord(edit.range.start))
            else {
                trace!(target: "doc.completion", uri = %self.uri, "dropping edit outside buffer");
                continue;
            };
            let Some(end) = self.buffer.is_valid_coord(position_to_coord(edit.range.end)) else {
                continue;
            };

            let mut scratch = MultiCursor::new();
            scratch.primary_mut().set_index(&self.buffer, end.max(start));
            scratch.primary_mut().set_selection_start(start.min(end));
            let commit = self.history.commit_insert_text(
                &mut self.buffer,
                &scratch,
                edit.new_text.as_bytes(),
            );

            // Keep the real cursors in place relative to the edit.
            let removed = end.max(start) - start.min(end);
            let added = edit.new_text.len();
            let pivot = start.min(end);
            for cursor in self.cursors.cursors_mut() {
                if cursor.index() >= pivot {
                    let shifted = cursor
                        .index()
                        .saturating_add_signed(added as isize - removed as isize);
                    cursor.set_index(&self.buffer, shifted);
                }
            }
            self.cursors.changed(&self.buffer);

            if let Some(lsp) = &self.lsp {
                lsp.did_change(
                    &self.uri,
                    self.history.version(),
                    to_lsp_changes(&commit.changes),
                );
            }
            self.syntax_dirty = true;
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Diagnostics pushed by the server, keyed to a document version when
    /// the server supports it; stale sets are dropped.
    pub fn push_diagnostics(&mut self, version: Option<u32>, diagnostics: Vec<Diagnostic>) {
        if let Some(version) = version
            && version != self.history.version()
        {
            debug!(
                target: "doc.diagnostics",
                uri = %self.uri,
                stale = version,
                current = self.history.version(),
                "discarding stale diagnostics"
            );
            return;
        }
        *self.diagnostics.lock().expect("diagnostics lock") = diagnostics;
    }
}

/// First non-whitespace index of the line, or the line start when the caret
/// is already at or before the first non-whitespace byte.
fn home_index(buffer: &Buffer, coord: Coord) -> usize {
    let line = buffer.line(coord.line);
    let mut first_nonws = line.start;
    while first_nonws <= line.end && first_nonws < buffer.len() {
        let byte = buffer.at(first_nonws);
        if byte != b' ' as u32 && byte != b'\t' as u32 {
            break;
        }
        first_nonws += 1;
    }
    let nonws_character = first_nonws - line.start;
    if coord.character == 0 || coord.character > nonws_character {
        first_nonws
    } else {
        line.start
    }
}

pub fn coord_to_position(coord: Coord) -> Position {
    Position::new(coord.line as u32, coord.character as u32)
}

pub fn position_to_coord(position: Position) -> Coord {
    Coord::new(position.line as usize, position.character as usize)
}

/// Coordinate-space history changes in the LSP wire shape.
pub fn to_lsp_changes(changes: &[DocumentChange]) -> Vec<TextDocumentContentChangeEvent> {
    changes
        .iter()
        .map(|change| TextDocumentContentChangeEvent {
            range: Some(Range::new(
                coord_to_position(change.start),
                coord_to_position(change.end),
            )),
            text: change.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(text: &str) -> Document {
        Document::new(Uri::from_path("/tmp/test.txt"), Buffer::from_str(text))
    }

    #[test]
    fn typing_and_motion_round_trip() {
        let mut d = doc("");
        d.insert_text("abc\n");
        d.insert_text("d");
        assert_eq!(d.buffer().data(), b"abc\nd");
        assert_eq!(d.cursors().primary().index(), 5);
        assert_eq!(d.cursors().primary().coord(), Coord::new(1, 1));
    }

    #[test]
    fn motion_separates_undo_groups() {
        let mut d = doc("");
        d.insert_text("a");
        d.cursor_left();
        d.cursor_right();
        d.insert_text("b");
        d.undo();
        assert_eq!(d.buffer().data(), b"a");
        d.undo();
        assert_eq!(d.buffer().data(), b"");
    }

    #[test]
    fn action_group_survives_motions() {
        let mut d = doc("");
        d.begin_action_group();
        d.insert_text("ab");
        d.cursor_left(); // a motion inside the group must not split it
        d.insert_text("X");
        d.end_action_group();
        assert_eq!(d.buffer().data(), b"aXb");
        d.undo();
        assert_eq!(d.buffer().data(), b"");
    }

    #[test]
    fn action_group_is_one_undo_step() {
        let mut d = doc("");
        d.begin_action_group();
        d.insert_text("one ");
        d.insert_text("two");
        d.end_action_group();
        d.insert_text("!"); // separate step once the group is closed
        d.undo();
        assert_eq!(d.buffer().data(), b"one two");
        d.undo();
        assert_eq!(d.buffer().data(), b"");
    }

    #[test]
    fn completion_accept_as_first_edit_is_undoable() {
        // Accepting a completion can be the very first edit of a document;
        // the grouped commit must open the history cleanly.
        let mut d = doc("");
        {
            let mut completion = d.completion();
            completion.items = vec![CompletionItem {
                label: "println".into(),
                ..Default::default()
            }];
            completion.visible = true;
            completion.selected = 0;
            completion.start_index = Some(0);
        }
        d.select_completion_item();
        assert_eq!(d.buffer().data(), b"println");
        d.undo();
        assert_eq!(d.buffer().data(), b"");
    }

    #[test]
    fn vertical_motion_keeps_intended_column() {
        let mut d = doc("a long line\nhi\nanother long");
        // Place the caret at column 8 of line 0.
        for _ in 0..8 {
            d.cursor_right();
        }
        assert_eq!(d.cursors().primary().coord(), Coord::new(0, 8));
        d.cursor_down();
        // Line "hi" is short: caret clamps to its end.
        assert_eq!(d.cursors().primary().coord(), Coord::new(1, 2));
        d.cursor_down();
        // Sticky column brings it back out on the long line.
        assert_eq!(d.cursors().primary().coord(), Coord::new(2, 8));
    }

    #[test]
    fn home_is_two_stage() {
        let mut d = doc("    indented");
        d.cursor_end();
        d.cursor_home();
        assert_eq!(d.cursors().primary().coord(), Coord::new(0, 4));
        d.cursor_home();
        assert_eq!(d.cursors().primary().coord(), Coord::new(0, 0));
        d.cursor_home();
        assert_eq!(d.cursors().primary().coord(), Coord::new(0, 4));
    }

    #[test]
    fn select_right_then_back_collapses() {
        let mut d = doc("word");
        d.select_right();
        assert!(d.cursors().primary().has_selection());
        d.select_left();
        assert!(!d.cursors().primary().has_selection());
    }

    #[test]
    fn select_then_type_replaces() {
        let mut d = doc("hello");
        for _ in 0..5 {
            d.select_right();
        }
        d.insert_text("bye");
        assert_eq!(d.buffer().data(), b"bye");
    }

    #[test]
    fn multi_cursor_line_duplication() {
        let mut d = doc("foo\nbar\nbaz");
        d.cursor_end();
        d.add_cursor_down();
        d.add_cursor_down();
        let indices: Vec<usize> = d.cursors().cursors().iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![3, 7, 11]);
        d.insert_text("X");
        assert_eq!(d.buffer().data(), b"fooX\nbarX\nbazX");
        let indices: Vec<usize> = d.cursors().cursors().iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![4, 9, 14]);
    }

    #[test]
    fn readonly_blocks_edits() {
        let mut d = doc("fixed");
        d.set_readonly(true);
        d.insert_text("nope");
        d.backspace();
        assert_eq!(d.buffer().data(), b"fixed");
    }

    #[test]
    fn stale_completion_response_is_dropped() {
        let mut d = doc("ab");
        d.insert_text("c"); // version 1
        d.on_completion_results(
            0,
            vec![CompletionItem {
                label: "stale".into(),
                ..Default::default()
            }],
        );
        assert!(!d.completion().visible);

        d.on_completion_results(
            1,
            vec![CompletionItem {
                label: "fresh".into(),
                ..Default::default()
            }],
        );
        assert!(d.completion().visible);
        assert_eq!(d.completion().items[0].label, "fresh");
    }

    #[test]
    fn completion_filter_narrows_items() {
        let mut d = doc("");
        d.on_completion_results(
            0,
            vec![
                CompletionItem { label: "foobar".into(), ..Default::default() },
                CompletionItem { label: "fizz".into(), ..Default::default() },
            ],
        );
        {
            let mut completion = d.completion();
            completion.filter = "fo".into();
            let visible: Vec<&str> =
                completion.visible_items().iter().map(|i| i.label.as_str()).collect();
            assert_eq!(visible, vec!["foobar"]);
        }
    }

    #[test]
    fn cycle_completion_wraps_both_directions() {
        let mut d = doc("");
        d.on_completion_results(
            0,
            vec![
                CompletionItem { label: "one".into(), ..Default::default() },
                CompletionItem { label: "two".into(), ..Default::default() },
            ],
        );
        assert_eq!(d.completion().selected, 0);
        d.cycle_completion_list(false);
        assert_eq!(d.completion().selected, 1);
        d.cycle_completion_list(false);
        assert_eq!(d.completion().selected, 0);
        d.cycle_completion_list(true);
        assert_eq!(d.completion().selected, 1);
    }

    #[test]
    fn select_completion_item_replaces_typed_prefix() {
        let mut d = doc("");
        d.insert_text("fo");
        {
            let mut completion = d.completion();
            completion.items = vec![CompletionItem {
                label: "foobar".into(),
                ..Default::default()
            }];
            completion.visible = true;
            completion.selected = 0;
            completion.start_index = Some(0);
        }
        d.select_completion_item();
        assert_eq!(d.buffer().data(), b"foobar");
        assert!(!d.completion().visible);
    }

    #[test]
    fn stale_diagnostics_are_dropped() {
        let mut d = doc("x");
        d.insert_text("y"); // version 1
        let diag = Diagnostic {
            range: Range::default(),
            severity: None,
            message: "old".into(),
            source: None,
        };
        d.push_diagnostics(Some(0), vec![diag.clone()]);
        assert!(d.diagnostics().is_empty());
        d.push_diagnostics(Some(1), vec![diag]);
        assert_eq!(d.diagnostics().len(), 1);
        // Unversioned pushes always apply.
        d.push_diagnostics(None, Vec::new());
        assert!(d.diagnostics().is_empty());
    }

    #[test]
    fn lsp_change_conversion_shape() {
        let changes = vec![DocumentChange {
            start: Coord::new(0, 0),
            end: Coord::new(0, 0),
            text: "x".into(),
        }];
        let lsp = to_lsp_changes(&changes);
        assert_eq!(lsp.len(), 1);
        let range = lsp[0].range.expect("ranged change");
        assert_eq!(range.start, Position::new(0, 0));
        assert_eq!(range.end, Position::new(0, 0));
        assert_eq!(lsp[0].text, "x");
    }
}
