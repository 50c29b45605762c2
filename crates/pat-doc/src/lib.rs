//! The document model: cursors, the merging undo/redo history, the syntax
//! seam, and the [`Document`] type that composes them with language-server
//! state.

pub mod cursor;
pub mod document;
pub mod history;
pub mod syntax;

pub use cursor::{Cursor, MultiCursor};
pub use document::{CompletionState, Document};
pub use history::{Action, Change, Commit, Direction, DocumentChange, History};
pub use syntax::{HighlightSpan, Highlighter, NoHighlight};
