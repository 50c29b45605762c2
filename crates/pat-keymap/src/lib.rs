//! Key-binding engine: the packed key-event encoding, the `<C-x>i` sequence
//! grammar, and the mode-scoped prefix trie with its stateful traversal
//! cursor.
//!
//! Resolution is pure: feeding the same events through the same trie always
//! fires the same binding exactly once and returns the cursor to the root.
//! Ambiguity (a binding that is also a prefix of a longer one) is surfaced as
//! a held binding; the owner arms a disambiguation timer and either more
//! input shadows the ancestor or the timeout fires it.

mod encode;
mod parse;
mod tree;

pub use encode::{decode_key_event, encode_key_event};
pub use parse::parse_key_combination;
pub use tree::{Consumed, KeyActor, KeyTree, KeyTreeCursor, WILDCARD_MODE};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeymapError {
    #[error("malformed key combination {combo:?} at byte {at}: {reason}")]
    Parse {
        combo: String,
        at: usize,
        reason: &'static str,
    },
    #[error("empty key combination")]
    Empty,
}
