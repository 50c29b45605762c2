//! The editor shell: registries for themes, languages, documents, and
//! language servers; the thread-safe event/result queues; and the main
//! loop tying input, collaborators, and drawing together.

pub mod bindings;
pub mod clock;
pub mod editor;
pub mod languages;

pub use bindings::default_keytree;
pub use clock::{Clock, ManualClock, WallClock};
pub use editor::{Editor, EditorMsg, Frontend};
pub use languages::{Language, LanguageRegistry};
