//! The default key map. Users can layer their own bindings on top before
//! the tree is frozen behind its `Arc`.

use pat_keymap::KeyTree;
use tracing::warn;

/// Build the default tree. Registration failures are programming errors in
/// the table below, so they are logged rather than propagated.
pub fn default_keytree() -> KeyTree {
    let mut tree = KeyTree::new();
    let mut bind = |actor: &str, mode: &str, combo: &str, action: &str| {
        if let Err(err) = tree.register_binding(actor, mode, combo, action) {
            warn!(target: "input.keytree", %err, "default binding rejected");
        }
    };

    // Document pane, normal mode.
    for (combo, action) in [
        ("i", "mode.insert"),
        ("a", "mode.append"),
        ("h", "cursor.left"),
        ("j", "cursor.down"),
        ("k", "cursor.up"),
        ("l", "cursor.right"),
        ("u", "history.undo"),
        ("<C-r>", "history.redo"),
        ("x", "edit.delete"),
        ("gd", "lsp.definition"),
        ("gD", "lsp.declaration"),
        ("gh", "lsp.hover"),
        ("gs", "lsp.signature"),
        ("<esc>", "cursor.collapse"),
    ] {
        bind("document", "normal", combo, action);
    }

    // Document pane, insert mode.
    for (combo, action) in [
        ("<esc>", "mode.normal"),
        ("<enter>", "edit.newline"),
        ("<tab>", "edit.tab"),
        ("<backspace>", "edit.backspace"),
        ("<del>", "edit.delete"),
        ("<C-space>", "completion.trigger"),
        ("<C-n>", "completion.next"),
        ("<C-p>", "completion.prev"),
    ] {
        bind("document", "insert", combo, action);
    }

    // Document pane, any mode.
    for (combo, action) in [
        ("<up>", "cursor.up"),
        ("<down>", "cursor.down"),
        ("<left>", "cursor.left"),
        ("<right>", "cursor.right"),
        ("<home>", "cursor.home"),
        ("<end>", "cursor.end"),
        ("<S-up>", "select.up"),
        ("<S-down>", "select.down"),
        ("<S-left>", "select.left"),
        ("<S-right>", "select.right"),
        ("<S-home>", "select.home"),
        ("<S-end>", "select.end"),
        ("<A-down>", "cursor.add_below"),
        ("<A-up>", "cursor.add_above"),
    ] {
        bind("document", "*", combo, action);
    }

    // Window chrome.
    for (combo, action) in [
        ("<C-o>", "finder.files"),
        ("<C-g>", "finder.grep"),
        ("<esc>", "popup.close"),
        ("<C-w>", "pane.next"),
        ("<C-s>", "split.vertical"),
        ("<A-s>", "split.horizontal"),
        ("<C-x>", "pane.close"),
        ("<C-q>", "editor.quit"),
    ] {
        bind("window", "*", combo, action);
    }

    // Finder popup.
    for (combo, action) in [
        ("<down>", "finder.next"),
        ("<up>", "finder.prev"),
        ("<C-n>", "finder.next"),
        ("<C-p>", "finder.prev"),
        ("<enter>", "finder.accept"),
        ("<backspace>", "finder.backspace"),
        ("<left>", "finder.left"),
        ("<right>", "finder.right"),
    ] {
        bind("finder", "*", combo, action);
    }

    tree
}
