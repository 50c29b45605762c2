//! Theme: named styles looked up by dotted scope with longest-prefix
//! fallback (`"string.special"` falls back to `"string"`).

use std::collections::HashMap;

use crate::{Attrib, Style};

#[derive(Debug, Clone, Default)]
pub struct Theme {
    name: String,
    styles: HashMap<String, Style>,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            styles: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&mut self, scope: impl Into<String>, style: Style) {
        self.styles.insert(scope.into(), style);
    }

    /// Resolve a scope, stripping trailing dotted segments until a match is
    /// found. Unknown scopes resolve to the default (empty) style.
    pub fn get(&self, scope: &str) -> Style {
        let mut current = scope;
        loop {
            if let Some(style) = self.styles.get(current) {
                return *style;
            }
            match current.rfind('.') {
                Some(dot) => current = &current[..dot],
                None => return self.get_exact("ui.text").unwrap_or_default(),
            }
        }
    }

    pub fn get_exact(&self, scope: &str) -> Option<Style> {
        self.styles.get(scope).copied()
    }

    /// The built-in dark theme.
    pub fn default_dark() -> Self {
        let mut theme = Self::new("dark-plus");
        let mut set = |scope: &str, style: Style| theme.set(scope, style);

        set("ui.text", Style::new(Some(0xD4D4D4), Some(0x1E1E1E)));
        set("ui.linenum", Style::new(Some(0x858585), Some(0x1E1E1E)));
        set(
            "ui.linenum.selected",
            Style::new(Some(0xC6C6C6), Some(0x1E1E1E)),
        );
        set("ui.cursor", Style::new(Some(0x1E1E1E), Some(0xAEAFAD)));
        set("ui.selection", Style::new(None, Some(0x264F78)));
        set("ui.statusline", Style::new(Some(0xFFFFFF), Some(0x007ACC)));
        set(
            "ui.statusline.inactive",
            Style::new(Some(0x9B9B9B), Some(0x252526)),
        );
        set("ui.popup", Style::new(Some(0xCCCCCC), Some(0x252526)));
        set(
            "ui.popup.selected",
            Style::new(Some(0xFFFFFF), Some(0x094771)),
        );
        set("ui.separator", Style::new(Some(0x444444), Some(0x1E1E1E)));

        set("comment", Style::fg(0x6A9955).with_attrib(Attrib::ITALIC));
        set("keyword", Style::fg(0x569CD6));
        set("keyword.control", Style::fg(0xC586C0));
        set("string", Style::fg(0xCE9178));
        set("string.special", Style::fg(0xD7BA7D));
        set("constant", Style::fg(0x4FC1FF));
        set("constant.numeric", Style::fg(0xB5CEA8));
        set("function", Style::fg(0xDCDCAA));
        set("type", Style::fg(0x4EC9B0));
        set("variable", Style::fg(0x9CDCFE));
        set("operator", Style::fg(0xD4D4D4));

        set(
            "diagnostic.error",
            Style::fg(0xF44747).with_attrib(Attrib::UNDERLINE),
        );
        set(
            "diagnostic.warning",
            Style::fg(0xCCA700).with_attrib(Attrib::UNDERLINE),
        );
        set(
            "diagnostic.info",
            Style::fg(0x3794FF).with_attrib(Attrib::UNDERLINE),
        );
        set(
            "diagnostic.hint",
            Style::fg(0xB0B0B0).with_attrib(Attrib::UNDERLINE),
        );

        theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_scope_wins() {
        let theme = Theme::default_dark();
        assert_eq!(theme.get("keyword.control"), theme.get_exact("keyword.control").unwrap());
    }

    #[test]
    fn dotted_scope_falls_back_to_prefix() {
        let theme = Theme::default_dark();
        assert_eq!(theme.get("string.regex.flag"), theme.get_exact("string").unwrap());
        assert_eq!(theme.get("constant.numeric.float"), theme.get_exact("constant.numeric").unwrap());
    }

    #[test]
    fn unknown_scope_resolves_to_text() {
        let theme = Theme::default_dark();
        assert_eq!(theme.get("nonsense.scope"), theme.get_exact("ui.text").unwrap());
    }
}
