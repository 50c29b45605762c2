//! Language registry: file extension to language id, server command, and
//! completion trigger characters.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Language {
    pub id: String,
    /// Language-server executable and arguments, when one is known.
    pub server: Option<(String, Vec<String>)>,
    pub completion_triggers: Vec<char>,
}

#[derive(Debug, Default)]
pub struct LanguageRegistry {
    by_extension: HashMap<String, Language>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table; a configuration layer can extend it later.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            &["rs"],
            Language {
                id: "rust".into(),
                server: Some(("rust-analyzer".into(), vec![])),
                completion_triggers: vec!['.', ':'],
            },
        );
        registry.register(
            &["c", "h", "cpp", "hpp", "cc"],
            Language {
                id: "cpp".into(),
                server: Some(("clangd".into(), vec![])),
                completion_triggers: vec!['.', '>', ':'],
            },
        );
        registry.register(
            &["py"],
            Language {
                id: "python".into(),
                server: Some(("pylsp".into(), vec![])),
                completion_triggers: vec!['.'],
            },
        );
        registry.register(
            &["go"],
            Language {
                id: "go".into(),
                server: Some(("gopls".into(), vec![])),
                completion_triggers: vec!['.'],
            },
        );
        registry.register(
            &["js", "jsx", "ts", "tsx"],
            Language {
                id: "typescript".into(),
                server: Some((
                    "typescript-language-server".into(),
                    vec!["--stdio".into()],
                )),
                completion_triggers: vec!['.'],
            },
        );
        registry.register(
            &["toml"],
            Language {
                id: "toml".into(),
                server: None,
                completion_triggers: vec![],
            },
        );
        registry.register(
            &["md"],
            Language {
                id: "markdown".into(),
                server: None,
                completion_triggers: vec![],
            },
        );
        registry
    }

    pub fn register(&mut self, extensions: &[&str], language: Language) {
        for ext in extensions {
            self.by_extension.insert(ext.to_string(), language.clone());
        }
    }

    pub fn for_path(&self, path: &Path) -> Option<&Language> {
        let ext = path.extension()?.to_str()?;
        self.by_extension.get(ext)
    }
}
