//! `file://` document URIs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const FILE_SCHEME: &str = "file://";

/// A document identifier: `file://` followed by an absolute path. Relative
/// paths are resolved against the current directory at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        Self(format!("{FILE_SCHEME}{}", absolute.display()))
    }

    /// A URI for an unnamed scratch buffer; the editor asks for a path on
    /// first save.
    pub fn untitled(n: usize) -> Self {
        Self(format!("untitled://{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }

    /// Last path segment, for status lines and pane titles.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Uri {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_round_trip() {
        let uri = Uri::from_path("/tmp/file.rs");
        assert_eq!(uri.as_str(), "file:///tmp/file.rs");
        assert_eq!(uri.to_path(), Some(PathBuf::from("/tmp/file.rs")));
        assert_eq!(uri.file_name(), "file.rs");
    }

    #[test]
    fn untitled_has_no_path() {
        let uri = Uri::untitled(3);
        assert_eq!(uri.to_path(), None);
    }
}
