//! Common types used throughout Shopbox.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A slash-delimited path inside the remote storage account.
///
/// This is the human-readable name sequence stored alongside a product
/// file; it is independent of the opaque ids the provider uses. Leading
/// and trailing separators are stripped during parsing, so two
/// references to the same file compare equal regardless of how the
/// operator typed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// Create an empty path (the account root).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a path string, using '/' as separator.
    ///
    /// # Errors
    /// - Returns error if any segment between separators is empty
    ///   (e.g. `"a//b"`)
    pub fn parse(path: &str) -> crate::Result<Self> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = path.split('/').map(String::from).collect();
        for segment in &segments {
            if segment.is_empty() {
                return Err(crate::Error::InvalidInput(
                    "Path segment cannot be empty".to_string(),
                ));
            }
        }

        Ok(Self { segments })
    }

    /// Check if this is the root (empty) path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path segments from outermost folder to final name.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final name segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
