//! Relative path value type for tree traversal
//!
//! Paths handled by the merger are always relative to all three roots
//! (source, overlay, destination). Representing them as a segment list
//! instead of a joined string rules out double-slash and empty-segment
//! bugs at construction time.

use std::fmt;
use std::path::PathBuf;

/// A slash-separated path relative to a tree root.
///
/// Never contains empty segments. No `.`/`..` normalization is performed;
/// segments are taken as-is from directory listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath {
    segments: Vec<String>,
}

impl RelPath {
    /// Parse a relative path from a slash-separated string.
    ///
    /// Empty segments (leading, trailing or doubled slashes) are dropped.
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Append one child segment, returning the joined path.
    ///
    /// This is the single constructor used for all parent/child joins
    /// during traversal.
    pub fn join(&self, child: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(child.to_string());
        Self { segments }
    }

    /// The path segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True for the empty path (zero segments).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Convert to a native `PathBuf` for filesystem operations.
    pub fn to_path_buf(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for RelPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
