//! Merge traversal errors

use std::io;

use super::RelPath;

/// Errors for the overlay merge traversal
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("traversal truncated after {steps} steps with {} paths unresolved", pending.len())]
    Truncated {
        /// Frontier steps processed before hitting the ceiling
        steps: usize,
        /// Paths still queued when the traversal stopped
        pending: Vec<RelPath>,
    },
}
