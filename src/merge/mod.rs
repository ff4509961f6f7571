//! Overlay resolution
//!
//! Decides, for every path reachable under a start path, whether the
//! destination should expose the overlay's entry, the source's entry, or a
//! recursive merge of both. The traversal is a work-list walk over a LIFO
//! frontier of relative directory paths:
//!
//! - a name present as a directory on both sides is pushed back onto the
//!   frontier and merged recursively,
//! - otherwise the overlay wins whenever it has the name at all,
//! - otherwise the entry comes from the source.
//!
//! Missing roots and missing subtrees contribute nothing; they are never
//! errors. The walk is bounded by a configurable step ceiling.

mod error;
mod relpath;
mod tree;

pub use error::MergeError;
pub use relpath::RelPath;
pub use tree::{FsTree, TreeView};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::exclude::ExcludeRules;

/// Which root a destination entry is projected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Source,
    Overlay,
}

/// One materialization decision: expose `root`'s entry at `rel_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionInstruction {
    pub rel_path: RelPath,
    pub root: RootKind,
}

/// What to do when the step ceiling is hit before the frontier drains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Return [`MergeError::Truncated`] carrying the unresolved paths.
    #[default]
    Fail,
    /// Stop early and report the unresolved paths in
    /// [`MergeReport::pending`]. This matches the historical behavior of
    /// bounded-loop build macros, minus the silence.
    Continue,
}

impl std::str::FromStr for TruncationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "continue" => Ok(Self::Continue),
            other => Err(format!("unknown truncation policy: {other:?}")),
        }
    }
}

/// Default frontier step ceiling.
pub const DEFAULT_STEP_LIMIT: usize = 1000;

/// Tunables for one merge traversal
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Maximum number of frontier pops per traversal.
    pub step_limit: usize,
    /// Behavior when the ceiling is reached before the frontier drains.
    pub on_truncate: TruncationPolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            on_truncate: TruncationPolicy::default(),
        }
    }
}

/// Outcome of one traversal
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Projection instructions in traversal order, one per decided path.
    pub instructions: Vec<ProjectionInstruction>,
    /// Frontier pops consumed.
    pub steps: usize,
    /// Paths left unresolved by an early stop. Empty unless the step
    /// ceiling was hit under [`TruncationPolicy::Continue`].
    pub pending: Vec<RelPath>,
}

impl MergeReport {
    /// True when the traversal drained the frontier completely.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Overlay merge traversal over a source view and an overlay view.
pub struct Merger<'a> {
    source: &'a dyn TreeView,
    overlay: &'a dyn TreeView,
    exclude: ExcludeRules,
    options: MergeOptions,
}

impl<'a> Merger<'a> {
    /// Create a merger with default options and default exclusions.
    pub fn new(source: &'a dyn TreeView, overlay: &'a dyn TreeView) -> Self {
        Self {
            source,
            overlay,
            exclude: ExcludeRules::default(),
            options: MergeOptions::default(),
        }
    }

    /// Replace the exclusion rules.
    pub fn with_excludes(mut self, exclude: ExcludeRules) -> Self {
        self.exclude = exclude;
        self
    }

    /// Replace the traversal options.
    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve every path reachable under `start` into projection
    /// instructions.
    ///
    /// The start path itself is always expanded, never projected as a
    /// single entry: the destination's top-level directory is a real
    /// directory whose children are individual projections.
    pub fn resolve(&self, start: &RelPath) -> Result<MergeReport, MergeError> {
        let mut frontier: Vec<RelPath> = vec![start.clone()];
        let mut instructions = Vec::new();
        let mut steps = 0usize;

        while let Some(rel_dir) = frontier.pop() {
            if steps == self.options.step_limit {
                frontier.push(rel_dir);
                frontier.reverse();
                return match self.options.on_truncate {
                    TruncationPolicy::Fail => Err(MergeError::Truncated {
                        steps,
                        pending: frontier,
                    }),
                    TruncationPolicy::Continue => Ok(MergeReport {
                        instructions,
                        steps,
                        pending: frontier,
                    }),
                };
            }
            steps += 1;

            let source_names = if self.source.is_dir(&rel_dir) {
                self.source.list(&rel_dir)?
            } else {
                BTreeSet::new()
            };
            let overlay_names = if self.overlay.is_dir(&rel_dir) {
                self.overlay.list(&rel_dir)?
            } else {
                BTreeSet::new()
            };

            // Sorted, deduplicated union for deterministic output ordering.
            let mut all_names: BTreeSet<&str> =
                source_names.iter().map(String::as_str).collect();
            all_names.extend(overlay_names.iter().map(String::as_str));

            for name in all_names {
                let full = rel_dir.join(name);
                if self.exclude.is_excluded(&full) {
                    continue;
                }

                let in_source = source_names.contains(name);
                let in_overlay = overlay_names.contains(name);
                // Directory-ness is probed freshly per side, not inherited
                // from the parent listing.
                if in_source
                    && in_overlay
                    && self.source.is_dir(&full)
                    && self.overlay.is_dir(&full)
                {
                    frontier.push(full);
                } else if in_overlay {
                    instructions.push(ProjectionInstruction {
                        rel_path: full,
                        root: RootKind::Overlay,
                    });
                } else {
                    // Drawn from the union, so it must be in the source.
                    instructions.push(ProjectionInstruction {
                        rel_path: full,
                        root: RootKind::Source,
                    });
                }
            }
        }

        Ok(MergeReport {
            instructions,
            steps,
            pending: Vec::new(),
        })
    }
}
