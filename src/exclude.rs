//! Exclusion rules for overlay traversal
//!
//! Names matched here are dropped from the per-directory union before any
//! merge decision runs, so an excluded path contributes nothing from either
//! root and is never recursed into.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::merge::RelPath;

/// Patterns excluded from every traversal
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "**/.git",
    ".DS_Store",
    "**/.DS_Store",
];

/// Errors for exclusion rules
#[derive(Debug, thiserror::Error)]
pub enum ExcludeError {
    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Exclusion rules for filtering traversal entries
#[derive(Debug)]
pub struct ExcludeRules {
    glob_set: GlobSet,
    extra: Vec<String>,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self::new().unwrap()
    }
}

impl ExcludeRules {
    /// Create new exclusion rules with defaults
    pub fn new() -> Result<Self, ExcludeError> {
        let mut builder = GlobSetBuilder::new();

        for pattern in DEFAULT_EXCLUDES {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            glob_set: builder.build()?,
            extra: Vec::new(),
        })
    }

    /// Add additional patterns on top of the defaults
    pub fn with_patterns(mut self, patterns: &[&str]) -> Result<Self, ExcludeError> {
        let mut builder = GlobSetBuilder::new();

        for pattern in DEFAULT_EXCLUDES {
            builder.add(Glob::new(pattern)?);
        }

        for pattern in self.extra.iter().map(String::as_str).chain(
            patterns.iter().copied().filter(|p| !p.is_empty()),
        ) {
            builder.add(Glob::new(pattern)?);
        }

        self.extra
            .extend(patterns.iter().filter(|p| !p.is_empty()).map(|p| p.to_string()));
        self.glob_set = builder.build()?;
        Ok(self)
    }

    /// Check if a relative path should be excluded
    pub fn is_excluded(&self, rel: &RelPath) -> bool {
        self.glob_set.is_match(rel.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_git() {
        let rules = ExcludeRules::new().unwrap();

        assert!(rules.is_excluded(&RelPath::new(".git")));
        assert!(rules.is_excluded(&RelPath::new("icu4c/.git")));
    }

    #[test]
    fn test_default_excludes_ds_store() {
        let rules = ExcludeRules::new().unwrap();

        assert!(rules.is_excluded(&RelPath::new(".DS_Store")));
        assert!(rules.is_excluded(&RelPath::new("sub/dir/.DS_Store")));
    }

    #[test]
    fn test_normal_paths_not_excluded() {
        let rules = ExcludeRules::new().unwrap();

        assert!(!rules.is_excluded(&RelPath::new("icu4c/source/common")));
        assert!(!rules.is_excluded(&RelPath::new("BUILD.bazel")));
    }

    #[test]
    fn test_custom_patterns() {
        let rules = ExcludeRules::new()
            .unwrap()
            .with_patterns(&["**/out", "*.tmp"])
            .unwrap();

        assert!(rules.is_excluded(&RelPath::new("data/out")));
        assert!(rules.is_excluded(&RelPath::new("scratch.tmp")));
        // Defaults still apply
        assert!(rules.is_excluded(&RelPath::new(".git")));
    }

    #[test]
    fn test_patterns_accumulate() {
        let rules = ExcludeRules::new()
            .unwrap()
            .with_patterns(&["*.log"])
            .unwrap()
            .with_patterns(&["*.tmp"])
            .unwrap();

        assert!(rules.is_excluded(&RelPath::new("a.log")));
        assert!(rules.is_excluded(&RelPath::new("b.tmp")));
    }
}
