//! Read-only tree views over the source and overlay roots
//!
//! The merger only ever needs three probes against a root: does a relative
//! path exist, is it a directory, and what are the basenames directly under
//! it. Keeping that behind a trait lets tests substitute fixture trees and
//! keeps the traversal independent of where the roots live.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use super::RelPath;

/// Read-only capability set over one directory tree.
pub trait TreeView {
    /// Whether `rel` exists under this root (any entry type).
    fn exists(&self, rel: &RelPath) -> bool;

    /// Whether `rel` exists under this root and is a directory.
    fn is_dir(&self, rel: &RelPath) -> bool;

    /// Basenames of the entries directly under `rel`.
    ///
    /// A missing path or a non-directory yields the empty set; absence is
    /// an empty contribution, never an error. Other IO failures (for
    /// example permission errors) propagate.
    fn list(&self, rel: &RelPath) -> io::Result<BTreeSet<String>>;
}

/// Filesystem-backed tree view rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsTree {
    root: PathBuf,
}

impl FsTree {
    /// Create a view over the given root directory.
    ///
    /// The root does not have to exist; a missing root is an empty tree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory this view reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute-or-as-given path of `rel` under this root.
    pub fn full_path(&self, rel: &RelPath) -> PathBuf {
        self.root.join(rel.to_path_buf())
    }
}

impl TreeView for FsTree {
    fn exists(&self, rel: &RelPath) -> bool {
        self.full_path(rel).symlink_metadata().is_ok()
    }

    fn is_dir(&self, rel: &RelPath) -> bool {
        self.full_path(rel).is_dir()
    }

    fn list(&self, rel: &RelPath) -> io::Result<BTreeSet<String>> {
        let path = self.full_path(rel);
        if !path.is_dir() {
            return Ok(BTreeSet::new());
        }

        let mut names = BTreeSet::new();
        match std::fs::read_dir(&path) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    names.insert(entry.file_name().to_string_lossy().into_owned());
                }
                Ok(names)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e),
        }
    }
}
