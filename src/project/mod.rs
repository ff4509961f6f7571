//! Destination materialization
//!
//! Consumes projection instructions and creates the corresponding entries
//! in the destination root. The default mechanism is a symbolic link to the
//! chosen root's matching path; copy mode exists for hosts where symlinks
//! are unavailable. Parent directories of every projected entry are created
//! as real directories, which is what lets merged directories compose
//! entries from both roots.
//!
//! Any failure to materialize an entry is fatal for the run. There is no
//! rollback; the destination may be left partially populated.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::merge::{ProjectionInstruction, RelPath, RootKind};

/// How destination entries expose the chosen root's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMode {
    /// Symbolic link to the chosen root's path.
    #[default]
    Symlink,
    /// Full copy (recursive for directories).
    Copy,
}

impl std::str::FromStr for ProjectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symlink" => Ok(Self::Symlink),
            "copy" => Ok(Self::Copy),
            other => Err(format!("unknown projection mode: {other:?}")),
        }
    }
}

/// Whether a projected entry is a file or a directory on the chosen root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Errors for projection operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("destination entry already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("projection target does not exist: {path}")]
    MissingTarget { path: PathBuf },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A destination entry that was materialized.
#[derive(Debug, Clone)]
pub struct ProjectedEntry {
    pub rel_path: RelPath,
    pub root: RootKind,
    /// Absolute path the entry exposes.
    pub target: PathBuf,
    pub kind: EntryKind,
}

/// Materializes projection instructions into a destination root.
pub struct Projector {
    source_root: PathBuf,
    overlay_root: PathBuf,
    dest_root: PathBuf,
    mode: ProjectionMode,
}

impl Projector {
    /// Create a projector over the three roots.
    ///
    /// Roots are made absolute up front: symlink targets must not depend on
    /// where the link itself lives.
    pub fn new(
        source_root: impl Into<PathBuf>,
        overlay_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_root: absolutize(&source_root.into()),
            overlay_root: absolutize(&overlay_root.into()),
            dest_root: absolutize(&dest_root.into()),
            mode: ProjectionMode::default(),
        }
    }

    /// Set the projection mode.
    pub fn with_mode(mut self, mode: ProjectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// The destination root entries are created under.
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    fn root_path(&self, root: RootKind) -> &Path {
        match root {
            RootKind::Source => &self.source_root,
            RootKind::Overlay => &self.overlay_root,
        }
    }

    /// Materialize a single instruction.
    pub fn project(
        &self,
        instruction: &ProjectionInstruction,
    ) -> Result<ProjectedEntry, ProjectError> {
        let rel = instruction.rel_path.to_path_buf();
        let target = self.root_path(instruction.root).join(&rel);

        if fs::symlink_metadata(&target).is_err() {
            return Err(ProjectError::MissingTarget { path: target });
        }
        let kind = if target.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let dest = self.dest_root.join(&rel);
        // The merger guarantees one instruction per path; an existing entry
        // means the destination is stale, not ours to overwrite.
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(ProjectError::AlreadyExists { path: dest });
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.mode {
            ProjectionMode::Symlink => make_symlink(&target, &dest)?,
            ProjectionMode::Copy => copy_entry(&target, &dest)?,
        }

        Ok(ProjectedEntry {
            rel_path: instruction.rel_path.clone(),
            root: instruction.root,
            target,
            kind,
        })
    }

    /// Materialize all instructions in emission order.
    ///
    /// Stops at the first failure; entries created before it remain.
    pub fn project_all(
        &self,
        instructions: &[ProjectionInstruction],
    ) -> Result<Vec<ProjectedEntry>, ProjectError> {
        let mut entries = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            entries.push(self.project(instruction)?);
        }
        Ok(entries)
    }
}

/// Make `path` absolute without requiring it to exist.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(windows)]
fn make_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, dest)
    } else {
        std::os::windows::fs::symlink_file(target, dest)
    }
}

/// Copy a file, symlink or directory tree from `target` to `dest`.
fn copy_entry(target: &Path, dest: &Path) -> Result<(), ProjectError> {
    let meta = fs::symlink_metadata(target)?;

    if meta.file_type().is_symlink() {
        let link = fs::read_link(target)?;
        make_symlink(&link, dest)?;
        return Ok(());
    }
    if meta.is_file() {
        fs::copy(target, dest)?;
        return Ok(());
    }

    fs::create_dir_all(dest)?;
    for entry in WalkDir::new(target).follow_links(false).min_depth(1) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "walk escaped root"))?;
        let out = dest.join(rel);

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            make_symlink(&link, &out)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}
