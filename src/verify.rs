//! Destination audit against the manifest
//!
//! Walks an existing destination tree and checks it against the
//! `graft_manifest.json` a previous run wrote: every recorded entry must
//! still exist, symlink entries must still point at the recorded target
//! (unless the patch pass replaced them), and nothing may exist in the
//! destination beyond the manifest's entries, patched paths, their parent
//! directories, and the manifest file itself.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::manifest::{GraftManifest, MANIFEST_FILE};
use crate::project::ProjectionMode;

/// Errors for destination verification
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("no manifest found at {path}")]
    MissingManifest { path: PathBuf },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Outcome of one verification pass
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Manifest entries checked
    pub checked: usize,
    /// Manifest entries missing from the destination
    pub missing: Vec<String>,
    /// Symlink entries pointing somewhere other than the recorded target
    pub wrong_target: Vec<String>,
    /// Destination entries not accounted for by the manifest
    pub extra: Vec<String>,
}

impl VerifyReport {
    /// True when the destination matches the manifest exactly
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && self.wrong_target.is_empty() && self.extra.is_empty()
    }
}

/// Verify `dest_root` against the manifest it contains.
pub fn verify_destination(dest_root: &Path) -> Result<VerifyReport, VerifyError> {
    let manifest_path = dest_root.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(VerifyError::MissingManifest {
            path: manifest_path,
        });
    }
    let manifest = GraftManifest::from_file(&manifest_path)?;

    // Paths the patch pass touched: their links were legitimately replaced
    // (or removed) after projection.
    let patched: BTreeSet<&str> = manifest
        .patches
        .iter()
        .flat_map(|p| p.files.iter().map(String::as_str))
        .collect();

    let mut report = VerifyReport::default();

    for entry in &manifest.entries {
        report.checked += 1;
        let dest = dest_root.join(&entry.path);
        let Ok(meta) = fs::symlink_metadata(&dest) else {
            if !patched.contains(entry.path.as_str()) {
                report.missing.push(entry.path.clone());
            }
            continue;
        };

        if manifest.mode == ProjectionMode::Symlink {
            if !meta.file_type().is_symlink() {
                if !patched.contains(entry.path.as_str()) {
                    report.wrong_target.push(entry.path.clone());
                }
                continue;
            }
            match fs::read_link(&dest) {
                Ok(link) if link == PathBuf::from(&entry.target) => {}
                _ => report.wrong_target.push(entry.path.clone()),
            }
        }
    }

    // Everything in the destination must be one of: a manifest entry, a
    // patched path, a parent directory of either, or the manifest file.
    let mut accounted: BTreeSet<PathBuf> = BTreeSet::new();
    let known_paths = manifest
        .entries
        .iter()
        .map(|e| e.path.as_str())
        .chain(patched.iter().copied());
    for known in known_paths {
        let mut path = PathBuf::from(known);
        accounted.insert(path.clone());
        while let Some(parent) = path.parent().map(Path::to_path_buf) {
            if parent.as_os_str().is_empty() {
                break;
            }
            accounted.insert(parent.clone());
            path = parent;
        }
    }

    for entry in WalkDir::new(dest_root).follow_links(false).min_depth(1) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(dest_root)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "walk escaped root"))?
            .to_path_buf();

        if rel == Path::new(MANIFEST_FILE) {
            continue;
        }
        if !accounted.contains(&rel) {
            report.extra.push(rel.to_string_lossy().into_owned());
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraftConfig;
    use crate::merge::TruncationPolicy;
    use crate::pipeline::Pipeline;
    use tempfile::TempDir;

    fn materialized() -> (TempDir, TempDir, TempDir) {
        let source = TempDir::new().unwrap();
        let overlay = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        fs::create_dir_all(source.path().join("tree")).unwrap();
        fs::write(source.path().join("tree/a.txt"), "a").unwrap();
        fs::create_dir_all(overlay.path().join("tree")).unwrap();
        fs::write(overlay.path().join("tree/b.txt"), "b").unwrap();

        let config = GraftConfig {
            source_root: source.path().to_path_buf(),
            overlay_root: overlay.path().to_path_buf(),
            dest_root: dest.path().to_path_buf(),
            root: "tree".to_string(),
            patches: Vec::new(),
            exclude: Vec::new(),
            step_limit: 1000,
            on_truncate: TruncationPolicy::Fail,
            mode: ProjectionMode::Symlink,
        };
        Pipeline::new(config).materialize().unwrap();
        (source, overlay, dest)
    }

    #[cfg(unix)]
    #[test]
    fn test_fresh_destination_passes() {
        let (_source, _overlay, dest) = materialized();
        let report = verify_destination(dest.path()).unwrap();
        assert!(report.passed(), "unexpected failures: {report:?}");
        assert_eq!(report.checked, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_entry_detected() {
        let (_source, _overlay, dest) = materialized();
        fs::remove_file(dest.path().join("tree/a.txt")).unwrap();

        let report = verify_destination(dest.path()).unwrap();
        assert!(!report.passed());
        assert_eq!(report.missing, vec!["tree/a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_retargeted_link_detected() {
        use std::os::unix::fs::symlink;

        let (_source, _overlay, dest) = materialized();
        let link = dest.path().join("tree/a.txt");
        fs::remove_file(&link).unwrap();
        symlink("/somewhere/else", &link).unwrap();

        let report = verify_destination(dest.path()).unwrap();
        assert_eq!(report.wrong_target, vec!["tree/a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_extra_entry_detected() {
        let (_source, _overlay, dest) = materialized();
        fs::write(dest.path().join("tree/stray.txt"), "stray").unwrap();

        let report = verify_destination(dest.path()).unwrap();
        assert_eq!(report.extra, vec!["tree/stray.txt"]);
    }

    #[test]
    fn test_missing_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        let err = verify_destination(dir.path()).unwrap_err();
        assert!(matches!(err, VerifyError::MissingManifest { .. }));
    }
}
