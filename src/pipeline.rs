//! Pipeline orchestration
//!
//! Runs a full materialization: resolve the overlay merge, project every
//! instruction into the destination, apply the patch list, and write the
//! manifest. All fatal conditions abort the run immediately; there is no
//! partial-success contract and no retry logic.

use std::fs;
use std::io;

use crate::config::GraftConfig;
use crate::exclude::{ExcludeError, ExcludeRules};
use crate::manifest::{GraftManifest, MANIFEST_FILE};
use crate::merge::{FsTree, MergeError, MergeOptions, MergeReport, Merger, RelPath};
use crate::patch::{apply_patch_list, PatchError};
use crate::project::{ProjectError, Projector};

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("exclusion rules error: {0}")]
    Exclude(#[from] ExcludeError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectError),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Exclude(_) => 1,
            PipelineError::Merge(MergeError::Truncated { .. }) => 12,
            PipelineError::Merge(_) => 10,
            PipelineError::Projection(_) => 20,
            PipelineError::Patch(_) => 30,
            PipelineError::Io(_) => 1,
            PipelineError::Serialization(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline execution context
pub struct Pipeline {
    config: GraftConfig,
    verbose: bool,
}

impl Pipeline {
    /// Create a new pipeline over a validated configuration
    pub fn new(config: GraftConfig) -> Self {
        Self {
            config,
            verbose: false,
        }
    }

    /// Enable progress output on stderr
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &GraftConfig {
        &self.config
    }

    /// Resolve the merge without touching the destination.
    pub fn plan(&self) -> PipelineResult<MergeReport> {
        let source = FsTree::new(&self.config.source_root);
        let overlay = FsTree::new(&self.config.overlay_root);

        let patterns: Vec<&str> = self.config.exclude.iter().map(String::as_str).collect();
        let excludes = ExcludeRules::new()?.with_patterns(&patterns)?;

        let merger = Merger::new(&source, &overlay)
            .with_excludes(excludes)
            .with_options(MergeOptions {
                step_limit: self.config.step_limit,
                on_truncate: self.config.on_truncate,
            });

        let start = RelPath::new(&self.config.root);
        let report = merger.resolve(&start)?;

        if self.verbose {
            eprintln!(
                "Resolved {} entries in {} steps under '{}'",
                report.instructions.len(),
                report.steps,
                self.config.root
            );
        }

        Ok(report)
    }

    /// Full run: resolve, project, patch, write the manifest.
    pub fn materialize(&self) -> PipelineResult<GraftManifest> {
        let report = self.plan()?;

        if !report.is_complete() {
            eprintln!(
                "Warning: traversal stopped at the step ceiling; {} path(s) left unresolved",
                report.pending.len()
            );
        }

        fs::create_dir_all(&self.config.dest_root)?;

        let projector = Projector::new(
            &self.config.source_root,
            &self.config.overlay_root,
            &self.config.dest_root,
        )
        .with_mode(self.config.mode);

        let entries = projector.project_all(&report.instructions)?;
        if self.verbose {
            eprintln!(
                "Projected {} entries into {}",
                entries.len(),
                projector.dest_root().display()
            );
        }

        let applied = apply_patch_list(
            &self.config.overlay_root,
            projector.dest_root(),
            &self.config.patches,
        )?;
        if self.verbose {
            for patch in &applied {
                eprintln!("Applied patch {} ({} file(s))", patch.path, patch.files.len());
            }
        }

        let manifest = GraftManifest::new(
            &self.config.root,
            self.config.mode,
            &entries,
            applied,
            report.pending.iter().map(|p| p.to_string()).collect(),
        );
        manifest.write_to_file(&projector.dest_root().join(MANIFEST_FILE))?;

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::TruncationPolicy;
    use crate::project::ProjectionMode;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn config_for(source: &Path, overlay: &Path, dest: &Path) -> GraftConfig {
        GraftConfig {
            source_root: source.to_path_buf(),
            overlay_root: overlay.to_path_buf(),
            dest_root: dest.to_path_buf(),
            root: "tree".to_string(),
            patches: Vec::new(),
            exclude: Vec::new(),
            step_limit: 1000,
            on_truncate: TruncationPolicy::Fail,
            mode: ProjectionMode::Symlink,
        }
    }

    #[test]
    fn test_plan_does_not_touch_destination() {
        let source = TempDir::new().unwrap();
        let overlay = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(source.path(), "tree/a.txt", "a");

        let dest_path = dest.path().join("merged");
        let pipeline = Pipeline::new(config_for(source.path(), overlay.path(), &dest_path));
        let report = pipeline.plan().unwrap();

        assert_eq!(report.instructions.len(), 1);
        assert!(!dest_path.exists());
    }

    #[test]
    fn test_materialize_writes_manifest() {
        let source = TempDir::new().unwrap();
        let overlay = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(source.path(), "tree/a.txt", "a");
        write(overlay.path(), "tree/b.txt", "b");

        let pipeline = Pipeline::new(config_for(source.path(), overlay.path(), dest.path()));
        let manifest = pipeline.materialize().unwrap();

        assert_eq!(manifest.entries.len(), 2);
        assert!(dest.path().join(MANIFEST_FILE).exists());
        assert_eq!(fs::read_to_string(dest.path().join("tree/a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dest.path().join("tree/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_materialize_truncation_is_fatal_by_default() {
        let source = TempDir::new().unwrap();
        let overlay = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(source.path(), "tree/a/b/deep.txt", "d");
        write(overlay.path(), "tree/a/b/other.txt", "o");

        let mut config = config_for(source.path(), overlay.path(), dest.path());
        config.step_limit = 1;

        let err = Pipeline::new(config).materialize().unwrap_err();
        assert!(matches!(err, PipelineError::Merge(MergeError::Truncated { .. })));
        assert_eq!(err.exit_code(), 12);
    }
}
