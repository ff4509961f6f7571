//! Run configuration (treegraft.toml)
//!
//! One TOML file describes a materialization: where the three roots live,
//! which top-level subtree to traverse, the patch list, and the traversal
//! tunables. CLI flags override individual file values.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::merge::{TruncationPolicy, DEFAULT_STEP_LIMIT};
use crate::project::ProjectionMode;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "treegraft.toml";

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Configuration for one materialization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraftConfig {
    /// Base tree being selectively overridden (e.g. the vendored drop).
    pub source_root: PathBuf,

    /// Tree whose entries take precedence over the source.
    pub overlay_root: PathBuf,

    /// Workspace root the merged view is materialized into.
    pub dest_root: PathBuf,

    /// Top-level relative path to traverse (e.g. "icu4c").
    pub root: String,

    /// Patch files, relative to the overlay root, applied in order after
    /// projection. Each is optional: missing files are skipped.
    #[serde(default)]
    pub patches: Vec<String>,

    /// Extra exclusion glob patterns on top of the built-in defaults.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Frontier step ceiling for the merge traversal.
    #[serde(default = "default_step_limit")]
    pub step_limit: usize,

    /// What to do when the step ceiling is hit.
    #[serde(default)]
    pub on_truncate: TruncationPolicy,

    /// How destination entries are materialized.
    #[serde(default)]
    pub mode: ProjectionMode,
}

fn default_step_limit() -> usize {
    DEFAULT_STEP_LIMIT
}

impl GraftConfig {
    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: GraftConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "'root' must name the subtree to traverse".to_string(),
            ));
        }
        if self.root.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "'root' must be relative to the tree roots".to_string(),
            ));
        }
        if self.step_limit == 0 {
            return Err(ConfigError::ValidationError(
                "'step_limit' must be at least 1".to_string(),
            ));
        }
        for patch in &self.patches {
            if patch.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "'patches' entries must be non-empty relative paths".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
source_root = "third_party/icu"
overlay_root = "overlays/icu"
dest_root = "out/merged"
root = "icu4c"
patches = ["patches/visibility.patch", "patches/build.patch"]
exclude = ["**/out"]
step_limit = 500
on_truncate = "continue"
mode = "copy"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = GraftConfig::from_str(FULL_CONFIG).unwrap();

        assert_eq!(config.source_root, PathBuf::from("third_party/icu"));
        assert_eq!(config.overlay_root, PathBuf::from("overlays/icu"));
        assert_eq!(config.dest_root, PathBuf::from("out/merged"));
        assert_eq!(config.root, "icu4c");
        assert_eq!(config.patches.len(), 2);
        assert_eq!(config.exclude, vec!["**/out"]);
        assert_eq!(config.step_limit, 500);
        assert_eq!(config.on_truncate, TruncationPolicy::Continue);
        assert_eq!(config.mode, ProjectionMode::Copy);
    }

    #[test]
    fn test_defaults() {
        let config = GraftConfig::from_str(
            r#"
source_root = "src"
overlay_root = "ovl"
dest_root = "dst"
root = "tree"
"#,
        )
        .unwrap();

        assert!(config.patches.is_empty());
        assert!(config.exclude.is_empty());
        assert_eq!(config.step_limit, DEFAULT_STEP_LIMIT);
        assert_eq!(config.on_truncate, TruncationPolicy::Fail);
        assert_eq!(config.mode, ProjectionMode::Symlink);
    }

    #[test]
    fn test_empty_root_rejected() {
        let err = GraftConfig::from_str(
            r#"
source_root = "src"
overlay_root = "ovl"
dest_root = "dst"
root = "  "
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_absolute_root_rejected() {
        let err = GraftConfig::from_str(
            r#"
source_root = "src"
overlay_root = "ovl"
dest_root = "dst"
root = "/abs"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_step_limit_rejected() {
        let err = GraftConfig::from_str(
            r#"
source_root = "src"
overlay_root = "ovl"
dest_root = "dst"
root = "tree"
step_limit = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = GraftConfig::from_str(
            r#"
source_root = "src"
overlay_root = "ovl"
dest_root = "dst"
root = "tree"
mode = "hardlink"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{FULL_CONFIG}").unwrap();

        let config = GraftConfig::from_file(file.path()).unwrap();
        assert_eq!(config.root, "icu4c");
    }
}
