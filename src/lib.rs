//! treegraft - overlay tree materializer
//!
//! This crate materializes a merged view of two physical directory trees -
//! a vendored source tree and a locally maintained overlay tree - into a
//! destination root, by symlinking each resolved path from whichever tree
//! wins, then applying an ordered list of patches to the result.

pub mod config;
pub mod exclude;
pub mod manifest;
pub mod merge;
pub mod patch;
pub mod pipeline;
pub mod project;
pub mod verify;

pub use config::{ConfigError, GraftConfig};
pub use manifest::GraftManifest;
pub use merge::{MergeError, MergeOptions, MergeReport, Merger, ProjectionInstruction, RelPath, RootKind};
pub use pipeline::{Pipeline, PipelineError};
pub use project::{ProjectionMode, Projector};
