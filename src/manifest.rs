//! Materialization manifest (graft_manifest.json)
//!
//! Records what a run projected and patched. Written into the destination
//! root after a successful materialization and read back by `verify`.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::merge::RootKind;
use crate::patch::AppliedPatch;
use crate::project::{EntryKind, ProjectedEntry, ProjectionMode};

/// Schema version for graft_manifest.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "treegraft/graft_manifest@1";

/// Manifest file name inside the destination root
pub const MANIFEST_FILE: &str = "graft_manifest.json";

/// A single projected destination entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraftEntry {
    /// Relative path within the destination
    pub path: String,

    /// Root the entry is projected from
    pub root: RootKind,

    /// Type of entry on the chosen root
    #[serde(rename = "type")]
    pub entry_kind: EntryKind,

    /// Absolute path the entry exposes
    pub target: String,
}

impl From<&ProjectedEntry> for GraftEntry {
    fn from(entry: &ProjectedEntry) -> Self {
        Self {
            path: entry.rel_path.to_string(),
            root: entry.root,
            entry_kind: entry.kind,
            target: entry.target.to_string_lossy().into_owned(),
        }
    }
}

/// Materialization manifest (graft_manifest.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraftManifest {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the manifest was created
    pub created_at: DateTime<Utc>,

    /// Run identifier
    pub run_id: Uuid,

    /// Projection mechanism used for this run
    pub mode: ProjectionMode,

    /// Top-level subtree that was traversed
    pub root: String,

    /// All projected entries, in projection order
    pub entries: Vec<GraftEntry>,

    /// Patch files applied after projection, in order
    #[serde(default)]
    pub patches: Vec<AppliedPatch>,

    /// Paths left unresolved by a truncated traversal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

impl GraftManifest {
    /// Build a manifest for a completed run.
    pub fn new(
        root: &str,
        mode: ProjectionMode,
        entries: &[ProjectedEntry],
        patches: Vec<AppliedPatch>,
        pending: Vec<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            run_id: Uuid::new_v4(),
            mode,
            root: root.to_string(),
            entries: entries.iter().map(GraftEntry::from).collect(),
            patches,
            pending,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }

    /// Find an entry by destination-relative path
    pub fn find_entry(&self, path: &str) -> Option<&GraftEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Count of entries projected from each root: (source, overlay)
    pub fn root_counts(&self) -> (usize, usize) {
        let source = self
            .entries
            .iter()
            .filter(|e| e.root == RootKind::Source)
            .count();
        (source, self.entries.len() - source)
    }
}
