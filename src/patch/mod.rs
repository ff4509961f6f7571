//! Patch application over the materialized destination tree
//!
//! Applies an ordered list of unified-diff files after projection. Patch
//! paths are relative to the overlay root; a missing patch file is silently
//! skipped, while a malformed patch or a hunk that does not apply is fatal.
//! The strip level is fixed at one leading path component, matching
//! `patch -p1`.
//!
//! Patched files inside the destination are often still symlinks into the
//! source or overlay root. Writing through such a link would mutate the
//! vendored tree, so the link is replaced with a regular file holding the
//! patched content; the original trees are never touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Leading path components stripped from patch headers (`patch -p1`).
const STRIP_COMPONENTS: usize = 1;

/// Errors for patch parsing and application
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed patch at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("patch path {path:?} is not usable after stripping {STRIP_COMPONENTS} component(s)")]
    InvalidPath { path: String },

    #[error("hunk #{hunk} failed to apply to {file} at line {line}")]
    HunkMismatch {
        file: String,
        hunk: usize,
        line: usize,
    },

    #[error("patch target does not exist: {path}")]
    TargetMissing { path: PathBuf },

    #[error("patch creates a file that already exists: {path}")]
    TargetExists { path: PathBuf },
}

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HunkLine {
    Context(String),
    Add(String),
    Remove(String),
}

/// One `@@` hunk.
#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    lines: Vec<HunkLine>,
    /// `\ No newline at end of file` seen on the new side.
    new_no_newline: bool,
}

/// All hunks addressed at a single file.
#[derive(Debug, Clone)]
pub struct FilePatch {
    /// Header path on the old side; `None` for `/dev/null` (file creation).
    old_path: Option<String>,
    /// Header path on the new side; `None` for `/dev/null` (file deletion).
    new_path: Option<String>,
    hunks: Vec<Hunk>,
}

impl FilePatch {
    /// The header path naming the target, before stripping.
    fn raw_target(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    fn creates_file(&self) -> bool {
        self.old_path.is_none()
    }

    fn deletes_file(&self) -> bool {
        self.new_path.is_none()
    }
}

/// Record of one applied patch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedPatch {
    /// Patch path relative to the overlay root.
    pub path: String,
    /// SHA-256 of the patch file contents.
    pub sha256: String,
    /// Destination-relative paths the patch touched (modified, created or
    /// deleted), in application order.
    pub files: Vec<String>,
}

/// Parse a unified diff into per-file patches.
///
/// Lines outside `---`/`+++`/hunk sections (git headers, index lines,
/// commit messages) are ignored. A text with no file sections at all is
/// malformed.
pub fn parse(text: &str) -> Result<Vec<FilePatch>, PatchError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut patches = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(old_header) = lines[i].strip_prefix("--- ") else {
            i += 1;
            continue;
        };
        let new_header = lines
            .get(i + 1)
            .and_then(|l| l.strip_prefix("+++ "))
            .ok_or_else(|| PatchError::Malformed {
                line: i + 2,
                reason: "expected '+++' header after '---'".to_string(),
            })?;

        let old_path = parse_header_path(old_header);
        let new_path = parse_header_path(new_header);
        if old_path.is_none() && new_path.is_none() {
            return Err(PatchError::Malformed {
                line: i + 1,
                reason: "both sides of the file header are /dev/null".to_string(),
            });
        }
        i += 2;

        let mut hunks = Vec::new();
        while i < lines.len() && lines[i].starts_with("@@") {
            let (hunk, consumed) = parse_hunk(&lines, i)?;
            hunks.push(hunk);
            i += consumed;
        }

        if hunks.is_empty() {
            return Err(PatchError::Malformed {
                line: i,
                reason: "file header without hunks".to_string(),
            });
        }
        patches.push(FilePatch {
            old_path,
            new_path,
            hunks,
        });
    }

    if patches.is_empty() {
        return Err(PatchError::Malformed {
            line: lines.len(),
            reason: "no file sections found".to_string(),
        });
    }
    Ok(patches)
}

/// Apply every patch in `patches` (paths relative to `overlay_root`), in
/// list order, against `dest_root`. Missing patch files are skipped.
pub fn apply_patch_list(
    overlay_root: &Path,
    dest_root: &Path,
    patches: &[String],
) -> Result<Vec<AppliedPatch>, PatchError> {
    let mut applied = Vec::new();

    for rel in patches {
        let patch_path = overlay_root.join(rel);
        let text = match fs::read_to_string(&patch_path) {
            Ok(text) => text,
            // Apply-if-exists: absence is not an error.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        let file_patches = parse(&text)?;
        let mut files = Vec::with_capacity(file_patches.len());
        for fp in &file_patches {
            files.push(apply_file_patch(dest_root, fp)?);
        }

        applied.push(AppliedPatch {
            path: rel.clone(),
            sha256: hex::encode(Sha256::digest(text.as_bytes())),
            files,
        });
    }

    Ok(applied)
}

/// Apply one file's hunks against the destination tree.
///
/// Returns the destination-relative path that was touched.
pub fn apply_file_patch(dest_root: &Path, fp: &FilePatch) -> Result<String, PatchError> {
    let raw = fp.raw_target().ok_or_else(|| PatchError::InvalidPath {
        path: "/dev/null".to_string(),
    })?;
    let rel = strip_path(raw)?;
    let dest = dest_root.join(&rel);

    if fp.creates_file() {
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(PatchError::TargetExists { path: dest });
        }
        let content = apply_hunks("", fp, &rel)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, content)?;
        return Ok(rel);
    }

    if fs::symlink_metadata(&dest).is_err() {
        return Err(PatchError::TargetMissing { path: dest });
    }
    // Reads follow a projected symlink; the patched content lands in a
    // regular file so the projection target stays untouched.
    let original = fs::read_to_string(&dest)?;
    let patched = apply_hunks(&original, fp, &rel)?;

    if fp.deletes_file() && patched.is_empty() {
        fs::remove_file(&dest)?;
        return Ok(rel);
    }

    write_breaking_symlink(&dest, &patched)?;
    Ok(rel)
}

/// Strip the fixed number of leading components from a header path.
fn strip_path(raw: &str) -> Result<String, PatchError> {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() <= STRIP_COMPONENTS
        || raw.starts_with('/')
        || segments.contains(&"..")
    {
        return Err(PatchError::InvalidPath {
            path: raw.to_string(),
        });
    }
    Ok(segments[STRIP_COMPONENTS..].join("/"))
}

/// Header path, with any trailing tab-separated timestamp removed.
/// `/dev/null` maps to `None`.
fn parse_header_path(header: &str) -> Option<String> {
    let path = header.split('\t').next().unwrap_or(header).trim();
    if path == "/dev/null" {
        None
    } else {
        Some(path.to_string())
    }
}

/// Parse one hunk starting at `lines[start]` (the `@@` header).
/// Returns the hunk and the number of lines consumed.
fn parse_hunk(lines: &[&str], start: usize) -> Result<(Hunk, usize), PatchError> {
    let header = lines[start];
    let (old_start, old_count, _new_start, new_count) = parse_hunk_header(header, start + 1)?;

    let mut body = Vec::new();
    let mut old_seen = 0;
    let mut new_seen = 0;
    let mut new_no_newline = false;
    let mut i = start + 1;

    while i < lines.len() && (old_seen < old_count || new_seen < new_count) {
        let line = lines[i];
        if let Some(text) = line.strip_prefix('+') {
            body.push(HunkLine::Add(text.to_string()));
            new_seen += 1;
        } else if let Some(text) = line.strip_prefix('-') {
            body.push(HunkLine::Remove(text.to_string()));
            old_seen += 1;
        } else if let Some(text) = line.strip_prefix(' ') {
            body.push(HunkLine::Context(text.to_string()));
            old_seen += 1;
            new_seen += 1;
        } else if line.is_empty() {
            // Editors trim the single space off blank context lines.
            body.push(HunkLine::Context(String::new()));
            old_seen += 1;
            new_seen += 1;
        } else if line.starts_with('\\') {
            mark_no_newline(&body, &mut new_no_newline);
        } else {
            return Err(PatchError::Malformed {
                line: i + 1,
                reason: format!("unexpected line in hunk: {line:?}"),
            });
        }
        i += 1;
    }

    if old_seen != old_count || new_seen != new_count {
        return Err(PatchError::Malformed {
            line: start + 1,
            reason: "hunk body does not match header counts".to_string(),
        });
    }

    // The marker may trail the last counted line.
    if i < lines.len() && lines[i].starts_with('\\') {
        mark_no_newline(&body, &mut new_no_newline);
        i += 1;
    }

    Ok((
        Hunk {
            old_start,
            lines: body,
            new_no_newline,
        },
        i - start,
    ))
}

fn mark_no_newline(body: &[HunkLine], new_no_newline: &mut bool) {
    // The marker qualifies the preceding line; only the new side matters
    // for the content we write out.
    if matches!(body.last(), Some(HunkLine::Add(_) | HunkLine::Context(_))) {
        *new_no_newline = true;
    }
}

/// Parse `@@ -l[,c] +l[,c] @@`.
fn parse_hunk_header(
    header: &str,
    line_no: usize,
) -> Result<(usize, usize, usize, usize), PatchError> {
    let malformed = |reason: &str| PatchError::Malformed {
        line: line_no,
        reason: reason.to_string(),
    };

    let rest = header
        .strip_prefix("@@ -")
        .ok_or_else(|| malformed("expected '@@ -' hunk header"))?;
    let end = rest
        .find(" @@")
        .ok_or_else(|| malformed("hunk header missing closing '@@'"))?;
    let ranges = &rest[..end];
    let (old, new) = ranges
        .split_once(" +")
        .ok_or_else(|| malformed("hunk header missing '+' range"))?;

    let parse_range = |range: &str| -> Result<(usize, usize), PatchError> {
        let (start, count) = match range.split_once(',') {
            Some((s, c)) => (s, c),
            None => (range, "1"),
        };
        let start = start
            .parse()
            .map_err(|_| malformed("invalid range start"))?;
        let count = count
            .parse()
            .map_err(|_| malformed("invalid range count"))?;
        Ok((start, count))
    };

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Ok((old_start, old_count, new_start, new_count))
}

/// Apply all hunks of `fp` to `content`, verifying context exactly.
fn apply_hunks(content: &str, fp: &FilePatch, file: &str) -> Result<String, PatchError> {
    let src: Vec<&str> = content.lines().collect();
    let had_trailing_newline = content.ends_with('\n');

    let mut out: Vec<String> = Vec::new();
    let mut cursor = 0usize;
    let mut last_no_newline = false;

    for (index, hunk) in fp.hunks.iter().enumerate() {
        let mismatch = |at: usize| PatchError::HunkMismatch {
            file: file.to_string(),
            hunk: index + 1,
            line: at + 1,
        };

        // A zero old-start addresses an empty old side.
        let start = hunk.old_start.saturating_sub(1);
        if start < cursor || start > src.len() {
            return Err(mismatch(hunk.old_start));
        }
        out.extend(src[cursor..start].iter().map(|s| s.to_string()));
        cursor = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) => {
                    if src.get(cursor).copied() != Some(text.as_str()) {
                        return Err(mismatch(cursor));
                    }
                    out.push(text.clone());
                    cursor += 1;
                }
                HunkLine::Remove(text) => {
                    if src.get(cursor).copied() != Some(text.as_str()) {
                        return Err(mismatch(cursor));
                    }
                    cursor += 1;
                }
                HunkLine::Add(text) => out.push(text.clone()),
            }
        }
        last_no_newline = hunk.new_no_newline;
    }

    let kept_tail = cursor < src.len();
    out.extend(src[cursor..].iter().map(|s| s.to_string()));

    if out.is_empty() {
        return Ok(String::new());
    }
    let mut result = out.join("\n");
    let trailing = if kept_tail {
        had_trailing_newline
    } else {
        !last_no_newline
    };
    if trailing {
        result.push('\n');
    }
    Ok(result)
}

/// Write `content` to `dest`, replacing a symlink with a regular file so
/// the link target is never modified.
fn write_breaking_symlink(dest: &Path, content: &str) -> io::Result<()> {
    if let Ok(meta) = fs::symlink_metadata(dest) {
        if meta.file_type().is_symlink() {
            fs::remove_file(dest)?;
        }
    }
    fs::write(dest, content)
}
