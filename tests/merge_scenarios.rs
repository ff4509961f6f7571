//! Overlay resolution scenarios over real directory trees
//!
//! Exercises the merge decision table end to end: source-only entries,
//! overlay-only entries, overlay precedence, recursive directory merges,
//! and the traversal step ceiling.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use treegraft::merge::{
    FsTree, MergeError, MergeOptions, MergeReport, Merger, RelPath, RootKind, TruncationPolicy,
};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn root_of(report: &MergeReport, rel: &str) -> Option<RootKind> {
    report
        .instructions
        .iter()
        .find(|i| i.rel_path.to_string() == rel)
        .map(|i| i.root)
}

fn resolve(source: &TempDir, overlay: &TempDir, start: &str) -> MergeReport {
    let src = FsTree::new(source.path());
    let ovl = FsTree::new(overlay.path());
    Merger::new(&src, &ovl).resolve(&RelPath::new(start)).unwrap()
}

#[test]
fn scenario_overlay_replaces_one_file() {
    // Source has a/x.txt and a/y.txt; overlay has a/y.txt.
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();
    write(source.path(), "a/x.txt", "sx");
    write(source.path(), "a/y.txt", "sy");
    write(overlay.path(), "a/y.txt", "oy");

    let report = resolve(&source, &overlay, "a");

    assert_eq!(report.instructions.len(), 2);
    assert_eq!(root_of(&report, "a/x.txt"), Some(RootKind::Source));
    assert_eq!(root_of(&report, "a/y.txt"), Some(RootKind::Overlay));
}

#[test]
fn scenario_directory_merge_splits_children_by_side() {
    // Source has a/1.txt, overlay has a/2.txt; "a" itself must be merged,
    // never projected from either side alone.
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();
    write(source.path(), "top/a/1.txt", "1");
    write(overlay.path(), "top/a/2.txt", "2");

    let report = resolve(&source, &overlay, "top");

    assert_eq!(root_of(&report, "top/a"), None);
    assert_eq!(root_of(&report, "top/a/1.txt"), Some(RootKind::Source));
    assert_eq!(root_of(&report, "top/a/2.txt"), Some(RootKind::Overlay));
}

#[test]
fn scenario_overlay_file_shadows_source_directory() {
    // Source has directory b/ with contents; overlay has plain file b.
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();
    write(source.path(), "top/b/hidden.txt", "h");
    write(overlay.path(), "top/b", "a plain file");

    let report = resolve(&source, &overlay, "top");

    assert_eq!(report.instructions.len(), 1);
    assert_eq!(root_of(&report, "top/b"), Some(RootKind::Overlay));
    // The shadowed directory's contents are never visited.
    assert_eq!(root_of(&report, "top/b/hidden.txt"), None);
    assert_eq!(report.steps, 1);
}

#[test]
fn scenario_source_directory_projects_as_one_entry() {
    // A directory present only in the source is linked whole, not expanded.
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();
    write(source.path(), "top/lib/deep/file.txt", "d");

    let report = resolve(&source, &overlay, "top");

    assert_eq!(report.instructions.len(), 1);
    assert_eq!(root_of(&report, "top/lib"), Some(RootKind::Source));
    assert_eq!(root_of(&report, "top/lib/deep"), None);
    assert_eq!(report.steps, 1);
}

#[test]
fn scenario_step_ceiling_stops_traversal() {
    // Nested directories present on both sides force one frontier step per
    // level; a ceiling of 2 leaves the deepest level unresolved.
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();
    write(source.path(), "p/q/r/file.txt", "deep");
    write(overlay.path(), "p/q/r/file.txt", "deep override");

    let src = FsTree::new(source.path());
    let ovl = FsTree::new(overlay.path());

    // Continue policy: early stop, unresolved paths reported.
    let report = Merger::new(&src, &ovl)
        .with_options(MergeOptions {
            step_limit: 2,
            on_truncate: TruncationPolicy::Continue,
        })
        .resolve(&RelPath::new("p"))
        .unwrap();
    assert!(root_of(&report, "p/q/r/file.txt").is_none());
    assert!(!report.is_complete());
    assert_eq!(report.pending.len(), 1);
    assert_eq!(report.pending[0].to_string(), "p/q/r");

    // Fail policy: the same shape is an error.
    let err = Merger::new(&src, &ovl)
        .with_options(MergeOptions {
            step_limit: 2,
            on_truncate: TruncationPolicy::Fail,
        })
        .resolve(&RelPath::new("p"))
        .unwrap_err();
    assert!(matches!(err, MergeError::Truncated { steps: 2, .. }));

    // A sufficient ceiling resolves everything.
    let report = Merger::new(&src, &ovl)
        .with_options(MergeOptions {
            step_limit: 10,
            on_truncate: TruncationPolicy::Fail,
        })
        .resolve(&RelPath::new("p"))
        .unwrap();
    assert_eq!(root_of(&report, "p/q/r/file.txt"), Some(RootKind::Overlay));
    assert_eq!(report.steps, 3);
}

#[test]
fn scenario_empty_roots_produce_empty_plan() {
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();

    let report = resolve(&source, &overlay, "anything");

    assert!(report.instructions.is_empty());
    assert!(report.is_complete());
}

#[test]
fn scenario_each_path_decided_exactly_once() {
    let source = TempDir::new().unwrap();
    let overlay = TempDir::new().unwrap();
    write(source.path(), "t/a.txt", "a");
    write(source.path(), "t/d/one.txt", "1");
    write(source.path(), "t/d/two.txt", "2");
    write(overlay.path(), "t/d/two.txt", "2o");
    write(overlay.path(), "t/d/three.txt", "3");
    write(overlay.path(), "t/extra/new.txt", "n");

    let report = resolve(&source, &overlay, "t");

    let mut paths: Vec<String> = report
        .instructions
        .iter()
        .map(|i| i.rel_path.to_string())
        .collect();
    let total = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), total, "a path was projected twice");

    assert_eq!(
        paths,
        vec![
            "t/a.txt",
            "t/d/one.txt",
            "t/d/three.txt",
            "t/d/two.txt",
            "t/extra",
        ]
    );
}
