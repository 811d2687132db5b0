//! Run directory retention behavior.

use std::collections::BTreeSet;
use std::path::Path;

use charlab::rundir::RunDirManager;

fn make_runs(base: &Path, names: &[&str]) {
    for name in names {
        std::fs::create_dir_all(base.join(name)).unwrap();
    }
}

fn run_names(base: &Path) -> BTreeSet<String> {
    std::fs::read_dir(base)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn prunes_to_max_runs_plus_the_new_one() {
    let dir = tempfile::tempdir().unwrap();
    // Created in order; equal mtimes fall back to name order.
    make_runs(dir.path(), &["r1", "r2", "r3", "r4", "r5"]);

    let mut mgr = RunDirManager::new(dir.path(), Some(2));
    let new_run = mgr.prepare(false).unwrap();

    let names = run_names(dir.path());
    assert_eq!(names.len(), 3);
    assert!(!names.contains("r1"));
    assert!(!names.contains("r2"));
    assert!(!names.contains("r3"));
    assert!(names.contains("r4"));
    assert!(names.contains("r5"));
    assert!(new_run.is_dir());
}

#[test]
fn unset_max_runs_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    make_runs(dir.path(), &["r1", "r2", "r3"]);

    let mut mgr = RunDirManager::new(dir.path(), None);
    mgr.prepare(false).unwrap();

    assert_eq!(run_names(dir.path()).len(), 4);
}

#[test]
fn retention_below_threshold_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    make_runs(dir.path(), &["r1", "r2"]);

    let mut mgr = RunDirManager::new(dir.path(), Some(5));
    mgr.prepare(false).unwrap();

    let names = run_names(dir.path());
    assert_eq!(names.len(), 3);
    assert!(names.contains("r1"));
    assert!(names.contains("r2"));
}

#[test]
fn fresh_run_path_is_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("designs/ota/runs");

    let mut mgr = RunDirManager::new(&nested, Some(3));
    let run = mgr.prepare(false).unwrap();
    assert!(run.starts_with(&nested));
    assert!(run.is_dir());
}
