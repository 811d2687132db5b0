//! Run directory management.
//!
//! Each run gets a timestamped directory under the design's run path.
//! Old runs are pruned to `max_runs` before a new one is created, and
//! every parameter job writes into its own sub-path so concurrent jobs
//! never contend on files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::macros::format_description;
use tracing::{info, warn};

use crate::error::Error;

/// Allocates run directories and enforces the retention policy.
#[derive(Debug)]
pub struct RunDirManager {
    run_path: PathBuf,
    max_runs: Option<usize>,
    current: Option<PathBuf>,
}

impl RunDirManager {
    pub fn new(run_path: impl Into<PathBuf>, max_runs: Option<usize>) -> Self {
        Self {
            run_path: run_path.into(),
            max_runs,
            current: None,
        }
    }

    /// The directory prepared for the current run, if any.
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Create the directory for a new run, pruning old runs beyond
    /// `max_runs` first. Without `force`, a directory already prepared by
    /// this manager is reused.
    ///
    /// A retention failure on one old run is logged and skipped; only a
    /// failure to create the new run directory is an error.
    pub fn prepare(&mut self, force: bool) -> Result<PathBuf, Error> {
        if !force {
            if let Some(cur) = &self.current {
                if cur.is_dir() {
                    info!("reusing run directory {}", cur.display());
                    return Ok(cur.clone());
                }
            }
        }

        std::fs::create_dir_all(&self.run_path)
            .map_err(|e| Error::io(&self.run_path, e))?;

        if let Some(max) = self.max_runs {
            self.prune(max);
        }

        let dir = self.new_run_dir()?;
        info!("created run directory {}", dir.display());
        self.current = Some(dir.clone());
        Ok(dir)
    }

    fn prune(&self, max_runs: usize) {
        let entries = match list_runs(&self.run_path) {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping run retention: {e}");
                return;
            }
        };
        for name in select_prunable(&entries, max_runs) {
            let path = self.run_path.join(&name);
            match std::fs::remove_dir_all(&path) {
                Ok(()) => info!("pruned old run {}", path.display()),
                Err(e) => warn!("failed to prune old run {}: {e}", path.display()),
            }
        }
    }

    fn new_run_dir(&self) -> Result<PathBuf, Error> {
        let fmt = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
        let tag = time::OffsetDateTime::now_utc()
            .format(&fmt)
            .unwrap_or_else(|_| "run".into());

        // Runs started within the same second get a numeric suffix.
        let mut candidate = self.run_path.join(&tag);
        let mut n = 1;
        while candidate.exists() {
            n += 1;
            candidate = self.run_path.join(format!("{tag}_{n}"));
        }
        std::fs::create_dir_all(&candidate).map_err(|e| Error::io(&candidate, e))?;
        Ok(candidate)
    }
}

/// Collect run directory names with their modification times.
fn list_runs(run_path: &Path) -> std::io::Result<Vec<(SystemTime, String)>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(run_path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let mtime = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((mtime, entry.file_name().to_string_lossy().into_owned()));
    }
    Ok(entries)
}

/// Pick the run directories to delete so that at most `max_runs` prior
/// runs remain: oldest first, mtime ties broken by name.
fn select_prunable(entries: &[(SystemTime, String)], max_runs: usize) -> Vec<String> {
    if entries.len() <= max_runs {
        return Vec::new();
    }
    let mut sorted: Vec<_> = entries.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    sorted
        .into_iter()
        .take(entries.len() - max_runs)
        .map(|(_, name)| name)
        .collect()
}

/// Create the working sub-path for one parameter inside a run directory.
pub fn param_dir(run_dir: &Path, name: &str) -> Result<PathBuf, Error> {
    let dir = run_dir.join("parameters").join(name);
    std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn prunes_oldest_first() {
        let entries = vec![
            (at(30), "c".to_string()),
            (at(10), "a".to_string()),
            (at(20), "b".to_string()),
        ];
        assert_eq!(select_prunable(&entries, 1), vec!["a", "b"]);
        assert!(select_prunable(&entries, 3).is_empty());
    }

    #[test]
    fn mtime_ties_break_by_name() {
        let entries = vec![
            (at(10), "b".to_string()),
            (at(10), "a".to_string()),
            (at(20), "c".to_string()),
        ];
        assert_eq!(select_prunable(&entries, 2), vec!["a"]);
    }

    #[test]
    fn param_dirs_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let a = param_dir(dir.path(), "gain").unwrap();
        let b = param_dir(dir.path(), "bandwidth").unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[test]
    fn reuses_prepared_dir_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = RunDirManager::new(dir.path(), None);
        let first = mgr.prepare(false).unwrap();
        let second = mgr.prepare(false).unwrap();
        assert_eq!(first, second);
        let third = mgr.prepare(true).unwrap();
        assert_ne!(first, third);
    }
}
