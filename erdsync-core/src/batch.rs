//! Folder-level synchronization.
//!
//! The driver discovers `.dxml` diagrams in one folder and merges every
//! one of them against a single metadata snapshot.

use crate::config::{BatchSettings, FailurePolicy};
use crate::error::{ErdSyncError, Result};
use crate::merger::{DocumentMerger, FileOutcome};
use crate::metadata::CommentMaps;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name suffix of diagram documents (case-sensitive).
pub const DIAGRAM_EXTENSION: &str = ".dxml";

/// Returns true when `path` names a diagram document.
pub fn is_diagram_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            name.len() > DIAGRAM_EXTENSION.len() && name.ends_with(DIAGRAM_EXTENSION)
        })
}

/// Lists diagram files directly inside `folder`, sorted by file name.
///
/// Subdirectories are not descended into.
///
/// # Errors
/// [`ErdSyncError::NotFound`] when the folder does not exist, and
/// [`ErdSyncError::Io`] when it cannot be listed.
pub async fn discover_diagrams(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(folder)
        .await
        .map_err(|e| ErdSyncError::io(folder, "list", e))?;

    let mut diagrams = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ErdSyncError::io(folder, "list", e))?
    {
        let path = entry.path();
        if !is_diagram_file(&path) {
            continue;
        }

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ErdSyncError::io(&path, "inspect", e))?;
        // Symlinks count when they resolve to a regular file
        let is_file = if file_type.is_symlink() {
            tokio::fs::metadata(&path)
                .await
                .is_ok_and(|metadata| metadata.is_file())
        } else {
            file_type.is_file()
        };
        if is_file {
            diagrams.push(path);
        }
    }

    diagrams.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(diagrams)
}

/// A diagram that could not be processed in continue mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// Diagram file path
    pub path: PathBuf,
    /// Rendered error
    pub message: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Folder that was scanned
    pub folder: PathBuf,
    /// Outcomes of successfully processed files, in file name order
    pub files: Vec<FileOutcome>,
    /// Files that failed (continue mode only)
    pub failures: Vec<FileFailure>,
    /// Whether writes were suppressed
    pub dry_run: bool,
    /// When the batch finished
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Number of files whose content changed.
    pub fn changed_count(&self) -> usize {
        self.files.iter().filter(|f| f.changed).count()
    }

    /// Number of files actually rewritten on disk.
    pub fn written_count(&self) -> usize {
        self.files.iter().filter(|f| f.written).count()
    }

    /// Total tables updated across all files.
    pub fn tables_updated(&self) -> usize {
        self.files.iter().map(|f| f.stats.tables_updated).sum()
    }

    /// Total columns updated across all files.
    pub fn columns_updated(&self) -> usize {
        self.files.iter().map(|f| f.stats.columns_updated).sum()
    }

    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the merger over every diagram in a folder.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    settings: BatchSettings,
}

impl BatchDriver {
    /// Creates a driver for the given batch settings.
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    /// Settings this driver runs with.
    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Merges `maps` into every diagram in the configured folder.
    ///
    /// Up to `jobs` files are processed at once; outcomes are always
    /// reported in file name order.
    ///
    /// # Errors
    /// Fails when the settings are invalid or the folder cannot be listed.
    /// With [`FailurePolicy::Abort`] the first failing file's error is
    /// returned as well. When `jobs > 1`, files sorting after the failing
    /// one may already have been written by then; only `jobs == 1`
    /// guarantees nothing past the failure is touched.
    pub async fn run(&self, maps: &CommentMaps) -> Result<BatchReport> {
        self.settings.validate()?;

        let folder = &self.settings.erd_folder;
        let diagrams = discover_diagrams(folder).await?;
        tracing::info!(
            "Found {} diagram files in {}",
            diagrams.len(),
            folder.display()
        );

        let merger = DocumentMerger::new(maps, &self.settings.merge);
        let dry_run = self.settings.dry_run;

        let mut results = stream::iter(diagrams.iter())
            .map(|path| async move { (path, merger.update_file(path, dry_run).await) })
            .buffered(self.settings.jobs);

        let mut files = Vec::with_capacity(diagrams.len());
        let mut failures = Vec::new();

        while let Some((path, result)) = results.next().await {
            match result {
                Ok(outcome) => files.push(outcome),
                Err(e) => {
                    tracing::error!("Failed to process {}: {}", path.display(), e);
                    match self.settings.failure {
                        FailurePolicy::Abort => return Err(e),
                        FailurePolicy::Continue => failures.push(FileFailure {
                            path: path.clone(),
                            message: e.to_string(),
                        }),
                    }
                }
            }
        }

        let report = BatchReport {
            folder: folder.clone(),
            files,
            failures,
            dry_run,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Batch finished: {} files processed, {} changed, {} failed",
            report.files.len(),
            report.changed_count(),
            report.failures.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TableCommentRow;
    use std::fs;

    const DIAGRAM: &str = r#"<ERD><TABLE Tablename="USERS"/></ERD>"#;

    fn maps() -> CommentMaps {
        CommentMaps::from_rows(
            vec![TableCommentRow {
                table: "USERS".to_string(),
                comment: Some("회원".to_string()),
            }],
            vec![],
        )
    }

    fn file_names(report: &BatchReport) -> Vec<String> {
        report
            .files
            .iter()
            .filter_map(|f| f.path.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_is_diagram_file() {
        assert!(is_diagram_file(Path::new("erd/model.dxml")));
        assert!(!is_diagram_file(Path::new("erd/model.DXML")));
        assert!(!is_diagram_file(Path::new("erd/model.dxml.bak")));
        assert!(!is_diagram_file(Path::new("erd/notes.txt")));
        assert!(!is_diagram_file(Path::new(".dxml")));
    }

    #[tokio::test]
    async fn test_only_diagram_files_are_processed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.dxml"), DIAGRAM).unwrap();
        fs::write(dir.path().join("a.dxml"), DIAGRAM).unwrap();
        fs::write(dir.path().join("notes.txt"), DIAGRAM).unwrap();
        fs::create_dir(dir.path().join("nested.dxml")).unwrap();

        let report = BatchDriver::new(BatchSettings::new(dir.path()))
            .run(&maps())
            .await
            .unwrap();

        assert_eq!(file_names(&report), vec!["a.dxml", "b.dxml"]);
        assert_eq!(report.written_count(), 2);
        assert_eq!(report.tables_updated(), 2);
        assert!(report.is_success());
        assert_eq!(
            fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            DIAGRAM
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_diagram_updates_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("real.dxml");
        fs::write(&target, DIAGRAM).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("a.dxml")).unwrap();

        let report = BatchDriver::new(BatchSettings::new(dir.path()))
            .run(&maps())
            .await
            .unwrap();

        assert_eq!(file_names(&report), vec!["a.dxml"]);
        assert_eq!(report.written_count(), 1);
        assert!(
            fs::symlink_metadata(dir.path().join("a.dxml"))
                .unwrap()
                .file_type()
                .is_symlink()
        );
        assert!(
            fs::read_to_string(&target)
                .unwrap()
                .contains(r#"Comments="\200\184\191\248""#)
        );
        // The temp file lives next to the target and is gone afterwards
        assert_eq!(fs::read_dir(elsewhere.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = BatchDriver::new(BatchSettings::new(dir.path().join("absent")))
            .run(&maps())
            .await;
        assert!(matches!(result, Err(ErdSyncError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_abort_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dxml"), "<ERD><TABLE></ERD>").unwrap();
        fs::write(dir.path().join("b.dxml"), DIAGRAM).unwrap();

        let error = BatchDriver::new(BatchSettings::new(dir.path()))
            .run(&maps())
            .await
            .unwrap_err();

        assert!(matches!(error, ErdSyncError::Parse { .. }));
        // b.dxml comes after the failure and is never reached
        assert_eq!(
            fs::read_to_string(dir.path().join("b.dxml")).unwrap(),
            DIAGRAM
        );
    }

    #[tokio::test]
    async fn test_continue_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dxml"), "<ERD><TABLE></ERD>").unwrap();
        fs::write(dir.path().join("b.dxml"), DIAGRAM).unwrap();

        let settings =
            BatchSettings::new(dir.path()).with_failure_policy(FailurePolicy::Continue);
        let report = BatchDriver::new(settings).run(&maps()).await.unwrap();

        assert_eq!(file_names(&report), vec!["b.dxml"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("a.dxml"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_dry_run_and_parallel_jobs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.dxml", "a.dxml", "b.dxml"] {
            fs::write(dir.path().join(name), DIAGRAM).unwrap();
        }

        let settings = BatchSettings::new(dir.path())
            .with_jobs(3)
            .with_dry_run(true);
        let report = BatchDriver::new(settings).run(&maps()).await.unwrap();

        assert_eq!(file_names(&report), vec!["a.dxml", "b.dxml", "c.dxml"]);
        assert_eq!(report.changed_count(), 3);
        assert_eq!(report.written_count(), 0);
        assert!(report.dry_run);
        for name in ["a.dxml", "b.dxml", "c.dxml"] {
            assert_eq!(fs::read_to_string(dir.path().join(name)).unwrap(), DIAGRAM);
        }
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dxml"), DIAGRAM).unwrap();

        let report = BatchDriver::new(BatchSettings::new(dir.path()))
            .run(&maps())
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["files"][0]["stats"]["tables_updated"], 1);
        assert_eq!(json["files"][0]["written"], true);
        assert!(json["finished_at"].is_string());
        assert!(json["failures"].as_array().unwrap().is_empty());
    }
}
