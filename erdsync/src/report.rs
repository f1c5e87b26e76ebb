//! Human-readable and JSON rendering of a batch report.

use erdsync_core::{BatchReport, ErdSyncError, Result};
use std::fmt::Write as _;

/// Renders the report as pretty-printed JSON.
pub fn to_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| {
        ErdSyncError::configuration(format!("Failed to serialize batch report: {}", e))
    })
}

/// Renders a short summary, one line per changed or failed file.
pub fn summary(report: &BatchReport) -> String {
    let mut out = String::new();

    for file in report.files.iter().filter(|f| f.changed) {
        let verb = if file.written { "updated" } else { "would update" };
        let _ = writeln!(
            out,
            "{} {} ({} tables, {} columns)",
            verb,
            file.path.display(),
            file.stats.tables_updated,
            file.stats.columns_updated
        );
    }

    for failure in &report.failures {
        let _ = writeln!(out, "failed  {}: {}", failure.path.display(), failure.message);
    }

    let _ = write!(
        out,
        "{} diagrams processed, {} changed, {} failed{}",
        report.files.len(),
        report.changed_count(),
        report.failures.len(),
        if report.dry_run { " (dry run)" } else { "" }
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use erdsync_core::FileFailure;
    use erdsync_core::merger::{FileOutcome, MergeStats};
    use std::path::PathBuf;

    fn report() -> BatchReport {
        BatchReport {
            folder: PathBuf::from("erd"),
            files: vec![
                FileOutcome {
                    path: PathBuf::from("erd/a.dxml"),
                    stats: MergeStats {
                        tables_updated: 2,
                        columns_updated: 5,
                        dropped_characters: 0,
                    },
                    changed: true,
                    written: true,
                },
                FileOutcome {
                    path: PathBuf::from("erd/b.dxml"),
                    stats: MergeStats::default(),
                    changed: false,
                    written: false,
                },
            ],
            failures: vec![FileFailure {
                path: PathBuf::from("erd/c.dxml"),
                message: "Failed to parse diagram erd/c.dxml: bad".to_string(),
            }],
            dry_run: false,
            finished_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_summary_lists_changes_and_failures() {
        let text = summary(&report());
        assert!(text.contains("updated erd/a.dxml (2 tables, 5 columns)"));
        assert!(!text.contains("b.dxml"));
        assert!(text.contains("failed  erd/c.dxml"));
        assert!(text.ends_with("2 diagrams processed, 1 changed, 1 failed"));
    }

    #[test]
    fn test_json_report() {
        let json = to_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
        assert_eq!(value["failures"][0]["path"], "erd/c.dxml");
    }
}
