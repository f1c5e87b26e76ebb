//! Batch and merge policy settings.

use super::ConnectionSettings;
use crate::encoding::EncodingPolicy;
use crate::error::ErdSyncError;
use serde::Serialize;
use std::path::PathBuf;

/// How the merger updates matched diagram nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePolicy {
    /// Codepage escaping strategy for comment text
    pub encoding: EncodingPolicy,
    /// Skip table comments that merely repeat the table name
    pub skip_self_named_comments: bool,
    /// Rewrite `Tablename` to `"<name> (<comment>)"` for display
    pub display_name: bool,
    /// Force `TableType` on every matched table (`1` is InnoDB)
    pub table_type: Option<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            encoding: EncodingPolicy::default(),
            skip_self_named_comments: true,
            display_name: false,
            table_type: None,
        }
    }
}

/// What the batch driver does when one diagram file fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing file and return its error
    #[default]
    Abort,
    /// Record the failure in the report and move on to the next file
    Continue,
}

/// Settings for the batch driver.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Folder scanned for `.dxml` diagram files
    pub erd_folder: PathBuf,
    /// Per-node update policy
    pub merge: MergePolicy,
    /// Per-file failure handling
    pub failure: FailurePolicy,
    /// Maximum number of files processed at once
    pub jobs: usize,
    /// Merge and report without writing any file
    pub dry_run: bool,
}

impl BatchSettings {
    /// Creates batch settings for `erd_folder` with sequential, aborting defaults.
    pub fn new(erd_folder: impl Into<PathBuf>) -> Self {
        Self {
            erd_folder: erd_folder.into(),
            merge: MergePolicy::default(),
            failure: FailurePolicy::default(),
            jobs: 1,
            dry_run: false,
        }
    }

    /// Builder method to set the merge policy.
    pub fn with_merge_policy(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }

    /// Builder method to set the failure policy.
    pub fn with_failure_policy(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    /// Builder method to set the number of concurrent files.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Builder method to enable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Validates batch parameters.
    pub fn validate(&self) -> crate::Result<()> {
        if self.erd_folder.as_os_str().is_empty() {
            return Err(ErdSyncError::configuration("ERD folder path cannot be empty"));
        }

        if self.jobs == 0 || self.jobs > 64 {
            return Err(ErdSyncError::configuration(
                "jobs must be between 1 and 64",
            ));
        }

        if self
            .merge
            .table_type
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            return Err(ErdSyncError::configuration("table type cannot be empty"));
        }

        Ok(())
    }
}

/// Everything one synchronization run needs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Where comment metadata comes from
    pub connection: ConnectionSettings,
    /// Which diagrams are updated and how
    pub batch: BatchSettings,
}

impl SyncSettings {
    /// Bundles connection and batch settings.
    pub fn new(connection: ConnectionSettings, batch: BatchSettings) -> Self {
        Self { connection, batch }
    }

    /// Validates both halves.
    pub fn validate(&self) -> crate::Result<()> {
        self.connection.validate()?;
        self.batch.validate()
    }
}
