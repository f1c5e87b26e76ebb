//! Applying database comments to diagram documents.
//!
//! [`DocumentMerger`] matches `TABLE`/`COLUMN` nodes to the comment
//! snapshot by exact name and upserts encoded comments into their
//! `Comments` attribute. Unmatched nodes are never touched, and a node
//! that already carries the right value is written back as read, so
//! merging the same snapshot twice leaves the file byte-identical.

use crate::config::MergePolicy;
use crate::document::{
    COLUMN_NAME_ATTR, COMMENTS_ATTR, DocumentError, ErdNode, NodeKind, TABLE_NAME_ATTR,
    TABLE_TYPE_ATTR, decode_document, rewrite_document,
};
use crate::encoding::{EncodedComment, encode_comment_with};
use crate::error::{ErdSyncError, Result};
use crate::metadata::CommentMaps;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Counts of what one merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// `TABLE` nodes with at least one attribute changed
    pub tables_updated: usize,
    /// `COLUMN` nodes with at least one attribute changed
    pub columns_updated: usize,
    /// Characters dropped because CP949 cannot represent them
    pub dropped_characters: usize,
}

/// Output of merging one document in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDocument {
    /// Serialized UTF-8 document
    pub content: Vec<u8>,
    /// What changed
    pub stats: MergeStats,
}

/// Result of updating one diagram file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Diagram file path
    pub path: PathBuf,
    /// What the merge changed
    pub stats: MergeStats,
    /// Whether the merged bytes differ from the file on disk
    pub changed: bool,
    /// Whether the file was rewritten (false when unchanged or dry run)
    pub written: bool,
}

/// Merges one comment snapshot into diagram documents.
#[derive(Debug, Clone, Copy)]
pub struct DocumentMerger<'a> {
    maps: &'a CommentMaps,
    policy: &'a MergePolicy,
}

impl<'a> DocumentMerger<'a> {
    /// Creates a merger over a read-only snapshot.
    pub fn new(maps: &'a CommentMaps, policy: &'a MergePolicy) -> Self {
        Self { maps, policy }
    }

    /// Merges comments into an in-memory document.
    ///
    /// # Example
    /// ```rust
    /// use erdsync_core::config::MergePolicy;
    /// use erdsync_core::merger::DocumentMerger;
    /// use erdsync_core::metadata::{CommentMaps, TableCommentRow};
    ///
    /// let maps = CommentMaps::from_rows(
    ///     vec![TableCommentRow { table: "USERS".into(), comment: Some("회원".into()) }],
    ///     vec![],
    /// );
    /// let policy = MergePolicy::default();
    /// let merged = DocumentMerger::new(&maps, &policy)
    ///     .merge_str(r#"<ERD><TABLE Tablename="USERS"/></ERD>"#)?;
    ///
    /// let xml = String::from_utf8(merged.content)?;
    /// assert!(xml.contains(r#"<TABLE Tablename="USERS" Comments="\200\184\191\248"/>"#));
    /// assert_eq!(merged.stats.tables_updated, 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn merge_str(&self, source: &str) -> std::result::Result<MergedDocument, DocumentError> {
        let mut stats = MergeStats::default();

        let content = rewrite_document(source, |node, ancestors| {
            let changed = match node.kind() {
                NodeKind::Table => self.apply_table(node, &mut stats),
                NodeKind::Column => self.apply_column(node, ancestors, &mut stats),
                NodeKind::Other => false,
            };

            if changed {
                match node.kind() {
                    NodeKind::Table => {
                        stats.tables_updated = stats.tables_updated.saturating_add(1);
                    }
                    _ => stats.columns_updated = stats.columns_updated.saturating_add(1),
                }
            }
        })?;

        Ok(MergedDocument { content, stats })
    }

    /// Reads, merges and (unless `dry_run`) rewrites the diagram at `path`.
    ///
    /// The file is only rewritten when the merged bytes differ from what is
    /// on disk. Writes go to a sibling temporary file that is renamed over
    /// the original, so an interrupted run never leaves a truncated diagram.
    ///
    /// # Errors
    /// - [`ErdSyncError::NotFound`] when `path` does not exist
    /// - [`ErdSyncError::Parse`] when the document is not well-formed
    /// - [`ErdSyncError::Io`] for any other read or write failure
    pub async fn update_file(&self, path: &Path, dry_run: bool) -> Result<FileOutcome> {
        tracing::info!("Processing {}", path.display());

        let original = tokio::fs::read(path)
            .await
            .map_err(|e| ErdSyncError::io(path, "read", e))?;

        let text = decode_document(&original).map_err(|e| ErdSyncError::parse_failed(path, e))?;
        let merged = self
            .merge_str(&text)
            .map_err(|e| ErdSyncError::parse_failed(path, e))?;

        let changed = merged.content != original;
        let written = changed && !dry_run;

        if written {
            write_atomically(path, &merged.content).await?;
        }

        tracing::info!(
            "{} {}: {} tables, {} columns updated",
            if written {
                "Updated"
            } else if changed {
                "Would update"
            } else {
                "Unchanged"
            },
            path.display(),
            merged.stats.tables_updated,
            merged.stats.columns_updated
        );

        Ok(FileOutcome {
            path: path.to_path_buf(),
            stats: merged.stats,
            changed,
            written,
        })
    }

    fn apply_table(&self, node: &mut ErdNode, stats: &mut MergeStats) -> bool {
        let Some(name) = node.get(TABLE_NAME_ATTR).map(str::to_owned) else {
            return false;
        };
        let Some(comment) = self.maps.table_comment(&name) else {
            return false;
        };

        let mut changed = false;

        let describes_table = !comment.is_empty()
            && !(self.policy.skip_self_named_comments && comment == name);
        if describes_table {
            let encoded = self.encode(comment, &name, None, stats);
            if !encoded.is_empty() {
                if self.policy.display_name && !name.contains(' ') {
                    changed |= node.upsert(TABLE_NAME_ATTR, format!("{} ({})", name, encoded));
                }
                changed |= node.upsert(COMMENTS_ATTR, encoded);
            }
        }

        if let Some(table_type) = &self.policy.table_type {
            changed |= node.upsert(TABLE_TYPE_ATTR, table_type.as_str());
        }

        changed
    }

    fn apply_column(
        &self,
        node: &mut ErdNode,
        ancestors: &[ErdNode],
        stats: &mut MergeStats,
    ) -> bool {
        // Nearest enclosing table, as read from the file
        let Some(table) = ancestors
            .iter()
            .rev()
            .find(|a| a.kind() == NodeKind::Table)
            .and_then(|a| a.get(TABLE_NAME_ATTR))
        else {
            return false;
        };
        let Some(column) = node.get(COLUMN_NAME_ATTR).map(str::to_owned) else {
            return false;
        };
        let Some(comment) = self
            .maps
            .column_comment(table, &column)
            .filter(|c| !c.is_empty())
        else {
            return false;
        };

        let encoded = self.encode(comment, table, Some(&column), stats);
        !encoded.is_empty() && node.upsert(COMMENTS_ATTR, encoded)
    }

    fn encode(
        &self,
        comment: &str,
        table: &str,
        column: Option<&str>,
        stats: &mut MergeStats,
    ) -> String {
        let EncodedComment { text, dropped } =
            encode_comment_with(Some(comment), self.policy.encoding);

        if !dropped.is_empty() {
            stats.dropped_characters = stats.dropped_characters.saturating_add(dropped.len());
            tracing::debug!(
                table,
                column,
                ?dropped,
                "Dropped characters with no CP949 representation"
            );
        }

        text
    }
}

/// Replaces the file at `path` with `content` via a sibling temp file.
///
/// Symlinks are resolved first so the link stays in place and its target
/// receives the new content.
async fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let target = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| ErdSyncError::io(path, "resolve", e))?;

    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = target.with_file_name(format!(".{}.erdsync.tmp", file_name));

    tokio::fs::write(&temp_path, content)
        .await
        .map_err(|e| ErdSyncError::io(&temp_path, "write", e))?;

    match tokio::fs::metadata(&target).await {
        Ok(metadata) => {
            if let Err(e) = tokio::fs::set_permissions(&temp_path, metadata.permissions()).await
            {
                tracing::debug!(
                    "Could not copy permissions to {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }
        Err(e) => tracing::debug!("Could not read permissions of {}: {}", target.display(), e),
    }

    if let Err(e) = tokio::fs::rename(&temp_path, &target).await {
        if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
            tracing::debug!(
                "Could not remove {}: {}",
                temp_path.display(),
                cleanup
            );
        }
        return Err(ErdSyncError::io(path, "replace", e));
    }

    Ok(())
}
