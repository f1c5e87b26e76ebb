//! In-memory comment source.

use super::{ColumnCommentRow, CommentSource, TableCommentRow};
use crate::Result;
use async_trait::async_trait;

/// Comment source backed by fixed rows.
///
/// Serves every schema name with the same rows. Useful for offline runs
/// against an exported comment list and for tests.
///
/// # Example
/// ```rust
/// use erdsync_core::metadata::{MetadataFetcher, StaticCommentSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> erdsync_core::Result<()> {
/// let source = StaticCommentSource::new()
///     .with_table("USERS", "회원 정보")
///     .with_column("USERS", "ID", "회원 번호");
/// let maps = MetadataFetcher::for_schema(source, "shop").fetch().await?;
/// assert_eq!(maps.table_comment("USERS"), Some("회원 정보"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCommentSource {
    tables: Vec<TableCommentRow>,
    columns: Vec<ColumnCommentRow>,
}

impl StaticCommentSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table comment row.
    pub fn with_table(mut self, table: impl Into<String>, comment: impl Into<String>) -> Self {
        self.tables.push(TableCommentRow {
            table: table.into(),
            comment: Some(comment.into()),
        });
        self
    }

    /// Adds a column comment row.
    pub fn with_column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        self.columns.push(ColumnCommentRow {
            table: table.into(),
            column: column.into(),
            comment: Some(comment.into()),
        });
        self
    }
}

#[async_trait]
impl CommentSource for StaticCommentSource {
    async fn table_comments(&self, _schema: &str) -> Result<Vec<TableCommentRow>> {
        let mut rows = self.tables.clone();
        rows.sort_by(|a, b| a.table.cmp(&b.table));
        Ok(rows)
    }

    async fn column_comments(&self, _schema: &str) -> Result<Vec<ColumnCommentRow>> {
        Ok(self.columns.clone())
    }

    fn source_name(&self) -> &'static str {
        "static rows"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tables_are_sorted_by_name() {
        let source = StaticCommentSource::new()
            .with_table("ORDERS", "주문")
            .with_table("ACCOUNTS", "계정");

        let rows = source.table_comments("any").await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(names, vec!["ACCOUNTS", "ORDERS"]);
    }
}
