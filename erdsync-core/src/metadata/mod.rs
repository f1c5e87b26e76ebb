//! Comment metadata fetching.
//!
//! A [`CommentSource`] runs the two information-schema queries and returns
//! raw rows; [`MetadataFetcher`] turns those rows into [`CommentMaps`], the
//! read-only snapshot every diagram in a batch is merged against.
//!
//! # Module Structure
//! - `memory`: fixed in-memory source for offline runs and tests
//! - `mysql`: MySQL/MariaDB source backed by an sqlx pool (feature `mysql`)

mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;

pub use memory::StaticCommentSource;

use crate::Result;
use crate::config::ConnectionSettings;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// One row of `INFORMATION_SCHEMA.TABLES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCommentRow {
    /// `TABLE_NAME`
    pub table: String,
    /// `TABLE_COMMENT`, `None` when the column is NULL
    pub comment: Option<String>,
}

/// One row of `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCommentRow {
    /// `TABLE_NAME`
    pub table: String,
    /// `COLUMN_NAME`
    pub column: String,
    /// `COLUMN_COMMENT`, `None` when the column is NULL
    pub comment: Option<String>,
}

/// Query executor for table and column comments.
///
/// Implementations must return every row for the schema or an error;
/// partial results are never acceptable.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Returns `(TABLE_NAME, TABLE_COMMENT)` rows for `schema`, ordered by name.
    async fn table_comments(&self, schema: &str) -> Result<Vec<TableCommentRow>>;

    /// Returns `(TABLE_NAME, COLUMN_NAME, COLUMN_COMMENT)` rows for `schema`.
    async fn column_comments(&self, schema: &str) -> Result<Vec<ColumnCommentRow>>;

    /// Short name of the backing store, for logs.
    fn source_name(&self) -> &'static str;
}

#[async_trait]
impl<'a, T: CommentSource + ?Sized> CommentSource for &'a T {
    async fn table_comments(&self, schema: &str) -> Result<Vec<TableCommentRow>> {
        (**self).table_comments(schema).await
    }

    async fn column_comments(&self, schema: &str) -> Result<Vec<ColumnCommentRow>> {
        (**self).column_comments(schema).await
    }

    fn source_name(&self) -> &'static str {
        (**self).source_name()
    }
}

/// Read-only lookup of comments by table and by table+column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentMaps {
    tables: BTreeMap<String, String>,
    columns: BTreeMap<String, BTreeMap<String, String>>,
}

impl CommentMaps {
    /// Builds the maps from raw query rows. NULL comments become empty strings.
    pub fn from_rows(
        tables: impl IntoIterator<Item = TableCommentRow>,
        columns: impl IntoIterator<Item = ColumnCommentRow>,
    ) -> Self {
        let tables = tables
            .into_iter()
            .map(|row| (row.table, row.comment.unwrap_or_default()))
            .collect();

        let mut grouped: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for row in columns {
            grouped
                .entry(row.table)
                .or_default()
                .insert(row.column, row.comment.unwrap_or_default());
        }

        Self {
            tables,
            columns: grouped,
        }
    }

    /// Comment for `table`, if the table exists (possibly empty).
    pub fn table_comment(&self, table: &str) -> Option<&str> {
        self.tables.get(table).map(String::as_str)
    }

    /// Comment for `table`.`column`, if the column exists (possibly empty).
    pub fn column_comment(&self, table: &str, column: &str) -> Option<&str> {
        self.columns
            .get(table)
            .and_then(|columns| columns.get(column))
            .map(String::as_str)
    }

    /// Table-level map, keyed by table name.
    pub fn tables(&self) -> &BTreeMap<String, String> {
        &self.tables
    }

    /// Column-level map, keyed by table then column name.
    pub fn columns(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.columns
    }

    /// Number of tables known.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of columns known across all tables.
    pub fn column_count(&self) -> usize {
        self.columns.values().map(BTreeMap::len).sum()
    }

    /// True when no table or column is known.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty()
    }
}

/// Fetches the comment snapshot for one schema.
#[derive(Debug)]
pub struct MetadataFetcher<S> {
    source: S,
    schema: String,
}

impl<S: CommentSource> MetadataFetcher<S> {
    /// Creates a fetcher for the schema named in `settings`.
    pub fn new(source: S, settings: &ConnectionSettings) -> Self {
        Self::for_schema(source, settings.schema.clone())
    }

    /// Creates a fetcher for an explicit schema name.
    pub fn for_schema(source: S, schema: impl Into<String>) -> Self {
        Self {
            source,
            schema: schema.into(),
        }
    }

    /// Schema this fetcher reads.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Gives the source back, e.g. to close its pool.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Runs both queries and builds the comment maps.
    ///
    /// # Errors
    /// Any query failure is returned as-is; no partial snapshot is produced.
    pub async fn fetch(&self) -> Result<CommentMaps> {
        tracing::info!(
            "Reading comments for schema '{}' from {}",
            self.schema,
            self.source.source_name()
        );

        let table_rows = self.source.table_comments(&self.schema).await?;
        tracing::debug!("Fetched {} table rows", table_rows.len());

        let column_rows = self.source.column_comments(&self.schema).await?;
        tracing::debug!("Fetched {} column rows", column_rows.len());

        let maps = CommentMaps::from_rows(table_rows, column_rows);

        if maps.is_empty() {
            tracing::warn!(
                "Schema '{}' returned no tables; diagrams will not change",
                self.schema
            );
        } else {
            tracing::info!(
                "Loaded comments for {} tables and {} columns",
                maps.table_count(),
                maps.column_count()
            );
        }

        Ok(maps)
    }
}
