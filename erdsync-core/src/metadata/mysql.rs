//! MySQL/MariaDB comment source.
//!
//! Reads `INFORMATION_SCHEMA.TABLES` and `INFORMATION_SCHEMA.COLUMNS` over a
//! single-connection sqlx pool.
//!
//! # Security
//! - All operations are read-only (SELECT only), and the session is put in
//!   read-only mode when configured
//! - The password is handed to the driver directly and never formatted
//! - Every query is bounded by the configured query timeout

use super::{ColumnCommentRow, CommentSource, TableCommentRow};
use crate::Result;
use crate::config::ConnectionSettings;
use crate::error::ErdSyncError;
use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use std::future::Future;
use std::time::Duration;

// Cast to CHAR to avoid VARBINARY results on MySQL 8.0+
const TABLE_COMMENTS_QUERY: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR) AS TABLE_NAME,
        CAST(TABLE_COMMENT AS CHAR) AS TABLE_COMMENT
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ?
    ORDER BY TABLE_NAME ASC
"#;

const COLUMN_COMMENTS_QUERY: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR) AS TABLE_NAME,
        CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME,
        CAST(COLUMN_COMMENT AS CHAR) AS COLUMN_COMMENT
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ?
    ORDER BY TABLE_NAME ASC, ORDINAL_POSITION ASC
"#;

/// Comment source reading a live MySQL or MariaDB server.
pub struct MySqlCommentSource {
    pool: MySqlPool,
    query_timeout: Duration,
}

impl std::fmt::Debug for MySqlCommentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlCommentSource")
            .field("pool_size", &self.pool.size())
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl MySqlCommentSource {
    /// Connects to the server described by `settings`.
    ///
    /// The connection is established eagerly so that unreachable hosts and
    /// authentication failures surface before any diagram is touched.
    ///
    /// # Errors
    /// Returns a configuration error for invalid settings and a connection
    /// error when the server cannot be reached or rejects the credentials.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        settings.validate()?;

        tracing::info!("Connecting to {}", settings);

        let pool = create_pool(settings).await?;

        Ok(Self {
            pool,
            query_timeout: settings.query_timeout,
        })
    }

    /// Closes the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_rows(
        &self,
        query: &'static str,
        schema: &str,
        what: &str,
    ) -> Result<Vec<MySqlRow>> {
        let fetch = sqlx::query(query).bind(schema).fetch_all(&self.pool);
        with_timeout(self.query_timeout, what, fetch)
            .await?
            .map_err(|e| ErdSyncError::query_failed(format!("Failed to read {}", what), e))
    }
}

#[async_trait]
impl CommentSource for MySqlCommentSource {
    async fn table_comments(&self, schema: &str) -> Result<Vec<TableCommentRow>> {
        let rows = self
            .fetch_rows(TABLE_COMMENTS_QUERY, schema, "table comments")
            .await?;

        rows.iter()
            .map(|row| {
                Ok(TableCommentRow {
                    table: text_field(row, "TABLE_NAME")?,
                    comment: comment_field(row, "TABLE_COMMENT")?,
                })
            })
            .collect()
    }

    async fn column_comments(&self, schema: &str) -> Result<Vec<ColumnCommentRow>> {
        let rows = self
            .fetch_rows(COLUMN_COMMENTS_QUERY, schema, "column comments")
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ColumnCommentRow {
                    table: text_field(row, "TABLE_NAME")?,
                    column: text_field(row, "COLUMN_NAME")?,
                    comment: comment_field(row, "COLUMN_COMMENT")?,
                })
            })
            .collect()
    }

    fn source_name(&self) -> &'static str {
        "MySQL"
    }
}

fn text_field(row: &MySqlRow, field: &str) -> Result<String> {
    row.try_get(field).map_err(|e| {
        ErdSyncError::query_failed(format!("Failed to parse field '{}'", field), e)
    })
}

/// Reads a nullable comment column. NULL is `None`; a decode failure is an error.
fn comment_field(row: &MySqlRow, field: &str) -> Result<Option<String>> {
    comment_value(row.try_get::<Option<String>, _>(field), field)
}

fn comment_value(
    value: std::result::Result<Option<String>, sqlx::Error>,
    field: &str,
) -> Result<Option<String>> {
    value.map_err(|e| {
        ErdSyncError::query_failed(format!("Failed to parse field '{}'", field), e)
    })
}

async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    future: impl Future<Output = T>,
) -> Result<T> {
    tokio::time::timeout(limit, future).await.map_err(|e| {
        ErdSyncError::query_failed(
            format!("Reading {} timed out after {}s", what, limit.as_secs()),
            e,
        )
    })
}

fn connect_options(settings: &ConnectionSettings) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.schema);

    let username = settings.credentials.username();
    if !username.is_empty() {
        options = options.username(username);
    }

    if let Some(password) = settings.credentials.password() {
        options = options.password(password);
    }

    options
}

async fn create_pool(settings: &ConnectionSettings) -> Result<MySqlPool> {
    use sqlx::Executor;

    let read_only = settings.read_only;

    // Metadata is read once per run, so a single connection is enough.
    MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(settings.connect_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if read_only {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                }
                Ok(())
            })
        })
        .connect_with(connect_options(settings))
        .await
        .map_err(ErdSyncError::connection_failed)
}
