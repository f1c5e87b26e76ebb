//! Core library for erdsync.
//!
//! erdsync copies table and column comments from a MySQL/MariaDB schema
//! into `.dxml` ER-diagram documents. Comment text is stored in the
//! diagram as escaped CP949 bytes (`\200\184...`), the form the diagram
//! tool reads back as Korean text.
//!
//! # Guarantees
//! - Database access is read-only (SELECT on `INFORMATION_SCHEMA` only)
//! - Credentials are never logged or included in error messages
//! - Only `Comments` (and optionally `Tablename`/`TableType`) of matched
//!   nodes change; everything else in a diagram is written back verbatim
//! - Re-running with the same metadata produces byte-identical files
//!
//! # Architecture
//! - [`metadata`]: one snapshot of comments per run, behind [`CommentSource`]
//! - [`encoding`]: CP949 transcoding and decimal byte escaping
//! - [`document`]: streaming diagram rewrite that preserves untouched bytes
//! - [`merger`] and [`batch`]: per-file and per-folder application

pub mod batch;
pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod merger;
pub mod metadata;
pub mod security;
pub mod sync;

// Re-export commonly used types
pub use batch::{BatchDriver, BatchReport, FileFailure};
pub use config::{
    BatchSettings, ConnectionSettings, FailurePolicy, MergePolicy, SyncSettings,
};
pub use encoding::{EncodingPolicy, decode_escaped, encode_comment, transcode};
pub use error::{ErdSyncError, Result};
pub use merger::{DocumentMerger, FileOutcome, MergeStats};
pub use metadata::{CommentMaps, CommentSource, MetadataFetcher, StaticCommentSource};
pub use sync::synchronize;

#[cfg(feature = "mysql")]
pub use metadata::mysql::MySqlCommentSource;
