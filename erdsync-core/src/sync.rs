//! One-shot synchronization: fetch the comment snapshot, then merge it
//! into every diagram in the configured folder.

use crate::batch::{BatchDriver, BatchReport};
use crate::config::SyncSettings;
use crate::error::Result;
use crate::metadata::{CommentSource, MetadataFetcher};

/// Runs a full synchronization with an already-connected source.
///
/// Settings are validated before the source is queried, and the snapshot
/// is fetched exactly once. A metadata failure stops the run before any
/// diagram is read.
///
/// # Errors
/// Configuration, query and folder errors, plus the first file error when
/// the failure policy is abort.
pub async fn synchronize<S: CommentSource>(
    source: &S,
    settings: &SyncSettings,
) -> Result<BatchReport> {
    settings.validate()?;

    let maps = MetadataFetcher::new(source, &settings.connection)
        .fetch()
        .await?;

    BatchDriver::new(settings.batch.clone()).run(&maps).await
}
