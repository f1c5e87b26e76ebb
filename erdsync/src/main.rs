//! Database comment synchronization for ER diagrams.
//!
//! Connects to MySQL/MariaDB once, reads every table and column comment of
//! one schema, and merges them into the `.dxml` diagrams of a folder.
//!
//! # Security Guarantees
//! - Read-only database session
//! - No credentials stored or logged
//! - Diagrams are replaced atomically

use clap::Parser;
use erdsync::cli::Cli;
use erdsync::report;
use erdsync_core::logging::init_logging;
use erdsync_core::{MySqlCommentSource, Result, synchronize};
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Environment variables already set take precedence over .env
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match dotenv {
        Ok(path) => info!("Loaded settings from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let settings = cli.to_settings().map_err(|e| {
        error!("{}", e);
        e
    })?;

    info!("Target: {}", settings.connection);
    info!("Diagrams: {}", settings.batch.erd_folder.display());
    if settings.batch.dry_run {
        info!("Dry run: no diagram will be written");
    }

    let source = MySqlCommentSource::connect(&settings.connection)
        .await
        .map_err(|e| {
            error!("Failed to connect: {}", e);
            e
        })?;

    let result = synchronize(&source, &settings).await;
    source.close().await;

    let report = result.map_err(|e| {
        error!("Synchronization failed: {}", e);
        e
    })?;

    if cli.json {
        println!("{}", report::to_json(&report)?);
    } else if !cli.global.quiet {
        println!("{}", report::summary(&report));
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
