//! Command-line front end for erdsync.
//!
//! The binary loads `.env`, parses [`cli::Cli`], connects to the database
//! and hands the resulting settings to [`erdsync_core::synchronize`].

pub mod cli;
pub mod report;
