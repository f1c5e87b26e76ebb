//! Configuration types for a synchronization run.
//!
//! - `ConnectionSettings`: database location, schema and credentials
//! - `SyncSettings` / `BatchSettings`: diagram folder and per-file policies
//! - `MergePolicy` / `FailurePolicy`: how documents are updated and how
//!   per-file failures affect the batch
//!
//! Settings are plain values passed into constructors; nothing here is
//! global or mutable after the run starts.

mod connection;
mod sync;

pub use connection::{ConnectionSettings, DEFAULT_MYSQL_PORT};
pub use sync::{BatchSettings, FailurePolicy, MergePolicy, SyncSettings};
