//! Analytics snapshot pipeline for the dissertation catalog explorer.
//!
//! Raw catalog records are aggregated into timeline, school, statistics and
//! school time-series artifacts, which are published together as JSON files
//! for the read-only chart explorer.

pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod schools;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod stats;
pub mod timeline;
pub mod timeseries;

pub use error::{Error, Result};
pub use server::{build_router, AppState};
pub use snapshot::{regenerate, Snapshot, SnapshotStore};
pub use source::{CsvSource, MemorySource, RecordSource};
