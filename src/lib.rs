//! Knapsack Library
//!
//! Exports the contents of a search cluster's indices into a portable,
//! replayable archive or a bulk-load stream, keeping index structure
//! (settings, mappings, aliases) alongside the documents.
//!
//! # Modules
//!
//! - `archive`: Archive packets, sessions and progress tracking
//! - `cli`: Command-line interface and argument parsing
//! - `cluster`: Cluster client contract and its REST implementation
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export pipeline and background job management
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use knapsack::export::{index_types, metadata_scope};
//!
//! let pairs = vec!["a/x".to_string(), "_all/z".to_string(), "b".to_string()];
//! let scope = metadata_scope("", "", Some(pairs.as_slice()));
//! assert!(!scope.contains_key("_all"));
//! assert_eq!(index_types("a,a,b", "").len(), 2);
//! ```

pub mod archive;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod export;
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchivePacket, ArchiveSession, SessionFactory, SessionMode};
pub use cluster::{ClusterClient, HttpClusterClient};
pub use config::Config;
pub use error::{KnapsackError, Result};
pub use export::{ExportContext, ExportRequest, ExportResponse, ExportService, JobState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
