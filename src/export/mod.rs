//! Export pipeline
//!
//! Turns an [`ExportRequest`] into a detached job that writes index structure
//! and documents of the source cluster into an archive session.
//!
//! # Architecture
//!
//! 1. **resolver**: pure index/type spec resolution and the rename table
//! 2. **metadata**: settings, mappings and aliases, ahead of any document
//! 3. **streamer**: scroll pagination and hit to packet conversion
//! 4. **registry**: directory of running jobs
//! 5. **coordinator**: synchronous submission plus the detached task
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use knapsack::archive::FileSessionFactory;
//! use knapsack::cluster::HttpClusterClient;
//! use knapsack::export::{ExportContext, ExportRequest, ExportService, InMemoryJobRegistry};
//!
//! # async fn run() -> knapsack::error::Result<()> {
//! let service = ExportService::new(ExportContext {
//!     cluster: Arc::new(HttpClusterClient::new("http://localhost:9200", Duration::from_secs(30))?),
//!     registry: Arc::new(InMemoryJobRegistry::new()),
//!     sessions: Arc::new(FileSessionFactory),
//!     node_name: "node-1".to_string(),
//!     default_path: "_all.jsonl".into(),
//! })?;
//! let response = service.submit(ExportRequest::new().index("logs-*").path("logs.jsonl"));
//! assert!(response.running);
//! service.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod metadata;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod streamer;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{ExportContext, ExportService};
pub use metadata::{MetadataExporter, MetadataStats};
pub use registry::{FileJobRegistry, InMemoryJobRegistry, JobRegistry};
pub use request::{ExportRequest, ExportResponse, JobMode, JobState};
pub use resolver::{IndexTypes, RenameTable, index_types, metadata_scope, split_spec};
pub use streamer::{DocumentStreamer, StreamStats, hit_packets};
