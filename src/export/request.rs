//! Export request, response and running-job state

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::resolver::RenameTable;
use crate::cluster::ALL_INDICES;

/// Options of one export submission
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Comma-delimited index spec, may contain wildcards
    pub index: String,
    /// Comma-delimited type spec (empty = all types)
    pub types: String,
    /// Target path (configured default when unset)
    pub path: Option<PathBuf>,
    /// Truncate an existing target
    pub overwrite: bool,
    /// Percent-encode archive entry names
    pub encode_entry_names: bool,
    /// Export settings and mappings before documents
    pub with_metadata: bool,
    /// Export aliases along with metadata
    pub with_aliases: bool,
    /// Advisory transfer budget in bytes, feeds progress reporting only
    pub bytes_to_transfer: u64,
    /// Scroll keep-alive
    pub scroll_timeout: Duration,
    /// Hits per scroll page
    pub scroll_size: u32,
    /// Raw search body replacing match-all
    pub query: Option<Value>,
    /// Explicit `index/type` pairs scoping the metadata phase
    pub index_types: Option<Vec<String>>,
    /// Source to destination index/type names
    pub renames: RenameTable,
    /// Draw a byte progress bar
    pub progress_bar: bool,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            index: ALL_INDICES.to_string(),
            types: String::new(),
            path: None,
            overwrite: false,
            encode_entry_names: false,
            with_metadata: true,
            with_aliases: true,
            bytes_to_transfer: 0,
            scroll_timeout: Duration::from_secs(60),
            scroll_size: 1000,
            query: None,
            index_types: None,
            renames: RenameTable::default(),
            progress_bar: false,
        }
    }
}

impl ExportRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Comma-separated index spec
    pub fn index(mut self, spec: impl Into<String>) -> Self {
        self.index = spec.into();
        self
    }

    pub fn types(mut self, spec: impl Into<String>) -> Self {
        self.types = spec.into();
        self
    }

    /// Target path; the service default applies when unset
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn overwrite(mut self, yes: bool) -> Self {
        self.overwrite = yes;
        self
    }

    pub fn encode_entry_names(mut self, yes: bool) -> Self {
        self.encode_entry_names = yes;
        self
    }

    pub fn with_metadata(mut self, yes: bool) -> Self {
        self.with_metadata = yes;
        self
    }

    pub fn with_aliases(mut self, yes: bool) -> Self {
        self.with_aliases = yes;
        self
    }

    pub fn bytes_to_transfer(mut self, bytes: u64) -> Self {
        self.bytes_to_transfer = bytes;
        self
    }

    /// Scroll keep-alive
    pub fn scroll_timeout(mut self, timeout: Duration) -> Self {
        self.scroll_timeout = timeout;
        self
    }

    pub fn scroll_size(mut self, size: u32) -> Self {
        self.scroll_size = size;
        self
    }

    pub fn query(mut self, body: Value) -> Self {
        self.query = Some(body);
        self
    }

    /// Explicit `index/type` pairs, overriding the index and type specs
    pub fn index_types<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_types = Some(pairs.into_iter().map(Into::into).collect());
        self
    }

    pub fn renames(mut self, renames: RenameTable) -> Self {
        self.renames = renames;
        self
    }

    pub fn progress_bar(mut self, yes: bool) -> Self {
        self.progress_bar = yes;
        self
    }
}

/// Kind of background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Export,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Export => write!(f, "export"),
        }
    }
}

/// State of one running job
///
/// Two states are equal when they describe the same running job, whatever
/// their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub id: Uuid,
    pub mode: JobMode,
    /// Node the job runs on
    pub node_name: String,
    /// Resolved target path
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl JobState {
    /// State of a new export job starting now
    pub fn export(node_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: JobMode::Export,
            node_name: node_name.into(),
            path: path.into(),
            started_at: Utc::now(),
        }
    }
}

impl PartialEq for JobState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JobState {}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} node={} path={} started={}]",
            self.mode,
            self.id,
            self.node_name,
            self.path.display(),
            self.started_at.to_rfc3339()
        )
    }
}

/// Synchronous answer to a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    /// Whether a background job was started
    pub running: bool,
    /// Why the submission was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Snapshot of the started job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
}

impl ExportResponse {
    pub fn accepted(state: JobState) -> Self {
        Self {
            running: true,
            reason: None,
            state: Some(state),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            running: false,
            reason: Some(reason.into()),
            state: None,
        }
    }
}
