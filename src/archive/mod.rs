//! Archive sessions: the ordered packet sink an export writes into
//!
//! An export produces a sequence of [`ArchivePacket`]s. Each packet carries
//! `index` and `type` keys, document packets additionally carry `id` and
//! `field`, and metadata packets carry an `id` from a fixed vocabulary
//! (`_mapping`, `_alias`) or none at all (settings).
//!
//! # Architecture
//!
//! 1. **ArchiveSession**: open → write* → close lifecycle over one target
//! 2. **SessionFactory**: opens a session for a path and [`SessionMode`]
//! 3. **ProgressWatcher**: byte throughput of the session, owned by it
//!
//! Two concrete sessions exist: the packet stream ([`PacketStreamSession`])
//! which keeps every packet, and the bulk stream ([`BulkStreamSession`])
//! which only keeps documents in bulk-load form and has no structural channel.

pub mod progress;
pub mod writers;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::string::percent_encode;

pub use progress::ProgressWatcher;
pub use writers::{BulkStreamSession, FileSessionFactory, PacketStreamSession};

/// `type` key of an index settings packet
pub const SETTINGS_TYPE: &str = "_settings";
/// `id` key of a mapping packet
pub const MAPPING_ID: &str = "_mapping";
/// `id` key of an alias packet
pub const ALIAS_ID: &str = "_alias";
/// `field` key of the raw document body
pub const SOURCE_FIELD: &str = "_source";

/// One output unit: metadata keys plus an opaque payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePacket {
    pub index: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub payload: String,
}

impl ArchivePacket {
    /// Settings of one index
    pub fn settings(index: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            type_name: SETTINGS_TYPE.to_string(),
            id: None,
            field: None,
            payload: payload.into(),
        }
    }

    /// Mapping of one type
    pub fn mapping(
        index: impl Into<String>,
        type_name: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            type_name: type_name.into(),
            id: Some(MAPPING_ID.to_string()),
            field: None,
            payload: payload.into(),
        }
    }

    /// Alias bound to an index; the alias name travels in the `type` key
    pub fn alias(
        index: impl Into<String>,
        alias: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            type_name: alias.into(),
            id: Some(ALIAS_ID.to_string()),
            field: None,
            payload: payload.into(),
        }
    }

    /// One field of one document
    pub fn document(
        index: impl Into<String>,
        type_name: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            type_name: type_name.into(),
            id: Some(id.into()),
            field: Some(field.into()),
            payload: payload.into(),
        }
    }

    /// Whether this packet carries document data rather than index structure
    pub fn is_document(&self) -> bool {
        self.field.is_some()
    }

    /// Archive entry name: `index/type[/id[/field]]`
    ///
    /// With `encoded`, every component is percent-encoded so that names
    /// containing `/` or non-ASCII characters survive any container format.
    pub fn entry_name(&self, encoded: bool) -> String {
        let encode = |s: &str| {
            if encoded {
                percent_encode(s)
            } else {
                s.to_string()
            }
        };
        let mut parts = vec![encode(&self.index), encode(&self.type_name)];
        if let Some(id) = &self.id {
            parts.push(encode(id));
        }
        if let Some(field) = &self.field {
            parts.push(encode(field));
        }
        parts.join("/")
    }
}

/// Open mode of a session, from two independent flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMode {
    /// Truncate an existing target instead of refusing it
    pub overwrite: bool,
    /// Percent-encode entry names
    pub uri_encoded: bool,
}

impl SessionMode {
    pub fn new(overwrite: bool, uri_encoded: bool) -> Self {
        Self {
            overwrite,
            uri_encoded,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_mode = if self.overwrite { "OVERWRITE" } else { "WRITE" };
        let naming = if self.uri_encoded { "URI_ENCODED" } else { "NONE" };
        write!(f, "[{write_mode}, {naming}]")
    }
}

/// Concrete sink family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Keeps every packet, structural metadata included
    Archive,
    /// Bulk-load stream; documents only
    BulkLoad,
}

/// Ordered packet sink with open/write/close lifecycle
///
/// Writes are sequential: one writer per session.
#[async_trait]
pub trait ArchiveSession: Send {
    /// Sink family of this session
    fn kind(&self) -> SessionKind;

    /// Write one packet and increment the packet counter
    async fn write(&mut self, packet: &ArchivePacket) -> Result<()>;

    /// Flush and finalize the target; calling it again is a no-op
    async fn close(&mut self) -> Result<()>;

    /// Number of packets written so far
    fn packet_count(&self) -> u64;

    /// Transfer tracking for this session
    fn watcher(&self) -> &ProgressWatcher;
}

/// Opens sessions; opening is synchronous so submission never awaits I/O
pub trait SessionFactory: Send + Sync {
    /// Open a session on `path`
    ///
    /// # Returns
    /// * `Result<Box<dyn ArchiveSession>>` - Open session, or why it cannot be opened
    fn open(
        &self,
        path: &Path,
        mode: SessionMode,
        watcher: ProgressWatcher,
    ) -> Result<Box<dyn ArchiveSession>>;

    /// Give back a session that was opened but never used
    ///
    /// Undoes what `open` left behind where that is possible; a truncated
    /// target stays truncated.
    fn discard(
        &self,
        _path: &Path,
        _mode: SessionMode,
        session: Box<dyn ArchiveSession>,
    ) -> Result<()> {
        drop(session);
        Ok(())
    }
}
