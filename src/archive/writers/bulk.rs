//! Bulk-load stream session
//!
//! Writes documents as bulk-load NDJSON (an action line followed by the
//! document body). The format has no room for settings, mappings or aliases.
//! Packets of one document arrive consecutively, so they are grouped by
//! `(index, type, id)` and emitted when the key changes or on close.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::archive::{ArchivePacket, ArchiveSession, ProgressWatcher, SOURCE_FIELD, SessionKind};
use crate::error::{Result, SessionError};

/// Document being assembled from consecutive packets
#[derive(Default)]
struct PendingDocument {
    index: String,
    type_name: String,
    id: String,
    source: Option<String>,
    routing: Option<String>,
    parent: Option<String>,
}

impl PendingDocument {
    fn matches(&self, packet: &ArchivePacket) -> bool {
        self.index == packet.index
            && self.type_name == packet.type_name
            && Some(self.id.as_str()) == packet.id.as_deref()
    }

    fn action_line(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::String(self.index.clone()));
        meta.insert("_type".to_string(), Value::String(self.type_name.clone()));
        meta.insert("_id".to_string(), Value::String(self.id.clone()));
        if let Some(routing) = &self.routing {
            meta.insert("routing".to_string(), Value::String(routing.clone()));
        }
        if let Some(parent) = &self.parent {
            meta.insert("parent".to_string(), Value::String(parent.clone()));
        }
        let mut action = Map::new();
        action.insert("index".to_string(), Value::Object(meta));
        Value::Object(action)
    }
}

/// Session writing documents in bulk-load form
pub struct BulkStreamSession {
    writer: BufWriter<File>,
    pending: Option<PendingDocument>,
    packets: u64,
    documents: u64,
    watcher: ProgressWatcher,
    closed: bool,
}

impl BulkStreamSession {
    pub fn new(writer: BufWriter<File>, watcher: ProgressWatcher) -> Self {
        Self {
            writer,
            pending: None,
            packets: 0,
            documents: 0,
            watcher,
            closed: false,
        }
    }

    /// Write out the pending document, if it has a body
    async fn flush_pending(&mut self) -> Result<()> {
        let Some(doc) = self.pending.take() else {
            return Ok(());
        };
        let Some(source) = &doc.source else {
            debug!("Skipping {}/{}/{} without _source", doc.index, doc.type_name, doc.id);
            return Ok(());
        };

        let mut bytes = serde_json::to_vec(&doc.action_line())?;
        bytes.push(b'\n');
        bytes.extend_from_slice(source.as_bytes());
        bytes.push(b'\n');

        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        self.documents += 1;
        self.watcher.record(bytes.len() as u64);
        Ok(())
    }
}

#[async_trait]
impl ArchiveSession for BulkStreamSession {
    fn kind(&self) -> SessionKind {
        SessionKind::BulkLoad
    }

    async fn write(&mut self, packet: &ArchivePacket) -> Result<()> {
        if self.closed {
            return Err(SessionError::Closed.into());
        }
        self.packets += 1;

        let (Some(id), Some(field)) = (&packet.id, &packet.field) else {
            debug!("Bulk stream ignores structural packet {}", packet.entry_name(false));
            return Ok(());
        };

        if !self.pending.as_ref().is_some_and(|doc| doc.matches(packet)) {
            self.flush_pending().await?;
            self.pending = Some(PendingDocument {
                index: packet.index.clone(),
                type_name: packet.type_name.clone(),
                id: id.clone(),
                ..Default::default()
            });
        }

        if let Some(doc) = self.pending.as_mut() {
            match field.as_str() {
                SOURCE_FIELD => doc.source = Some(packet.payload.clone()),
                "_routing" => doc.routing = Some(packet.payload.clone()),
                "_parent" => doc.parent = Some(packet.payload.clone()),
                _ => {}
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_pending().await?;
        self.closed = true;

        self.writer
            .flush()
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        self.watcher.finish();

        debug!(
            "Closed bulk stream ({} packets, {} documents)",
            self.packets, self.documents
        );
        Ok(())
    }

    fn packet_count(&self) -> u64 {
        self.packets
    }

    fn watcher(&self) -> &ProgressWatcher {
        &self.watcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::SessionMode;
    use crate::archive::writers::open_writer;

    #[tokio::test]
    async fn test_groups_fields_into_bulk_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bulk");
        let writer = open_writer(&path, SessionMode::default()).unwrap();
        let mut session = BulkStreamSession::new(writer, ProgressWatcher::silent());

        session.write(&ArchivePacket::settings("idx", "{}")).await.unwrap();
        session
            .write(&ArchivePacket::document("idx", "t", "1", "_routing", "r1"))
            .await
            .unwrap();
        session
            .write(&ArchivePacket::document("idx", "t", "1", "_source", r#"{"a":1}"#))
            .await
            .unwrap();
        session
            .write(&ArchivePacket::document("idx", "t", "2", "_source", r#"{"a":2}"#))
            .await
            .unwrap();
        session.close().await.unwrap();

        assert_eq!(session.packet_count(), 4);
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["index"]["_id"], "1");
        assert_eq!(first["index"]["routing"], "r1");
        assert_eq!(lines[1], r#"{"a":1}"#);

        let second: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(second["index"]["_id"], "2");
        assert!(second["index"].get("routing").is_none());
    }

    #[tokio::test]
    async fn test_document_without_source_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bulk");
        let writer = open_writer(&path, SessionMode::default()).unwrap();
        let mut session = BulkStreamSession::new(writer, ProgressWatcher::silent());

        session
            .write(&ArchivePacket::document("idx", "t", "1", "title", "x"))
            .await
            .unwrap();
        session.close().await.unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
    }
}
