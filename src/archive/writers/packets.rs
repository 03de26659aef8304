//! Packet stream session
//!
//! Writes one JSON object per packet and line, keeping every key plus the
//! archive entry name, so structural metadata and documents share one file.

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::archive::{ArchivePacket, ArchiveSession, ProgressWatcher, SessionKind, SessionMode};
use crate::error::{Result, SessionError};

/// On-disk line layout
#[derive(Serialize)]
struct PacketLine<'a> {
    name: String,
    #[serde(flatten)]
    packet: &'a ArchivePacket,
}

/// Session writing every packet as a JSON line
pub struct PacketStreamSession {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Open mode
    mode: SessionMode,
    /// Packets written
    packets: u64,
    /// Transfer tracking
    watcher: ProgressWatcher,
    closed: bool,
}

impl PacketStreamSession {
    pub fn new(writer: BufWriter<File>, mode: SessionMode, watcher: ProgressWatcher) -> Self {
        Self {
            writer,
            mode,
            packets: 0,
            watcher,
            closed: false,
        }
    }
}

#[async_trait]
impl ArchiveSession for PacketStreamSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Archive
    }

    async fn write(&mut self, packet: &ArchivePacket) -> Result<()> {
        if self.closed {
            return Err(SessionError::Closed.into());
        }

        let line = PacketLine {
            name: packet.entry_name(self.mode.uri_encoded),
            packet,
        };
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;

        self.packets += 1;
        self.watcher.record(bytes.len() as u64);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.writer
            .flush()
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        self.watcher.finish();

        debug!("Closed packet stream ({} packets)", self.packets);
        Ok(())
    }

    fn packet_count(&self) -> u64 {
        self.packets
    }

    fn watcher(&self) -> &ProgressWatcher {
        &self.watcher
    }
}
