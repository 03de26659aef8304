//! File-backed archive sessions
//!
//! The target extension picks the session: `.bulk` opens a bulk-load stream,
//! anything else a packet stream.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::debug;

use crate::error::{Result, SessionError};

use super::{ArchiveSession, ProgressWatcher, SessionFactory, SessionMode};

pub mod bulk;
pub mod packets;

pub use bulk::BulkStreamSession;
pub use packets::PacketStreamSession;

/// Extension selecting the bulk-load stream
pub const BULK_EXTENSION: &str = "bulk";

/// Opens sessions on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSessionFactory;

impl SessionFactory for FileSessionFactory {
    fn open(
        &self,
        path: &Path,
        mode: SessionMode,
        watcher: ProgressWatcher,
    ) -> Result<Box<dyn ArchiveSession>> {
        let writer = open_writer(path, mode)?;
        let is_bulk = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(BULK_EXTENSION))
            .unwrap_or(false);

        debug!("Opened {} in mode {} (bulk: {})", path.display(), mode, is_bulk);

        if is_bulk {
            Ok(Box::new(BulkStreamSession::new(writer, watcher)))
        } else {
            Ok(Box::new(PacketStreamSession::new(writer, mode, watcher)))
        }
    }

    fn discard(
        &self,
        path: &Path,
        mode: SessionMode,
        session: Box<dyn ArchiveSession>,
    ) -> Result<()> {
        drop(session);
        if !mode.overwrite {
            fs::remove_file(path)?;
            debug!("Removed unused target {}", path.display());
        }
        Ok(())
    }
}

/// Open the target file according to `mode`
///
/// `Write` mode refuses an existing target atomically (create-new), so two
/// jobs racing for the same path cannot both open it.
pub(crate) fn open_writer(path: &Path, mode: SessionMode) -> Result<BufWriter<File>> {
    let mut options = OpenOptions::new();
    options.write(true);
    if mode.overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => SessionError::AlreadyExists(path.display().to_string()),
        _ => SessionError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        },
    })?;

    Ok(BufWriter::with_capacity(
        1024 * 1024,
        File::from_std(file),
    ))
}
