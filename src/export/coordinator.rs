//! Export orchestration
//!
//! Submission is synchronous: it opens the archive session, registers the job
//! and schedules the export task before answering. A submission the registry
//! refuses discards its session again. Everything after that
//! happens in the detached task, whose errors end in the log and never reach
//! the caller.
//!
//! # Task lifecycle
//!
//! 1. Resolve the metadata scope and the document entries
//! 2. Export settings, mappings and aliases (unless disabled or bulk sink)
//! 3. Stream documents page by page, polling cancellation once per page
//! 4. Close the session and log the transfer summary
//!
//! Deregistration is tied to the task through a drop guard, so it runs on
//! success, failure, cancellation and abort alike.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::archive::{ArchiveSession, ProgressWatcher, SessionFactory, SessionKind, SessionMode};
use crate::cluster::ClusterClient;
use crate::error::{KnapsackError, Result};
use crate::utils::convert::format_bytes;
use crate::utils::time::format_duration;

use super::metadata::{MetadataExporter, MetadataStats};
use super::registry::JobRegistry;
use super::request::{ExportRequest, ExportResponse, JobState};
use super::resolver::{index_types, metadata_scope};
use super::streamer::{DocumentStreamer, StreamStats};

/// Collaborators shared by every export job
#[derive(Clone)]
pub struct ExportContext {
    pub cluster: Arc<dyn ClusterClient>,
    pub registry: Arc<dyn JobRegistry>,
    pub sessions: Arc<dyn SessionFactory>,
    /// Identity of this node in job states
    pub node_name: String,
    /// Target used when a request names none
    pub default_path: PathBuf,
}

type Cancellations = Arc<Mutex<HashMap<Uuid, CancellationToken>>>;

/// Accepts export submissions and runs them as detached tasks
pub struct ExportService {
    ctx: Arc<ExportContext>,
    runtime: Handle,
    tracker: TaskTracker,
    cancellations: Cancellations,
}

impl ExportService {
    /// Create a service scheduling onto the current tokio runtime
    pub fn new(ctx: ExportContext) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| KnapsackError::Generic(format!("no tokio runtime for export tasks: {e}")))?;
        Ok(Self {
            ctx: Arc::new(ctx),
            runtime,
            tracker: TaskTracker::new(),
            cancellations: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Submit an export
    ///
    /// Returns once the job is registered and scheduled, never waiting for
    /// the export itself. A rejected submission registers nothing.
    pub fn submit(&self, request: ExportRequest) -> ExportResponse {
        let path = request
            .path
            .clone()
            .unwrap_or_else(|| self.ctx.default_path.clone());
        let mode = SessionMode::new(request.overwrite, request.encode_entry_names);
        let watcher = ProgressWatcher::new(request.bytes_to_transfer, request.progress_bar);

        let session = match self.ctx.sessions.open(&path, mode, watcher) {
            Ok(session) => session,
            Err(e) => {
                warn!("export rejected for {}: {}", path.display(), e);
                return ExportResponse::rejected(format!(
                    "session can not be opened: mode={} path={}: {}",
                    mode,
                    path.display(),
                    e
                ));
            }
        };

        let state = JobState::export(&self.ctx.node_name, &path);
        if let Err(e) = self.ctx.registry.add(&state) {
            warn!("export rejected, job {} not registered: {}", state.id, e);
            if let Err(discard) = self.ctx.sessions.discard(&path, mode, session) {
                warn!("unused session on {} not discarded: {}", path.display(), discard);
            }
            return ExportResponse::rejected(format!("job can not be registered: {e}"));
        }

        let cancel = CancellationToken::new();
        if let Ok(mut cancellations) = self.cancellations.lock() {
            cancellations.insert(state.id, cancel.clone());
        }
        let deregistration = Deregistration {
            registry: self.ctx.registry.clone(),
            cancellations: self.cancellations.clone(),
            state: state.clone(),
        };

        let job = ExportJob {
            ctx: self.ctx.clone(),
            request,
            state: state.clone(),
            session,
            cancel,
        };
        let span = info_span!("export", job = %state.id, path = %path.display());
        self.tracker.spawn_on(
            async move {
                let _deregistration = deregistration;
                job.run().await;
            }
            .instrument(span),
            &self.runtime,
        );

        ExportResponse::accepted(state)
    }

    /// Jobs currently registered
    pub fn running(&self) -> Result<Vec<JobState>> {
        self.ctx.registry.list()
    }

    /// Request cooperative cancellation of one job
    ///
    /// # Returns
    /// * `bool` - Whether the job was still running
    pub fn cancel(&self, id: &Uuid) -> bool {
        let token = self
            .cancellations
            .lock()
            .ok()
            .and_then(|cancellations| cancellations.get(id).cloned());
        match token {
            Some(token) => {
                info!("cancelling export {}", id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every running job
    pub fn cancel_all(&self) {
        if let Ok(cancellations) = self.cancellations.lock() {
            for (id, token) in cancellations.iter() {
                info!("cancelling export {}", id);
                token.cancel();
            }
        }
    }

    /// Wait until every submitted task has terminated
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

/// Removes a job from the registry when its task ends, however it ends
struct Deregistration {
    registry: Arc<dyn JobRegistry>,
    cancellations: Cancellations,
    state: JobState,
}

impl Drop for Deregistration {
    fn drop(&mut self) {
        if let Ok(mut cancellations) = self.cancellations.lock() {
            cancellations.remove(&self.state.id);
        }
        match self.registry.remove(&self.state) {
            Ok(()) => debug!("deregistered {}", self.state),
            Err(e) => error!("failed to deregister {}: {}", self.state, e),
        }
    }
}

/// Everything one detached export task owns
struct ExportJob {
    ctx: Arc<ExportContext>,
    request: ExportRequest,
    state: JobState,
    session: Box<dyn ArchiveSession>,
    cancel: CancellationToken,
}

impl ExportJob {
    async fn run(mut self) {
        info!("start of export {}", self.state);

        match self.perform().await {
            Ok((metadata, streamed)) => {
                let watcher = self.session.watcher();
                let elapsed = (Utc::now() - self.state.started_at)
                    .to_std()
                    .unwrap_or_default();
                info!(
                    "end of export {} after {}: {} packets ({} metadata, {} hits{}), {} transferred, {:.0} bytes/s",
                    self.state.id,
                    format_duration(elapsed),
                    self.session.packet_count(),
                    metadata.indices + metadata.mappings + metadata.aliases,
                    streamed.hits,
                    if streamed.cancelled { ", cancelled" } else { "" },
                    format_bytes(watcher.total_bytes()),
                    watcher.recent_byte_rate()
                );
            }
            Err(e) => {
                error!("export {} failed: {}", self.state.id, e);
                if let Err(e) = self.session.close().await {
                    warn!("failed to close session of {}: {}", self.state.id, e);
                }
            }
        }
        self.session.watcher().finish();
    }

    async fn perform(&mut self) -> Result<(MetadataStats, StreamStats)> {
        let request = &self.request;
        let cluster = self.ctx.cluster.as_ref();
        let session = self.session.as_mut();

        let scope = metadata_scope(&request.index, &request.types, request.index_types.as_deref());
        let entries = index_types(&request.index, &request.types);

        let mut metadata = MetadataStats::default();
        if request.with_metadata && session.kind() != SessionKind::BulkLoad {
            metadata = MetadataExporter::new(cluster, &request.renames, request.with_aliases)
                .export(&scope, session)
                .await?;
        }

        let streamed = DocumentStreamer::new(
            cluster,
            &request.renames,
            request.query.clone(),
            request.scroll_timeout,
            request.scroll_size,
        )
        .stream(&entries, session, &self.cancel)
        .await?;

        session.close().await?;
        Ok((metadata, streamed))
    }
}
