//! In-memory collaborators for exercising the export pipeline without a
//! cluster or a filesystem.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::archive::{
    ArchivePacket, ArchiveSession, ProgressWatcher, SessionFactory, SessionKind, SessionMode,
};
use crate::cluster::{ClusterClient, SearchHit, SearchPage, SearchRequest};
use crate::error::{ClusterError, Result, SessionError};

/// One index of a [`MemoryCluster`]
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryIndex {
    pub settings: String,
    pub mappings: BTreeMap<String, String>,
    pub aliases: BTreeMap<String, String>,
    pub hits: Vec<SearchHit>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            settings: r#"{"index":{"number_of_shards":"1"}}"#.to_string(),
            ..Default::default()
        }
    }

    pub fn mapping(mut self, type_name: &str) -> Self {
        self.mappings
            .insert(type_name.to_string(), format!(r#"{{"{type_name}":{{"properties":{{}}}}}}"#));
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.insert(alias.to_string(), "{}".to_string());
        self
    }

    /// Add a document with a `_source` body and the given stored fields
    pub fn doc(mut self, type_name: &str, id: &str, fields: &[(&str, Value)]) -> Self {
        self.hits.push(SearchHit {
            index: String::new(),
            type_name: type_name.to_string(),
            id: id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            source: Some(format!(r#"{{"id":"{id}"}}"#)),
        });
        self
    }
}

#[derive(Default)]
struct ScrollState {
    next_id: usize,
    pending: HashMap<String, VecDeque<Vec<SearchHit>>>,
    scroll_calls: usize,
}

/// Scripted cluster serving a fixed set of indices
#[derive(Default)]
pub(crate) struct MemoryCluster {
    indices: BTreeMap<String, MemoryIndex>,
    page_size: usize,
    pub fail_settings: bool,
    pub fail_search: bool,
    /// Cancel this token during the n-th scroll call
    pub cancel_on_scroll: Option<(usize, CancellationToken)>,
    scrolls: Mutex<ScrollState>,
    /// Every search request received
    pub searches: Mutex<Vec<SearchRequest>>,
    /// Index lists passed to the settings lookup
    pub settings_requests: Mutex<Vec<Vec<String>>>,
    /// Released scroll cursors
    pub cleared: Mutex<Vec<String>>,
}

impl MemoryCluster {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, name: &str, mut index: MemoryIndex) -> Self {
        for hit in &mut index.hits {
            hit.index = name.to_string();
        }
        self.indices.insert(name.to_string(), index);
        self
    }

    /// Concrete indices matched by a token: exact name, `prefix*`, or alias
    fn matching(&self, token: &str) -> Vec<String> {
        self.indices
            .iter()
            .filter(|(name, index)| match token.strip_suffix('*') {
                Some(prefix) => name.starts_with(prefix),
                None => *name == token || index.aliases.contains_key(token),
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn resolve(&self, tokens: &[String]) -> BTreeSet<String> {
        if tokens.is_empty() || tokens.iter().any(|t| t == "_all") {
            return self.indices.keys().cloned().collect();
        }
        tokens.iter().flat_map(|t| self.matching(t)).collect()
    }
}

fn cluster_failure(what: &str) -> crate::error::KnapsackError {
    ClusterError::Status {
        status: 500,
        body: format!("{what} failed"),
    }
    .into()
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn resolve_settings(&self, indices: &[String]) -> Result<BTreeMap<String, String>> {
        self.settings_requests.lock().unwrap().push(indices.to_vec());
        if self.fail_settings {
            return Err(cluster_failure("settings"));
        }
        Ok(self
            .resolve(indices)
            .into_iter()
            .map(|name| {
                let settings = self.indices[&name].settings.clone();
                (name, settings)
            })
            .collect())
    }

    async fn resolve_mapping(
        &self,
        index: &str,
        types: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, String>> {
        let index = self.indices.get(index).ok_or_else(|| cluster_failure("mapping"))?;
        Ok(index
            .mappings
            .iter()
            .filter(|(t, _)| types.is_empty() || types.contains(*t))
            .map(|(t, m)| (t.clone(), m.clone()))
            .collect())
    }

    async fn resolve_aliases(&self, index: &str) -> Result<BTreeMap<String, String>> {
        let index = self.indices.get(index).ok_or_else(|| cluster_failure("alias"))?;
        Ok(index.aliases.clone())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        self.searches.lock().unwrap().push(request.clone());
        if self.fail_search {
            return Err(cluster_failure("search"));
        }

        let hits: Vec<SearchHit> = self
            .resolve(&request.indices)
            .iter()
            .flat_map(|name| self.indices[name].hits.iter())
            .filter(|hit| request.types.is_empty() || request.types.contains(&hit.type_name))
            .cloned()
            .collect();

        let mut pages: VecDeque<Vec<SearchHit>> =
            hits.chunks(self.page_size).map(|c| c.to_vec()).collect();
        let first = pages.pop_front().unwrap_or_default();

        let mut scrolls = self.scrolls.lock().unwrap();
        scrolls.next_id += 1;
        let scroll_id = format!("scroll-{}", scrolls.next_id);
        scrolls.pending.insert(scroll_id.clone(), pages);

        Ok(SearchPage {
            scroll_id: Some(scroll_id),
            hits: first,
            took_ms: 1,
        })
    }

    async fn scroll_next(&self, scroll_id: &str, _keep_alive: Duration) -> Result<SearchPage> {
        let mut scrolls = self.scrolls.lock().unwrap();
        scrolls.scroll_calls += 1;
        if let Some((n, token)) = &self.cancel_on_scroll
            && *n == scrolls.scroll_calls
        {
            token.cancel();
        }
        let hits = scrolls
            .pending
            .get_mut(scroll_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(SearchPage {
            scroll_id: Some(scroll_id.to_string()),
            hits,
            took_ms: 1,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.cleared.lock().unwrap().push(scroll_id.to_string());
        Ok(())
    }
}

/// Packets and lifecycle of one recorded session
#[derive(Debug, Default)]
pub(crate) struct Recording {
    pub packets: Vec<ArchivePacket>,
    pub closed: bool,
}

/// Session keeping its packets in shared memory
pub(crate) struct MemorySession {
    kind: SessionKind,
    recording: Arc<Mutex<Recording>>,
    watcher: ProgressWatcher,
    packets: u64,
    /// Fail the n-th write (1-based)
    fail_on_write: Option<u64>,
}

impl MemorySession {
    pub fn new(kind: SessionKind) -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        let session = Self {
            kind,
            recording: recording.clone(),
            watcher: ProgressWatcher::silent(),
            packets: 0,
            fail_on_write: None,
        };
        (session, recording)
    }
}

#[async_trait]
impl ArchiveSession for MemorySession {
    fn kind(&self) -> SessionKind {
        self.kind
    }

    async fn write(&mut self, packet: &ArchivePacket) -> Result<()> {
        let mut recording = self.recording.lock().unwrap();
        if recording.closed {
            return Err(SessionError::Closed.into());
        }
        if self.fail_on_write == Some(self.packets + 1) {
            return Err(SessionError::WriteFailed("disk full".to_string()).into());
        }
        recording.packets.push(packet.clone());
        self.packets += 1;
        self.watcher.record(packet.payload.len() as u64);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.recording.lock().unwrap().closed = true;
        Ok(())
    }

    fn packet_count(&self) -> u64 {
        self.packets
    }

    fn watcher(&self) -> &ProgressWatcher {
        &self.watcher
    }
}

/// Factory handing out [`MemorySession`]s and refusing paths already in use
/// unless overwriting
pub(crate) struct MemorySessionFactory {
    kind: SessionKind,
    pub fail_on_write: Option<u64>,
    opened: Mutex<HashSet<PathBuf>>,
    pub recordings: Mutex<HashMap<PathBuf, Arc<Mutex<Recording>>>>,
}

impl MemorySessionFactory {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            fail_on_write: None,
            opened: Mutex::new(HashSet::new()),
            recordings: Mutex::new(HashMap::new()),
        }
    }

    pub fn recording(&self, path: &Path) -> Arc<Mutex<Recording>> {
        self.recordings.lock().unwrap()[path].clone()
    }
}

impl SessionFactory for MemorySessionFactory {
    fn open(
        &self,
        path: &Path,
        mode: SessionMode,
        _watcher: ProgressWatcher,
    ) -> Result<Box<dyn ArchiveSession>> {
        let mut opened = self.opened.lock().unwrap();
        if !mode.overwrite && opened.contains(path) {
            return Err(SessionError::AlreadyExists(path.display().to_string()).into());
        }
        opened.insert(path.to_path_buf());

        let (mut session, recording) = MemorySession::new(self.kind);
        session.fail_on_write = self.fail_on_write;
        self.recordings
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), recording);
        Ok(Box::new(session))
    }

    fn discard(
        &self,
        path: &Path,
        mode: SessionMode,
        _session: Box<dyn ArchiveSession>,
    ) -> Result<()> {
        if !mode.overwrite {
            self.opened.lock().unwrap().remove(path);
        }
        self.recordings.lock().unwrap().remove(path);
        Ok(())
    }
}
