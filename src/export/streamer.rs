//! Document streaming under a scroll cursor
//!
//! Every entry of the index/type map opens its own scroll. Pages are pulled
//! until one comes back empty or the job is cancelled; cancellation is polled
//! once per page, before the page is written. Each hit becomes one packet per
//! fetched field plus a trailing `_source` packet when the body was not
//! among the fetched fields.

use std::pin::pin;
use std::time::Duration;

use futures::{Stream, TryStreamExt, stream};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{ArchivePacket, ArchiveSession, SOURCE_FIELD};
use crate::cluster::{ALL_INDICES, ClusterClient, SearchHit, SearchPage, SearchRequest};
use crate::error::{KnapsackError, Result};

use super::resolver::{IndexTypes, RenameTable};

/// Counters of one streaming pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub hits: u64,
    pub packets: u64,
    pub pages: u64,
    pub cancelled: bool,
}

/// Position of a scroll between two pages
enum Cursor {
    Open(SearchRequest),
    Scroll(String),
    Exhausted,
}

/// Streams matched documents into an archive session
pub struct DocumentStreamer<'a> {
    cluster: &'a dyn ClusterClient,
    renames: &'a RenameTable,
    query: Value,
    keep_alive: Duration,
    page_size: u32,
}

impl<'a> DocumentStreamer<'a> {
    /// Create a streamer
    ///
    /// # Arguments
    /// * `cluster` - Source cluster
    /// * `renames` - Destination names for indices and types
    /// * `query` - Search body, match-all when `None`
    /// * `keep_alive` - Scroll keep-alive passed on every page
    /// * `page_size` - Hits per page
    pub fn new(
        cluster: &'a dyn ClusterClient,
        renames: &'a RenameTable,
        query: Option<Value>,
        keep_alive: Duration,
        page_size: u32,
    ) -> Self {
        Self {
            cluster,
            renames,
            query: query.unwrap_or_else(SearchRequest::match_all),
            keep_alive,
            page_size,
        }
    }

    /// Stream every entry of `entries` into `session`
    pub async fn stream(
        &self,
        entries: &IndexTypes,
        session: &mut dyn ArchiveSession,
        cancel: &CancellationToken,
    ) -> Result<StreamStats> {
        let mut stats = StreamStats::default();
        for (index, types) in entries {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let request = SearchRequest {
                indices: if index == ALL_INDICES {
                    Vec::new()
                } else {
                    vec![index.clone()]
                },
                types: types.iter().cloned().collect(),
                body: self.query.clone(),
                scroll: self.keep_alive,
                size: self.page_size,
            };
            info!("streaming documents of {} types {:?}", index, types);

            let mut cursor = None;
            let outcome = self
                .drain(request, session, cancel, &mut stats, &mut cursor)
                .await;
            if let Some(scroll_id) = cursor
                && let Err(e) = self.cluster.clear_scroll(&scroll_id).await
            {
                warn!("failed to release scroll of {}: {}", index, e);
            }
            outcome?;

            if stats.cancelled {
                info!("export cancelled, skipping remaining entries");
                break;
            }
        }
        Ok(stats)
    }

    /// Pull pages of one scroll until exhausted or cancelled
    async fn drain(
        &self,
        request: SearchRequest,
        session: &mut dyn ArchiveSession,
        cancel: &CancellationToken,
        stats: &mut StreamStats,
        cursor: &mut Option<String>,
    ) -> Result<()> {
        let mut pages = pin!(self.pages(request));
        while let Some(page) = pages.try_next().await? {
            if page.scroll_id.is_some() {
                cursor.clone_from(&page.scroll_id);
            }
            if cancel.is_cancelled() {
                stats.cancelled = true;
                return Ok(());
            }
            if page.hits.is_empty() {
                break;
            }

            stats.pages += 1;
            debug!(
                "page {}: {} hits in {} ms",
                stats.pages,
                page.hits.len(),
                page.took_ms
            );
            for hit in &page.hits {
                stats.hits += 1;
                for packet in hit_packets(hit, self.renames) {
                    session.write(&packet).await?;
                    stats.packets += 1;
                }
            }
        }
        Ok(())
    }

    /// Pages of one scroll, the opening search first
    fn pages(&self, request: SearchRequest) -> impl Stream<Item = Result<SearchPage>> + Send + 'a {
        let cluster = self.cluster;
        let keep_alive = self.keep_alive;
        stream::try_unfold(Cursor::Open(request), move |state| async move {
            let page = match state {
                Cursor::Open(request) => cluster.search(&request).await?,
                Cursor::Scroll(scroll_id) => cluster.scroll_next(&scroll_id, keep_alive).await?,
                Cursor::Exhausted => return Ok(None),
            };
            let next = match &page.scroll_id {
                Some(scroll_id) if !page.hits.is_empty() => Cursor::Scroll(scroll_id.clone()),
                _ => Cursor::Exhausted,
            };
            Ok::<_, KnapsackError>(Some((page, next)))
        })
    }
}

/// Packets of one hit: fetched fields in order, then `_source` unless fetched
pub fn hit_packets(hit: &SearchHit, renames: &RenameTable) -> Vec<ArchivePacket> {
    let index = renames.map_index(&hit.index);
    let type_name = renames.map_type(&hit.index, &hit.type_name);

    let mut packets: Vec<ArchivePacket> = hit
        .fields
        .iter()
        .map(|(field, value)| {
            ArchivePacket::document(&index, &type_name, &hit.id, field, field_text(value))
        })
        .collect();

    let source_fetched = hit.fields.iter().any(|(field, _)| field == SOURCE_FIELD);
    if !source_fetched {
        match &hit.source {
            Some(body) => packets.push(ArchivePacket::document(
                &index,
                &type_name,
                &hit.id,
                SOURCE_FIELD,
                body.as_str(),
            )),
            None => debug!("hit {}/{} carries no source body", hit.index, hit.id),
        }
    }
    packets
}

/// Text form of a stored field value; single-valued arrays are unwrapped
fn field_text(value: &Value) -> String {
    match value {
        Value::Array(values) if values.len() == 1 => field_text(&values[0]),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
