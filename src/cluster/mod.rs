//! Cluster client contract
//!
//! The export pipeline talks to the search cluster only through
//! [`ClusterClient`]: settings, mapping and alias lookups for the structural
//! phase, and search plus scroll for document streaming. The client is shared
//! by every running job and must be safe for concurrent use.

pub mod http;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;

pub use http::HttpClusterClient;

/// Index spec token addressing every index
pub const ALL_INDICES: &str = "_all";

/// Opening request of a scroll
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Indices to search (empty = all)
    pub indices: Vec<String>,
    /// Types to restrict to (empty = all)
    pub types: Vec<String>,
    /// Search body
    pub body: Value,
    /// Scroll keep-alive
    pub scroll: Duration,
    /// Hits per page
    pub size: u32,
}

impl SearchRequest {
    /// Default search body
    pub fn match_all() -> Value {
        json!({ "query": { "match_all": {} } })
    }
}

/// One matched document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    /// Concrete index holding the document
    pub index: String,
    /// Document type
    pub type_name: String,
    pub id: String,
    /// Explicitly fetched stored fields, in response order
    pub fields: Vec<(String, Value)>,
    /// Raw document body
    pub source: Option<String>,
}

/// One page of a scroll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Cursor for the next page
    pub scroll_id: Option<String>,
    pub hits: Vec<SearchHit>,
    /// Server-side time spent
    pub took_ms: u64,
}

/// Client for the source cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Settings per concrete index; `indices` may contain wildcards and
    /// aliases, and an empty slice means every index
    async fn resolve_settings(&self, indices: &[String]) -> Result<BTreeMap<String, String>>;

    /// Mapping per type of `index`, restricted to `types` unless empty
    async fn resolve_mapping(
        &self,
        index: &str,
        types: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, String>>;

    /// Alias definitions bound to `index`
    async fn resolve_aliases(&self, index: &str) -> Result<BTreeMap<String, String>>;

    /// Open a scroll and return its first page
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;

    /// Fetch the next page of a scroll; an exhausted scroll yields no hits
    async fn scroll_next(&self, scroll_id: &str, keep_alive: Duration) -> Result<SearchPage>;

    /// Release a scroll cursor
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}
