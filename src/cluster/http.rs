//! REST implementation of [`ClusterClient`]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ClusterError, Result};
use crate::utils::time::to_time_value;

use super::{ALL_INDICES, ClusterClient, SearchHit, SearchPage, SearchRequest};

/// Type name reported for typeless mappings and hits
const DEFAULT_TYPE: &str = "_doc";

/// Settings generated by the server that must not be replayed on import
const GENERATED_SETTINGS: &[&str] = &["uuid", "version", "creation_date", "provided_name"];

/// Root-level mapping parameters; a `mappings` object holding any of them is typeless
const ROOT_MAPPING_KEYS: &[&str] = &[
    "properties",
    "dynamic",
    "dynamic_templates",
    "dynamic_date_formats",
    "date_detection",
    "numeric_detection",
    "enabled",
    "runtime",
    "subobjects",
    "_source",
    "_routing",
    "_meta",
    "_all",
    "_field_names",
    "_parent",
    "_size",
    "_data_stream_timestamp",
];

/// Hit metadata kept as field packets when the cluster returns it beside `_id`
const HIT_META_FIELDS: &[&str] = &["_routing", "_parent"];

/// Cluster client over the REST API
#[derive(Clone)]
pub struct HttpClusterClient {
    client: Client,
    base_url: String,
}

impl HttpClusterClient {
    /// Create a client for `base_url` (e.g. `http://localhost:9200`)
    ///
    /// # Arguments
    /// * `base_url` - Cluster REST endpoint
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and decode a JSON body, mapping error statuses
    async fn send_json(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClusterError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ClusterError::InvalidResponse(e.to_string()).into())
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn resolve_settings(&self, indices: &[String]) -> Result<BTreeMap<String, String>> {
        let target = index_path(indices);
        debug!("GET {}/_settings", target);
        let body = self
            .send_json(self.client.get(self.url(&format!("{target}/_settings"))))
            .await?;
        parse_settings(&body)
    }

    async fn resolve_mapping(
        &self,
        index: &str,
        types: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, String>> {
        debug!("GET {}/_mapping", index);
        let body = self
            .send_json(self.client.get(self.url(&format!("{index}/_mapping"))))
            .await?;
        parse_mapping(&body, index, types)
    }

    async fn resolve_aliases(&self, index: &str) -> Result<BTreeMap<String, String>> {
        debug!("GET {}/_alias", index);
        let body = self
            .send_json(self.client.get(self.url(&format!("{index}/_alias"))))
            .await?;
        parse_aliases(&body, index)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let mut path = index_path(&request.indices);
        if !request.types.is_empty() {
            path.push('/');
            path.push_str(&request.types.join(","));
        }
        let mut body = request.body.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.entry("size").or_insert(json!(request.size));
        }

        debug!("POST {}/_search", path);
        let response = self
            .send_json(
                self.client
                    .post(self.url(&format!("{path}/_search")))
                    .query(&[("scroll", to_time_value(request.scroll))])
                    .json(&body),
            )
            .await?;
        parse_search_page(&response)
    }

    async fn scroll_next(&self, scroll_id: &str, keep_alive: Duration) -> Result<SearchPage> {
        let response = self
            .send_json(self.client.post(self.url("_search/scroll")).json(&json!({
                "scroll": to_time_value(keep_alive),
                "scroll_id": scroll_id,
            })))
            .await?;
        parse_search_page(&response)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.send_json(
            self.client
                .delete(self.url("_search/scroll"))
                .json(&json!({ "scroll_id": [scroll_id] })),
        )
        .await?;
        Ok(())
    }
}

fn index_path(indices: &[String]) -> String {
    if indices.is_empty() {
        ALL_INDICES.to_string()
    } else {
        indices.join(",")
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ClusterError::InvalidResponse(format!("{what} is not an object")).into())
}

/// `{index: {settings: {index: {...}}}}` → settings JSON per index, without
/// server-generated keys
pub(crate) fn parse_settings(body: &Value) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (index, entry) in as_object(body, "settings response")? {
        let mut settings = entry.get("settings").cloned().unwrap_or_else(|| json!({}));
        if let Some(index_settings) = settings.get_mut("index").and_then(Value::as_object_mut) {
            for key in GENERATED_SETTINGS {
                index_settings.remove(*key);
            }
        }
        out.insert(index.clone(), serde_json::to_string(&settings)?);
    }
    Ok(out)
}

/// Mapping per type, for typed (`{mappings: {type: {...}}}`) and typeless
/// (`{mappings: {properties: ...}}`) responses
pub(crate) fn parse_mapping(
    body: &Value,
    index: &str,
    types: &BTreeSet<String>,
) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    let Some(mappings) = body
        .get(index)
        .or_else(|| as_object(body, "mapping response").ok()?.values().next())
        .and_then(|entry| entry.get("mappings"))
        .and_then(Value::as_object)
    else {
        return Ok(out);
    };

    let typeless = mappings.is_empty()
        || mappings.keys().any(|key| ROOT_MAPPING_KEYS.contains(&key.as_str()))
        || mappings.values().any(|mapping| !mapping.is_object());
    let typed: Vec<(String, Value)> = if typeless {
        vec![(DEFAULT_TYPE.to_string(), Value::Object(mappings.clone()))]
    } else {
        mappings.iter().map(|(t, m)| (t.clone(), m.clone())).collect()
    };

    for (type_name, mapping) in typed {
        if !types.is_empty() && !types.contains(&type_name) {
            continue;
        }
        let mut wrapped = Map::new();
        wrapped.insert(type_name.clone(), mapping);
        out.insert(type_name, serde_json::to_string(&Value::Object(wrapped))?);
    }
    Ok(out)
}

/// `{index: {aliases: {name: definition}}}` → definition JSON per alias
pub(crate) fn parse_aliases(body: &Value, index: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    let aliases = body
        .get(index)
        .and_then(|entry| entry.get("aliases"))
        .and_then(Value::as_object);
    if let Some(aliases) = aliases {
        for (alias, definition) in aliases {
            out.insert(alias.clone(), serde_json::to_string(definition)?);
        }
    }
    Ok(out)
}

pub(crate) fn parse_search_page(body: &Value) -> Result<SearchPage> {
    let hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| ClusterError::InvalidResponse("missing hits.hits".to_string()))?;

    let hits = hits
        .iter()
        .map(parse_hit)
        .collect::<Result<Vec<_>>>()?;

    Ok(SearchPage {
        scroll_id: body
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        hits,
        took_ms: body.get("took").and_then(Value::as_u64).unwrap_or(0),
    })
}

fn parse_hit(hit: &Value) -> Result<SearchHit> {
    let text = |key: &str| hit.get(key).and_then(Value::as_str).map(str::to_string);

    let id = text("_id").ok_or_else(|| ClusterError::InvalidResponse("hit without _id".to_string()))?;
    let mut fields: Vec<(String, Value)> = hit
        .get("fields")
        .and_then(Value::as_object)
        .map(|f| f.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    for key in HIT_META_FIELDS {
        if let Some(value) = hit.get(*key)
            && !fields.iter().any(|(field, _)| field == key)
        {
            fields.push((key.to_string(), value.clone()));
        }
    }
    let source = match hit.get("_source") {
        Some(source) => Some(serde_json::to_string(source)?),
        None => None,
    };

    Ok(SearchHit {
        index: text("_index").unwrap_or_default(),
        type_name: text("_type").unwrap_or_else(|| DEFAULT_TYPE.to_string()),
        id,
        fields,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_strips_generated_keys() {
        let body = json!({
            "idx1": { "settings": { "index": {
                "number_of_shards": "1",
                "uuid": "abc",
                "creation_date": "1700000000000",
                "version": { "created": "8000099" },
                "provided_name": "idx1"
            }}},
            "idx2": { "settings": { "index": { "number_of_shards": "2" } } }
        });
        let settings = parse_settings(&body).unwrap();
        assert_eq!(settings.len(), 2);
        let idx1: Value = serde_json::from_str(&settings["idx1"]).unwrap();
        assert_eq!(idx1, json!({ "index": { "number_of_shards": "1" } }));
    }

    #[test]
    fn test_parse_typed_mapping_with_filter() {
        let body = json!({ "idx": { "mappings": {
            "a": { "properties": { "x": { "type": "keyword" } } },
            "b": { "properties": {} }
        }}});
        let all = parse_mapping(&body, "idx", &BTreeSet::new()).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let only_b = parse_mapping(&body, "idx", &BTreeSet::from(["b".to_string()])).unwrap();
        assert_eq!(only_b.len(), 1);
        let b: Value = serde_json::from_str(&only_b["b"]).unwrap();
        assert_eq!(b, json!({ "b": { "properties": {} } }));
    }

    #[test]
    fn test_parse_typeless_mapping() {
        let body = json!({ "idx": { "mappings": { "properties": { "x": { "type": "text" } } } } });
        let mapping = parse_mapping(&body, "idx", &BTreeSet::new()).unwrap();
        assert!(mapping.contains_key("_doc"));
    }

    #[test]
    fn test_parse_typeless_mapping_without_properties() {
        let body = json!({ "idx": { "mappings": {
            "dynamic": "strict",
            "_source": { "enabled": true }
        }}});
        let mapping = parse_mapping(&body, "idx", &BTreeSet::new()).unwrap();
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["_doc"]);
        let doc: Value = serde_json::from_str(&mapping["_doc"]).unwrap();
        assert_eq!(doc["_doc"]["dynamic"], "strict");

        let meta_only = json!({ "idx": { "mappings": { "_meta": { "owner": "ops" } } } });
        let mapping = parse_mapping(&meta_only, "idx", &BTreeSet::new()).unwrap();
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["_doc"]);
    }

    #[test]
    fn test_parse_aliases() {
        let body = json!({ "idx": { "aliases": {
            "current": {},
            "filtered": { "filter": { "term": { "user": "kimchy" } } }
        }}});
        let aliases = parse_aliases(&body, "idx").unwrap();
        assert_eq!(aliases["current"], "{}");
        assert!(aliases["filtered"].contains("kimchy"));
        assert!(parse_aliases(&json!({}), "idx").unwrap().is_empty());
    }

    #[test]
    fn test_parse_search_page() {
        let body = json!({
            "_scroll_id": "c1",
            "took": 7,
            "hits": { "hits": [
                {
                    "_index": "idx", "_type": "t", "_id": "1",
                    "_source": { "a": 1 },
                    "fields": { "f1": ["v1"] }
                },
                { "_index": "idx", "_id": "2", "_routing": "r2" }
            ]}
        });
        let page = parse_search_page(&body).unwrap();
        assert_eq!(page.scroll_id.as_deref(), Some("c1"));
        assert_eq!(page.took_ms, 7);
        assert_eq!(page.hits.len(), 2);
        assert_eq!(page.hits[0].fields, vec![("f1".to_string(), json!(["v1"]))]);
        assert_eq!(page.hits[0].source.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(page.hits[1].type_name, "_doc");
        assert_eq!(page.hits[1].source, None);
        assert_eq!(page.hits[1].fields, vec![("_routing".to_string(), json!("r2"))]);
    }

    #[test]
    fn test_parse_search_page_rejects_malformed() {
        assert!(parse_search_page(&json!({ "error": "boom" })).is_err());
    }

    #[test]
    fn test_client_url_building() {
        let client = HttpClusterClient::new("http://localhost:9200/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/_search/scroll"), "http://localhost:9200/_search/scroll");
        assert_eq!(index_path(&[]), "_all");
        assert_eq!(index_path(&["a".to_string(), "b*".to_string()]), "a,b*");
    }
}
