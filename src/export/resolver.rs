//! Index/type spec resolution and the rename table
//!
//! Both resolutions are pure: they turn request text into an immutable
//! `index -> types` mapping without touching the cluster. An empty type set
//! means "all types".

use std::collections::{BTreeMap, BTreeSet};

use crate::cluster::ALL_INDICES;
use crate::error::{KnapsackError, Result};

/// Index name to the set of its requested types
pub type IndexTypes = BTreeMap<String, BTreeSet<String>>;

/// Split a comma-delimited spec into its distinct, trimmed, non-empty tokens
pub fn split_spec(spec: &str) -> BTreeSet<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mapping the document phase streams from
///
/// Every index token gets the full type set; wildcards and aliases stay
/// unresolved, the cluster's search matching expands them.
pub fn index_types(index_spec: &str, type_spec: &str) -> IndexTypes {
    let types = split_spec(type_spec);
    split_spec(index_spec)
        .into_iter()
        .map(|index| (index, types.clone()))
        .collect()
}

/// Mapping that scopes the metadata phase
///
/// Starts from [`index_types`] and folds in the explicit `index/type` pairs:
/// a bare index token adds an unrestricted entry, `index/type` adds the type
/// to that index's set, and `_all` tokens are dropped since the settings
/// lookup already covers every index.
pub fn metadata_scope(index_spec: &str, type_spec: &str, pairs: Option<&[String]>) -> IndexTypes {
    let mut scope = index_types(index_spec, type_spec);
    for pair in pairs.unwrap_or_default() {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let mut parts = pair.splitn(2, '/');
        let index = parts.next().unwrap_or_default().trim();
        let type_name = parts.next().map(str::trim).filter(|t| !t.is_empty());
        if index.is_empty() || index == ALL_INDICES {
            continue;
        }
        let types = scope.entry(index.to_string()).or_default();
        if let Some(type_name) = type_name {
            types.insert(type_name.to_string());
        }
    }
    scope
}

/// Source to destination names for indices (`index`) and types (`index/type`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameTable {
    entries: BTreeMap<String, String>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rename from `from` to `to`
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.entries.insert(from.into(), to.into());
    }

    /// Parse a `from=to` rule
    pub fn parse_rule(&mut self, rule: &str) -> Result<()> {
        let (from, to) = rule
            .split_once('=')
            .map(|(f, t)| (f.trim(), t.trim()))
            .filter(|(f, t)| !f.is_empty() && !t.is_empty())
            .ok_or_else(|| KnapsackError::Generic(format!("invalid rename rule '{rule}', expected from=to")))?;
        self.insert(from, to);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destination name of `index`
    pub fn map_index(&self, index: &str) -> String {
        match self.entries.get(index) {
            Some(target) => target.split('/').next().unwrap_or(target).to_string(),
            None => index.to_string(),
        }
    }

    /// Destination name of `type_name` within `index`
    pub fn map_type(&self, index: &str, type_name: &str) -> String {
        match self.entries.get(&format!("{index}/{type_name}")) {
            Some(target) => match target.split_once('/') {
                Some((_, t)) => t.to_string(),
                None => target.clone(),
            },
            None => type_name.to_string(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RenameTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (from, to) in iter {
            table.insert(from, to);
        }
        table
    }
}
