//! Persisted name index for databases
//!
//! The index is rebuilt wholesale by a sync pass and read by name
//! resolution. It lives in one JSON document that is replaced atomically,
//! so readers see either the previous index or the new one. A file that is
//! missing, unreadable or structurally wrong is treated as absent.

use crate::aliases::{generate_aliases, normalize_title, query_variants};
use crate::ids::normalize_id;
use chrono::{DateTime, Utc};
use ncli_core::{Result, ResultExt};
use ncli_utils::write_atomic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Format version written by this build
pub const WORKSPACE_CACHE_VERSION: &str = "1.0";

/// One indexed database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntry {
    pub id: String,
    pub title: String,
    pub title_normalized: String,
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_time: Option<String>,
    /// Property name to property type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

/// How a name lookup matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Title,
    Alias,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceCache {
    pub version: String,
    /// Epoch when absent
    #[serde(default)]
    pub last_sync: DateTime<Utc>,
    pub databases: Vec<CachedEntry>,
}

impl Default for WorkspaceCache {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl WorkspaceCache {
    pub fn new(databases: Vec<CachedEntry>) -> Self {
        Self {
            version: WORKSPACE_CACHE_VERSION.to_string(),
            last_sync: Utc::now(),
            databases,
        }
    }

    /// Build an index from raw remote objects, skipping ones without an ID
    pub fn from_remote(objects: &[Value]) -> Self {
        Self::new(objects.iter().filter_map(Self::build_entry).collect())
    }

    /// Normalize a remote database or data source object
    pub fn build_entry(object: &Value) -> Option<CachedEntry> {
        let id = object.get("id").and_then(Value::as_str).and_then(normalize_id)?;
        let title = plain_title(object);

        let properties = object
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, property)| {
                        let kind = property.get("type").cloned().unwrap_or(Value::Null);
                        (name.clone(), kind)
                    })
                    .collect()
            });

        Some(CachedEntry {
            id,
            title_normalized: normalize_title(&title),
            aliases: generate_aliases(&title),
            title,
            url: object.get("url").and_then(Value::as_str).map(str::to_string),
            last_edited_time: object
                .get("last_edited_time")
                .and_then(Value::as_str)
                .map(str::to_string),
            properties,
        })
    }

    /// Read the index at `path`; any failure reads as no index
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "workspace_cache_unreadable");
                return None;
            }
        };

        match serde_json::from_slice::<Self>(&bytes) {
            Ok(cache) if !cache.version.is_empty() => Some(cache),
            Ok(_) => {
                tracing::debug!(path = %path.display(), "workspace_cache_unversioned");
                None
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "workspace_cache_corrupt");
                None
            }
        }
    }

    /// Replace the index at `path` atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).with_path(path, "serialize workspace cache")?;
        write_atomic(path, &bytes)?;
        tracing::debug!(
            path = %path.display(),
            databases = self.databases.len(),
            "workspace_cache_saved"
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&CachedEntry> {
        let id = normalize_id(id)?;
        self.databases.iter().find(|entry| entry.id == id)
    }

    /// Insert or replace the entry with the same ID
    pub fn upsert(&mut self, entry: CachedEntry) {
        match self.databases.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.databases.push(entry),
        }
    }

    /// Find by exact title, then alias, then title substring
    pub fn find(&self, query: &str) -> Option<(&CachedEntry, MatchKind)> {
        let variants = query_variants(query);
        let normalized = variants.first().filter(|q| !q.is_empty())?;

        if let Some(entry) = self
            .databases
            .iter()
            .find(|entry| &entry.title_normalized == normalized)
        {
            return Some((entry, MatchKind::Title));
        }

        if let Some(entry) = self.databases.iter().find(|entry| {
            entry
                .aliases
                .iter()
                .any(|alias| variants.iter().any(|variant| alias == variant))
        }) {
            return Some((entry, MatchKind::Alias));
        }

        self.databases
            .iter()
            .find(|entry| entry.title_normalized.contains(normalized.as_str()))
            .map(|entry| (entry, MatchKind::Substring))
    }

    /// Time since the last sync, measured at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_sync
    }
}

/// Concatenated plain text of a rich-text `title`, or a plain `name`
fn plain_title(object: &Value) -> String {
    match object.get("title") {
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                part.get("plain_text")
                    .or_else(|| part.pointer("/text/content"))
                    .and_then(Value::as_str)
            })
            .collect(),
        Some(Value::String(title)) => title.clone(),
        _ => object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}
