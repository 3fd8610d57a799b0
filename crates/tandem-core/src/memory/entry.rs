use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record in shared memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    pub category: String,
    /// Bundle that wrote (and owns) the entry.
    pub bundle_id: String,
    pub payload: Value,
    /// Creation time. Never changed by updates.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// An entry as submitted by a writer, before id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemoryEntry {
    pub category: String,
    pub bundle_id: String,
    pub payload: Value,
    pub metadata: Map<String, Value>,
}

impl NewMemoryEntry {
    pub fn new(category: impl Into<String>, bundle_id: impl Into<String>, payload: Value) -> Self {
        Self {
            category: category.into(),
            bundle_id: bundle_id.into(),
            payload,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Partial update. `None` fields are left untouched; `metadata` replaces the
/// whole map when set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUpdate {
    pub category: Option<String>,
    pub bundle_id: Option<String>,
    pub payload: Option<Value>,
    pub metadata: Option<Map<String, Value>>,
}

/// Filter for [`SharedMemoryStore::query`](super::SharedMemoryStore::query).
/// Time bounds are inclusive; a `limit` of zero means unlimited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryQuery {
    pub category: Option<String>,
    pub bundle_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl MemoryQuery {
    pub fn for_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn for_bundle(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: Some(bundle_id.into()),
            ..Self::default()
        }
    }

    pub fn after(mut self, ts: DateTime<Utc>) -> Self {
        self.after = Some(ts);
        self
    }

    pub fn before(mut self, ts: DateTime<Utc>) -> Self {
        self.before = Some(ts);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregate counts for dashboards.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_entries: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub bundle_counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Full store contents. Ownership is carried separately from entries and is
/// restored as-is on import.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub entries: Vec<MemoryEntry>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub category_owners: BTreeMap<String, Vec<String>>,
}
