use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::model::ResourceKey;

/// Fetch state of a node's child list. For instance nodes, which are
/// leaves, the same machine tracks detail hydration instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChildStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(FetchError),
}

impl ChildStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ChildStatus::Loaded)
    }

    /// The stored error, if the last fetch failed.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            ChildStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// One raw backend record: the provider id plus whatever other fields
/// the backend returned, passed through opaquely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub attributes: Map<String, Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>) -> Self {
        RawRecord {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// One cached tree node.
///
/// `children` is meaningful only once `status` is `Loaded`; on a fetch
/// failure the previous child list is kept as stale-but-available
/// data. `loaded_at` is recorded for staleness decisions but nothing
/// expires entries automatically.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub key: ResourceKey,
    pub attributes: Map<String, Value>,
    pub status: ChildStatus,
    pub children: Vec<ResourceKey>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ResourceNode {
    pub fn placeholder(key: ResourceKey) -> Self {
        ResourceNode {
            key,
            attributes: Map::new(),
            status: ChildStatus::Idle,
            children: Vec::new(),
            loaded_at: None,
        }
    }

    /// Convenience accessor for a string attribute.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }

    /// Display name: the backend's `Name` tag when present and
    /// non-null, the provider id otherwise.
    pub fn display_name(&self) -> &str {
        self.attr_str("Name").unwrap_or_else(|| self.key.id())
    }
}
