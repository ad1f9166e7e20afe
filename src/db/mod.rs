mod batch;
mod cache;
mod client;
mod memory;
pub mod seeds;
mod sqlite;

pub use batch::Batch;
pub use cache::NodeCache;
pub use client::{GraphClient, SaveOptions};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::models::Kind;

/// Typed error for "node not found" so the API layer can downcast
/// instead of matching on message text.
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// A create without upsert hit an existing business key
#[derive(Debug)]
pub struct ConflictError {
    pub kind: Kind,
    pub key: String,
}

impl ConflictError {
    pub fn new(kind: Kind, key: &str) -> Self {
        Self {
            kind,
            key: key.to_string(),
        }
    }
}

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} already exists: {}", self.kind, self.key)
    }
}

impl std::error::Error for ConflictError {}

/// One node as the store sees it: identity, kind, business key and
/// the serialized model.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub id: Uuid,
    pub kind: Kind,
    pub key: String,
    pub data: serde_json::Value,
}

/// Node storage backing the generator.
///
/// `create` with `allow_upsert` keeps the identity of a node already
/// stored under the same (kind, key) and replaces its data. A record
/// whose id is already stored under another key is re-keyed in place.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn create(&self, record: NodeRecord, allow_upsert: bool) -> Result<NodeRecord>;

    async fn get(&self, kind: Kind, key: &str) -> Result<Option<NodeRecord>>;

    async fn get_by_id(&self, kind: Kind, id: Uuid) -> Result<Option<NodeRecord>>;

    /// All nodes of a kind in insertion order
    async fn list(&self, kind: Kind) -> Result<Vec<NodeRecord>>;
}

/// Open the store selected by configuration
pub async fn open(cfg: &Config) -> Result<Arc<dyn GraphStore>> {
    match cfg.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory graph store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
            tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);
            Ok(Arc::new(store))
        }
    }
}
