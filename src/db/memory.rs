use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConflictError, GraphStore, NodeRecord};
use crate::models::Kind;

#[derive(Default)]
struct KindTable {
    records: Vec<NodeRecord>,
    by_key: HashMap<String, usize>,
    by_id: HashMap<Uuid, usize>,
}

impl KindTable {
    fn insert(&mut self, record: NodeRecord) -> NodeRecord {
        let idx = self.records.len();
        self.by_key.insert(record.key.clone(), idx);
        self.by_id.insert(record.id, idx);
        self.records.push(record.clone());
        record
    }

    fn replace(&mut self, idx: usize, mut record: NodeRecord) -> NodeRecord {
        let stored = &self.records[idx];
        record.id = stored.id;
        if stored.key != record.key {
            self.by_key.remove(&stored.key);
            self.by_key.insert(record.key.clone(), idx);
        }
        self.records[idx] = record.clone();
        record
    }
}

/// Process-local store, insertion ordered per kind
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Kind, KindTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn create(&self, record: NodeRecord, allow_upsert: bool) -> Result<NodeRecord> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(record.kind).or_default();

        if let Some(&idx) = table.by_key.get(&record.key) {
            if !allow_upsert {
                return Err(ConflictError::new(record.kind, &record.key).into());
            }
            return Ok(table.replace(idx, record));
        }

        if let Some(&idx) = table.by_id.get(&record.id) {
            return Ok(table.replace(idx, record));
        }

        Ok(table.insert(record))
    }

    async fn get(&self, kind: Kind, key: &str) -> Result<Option<NodeRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .and_then(|t| t.by_key.get(key).map(|&idx| t.records[idx].clone())))
    }

    async fn get_by_id(&self, kind: Kind, id: Uuid) -> Result<Option<NodeRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .and_then(|t| t.by_id.get(&id).map(|&idx| t.records[idx].clone())))
    }

    async fn list(&self, kind: Kind) -> Result<Vec<NodeRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.get(&kind).map(|t| t.records.clone()).unwrap_or_default())
    }
}
