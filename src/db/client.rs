use anyhow::{Context, Result};
use std::sync::Arc;
use uuid::Uuid;

use super::{Batch, ConflictError, GraphStore, NodeRecord, NotFoundError};
use crate::models::Node;

pub(crate) fn to_record<N: Node>(node: &N) -> Result<NodeRecord> {
    Ok(NodeRecord {
        id: node.id(),
        kind: N::KIND,
        key: node.key(),
        data: serde_json::to_value(node)
            .with_context(|| format!("Failed to serialize {} {}", N::KIND, node.key()))?,
    })
}

pub(crate) fn from_record<N: Node>(record: NodeRecord) -> Result<N> {
    let mut node: N = serde_json::from_value(record.data)
        .with_context(|| format!("Failed to decode {} {}", record.kind, record.key))?;
    node.set_id(record.id);
    Ok(node)
}

#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub allow_upsert: bool,
    /// On a key conflict, fetch and return the stored node
    pub retrieved_on_failure: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            allow_upsert: true,
            retrieved_on_failure: false,
        }
    }
}

impl SaveOptions {
    /// Create once, reuse the existing node on re-runs
    pub fn create_or_retrieve() -> Self {
        Self {
            allow_upsert: false,
            retrieved_on_failure: true,
        }
    }
}

/// Typed access to the graph store
#[derive(Clone)]
pub struct GraphClient {
    store: Arc<dyn GraphStore>,
    batch_concurrency: usize,
}

impl GraphClient {
    pub fn new(store: Arc<dyn GraphStore>, batch_concurrency: usize) -> Self {
        Self {
            store,
            batch_concurrency,
        }
    }

    /// Create a node and save it. A conflict on the business key falls
    /// back to a lookup when `retrieved_on_failure` is set.
    pub async fn create_and_save<N: Node>(&self, node: N, opts: SaveOptions) -> Result<N> {
        let key = node.key();
        match self.store.create(to_record(&node)?, opts.allow_upsert).await {
            Ok(stored) => {
                tracing::info!("- Created {} - {}", N::KIND, key);
                from_record(stored)
            }
            Err(e) if opts.retrieved_on_failure && e.downcast_ref::<ConflictError>().is_some() => {
                tracing::debug!("- Creation failed for {} - {} due to {}", N::KIND, key, e);
                let existing = self.get::<N>(&key).await?;
                tracing::info!("- Retrieved {} - {}", N::KIND, key);
                Ok(existing)
            }
            Err(e) => Err(e),
        }
    }

    /// Upsert an already-built node, returning it with its stored identity
    pub async fn save<N: Node>(&self, node: &N) -> Result<N> {
        let stored = self.store.create(to_record(node)?, true).await?;
        from_record(stored)
    }

    pub async fn get<N: Node>(&self, key: &str) -> Result<N> {
        self.find(key)
            .await?
            .ok_or_else(|| NotFoundError::new(N::KIND.as_str(), key).into())
    }

    pub async fn find<N: Node>(&self, key: &str) -> Result<Option<N>> {
        self.store.get(N::KIND, key).await?.map(from_record).transpose()
    }

    pub async fn get_by_id<N: Node>(&self, id: Uuid) -> Result<N> {
        self.store
            .get_by_id(N::KIND, id)
            .await?
            .map(from_record)
            .transpose()?
            .ok_or_else(|| NotFoundError::new(N::KIND.as_str(), &id.to_string()).into())
    }

    pub async fn all<N: Node>(&self) -> Result<Vec<N>> {
        self.store
            .list(N::KIND)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub async fn filters<N, F>(&self, predicate: F) -> Result<Vec<N>>
    where
        N: Node,
        F: Fn(&N) -> bool,
    {
        Ok(self.all::<N>().await?.into_iter().filter(|n| predicate(n)).collect())
    }

    pub fn create_batch(&self) -> Batch {
        Batch::new(self.store.clone(), self.batch_concurrency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{AutonomousSystem, Vrf};
    use tokio_test::assert_err;

    fn client() -> GraphClient {
        GraphClient::new(Arc::new(MemoryStore::new()), 5)
    }

    fn asn(n: u32) -> AutonomousSystem {
        AutonomousSystem {
            id: Uuid::new_v4(),
            name: AutonomousSystem::name_for(n),
            asn: n,
            organization: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_or_retrieve_reuses_existing() {
        let client = client();
        let first = client.create_and_save(asn(65101), SaveOptions::create_or_retrieve()).await.unwrap();
        let second = client.create_and_save(asn(65101), SaveOptions::create_or_retrieve()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(client.all::<AutonomousSystem>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_without_retrieve_surfaces_conflict() {
        let client = client();
        let opts = SaveOptions { allow_upsert: false, retrieved_on_failure: false };
        client.create_and_save(asn(65000), opts).await.unwrap();
        let err = assert_err!(client.create_and_save(asn(65000), opts).await);
        assert!(err.downcast_ref::<ConflictError>().is_some());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let client = client();
        let err = assert_err!(client.get::<Vrf>("Backbone").await);
        assert!(err.downcast_ref::<NotFoundError>().is_some());
        assert!(client.find::<Vrf>("Backbone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_round_trips_identity() {
        let client = client();
        let saved = client.save(&asn(65201)).await.unwrap();
        let by_id: AutonomousSystem = client.get_by_id(saved.id).await.unwrap();
        assert_eq!(by_id.name, "AS65201");

        let filtered = client
            .filters::<AutonomousSystem, _>(|a| a.asn > 65100)
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
