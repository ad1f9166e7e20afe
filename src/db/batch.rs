use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

use super::{client::to_record, GraphStore, NodeRecord};
use crate::models::{Kind, Node};

/// Result of one deferred save
pub struct BatchOutcome {
    pub kind: Kind,
    pub key: String,
    pub result: Result<NodeRecord>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub created: usize,
    pub failed: usize,
}

struct BatchTask {
    record: NodeRecord,
    allow_upsert: bool,
}

/// Group of independent saves executed concurrently.
///
/// Completion order is unspecified, so nothing added here may depend
/// on another member of the same batch.
pub struct Batch {
    store: Arc<dyn GraphStore>,
    concurrency: usize,
    tasks: Vec<BatchTask>,
}

impl Batch {
    pub(super) fn new(store: Arc<dyn GraphStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            tasks: Vec::new(),
        }
    }

    pub fn add<N: Node>(&mut self, node: &N, allow_upsert: bool) -> Result<()> {
        let record = to_record(node)?;
        tracing::debug!("- Added to batch: {} - {}", record.kind, record.key);
        self.tasks.push(BatchTask { record, allow_upsert });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every queued save, at most `concurrency` in flight at once
    pub fn execute(self) -> BoxStream<'static, BatchOutcome> {
        let store = self.store;
        stream::iter(self.tasks)
            .map(move |task| {
                let store = store.clone();
                async move {
                    let kind = task.record.kind;
                    let key = task.record.key.clone();
                    let result = store.create(task.record, task.allow_upsert).await;
                    BatchOutcome { kind, key, result }
                }
            })
            .buffer_unordered(self.concurrency)
            .boxed()
    }

    /// Execute and log every outcome in one pass
    pub async fn drain(self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        if self.is_empty() {
            return summary;
        }
        let mut outcomes = self.execute();
        while let Some(outcome) = outcomes.next().await {
            match outcome.result {
                Ok(_) => {
                    summary.created += 1;
                    tracing::info!("- Created {} - {}", outcome.kind, outcome.key);
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("- Creation failed for {} - {}: {}", outcome.kind, outcome.key, e);
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{Group, Vrf};

    #[tokio::test]
    async fn test_batch_executes_all_saves() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
        let mut batch = Batch::new(store.clone(), 2);
        for name in ["a", "b", "c", "d", "e"] {
            batch.add(&Group::new(name), true).unwrap();
        }
        assert!(!batch.is_empty());

        let summary = batch.drain().await;
        assert_eq!(summary, BatchSummary { created: 5, failed: 0 });
        assert_eq!(store.list(Kind::Group).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_batch_reports_conflicts_per_member() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
        let vrf = Vrf { id: uuid::Uuid::new_v4(), name: "Backbone".to_string(), description: None };
        store.create(to_record(&vrf).unwrap(), true).await.unwrap();

        let mut batch = Batch::new(store.clone(), 4);
        batch.add(&Vrf { id: uuid::Uuid::new_v4(), ..vrf.clone() }, false).unwrap();
        batch.add(&Group::new("core"), false).unwrap();

        let outcomes: Vec<BatchOutcome> = batch.execute().collect().await;
        assert_eq!(outcomes.len(), 2);
        let failed: Vec<&BatchOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, Kind::Vrf);
        assert_eq!(failed[0].key, "Backbone");
    }
}
