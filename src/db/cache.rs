use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Kind, Node};

/// Local (kind, business key) -> node cache filled by bulk reads at the
/// start of a run, so cross-references resolve without re-querying.
#[derive(Default, Clone)]
pub struct NodeCache {
    entries: HashMap<(Kind, String), Arc<dyn Any + Send + Sync>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<N: Node>(&mut self, node: &N) {
        self.entries.insert((N::KIND, node.key()), Arc::new(node.clone()));
    }

    pub fn populate<N: Node>(&mut self, nodes: &[N]) {
        for node in nodes {
            self.set(node);
        }
        tracing::debug!("Cached {} {} nodes", nodes.len(), N::KIND);
    }

    pub fn get<N: Node>(&self, key: &str) -> Option<N> {
        self.entries
            .get(&(N::KIND, key.to_string()))
            .and_then(|entry| entry.downcast_ref::<N>())
            .cloned()
    }
}
