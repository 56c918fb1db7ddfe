//! Candidate nodes of a refer.

use crate::domain::ServiceUrl;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::debug;

/// Health of a remote node as seen by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Alive,
    /// Reachable but degraded
    Weak,
    Dead,
}

/// A remote provider instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub url: ServiceUrl,
    pub weight: u32,
    pub state: NodeState,
}

impl Node {
    pub fn new(url: ServiceUrl) -> Self {
        Self {
            url,
            weight: 100,
            state: NodeState::Alive,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn host(&self) -> &str {
        &self.url.host
    }

    pub fn port(&self) -> u16 {
        self.url.port
    }

    pub fn is_alive(&self) -> bool {
        self.state != NodeState::Dead
    }
}

/// Immutable view of the pool for one routing decision
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    nodes: Arc<Vec<Node>>,
}

impl Candidate {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Arc::new(nodes),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Nodes currently known for a refer, updated by membership events
#[derive(Debug)]
pub struct CandidatePool {
    nodes: ArcSwap<Vec<Node>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self {
            nodes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes: ArcSwap::from_pointee(nodes),
        }
    }

    /// Live nodes at this instant
    pub fn snapshot(&self) -> Candidate {
        let nodes = self.nodes.load_full();
        if nodes.iter().all(Node::is_alive) {
            return Candidate { nodes };
        }
        Candidate::new(nodes.iter().filter(|n| n.is_alive()).cloned().collect())
    }

    /// Add or update a node, matched by address
    pub fn add(&self, node: Node) {
        debug!(node = %node.url.address(), "Candidate added");
        self.nodes.rcu(|current| {
            let mut next: Vec<Node> = current
                .iter()
                .filter(|n| n.url.address() != node.url.address())
                .cloned()
                .collect();
            next.push(node.clone());
            next
        });
    }

    /// Remove the node at `host:port`
    pub fn remove(&self, host: &str, port: u16) {
        debug!(host, port, "Candidate removed");
        self.nodes.rcu(|current| {
            current
                .iter()
                .filter(|n| !(n.host() == host && n.port() == port))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// Replace the whole membership
    pub fn replace(&self, nodes: Vec<Node>) {
        debug!(count = nodes.len(), "Candidates replaced");
        self.nodes.store(Arc::new(nodes));
    }

    pub fn len(&self) -> usize {
        self.nodes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.load().is_empty()
    }
}

impl Default for CandidatePool {
    fn default() -> Self {
        Self::new()
    }
}
