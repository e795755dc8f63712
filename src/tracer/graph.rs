//! Dependency graph built by a single trace
//!
//! Nodes are keyed by exact token value and kept in discovery order, so the
//! node index doubles as the visited set and serialization is reproducible.

use crate::patterns::Classification;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

/// Relation carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Parent value led to the response that emitted the child value
    Produces,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Produces => f.write_str("produces"),
        }
    }
}

/// Traced value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub value: String,
    pub categories: Classification,
    pub entropy: Option<f64>,
    /// Entries in which the value occurs, ascending
    pub entries: Vec<usize>,
    /// BFS depth at which the value was discovered
    pub depth: usize,
}

impl DependencyNode {
    /// Fold another sighting of the same value into this node
    pub fn observe(&mut self, categories: &Classification, entropy: Option<f64>) {
        self.categories.extend(categories.iter().cloned());
        self.entropy = match (self.entropy, entropy) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Directed `parent produces child` edge observed in one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub parent: String,
    pub child: String,
    pub entry: usize,
    pub relation: Relation,
    /// Key path or `name=` field the child sits under in the entry's response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Graph of values connected by `produces` relations
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    edges: Vec<DependencyEdge>,
    truncated: bool,
    #[serde(skip)]
    index: AHashMap<String, usize>,
    #[serde(skip)]
    edge_keys: AHashSet<(usize, usize, usize)>,
}

impl DependencyGraph {
    /// Create a graph holding only the seed node
    pub fn new(seed: DependencyNode) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            truncated: false,
            index: AHashMap::new(),
            edge_keys: AHashSet::new(),
        };
        graph.insert_node(seed);
        graph
    }

    /// Insert a node, or merge into the existing node for the same value
    ///
    /// Returns the node index.
    pub fn insert_node(&mut self, node: DependencyNode) -> usize {
        if let Some(&idx) = self.index.get(&node.value) {
            self.nodes[idx].observe(&node.categories, node.entropy);
            return idx;
        }
        let idx = self.nodes.len();
        self.index.insert(node.value.clone(), idx);
        self.nodes.push(node);
        idx
    }

    /// Record `parent produces child` via `entry`
    ///
    /// Returns false when the identical edge already exists.
    pub fn add_edge(
        &mut self,
        parent: usize,
        child: usize,
        entry: usize,
        field: Option<String>,
    ) -> bool {
        if !self.edge_keys.insert((parent, child, entry)) {
            return false;
        }
        self.edges.push(DependencyEdge {
            parent: self.nodes[parent].value.clone(),
            child: self.nodes[child].value.clone(),
            entry,
            relation: Relation::Produces,
            field,
        });
        true
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    pub fn node(&self, value: &str) -> Option<&DependencyNode> {
        self.index_of(value).map(|idx| &self.nodes[idx])
    }

    pub fn node_at(&self, idx: usize) -> &DependencyNode {
        &self.nodes[idx]
    }

    /// Nodes in discovery order; the seed is first
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    /// Edges in discovery order
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn seed(&self) -> &DependencyNode {
        &self.nodes[0]
    }

    /// Visited values in discovery order
    pub fn visited(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Outgoing edges of `value`
    pub fn children(&self, value: &str) -> Vec<&DependencyEdge> {
        self.edges.iter().filter(|e| e.parent == value).collect()
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}
