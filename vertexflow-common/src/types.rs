use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Bounds every vertex id must satisfy.
pub trait VertexKey: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}
impl<T> VertexKey for T where T: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Vertex<K, VV> {
    pub id: K,
    pub value: VV,
}

impl<K, VV> Vertex<K, VV> {
    pub fn new(id: K, value: VV) -> Self {
        Self { id, value }
    }
}

/// Outgoing edge; the source is the vertex that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge<K, EV> {
    pub target_id: K,
    pub value: EV,
}

impl<K, EV> Edge<K, EV> {
    pub fn new(target_id: K, value: EV) -> Self {
        Self { target_id, value }
    }
}

/// One row of the loader stream: `(vertexId, initialValue, edgeList)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VertexInput<K, VV, EV> {
    pub id: K,
    pub value: VV,
    pub edges: Vec<Edge<K, EV>>,
}

impl<K, VV, EV> VertexInput<K, VV, EV> {
    pub fn new(id: K, value: VV, edges: Vec<Edge<K, EV>>) -> Self {
        Self { id, value, edges }
    }

    pub fn isolated(id: K, value: VV) -> Self {
        Self {
            id,
            value,
            edges: Vec::new(),
        }
    }

    /// Same vertex and edges with a different initial value.
    pub fn with_value<V>(self, value: V) -> VertexInput<K, V, EV> {
        VertexInput {
            id: self.id,
            value,
            edges: self.edges,
        }
    }

    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}
