pub use vertexflow_common::types::{Edge, Vertex, VertexInput, VertexKey};

/// Read-only view of a loaded graph, handed to computations before a job starts.
pub trait GraphView<K> {
    fn contains_vertex(&self, id: &K) -> bool;
    fn vertex_count(&self) -> usize;
}
