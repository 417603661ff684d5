pub mod partitioned_graph;
pub mod vertex_store;
