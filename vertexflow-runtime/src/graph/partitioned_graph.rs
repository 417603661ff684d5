use crate::graph::vertex_store::{VertexRecord, VertexStore};
use crate::shuffle::partitioner::Partitioner;
use std::sync::Arc;
use vertexflow_api::graph::GraphView;
use vertexflow_common::error::VertexFlowResult;
use vertexflow_common::types::{VertexInput, VertexKey};

pub struct PartitionedGraph<K, VV, EV> {
    partitioner: Arc<dyn Partitioner<K>>,
    partitions: Vec<VertexStore<K, VV, EV>>,
}

impl<K, VV, EV> PartitionedGraph<K, VV, EV>
where
    K: VertexKey,
{
    pub fn new(partitioner: Arc<dyn Partitioner<K>>) -> Self {
        let partitions = (0..partitioner.num_partitions())
            .map(|_| VertexStore::new())
            .collect();
        Self {
            partitioner,
            partitions,
        }
    }

    pub fn load_vertex(&mut self, input: VertexInput<K, VV, EV>) -> VertexFlowResult<()> {
        let p = self.partitioner.owner(&input.id);
        self.partitions[p].insert(input)
    }

    pub fn load<I>(&mut self, inputs: I) -> VertexFlowResult<usize>
    where
        I: IntoIterator<Item = VertexInput<K, VV, EV>>,
    {
        let mut loaded = 0;
        for input in inputs {
            self.load_vertex(input)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, index: usize) -> Option<&VertexStore<K, VV, EV>> {
        self.partitions.get(index)
    }

    pub fn partitioner(&self) -> Arc<dyn Partitioner<K>> {
        self.partitioner.clone()
    }

    pub fn get(&self, id: &K) -> VertexFlowResult<&VertexRecord<K, VV, EV>> {
        self.partitions[self.partitioner.owner(id)].get(id)
    }

    pub fn into_stores(self) -> Vec<VertexStore<K, VV, EV>> {
        self.partitions
    }
}

impl<K: VertexKey, VV, EV> GraphView<K> for PartitionedGraph<K, VV, EV> {
    fn contains_vertex(&self, id: &K) -> bool {
        self.partitions[self.partitioner.owner(id)].contains(id)
    }

    fn vertex_count(&self) -> usize {
        self.partitions.iter().map(VertexStore::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::partitioner::HashPartitioner;
    use vertexflow_common::types::Edge;

    #[test]
    fn every_vertex_lands_in_exactly_one_partition() {
        let partitioner = Arc::new(HashPartitioner::new(3).unwrap());
        let mut graph: PartitionedGraph<u64, u64, ()> = PartitionedGraph::new(partitioner.clone());
        let loaded = graph
            .load((0u64..50).map(|id| VertexInput::new(id, id, vec![Edge::new((id + 1) % 50, ())])))
            .unwrap();
        assert_eq!(loaded, 50);
        assert_eq!(graph.vertex_count(), 50);

        for id in 0u64..50 {
            let owner = partitioner.owner(&id);
            for p in 0..graph.partitions() {
                assert_eq!(graph.partition(p).unwrap().contains(&id), p == owner);
            }
        }
        assert_eq!(graph.get(&7).unwrap().edges[0].target_id, 8);
        assert!(!graph.contains_vertex(&99));
    }
}
