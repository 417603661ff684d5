use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

/// Maps a vertex id to the partition (worker) that owns it for the whole job.
pub trait Partitioner<K>: Send + Sync {
    fn num_partitions(&self) -> usize;
    fn owner(&self, id: &K) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPartitioner {
    partitions: usize,
}

impl HashPartitioner {
    pub fn new(partitions: usize) -> VertexFlowResult<Self> {
        if partitions == 0 {
            return Err(VertexFlowError::InvalidArgument(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(Self { partitions })
    }
}

impl<K: Hash> Partitioner<K> for HashPartitioner {
    fn num_partitions(&self) -> usize {
        self.partitions
    }

    fn owner(&self, id: &K) -> usize {
        partition_of(id, self.partitions)
    }
}

/// `DefaultHasher::new()` uses fixed keys, so placement agrees across processes.
pub fn partition_of<K: Hash + ?Sized>(id: &K, partitions: usize) -> usize {
    let mut h = DefaultHasher::new();
    id.hash(&mut h);
    (h.finish() % partitions.max(1) as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            HashPartitioner::new(0),
            Err(VertexFlowError::InvalidArgument(_))
        ));
    }

    #[test]
    fn owner_is_stable_and_in_range() {
        let p = HashPartitioner::new(7).unwrap();
        for id in 0u64..1000 {
            let first = p.owner(&id);
            assert!(first < 7);
            assert_eq!(first, p.owner(&id));
            assert_eq!(first, partition_of(&id, 7));
        }
    }

    #[test]
    fn single_partition_owns_everything() {
        let p = HashPartitioner::new(1).unwrap();
        assert!((0u64..100).all(|id| p.owner(&id) == 0));
    }
}
