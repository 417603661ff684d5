pub mod combiner;
pub mod partitioner;

use crate::shuffle::partitioner::Partitioner;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use vertexflow_api::function::MessageCombiner;

#[derive(Debug)]
pub struct Outbox<K, M> {
    buckets: Vec<Vec<(K, M)>>,
}

impl<K, M> Outbox<K, M> {
    pub fn new(partitions: usize) -> Self {
        Self {
            buckets: (0..partitions.max(1)).map(|_| Vec::new()).collect(),
        }
    }

    pub fn push(&mut self, partition: usize, target: K, message: M) {
        self.buckets[partition].push((target, message));
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn merge(mut self, other: Outbox<K, M>) -> Self {
        for (mine, mut theirs) in self.buckets.iter_mut().zip(other.buckets) {
            if mine.len() < theirs.len() {
                std::mem::swap(mine, &mut theirs);
            }
            mine.append(&mut theirs);
        }
        self
    }

    pub fn into_buckets(self) -> Vec<Vec<(K, M)>> {
        self.buckets
    }
}

#[derive(Debug)]
pub struct Inbox<K, M> {
    messages: HashMap<K, Vec<M>>,
    count: usize,
}

impl<K, M> Default for Inbox<K, M> {
    fn default() -> Self {
        Self {
            messages: HashMap::new(),
            count: 0,
        }
    }
}

impl<K: Eq + Hash, M: 'static> Inbox<K, M> {
    pub fn push(&mut self, target: K, message: M, combiner: Option<&dyn MessageCombiner<M>>) {
        match self.messages.entry(target) {
            Entry::Occupied(mut slot) => {
                let slot = slot.get_mut();
                match (combiner, slot.pop()) {
                    (Some(c), Some(existing)) => slot.push(c.combine(existing, message)),
                    (_, existing) => {
                        slot.extend(existing);
                        slot.push(message);
                        self.count += 1;
                    }
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![message]);
                self.count += 1;
            }
        }
    }

    pub fn get(&self, id: &K) -> &[M] {
        self.messages.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn destinations(&self) -> impl Iterator<Item = &K> {
        self.messages.keys()
    }
}

pub struct MessageRouter<K, M> {
    partitioner: Arc<dyn Partitioner<K>>,
    combiner: Option<Arc<dyn MessageCombiner<M>>>,
}

impl<K, M> Clone for MessageRouter<K, M> {
    fn clone(&self) -> Self {
        Self {
            partitioner: self.partitioner.clone(),
            combiner: self.combiner.clone(),
        }
    }
}

impl<K, M> MessageRouter<K, M>
where
    K: Send,
    M: Send,
{
    pub fn new(
        partitioner: Arc<dyn Partitioner<K>>,
        combiner: Option<Arc<dyn MessageCombiner<M>>>,
    ) -> Self {
        Self {
            partitioner,
            combiner,
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitioner.num_partitions()
    }

    pub fn owner(&self, id: &K) -> usize {
        self.partitioner.owner(id)
    }

    pub fn combiner(&self) -> Option<&dyn MessageCombiner<M>> {
        self.combiner.as_deref()
    }

    pub fn new_outbox(&self) -> Outbox<K, M> {
        Outbox::new(self.partitions())
    }

    pub fn send(&self, outbox: &mut Outbox<K, M>, target: K, message: M) {
        let partition = self.partitioner.owner(&target);
        outbox.push(partition, target, message);
    }

    /// Index `i` of the result holds what every sender bucketed for partition `i`.
    pub fn shuffle(&self, outboxes: Vec<Outbox<K, M>>) -> Vec<Vec<(K, M)>> {
        let partitions = self.partitions();
        let mut columns: Vec<Vec<Vec<(K, M)>>> = (0..partitions).map(|_| Vec::new()).collect();
        for outbox in outboxes {
            for (p, bucket) in outbox.into_buckets().into_iter().enumerate() {
                if !bucket.is_empty() {
                    columns[p].push(bucket);
                }
            }
        }
        columns
            .into_par_iter()
            .map(|buckets| buckets.into_iter().flatten().collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::combiner::MinCombiner;
    use crate::shuffle::partitioner::HashPartitioner;

    fn router(partitions: usize, combine: bool) -> MessageRouter<u64, u64> {
        let combiner: Option<Arc<dyn MessageCombiner<u64>>> = if combine {
            Some(Arc::new(MinCombiner))
        } else {
            None
        };
        MessageRouter::new(Arc::new(HashPartitioner::new(partitions).unwrap()), combiner)
    }

    #[test]
    fn shuffle_sends_each_message_to_its_owner() {
        let r = router(3, false);
        let mut a = r.new_outbox();
        let mut b = r.new_outbox();
        for id in 0u64..20 {
            r.send(&mut a, id, id * 10);
            r.send(&mut b, id, id * 10 + 1);
        }
        assert_eq!(a.len(), 20);

        let columns = r.shuffle(vec![a, b]);
        assert_eq!(columns.len(), 3);
        let total: usize = columns.iter().map(Vec::len).sum();
        assert_eq!(total, 40);
        for (p, column) in columns.iter().enumerate() {
            assert!(column.iter().all(|(id, _)| r.owner(id) == p));
        }
    }

    #[test]
    fn inbox_without_combiner_keeps_the_multiset() {
        let mut inbox = Inbox::default();
        for m in [5u64, 3, 8, 3] {
            inbox.push(1u64, m, None);
        }
        let mut got = inbox.get(&1).to_vec();
        got.sort();
        assert_eq!(got, vec![3, 3, 5, 8]);
        assert_eq!(inbox.len(), 4);
        assert!(inbox.get(&2).is_empty());
    }

    #[test]
    fn inbox_with_min_combiner_keeps_one_message() {
        let r = router(1, true);
        let mut inbox = Inbox::default();
        for m in [5u64, 3, 8] {
            inbox.push(1u64, m, r.combiner());
        }
        assert_eq!(inbox.get(&1), &[3]);
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn merged_outboxes_keep_all_messages() {
        let r = router(2, false);
        let mut a = r.new_outbox();
        let mut b = r.new_outbox();
        r.send(&mut a, 1, 1);
        r.send(&mut b, 2, 2);
        r.send(&mut b, 3, 3);
        assert_eq!(a.merge(b).len(), 3);
    }
}
