use crate::aggregate::{AggregatePartial, AggregateValues, AggregatorSet};
use crate::graph::vertex_store::{VertexRecord, VertexStore};
use crate::shuffle::{Inbox, MessageRouter, Outbox};
use rayon::prelude::*;
use vertexflow_api::function::{
    MessageCombiner, Messages, VertexCentricComputation, VertexCentricComputeFuncContext,
};
use vertexflow_common::error::VertexFlowError;
use vertexflow_common::types::{Edge, VertexKey};

#[derive(Debug)]
pub struct StepFailure<K> {
    pub vertex: K,
    pub error: VertexFlowError,
}

#[derive(Debug)]
pub struct StepOutput<K, M> {
    pub outbox: Outbox<K, M>,
    pub computed: usize,
    pub failure: Option<StepFailure<K>>,
    pub aggregates: AggregatePartial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub dropped: usize,
    pub reactivated: usize,
}

pub struct PartitionWorker<K, VV, EV, M> {
    index: usize,
    store: VertexStore<K, VV, EV>,
    inbox: Inbox<K, M>,
}

impl<K, VV, EV, M> PartitionWorker<K, VV, EV, M>
where
    K: VertexKey,
    VV: Send + Sync + 'static,
    EV: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub fn new(index: usize, store: VertexStore<K, VV, EV>) -> Self {
        Self {
            index,
            store,
            inbox: Inbox::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn store(&self) -> &VertexStore<K, VV, EV> {
        &self.store
    }

    pub fn into_store(self) -> VertexStore<K, VV, EV> {
        self.store
    }

    pub fn active_count(&self) -> usize {
        self.store.active_count()
    }

    pub fn pending_messages(&self) -> usize {
        self.inbox.len()
    }

    pub fn compute_superstep(
        &mut self,
        superstep: u64,
        computation: &dyn VertexCentricComputation<K, VV, EV, M>,
        router: &MessageRouter<K, M>,
        aggregators: &AggregatorSet,
        aggregate_values: &AggregateValues,
    ) -> StepOutput<K, M> {
        let inbox = std::mem::take(&mut self.inbox);
        let partitions = router.partitions();

        self.store
            .records_mut()
            .par_iter_mut()
            .filter(|(_, record)| !record.halted)
            .fold(
                || StepAccumulator::new(partitions),
                |mut acc, (id, record)| {
                    let mut ctx = PartitionContext {
                        id,
                        record: &mut *record,
                        superstep,
                        router,
                        outbox: &mut acc.outbox,
                        aggregators,
                        aggregate_values,
                        contributions: &mut acc.aggregates,
                        halt: false,
                    };
                    match computation.compute(&mut ctx, Messages::new(inbox.get(id))) {
                        Ok(()) => {
                            let halt = ctx.halt;
                            record.set_halted(halt);
                            acc.computed += 1;
                        }
                        Err(error) => acc.fail(StepFailure {
                            vertex: id.clone(),
                            error,
                        }),
                    }
                    acc
                },
            )
            .reduce(
                || StepAccumulator::new(partitions),
                |a, b| a.merge(b, aggregators),
            )
            .into_output()
    }

    // Unknown recipients are dropped.
    pub fn deliver(
        &mut self,
        superstep: u64,
        messages: Vec<(K, M)>,
        combiner: Option<&dyn MessageCombiner<M>>,
    ) -> DeliveryStats {
        let mut inbox = Inbox::default();
        let mut stats = DeliveryStats::default();
        let mut first_unknown: Option<K> = None;

        for (target, message) in messages {
            if self.store.contains(&target) {
                inbox.push(target, message, combiner);
            } else {
                stats.dropped += 1;
                first_unknown.get_or_insert(target);
            }
        }

        if let Some(sample) = first_unknown {
            tracing::warn!(
                partition = self.index,
                superstep,
                dropped = stats.dropped,
                sample = ?sample,
                "dropped messages addressed to unknown vertices"
            );
        }

        for id in inbox.destinations() {
            if matches!(self.store.reactivate(id), Ok(true)) {
                stats.reactivated += 1;
            }
        }
        stats.delivered = inbox.len();
        self.inbox = inbox;
        stats
    }
}

struct StepAccumulator<K, M> {
    outbox: Outbox<K, M>,
    computed: usize,
    failure: Option<StepFailure<K>>,
    aggregates: AggregatePartial,
}

impl<K: Ord, M> StepAccumulator<K, M> {
    fn new(partitions: usize) -> Self {
        Self {
            outbox: Outbox::new(partitions),
            computed: 0,
            failure: None,
            aggregates: AggregatePartial::new(),
        }
    }

    // Smallest vertex id wins.
    fn fail(&mut self, failure: StepFailure<K>) {
        match &self.failure {
            Some(current) if current.vertex <= failure.vertex => {}
            _ => self.failure = Some(failure),
        }
    }

    fn merge(mut self, other: Self, aggregators: &AggregatorSet) -> Self {
        self.outbox = self.outbox.merge(other.outbox);
        self.computed += other.computed;
        if let Some(f) = other.failure {
            self.fail(f);
        }
        self.aggregates = aggregators.merge(self.aggregates, other.aggregates);
        self
    }

    fn into_output(self) -> StepOutput<K, M> {
        StepOutput {
            outbox: self.outbox,
            computed: self.computed,
            failure: self.failure,
            aggregates: self.aggregates,
        }
    }
}

struct PartitionContext<'a, K, VV, EV, M> {
    id: &'a K,
    record: &'a mut VertexRecord<K, VV, EV>,
    superstep: u64,
    router: &'a MessageRouter<K, M>,
    outbox: &'a mut Outbox<K, M>,
    aggregators: &'a AggregatorSet,
    aggregate_values: &'a AggregateValues,
    contributions: &'a mut AggregatePartial,
    halt: bool,
}

impl<K, VV, EV, M> VertexCentricComputeFuncContext<K, VV, EV, M>
    for PartitionContext<'_, K, VV, EV, M>
where
    K: Send,
    M: Send,
{
    fn vertex_id(&self) -> &K {
        self.id
    }

    fn vertex_value(&self) -> &VV {
        &self.record.value
    }

    fn set_new_vertex_value(&mut self, value: VV) {
        self.record.value = value;
    }

    fn edges(&self) -> &[Edge<K, EV>] {
        &self.record.edges
    }

    fn superstep(&self) -> u64 {
        self.superstep
    }

    fn send_message(&mut self, target_id: K, message: M) {
        self.router.send(self.outbox, target_id, message);
    }

    fn vote_to_halt(&mut self) {
        self.halt = true;
    }

    fn aggregate(&mut self, name: &str, value: f64) {
        if !self.aggregators.contribute(self.contributions, name, value) {
            tracing::debug!(aggregator = name, "no aggregator registered, contribution ignored");
        }
    }

    fn aggregated_value(&self, name: &str) -> Option<f64> {
        self.aggregate_values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::combiner::MinCombiner;
    use crate::shuffle::partitioner::HashPartitioner;
    use std::sync::Arc;
    use vertexflow_api::function::from_fn;
    use vertexflow_common::types::VertexInput;

    fn worker() -> PartitionWorker<u64, u64, (), u64> {
        let mut store = VertexStore::new();
        store
            .insert(VertexInput::new(1, 0, vec![Edge::new(2, ())]))
            .unwrap();
        store.insert(VertexInput::isolated(2, 0)).unwrap();
        PartitionWorker::new(0, store)
    }

    fn router() -> MessageRouter<u64, u64> {
        MessageRouter::new(Arc::new(HashPartitioner::new(1).unwrap()), None)
    }

    #[test]
    fn halted_vertices_are_skipped_until_messaged() {
        let mut w = worker();
        let r = router();
        let halt_all = from_fn(
            "halt",
            |ctx: &mut dyn VertexCentricComputeFuncContext<u64, u64, (), u64>,
             _msgs: Messages<'_, u64>| {
                ctx.vote_to_halt();
                Ok(())
            },
        );
        let aggs = AggregatorSet::default();
        let values = AggregateValues::default();

        let out = w.compute_superstep(0, &halt_all, &r, &aggs, &values);
        assert_eq!(out.computed, 2);
        assert_eq!(w.active_count(), 0);

        let out = w.compute_superstep(1, &halt_all, &r, &aggs, &values);
        assert_eq!(out.computed, 0);

        let stats = w.deliver(1, vec![(2, 7)], None);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.reactivated, 1);
        assert!(w.store().is_active(&2));
        assert!(!w.store().is_active(&1));
    }

    #[test]
    fn unknown_recipients_are_dropped() {
        let mut w = worker();
        let stats = w.deliver(0, vec![(1, 1), (42, 1), (43, 1)], Some(&MinCombiner));
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.dropped, 2);
        assert_eq!(w.pending_messages(), 1);
    }

    #[test]
    fn smallest_failing_vertex_is_reported() {
        let mut w = worker();
        let r = router();
        let fail = from_fn(
            "fail",
            |ctx: &mut dyn VertexCentricComputeFuncContext<u64, u64, (), u64>,
             _msgs: Messages<'_, u64>| {
                Err(VertexFlowError::compute(format!("boom at {}", ctx.vertex_id())))
            },
        );
        let out = w.compute_superstep(
            0,
            &fail,
            &r,
            &AggregatorSet::default(),
            &AggregateValues::default(),
        );
        let failure = out.failure.unwrap();
        assert_eq!(failure.vertex, 1);
        assert_eq!(out.computed, 0);
    }
}
