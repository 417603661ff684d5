use crate::aggregate::{AggregateValues, AggregatorSet};
use crate::algorithms::bfs::{BfsComputation, UNREACHED};
use crate::algorithms::clustering_coefficient::ClusteringCoefficientComputation;
use crate::algorithms::reachability::{IdSet, ReachabilityComputation};
use crate::algorithms::triangle_count::TriangleCountComputation;
use crate::algorithms::wcc::WccComputation;
use crate::algorithms::VertexValue;
use crate::graph::vertex_store::VertexStore;
use crate::io::file::GraphInput;
use crate::plan::job_spec::AlgorithmSpec;
use crate::scheduler::partition_worker::{DeliveryStats, PartitionWorker};
use crate::shuffle::combiner::{MinCombiner, SetUnionCombiner};
use crate::shuffle::partitioner::HashPartitioner;
use crate::shuffle::MessageRouter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vertexflow_api::function::{MessageCombiner, VertexCentricComputation};
use vertexflow_api::graph::GraphView;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

pub type OutMessage = (u64, Vec<u8>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub computed: usize,
    pub delivered: usize,
    pub dropped: usize,
    /// Non-halted vertices after compute, before the next delivery.
    pub active: usize,
    pub failure: Option<(u64, String)>,
}

pub struct StepResult {
    pub outbox: Vec<OutMessage>,
    pub summary: StepSummary,
}

pub trait PartitionProgram: Send {
    fn name(&self) -> &str;

    fn run_superstep(
        &mut self,
        superstep: u64,
        inbox: Vec<OutMessage>,
    ) -> VertexFlowResult<StepResult>;

    fn vertices(&self) -> Vec<(u64, VertexValue)>;
}

pub(crate) fn encode<T: Serialize>(v: &T) -> VertexFlowResult<Vec<u8>> {
    bincode::serialize(v).map_err(|e| VertexFlowError::Internal(format!("bincode encode: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> VertexFlowResult<T> {
    bincode::deserialize(bytes)
        .map_err(|e| VertexFlowError::Internal(format!("bincode decode: {e}")))
}

struct TypedProgram<VV, M> {
    worker: PartitionWorker<u64, VV, u8, M>,
    computation: Arc<dyn VertexCentricComputation<u64, VV, u8, M>>,
    router: MessageRouter<u64, M>,
    aggregators: AggregatorSet,
    aggregate_values: AggregateValues,
}

impl<VV, M> PartitionProgram for TypedProgram<VV, M>
where
    VV: Clone + Into<VertexValue> + Send + Sync + 'static,
    M: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.computation.name()
    }

    fn run_superstep(
        &mut self,
        superstep: u64,
        inbox: Vec<OutMessage>,
    ) -> VertexFlowResult<StepResult> {
        let messages = inbox
            .into_iter()
            .map(|(target, bytes)| Ok((target, decode::<M>(&bytes)?)))
            .collect::<VertexFlowResult<Vec<_>>>()?;
        let DeliveryStats {
            delivered, dropped, ..
        } = self
            .worker
            .deliver(superstep, messages, self.router.combiner());

        let output = self.worker.compute_superstep(
            superstep,
            self.computation.as_ref(),
            &self.router,
            &self.aggregators,
            &self.aggregate_values,
        );

        let mut outbox = Vec::with_capacity(output.outbox.len());
        for bucket in output.outbox.into_buckets() {
            for (target, message) in bucket {
                outbox.push((target, encode(&message)?));
            }
        }
        let summary = StepSummary {
            computed: output.computed,
            delivered,
            dropped,
            active: self.worker.active_count(),
            failure: output.failure.map(|f| (f.vertex, f.error.to_string())),
        };
        Ok(StepResult { outbox, summary })
    }

    fn vertices(&self) -> Vec<(u64, VertexValue)> {
        self.worker
            .store()
            .values()
            .map(|(id, v)| (*id, v.clone().into()))
            .collect()
    }
}

fn typed<VV, M, C>(
    index: usize,
    partitions: usize,
    computation: C,
    combiner: Option<Arc<dyn MessageCombiner<M>>>,
    graph: Vec<GraphInput>,
    initial: VV,
) -> VertexFlowResult<Box<dyn PartitionProgram>>
where
    VV: Clone + Into<VertexValue> + Send + Sync + 'static,
    M: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: VertexCentricComputation<u64, VV, u8, M>,
{
    let mut store = VertexStore::new();
    for input in graph {
        store.insert(input.with_value(initial.clone()))?;
    }
    let router = MessageRouter::new(Arc::new(HashPartitioner::new(partitions)?), combiner);
    Ok(Box::new(TypedProgram {
        worker: PartitionWorker::new(index, store),
        computation: Arc::new(computation),
        router,
        aggregators: AggregatorSet::default(),
        aggregate_values: AggregateValues::default(),
    }))
}

fn min_combiner() -> Option<Arc<dyn MessageCombiner<u64>>> {
    Some(Arc::new(MinCombiner))
}

pub fn build_program(
    spec: &AlgorithmSpec,
    index: usize,
    partitions: usize,
    graph: Vec<GraphInput>,
) -> VertexFlowResult<Box<dyn PartitionProgram>> {
    match spec {
        AlgorithmSpec::Wcc => typed(
            index,
            partitions,
            WccComputation::<u8>::new(),
            min_combiner(),
            graph,
            0u64,
        ),
        AlgorithmSpec::Bfs { source } => typed(
            index,
            partitions,
            BfsComputation::<u8>::new(*source),
            min_combiner(),
            graph,
            UNREACHED,
        ),
        AlgorithmSpec::TriangleCount => typed::<u64, Vec<u64>, _>(
            index,
            partitions,
            TriangleCountComputation::<u8>::new(),
            None,
            graph,
            0,
        ),
        AlgorithmSpec::Reachability => {
            let union: Arc<dyn MessageCombiner<IdSet>> = Arc::new(SetUnionCombiner);
            typed(
                index,
                partitions,
                ReachabilityComputation::<u8>::new(),
                Some(union),
                graph,
                IdSet::new(),
            )
        }
        AlgorithmSpec::ClusteringCoefficient => typed::<f64, u64, _>(
            index,
            partitions,
            ClusteringCoefficientComputation::<u8>::new(),
            None,
            graph,
            0.0,
        ),
    }
}

pub fn validate(spec: &AlgorithmSpec, graph: &dyn GraphView<u64>) -> VertexFlowResult<()> {
    match spec {
        AlgorithmSpec::Bfs { source } => BfsComputation::<u8>::new(*source).validate(graph),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertexflow_common::types::Edge;

    #[test]
    fn single_partition_wcc_program_converges() {
        let graph = vec![
            GraphInput::new(1, (), vec![Edge::new(2, 0)]),
            GraphInput::new(2, (), vec![Edge::new(1, 0)]),
        ];
        let mut program = build_program(&AlgorithmSpec::Wcc, 0, 1, graph).unwrap();
        assert_eq!(program.name(), "wcc");

        let mut inbox = Vec::new();
        for superstep in 0..3 {
            let result = program.run_superstep(superstep, inbox).unwrap();
            assert!(result.summary.failure.is_none());
            inbox = result.outbox;
        }
        assert!(inbox.is_empty());
        let mut values = program.vertices();
        values.sort_by_key(|(id, _)| *id);
        assert_eq!(
            values,
            vec![(1, VertexValue::Count(1)), (2, VertexValue::Count(1))]
        );
    }

    #[test]
    fn undecodable_messages_are_errors() {
        let graph = vec![GraphInput::isolated(1, ())];
        let mut program = build_program(&AlgorithmSpec::Wcc, 0, 1, graph).unwrap();
        assert!(program.run_superstep(0, vec![(1, vec![1, 2])]).is_err());
    }
}
