use crate::algorithms::run_loaded;
use crate::job::{Job, JobBuilder, JobConfig, JobReport};
use crate::shuffle::combiner::MinCombiner;
use std::marker::PhantomData;
use vertexflow_api::function::{Messages, VertexCentricComputation, VertexCentricComputeFuncContext};
use vertexflow_api::graph::GraphView;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};
use vertexflow_common::types::VertexInput;

/// Distance of vertices the source never reaches.
pub const UNREACHED: u64 = u64::MAX;

pub struct BfsComputation<EV> {
    source: u64,
    _edges: PhantomData<fn() -> EV>,
}

impl<EV> BfsComputation<EV> {
    pub fn new(source: u64) -> Self {
        Self {
            source,
            _edges: PhantomData,
        }
    }

    pub fn source(&self) -> u64 {
        self.source
    }
}

impl<EV: Send + Sync + 'static> VertexCentricComputation<u64, u64, EV, u64> for BfsComputation<EV> {
    fn name(&self) -> &str {
        "bfs"
    }

    fn validate(&self, graph: &dyn GraphView<u64>) -> VertexFlowResult<()> {
        if !graph.contains_vertex(&self.source) {
            return Err(VertexFlowError::InvalidArgument(format!(
                "bfs source {} is not in the graph",
                self.source
            )));
        }
        Ok(())
    }

    fn compute(
        &self,
        ctx: &mut dyn VertexCentricComputeFuncContext<u64, u64, EV, u64>,
        messages: Messages<'_, u64>,
    ) -> VertexFlowResult<()> {
        if ctx.superstep() == 0 {
            if *ctx.vertex_id() == self.source {
                ctx.set_new_vertex_value(0);
                ctx.send_message_to_all_edges(1);
            } else {
                ctx.set_new_vertex_value(UNREACHED);
            }
            return Ok(());
        }

        let current = *ctx.vertex_value();
        let best = messages.copied().fold(current, u64::min);
        if best < current {
            ctx.set_new_vertex_value(best);
            ctx.send_message_to_all_edges(best.saturating_add(1));
        }
        ctx.vote_to_halt();
        Ok(())
    }
}

pub fn builder<EV: Send + Sync + 'static>(
    config: JobConfig,
    source: u64,
) -> JobBuilder<u64, u64, EV, u64> {
    Job::builder(config)
        .computation(BfsComputation::<EV>::new(source))
        .combiner(MinCombiner)
}

pub fn run<VV, EV, I>(
    config: JobConfig,
    source: u64,
    graph: I,
) -> VertexFlowResult<JobReport<u64, u64>>
where
    EV: Send + Sync + 'static,
    I: IntoIterator<Item = VertexInput<u64, VV, EV>>,
{
    run_loaded(builder(config, source), graph, UNREACHED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertexflow_common::types::Edge;

    fn chain() -> Vec<VertexInput<u64, (), u8>> {
        vec![
            VertexInput::new(1, (), vec![Edge::new(2, 0), Edge::new(3, 0)]),
            VertexInput::new(2, (), vec![Edge::new(4, 0)]),
            VertexInput::new(3, (), vec![Edge::new(4, 0)]),
            VertexInput::isolated(4, ()),
            VertexInput::new(5, (), vec![Edge::new(1, 0)]),
        ]
    }

    #[test]
    fn distances_follow_outgoing_edges() {
        let report = run(JobConfig::with_workers(2), 1, chain()).unwrap();
        assert_eq!(report.value(&1), Some(&0));
        assert_eq!(report.value(&2), Some(&1));
        assert_eq!(report.value(&4), Some(&2));
        assert_eq!(report.value(&5), Some(&UNREACHED));
    }

    #[test]
    fn missing_source_is_rejected_before_running() {
        let err = run(JobConfig::default(), 42, chain()).unwrap_err();
        assert!(matches!(err, VertexFlowError::InvalidArgument(_)));
    }
}
