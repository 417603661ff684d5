use crate::algorithms::run_loaded;
use crate::job::{Job, JobBuilder, JobConfig, JobReport};
use crate::shuffle::combiner::MinCombiner;
use std::marker::PhantomData;
use vertexflow_api::function::{Messages, VertexCentricComputation, VertexCentricComputeFuncContext};
use vertexflow_common::error::VertexFlowResult;
use vertexflow_common::types::VertexInput;

/// Weakly-connected components by min-label propagation.
///
/// Expects a symmetric graph; on a directed one labels only flow forward.
pub struct WccComputation<EV> {
    _edges: PhantomData<fn() -> EV>,
}

impl<EV> WccComputation<EV> {
    pub fn new() -> Self {
        Self {
            _edges: PhantomData,
        }
    }
}

impl<EV> Default for WccComputation<EV> {
    fn default() -> Self {
        Self::new()
    }
}

impl<EV: Send + Sync + 'static> VertexCentricComputation<u64, u64, EV, u64> for WccComputation<EV> {
    fn name(&self) -> &str {
        "wcc"
    }

    fn compute(
        &self,
        ctx: &mut dyn VertexCentricComputeFuncContext<u64, u64, EV, u64>,
        messages: Messages<'_, u64>,
    ) -> VertexFlowResult<()> {
        let id = *ctx.vertex_id();
        if ctx.superstep() == 0 {
            ctx.set_new_vertex_value(id);
            ctx.send_message_to_all_edges(id);
            return Ok(());
        }

        let current = *ctx.vertex_value();
        let min = messages.copied().fold(current, u64::min);
        if min < current {
            ctx.set_new_vertex_value(min);
            ctx.send_message_to_all_edges(min);
        }
        ctx.vote_to_halt();
        Ok(())
    }
}

pub fn builder<EV: Send + Sync + 'static>(config: JobConfig) -> JobBuilder<u64, u64, EV, u64> {
    Job::builder(config)
        .computation(WccComputation::<EV>::new())
        .combiner(MinCombiner)
}

/// Runs WCC with the min combiner. Initial values are ignored.
pub fn run<VV, EV, I>(config: JobConfig, graph: I) -> VertexFlowResult<JobReport<u64, u64>>
where
    EV: Send + Sync + 'static,
    I: IntoIterator<Item = VertexInput<u64, VV, EV>>,
{
    run_loaded(builder(config), graph, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertexflow_common::types::Edge;

    fn undirected(edges: &[(u64, u64)], vertices: u64) -> Vec<VertexInput<u64, (), ()>> {
        let mut out: Vec<_> = (1..=vertices).map(|id| VertexInput::isolated(id, ())).collect();
        for &(a, b) in edges {
            out[(a - 1) as usize].edges.push(Edge::new(b, ()));
            out[(b - 1) as usize].edges.push(Edge::new(a, ()));
        }
        out
    }

    #[test]
    fn two_components_get_their_minimum_id() {
        let graph = undirected(&[(1, 2), (2, 3), (4, 5)], 6);
        let report = run(JobConfig::with_workers(3), graph).unwrap();
        assert!(report.is_converged());
        let labels: Vec<u64> = report.vertices().map(|(_, v)| *v).collect();
        assert_eq!(labels, vec![1, 1, 1, 4, 4, 6]);
    }
}
