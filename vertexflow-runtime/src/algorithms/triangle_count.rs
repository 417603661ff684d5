use crate::algorithms::run_loaded;
use crate::job::{Job, JobBuilder, JobConfig, JobReport};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use vertexflow_api::function::{Messages, VertexCentricComputation, VertexCentricComputeFuncContext};
use vertexflow_common::error::VertexFlowResult;
use vertexflow_common::types::VertexInput;

/// Neighbor-list exchange triangle counting.
///
/// The stored value is the raw count of (message, common neighbor) hits. On a
/// symmetric graph every triangle a vertex belongs to is seen twice, so the
/// number of incident triangles is `raw / 2`. Messages must not be combined.
pub struct TriangleCountComputation<EV> {
    _edges: PhantomData<fn() -> EV>,
}

impl<EV> TriangleCountComputation<EV> {
    pub fn new() -> Self {
        Self {
            _edges: PhantomData,
        }
    }
}

impl<EV> Default for TriangleCountComputation<EV> {
    fn default() -> Self {
        Self::new()
    }
}

fn neighbor_set<EV>(
    ctx: &dyn VertexCentricComputeFuncContext<u64, u64, EV, Vec<u64>>,
) -> BTreeSet<u64> {
    ctx.edges().iter().map(|e| e.target_id).collect()
}

impl<EV: Send + Sync + 'static> VertexCentricComputation<u64, u64, EV, Vec<u64>>
    for TriangleCountComputation<EV>
{
    fn name(&self) -> &str {
        "triangle-count"
    }

    fn compute(
        &self,
        ctx: &mut dyn VertexCentricComputeFuncContext<u64, u64, EV, Vec<u64>>,
        messages: Messages<'_, Vec<u64>>,
    ) -> VertexFlowResult<()> {
        match ctx.superstep() {
            0 => {
                let neighbors: Vec<u64> = neighbor_set(ctx).into_iter().collect();
                ctx.set_new_vertex_value(0);
                ctx.send_message_to_all_edges(neighbors);
            }
            1 => {
                let mine = neighbor_set(ctx);
                let raw = messages
                    .flat_map(|list| list.iter())
                    .filter(|id| mine.contains(*id))
                    .count();
                ctx.set_new_vertex_value(raw as u64);
            }
            _ => {}
        }
        ctx.vote_to_halt();
        Ok(())
    }
}

pub fn incident_triangles(raw: u64) -> u64 {
    raw / 2
}

pub fn builder<EV: Send + Sync + 'static>(
    config: JobConfig,
) -> JobBuilder<u64, u64, EV, Vec<u64>> {
    Job::builder(config).computation(TriangleCountComputation::<EV>::new())
}

pub fn run<VV, EV, I>(config: JobConfig, graph: I) -> VertexFlowResult<JobReport<u64, u64>>
where
    EV: Send + Sync + 'static,
    I: IntoIterator<Item = VertexInput<u64, VV, EV>>,
{
    run_loaded(builder(config), graph, 0)
}
