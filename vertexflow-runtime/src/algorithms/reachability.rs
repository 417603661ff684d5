use crate::algorithms::run_loaded;
use crate::job::{Job, JobBuilder, JobConfig, JobReport};
use crate::shuffle::combiner::SetUnionCombiner;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use vertexflow_api::function::{Messages, VertexCentricComputation, VertexCentricComputeFuncContext};
use vertexflow_common::error::VertexFlowResult;
use vertexflow_common::types::VertexInput;

pub type IdSet = BTreeSet<u64>;

/// Forward reachability: each vertex ends with the ids that can reach it
/// along directed edges, itself included.
///
/// Sets grow with the graph's reach; on large connected graphs message
/// payloads are unbounded.
pub struct ReachabilityComputation<EV> {
    _edges: PhantomData<fn() -> EV>,
}

impl<EV> ReachabilityComputation<EV> {
    pub fn new() -> Self {
        Self {
            _edges: PhantomData,
        }
    }
}

impl<EV> Default for ReachabilityComputation<EV> {
    fn default() -> Self {
        Self::new()
    }
}

impl<EV: Send + Sync + 'static> VertexCentricComputation<u64, IdSet, EV, IdSet>
    for ReachabilityComputation<EV>
{
    fn name(&self) -> &str {
        "reachability"
    }

    fn compute(
        &self,
        ctx: &mut dyn VertexCentricComputeFuncContext<u64, IdSet, EV, IdSet>,
        messages: Messages<'_, IdSet>,
    ) -> VertexFlowResult<()> {
        if ctx.superstep() == 0 {
            let own = IdSet::from([*ctx.vertex_id()]);
            ctx.set_new_vertex_value(own.clone());
            ctx.send_message_to_all_edges(own);
            return Ok(());
        }

        let mut reached = ctx.vertex_value().clone();
        let before = reached.len();
        for ids in messages {
            reached.extend(ids.iter().copied());
        }
        if reached.len() > before {
            ctx.set_new_vertex_value(reached.clone());
            ctx.send_message_to_all_edges(reached);
        }
        ctx.vote_to_halt();
        Ok(())
    }
}

pub fn builder<EV: Send + Sync + 'static>(config: JobConfig) -> JobBuilder<u64, IdSet, EV, IdSet> {
    Job::builder(config)
        .computation(ReachabilityComputation::<EV>::new())
        .combiner(SetUnionCombiner)
}

pub fn run<VV, EV, I>(config: JobConfig, graph: I) -> VertexFlowResult<JobReport<u64, IdSet>>
where
    EV: Send + Sync + 'static,
    I: IntoIterator<Item = VertexInput<u64, VV, EV>>,
{
    run_loaded(builder(config), graph, IdSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertexflow_common::types::Edge;

    #[test]
    fn ids_flow_along_directed_edges() {
        let graph = vec![
            VertexInput::new(1, (), vec![Edge::new(2, ())]),
            VertexInput::new(2, (), vec![Edge::new(3, ())]),
            VertexInput::new(3, (), vec![Edge::new(2, ())]),
            VertexInput::isolated(4, ()),
        ];
        let report = run(JobConfig::with_workers(2), graph).unwrap();
        assert_eq!(report.value(&1), Some(&IdSet::from([1])));
        assert_eq!(report.value(&2), Some(&IdSet::from([1, 2, 3])));
        assert_eq!(report.value(&3), Some(&IdSet::from([1, 2, 3])));
        assert_eq!(report.value(&4), Some(&IdSet::from([4])));
    }
}
