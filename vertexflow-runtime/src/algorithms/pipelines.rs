use crate::algorithms::clustering_coefficient::ClusteringCoefficientComputation;
use crate::algorithms::triangle_count::{self, incident_triangles};
use crate::algorithms::run_loaded;
use crate::job::{Job, JobConfig, JobReport};
use crate::scheduler::superstep_coordinator::Termination;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use vertexflow_common::error::VertexFlowResult;
use vertexflow_common::types::VertexInput;

pub fn clustering_coefficients<VV, EV>(
    config: JobConfig,
    graph: Vec<VertexInput<u64, VV, EV>>,
) -> VertexFlowResult<JobReport<u64, f64>>
where
    VV: Clone,
    EV: Clone + Send + Sync + 'static,
{
    clustering_coefficients_with_cancel(config, graph, CancellationToken::new())
}

/// Triangle counting followed by the clustering coefficient job, which reads
/// each vertex's incident triangle count as a superstep-0 message.
///
/// The graph should be symmetric; degrees are taken from the loaded edges.
/// Both phases share one deadline. Unless triangle counting reaches a fixpoint
/// its report is returned as is, termination included, with the values
/// mapped to 0.0.
pub fn clustering_coefficients_with_cancel<VV, EV>(
    config: JobConfig,
    graph: Vec<VertexInput<u64, VV, EV>>,
    cancel: CancellationToken,
) -> VertexFlowResult<JobReport<u64, f64>>
where
    VV: Clone,
    EV: Clone + Send + Sync + 'static,
{
    let deadline = config.timeout.map(|t| Instant::now() + t);
    let mut triangle_job = triangle_count::builder(config.clone()).cancellation(cancel.clone());
    if let Some(d) = deadline {
        triangle_job = triangle_job.deadline(d);
    }
    let triangles = run_loaded(triangle_job, graph.clone(), 0)?;
    if triangles.termination != Termination::Fixpoint {
        tracing::warn!(
            termination = triangles.termination.label(),
            "triangle counting stopped early, skipping coefficients"
        );
        return Ok(triangles.map_values(|_| 0.0));
    }

    let mut builder = Job::<u64, f64, EV, u64>::builder(config)
        .computation(ClusteringCoefficientComputation::<EV>::new())
        .cancellation(cancel);
    if let Some(d) = deadline {
        builder = builder.deadline(d);
    }
    let mut job = builder.build()?;
    job.load(graph.into_iter().map(|v| v.with_value(0.0)))?;
    for (id, raw) in triangles.vertices() {
        let t = incident_triangles(*raw);
        if t > 0 {
            job.seed_message(*id, t);
        }
    }
    job.run()
}
