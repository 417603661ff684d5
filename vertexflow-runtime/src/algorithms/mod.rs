pub mod bfs;
pub mod clustering_coefficient;
pub mod pipelines;
pub mod reachability;
pub mod triangle_count;
pub mod wcc;

use crate::io::file::GraphInput;
use crate::job::{JobBuilder, JobConfig, JobReport};
use crate::plan::job_spec::AlgorithmSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tokio_util::sync::CancellationToken;
use vertexflow_common::error::VertexFlowResult;
use vertexflow_common::types::VertexInput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VertexValue {
    Count(u64),
    Ratio(f64),
    Ids(Vec<u64>),
}

impl From<u64> for VertexValue {
    fn from(v: u64) -> Self {
        VertexValue::Count(v)
    }
}

impl From<f64> for VertexValue {
    fn from(v: f64) -> Self {
        VertexValue::Ratio(v)
    }
}

impl From<BTreeSet<u64>> for VertexValue {
    fn from(v: BTreeSet<u64>) -> Self {
        VertexValue::Ids(v.into_iter().collect())
    }
}

impl fmt::Display for VertexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexValue::Count(v) => write!(f, "{v}"),
            VertexValue::Ratio(v) => write!(f, "{v:.6}"),
            VertexValue::Ids(ids) => {
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{id}")?;
                }
                Ok(())
            }
        }
    }
}

/// Builds the job, loads `graph` with every value set to `initial`, and runs it.
pub(crate) fn run_loaded<VV, EV, M, IV, I>(
    builder: JobBuilder<u64, VV, EV, M>,
    graph: I,
    initial: VV,
) -> VertexFlowResult<JobReport<u64, VV>>
where
    VV: Clone + Send + Sync + 'static,
    EV: Send + Sync + 'static,
    M: Send + Sync + 'static,
    I: IntoIterator<Item = VertexInput<u64, IV, EV>>,
{
    let mut job = builder.build()?;
    job.load(graph.into_iter().map(|v| v.with_value(initial.clone())))?;
    job.run()
}

pub fn run(
    spec: &AlgorithmSpec,
    config: JobConfig,
    graph: Vec<GraphInput>,
) -> VertexFlowResult<JobReport<u64, VertexValue>> {
    run_with_cancel(spec, config, graph, CancellationToken::new())
}

pub fn run_with_cancel(
    spec: &AlgorithmSpec,
    config: JobConfig,
    graph: Vec<GraphInput>,
    cancel: CancellationToken,
) -> VertexFlowResult<JobReport<u64, VertexValue>> {
    let report = match spec {
        AlgorithmSpec::Wcc => {
            run_loaded(wcc::builder(config).cancellation(cancel), graph, 0)?
                .map_values(VertexValue::from)
        }
        AlgorithmSpec::Bfs { source } => run_loaded(
            bfs::builder(config, *source).cancellation(cancel),
            graph,
            bfs::UNREACHED,
        )?
        .map_values(VertexValue::from),
        AlgorithmSpec::TriangleCount => {
            run_loaded(triangle_count::builder(config).cancellation(cancel), graph, 0)?
                .map_values(VertexValue::from)
        }
        AlgorithmSpec::Reachability => run_loaded(
            reachability::builder(config).cancellation(cancel),
            graph,
            reachability::IdSet::new(),
        )?
        .map_values(VertexValue::from),
        AlgorithmSpec::ClusteringCoefficient => {
            pipelines::clustering_coefficients_with_cancel(config, graph, cancel)?
                .map_values(VertexValue::from)
        }
    };
    Ok(report)
}
