use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use vertexflow_runtime::algorithms::{self, VertexValue};
use vertexflow_runtime::distributed::driver::DistributedDriver;
use vertexflow_runtime::io::file::{append_timing, write_vertices_csv};
use vertexflow_runtime::job::JobReport;
use vertexflow_runtime::observability::{init_prometheus, init_tracing};
use vertexflow_runtime::plan::job_spec::{
    AlgorithmSpec, FileSource, GraphSpec, JobMode, JobSpec,
};
use vertexflow_runtime::scheduler::superstep_coordinator::RunLimits;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Algorithm {
    Wcc,
    Bfs,
    TriangleCount,
    Reachability,
    ClusteringCoefficient,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Format {
    Csv,
    EdgeList,
    Adjacency,
}

#[derive(Debug, Parser)]
struct Args {
    /// JSON job file; replaces the graph and algorithm flags.
    #[arg(long)]
    job: Option<PathBuf>,

    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,

    #[arg(long)]
    graph: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::EdgeList)]
    format: Format,

    /// Load every edge in both directions.
    #[arg(long)]
    symmetric: bool,

    #[arg(long, default_value_t = 1)]
    source: u64,

    #[arg(long, default_value_t = 4)]
    parallelism: usize,

    /// Distributed worker addresses; local mode when empty.
    #[arg(long, value_delimiter = ',')]
    workers: Vec<SocketAddr>,

    #[arg(long)]
    max_supersteps: Option<u64>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    output: Option<String>,

    /// Appends `metric,seconds` rows for later comparison.
    #[arg(long)]
    timings: Option<PathBuf>,

    #[arg(long)]
    metrics_listen: Option<SocketAddr>,

    #[arg(long)]
    dry_run: bool,
}

fn build_job_spec(args: &Args) -> anyhow::Result<JobSpec> {
    if let Some(path) = &args.job {
        return Ok(JobSpec::from_json_file(path)?);
    }
    let (Some(algorithm), Some(graph)) = (args.algorithm, args.graph.clone()) else {
        bail!("either --job or both --algorithm and --graph are required");
    };

    let algorithm = match algorithm {
        Algorithm::Wcc => AlgorithmSpec::Wcc,
        Algorithm::Bfs => AlgorithmSpec::Bfs {
            source: args.source,
        },
        Algorithm::TriangleCount => AlgorithmSpec::TriangleCount,
        Algorithm::Reachability => AlgorithmSpec::Reachability,
        Algorithm::ClusteringCoefficient => AlgorithmSpec::ClusteringCoefficient,
    };
    let source = match args.format {
        Format::Csv => FileSource::Csv { path: graph },
        Format::EdgeList => FileSource::EdgeList { path: graph },
        Format::Adjacency => FileSource::Adjacency { path: graph },
    };
    let mode = if args.workers.is_empty() {
        JobMode::Local
    } else {
        JobMode::Distributed {
            workers: args.workers.iter().map(ToString::to_string).collect(),
        }
    };

    Ok(JobSpec {
        name: algorithm.name().to_string(),
        mode,
        graph: GraphSpec {
            source,
            symmetric: args.symmetric,
        },
        algorithm,
        workers: args.parallelism,
        max_supersteps: args.max_supersteps,
        timeout_ms: args.timeout_ms,
        output: args.output.clone(),
    })
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling at the next barrier");
            child.cancel();
        }
    });
    token
}

async fn run(
    job: &JobSpec,
    cancel: CancellationToken,
) -> anyhow::Result<JobReport<u64, VertexValue>> {
    let config = job.job_config()?;
    let graph = job
        .graph
        .load()
        .with_context(|| format!("loading graph for {}", job.name))?;
    tracing::info!(vertices = graph.len(), "graph read");

    match &job.mode {
        JobMode::Local => {
            let spec = job.algorithm.clone();
            let token = cancel.clone();
            let report = tokio::task::spawn_blocking(move || {
                algorithms::run_with_cancel(&spec, config, graph, token)
            })
            .await??;
            Ok(report)
        }
        JobMode::Distributed { workers } => {
            let addrs = workers
                .iter()
                .map(|a| a.parse::<SocketAddr>())
                .collect::<Result<Vec<_>, _>>()
                .context("parsing worker addresses")?;
            let start = Instant::now();
            let limits = RunLimits {
                max_supersteps: config.max_supersteps,
                deadline: config.timeout.map(|t| start + t),
                cancel,
            };
            Ok(DistributedDriver::run_job(&addrs, &job.algorithm, graph, &limits).await?)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();
    if let Some(addr) = args.metrics_listen {
        let _handle = init_prometheus(addr)?;
    }

    let job = build_job_spec(&args)?;
    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    let report = run(&job, cancel_on_ctrl_c()).await?;
    let seconds = report.elapsed.as_secs_f64();
    eprintln!(
        "{}: {} after {} supersteps in {:.3}s ({} vertices)",
        report.name,
        report.termination.label(),
        report.supersteps,
        seconds,
        report.vertex_count()
    );
    if let Some(path) = &args.timings {
        append_timing(path, &report.name, seconds)?;
    }

    match &job.output {
        Some(path) => {
            let rows = report.vertices().map(|(id, v)| (*id, v));
            write_vertices_csv(path, rows)?;
        }
        None => {
            for (id, value) in report.vertices() {
                println!("{id},{value}");
            }
        }
    }

    if !report.is_converged() {
        bail!("job did not converge: {:?}", report.termination);
    }
    Ok(())
}
