use clap::Parser;
use std::net::SocketAddr;
use vertexflow_runtime::distributed::worker::{run_worker, WorkerConfig};
use vertexflow_runtime::observability::{init_prometheus, init_tracing};

#[derive(Debug, Parser)]
struct Args {
    #[arg(long)]
    listen: SocketAddr,

    #[arg(long)]
    metrics_listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();
    if let Some(addr) = args.metrics_listen {
        let _handle = init_prometheus(addr)?;
    }
    run_worker(WorkerConfig {
        listen_addr: args.listen,
    })
    .await?;
    Ok(())
}
