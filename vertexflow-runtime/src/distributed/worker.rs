use crate::distributed::algorithm::{build_program, OutMessage, PartitionProgram};
use crate::distributed::protocol::{
    batches, framed, recv_msg, send_msg, DriverToWorker, WorkerFramed, WorkerToDriver,
};
use crate::io::file::GraphInput;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
}

/// Serves one driver connection, then returns after `Shutdown`.
pub async fn run_worker(config: WorkerConfig) -> VertexFlowResult<()> {
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| VertexFlowError::Internal(format!("bind worker: {e}")))?;
    serve(listener).await
}

pub async fn serve(listener: TcpListener) -> VertexFlowResult<()> {
    let (stream, peer) = listener
        .accept()
        .await
        .map_err(|e| VertexFlowError::Internal(format!("accept: {e}")))?;
    tracing::info!(driver = %peer, "driver connected");

    let mut framed = framed(stream);
    send_msg(&mut framed, &WorkerToDriver::Ready).await?;

    let mut graph: Vec<GraphInput> = Vec::new();
    let mut program: Option<Box<dyn PartitionProgram>> = None;
    let mut pending_superstep: Option<u64> = None;
    let mut pending_inbox: Vec<OutMessage> = Vec::new();

    loop {
        let msg: DriverToWorker = recv_msg(&mut framed).await?;
        match msg {
            DriverToWorker::LoadGraphBatch { mut vertices, last } => {
                graph.append(&mut vertices);
                send_msg(
                    &mut framed,
                    &WorkerToDriver::GraphLoaded {
                        vertices: graph.len(),
                        last,
                    },
                )
                .await?;
            }
            DriverToWorker::SetAlgorithm {
                algorithm,
                partition,
                partitions,
            } => match build_program(&algorithm, partition, partitions, graph.clone()) {
                Ok(p) => {
                    tracing::info!(
                        algorithm = p.name(),
                        partition,
                        vertices = graph.len(),
                        "algorithm set"
                    );
                    program = Some(p);
                    pending_superstep = None;
                    pending_inbox.clear();
                    send_msg(&mut framed, &WorkerToDriver::AlgorithmSet).await?;
                }
                Err(e) => {
                    send_msg(
                        &mut framed,
                        &WorkerToDriver::Error {
                            message: format!("{e}"),
                        },
                    )
                    .await?;
                }
            },
            DriverToWorker::SuperstepBatch {
                superstep,
                mut inbox,
                last,
            } => {
                if pending_superstep != Some(superstep) {
                    pending_superstep = Some(superstep);
                    pending_inbox.clear();
                }
                pending_inbox.append(&mut inbox);
                if last {
                    let inbox = std::mem::take(&mut pending_inbox);
                    pending_superstep = None;
                    let program = program.as_mut().ok_or_else(|| {
                        VertexFlowError::InvalidArgument("algorithm not set".to_string())
                    })?;
                    process_superstep(superstep, inbox, &mut **program, &mut framed).await?;
                }
            }
            DriverToWorker::FetchVertices => {
                let vertices = program.as_ref().map(|p| p.vertices()).unwrap_or_default();
                send_msg(&mut framed, &WorkerToDriver::Vertices { vertices }).await?;
            }
            DriverToWorker::Shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

async fn process_superstep(
    superstep: u64,
    inbox: Vec<OutMessage>,
    program: &mut dyn PartitionProgram,
    framed: &mut WorkerFramed,
) -> VertexFlowResult<()> {
    let start = Instant::now();
    let result = match program.run_superstep(superstep, inbox) {
        Ok(r) => r,
        Err(e) => {
            send_msg(
                framed,
                &WorkerToDriver::Error {
                    message: format!("{e}"),
                },
            )
            .await?;
            return Ok(());
        }
    };

    metrics::counter!("vertexflow_worker_superstep_computed_total")
        .increment(result.summary.computed as u64);
    metrics::counter!("vertexflow_worker_superstep_outbox_total")
        .increment(result.outbox.len() as u64);
    metrics::histogram!("vertexflow_worker_superstep_duration_ms")
        .record(start.elapsed().as_secs_f64() * 1000.0);
    tracing::debug!(
        superstep,
        computed = result.summary.computed,
        sent = result.outbox.len(),
        active = result.summary.active,
        "superstep computed"
    );

    let chunks = batches(result.outbox);
    let n = chunks.len();
    let mut summary = Some(result.summary);
    for (i, outbox) in chunks.into_iter().enumerate() {
        let last = i + 1 == n;
        send_msg(
            framed,
            &WorkerToDriver::SuperstepResultBatch {
                superstep,
                outbox,
                last,
                summary: if last { summary.take() } else { None },
            },
        )
        .await?;
    }
    Ok(())
}
