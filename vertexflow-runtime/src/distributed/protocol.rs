use crate::algorithms::VertexValue;
use crate::distributed::algorithm::{OutMessage, StepSummary};
use crate::io::file::GraphInput;
use crate::plan::job_spec::AlgorithmSpec;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

/// Entries per batch frame for graph loading and message exchange.
pub const BATCH_ENTRIES: usize = 256;

#[derive(Debug, Serialize, Deserialize)]
pub enum DriverToWorker {
    LoadGraphBatch {
        vertices: Vec<GraphInput>,
        last: bool,
    },
    SetAlgorithm {
        algorithm: AlgorithmSpec,
        partition: usize,
        partitions: usize,
    },
    /// Messages readable in `superstep`. The worker computes after `last`.
    SuperstepBatch {
        superstep: u64,
        inbox: Vec<OutMessage>,
        last: bool,
    },
    FetchVertices,
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum WorkerToDriver {
    Ready,
    GraphLoaded {
        vertices: usize,
        last: bool,
    },
    AlgorithmSet,
    // `summary` only on the last batch.
    SuperstepResultBatch {
        superstep: u64,
        outbox: Vec<OutMessage>,
        last: bool,
        summary: Option<StepSummary>,
    },
    Vertices {
        vertices: Vec<(u64, VertexValue)>,
    },
    Error {
        message: String,
    },
}

pub type WorkerFramed = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed(stream: TcpStream) -> WorkerFramed {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub async fn send_msg<T: Serialize>(framed: &mut WorkerFramed, msg: &T) -> VertexFlowResult<()> {
    let bytes = bincode::serialize(msg)
        .map_err(|e| VertexFlowError::Internal(format!("bincode encode: {e}")))?;
    framed
        .send(Bytes::from(bytes))
        .await
        .map_err(|e| VertexFlowError::Internal(format!("send failed: {e}")))?;
    Ok(())
}

pub async fn recv_msg<T: for<'de> Deserialize<'de>>(
    framed: &mut WorkerFramed,
) -> VertexFlowResult<T> {
    let bytes = framed
        .next()
        .await
        .ok_or_else(|| VertexFlowError::Internal("connection closed".to_string()))?
        .map_err(|e| VertexFlowError::Internal(format!("recv failed: {e}")))?;
    bincode::deserialize::<T>(&bytes)
        .map_err(|e| VertexFlowError::Internal(format!("bincode decode: {e}")))
}

/// Splits `items` into frames of at most [`BATCH_ENTRIES`]; always yields at
/// least one (possibly empty) chunk so the receiver sees a `last` marker.
pub fn batches<T>(mut items: Vec<T>) -> Vec<Vec<T>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::with_capacity(items.len().div_ceil(BATCH_ENTRIES));
    while items.len() > BATCH_ENTRIES {
        let rest = items.split_off(BATCH_ENTRIES);
        out.push(std::mem::replace(&mut items, rest));
    }
    out.push(items);
    out
}
