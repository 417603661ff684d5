use crate::algorithms::triangle_count::incident_triangles;
use crate::algorithms::VertexValue;
use crate::distributed::algorithm::{self, encode, OutMessage, StepSummary};
use crate::distributed::protocol::{
    batches, framed, recv_msg, send_msg, DriverToWorker, WorkerFramed, WorkerToDriver,
};
use crate::io::file::GraphInput;
use crate::job::JobReport;
use crate::observability::SUPERSTEP_DURATION_MS;
use crate::plan::job_spec::AlgorithmSpec;
use crate::scheduler::superstep_coordinator::{
    has_converged, RunLimits, SuperstepStats, Termination,
};
use crate::shuffle::partitioner::{HashPartitioner, Partitioner};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};
use vertexflow_api::graph::GraphView;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

#[derive(Debug, Default)]
pub struct RoundResult {
    /// Messages for the next superstep, indexed by owning worker.
    pub next: Vec<Vec<OutMessage>>,
    pub computed: usize,
    pub sent: usize,
    pub routed: usize,
    pub dropped: usize,
    pub active: usize,
    pub failure: Option<(u64, String)>,
}

struct LoadedIds<'a>(&'a HashSet<u64>);

impl GraphView<u64> for LoadedIds<'_> {
    fn contains_vertex(&self, id: &u64) -> bool {
        self.0.contains(id)
    }

    fn vertex_count(&self) -> usize {
        self.0.len()
    }
}

pub struct DistributedDriver {
    workers: Vec<WorkerFramed>,
    partitioner: HashPartitioner,
    known: HashSet<u64>,
}

impl DistributedDriver {
    pub async fn run_job(
        worker_addrs: &[SocketAddr],
        spec: &AlgorithmSpec,
        graph: Vec<GraphInput>,
        limits: &RunLimits,
    ) -> VertexFlowResult<JobReport<u64, VertexValue>> {
        let start = Instant::now();
        let mut driver = Self::connect(worker_addrs).await?;
        driver.load_graph(graph).await?;

        let mut seeds = Vec::new();
        if *spec == AlgorithmSpec::ClusteringCoefficient {
            driver.set_algorithm(&AlgorithmSpec::TriangleCount).await?;
            let (termination, supersteps, stats) = driver.execute(limits, Vec::new()).await?;
            let triangles = driver.fetch_vertices().await?;
            if termination != Termination::Fixpoint {
                tracing::warn!(
                    termination = termination.label(),
                    "triangle counting stopped early, skipping coefficients"
                );
                driver.shutdown().await?;
                let values = triangles
                    .into_iter()
                    .map(|(id, _)| (id, VertexValue::Ratio(0.0)))
                    .collect();
                return Ok(JobReport::new(
                    spec.name().to_string(),
                    supersteps,
                    termination,
                    stats,
                    start.elapsed(),
                    values,
                ));
            }
            for (id, value) in triangles {
                if let VertexValue::Count(raw) = value {
                    let t = incident_triangles(raw);
                    if t > 0 {
                        seeds.push((id, encode(&t)?));
                    }
                }
            }
        }

        driver.set_algorithm(spec).await?;
        let (termination, supersteps, stats) = driver.execute(limits, seeds).await?;
        let values = driver.fetch_vertices().await?.into_iter().collect();
        driver.shutdown().await?;

        let elapsed = start.elapsed();
        tracing::info!(
            algorithm = spec.name(),
            supersteps,
            termination = termination.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "distributed job finished"
        );
        Ok(JobReport::new(
            spec.name().to_string(),
            supersteps,
            termination,
            stats,
            elapsed,
            values,
        ))
    }

    pub async fn connect(worker_addrs: &[SocketAddr]) -> VertexFlowResult<Self> {
        let partitioner = HashPartitioner::new(worker_addrs.len())?;
        let mut workers = Vec::with_capacity(worker_addrs.len());
        for addr in worker_addrs {
            let mut attempts: u32 = 0;
            let stream = loop {
                attempts += 1;
                match TcpStream::connect(addr).await {
                    Ok(s) => break s,
                    Err(e) => {
                        if attempts >= 200 {
                            return Err(VertexFlowError::Internal(format!(
                                "connect {addr} failed: {e}"
                            )));
                        }
                        sleep(Duration::from_millis(30)).await;
                    }
                }
            };
            let mut framed = framed(stream);
            let ready: WorkerToDriver = recv_msg(&mut framed).await?;
            match ready {
                WorkerToDriver::Ready => {}
                other => {
                    return Err(VertexFlowError::Internal(format!(
                        "unexpected handshake from worker {addr:?}: {other:?}"
                    )))
                }
            }
            workers.push(framed);
        }
        tracing::info!(workers = workers.len(), "connected to workers");
        Ok(Self {
            workers,
            partitioner,
            known: HashSet::new(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub async fn load_graph(&mut self, graph: Vec<GraphInput>) -> VertexFlowResult<usize> {
        let mut parts: Vec<Vec<GraphInput>> =
            (0..self.worker_count()).map(|_| Vec::new()).collect();
        for input in graph {
            if !self.known.insert(input.id) {
                return Err(VertexFlowError::InvalidArgument(format!(
                    "vertex {} loaded twice",
                    input.id
                )));
            }
            parts[self.partitioner.owner(&input.id)].push(input);
        }

        for (i, (worker, part)) in self.workers.iter_mut().zip(parts).enumerate() {
            let chunks = batches(part);
            let n = chunks.len();
            for (j, vertices) in chunks.into_iter().enumerate() {
                let last = j + 1 == n;
                send_msg(worker, &DriverToWorker::LoadGraphBatch { vertices, last }).await?;
                match recv_from(worker, i).await? {
                    WorkerToDriver::GraphLoaded { .. } => {}
                    other => return Err(unexpected(i, "graph load ack", other)),
                }
            }
        }
        tracing::info!(vertices = self.known.len(), "graph loaded");
        Ok(self.known.len())
    }

    pub async fn set_algorithm(&mut self, spec: &AlgorithmSpec) -> VertexFlowResult<()> {
        algorithm::validate(spec, &LoadedIds(&self.known))?;
        let partitions = self.worker_count();
        for (i, w) in self.workers.iter_mut().enumerate() {
            send_msg(
                w,
                &DriverToWorker::SetAlgorithm {
                    algorithm: spec.clone(),
                    partition: i,
                    partitions,
                },
            )
            .await?;
        }
        for (i, w) in self.workers.iter_mut().enumerate() {
            match recv_from(w, i).await? {
                WorkerToDriver::AlgorithmSet => {}
                other => return Err(unexpected(i, "set algorithm ack", other)),
            }
        }
        Ok(())
    }

    /// Returns the termination, supersteps executed and per-superstep statistics.
    pub async fn execute(
        &mut self,
        limits: &RunLimits,
        seeds: Vec<OutMessage>,
    ) -> VertexFlowResult<(Termination<u64>, u64, Vec<SuperstepStats>)> {
        let mut inboxes: Vec<Vec<OutMessage>> =
            (0..self.worker_count()).map(|_| Vec::new()).collect();
        let (_, mut seed_dropped) = self.route(seeds, &mut inboxes);

        let mut stats = Vec::new();
        let mut superstep: u64 = 0;
        loop {
            if let Some(stop) = limits.check(superstep) {
                tracing::info!(superstep, reason = ?stop, "stopping at superstep barrier");
                return Ok((stop.termination(), superstep, stats));
            }

            let start = Instant::now();
            let round = self.superstep_round(superstep, inboxes).await?;
            if let Some((vertex, reason)) = round.failure {
                tracing::warn!(
                    superstep,
                    vertex,
                    error = %reason,
                    "computation failed, aborting job"
                );
                return Ok((
                    Termination::Aborted {
                        vertex,
                        superstep,
                        reason,
                    },
                    superstep,
                    stats,
                ));
            }

            let dropped = round.dropped + std::mem::take(&mut seed_dropped);
            let elapsed = start.elapsed();
            metrics::counter!("vertexflow_superstep_messages_total").increment(round.sent as u64);
            metrics::gauge!("vertexflow_active_vertices").set(round.active as f64);
            metrics::histogram!(SUPERSTEP_DURATION_MS)
                .record(elapsed.as_secs_f64() * 1000.0);
            tracing::debug!(
                superstep,
                computed = round.computed,
                sent = round.sent,
                routed = round.routed,
                dropped,
                active = round.active,
                "superstep finished"
            );
            stats.push(SuperstepStats {
                superstep,
                computed_vertices: round.computed,
                messages_sent: round.sent,
                messages_delivered: round.routed,
                dropped_messages: dropped,
                active_after: round.active,
                elapsed,
            });

            superstep += 1;
            if has_converged(round.active, round.routed) {
                return Ok((Termination::Fixpoint, superstep, stats));
            }
            inboxes = round.next;
        }
    }

    pub async fn superstep_round(
        &mut self,
        superstep: u64,
        inboxes: Vec<Vec<OutMessage>>,
    ) -> VertexFlowResult<RoundResult> {
        for (worker, inbox) in self.workers.iter_mut().zip(inboxes) {
            let chunks = batches(inbox);
            let n = chunks.len();
            for (j, inbox) in chunks.into_iter().enumerate() {
                send_msg(
                    worker,
                    &DriverToWorker::SuperstepBatch {
                        superstep,
                        inbox,
                        last: j + 1 == n,
                    },
                )
                .await?;
            }
        }

        let mut outboxes = Vec::new();
        let mut summaries: Vec<StepSummary> = Vec::with_capacity(self.workers.len());
        for (i, worker) in self.workers.iter_mut().enumerate() {
            loop {
                match recv_from(worker, i).await? {
                    WorkerToDriver::SuperstepResultBatch {
                        superstep: s,
                        outbox,
                        last,
                        summary,
                    } if s == superstep => {
                        outboxes.push(outbox);
                        if last {
                            summaries.push(summary.unwrap_or_default());
                            break;
                        }
                    }
                    other => return Err(unexpected(i, "superstep result", other)),
                }
            }
        }

        let mut round = RoundResult {
            next: (0..self.worker_count()).map(|_| Vec::new()).collect(),
            ..RoundResult::default()
        };
        for s in summaries {
            round.computed += s.computed;
            round.active += s.active;
            if let Some((vertex, reason)) = s.failure {
                if round.failure.as_ref().map_or(true, |(v, _)| vertex < *v) {
                    round.failure = Some((vertex, reason));
                }
            }
        }
        let mut next = std::mem::take(&mut round.next);
        for outbox in outboxes {
            round.sent += outbox.len();
            let (routed, dropped) = self.route(outbox, &mut next);
            round.routed += routed;
            round.dropped += dropped;
        }
        round.next = next;
        if round.dropped > 0 {
            tracing::warn!(
                superstep,
                dropped = round.dropped,
                "dropped messages addressed to unknown vertices"
            );
        }
        Ok(round)
    }

    // Ids never loaded are dropped.
    fn route(&self, messages: Vec<OutMessage>, next: &mut [Vec<OutMessage>]) -> (usize, usize) {
        let mut routed = 0;
        let mut dropped = 0;
        for (target, payload) in messages {
            if self.known.contains(&target) {
                next[self.partitioner.owner(&target)].push((target, payload));
                routed += 1;
            } else {
                dropped += 1;
            }
        }
        (routed, dropped)
    }

    pub async fn fetch_vertices(&mut self) -> VertexFlowResult<Vec<(u64, VertexValue)>> {
        for w in &mut self.workers {
            send_msg(w, &DriverToWorker::FetchVertices).await?;
        }

        let mut out = Vec::new();
        for (i, w) in self.workers.iter_mut().enumerate() {
            match recv_from(w, i).await? {
                WorkerToDriver::Vertices { mut vertices } => out.append(&mut vertices),
                other => return Err(unexpected(i, "fetch response", other)),
            }
        }
        Ok(out)
    }

    pub async fn shutdown(mut self) -> VertexFlowResult<()> {
        for w in &mut self.workers {
            send_msg(w, &DriverToWorker::Shutdown).await?;
        }
        Ok(())
    }
}

async fn recv_from(worker: &mut WorkerFramed, index: usize) -> VertexFlowResult<WorkerToDriver> {
    let msg: WorkerToDriver = recv_msg(worker)
        .await
        .map_err(|e| VertexFlowError::Internal(format!("worker {index}: {e}")))?;
    match msg {
        WorkerToDriver::Error { message } => Err(VertexFlowError::Internal(format!(
            "worker {index} error: {message}"
        ))),
        other => Ok(other),
    }
}

fn unexpected(index: usize, expected: &str, got: WorkerToDriver) -> VertexFlowError {
    VertexFlowError::Internal(format!("worker {index}: expected {expected}, got {got:?}"))
}
