use crate::aggregate::{AggregateValues, AggregatorSet};
use crate::observability::SUPERSTEP_DURATION_MS;
use crate::scheduler::partition_worker::{DeliveryStats, PartitionWorker, StepOutput};
use crate::shuffle::{MessageRouter, Outbox};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use vertexflow_api::function::VertexCentricComputation;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};
use vertexflow_common::types::VertexKey;

#[derive(Debug, Clone, PartialEq)]
pub enum Termination<K> {
    Fixpoint,
    SuperstepLimit,
    Cancelled,
    TimedOut,
    // Smallest failing vertex id.
    Aborted {
        vertex: K,
        superstep: u64,
        reason: String,
    },
}

impl<K> Termination<K> {
    /// Fixpoint or forced by the superstep limit.
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Fixpoint | Termination::SuperstepLimit)
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, Termination::SuperstepLimit)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Termination::Fixpoint => "fixpoint",
            Termination::SuperstepLimit => "superstep-limit",
            Termination::Cancelled => "cancelled",
            Termination::TimedOut => "timed-out",
            Termination::Aborted { .. } => "aborted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    Running { superstep: u64 },
    Converged,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperstepStats {
    pub superstep: u64,
    pub computed_vertices: usize,
    pub messages_sent: usize,
    pub messages_delivered: usize,
    pub dropped_messages: usize,
    pub active_after: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RunLimits {
    pub max_supersteps: Option<u64>,
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

impl RunLimits {
    /// Barrier-boundary checks, in order: external cancel, timeout, superstep limit.
    pub fn check(&self, next_superstep: u64) -> Option<BarrierStop> {
        if self.cancel.is_cancelled() {
            return Some(BarrierStop::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(BarrierStop::TimedOut);
        }
        if self.max_supersteps.is_some_and(|max| next_superstep >= max) {
            return Some(BarrierStop::SuperstepLimit);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierStop {
    Cancelled,
    TimedOut,
    SuperstepLimit,
}

impl BarrierStop {
    pub fn termination<K>(self) -> Termination<K> {
        match self {
            BarrierStop::Cancelled => Termination::Cancelled,
            BarrierStop::TimedOut => Termination::TimedOut,
            BarrierStop::SuperstepLimit => Termination::SuperstepLimit,
        }
    }
}

pub fn has_converged(active_vertices: usize, in_flight_messages: usize) -> bool {
    active_vertices == 0 && in_flight_messages == 0
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<K> {
    Continue,
    Converged,
    Aborted(Termination<K>),
}

pub struct SuperstepCoordinator<K, VV, EV, M> {
    workers: Vec<PartitionWorker<K, VV, EV, M>>,
    router: MessageRouter<K, M>,
    computation: Arc<dyn VertexCentricComputation<K, VV, EV, M>>,
    aggregators: AggregatorSet,
    aggregate_values: AggregateValues,
    state: CoordinatorState,
    superstep: u64,
    stats: Vec<SuperstepStats>,
    // Seed messages to unknown ids, charged to superstep 0.
    seed_dropped: usize,
}

impl<K, VV, EV, M> SuperstepCoordinator<K, VV, EV, M>
where
    K: VertexKey,
    VV: Send + Sync + 'static,
    EV: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub fn new(
        workers: Vec<PartitionWorker<K, VV, EV, M>>,
        router: MessageRouter<K, M>,
        computation: Arc<dyn VertexCentricComputation<K, VV, EV, M>>,
        aggregators: AggregatorSet,
    ) -> VertexFlowResult<Self> {
        if workers.len() != router.partitions() {
            return Err(VertexFlowError::InvalidArgument(format!(
                "{} partitions loaded but the partitioner expects {}",
                workers.len(),
                router.partitions()
            )));
        }
        let aggregate_values = aggregators.finish(Default::default());
        Ok(Self {
            workers,
            router,
            computation,
            aggregators,
            aggregate_values,
            state: CoordinatorState::Init,
            superstep: 0,
            stats: Vec::new(),
            seed_dropped: 0,
        })
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn superstep(&self) -> u64 {
        self.superstep
    }

    pub fn stats(&self) -> &[SuperstepStats] {
        &self.stats
    }

    pub fn aggregate_values(&self) -> &AggregateValues {
        &self.aggregate_values
    }

    pub fn workers(&self) -> &[PartitionWorker<K, VV, EV, M>] {
        &self.workers
    }

    pub fn into_workers(self) -> Vec<PartitionWorker<K, VV, EV, M>> {
        self.workers
    }

    /// Messages readable in superstep 0.
    pub fn seed(&mut self, messages: Vec<(K, M)>) -> VertexFlowResult<usize> {
        if self.state != CoordinatorState::Init {
            return Err(VertexFlowError::Internal(
                "seed messages after the job started".to_string(),
            ));
        }
        let mut outbox = self.router.new_outbox();
        for (target, message) in messages {
            self.router.send(&mut outbox, target, message);
        }
        let deliveries = self.deliver(vec![outbox]);
        self.seed_dropped += deliveries.iter().map(|d| d.dropped).sum::<usize>();
        Ok(deliveries.iter().map(|d| d.delivered).sum())
    }

    pub fn run(&mut self, limits: &RunLimits) -> VertexFlowResult<Termination<K>> {
        loop {
            if let Some(stop) = limits.check(self.superstep) {
                if stop == BarrierStop::SuperstepLimit {
                    self.state = CoordinatorState::Converged;
                } else {
                    self.state = CoordinatorState::Aborted;
                }
                tracing::info!(
                    superstep = self.superstep,
                    reason = ?stop,
                    "stopping at superstep barrier"
                );
                return Ok(stop.termination());
            }
            match self.step()? {
                StepOutcome::Continue => {}
                StepOutcome::Converged => return Ok(Termination::Fixpoint),
                StepOutcome::Aborted(t) => return Ok(t),
            }
        }
    }

    pub fn step(&mut self) -> VertexFlowResult<StepOutcome<K>> {
        if self.state == CoordinatorState::Aborted {
            return Err(VertexFlowError::Internal("job already aborted".to_string()));
        }
        let superstep = self.superstep;
        self.state = CoordinatorState::Running { superstep };
        let start = Instant::now();
        tracing::debug!(superstep, "superstep started");

        let computation = self.computation.as_ref();
        let router = &self.router;
        let aggregators = &self.aggregators;
        let aggregate_values = &self.aggregate_values;
        let mut outputs: Vec<StepOutput<K, M>> = self
            .workers
            .par_iter_mut()
            .map(|w| {
                w.compute_superstep(superstep, computation, router, aggregators, aggregate_values)
            })
            .collect();

        let failure = outputs
            .iter_mut()
            .filter_map(|o| o.failure.take())
            .min_by(|a, b| a.vertex.cmp(&b.vertex));
        if let Some(failure) = failure {
            self.state = CoordinatorState::Aborted;
            tracing::warn!(
                superstep,
                vertex = ?failure.vertex,
                error = %failure.error,
                computation = self.computation.name(),
                "computation failed, aborting job"
            );
            return Ok(StepOutcome::Aborted(Termination::Aborted {
                vertex: failure.vertex,
                superstep,
                reason: failure.error.to_string(),
            }));
        }

        let computed: usize = outputs.iter().map(|o| o.computed).sum();
        let messages_sent: usize = outputs.iter().map(|o| o.outbox.len()).sum();
        let mut partial = Default::default();
        let mut outboxes = Vec::with_capacity(outputs.len());
        for output in outputs {
            partial = self.aggregators.merge(partial, output.aggregates);
            outboxes.push(output.outbox);
        }
        self.aggregate_values = self.aggregators.finish(partial);

        let deliveries = self.deliver(outboxes);
        let delivered: usize = deliveries.iter().map(|d| d.delivered).sum();
        let dropped: usize = deliveries.iter().map(|d| d.dropped).sum::<usize>()
            + std::mem::take(&mut self.seed_dropped);
        let active_after: usize = self.workers.iter().map(|w| w.active_count()).sum();

        let elapsed = start.elapsed();
        metrics::counter!("vertexflow_superstep_messages_total").increment(messages_sent as u64);
        metrics::counter!("vertexflow_superstep_dropped_messages_total").increment(dropped as u64);
        metrics::gauge!("vertexflow_active_vertices").set(active_after as f64);
        metrics::histogram!(SUPERSTEP_DURATION_MS)
            .record(elapsed.as_secs_f64() * 1000.0);
        tracing::debug!(
            superstep,
            computed,
            messages_sent,
            delivered,
            dropped,
            active_after,
            elapsed_ms = elapsed.as_millis() as u64,
            "superstep finished"
        );
        self.stats.push(SuperstepStats {
            superstep,
            computed_vertices: computed,
            messages_sent,
            messages_delivered: delivered,
            dropped_messages: dropped,
            active_after,
            elapsed,
        });

        self.superstep += 1;
        if has_converged(active_after, delivered) {
            self.state = CoordinatorState::Converged;
            Ok(StepOutcome::Converged)
        } else {
            Ok(StepOutcome::Continue)
        }
    }

    fn deliver(&mut self, outboxes: Vec<Outbox<K, M>>) -> Vec<DeliveryStats> {
        let superstep = self.superstep;
        let columns = self.router.shuffle(outboxes);
        let combiner = self.router.combiner();
        self.workers
            .par_iter_mut()
            .zip(columns.into_par_iter())
            .map(|(w, messages)| w.deliver(superstep, messages, combiner))
            .collect()
    }
}
