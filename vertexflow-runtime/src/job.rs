use crate::aggregate::{AggregateValues, AggregatorSet};
use crate::graph::partitioned_graph::PartitionedGraph;
use crate::scheduler::partition_worker::PartitionWorker;
use crate::scheduler::superstep_coordinator::{
    RunLimits, SuperstepCoordinator, SuperstepStats, Termination,
};
use crate::shuffle::partitioner::{HashPartitioner, Partitioner};
use crate::shuffle::MessageRouter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use vertexflow_api::function::{Aggregator, MessageCombiner, VertexCentricComputation};
use vertexflow_api::graph::GraphView;
use vertexflow_common::config::{
    Configuration, JOB_MAX_SUPERSTEPS, JOB_TIMEOUT_MS, JOB_WORKERS,
};
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};
use vertexflow_common::types::{Vertex, VertexInput, VertexKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub workers: usize,
    pub max_supersteps: Option<u64>,
    pub timeout: Option<Duration>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_supersteps: None,
            timeout: None,
        }
    }
}

impl JobConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    pub fn from_configuration(conf: &Configuration) -> VertexFlowResult<Self> {
        let config = Self {
            workers: conf.get_usize(JOB_WORKERS, 1)?,
            max_supersteps: conf.get_u64(JOB_MAX_SUPERSTEPS)?,
            timeout: conf.get_u64(JOB_TIMEOUT_MS)?.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VertexFlowResult<()> {
        if self.workers == 0 {
            return Err(VertexFlowError::InvalidArgument(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.max_supersteps == Some(0) {
            return Err(VertexFlowError::InvalidArgument(
                "superstep limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct JobBuilder<K, VV, EV, M> {
    config: JobConfig,
    computation: Option<Arc<dyn VertexCentricComputation<K, VV, EV, M>>>,
    combiner: Option<Arc<dyn MessageCombiner<M>>>,
    aggregators: Vec<Arc<dyn Aggregator>>,
    partitioner: Option<Arc<dyn Partitioner<K>>>,
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl<K, VV, EV, M> JobBuilder<K, VV, EV, M>
where
    K: VertexKey,
    VV: Send + Sync + 'static,
    EV: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub fn new(config: JobConfig) -> Self {
        Self {
            config,
            computation: None,
            combiner: None,
            aggregators: Vec::new(),
            partitioner: None,
            cancel: None,
            deadline: None,
        }
    }

    pub fn computation<C>(self, computation: C) -> Self
    where
        C: VertexCentricComputation<K, VV, EV, M>,
    {
        self.shared_computation(Arc::new(computation))
    }

    pub fn shared_computation(
        mut self,
        computation: Arc<dyn VertexCentricComputation<K, VV, EV, M>>,
    ) -> Self {
        self.computation = Some(computation);
        self
    }

    pub fn combiner<C>(mut self, combiner: C) -> Self
    where
        C: MessageCombiner<M>,
    {
        self.combiner = Some(Arc::new(combiner));
        self
    }

    pub fn aggregator<A: Aggregator>(mut self, aggregator: A) -> Self {
        self.aggregators.push(Arc::new(aggregator));
        self
    }

    /// Overrides the default hash partitioner; it must cover `config.workers` partitions.
    pub fn partitioner(mut self, partitioner: Arc<dyn Partitioner<K>>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Absolute stop time shared with other jobs; the earlier of this and
    /// `config.timeout` applies.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn build(self) -> VertexFlowResult<Job<K, VV, EV, M>> {
        self.config.validate()?;
        let computation = self.computation.ok_or_else(|| {
            VertexFlowError::InvalidArgument("no computation registered".to_string())
        })?;

        let partitioner: Arc<dyn Partitioner<K>> = match self.partitioner {
            Some(p) => p,
            None => Arc::new(HashPartitioner::new(self.config.workers)?),
        };
        if partitioner.num_partitions() != self.config.workers {
            return Err(VertexFlowError::InvalidArgument(format!(
                "partitioner covers {} partitions, job has {} workers",
                partitioner.num_partitions(),
                self.config.workers
            )));
        }

        let mut aggregators = AggregatorSet::default();
        for a in self.aggregators {
            aggregators.register(a)?;
        }

        Ok(Job {
            config: self.config,
            graph: PartitionedGraph::new(partitioner.clone()),
            router: MessageRouter::new(partitioner, self.combiner),
            computation,
            aggregators,
            cancel: self.cancel.unwrap_or_default(),
            deadline: self.deadline,
            seeds: Vec::new(),
        })
    }
}

pub struct Job<K, VV, EV, M> {
    config: JobConfig,
    graph: PartitionedGraph<K, VV, EV>,
    router: MessageRouter<K, M>,
    computation: Arc<dyn VertexCentricComputation<K, VV, EV, M>>,
    aggregators: AggregatorSet,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    seeds: Vec<(K, M)>,
}

impl<K, VV, EV, M> Job<K, VV, EV, M>
where
    K: VertexKey,
    VV: Send + Sync + 'static,
    EV: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub fn builder(config: JobConfig) -> JobBuilder<K, VV, EV, M> {
        JobBuilder::new(config)
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn graph(&self) -> &PartitionedGraph<K, VV, EV> {
        &self.graph
    }

    pub fn load_vertex(&mut self, input: VertexInput<K, VV, EV>) -> VertexFlowResult<()> {
        self.graph.load_vertex(input)
    }

    pub fn load<I>(&mut self, inputs: I) -> VertexFlowResult<usize>
    where
        I: IntoIterator<Item = VertexInput<K, VV, EV>>,
    {
        self.graph.load(inputs)
    }

    pub fn seed_message(&mut self, target: K, message: M) {
        self.seeds.push((target, message));
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(self) -> VertexFlowResult<JobReport<K, VV>> {
        let start = Instant::now();
        let name = self.computation.name().to_string();
        self.computation.validate(&self.graph)?;

        let vertices = self.graph.vertex_count();
        let limits = RunLimits {
            max_supersteps: self.config.max_supersteps,
            deadline: earliest(self.deadline, self.config.timeout.map(|t| start + t)),
            cancel: self.cancel,
        };
        let workers: Vec<PartitionWorker<K, VV, EV, M>> = self
            .graph
            .into_stores()
            .into_iter()
            .enumerate()
            .map(|(i, store)| PartitionWorker::new(i, store))
            .collect();

        let mut coordinator =
            SuperstepCoordinator::new(workers, self.router, self.computation, self.aggregators)?;
        if !self.seeds.is_empty() {
            coordinator.seed(self.seeds)?;
        }

        tracing::info!(
            job = %name,
            workers = self.config.workers,
            vertices,
            "job started"
        );
        let termination = coordinator.run(&limits)?;
        let elapsed = start.elapsed();

        metrics::counter!("vertexflow_jobs_total", "termination" => termination.label())
            .increment(1);
        tracing::info!(
            job = %name,
            supersteps = coordinator.superstep(),
            termination = termination.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "job finished"
        );

        let supersteps = coordinator.superstep();
        let stats = coordinator.stats().to_vec();
        let aggregates = coordinator.aggregate_values().clone();
        let values = coordinator
            .into_workers()
            .into_iter()
            .flat_map(|w| w.into_store().into_values())
            .collect();

        Ok(JobReport {
            name,
            supersteps,
            termination,
            stats,
            aggregates,
            elapsed,
            values,
        })
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone)]
pub struct JobReport<K, VV> {
    pub name: String,
    /// Supersteps completed; an aborted superstep is not counted.
    pub supersteps: u64,
    pub termination: Termination<K>,
    pub stats: Vec<SuperstepStats>,
    pub aggregates: AggregateValues,
    pub elapsed: Duration,
    values: BTreeMap<K, VV>,
}

impl<K: Ord, VV> JobReport<K, VV> {
    pub(crate) fn new(
        name: String,
        supersteps: u64,
        termination: Termination<K>,
        stats: Vec<SuperstepStats>,
        elapsed: Duration,
        values: BTreeMap<K, VV>,
    ) -> Self {
        Self {
            name,
            supersteps,
            termination,
            stats,
            aggregates: AggregateValues::default(),
            elapsed,
            values,
        }
    }

    pub fn map_values<V>(self, mut f: impl FnMut(VV) -> V) -> JobReport<K, V> {
        JobReport {
            name: self.name,
            supersteps: self.supersteps,
            termination: self.termination,
            stats: self.stats,
            aggregates: self.aggregates,
            elapsed: self.elapsed,
            values: self.values.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = (&K, &VV)> {
        self.values.iter()
    }

    pub fn value(&self, id: &K) -> Option<&VV> {
        self.values.get(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_converged(&self) -> bool {
        self.termination.is_converged()
    }

    pub fn into_vertices(self) -> Vec<Vertex<K, VV>> {
        self.values
            .into_iter()
            .map(|(id, value)| Vertex::new(id, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::combiner::MinCombiner;
    use vertexflow_api::function::{from_fn, Messages, VertexCentricComputeFuncContext};

    fn noop() -> impl VertexCentricComputation<u64, u64, (), u64> {
        from_fn(
            "noop",
            |ctx: &mut dyn VertexCentricComputeFuncContext<u64, u64, (), u64>,
             _msgs: Messages<'_, u64>| {
                ctx.vote_to_halt();
                Ok(())
            },
        )
    }

    #[test]
    fn configuration_keys_map_to_job_config() {
        let conf = Configuration::new()
            .with(JOB_WORKERS, 3)
            .with(JOB_MAX_SUPERSTEPS, 20)
            .with(JOB_TIMEOUT_MS, 1500);
        let config = JobConfig::from_configuration(&conf).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.max_supersteps, Some(20));
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn zero_workers_fail_before_running() {
        let conf = Configuration::new().with(JOB_WORKERS, 0);
        assert!(JobConfig::from_configuration(&conf).is_err());
        let built = Job::<u64, u64, (), u64>::builder(JobConfig::with_workers(0))
            .computation(noop())
            .build();
        assert!(matches!(built, Err(VertexFlowError::InvalidArgument(_))));
    }

    #[test]
    fn missing_computation_is_a_configuration_error() {
        let built = Job::<u64, u64, (), u64>::builder(JobConfig::default())
            .combiner(MinCombiner)
            .build();
        assert!(matches!(built, Err(VertexFlowError::InvalidArgument(_))));
    }

    #[test]
    fn empty_graph_converges_after_one_superstep() {
        let report = Job::<u64, u64, (), u64>::builder(JobConfig::with_workers(2))
            .computation(noop())
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.termination, Termination::Fixpoint);
        assert_eq!(report.supersteps, 1);
        assert_eq!(report.vertex_count(), 0);
    }

    #[test]
    fn passed_deadline_wins_over_longer_timeout() {
        let config = JobConfig {
            workers: 1,
            max_supersteps: None,
            timeout: Some(Duration::from_secs(60)),
        };
        let mut job = Job::<u64, u64, (), u64>::builder(config)
            .computation(noop())
            .deadline(Instant::now())
            .build()
            .unwrap();
        job.load_vertex(VertexInput::isolated(1, 0)).unwrap();
        let report = job.run().unwrap();
        assert_eq!(report.termination, Termination::TimedOut);
        assert_eq!(report.supersteps, 0);
    }

    #[test]
    fn earliest_deadline_is_kept() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest(Some(later), Some(now)), Some(now));
        assert_eq!(earliest(None, Some(later)), Some(later));
        assert_eq!(earliest(None, None), None);
    }
}
