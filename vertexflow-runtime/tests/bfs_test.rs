use std::collections::HashMap;
use std::sync::Arc;
use vertexflow_api::function::MessageCombiner;
use vertexflow_runtime::aggregate::AggregatorSet;
use vertexflow_runtime::algorithms::bfs::{self, BfsComputation, UNREACHED};
use vertexflow_runtime::graph::partitioned_graph::PartitionedGraph;
use vertexflow_runtime::io::file::{edges_to_inputs, GraphInput};
use vertexflow_runtime::job::JobConfig;
use vertexflow_runtime::scheduler::partition_worker::PartitionWorker;
use vertexflow_runtime::scheduler::superstep_coordinator::{StepOutcome, SuperstepCoordinator};
use vertexflow_runtime::shuffle::combiner::MinCombiner;
use vertexflow_runtime::shuffle::partitioner::{HashPartitioner, Partitioner};
use vertexflow_runtime::shuffle::MessageRouter;

fn grid_graph() -> Vec<GraphInput> {
    // 3x3 grid numbered 1..=9 plus a detached pair.
    let mut edges = Vec::new();
    for r in 0..3u64 {
        for c in 0..3u64 {
            let id = r * 3 + c + 1;
            if c < 2 {
                edges.push((id, id + 1, 0));
            }
            if r < 2 {
                edges.push((id, id + 3, 0));
            }
        }
    }
    edges.push((50, 51, 0));
    edges_to_inputs(&edges, true)
}

fn snapshot(
    coordinator: &SuperstepCoordinator<u64, u64, u8, u64>,
) -> HashMap<u64, u64> {
    coordinator
        .workers()
        .iter()
        .flat_map(|w| w.store().values().map(|(id, v)| (*id, *v)))
        .collect()
}

#[test]
fn test_bfs_grid_distances() {
    let report = bfs::run(JobConfig::with_workers(3), 1, grid_graph()).unwrap();
    assert!(report.is_converged());
    assert_eq!(report.value(&1), Some(&0));
    assert_eq!(report.value(&5), Some(&2));
    assert_eq!(report.value(&9), Some(&4));
    assert_eq!(report.value(&50), Some(&UNREACHED));
}

fn coordinator(partitions: usize) -> SuperstepCoordinator<u64, u64, u8, u64> {
    let partitioner: Arc<dyn Partitioner<u64>> =
        Arc::new(HashPartitioner::new(partitions).unwrap());
    let mut graph: PartitionedGraph<u64, u64, u8> = PartitionedGraph::new(partitioner.clone());
    graph
        .load(grid_graph().into_iter().map(|v| v.with_value(UNREACHED)))
        .unwrap();
    let workers = graph
        .into_stores()
        .into_iter()
        .enumerate()
        .map(|(i, s)| PartitionWorker::new(i, s))
        .collect();
    let combiner: Arc<dyn MessageCombiner<u64>> = Arc::new(MinCombiner);
    let router = MessageRouter::new(partitioner, Some(combiner));
    SuperstepCoordinator::new(
        workers,
        router,
        Arc::new(BfsComputation::<u8>::new(1)),
        AggregatorSet::default(),
    )
    .unwrap()
}

#[test]
fn test_bfs_distances_never_increase() {
    let mut coordinator = coordinator(3);
    let mut previous: Option<HashMap<u64, u64>> = None;
    loop {
        let outcome = coordinator.step().unwrap();
        let current = snapshot(&coordinator);
        if let Some(prev) = &previous {
            for (id, d) in &current {
                assert!(d <= &prev[id], "distance of {id} grew from {} to {d}", prev[id]);
            }
        }
        previous = Some(current);
        if outcome == StepOutcome::Converged {
            break;
        }
        assert!(coordinator.superstep() < 20);
    }
    assert_eq!(previous.unwrap()[&9], 4);
}

#[test]
fn test_extra_superstep_after_convergence_changes_nothing() {
    let mut coordinator = coordinator(2);
    while coordinator.step().unwrap() != StepOutcome::Converged {}
    let converged = snapshot(&coordinator);

    assert_eq!(coordinator.step().unwrap(), StepOutcome::Converged);
    assert_eq!(snapshot(&coordinator), converged);
    let last = coordinator.stats().last().unwrap();
    assert_eq!(last.computed_vertices, 0);
    assert_eq!(last.messages_sent, 0);
}
