use std::net::{Ipv4Addr, SocketAddr};
use vertexflow_runtime::algorithms::{self, VertexValue};
use vertexflow_runtime::distributed::driver::DistributedDriver;
use vertexflow_runtime::distributed::worker::{run_worker, WorkerConfig};
use vertexflow_runtime::io::file::{edges_to_inputs, GraphInput};
use vertexflow_runtime::job::JobConfig;
use vertexflow_runtime::plan::job_spec::{AlgorithmSpec, JobSpec};
use vertexflow_runtime::scheduler::superstep_coordinator::{RunLimits, Termination};

fn free_local_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn spawn_workers(n: usize) -> Vec<SocketAddr> {
    (0..n)
        .map(|_| {
            let listen_addr = free_local_addr();
            tokio::spawn(run_worker(WorkerConfig { listen_addr }));
            listen_addr
        })
        .collect()
}

fn graph() -> Vec<GraphInput> {
    edges_to_inputs(
        &[
            (1, 2, 0),
            (2, 3, 0),
            (3, 1, 0),
            (3, 4, 0),
            (10, 11, 0),
            (11, 12, 0),
            (12, 10, 0),
            (20, 21, 0),
        ],
        true,
    )
}

fn local(spec: &AlgorithmSpec) -> Vec<(u64, VertexValue)> {
    algorithms::run(spec, JobConfig::with_workers(2), graph())
        .unwrap()
        .vertices()
        .map(|(id, v)| (*id, v.clone()))
        .collect()
}

#[tokio::test]
async fn test_distributed_wcc_three_workers() {
    let addrs = spawn_workers(3);
    let report =
        DistributedDriver::run_job(&addrs, &AlgorithmSpec::Wcc, graph(), &RunLimits::default())
            .await
            .unwrap();

    assert_eq!(report.termination, Termination::Fixpoint);
    assert_eq!(report.value(&4), Some(&VertexValue::Count(1)));
    assert_eq!(report.value(&12), Some(&VertexValue::Count(10)));
    assert_eq!(report.value(&21), Some(&VertexValue::Count(20)));

    let distributed: Vec<(u64, VertexValue)> =
        report.vertices().map(|(id, v)| (*id, v.clone())).collect();
    assert_eq!(distributed, local(&AlgorithmSpec::Wcc));
}

#[tokio::test]
async fn test_distributed_algorithms_match_local_runs() {
    for spec in [
        AlgorithmSpec::Bfs { source: 1 },
        AlgorithmSpec::TriangleCount,
        AlgorithmSpec::Reachability,
        AlgorithmSpec::ClusteringCoefficient,
    ] {
        let addrs = spawn_workers(2);
        let report = DistributedDriver::run_job(&addrs, &spec, graph(), &RunLimits::default())
            .await
            .unwrap();
        assert!(report.is_converged(), "{} did not converge", spec.name());
        let distributed: Vec<(u64, VertexValue)> =
            report.vertices().map(|(id, v)| (*id, v.clone())).collect();
        assert_eq!(distributed, local(&spec), "{} differs", spec.name());
    }
}

#[tokio::test]
async fn test_distributed_superstep_limit() {
    let addrs = spawn_workers(2);
    let limits = RunLimits {
        max_supersteps: Some(1),
        ..RunLimits::default()
    };
    let report = DistributedDriver::run_job(&addrs, &AlgorithmSpec::Wcc, graph(), &limits)
        .await
        .unwrap();
    assert_eq!(report.termination, Termination::SuperstepLimit);
    assert_eq!(report.supersteps, 1);
    // After superstep 0 every vertex still carries its own id.
    assert_eq!(report.value(&4), Some(&VertexValue::Count(4)));
}

#[tokio::test]
async fn test_distributed_bfs_rejects_missing_source() {
    let addrs = spawn_workers(1);
    let result = DistributedDriver::run_job(
        &addrs,
        &AlgorithmSpec::Bfs { source: 999 },
        graph(),
        &RunLimits::default(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_distributed_job_from_spec_file() {
    let dir = tempfile::tempdir().unwrap();
    let edges = dir.path().join("edges.txt");
    std::fs::write(&edges, "# tiny\n1 2\n2 3\n5 6\n").unwrap();

    let addrs = spawn_workers(2);
    let workers: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
    let raw = serde_json::json!({
        "name": "wcc-file",
        "mode": { "distributed": { "workers": workers } },
        "graph": {
            "source": { "edge_list": { "path": edges.to_string_lossy() } },
            "symmetric": true
        },
        "algorithm": "wcc"
    })
    .to_string();
    let spec = JobSpec::from_json(&raw).unwrap();
    assert_eq!(spec.job_config().unwrap().workers, 2);

    let report = DistributedDriver::run_job(
        &addrs,
        &spec.algorithm,
        spec.graph.load().unwrap(),
        &RunLimits::default(),
    )
    .await
    .unwrap();
    let labels: Vec<(u64, String)> =
        report.vertices().map(|(id, v)| (*id, v.to_string())).collect();
    assert_eq!(
        labels,
        vec![
            (1, "1".to_string()),
            (2, "1".to_string()),
            (3, "1".to_string()),
            (5, "5".to_string()),
            (6, "5".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_distributed_clustering_reports_limit_hit_during_triangles() {
    let addrs = spawn_workers(2);
    let limits = RunLimits {
        max_supersteps: Some(1),
        ..RunLimits::default()
    };
    let report = DistributedDriver::run_job(
        &addrs,
        &AlgorithmSpec::ClusteringCoefficient,
        graph(),
        &limits,
    )
    .await
    .unwrap();
    assert_eq!(report.termination, Termination::SuperstepLimit);
    assert!(report.termination.is_forced());
    assert_eq!(report.supersteps, 1);
    assert!(report.vertices().all(|(_, v)| *v == VertexValue::Ratio(0.0)));
    assert_eq!(report.vertex_count(), graph().len());
}
