use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

pub const SUPERSTEP_DURATION_MS: &str = "vertexflow_superstep_duration_ms";

const SUPERSTEP_BUCKETS_MS: &[f64] = &[1.0, 5.0, 25.0, 100.0, 500.0, 2_500.0, 10_000.0, 60_000.0];

/// Installs the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Serves superstep and job metrics on `addr` in the Prometheus text format.
pub fn init_prometheus(addr: SocketAddr) -> VertexFlowResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(SUPERSTEP_DURATION_MS.to_string()),
            SUPERSTEP_BUCKETS_MS,
        )
        .map_err(|e| VertexFlowError::Internal(format!("prometheus buckets: {e}")))?
        .install_recorder()
        .map_err(|e| VertexFlowError::Internal(format!("prometheus init: {e}")))?;
    describe_metrics();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!(
        "vertexflow_superstep_messages_total",
        "Messages emitted by vertex computations"
    );
    metrics::describe_counter!(
        "vertexflow_superstep_dropped_messages_total",
        "Messages addressed to vertices that were never loaded"
    );
    metrics::describe_gauge!(
        "vertexflow_active_vertices",
        "Vertices active for the next superstep"
    );
    metrics::describe_histogram!(
        SUPERSTEP_DURATION_MS,
        metrics::Unit::Milliseconds,
        "Wall time of one superstep including delivery"
    );
    metrics::describe_counter!("vertexflow_jobs_total", "Finished jobs by termination");
}
