use crate::io::file::{self, GraphInput};
use crate::job::JobConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub mode: JobMode,
    pub graph: GraphSpec,
    pub algorithm: AlgorithmSpec,
    /// Partition count in local mode; distributed jobs use one per address.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub max_supersteps: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// CSV file receiving `id,value` rows.
    #[serde(default)]
    pub output: Option<String>,
}

fn default_workers() -> usize {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    #[default]
    Local,
    Distributed {
        workers: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub source: FileSource,
    /// Add the reverse of every edge when loading.
    #[serde(default)]
    pub symmetric: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    Csv { path: String },
    EdgeList { path: String },
    Adjacency { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmSpec {
    Wcc,
    Bfs { source: u64 },
    TriangleCount,
    Reachability,
    ClusteringCoefficient,
}

impl AlgorithmSpec {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmSpec::Wcc => "wcc",
            AlgorithmSpec::Bfs { .. } => "bfs",
            AlgorithmSpec::TriangleCount => "triangle-count",
            AlgorithmSpec::Reachability => "reachability",
            AlgorithmSpec::ClusteringCoefficient => "clustering-coefficient",
        }
    }
}

impl GraphSpec {
    pub fn load(&self) -> VertexFlowResult<Vec<GraphInput>> {
        let rows = match &self.source {
            FileSource::Csv { path } => file::read_edges_csv(path, 0)?,
            FileSource::EdgeList { path } => file::read_edge_list(path)?,
            FileSource::Adjacency { path } => {
                let inputs = file::read_adjacency(path)?;
                if !self.symmetric {
                    return Ok(inputs);
                }
                let rows: Vec<file::EdgeRow> = inputs
                    .iter()
                    .flat_map(|v| v.edges.iter().map(move |e| (v.id, e.target_id, e.value)))
                    .collect();
                let mut loaded = file::edges_to_inputs(&rows, true);
                let known: std::collections::HashSet<u64> = loaded.iter().map(|v| v.id).collect();
                loaded.extend(
                    inputs
                        .iter()
                        .filter(|v| !known.contains(&v.id))
                        .map(|v| GraphInput::isolated(v.id, ())),
                );
                loaded.sort_by_key(|v| v.id);
                return Ok(loaded);
            }
        };
        Ok(file::edges_to_inputs(&rows, self.symmetric))
    }
}

impl JobSpec {
    pub fn from_json_file(path: impl AsRef<Path>) -> VertexFlowResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> VertexFlowResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VertexFlowError::InvalidArgument(format!("job spec: {e}")))
    }

    pub fn job_config(&self) -> VertexFlowResult<JobConfig> {
        let workers = match &self.mode {
            JobMode::Local => self.workers,
            JobMode::Distributed { workers } => workers.len(),
        };
        let config = JobConfig {
            workers,
            max_supersteps: self.max_supersteps,
            timeout: self.timeout_ms.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_defaults() {
        let spec = JobSpec::from_json(
            r#"{
                "name": "wiki",
                "graph": {"source": {"edge_list": {"path": "wiki-Vote.txt"}}},
                "algorithm": {"bfs": {"source": 30}}
            }"#,
        )
        .unwrap();
        assert_eq!(spec.mode, JobMode::Local);
        assert_eq!(spec.workers, 1);
        assert_eq!(spec.algorithm, AlgorithmSpec::Bfs { source: 30 });
        assert!(!spec.graph.symmetric);
        assert_eq!(spec.job_config().unwrap(), JobConfig::default());
    }

    #[test]
    fn unit_algorithms_are_plain_strings() {
        let spec: AlgorithmSpec = serde_json::from_str(r#""triangle_count""#).unwrap();
        assert_eq!(spec, AlgorithmSpec::TriangleCount);
        assert_eq!(spec.name(), "triangle-count");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut spec = JobSpec::from_json(
            r#"{"name":"x","graph":{"source":{"csv":{"path":"e.csv"}}},"algorithm":"wcc"}"#,
        )
        .unwrap();
        spec.workers = 0;
        assert!(spec.job_config().is_err());
    }

    #[test]
    fn symmetric_adjacency_adds_reverse_edges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adj.txt");
        std::fs::write(&path, "1 2:0\n2\n5\n").unwrap();
        let graph = GraphSpec {
            source: FileSource::Adjacency {
                path: path.to_string_lossy().into_owned(),
            },
            symmetric: true,
        };
        let inputs = graph.load().unwrap();
        let ids: Vec<u64> = inputs.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
        assert_eq!(inputs[1].degree(), 1);
    }
}
