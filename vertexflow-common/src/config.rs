use crate::error::{VertexFlowError, VertexFlowResult};
use std::collections::HashMap;
use std::str::FromStr;

pub const JOB_WORKERS: &str = "vertexflow.job.workers";
pub const JOB_MAX_SUPERSTEPS: &str = "vertexflow.job.max.supersteps";
pub const JOB_TIMEOUT_MS: &str = "vertexflow.job.timeout.ms";

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    config: HashMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self {
            config: HashMap::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.put(key, value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.config.get(key)
    }

    pub fn get_string(&self, key: &str, default_value: &str) -> String {
        self.config
            .get(key)
            .cloned()
            .unwrap_or_else(|| default_value.to_string())
    }

    /// Parses `key` if present; a malformed value is an error, not a default.
    pub fn get_parsed<T>(&self, key: &str) -> VertexFlowResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.config
            .get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    VertexFlowError::InvalidArgument(format!("config {key}={raw}: {e}"))
                })
            })
            .transpose()
    }

    pub fn get_usize(&self, key: &str, default_value: usize) -> VertexFlowResult<usize> {
        Ok(self.get_parsed(key)?.unwrap_or(default_value))
    }

    pub fn get_u64(&self, key: &str) -> VertexFlowResult<Option<u64>> {
        self.get_parsed(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_fall_back_and_reject_garbage() {
        let conf = Configuration::new()
            .with(JOB_WORKERS, 4)
            .with(JOB_TIMEOUT_MS, "soon");

        assert_eq!(conf.get_usize(JOB_WORKERS, 1).unwrap(), 4);
        assert_eq!(conf.get_u64(JOB_MAX_SUPERSTEPS).unwrap(), None);
        assert!(matches!(
            conf.get_u64(JOB_TIMEOUT_MS),
            Err(VertexFlowError::InvalidArgument(_))
        ));
        assert_eq!(conf.get_string("missing", "x"), "x");
    }
}
