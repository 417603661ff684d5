use std::collections::HashMap;
use std::sync::Arc;
use vertexflow_api::function::Aggregator;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};

#[derive(Debug, Clone)]
pub struct SumAggregator {
    name: String,
}

impl SumAggregator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Aggregator for SumAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> f64 {
        0.0
    }

    fn reduce(&self, a: f64, b: f64) -> f64 {
        a + b
    }
}

#[derive(Debug, Clone)]
pub struct MinAggregator {
    name: String,
}

impl MinAggregator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Aggregator for MinAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> f64 {
        f64::INFINITY
    }

    fn reduce(&self, a: f64, b: f64) -> f64 {
        a.min(b)
    }
}

#[derive(Debug, Clone)]
pub struct MaxAggregator {
    name: String,
}

impl MaxAggregator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Aggregator for MaxAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn reduce(&self, a: f64, b: f64) -> f64 {
        a.max(b)
    }
}

pub type AggregatePartial = HashMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateValues {
    values: HashMap<String, f64>,
}

impl AggregateValues {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Clone, Default)]
pub struct AggregatorSet {
    aggregators: Vec<Arc<dyn Aggregator>>,
}

impl AggregatorSet {
    pub fn register(&mut self, aggregator: Arc<dyn Aggregator>) -> VertexFlowResult<()> {
        if self.find(aggregator.name()).is_some() {
            return Err(VertexFlowError::InvalidArgument(format!(
                "aggregator {} registered twice",
                aggregator.name()
            )));
        }
        self.aggregators.push(aggregator);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Aggregator>> {
        self.aggregators.iter().find(|a| a.name() == name)
    }

    /// Returns false when no aggregator is registered under `name`.
    pub fn contribute(&self, partial: &mut AggregatePartial, name: &str, value: f64) -> bool {
        let Some(aggregator) = self.find(name) else {
            return false;
        };
        let slot = partial
            .entry(name.to_string())
            .or_insert_with(|| aggregator.identity());
        *slot = aggregator.reduce(*slot, value);
        true
    }

    pub fn merge(&self, mut a: AggregatePartial, b: AggregatePartial) -> AggregatePartial {
        for (name, value) in b {
            self.contribute(&mut a, &name, value);
        }
        a
    }

    /// Aggregators nobody contributed to publish their identity.
    pub fn finish(&self, partial: AggregatePartial) -> AggregateValues {
        let values = self
            .aggregators
            .iter()
            .map(|a| {
                let v = partial.get(a.name()).copied().unwrap_or_else(|| a.identity());
                (a.name().to_string(), v)
            })
            .collect();
        AggregateValues { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> AggregatorSet {
        let mut s = AggregatorSet::default();
        s.register(Arc::new(SumAggregator::new("sum"))).unwrap();
        s.register(Arc::new(MaxAggregator::new("max"))).unwrap();
        s
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut s = set();
        assert!(s.register(Arc::new(MinAggregator::new("sum"))).is_err());
    }

    #[test]
    fn partials_merge_across_workers() {
        let s = set();
        let mut a = AggregatePartial::new();
        let mut b = AggregatePartial::new();
        assert!(s.contribute(&mut a, "sum", 2.0));
        assert!(s.contribute(&mut b, "sum", 3.0));
        assert!(s.contribute(&mut b, "max", 7.0));
        assert!(!s.contribute(&mut b, "nope", 1.0));

        let values = s.finish(s.merge(a, b));
        assert_eq!(values.get("sum"), Some(5.0));
        assert_eq!(values.get("max"), Some(7.0));
        assert_eq!(values.get("nope"), None);
    }

    #[test]
    fn untouched_aggregators_publish_identity() {
        let values = set().finish(AggregatePartial::new());
        assert_eq!(values.get("sum"), Some(0.0));
        assert_eq!(values.get("max"), Some(f64::NEG_INFINITY));
    }
}
