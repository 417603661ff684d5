use crate::graph::{Edge, GraphView};
use std::marker::PhantomData;
use vertexflow_common::error::VertexFlowResult;

/// Messages addressed to one vertex for the current superstep.
///
/// Without a combiner this is the full multiset in unspecified order; with one
/// it yields at most a single combined message.
pub struct Messages<'a, M> {
    inner: std::slice::Iter<'a, M>,
}

impl<'a, M> Messages<'a, M> {
    pub fn new(messages: &'a [M]) -> Self {
        Self {
            inner: messages.iter(),
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: <&[M]>::default().iter(),
        }
    }
}

impl<'a, M> Iterator for Messages<'a, M> {
    type Item = &'a M;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<M> ExactSizeIterator for Messages<'_, M> {}

/// Context for one vertex invocation within a superstep.
pub trait VertexCentricComputeFuncContext<K, VV, EV, M> {
    fn vertex_id(&self) -> &K;
    fn vertex_value(&self) -> &VV;
    fn set_new_vertex_value(&mut self, value: VV);
    fn edges(&self) -> &[Edge<K, EV>];
    fn superstep(&self) -> u64;

    /// Buffers a message for delivery at the start of the next superstep.
    fn send_message(&mut self, target_id: K, message: M);

    fn vote_to_halt(&mut self);

    fn aggregate(&mut self, name: &str, value: f64);

    /// Reduced value of aggregator `name` from the previous superstep.
    fn aggregated_value(&self, name: &str) -> Option<f64>;

    fn num_edges(&self) -> usize {
        self.edges().len()
    }

    fn send_message_to_all_edges(&mut self, message: M)
    where
        K: Clone,
        M: Clone,
    {
        let targets: Vec<K> = self.edges().iter().map(|e| e.target_id.clone()).collect();
        for target in targets {
            self.send_message(target, message.clone());
        }
    }
}

/// The per-vertex algorithm body run by the engine.
///
/// Implementations must be pure functions of the context and messages: the
/// engine invokes `compute` for many vertices concurrently through `&self`.
pub trait VertexCentricComputation<K, VV, EV, M>: Send + Sync + 'static {
    fn name(&self) -> &str {
        "computation"
    }

    /// Checked once after load; an error keeps the job from starting.
    fn validate(&self, _graph: &dyn GraphView<K>) -> VertexFlowResult<()> {
        Ok(())
    }

    fn compute(
        &self,
        context: &mut dyn VertexCentricComputeFuncContext<K, VV, EV, M>,
        messages: Messages<'_, M>,
    ) -> VertexFlowResult<()>;
}

/// Associative and commutative merge of two messages bound for one vertex.
pub trait MessageCombiner<M>: Send + Sync + 'static {
    fn combine(&self, existing: M, incoming: M) -> M;
}

/// Global reduction over the values vertices contribute during a superstep.
pub trait Aggregator: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn identity(&self) -> f64;
    fn reduce(&self, a: f64, b: f64) -> f64;
}

/// Computation backed by a closure, see [`from_fn`].
pub struct FnComputation<F, K, VV, EV, M> {
    name: String,
    func: F,
    _marker: PhantomData<fn(K, VV, EV, M)>,
}

/// Wraps a closure as a computation.
pub fn from_fn<K, VV, EV, M, F>(name: impl Into<String>, func: F) -> FnComputation<F, K, VV, EV, M>
where
    F: Fn(
            &mut dyn VertexCentricComputeFuncContext<K, VV, EV, M>,
            Messages<'_, M>,
        ) -> VertexFlowResult<()>
        + Send
        + Sync
        + 'static,
{
    FnComputation {
        name: name.into(),
        func,
        _marker: PhantomData,
    }
}

impl<K, VV, EV, M, F> VertexCentricComputation<K, VV, EV, M> for FnComputation<F, K, VV, EV, M>
where
    F: Fn(
            &mut dyn VertexCentricComputeFuncContext<K, VV, EV, M>,
            Messages<'_, M>,
        ) -> VertexFlowResult<()>
        + Send
        + Sync
        + 'static,
    K: 'static,
    VV: 'static,
    EV: 'static,
    M: 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(
        &self,
        context: &mut dyn VertexCentricComputeFuncContext<K, VV, EV, M>,
        messages: Messages<'_, M>,
    ) -> VertexFlowResult<()> {
        (self.func)(context, messages)
    }
}
