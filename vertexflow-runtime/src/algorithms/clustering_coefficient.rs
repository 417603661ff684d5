use std::marker::PhantomData;
use vertexflow_api::function::{Messages, VertexCentricComputation, VertexCentricComputeFuncContext};
use vertexflow_common::error::VertexFlowResult;

/// Local clustering coefficient `2t / (d(d-1))`.
///
/// `t`, the number of triangles incident to the vertex, arrives as a message
/// readable in superstep 0; see `pipelines::clustering_coefficients`. A vertex
/// with no message is treated as `t = 0`.
pub struct ClusteringCoefficientComputation<EV> {
    _edges: PhantomData<fn() -> EV>,
}

impl<EV> ClusteringCoefficientComputation<EV> {
    pub fn new() -> Self {
        Self {
            _edges: PhantomData,
        }
    }
}

impl<EV> Default for ClusteringCoefficientComputation<EV> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn coefficient(triangles: u64, degree: usize) -> f64 {
    if degree < 2 {
        return 0.0;
    }
    let d = degree as f64;
    2.0 * triangles as f64 / (d * (d - 1.0))
}

impl<EV: Send + Sync + 'static> VertexCentricComputation<u64, f64, EV, u64>
    for ClusteringCoefficientComputation<EV>
{
    fn name(&self) -> &str {
        "clustering-coefficient"
    }

    fn compute(
        &self,
        ctx: &mut dyn VertexCentricComputeFuncContext<u64, f64, EV, u64>,
        mut messages: Messages<'_, u64>,
    ) -> VertexFlowResult<()> {
        if ctx.superstep() == 0 {
            let triangles = messages.next().copied().unwrap_or(0);
            let value = coefficient(triangles, ctx.num_edges());
            ctx.set_new_vertex_value(value);
        }
        ctx.vote_to_halt();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_degree_is_zero() {
        assert_eq!(coefficient(0, 0), 0.0);
        assert_eq!(coefficient(5, 1), 0.0);
    }

    #[test]
    fn full_neighborhood_is_one() {
        assert_eq!(coefficient(3, 3), 1.0);
        assert_eq!(coefficient(1, 3), 1.0 / 3.0);
    }
}
