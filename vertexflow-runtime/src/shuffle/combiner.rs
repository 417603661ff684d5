use std::collections::BTreeSet;
use std::ops::Add;
use vertexflow_api::function::MessageCombiner;

/// Keeps the smallest message (WCC labels, BFS distances).
#[derive(Debug, Clone, Copy, Default)]
pub struct MinCombiner;

impl<M> MessageCombiner<M> for MinCombiner
where
    M: Ord + Send + Sync + 'static,
{
    fn combine(&self, existing: M, incoming: M) -> M {
        existing.min(incoming)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombiner;

impl<M> MessageCombiner<M> for SumCombiner
where
    M: Add<Output = M> + Send + Sync + 'static,
{
    fn combine(&self, existing: M, incoming: M) -> M {
        existing + incoming
    }
}

/// Unions id sets (reachability propagation).
#[derive(Debug, Clone, Copy, Default)]
pub struct SetUnionCombiner;

impl<T> MessageCombiner<BTreeSet<T>> for SetUnionCombiner
where
    T: Ord + Send + Sync + 'static,
{
    fn combine(&self, existing: BTreeSet<T>, incoming: BTreeSet<T>) -> BTreeSet<T> {
        let (mut big, small) = if existing.len() >= incoming.len() {
            (existing, incoming)
        } else {
            (incoming, existing)
        };
        big.extend(small);
        big
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_folds_in_any_order() {
        let c = MinCombiner;
        let a = [5u64, 3, 8].into_iter().reduce(|x, y| c.combine(x, y));
        let b = [8u64, 5, 3].into_iter().reduce(|x, y| c.combine(x, y));
        assert_eq!(a, Some(3));
        assert_eq!(a, b);
    }

    #[test]
    fn set_union_keeps_every_id() {
        let c = SetUnionCombiner;
        let merged = c.combine(BTreeSet::from([1u64, 2]), BTreeSet::from([2, 3, 4]));
        assert_eq!(merged, BTreeSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn sum_adds() {
        assert_eq!(SumCombiner.combine(2i64, 40), 42);
    }
}
