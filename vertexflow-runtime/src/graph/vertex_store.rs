use std::collections::hash_map::Entry;
use std::collections::HashMap;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};
use vertexflow_common::types::{Edge, VertexInput, VertexKey};

#[derive(Debug, Clone)]
pub struct VertexRecord<K, VV, EV> {
    pub value: VV,
    pub edges: Vec<Edge<K, EV>>,
    pub halted: bool,
}

impl<K, VV, EV> VertexRecord<K, VV, EV> {
    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }
}

#[derive(Debug)]
pub struct VertexStore<K, VV, EV> {
    records: HashMap<K, VertexRecord<K, VV, EV>>,
}

impl<K, VV, EV> Default for VertexStore<K, VV, EV> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<K: VertexKey, VV, EV> VertexStore<K, VV, EV> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, input: VertexInput<K, VV, EV>) -> VertexFlowResult<()> {
        match self.records.entry(input.id) {
            Entry::Occupied(e) => Err(VertexFlowError::InvalidArgument(format!(
                "vertex {:?} loaded twice",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(VertexRecord {
                    value: input.value,
                    edges: input.edges,
                    halted: false,
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &K) -> VertexFlowResult<&VertexRecord<K, VV, EV>> {
        self.records.get(id).ok_or_else(|| not_owned(id))
    }

    pub fn set_value(&mut self, id: &K, value: VV) -> VertexFlowResult<()> {
        let record = self.records.get_mut(id).ok_or_else(|| not_owned(id))?;
        record.value = value;
        Ok(())
    }

    /// Returns whether the vertex was halted before the call.
    pub fn reactivate(&mut self, id: &K) -> VertexFlowResult<bool> {
        let record = self.records.get_mut(id).ok_or_else(|| not_owned(id))?;
        Ok(std::mem::replace(&mut record.halted, false))
    }

    pub fn contains(&self, id: &K) -> bool {
        self.records.contains_key(id)
    }

    pub fn is_active(&self, id: &K) -> bool {
        self.records.get(id).is_some_and(|r| !r.halted)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.records.values().filter(|r| !r.halted).count()
    }

    pub fn values(&self) -> impl Iterator<Item = (&K, &VV)> {
        self.records.iter().map(|(k, r)| (k, &r.value))
    }

    pub fn into_values(self) -> impl Iterator<Item = (K, VV)> {
        self.records.into_iter().map(|(k, r)| (k, r.value))
    }

    pub(crate) fn records_mut(&mut self) -> &mut HashMap<K, VertexRecord<K, VV, EV>> {
        &mut self.records
    }
}

fn not_owned<K: std::fmt::Debug>(id: &K) -> VertexFlowError {
    VertexFlowError::NotFound(format!("vertex {id:?} is not owned by this partition"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VertexStore<u64, u64, ()> {
        let mut s = VertexStore::new();
        s.insert(VertexInput::new(1, 10, vec![Edge::new(2, ())]))
            .unwrap();
        s.insert(VertexInput::isolated(2, 20)).unwrap();
        s
    }

    #[test]
    fn loaded_vertices_start_active() {
        let s = store();
        assert_eq!(s.len(), 2);
        assert_eq!(s.active_count(), 2);
        assert_eq!(s.get(&1).unwrap().edges.len(), 1);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut s = store();
        assert!(matches!(s.get(&9), Err(VertexFlowError::NotFound(_))));
        assert!(matches!(s.set_value(&9, 0), Err(VertexFlowError::NotFound(_))));
        assert!(s.reactivate(&9).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut s = store();
        assert!(s.insert(VertexInput::isolated(1, 0)).is_err());
    }

    #[test]
    fn halt_and_reactivate() {
        let mut s = store();
        s.records_mut().get_mut(&1).unwrap().set_halted(true);
        assert!(!s.is_active(&1));
        assert_eq!(s.active_count(), 1);
        assert!(s.reactivate(&1).unwrap());
        assert!(!s.reactivate(&1).unwrap());
        assert!(s.is_active(&1));
    }

    #[test]
    fn resumed_vote_keeps_vertex_active() {
        let mut s = store();
        let record = s.records_mut().get_mut(&2).unwrap();
        record.set_halted(true);
        record.set_halted(false);
        assert!(s.is_active(&2));
        assert_eq!(s.active_count(), 2);
    }

    #[test]
    fn set_value_is_in_place() {
        let mut s = store();
        s.set_value(&2, 99).unwrap();
        assert_eq!(s.get(&2).unwrap().value, 99);
    }
}
