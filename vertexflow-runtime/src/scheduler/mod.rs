pub mod partition_worker;
pub mod superstep_coordinator;
