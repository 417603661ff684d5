pub mod aggregate;
pub mod algorithms;
pub mod distributed;
pub mod graph;
pub mod io;
pub mod job;
pub mod observability;
pub mod plan;
pub mod scheduler;
pub mod shuffle;
