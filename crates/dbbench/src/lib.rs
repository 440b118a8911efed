//! dbbench - workload benchmark harness for key-value storage engines.
//!
//! The harness runs an ordered list of named workloads (sequential and random
//! fills, forward/reverse/random reads, compaction, heap profiling) against a
//! [`dbbench_engine::StorageEngine`], timing each one with a [`bench::Recorder`]
//! and printing a fixed-width report line per workload.

pub mod bench;
pub mod cli;
pub mod config;
pub mod generator;
pub mod results;
