//! The txbench benchmark driver.
//!
//! This builds on top of [`txbench-workload`] and runs its engines against the in-memory
//! reference store, one worker thread per configured client. The driver loads the keyspace,
//! optionally runs the measured transaction phase, and prints a latency summary per operation
//! label.
//!
//! [`txbench-workload`]: txbench_workload
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bench;
pub mod cli;
pub mod config;
pub mod observability;
pub mod report;
