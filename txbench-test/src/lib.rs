//! Test utilities for the txbench workspace.
//!
//! This crate provides utilities to facilitate testing the workload engines and the driver. See
//! the modules for all available utilities.

pub mod backend;
pub mod tracing;
