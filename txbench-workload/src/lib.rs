//! A transactional workload engine for benchmarking key-value storage backends.
//!
//! Client threads each own a private engine which repeatedly picks an operation from a
//! configured probability mix, synthesizes keys and values, drives a [`StorageBackend`] and
//! records per-operation latency into a [`MeasurementSink`].
//!
//! Two engines are provided:
//!
//! - [`TransactionalEngine`] chooses between reads, updates, inserts and read-modify-writes and
//!   brackets every statement with `start_transaction` / `commit_transaction`.
//! - [`SingletonEngine`] first decides between a *singleton* operation and an ordinary
//!   transaction. Singleton operations either use the backend's atomic fast path or an explicit
//!   begin/commit pair, depending on [`WorkloadConfig::true_singleton`].
//!
//! The [`InMemoryStore`] backend serves as the reference implementation of the storage contract.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod choice;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod measure;
pub mod synth;

pub use crate::backend::in_memory::{InMemoryBackend, InMemoryStore};
pub use crate::backend::{BackendError, BackendResult, FieldSet, FieldValueMap, StorageBackend};
pub use crate::choice::WeightedChoice;
pub use crate::config::WorkloadConfig;
pub use crate::engine::{EngineKind, SingletonEngine, TransactionalEngine, WorkloadEngine};
pub use crate::error::ConfigError;
pub use crate::generator::{KeySequence, KeySpace};
pub use crate::measure::{MeasurementSink, Measurements};
pub use crate::synth::KeyValueSynthesizer;
