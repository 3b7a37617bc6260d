//! Workload engines turning an operation mix into backend calls.
//!
//! Each logical operation is one call to [`WorkloadEngine::do_transaction`] (measured phase) or
//! [`WorkloadEngine::do_insert`] (load phase). Backend failures never unwind out of an engine:
//! they are logged, reported to the measurement sink and folded into the returned `bool`.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendResult, StorageBackend};
use crate::config::WorkloadConfig;
use crate::error::Result;
use crate::generator::KeySpace;
use crate::measure::MeasurementSink;

mod singleton;
mod transactional;

pub use singleton::SingletonEngine;
pub use transactional::TransactionalEngine;

/// Latency label of singleton operations.
pub const SINGLETON_LABEL: &str = "SINGLETON";

/// The statement types of ordinary transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Read one record.
    Read,
    /// Update one record.
    Update,
    /// Insert a new record.
    Insert,
    /// Read one record and update it within the same transaction.
    ReadModifyWrite,
}

impl Statement {
    /// The latency label of this statement type.
    pub fn label(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Insert => "INSERT",
            Self::ReadModifyWrite => "READ-MODIFY-WRITE",
        }
    }
}

/// Runs `body` inside a transaction on `db`.
///
/// If the transaction cannot be started, `body` is not run and no commit is issued. Otherwise
/// the transaction is always committed, even if `body` failed. The first error wins.
pub(crate) fn in_transaction<B, F>(db: &mut B, body: F) -> BackendResult<()>
where
    B: StorageBackend + ?Sized,
    F: FnOnce(&mut B) -> BackendResult<()>,
{
    db.start_transaction()?;
    let outcome = body(db);
    let committed = db.commit_transaction();
    outcome.and(committed)
}

/// Microseconds elapsed since `start`.
pub(crate) fn elapsed_micros(start: Instant) -> u64 {
    start.elapsed().as_micros().try_into().unwrap_or(u64::MAX)
}

/// Selects the engine driving a benchmark.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Only ordinary transactions, see [`TransactionalEngine`].
    Transactional,
    /// Singleton operations mixed with ordinary transactions, see [`SingletonEngine`].
    #[default]
    Singleton,
}

/// Either of the two engines, selected by configuration.
#[derive(Debug)]
pub enum WorkloadEngine {
    /// Ordinary transactions only.
    Transactional(TransactionalEngine),
    /// A mix of singleton operations and ordinary transactions.
    Singleton(SingletonEngine),
}

impl WorkloadEngine {
    /// Creates an engine of the given kind.
    pub fn new(
        kind: EngineKind,
        config: &WorkloadConfig,
        keys: KeySpace,
        measurements: Arc<dyn MeasurementSink>,
    ) -> Result<Self> {
        Ok(match kind {
            EngineKind::Transactional => {
                TransactionalEngine::new(config, keys, measurements)?.into()
            }
            EngineKind::Singleton => SingletonEngine::new(config, keys, measurements)?.into(),
        })
    }

    /// Runs one load-phase insert call.
    pub fn do_insert<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> bool {
        match self {
            Self::Transactional(engine) => engine.do_insert(db),
            Self::Singleton(engine) => engine.do_insert(db),
        }
    }

    /// Runs one load-phase insert call, or returns `None` without any backend call once the load
    /// phase is exhausted.
    pub fn load_batch<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> Option<bool> {
        match self {
            Self::Transactional(engine) => engine.insert_batch(db, 1),
            Self::Singleton(engine) => engine.load_batch(db),
        }
    }

    /// Runs one measured logical operation.
    pub fn do_transaction<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> bool {
        match self {
            Self::Transactional(engine) => engine.do_transaction(db),
            Self::Singleton(engine) => engine.do_transaction(db),
        }
    }

    /// Returns `true` once the load phase has inserted all of its records.
    pub fn load_complete(&self) -> bool {
        let base = match self {
            Self::Transactional(engine) => engine,
            Self::Singleton(engine) => engine.base(),
        };
        base.synthesizer().keys().load_exhausted()
    }
}

impl From<TransactionalEngine> for WorkloadEngine {
    fn from(engine: TransactionalEngine) -> Self {
        Self::Transactional(engine)
    }
}

impl From<SingletonEngine> for WorkloadEngine {
    fn from(engine: SingletonEngine) -> Self {
        Self::Singleton(engine)
    }
}
