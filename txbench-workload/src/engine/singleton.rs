use std::sync::Arc;
use std::time::Instant;

use super::{SINGLETON_LABEL, TransactionalEngine, in_transaction};
use crate::backend::{BackendResult, StorageBackend};
use crate::choice::WeightedChoice;
use crate::config::WorkloadConfig;
use crate::error::Result;
use crate::generator::KeySpace;
use crate::measure::MeasurementSink;

/// Outer choice of every logical operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Category {
    Singleton,
    Transaction,
}

/// Statement of a singleton operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SingletonOp {
    Read,
    Update,
}

/// Mixes singleton operations with ordinary transactions.
///
/// Every logical operation first chooses between a singleton operation, with weight
/// [`singleton_proportion`](WorkloadConfig::singleton_proportion), and an ordinary transaction,
/// which is delegated to the embedded [`TransactionalEngine`].
///
/// A singleton operation is a read, with weight [`read_proportion`](WorkloadConfig::read_proportion),
/// or an update of a single record. With [`true_singleton`](WorkloadConfig::true_singleton) it
/// goes through the backend's atomic `singleton_read` / `singleton_update`. Otherwise the
/// ordinary statement is wrapped in its own transaction. All singleton operations are measured
/// under the `"SINGLETON"` label.
#[derive(Debug)]
pub struct SingletonEngine {
    base: TransactionalEngine,
    categories: WeightedChoice<Category>,
    operations: WeightedChoice<SingletonOp>,
    true_singleton: bool,
    insert_batch_size: usize,
}

impl SingletonEngine {
    /// Creates an engine for one worker thread.
    pub fn new(
        config: &WorkloadConfig,
        keys: KeySpace,
        measurements: Arc<dyn MeasurementSink>,
    ) -> Result<Self> {
        let singleton = config.singleton_proportion;
        let mut categories = WeightedChoice::builder();
        if singleton > 0.0 {
            categories = categories.add_value(singleton, Category::Singleton);
        }
        let categories = categories
            .add_value(1.0 - singleton, Category::Transaction)
            .build()?;

        let base = TransactionalEngine::new(config, keys, measurements)?;

        let read = config.read_proportion;
        let mut operations = WeightedChoice::builder();
        if read > 0.0 {
            operations = operations.add_value(read, SingletonOp::Read);
        }
        let operations = operations
            .add_value(1.0 - read, SingletonOp::Update)
            .build()?;

        if !config.true_singleton {
            tracing::debug!("Singleton operations run inside explicit transactions");
        }

        Ok(Self {
            base,
            categories,
            operations,
            true_singleton: config.true_singleton,
            insert_batch_size: config.insert_batch_size,
        })
    }

    /// The engine running ordinary transactions.
    pub fn base(&self) -> &TransactionalEngine {
        &self.base
    }

    /// Inserts the next batch of load-phase keys inside one transaction.
    ///
    /// The batch holds up to [`insert_batch_size`](WorkloadConfig::insert_batch_size) keys and
    /// stops at the first failed insert. Returns `false` if an insert failed or the load phase is
    /// already exhausted.
    pub fn do_insert<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> bool {
        self.load_batch(db).unwrap_or(false)
    }

    pub(crate) fn load_batch<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> Option<bool> {
        self.base.insert_batch(db, self.insert_batch_size)
    }

    /// Runs one logical operation: either a singleton operation or an ordinary transaction.
    pub fn do_transaction<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> bool {
        let category = *self.categories.next(self.base.rng());
        match category {
            Category::Transaction => self.base.do_transaction(db),
            Category::Singleton => {
                let start = Instant::now();
                let status = self.do_singleton(db);
                self.base.finish(SINGLETON_LABEL, start, status)
            }
        }
    }

    fn do_singleton<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> BackendResult<()> {
        let operation = *self.operations.next(self.base.rng());
        match operation {
            SingletonOp::Read => self.singleton_read(db),
            SingletonOp::Update => self.singleton_update(db),
        }
    }

    fn singleton_read<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> BackendResult<()> {
        let (key, fields) = self.base.read_target();
        let table = self.base.table();

        if self.true_singleton {
            db.singleton_read(table, &key, fields.as_ref())?;
            Ok(())
        } else {
            in_transaction(db, |db| {
                db.read(table, &key, fields.as_ref())?;
                Ok(())
            })
        }
    }

    fn singleton_update<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> BackendResult<()> {
        let (key, values) = self.base.update_target();
        let table = self.base.table();

        if self.true_singleton {
            db.singleton_update(table, &key, &values)
        } else {
            in_transaction(db, |db| db.update(table, &key, &values))
        }
    }
}
