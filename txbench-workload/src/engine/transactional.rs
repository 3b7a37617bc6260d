use std::sync::Arc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use super::{Statement, elapsed_micros, in_transaction};
use crate::backend::{BackendResult, FieldSet, FieldValueMap, StorageBackend};
use crate::choice::WeightedChoice;
use crate::config::WorkloadConfig;
use crate::error::Result;
use crate::generator::KeySpace;
use crate::measure::MeasurementSink;
use crate::synth::KeyValueSynthesizer;

/// Runs every logical operation as an ordinary transaction.
///
/// Each call to [`do_transaction`](Self::do_transaction) draws a statement type from the
/// configured read/update/insert/read-modify-write mix, runs
/// [`transaction_length`](WorkloadConfig::transaction_length) statements of that type between
/// `start_transaction` and `commit_transaction`, and records the elapsed time under the
/// statement's label.
#[derive(Debug)]
pub struct TransactionalEngine {
    table: String,
    read_all_fields: bool,
    write_all_fields: bool,
    transaction_length: usize,
    operations: WeightedChoice<Statement>,
    synth: KeyValueSynthesizer,
    rng: SmallRng,
    measurements: Arc<dyn MeasurementSink>,
}

impl TransactionalEngine {
    /// Creates an engine for one worker thread.
    ///
    /// Fails if the configuration is invalid or its operation mix has no positive weight.
    pub fn new(
        config: &WorkloadConfig,
        keys: KeySpace,
        measurements: Arc<dyn MeasurementSink>,
    ) -> Result<Self> {
        config.validate()?;

        let mut operations = WeightedChoice::builder();
        let mix = [
            (config.read_proportion, Statement::Read),
            (config.update_proportion, Statement::Update),
            (config.insert_proportion, Statement::Insert),
            (
                config.read_modify_write_proportion,
                Statement::ReadModifyWrite,
            ),
        ];
        for (proportion, statement) in mix {
            if proportion > 0.0 {
                operations = operations.add_value(proportion, statement);
            }
        }
        let operations = operations.build()?;

        let mut rng = SmallRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let synth = KeyValueSynthesizer::new(config, keys, rng.next_u64())?;

        Ok(Self {
            table: config.table.clone(),
            read_all_fields: config.read_all_fields,
            write_all_fields: config.write_all_fields,
            transaction_length: config.transaction_length,
            operations,
            synth,
            rng,
            measurements,
        })
    }

    /// Inserts the next key of the load phase in its own transaction.
    ///
    /// Returns `false` if the insert failed or the load phase is already exhausted.
    pub fn do_insert<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> bool {
        self.insert_batch(db, 1).unwrap_or(false)
    }

    /// Runs one logical operation as an ordinary transaction.
    ///
    /// Returns `false` if the transaction could not be started, a statement failed, or the
    /// commit failed.
    pub fn do_transaction<B: StorageBackend + ?Sized>(&mut self, db: &mut B) -> bool {
        let statement = *self.operations.next(&mut self.rng);

        let start = Instant::now();
        let length = self.transaction_length;
        let status = in_transaction(db, |db| {
            for _ in 0..length {
                self.execute(db, statement)?;
            }
            Ok(())
        });

        self.finish(statement.label(), start, status)
    }

    /// The synthesizer feeding this engine.
    pub fn synthesizer(&self) -> &KeyValueSynthesizer {
        &self.synth
    }

    /// Inserts up to `batch_size` keys of the load phase inside one transaction.
    ///
    /// The batch stops early at the first failed insert or once the load phase is exhausted. If
    /// no key is left to claim, returns `None` without touching the backend or recording a
    /// latency sample.
    pub(crate) fn insert_batch<B: StorageBackend + ?Sized>(
        &mut self,
        db: &mut B,
        batch_size: usize,
    ) -> Option<bool> {
        let Some(first) = self.synth.keys().next_load_key() else {
            tracing::trace!("Load phase exhausted, skipping insert");
            return None;
        };

        let start = Instant::now();
        let status = in_transaction(db, |db| {
            let mut keynum = first;
            for slot in 0..batch_size {
                if slot > 0 {
                    match self.synth.keys().next_load_key() {
                        Some(next) => keynum = next,
                        None => break,
                    }
                }
                let key = self.synth.build_key_name(keynum);
                let values = self.synth.build_values();
                db.insert(&self.table, &key, &values)?;
            }
            Ok(())
        });

        Some(self.finish(Statement::Insert.label(), start, status))
    }

    /// Records the outcome of one logical operation and folds it into a `bool`.
    pub(crate) fn finish(&self, label: &str, start: Instant, status: BackendResult<()>) -> bool {
        self.measurements.record(label, elapsed_micros(start), &status);

        match status {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(label, code = err.code(), error = %err, "Operation failed");
                false
            }
        }
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Chooses the key and fields of the next read.
    pub(crate) fn read_target(&mut self) -> (String, Option<FieldSet>) {
        let keynum = self.synth.next_keynum();
        let key = self.synth.build_key_name(keynum);
        let fields = (!self.read_all_fields).then(|| self.synth.build_field_set());
        (key, fields)
    }

    /// Chooses the key and payload of the next update.
    pub(crate) fn update_target(&mut self) -> (String, FieldValueMap) {
        let keynum = self.synth.next_keynum();
        let key = self.synth.build_key_name(keynum);
        (key, self.update_values())
    }

    fn update_values(&mut self) -> FieldValueMap {
        if self.write_all_fields {
            self.synth.build_values()
        } else {
            self.synth.build_update()
        }
    }

    fn execute<B: StorageBackend + ?Sized>(
        &mut self,
        db: &mut B,
        statement: Statement,
    ) -> BackendResult<()> {
        match statement {
            Statement::Read => {
                let (key, fields) = self.read_target();
                db.read(&self.table, &key, fields.as_ref())?;
            }
            Statement::Update => {
                let (key, values) = self.update_target();
                db.update(&self.table, &key, &values)?;
            }
            Statement::Insert => {
                let keynum = self.synth.keys().transaction.next();
                let key = self.synth.build_key_name(keynum);
                let values = self.synth.build_values();
                db.insert(&self.table, &key, &values)?;
            }
            Statement::ReadModifyWrite => {
                let (key, fields) = self.read_target();
                db.read(&self.table, &key, fields.as_ref())?;
                let values = self.update_values();
                db.update(&self.table, &key, &values)?;
            }
        }
        Ok(())
    }
}
