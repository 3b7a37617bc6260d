//! A call-recording [`StorageBackend`] with fault injection.
//!
//! ```
//! use txbench_test::backend::{Call, RecordingBackend};
//! use txbench_workload::StorageBackend;
//!
//! let mut backend = RecordingBackend::new().fail_start();
//! assert!(backend.start_transaction().is_err());
//! assert_eq!(backend.calls(), [Call::StartTransaction]);
//! ```

use std::sync::Arc;

use bytes::Bytes;
use txbench_workload::{
    BackendError, BackendResult, FieldSet, FieldValueMap, InMemoryBackend, InMemoryStore,
    StorageBackend,
};

/// A single call observed by a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// `start_transaction()`
    StartTransaction,
    /// `commit_transaction()`
    CommitTransaction,
    /// `read(table, key, fields)`
    Read {
        table: String,
        key: String,
        fields: Option<FieldSet>,
    },
    /// `update(table, key, values)`
    Update {
        table: String,
        key: String,
        values: FieldValueMap,
    },
    /// `insert(table, key, values)`
    Insert {
        table: String,
        key: String,
        values: FieldValueMap,
    },
    /// `singleton_read(table, key, fields)`
    SingletonRead {
        table: String,
        key: String,
        fields: Option<FieldSet>,
    },
    /// `singleton_update(table, key, values)`
    SingletonUpdate {
        table: String,
        key: String,
        values: FieldValueMap,
    },
}

impl Call {
    /// Returns `true` for `start_transaction` and `commit_transaction`.
    pub fn is_bracket(&self) -> bool {
        matches!(self, Self::StartTransaction | Self::CommitTransaction)
    }

    /// Returns `true` for the ordinary statements `read`, `update` and `insert`.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Self::Read { .. } | Self::Update { .. } | Self::Insert { .. }
        )
    }

    /// The key this call operates on, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::StartTransaction | Self::CommitTransaction => None,
            Self::Read { key, .. }
            | Self::Update { key, .. }
            | Self::Insert { key, .. }
            | Self::SingletonRead { key, .. }
            | Self::SingletonUpdate { key, .. } => Some(key),
        }
    }
}

/// A backend that records every call before forwarding it to an in-memory store.
///
/// Faults are injected with the builder methods: a failing call is still recorded, but it is not
/// forwarded to the store.
#[derive(Debug)]
pub struct RecordingBackend {
    store: Arc<InMemoryStore>,
    inner: InMemoryBackend,
    calls: Vec<Call>,
    fail_start: bool,
    fail_commit: bool,
    fail_statements_after: Option<usize>,
    fail_singletons: bool,
}

impl RecordingBackend {
    /// Creates a backend on a fresh, empty store.
    pub fn new() -> Self {
        Self::on(InMemoryStore::new())
    }

    /// Creates a backend on an existing store.
    pub fn on(store: Arc<InMemoryStore>) -> Self {
        Self {
            inner: store.connect(),
            store,
            calls: Vec::new(),
            fail_start: false,
            fail_commit: false,
            fail_statements_after: None,
            fail_singletons: false,
        }
    }

    /// Makes every `start_transaction` fail.
    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Makes every `commit_transaction` fail. The open transaction is discarded.
    pub fn fail_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Makes every ordinary statement fail once `successes` statements have succeeded.
    pub fn fail_statements_after(mut self, successes: usize) -> Self {
        self.fail_statements_after = Some(successes);
        self
    }

    /// Makes every singleton operation fail with a server error.
    pub fn fail_singletons(mut self) -> Self {
        self.fail_singletons = true;
        self
    }

    /// Writes a record directly into the store without recording any calls.
    pub fn preload(&self, table: &str, key: &str, record: &FieldValueMap) {
        let mut handle = self.store.connect();
        handle
            .start_transaction()
            .and_then(|()| handle.insert(table, key, record))
            .and_then(|()| handle.commit_transaction())
            .expect("in-memory preload cannot fail");
    }

    /// The store behind this backend.
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Returns and clears the calls observed so far.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Returns `true` while a transaction is open on this handle.
    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn check_statement(&self) -> BackendResult<()> {
        let Some(successes) = self.fail_statements_after else {
            return Ok(());
        };

        let executed = self.calls.iter().filter(|call| call.is_statement()).count();
        // the current call is already recorded
        if executed > successes {
            return Err(server_error("injected statement failure"));
        }
        Ok(())
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for RecordingBackend {
    fn start_transaction(&mut self) -> BackendResult<()> {
        self.calls.push(Call::StartTransaction);
        if self.fail_start {
            return Err(BackendError::TransactionStart {
                context: "injected start failure".to_owned(),
            });
        }
        self.inner.start_transaction()
    }

    fn commit_transaction(&mut self) -> BackendResult<()> {
        self.calls.push(Call::CommitTransaction);
        if self.fail_commit {
            // release the transaction without applying it
            self.inner = self.store.connect();
            return Err(BackendError::TransactionCommit {
                context: "injected commit failure".to_owned(),
            });
        }
        self.inner.commit_transaction()
    }

    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap> {
        self.calls.push(Call::Read {
            table: table.to_owned(),
            key: key.to_owned(),
            fields: fields.cloned(),
        });
        self.check_statement()?;
        self.inner.read(table, key, fields)
    }

    fn update(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()> {
        self.calls.push(Call::Update {
            table: table.to_owned(),
            key: key.to_owned(),
            values: values.clone(),
        });
        self.check_statement()?;
        self.inner.update(table, key, values)
    }

    fn insert(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()> {
        self.calls.push(Call::Insert {
            table: table.to_owned(),
            key: key.to_owned(),
            values: values.clone(),
        });
        self.check_statement()?;
        self.inner.insert(table, key, values)
    }

    fn singleton_read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap> {
        self.calls.push(Call::SingletonRead {
            table: table.to_owned(),
            key: key.to_owned(),
            fields: fields.cloned(),
        });
        if self.fail_singletons {
            return Err(server_error("injected singleton failure"));
        }
        self.inner.singleton_read(table, key, fields)
    }

    fn singleton_update(
        &mut self,
        table: &str,
        key: &str,
        values: &FieldValueMap,
    ) -> BackendResult<()> {
        self.calls.push(Call::SingletonUpdate {
            table: table.to_owned(),
            key: key.to_owned(),
            values: values.clone(),
        });
        if self.fail_singletons {
            return Err(server_error("injected singleton failure"));
        }
        self.inner.singleton_update(table, key, values)
    }
}

fn server_error(context: &str) -> BackendError {
    BackendError::Server {
        context: context.to_owned(),
    }
}

/// Builds a record from `(field, value)` pairs.
pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> FieldValueMap {
    fields
        .into_iter()
        .map(|(field, value)| (field.to_owned(), Bytes::copy_from_slice(value.as_bytes())))
        .collect()
}
