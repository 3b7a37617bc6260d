//! The storage contract driven by the workload engines.
//!
//! Every benchmarked store implements [`StorageBackend`]. One backend handle is owned by exactly
//! one worker thread, so operations take `&mut self` and may keep per-handle state such as the
//! currently open transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use bytes::Bytes;
use thiserror::Error;

pub mod in_memory;

/// Field names to read from a record. `None` in place of a set means "all fields".
pub type FieldSet = BTreeSet<String>;

/// Field values of a record, keyed by field name.
pub type FieldValueMap = BTreeMap<String, Bytes>;

/// A store that can be benchmarked by the workload engines.
///
/// Ordinary statements ([`read`](Self::read), [`update`](Self::update),
/// [`insert`](Self::insert)) are only valid between a successful
/// [`start_transaction`](Self::start_transaction) and the matching
/// [`commit_transaction`](Self::commit_transaction). At most one transaction is open per handle.
///
/// The singleton operations are an atomic fast path for a single statement. They must not be
/// called while a transaction is open and fail with
/// [`BackendError::SingletonWhileInTransaction`] if they are.
pub trait StorageBackend: Debug + Send {
    /// Opens a transaction on this handle.
    fn start_transaction(&mut self) -> BackendResult<()>;

    /// Commits the open transaction.
    fn commit_transaction(&mut self) -> BackendResult<()>;

    /// Reads the given fields of a record, or all fields if `fields` is `None`.
    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap>;

    /// Overwrites the given fields of a record, keeping all other fields.
    fn update(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()>;

    /// Inserts a record, replacing any previous record with the same key.
    fn insert(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()>;

    /// Reads a record outside of any transaction.
    fn singleton_read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap>;

    /// Updates a record outside of any transaction.
    fn singleton_update(
        &mut self,
        table: &str,
        key: &str,
        values: &FieldValueMap,
    ) -> BackendResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn start_transaction(&mut self) -> BackendResult<()> {
        (**self).start_transaction()
    }

    fn commit_transaction(&mut self) -> BackendResult<()> {
        (**self).commit_transaction()
    }

    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap> {
        (**self).read(table, key, fields)
    }

    fn update(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()> {
        (**self).update(table, key, values)
    }

    fn insert(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()> {
        (**self).insert(table, key, values)
    }

    fn singleton_read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap> {
        (**self).singleton_read(table, key, fields)
    }

    fn singleton_update(
        &mut self,
        table: &str,
        key: &str,
        values: &FieldValueMap,
    ) -> BackendResult<()> {
        (**self).singleton_update(table, key, values)
    }
}

/// Failure of a single backend call.
///
/// The engines treat every variant as "this logical operation failed" and carry on with the
/// benchmark. [`code`](Self::code) gives each variant a stable numeric status for reporting.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A transaction could not be started, e.g. because no start timestamp was obtained.
    #[error("failed to start transaction: {context}")]
    TransactionStart {
        /// What went wrong.
        context: String,
    },

    /// The open transaction could not be committed.
    #[error("failed to commit transaction: {context}")]
    TransactionCommit {
        /// What went wrong.
        context: String,
    },

    /// A transactional statement or commit was issued without an open transaction.
    #[error("no transaction is open")]
    NoTransaction,

    /// A transaction was started while another one is still open on the same handle.
    #[error("a transaction is already open")]
    TransactionAlreadyOpen,

    /// A singleton operation was issued while a transaction is open on the same handle.
    ///
    /// This indicates a bug in the caller rather than a problem with the store.
    #[error("singleton operation issued while in transaction context")]
    SingletonWhileInTransaction,

    /// Any other failure reported by the store.
    #[error("storage backend error: {context}")]
    Server {
        /// What went wrong.
        context: String,
    },
}

impl BackendError {
    /// Numeric status code of this error. Success is `0`; every error is non-zero.
    pub fn code(&self) -> i32 {
        match self {
            Self::Server { .. } => -1,
            Self::TransactionStart { .. } => -2,
            Self::TransactionCommit { .. } => -3,
            Self::SingletonWhileInTransaction => -4,
            Self::NoTransaction => -5,
            Self::TransactionAlreadyOpen => -6,
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Numeric status of a backend result: `0` on success, the error's [`code`](BackendError::code)
/// otherwise.
pub fn status_code<T>(result: &BackendResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.code(),
    }
}
