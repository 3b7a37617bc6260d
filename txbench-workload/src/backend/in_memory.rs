//! In-memory reference backend.
//!
//! An [`InMemoryStore`] is shared by all threads of a benchmark. Each thread connects its own
//! [`InMemoryBackend`] handle, which tracks the handle's open transaction and caches the tables it
//! has touched.
//!
//! Transactions buffer their writes and apply them on commit. Statements inside a transaction see
//! the transaction's own buffered writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{BackendError, BackendResult, FieldSet, FieldValueMap, StorageBackend};

type Rows = HashMap<String, FieldValueMap>;

/// A single table shared between all handles.
#[derive(Debug, Default)]
struct Table {
    rows: RwLock<Rows>,
}

impl Table {
    fn get(&self, key: &str) -> Option<FieldValueMap> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(key).cloned()
    }

    fn apply(&self, write: &Write) {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        write.apply_to(rows.entry(write.key.clone()).or_default());
    }
}

/// Storage shared by all [`InMemoryBackend`] handles.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Tables by name. The lock is only held while looking up or creating a table.
    tables: Mutex<HashMap<String, Arc<Table>>>,
    /// Timestamp oracle handing out start and commit timestamps.
    timestamps: AtomicU64,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// Creates a new handle for use by a single worker thread.
    pub fn connect(self: &Arc<Self>) -> InMemoryBackend {
        InMemoryBackend {
            store: Arc::clone(self),
            handles: HashMap::new(),
            transaction: None,
        }
    }

    /// Returns a committed record, bypassing any transaction.
    pub fn get(&self, table: &str, key: &str) -> Option<FieldValueMap> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.get(table)?.get(key)
    }

    /// Returns the number of committed records in a table.
    pub fn len(&self, table: &str) -> usize {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.get(table).map_or(0, |table| {
            table.rows.read().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    /// Returns `true` if no table holds any committed record.
    pub fn is_empty(&self) -> bool {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.values().all(|table| {
            table.rows.read().unwrap_or_else(PoisonError::into_inner).is_empty()
        })
    }

    /// The last timestamp handed out by the oracle.
    pub fn last_timestamp(&self) -> u64 {
        self.timestamps.load(Ordering::Relaxed)
    }

    fn next_timestamp(&self) -> u64 {
        self.timestamps.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn open_table(&self, name: &str) -> Arc<Table> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(name.to_owned()).or_default();
        Arc::clone(table)
    }
}

#[derive(Debug)]
enum WriteKind {
    /// Replaces the whole record.
    Insert,
    /// Merges fields into the existing record.
    Update,
}

#[derive(Debug)]
struct Write {
    table: Arc<Table>,
    key: String,
    values: FieldValueMap,
    kind: WriteKind,
}

impl Write {
    fn apply_to(&self, record: &mut FieldValueMap) {
        if let WriteKind::Insert = self.kind {
            record.clear();
        }
        record.extend(
            self.values
                .iter()
                .map(|(field, value)| (field.clone(), value.clone())),
        );
    }
}

#[derive(Debug)]
struct Transaction {
    start_timestamp: u64,
    writes: Vec<Write>,
}

/// A per-thread handle on an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryBackend {
    store: Arc<InMemoryStore>,
    /// Tables already opened by this handle.
    handles: HashMap<String, Arc<Table>>,
    transaction: Option<Transaction>,
}

impl InMemoryBackend {
    /// Returns `true` while a transaction is open on this handle.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn table(&mut self, name: &str) -> Arc<Table> {
        if let Some(table) = self.handles.get(name) {
            return Arc::clone(table);
        }

        tracing::trace!(table = name, "Opening table handle");
        let table = self.store.open_table(name);
        self.handles.insert(name.to_owned(), Arc::clone(&table));
        table
    }

    fn transaction(&mut self) -> BackendResult<&mut Transaction> {
        self.transaction.as_mut().ok_or(BackendError::NoTransaction)
    }

    fn buffer(
        &mut self,
        table: &str,
        key: &str,
        values: &FieldValueMap,
        kind: WriteKind,
    ) -> BackendResult<()> {
        let table = self.table(table);
        self.transaction()?.writes.push(Write {
            table,
            key: key.to_owned(),
            values: values.clone(),
            kind,
        });
        Ok(())
    }
}

fn project(record: Option<FieldValueMap>, fields: Option<&FieldSet>) -> FieldValueMap {
    let mut record = record.unwrap_or_default();
    if let Some(fields) = fields {
        record.retain(|field, _| fields.contains(field));
    }
    record
}

impl StorageBackend for InMemoryBackend {
    fn start_transaction(&mut self) -> BackendResult<()> {
        if self.transaction.is_some() {
            return Err(BackendError::TransactionAlreadyOpen);
        }

        self.transaction = Some(Transaction {
            start_timestamp: self.store.next_timestamp(),
            writes: Vec::new(),
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> BackendResult<()> {
        let transaction = self.transaction.take().ok_or(BackendError::NoTransaction)?;

        let commit_timestamp = self.store.next_timestamp();
        tracing::trace!(
            start_timestamp = transaction.start_timestamp,
            commit_timestamp,
            writes = transaction.writes.len(),
            "Committing transaction"
        );

        for write in &transaction.writes {
            write.table.apply(write);
        }
        Ok(())
    }

    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap> {
        let table = self.table(table);
        let transaction = self.transaction()?;

        let mut record = table.get(key);
        for write in &transaction.writes {
            if Arc::ptr_eq(&write.table, &table) && write.key == key {
                write.apply_to(record.get_or_insert_default());
            }
        }

        Ok(project(record, fields))
    }

    fn update(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()> {
        self.buffer(table, key, values, WriteKind::Update)
    }

    fn insert(&mut self, table: &str, key: &str, values: &FieldValueMap) -> BackendResult<()> {
        self.buffer(table, key, values, WriteKind::Insert)
    }

    fn singleton_read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> BackendResult<FieldValueMap> {
        if self.transaction.is_some() {
            tracing::error!("Client performed singleton read while in transaction context");
            return Err(BackendError::SingletonWhileInTransaction);
        }

        let table = self.table(table);
        Ok(project(table.get(key), fields))
    }

    fn singleton_update(
        &mut self,
        table: &str,
        key: &str,
        values: &FieldValueMap,
    ) -> BackendResult<()> {
        if self.transaction.is_some() {
            tracing::error!("Client performed singleton update while in transaction context");
            return Err(BackendError::SingletonWhileInTransaction);
        }

        let table = self.table(table);
        self.store.next_timestamp();
        table.apply(&Write {
            table: Arc::clone(&table),
            key: key.to_owned(),
            values: values.clone(),
            kind: WriteKind::Update,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use bytes::Bytes;

    use super::*;

    fn values(pairs: &[(&str, &str)]) -> FieldValueMap {
        pairs
            .iter()
            .map(|(field, value)| (field.to_string(), Bytes::copy_from_slice(value.as_bytes())))
            .collect()
    }

    #[test]
    fn writes_become_visible_on_commit() {
        let store = InMemoryStore::new();
        let mut db = store.connect();

        db.start_transaction().unwrap();
        db.insert("t", "user1", &values(&[("field0", "a")])).unwrap();
        assert_eq!(store.get("t", "user1"), None);

        // read-your-writes inside the transaction
        let record = db.read("t", "user1", None).unwrap();
        assert_eq!(record, values(&[("field0", "a")]));

        db.commit_transaction().unwrap();
        assert_eq!(store.get("t", "user1"), Some(values(&[("field0", "a")])));
        assert_eq!(store.len("t"), 1);
    }

    #[test]
    fn update_merges_and_insert_replaces() {
        let store = InMemoryStore::new();
        let mut db = store.connect();

        db.start_transaction().unwrap();
        db.insert("t", "k", &values(&[("f0", "a"), ("f1", "b")])).unwrap();
        db.update("t", "k", &values(&[("f1", "c")])).unwrap();
        db.commit_transaction().unwrap();
        assert_eq!(store.get("t", "k"), Some(values(&[("f0", "a"), ("f1", "c")])));

        db.start_transaction().unwrap();
        db.insert("t", "k", &values(&[("f2", "d")])).unwrap();
        db.commit_transaction().unwrap();
        assert_eq!(store.get("t", "k"), Some(values(&[("f2", "d")])));
    }

    #[test]
    fn read_projects_fields() {
        let store = InMemoryStore::new();
        let mut db = store.connect();
        db.singleton_update("t", "k", &values(&[("f0", "a"), ("f1", "b")]))
            .unwrap();

        let fields = FieldSet::from(["f1".to_owned()]);
        let record = db.singleton_read("t", "k", Some(&fields)).unwrap();
        assert_eq!(record, values(&[("f1", "b")]));

        // missing records read as empty
        let record = db.singleton_read("t", "missing", None).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn singleton_round_trip() {
        let store = InMemoryStore::new();
        let mut db = store.connect();

        db.singleton_update("t", "user5", &values(&[("field1", "A")]))
            .unwrap();
        let record = db.singleton_read("t", "user5", None).unwrap();
        assert_eq!(record, values(&[("field1", "A")]));
    }

    #[test]
    fn singleton_rejected_inside_transaction() {
        let store = InMemoryStore::new();
        let mut db = store.connect();

        db.start_transaction().unwrap();
        assert!(db.in_transaction());
        assert!(matches!(
            db.singleton_read("t", "k", None),
            Err(BackendError::SingletonWhileInTransaction)
        ));
        assert!(matches!(
            db.singleton_update("t", "k", &values(&[("f0", "a")])),
            Err(BackendError::SingletonWhileInTransaction)
        ));
        db.commit_transaction().unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn statements_require_transaction() {
        let store = InMemoryStore::new();
        let mut db = store.connect();

        assert!(matches!(
            db.read("t", "k", None),
            Err(BackendError::NoTransaction)
        ));
        assert!(matches!(
            db.insert("t", "k", &values(&[])),
            Err(BackendError::NoTransaction)
        ));
        assert!(matches!(
            db.commit_transaction(),
            Err(BackendError::NoTransaction)
        ));

        db.start_transaction().unwrap();
        assert!(matches!(
            db.start_transaction(),
            Err(BackendError::TransactionAlreadyOpen)
        ));
    }

    #[test]
    fn handles_share_tables_across_threads() {
        let store = InMemoryStore::new();

        thread::scope(|scope| {
            for worker in 0..4 {
                let mut db = store.connect();
                scope.spawn(move || {
                    for i in 0..100 {
                        db.start_transaction().unwrap();
                        let key = format!("user{}", worker * 100 + i);
                        db.insert("t", &key, &values(&[("f0", "x")])).unwrap();
                        db.commit_transaction().unwrap();
                    }
                });
            }
        });

        assert_eq!(store.len("t"), 400);
        // one start and one commit timestamp per transaction
        assert_eq!(store.last_timestamp(), 800);
    }
}
