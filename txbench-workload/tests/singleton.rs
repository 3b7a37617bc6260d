use std::collections::BTreeMap;
use std::sync::Arc;

use txbench_test::backend::{Call, RecordingBackend, record};
use txbench_workload::{KeySpace, Measurements, SingletonEngine, StorageBackend, WorkloadConfig};

/// A single preloaded key, `user5`, which every operation targets.
fn single_key(read_proportion: f64, true_singleton: bool) -> WorkloadConfig {
    WorkloadConfig {
        insert_start: 5,
        record_count: 1,
        singleton_proportion: 1.0,
        read_proportion,
        true_singleton,
        seed: Some(17),
        ..Default::default()
    }
}

fn engine(config: &WorkloadConfig) -> (SingletonEngine, Arc<Measurements>) {
    let measurements = Arc::new(Measurements::new());
    let engine =
        SingletonEngine::new(config, KeySpace::new(config), measurements.clone()).unwrap();
    (engine, measurements)
}

fn preloaded() -> RecordingBackend {
    let backend = RecordingBackend::new();
    backend.preload("usertable", "user5", &record([("field1", "A")]));
    backend
}

#[test]
fn fast_path_read_skips_transaction() {
    txbench_test::tracing::init();
    let (mut engine, measurements) = engine(&single_key(1.0, true));
    let mut backend = preloaded();

    assert!(engine.do_transaction(&mut backend));

    assert_eq!(
        backend.calls(),
        [Call::SingletonRead {
            table: "usertable".to_owned(),
            key: "user5".to_owned(),
            fields: None,
        }]
    );

    let snapshot = measurements.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].label, "SINGLETON");
    assert_eq!(snapshot[0].count, 1);
    assert_eq!(snapshot[0].failed(), 0);
}

#[test]
fn fast_path_read_of_one_field() {
    let (mut engine, _) = engine(&WorkloadConfig {
        read_all_fields: false,
        ..single_key(1.0, true)
    });
    let mut backend = preloaded();

    assert!(engine.do_transaction(&mut backend));

    let [Call::SingletonRead { fields: Some(fields), .. }] = backend.calls() else {
        panic!("unexpected calls: {:?}", backend.calls());
    };
    assert_eq!(fields.len(), 1);
}

#[test]
fn fast_path_inside_transaction_fails() {
    txbench_test::tracing::init();
    let (mut engine, measurements) = engine(&single_key(1.0, true));
    let mut backend = preloaded();
    backend.start_transaction().unwrap();
    backend.take_calls();

    assert!(!engine.do_transaction(&mut backend));

    assert_eq!(backend.calls().len(), 1);
    assert!(matches!(backend.calls()[0], Call::SingletonRead { .. }));
    assert!(backend.in_transaction());

    let snapshot = measurements.snapshot();
    assert_eq!(snapshot[0].label, "SINGLETON");
    assert_eq!(snapshot[0].count, 1);
    assert_eq!(snapshot[0].failures, BTreeMap::from([(-4, 1)]));
}

#[test]
fn fast_path_update_round_trips() {
    let (mut engine, measurements) = engine(&single_key(0.0, true));
    let mut backend = preloaded();

    assert!(engine.do_transaction(&mut backend));

    let [Call::SingletonUpdate { key, values, .. }] = backend.calls() else {
        panic!("unexpected calls: {:?}", backend.calls());
    };
    assert_eq!(key, "user5");
    assert_eq!(values.len(), 1);
    let values = values.clone();

    let stored = backend.singleton_read("usertable", "user5", None).unwrap();
    for (field, value) in &values {
        assert_eq!(stored.get(field), Some(value));
    }
    assert_eq!(measurements.snapshot()[0].count, 1);
}

#[test]
fn failed_fast_path_is_still_measured() {
    let (mut engine, measurements) = engine(&single_key(0.5, true));
    let mut backend = preloaded().fail_singletons();

    for _ in 0..10 {
        assert!(!engine.do_transaction(&mut backend));
    }

    assert!(backend.calls().iter().all(|call| !call.is_bracket()));
    let snapshot = measurements.snapshot();
    assert_eq!(snapshot[0].count, 10);
    assert_eq!(snapshot[0].failures, BTreeMap::from([(-1, 10)]));
}

#[test]
fn bracketed_path_wraps_statement() {
    let (mut engine, measurements) = engine(&single_key(1.0, false));
    let mut backend = preloaded();

    assert!(engine.do_transaction(&mut backend));

    assert_eq!(
        backend.calls(),
        [
            Call::StartTransaction,
            Call::Read {
                table: "usertable".to_owned(),
                key: "user5".to_owned(),
                fields: None,
            },
            Call::CommitTransaction,
        ]
    );
    assert_eq!(measurements.snapshot()[0].label, "SINGLETON");
}

#[test]
fn bracketed_update_is_committed() {
    let (mut engine, _) = engine(&single_key(0.0, false));
    let mut backend = preloaded();

    assert!(engine.do_transaction(&mut backend));

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    let Call::Update { values, .. } = &calls[1] else {
        panic!("unexpected calls: {calls:?}");
    };
    let stored = backend.store().get("usertable", "user5").unwrap();
    for (field, value) in values {
        assert_eq!(stored.get(field), Some(value));
    }
}

#[test]
fn bracketed_path_aborts_on_failed_start() {
    let (mut engine, measurements) = engine(&single_key(1.0, false));
    let mut backend = preloaded().fail_start();

    assert!(!engine.do_transaction(&mut backend));

    assert_eq!(backend.calls(), [Call::StartTransaction]);
    assert_eq!(
        measurements.snapshot()[0].failures,
        BTreeMap::from([(-2, 1)])
    );
}

#[test]
fn bracketed_path_commits_after_failed_statement() {
    let (mut engine, measurements) = engine(&single_key(1.0, false));
    let mut backend = preloaded().fail_statements_after(0);

    assert!(!engine.do_transaction(&mut backend));

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls.last(), Some(&Call::CommitTransaction));
    assert_eq!(
        measurements.snapshot()[0].failures,
        BTreeMap::from([(-1, 1)])
    );
}

#[test]
fn zero_singleton_proportion_runs_transactions() {
    let (mut engine, measurements) = engine(&WorkloadConfig {
        singleton_proportion: 0.0,
        read_proportion: 1.0,
        update_proportion: 0.0,
        seed: Some(4),
        ..Default::default()
    });
    let mut backend = RecordingBackend::new();

    for _ in 0..1000 {
        assert!(engine.do_transaction(&mut backend));
    }

    assert_eq!(backend.calls().len(), 3000);
    assert!(backend
        .calls()
        .iter()
        .all(|call| call.is_bracket() || call.is_statement()));

    let snapshot = measurements.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].label, "READ");
    assert_eq!(snapshot[0].count, 1000);
}

#[test]
fn batch_insert_stops_at_first_failure() {
    let (mut engine, measurements) = engine(&WorkloadConfig {
        insert_batch_size: 5,
        seed: Some(8),
        ..Default::default()
    });
    let mut backend = RecordingBackend::new().fail_statements_after(2);

    assert!(!engine.do_insert(&mut backend));

    let keys: Vec<_> = backend.calls().iter().filter_map(Call::key).collect();
    assert_eq!(keys, ["user0", "user1", "user2"]);
    assert_eq!(backend.calls().first(), Some(&Call::StartTransaction));
    assert_eq!(backend.calls().last(), Some(&Call::CommitTransaction));

    let snapshot = measurements.snapshot();
    assert_eq!(snapshot[0].label, "INSERT");
    assert_eq!(snapshot[0].failures, BTreeMap::from([(-1, 1)]));
}

#[test]
fn batch_insert_stops_at_end_of_load() {
    let config = WorkloadConfig {
        record_count: 7,
        insert_batch_size: 5,
        seed: Some(8),
        ..Default::default()
    };
    let keys = KeySpace::new(&config);
    let mut first =
        SingletonEngine::new(&config, keys.clone(), Arc::new(Measurements::new())).unwrap();
    let mut second =
        SingletonEngine::new(&config, keys.clone(), Arc::new(Measurements::new())).unwrap();
    let mut backend = RecordingBackend::new();

    assert!(first.do_insert(&mut backend));
    assert!(second.do_insert(&mut backend));
    assert!(keys.load_exhausted());

    let inserts = backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Insert { .. }))
        .count();
    assert_eq!(inserts, 7);
    assert_eq!(backend.store().len("usertable"), 7);
}

#[test]
fn insert_after_load_is_exhausted_is_a_no_op() {
    let (mut engine, measurements) = engine(&WorkloadConfig {
        record_count: 1,
        insert_batch_size: 4,
        seed: Some(8),
        ..Default::default()
    });
    let mut backend = RecordingBackend::new();

    assert!(engine.do_insert(&mut backend));
    assert_eq!(backend.take_calls().len(), 3);

    assert!(!engine.do_insert(&mut backend));
    assert!(backend.calls().is_empty());

    let snapshot = measurements.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].label, "INSERT");
    assert_eq!(snapshot[0].count, 1);
    assert_eq!(snapshot[0].failed(), 0);
    assert_eq!(backend.store().len("usertable"), 1);
}
