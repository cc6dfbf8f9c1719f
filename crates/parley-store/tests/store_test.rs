mod common;

use std::sync::Arc;

use parley_store::{Adapter, Registries, Store, StoreConfig, StoreError};

use common::{MemoryAdapter, UID_KEY, config};

#[test]
fn open_connects_and_checks_version() {
    let adapter = MemoryAdapter::new();
    let store = Store::open(adapter.clone(), 3, &config(), Arc::new(Registries::new())).unwrap();

    assert!(store.is_open());
    assert_eq!(store.adapter_name(), "memory");
    assert_eq!(adapter.calls(), vec!["open", "check_db_version"]);

    store.close().unwrap();
    assert!(!store.is_open());
}

#[test]
fn debug_shows_adapter_and_worker() {
    let store = Store::open(MemoryAdapter::new(), 3, &config(), Arc::new(Registries::new())).unwrap();

    let shown = format!("{:?}", store);
    assert!(shown.starts_with("Store {"));
    assert!(shown.contains(r#"adapter: "memory""#));
    assert!(shown.contains("worker_id: 3"));
}

#[test]
fn open_rejects_bad_uid_key() {
    let adapter = MemoryAdapter::new();
    let config = StoreConfig {
        uid_key: "c2hvcnQ=".into(),
        ..Default::default()
    };

    let err = Store::open(adapter.clone(), 1, &config, Arc::new(Registries::new())).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
    assert!(adapter.calls().is_empty());
}

#[test]
fn open_rejects_out_of_range_worker() {
    let adapter = MemoryAdapter::new();
    let err = Store::open(adapter, 5000, &config(), Arc::new(Registries::new())).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

#[test]
fn open_rejects_other_adapter() {
    let adapter = MemoryAdapter::new();
    let config = StoreConfig {
        uid_key: UID_KEY.into(),
        use_adapter: Some("sqlite".into()),
        ..Default::default()
    };

    let err = Store::open(adapter, 1, &config, Arc::new(Registries::new())).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

#[test]
fn open_twice_is_config_error() {
    let adapter = MemoryAdapter::new();
    adapter.open("").unwrap();

    let err = Store::open(adapter, 1, &config(), Arc::new(Registries::new())).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

#[test]
fn version_mismatch_is_returned() {
    let adapter = MemoryAdapter::new();
    adapter.fail("check_db_version");

    let err = Store::open(adapter, 1, &config(), Arc::new(Registries::new())).unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
}

#[test]
fn init_db_opens_when_needed() {
    let adapter = MemoryAdapter::new();
    Store::init_db(adapter.as_ref(), &config(), true).unwrap();

    assert_eq!(adapter.calls(), vec!["open", "create_db"]);
}

#[test]
fn uids_are_unique_and_decodable() {
    let h = common::harness();

    let a = h.store.get_uid().unwrap();
    let b = h.store.get_uid().unwrap();
    assert_ne!(a, b);

    let raw = h.store.decode_uid(a);
    assert!(raw > 0);
    assert_eq!(h.store.encode_uid(raw), a);

    let text = h.store.get_uid_string().unwrap();
    assert_eq!(text.len(), 11);
}
