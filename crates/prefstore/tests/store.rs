//! End-to-end behavior of a store over real and fault-injecting backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prefstore::backend::{MemoryBackend, SqliteBackend};
use prefstore::{
    DefaultSchema, FlushConfig, ReadyState, Store, StoreConfig, StoreError, TypedValue,
};
use prefstore_testkit::fixtures::{counter_schema, init_tracing, FlakyBackend, TestFixture};
use prefstore_testkit::generators::{key, mismatched_pair, namespace, prefix, typed_value};
use proptest::prelude::*;
use tokio::sync::Notify;

const WAIT: Duration = Duration::from_secs(5);

fn counter_config() -> StoreConfig {
    StoreConfig::new().with_defaults(counter_schema())
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_counter_scenario() {
    init_tracing();
    let fixture = TestFixture::new();
    let release = Arc::new(Notify::new());
    let store = Store::deferred(counter_config(), fixture.acquire_on(release.clone())).unwrap();

    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
    assert_eq!(store.ready_state(), ReadyState::Pending);

    store.set("counter", 1).unwrap();
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(1)));

    let err = store.set("counter", "x").unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(1)));

    release.notify_one();
    store.ready().await.unwrap();
    store.flushed().await.unwrap();

    assert_eq!(store.get("counter"), Some(TypedValue::Integer(1)));
    assert_eq!(
        fixture.persisted().get("counter"),
        Some(&TypedValue::Integer(1))
    );
}

#[tokio::test]
async fn test_prefixes_do_not_interfere() {
    let fixture = TestFixture::new();
    let defaults = DefaultSchema::new().with("x", 0);

    let a = Store::deferred(
        StoreConfig::new().with_prefix("a").with_defaults(defaults.clone()),
        fixture.acquire(),
    )
    .unwrap();
    let b = Store::deferred(
        StoreConfig::new().with_prefix("b").with_defaults(defaults),
        fixture.acquire(),
    )
    .unwrap();
    a.ready().await.unwrap();
    b.ready().await.unwrap();

    a.set("x", 5).unwrap();
    a.flushed().await.unwrap();

    assert_eq!(a.get("x"), Some(TypedValue::Integer(5)));
    assert_eq!(b.get("x"), Some(TypedValue::Integer(0)));
    assert_eq!(fixture.persisted().get("ax"), Some(&TypedValue::Integer(5)));
    assert!(!fixture.persisted().contains_key("bx"));
}

#[tokio::test]
async fn test_load_ignores_other_prefixes() {
    let fixture = TestFixture::new();
    fixture.backend.seed("app.theme", "dark");
    fixture.backend.seed("other.theme", "light");

    let store =
        Store::deferred(StoreConfig::new().with_prefix("app."), fixture.acquire()).unwrap();
    store.ready().await.unwrap();

    assert_eq!(store.get("theme"), Some(TypedValue::Text("dark".into())));
    assert_eq!(store.keys(), vec!["theme".to_string()]);
    assert_eq!(store.snapshot().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Readiness
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_defaults_before_load() {
    let fixture = TestFixture::new();
    fixture.backend.seed("counter", 9);

    let release = Arc::new(Notify::new());
    let store = Store::deferred(counter_config(), fixture.acquire_on(release.clone())).unwrap();
    assert!(!store.is_ready());
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
    assert_eq!(store.get("missing"), None);

    let pending = tokio::time::timeout(Duration::from_millis(20), store.ready()).await;
    assert!(pending.is_err());
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));

    release.notify_one();
    store.ready().await.unwrap();
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(9)));
}

#[tokio::test]
async fn test_never_acquired_stays_pending() {
    let store = Store::deferred(counter_config(), TestFixture::acquire_never()).unwrap();

    let pending = tokio::time::timeout(Duration::from_millis(20), store.ready()).await;
    assert!(pending.is_err());
    assert_eq!(store.ready_state(), ReadyState::Pending);
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
}

#[tokio::test]
async fn test_ready_resolves_once() {
    let fixture = TestFixture::new();
    fixture.backend.seed("counter", 2);

    let store = Store::deferred(counter_config(), fixture.acquire_after(Duration::from_millis(10)))
        .unwrap();
    tokio::time::timeout(WAIT, store.ready()).await.unwrap().unwrap();
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(2)));

    // A later backend write does not reload the store.
    fixture.backend.seed("counter", 3);
    store.ready().await.unwrap();
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(2)));
}

#[tokio::test]
async fn test_acquisition_failure() {
    let store: Store<MemoryBackend> =
        Store::deferred(counter_config(), TestFixture::acquire_failing("disk offline")).unwrap();

    let err = store.ready().await.unwrap_err();
    assert!(matches!(err, StoreError::BackendUnavailable(ref reason) if reason.contains("disk offline")));
    assert!(store.ready().await.is_err());
    assert!(matches!(store.ready_state(), ReadyState::Failed(_)));

    // Still usable in memory.
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
    store.set("counter", 4).unwrap();
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(4)));
    assert!(store.backend().is_none());
    assert!(store.flushed().await.is_err());
}

#[tokio::test]
async fn test_early_writes_survive_load() {
    let fixture = TestFixture::new();
    fixture.backend.seed("counter", 5);
    fixture.backend.seed("name", "stored");
    fixture.backend.seed("gone", true);

    let release = Arc::new(Notify::new());
    let store = Store::deferred(counter_config(), fixture.acquire_on(release.clone())).unwrap();

    store.set("counter", 1).unwrap();
    store.unset("gone");
    release.notify_one();
    store.ready().await.unwrap();

    assert_eq!(store.get("counter"), Some(TypedValue::Integer(1)));
    assert_eq!(store.get("name"), Some(TypedValue::Text("stored".into())));
    assert_eq!(store.get("gone"), None);

    store.flushed().await.unwrap();
    let persisted = fixture.persisted();
    assert_eq!(persisted.get("counter"), Some(&TypedValue::Integer(1)));
    assert!(!persisted.contains_key("gone"));
}

#[tokio::test]
async fn test_observers_notified_on_load() {
    let fixture = TestFixture::new();
    fixture.backend.seed("counter", 8);

    let release = Arc::new(Notify::new());
    let store = Store::deferred(counter_config(), fixture.acquire_on(release.clone())).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let _subscription = store.subscribe(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    release.notify_one();
    store.ready().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.set("counter", 9).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Values and schema
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_foreign_kind_is_masked() {
    let backend = MemoryBackend::new();
    backend.seed("counter", "not a number");

    let store = Store::preloaded(counter_config(), backend.clone()).unwrap();
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
    assert_eq!(
        store.snapshot().get("counter"),
        Some(&TypedValue::Text("not a number".into()))
    );

    store.set("counter", 3).unwrap();
    store.flushed().await.unwrap();
    assert_eq!(backend.entries().get("counter"), Some(&TypedValue::Integer(3)));
}

#[tokio::test]
async fn test_unset_removes_entry() {
    let fixture = TestFixture::new();
    fixture.backend.seed("counter", 6);
    fixture.backend.seed("free", 1.5);

    let store = Store::preloaded(counter_config(), fixture.backend.clone()).unwrap();
    store.unset("counter");
    store.unset("free");

    assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
    assert_eq!(store.get("free"), None);

    store.flushed().await.unwrap();
    assert!(fixture.persisted().is_empty());
}

#[tokio::test]
async fn test_undeclared_keys_take_any_kind() {
    let store = Store::preloaded(counter_config(), MemoryBackend::new()).unwrap();

    store.set("free", "text").unwrap();
    store.set("free", 2.5).unwrap();
    store.set("free", false).unwrap();
    assert_eq!(store.get_as::<bool>("free"), Some(false));
}

#[tokio::test]
async fn test_schema_from_json() {
    let schema = DefaultSchema::from_json(serde_json::json!({
        "counter": 0,
        "ratio": 0.5,
        "name": "anon",
        "enabled": true,
    }))
    .unwrap();

    let store =
        Store::preloaded(StoreConfig::new().with_defaults(schema), MemoryBackend::new()).unwrap();
    assert_eq!(store.get_as::<f64>("ratio"), Some(0.5));
    assert_eq!(store.get_as::<String>("name"), Some("anon".to_string()));
    assert!(store.set("enabled", 1).unwrap_err().is_type_mismatch());
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_round_trip_memory() {
    let fixture = TestFixture::new();

    let first = Store::deferred(counter_config(), fixture.acquire()).unwrap();
    first.ready().await.unwrap();
    first.set("counter", 42).unwrap();
    first.set("label", "hello").unwrap();
    first.flushed().await.unwrap();
    drop(first);

    let second = Store::deferred(counter_config(), fixture.acquire()).unwrap();
    second.ready().await.unwrap();
    assert_eq!(second.get("counter"), Some(TypedValue::Integer(42)));
    assert_eq!(second.get("label"), Some(TypedValue::Text("hello".into())));
}

#[tokio::test]
async fn test_round_trip_sqlite() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.db");
    let config = counter_config().with_prefix("app.");

    let first = Store::deferred(config.clone(), SqliteBackend::open_async(path.clone())).unwrap();
    first.ready().await.unwrap();
    first.set("counter", 7).unwrap();
    first.set("ratio", 0.25).unwrap();
    first.set("dark", true).unwrap();
    first.unset("dark");
    first.flushed().await.unwrap();
    drop(first);

    let second = Store::deferred(config, SqliteBackend::open_async(path)).unwrap();
    second.ready().await.unwrap();
    assert_eq!(second.get("counter"), Some(TypedValue::Integer(7)));
    assert_eq!(second.get("ratio"), Some(TypedValue::Float(0.25)));
    assert_eq!(second.get("dark"), None);
    assert_eq!(second.keys(), vec!["counter".to_string(), "ratio".to_string()]);
}

#[tokio::test]
async fn test_non_finite_float_round_trip_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.db");
    let config = StoreConfig::new().with_defaults(DefaultSchema::new().with("ratio", 1.0));

    let first = Store::deferred(config.clone(), SqliteBackend::open_async(path.clone())).unwrap();
    first.ready().await.unwrap();
    let mut failures = first.flush_failures();
    first.set("ratio", f64::NAN).unwrap();
    first.set("limit", f64::INFINITY).unwrap();
    first.flushed().await.unwrap();
    assert!(failures.try_recv().is_err());
    drop(first);

    let second = Store::deferred(config, SqliteBackend::open_async(path)).unwrap();
    second.ready().await.unwrap();
    assert!(second.get_as::<f64>("ratio").is_some_and(f64::is_nan));
    assert_eq!(second.get("limit"), Some(TypedValue::Float(f64::INFINITY)));
}

#[tokio::test]
async fn test_rapid_sets_keep_latest() {
    let fixture = TestFixture::new();
    let flaky = FlakyBackend::new(fixture.backend.clone());
    flaky.slow_key("counter", Duration::from_millis(30));

    let store = Store::preloaded(counter_config(), flaky).unwrap();
    for n in 1..=5 {
        store.set("counter", n).unwrap();
    }
    store.flushed().await.unwrap();

    assert_eq!(store.get("counter"), Some(TypedValue::Integer(5)));
    assert_eq!(fixture.persisted().get("counter"), Some(&TypedValue::Integer(5)));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let fixture = TestFixture::new();
    let flaky = FlakyBackend::new(fixture.backend.clone());
    flaky.fail_next(2);

    let config = counter_config().with_flush(
        FlushConfig::default()
            .with_max_retries(3)
            .with_retry_backoff(Duration::from_millis(1)),
    );
    let store = Store::preloaded(config, flaky.clone()).unwrap();
    let mut failures = store.flush_failures();

    store.set("counter", 11).unwrap();
    store.flushed().await.unwrap();

    assert_eq!(flaky.failures(), 2);
    assert!(failures.try_recv().is_err());
    assert_eq!(fixture.persisted().get("counter"), Some(&TypedValue::Integer(11)));
}

#[tokio::test]
async fn test_flush_failure_is_reported() {
    let flaky = FlakyBackend::default();
    flaky.set_broken(true);

    let config = counter_config().with_flush(
        FlushConfig::default()
            .with_max_retries(1)
            .with_retry_backoff(Duration::from_millis(1)),
    );
    let store = Store::preloaded(config, flaky.clone()).unwrap();
    let mut failures = store.flush_failures();

    store.set("counter", 3).unwrap();

    let failure = tokio::time::timeout(WAIT, failures.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.key, "counter");
    assert_eq!(failure.value, Some(TypedValue::Integer(3)));
    assert_eq!(failure.attempts, 2);
    assert!(failure.error.contains("injected failure"));

    // The write still stands in memory and the flush counts as handled.
    assert_eq!(store.get("counter"), Some(TypedValue::Integer(3)));
    store.flushed().await.unwrap();
    assert!(flaky.inner.entries().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn read_your_write(
        ns in prefix(),
        writes in proptest::collection::vec((key(), typed_value()), 1..16),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let backend = MemoryBackend::new();
            let config = StoreConfig::new().with_prefix(ns.clone());
            let store = Store::preloaded(config, backend.clone()).unwrap();

            for (key, value) in &writes {
                store.set(key, value.clone()).unwrap();
                assert_eq!(store.get(key).as_ref(), Some(value));
            }

            store.flushed().await.unwrap();
            let persisted = backend.entries();
            for key in store.keys() {
                let qualified = format!("{}{}", ns, key);
                assert_eq!(persisted.get(&qualified), store.get(&key).as_ref());
            }
        });
    }

    #[test]
    fn mismatched_set_changes_nothing(name in key(), (declared, other) in mismatched_pair()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let config = StoreConfig::new()
                .with_defaults(DefaultSchema::new().with(name.clone(), declared.clone()));
            let store = Store::preloaded(config, MemoryBackend::new()).unwrap();
            let before = store.snapshot();

            let err = store.set(&name, other).unwrap_err();
            assert!(err.is_type_mismatch());
            assert_eq!(store.get(&name), Some(declared));
            assert!(Arc::ptr_eq(&before, &store.snapshot()));
        });
    }

    #[test]
    fn namespaces_do_not_interfere(
        (first, second) in (namespace(), namespace()).prop_filter("distinct", |(a, b)| a != b),
        writes in proptest::collection::vec((key(), typed_value()), 1..16),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let backend = MemoryBackend::new();
            let writer =
                Store::preloaded(StoreConfig::new().with_prefix(first.clone()), backend.clone())
                    .unwrap();
            let bystander =
                Store::preloaded(StoreConfig::new().with_prefix(second.clone()), backend.clone())
                    .unwrap();

            for (key, value) in &writes {
                writer.set(key, value.clone()).unwrap();
                assert_eq!(bystander.get(key), None);
            }
            writer.flushed().await.unwrap();

            assert!(bystander.keys().is_empty());
            assert!(backend.entries().keys().all(|k| k.starts_with(&first)));

            // A store opened on the other namespace afterwards loads nothing.
            let late = Store::preloaded(StoreConfig::new().with_prefix(second), backend).unwrap();
            assert!(late.keys().is_empty());
            for (key, _) in &writes {
                assert_eq!(late.get(key), None);
            }
        });
    }
}
