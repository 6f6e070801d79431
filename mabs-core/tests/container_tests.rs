use mabs_core::{Container, Error};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[derive(Debug)]
struct Database {
    dsn: String,
}

#[test]
fn test_set_and_get() {
    let container = Container::new();
    container.set("answer", 42_u32).unwrap();

    assert_eq!(*container.get_as::<u32>("answer").unwrap(), 42);
    assert!(container.has("answer"));
}

#[test]
fn test_get_missing_key() {
    let container = Container::new();
    assert!(matches!(
        container.get("nope"),
        Err(Error::ServiceNotFound(key)) if key == "nope"
    ));
}

#[test]
fn test_type_mismatch() {
    let container = Container::new();
    container.set("answer", 42_u32).unwrap();
    assert!(matches!(
        container.get_as::<String>("answer"),
        Err(Error::ServiceTypeMismatch { .. })
    ));
}

#[test]
fn test_factory_runs_once() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    container
        .set_factory("db", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Database {
                dsn: "memory://".to_string(),
            })
        })
        .unwrap();

    assert!(!container.is_resolved("db"));
    let first = container.get_as::<Database>("db").unwrap();
    let second = container.get_as::<Database>("db").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.dsn, "memory://");
    assert!(container.is_resolved("db"));
}

#[test]
fn test_has_does_not_run_factory() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container
        .set_factory("lazy", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    assert!(container.has("lazy"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_factory_resolves_dependencies() {
    let container = Container::new();
    container.set("dsn", "postgres://localhost".to_string()).unwrap();
    container
        .set_factory("db", |c| {
            let dsn = c.get_as::<String>("dsn")?;
            Ok(Database {
                dsn: dsn.to_string(),
            })
        })
        .unwrap();

    assert_eq!(
        container.get_as::<Database>("db").unwrap().dsn,
        "postgres://localhost"
    );
}

#[test]
fn test_failed_factory_is_retried() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container
        .set_factory("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Internal("not yet".into()))
            } else {
                Ok(7_u8)
            }
        })
        .unwrap();

    assert!(container.get("flaky").is_err());
    assert_eq!(*container.get_as::<u8>("flaky").unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_overwrite_before_lock() {
    let container = Container::new();
    container.set("name", "first".to_string()).unwrap();
    container.set("name", "second".to_string()).unwrap();
    assert_eq!(*container.get_as::<String>("name").unwrap(), "second");
}

#[test]
fn test_unset() {
    let container = Container::new();
    container.set("name", "value".to_string()).unwrap();
    container.unset("name").unwrap();
    container.unset("never-set").unwrap();
    assert!(!container.has("name"));
}

#[test]
fn test_lock_rejects_existing_and_new_keys() {
    let container = Container::new();
    container.set("existing", 1_u8).unwrap();
    container.lock();

    assert!(matches!(
        container.set("existing", 2_u8),
        Err(Error::LockedContainer(_))
    ));
    assert!(matches!(
        container.set("fresh", 3_u8),
        Err(Error::LockedContainer(_))
    ));
    assert!(matches!(
        container.set_factory("lazy", |_| Ok(4_u8)),
        Err(Error::LockedContainer(_))
    ));
    assert!(matches!(
        container.unset("existing"),
        Err(Error::LockedContainer(_))
    ));
    assert_eq!(*container.get_as::<u8>("existing").unwrap(), 1);
}

#[test]
fn test_lock_is_idempotent() {
    let container = Container::new();
    container.lock();
    container.lock();
    assert!(container.is_locked());
}

#[test]
fn test_factory_still_resolves_after_lock() {
    let container = Container::new();
    container.set_factory("late", |_| Ok("built".to_string())).unwrap();
    container.lock();

    assert_eq!(*container.get_as::<String>("late").unwrap(), "built");
}

#[test]
fn test_clones_share_state() {
    let container = Container::new();
    let handle = container.clone();
    handle.set("shared", true).unwrap();
    container.lock();

    assert!(container.has("shared"));
    assert!(handle.is_locked());
}

#[test]
fn test_concurrent_first_reads_build_once() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container
        .set_factory("pool", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Database {
                dsn: "pool".to_string(),
            })
        })
        .unwrap();
    container.lock();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.get_as::<Database>("pool").unwrap())
        })
        .collect();
    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_keys_sorted() {
    let container = Container::new();
    container.set("b", 1_u8).unwrap();
    container.set("a", 2_u8).unwrap();
    assert_eq!(container.keys(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(container.len(), 2);
}
