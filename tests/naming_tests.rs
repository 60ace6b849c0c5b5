//! Naming directory behaviour seen from outside the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use php_appserver::naming::{CallbackResolver, DeferredCallback, MAX_REFERENCE_HOPS};
use php_appserver::{CallbackTarget, NamingDirectory, NamingError, RequestContext, Result, Value};

/// Counts invocations and answers with the callback's first argument.
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

impl CallbackResolver for CountingResolver {
    fn resolve(&self, callback: &DeferredCallback, _request: Option<&RequestContext>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::from(callback.name().unwrap_or_default()))
    }
}

// =============================================================================
// Bind / lookup
// =============================================================================

#[test]
fn test_bound_names_resolve_on_every_lookup() {
    let directory = NamingDirectory::new();
    let resolver = CountingResolver::default();
    directory
        .bind_callback("php:global/app1/Foo", CallbackTarget::LookupProxy, ["FooBean/local"])
        .unwrap();

    assert!(directory.is_bound("php:global/app1/Foo").unwrap());
    for _ in 0..3 {
        let value = directory.lookup("php:global/app1/Foo", None, &resolver).unwrap();
        assert_eq!(value.as_literal(), Some("FooBean/local"));
    }
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_scheme_less_names_address_the_same_node() {
    let directory = NamingDirectory::new();
    directory.bind_value("global/app1/x", "1").unwrap();
    assert!(directory.is_bound("php:global/app1/x").unwrap());
    assert_eq!(
        directory.bind_value("php:global/app1/x", "2"),
        Err(NamingError::AlreadyBound("php:global/app1/x".into()))
    );
}

#[test]
fn test_malformed_names_are_rejected() {
    let directory = NamingDirectory::new();
    assert!(matches!(directory.is_bound("global//x"), Err(NamingError::InvalidName { .. })));
    assert!(matches!(directory.bind_value("", "x"), Err(NamingError::InvalidName { .. })));
}

// =============================================================================
// Structural errors
// =============================================================================

#[test]
fn test_binding_through_a_leaf_is_a_conflict() {
    let directory = NamingDirectory::new();
    directory.bind_value("a/b", "leaf").unwrap();
    assert!(matches!(directory.bind_value("a/b/c", "x"), Err(NamingError::Conflict { .. })));
    assert!(matches!(directory.is_bound("a/b/c/d"), Err(NamingError::Conflict { .. })));
}

#[test]
fn test_alias_cycles_fail_instead_of_looping() {
    let directory = NamingDirectory::new();
    let resolver = CountingResolver::default();
    directory.bind_reference("a", "b").unwrap();
    directory.bind_reference("b", "a").unwrap();

    assert!(matches!(
        directory.lookup("a", None, &resolver),
        Err(NamingError::CyclicBinding { hops: MAX_REFERENCE_HOPS, .. })
    ));
}

#[test]
fn test_long_alias_chains_within_the_bound_resolve() {
    let directory = NamingDirectory::new();
    let resolver = CountingResolver::default();
    directory.bind_value("chain/0", "end").unwrap();
    for i in 1..=MAX_REFERENCE_HOPS {
        directory
            .bind_reference(&format!("chain/{}", i), &format!("chain/{}", i - 1))
            .unwrap();
    }

    let top = format!("chain/{}", MAX_REFERENCE_HOPS);
    assert_eq!(directory.lookup(&top, None, &resolver).unwrap().as_literal(), Some("end"));

    let limited = NamingDirectory::with_max_hops(2);
    limited.bind_value("x/0", "end").unwrap();
    limited.bind_reference("x/1", "x/0").unwrap();
    limited.bind_reference("x/2", "x/1").unwrap();
    limited.bind_reference("x/3", "x/2").unwrap();
    assert!(limited.lookup("x/2", None, &resolver).is_ok());
    assert!(matches!(
        limited.lookup("x/3", None, &resolver),
        Err(NamingError::CyclicBinding { .. })
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_readers_see_binds_from_other_threads() {
    let directory = Arc::new(NamingDirectory::new());
    let resolver = Arc::new(CountingResolver::default());

    let writers: Vec<_> = (0..4)
        .map(|worker| {
            let directory = directory.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    directory
                        .bind_value(&format!("php:global/app{}/entry{}", worker, i), "v")
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|worker| {
            let directory = directory.clone();
            let resolver = resolver.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let name = format!("php:global/app{}/entry{}", worker, i);
                    assert_eq!(
                        directory.lookup(&name, None, resolver.as_ref()).unwrap().as_literal(),
                        Some("v")
                    );
                }
            })
        })
        .collect();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(directory.bindings().len(), 200);
}

#[test]
fn test_concurrent_duplicate_binds_succeed_once() {
    let directory = Arc::new(NamingDirectory::new());
    let successes = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let directory = directory.clone();
            let successes = successes.clone();
            std::thread::spawn(move || {
                if directory.bind_value("php:global/app1/once", "v").is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(successes.load(Ordering::SeqCst), 1);
}
