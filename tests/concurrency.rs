//! Concurrent access tests
//!
//! Resolution must stay correct when many threads hit the same provider:
//! singletons and scoped services are produced once per owner and graphs are
//! built once.

use callsite_di::{
    Constructor, DiError, Injectable, MetricsObserver, Resolver, ServiceCollection,
    ServiceProviderMode, ServiceProviderOptions,
};
use crossbeam_utils::thread;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::time::{Duration, Instant};

const THREADS: usize = 16;

struct Expensive(usize);

#[test]
fn test_singleton_created_once_under_contention() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Expensive, _>(move |_| {
        std::thread::sleep(Duration::from_millis(20));
        Ok(Expensive(counter.fetch_add(1, Ordering::SeqCst)))
    });
    let sp = sc.build();
    let barrier = Barrier::new(THREADS);

    let resolved: Vec<Arc<Expensive>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    sp.create_scope().get_required::<Expensive>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(resolved.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_scoped_created_once_per_shared_scope() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Expensive, _>(move |_| {
        std::thread::sleep(Duration::from_millis(10));
        Ok(Expensive(counter.fetch_add(1, Ordering::SeqCst)))
    });
    let sp = sc.build();
    let scope = sp.create_scope();
    let barrier = Barrier::new(THREADS);

    let resolved: Vec<Arc<Expensive>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    scope.get_required::<Expensive>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(resolved.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_scopes_isolated_across_threads() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Expensive, _>(move |_| Ok(Expensive(counter.fetch_add(1, Ordering::SeqCst))));
    let sp = sc.build();
    let barrier = Barrier::new(THREADS);

    let ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    let scope = sp.create_scope();
                    let a = scope.get_required::<Expensive>();
                    let b = scope.get_required::<Expensive>();
                    assert!(Arc::ptr_eq(&a, &b));
                    scope.dispose().unwrap();
                    a.0
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), THREADS);
    assert_eq!(created.load(Ordering::SeqCst), THREADS);
}

#[test]
fn test_graph_built_once_under_contention() {
    struct Leaf;
    struct Root(Arc<Leaf>);

    impl Injectable for Leaf {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().build(|_| Ok(Leaf))]
        }
    }

    impl Injectable for Root {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().param::<Leaf>().build(|a| Ok(Root(a.next()?)))]
        }
    }

    let metrics = Arc::new(MetricsObserver::new());
    for mode in [ServiceProviderMode::Dynamic, ServiceProviderMode::Compiled] {
        metrics.reset();
        let mut sc = ServiceCollection::new();
        sc.add_singleton_type::<Leaf>();
        sc.add_transient_type::<Root>();
        sc.add_observer(metrics.clone());
        let sp = sc
            .build_with_options(ServiceProviderOptions::default().with_mode(mode))
            .unwrap();
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|_| {
                    barrier.wait();
                    for _ in 0..50 {
                        let root = sp.get_required::<Root>();
                        assert!(Arc::ptr_eq(&root.0, &sp.get_required::<Leaf>()));
                    }
                });
            }
        })
        .unwrap();

        // One realization per requested service type
        assert_eq!(metrics.call_sites_built(), 2, "{mode:?}");
        assert_eq!(metrics.resolution_count(), (THREADS * 50 * 2) as u64, "{mode:?}");
        assert_eq!(metrics.failure_count(), 0, "{mode:?}");
    }
}

static SLOW_BUILD_STARTED: AtomicBool = AtomicBool::new(false);
static QUICK_BUILD_STARTED: AtomicBool = AtomicBool::new(false);

fn wait_for(flag: &AtomicBool, limit: Duration) -> bool {
    let start = Instant::now();
    while !flag.load(Ordering::SeqCst) {
        if start.elapsed() > limit {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

struct SlowGraph;
struct QuickGraph;

impl Injectable for SlowGraph {
    fn constructors() -> Vec<Constructor> {
        SLOW_BUILD_STARTED.store(true, Ordering::SeqCst);
        // Stays inside its build until the other type's build has begun
        wait_for(&QUICK_BUILD_STARTED, Duration::from_secs(2));
        vec![Constructor::of::<Self>().build(|_| Ok(SlowGraph))]
    }
}

impl Injectable for QuickGraph {
    fn constructors() -> Vec<Constructor> {
        QUICK_BUILD_STARTED.store(true, Ordering::SeqCst);
        vec![Constructor::of::<Self>().build(|_| Ok(QuickGraph))]
    }
}

#[test]
fn test_distinct_types_build_concurrently() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_type::<SlowGraph>();
    sc.add_transient_type::<QuickGraph>();
    let sp = sc.build();

    let quick_wait = thread::scope(|s| {
        s.spawn(|_| sp.get_required::<SlowGraph>());
        let quick = s.spawn(|_| {
            assert!(wait_for(&SLOW_BUILD_STARTED, Duration::from_secs(2)));
            let start = Instant::now();
            sp.get_required::<QuickGraph>();
            start.elapsed()
        });
        quick.join().unwrap()
    })
    .unwrap();

    // Building QuickGraph did not wait for SlowGraph's build to finish
    assert!(quick_wait < Duration::from_secs(1), "waited {quick_wait:?}");
}

struct Left;
struct Right;

#[test]
fn test_crossed_singleton_factories_fail_instead_of_hanging() {
    // Both factories start before either looks up the other
    let barrier = Arc::new(Barrier::new(2));

    let mut sc = ServiceCollection::new();
    let (entered, first) = (barrier.clone(), AtomicBool::new(true));
    sc.add_singleton_factory::<Left, _>(move |scope| {
        if first.swap(false, Ordering::SeqCst) {
            entered.wait();
        }
        scope.get::<Right>()?;
        Ok(Left)
    });
    let (entered, first) = (barrier.clone(), AtomicBool::new(true));
    sc.add_singleton_factory::<Right, _>(move |scope| {
        if first.swap(false, Ordering::SeqCst) {
            entered.wait();
        }
        scope.get::<Left>()?;
        Ok(Right)
    });
    let sp = sc.build();

    let (tx, rx) = mpsc::channel();
    let left = {
        let (sp, tx) = (sp.clone(), tx.clone());
        std::thread::spawn(move || {
            let _ = tx.send(sp.get::<Left>().map(|_| ()));
        })
    };
    let right = std::thread::spawn(move || {
        let _ = tx.send(sp.get::<Right>().map(|_| ()));
    });

    for _ in 0..2 {
        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("crossed singleton factories deadlocked");
        assert!(matches!(result, Err(DiError::Circular(_))), "{result:?}");
    }
    left.join().unwrap();
    right.join().unwrap();
}
