use async_trait::async_trait;
use callsite_di::{
    AsyncDispose, Constructor, DiError, Dispose, Injectable, Lifetime, Resolver, ServiceCollection,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<&'static str>>>;

struct Tracked {
    name: &'static str,
    log: Log,
}

impl Dispose for Tracked {
    fn dispose(&self) {
        self.log.lock().unwrap().push(self.name);
    }
}

struct AsyncTracked {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl AsyncDispose for AsyncTracked {
    async fn dispose(&self) {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(self.name);
    }
}

struct A(Tracked);
struct B(Tracked);
struct C(Tracked);

impl Dispose for A {
    fn dispose(&self) {
        self.0.dispose()
    }
}
impl Dispose for B {
    fn dispose(&self) {
        self.0.dispose()
    }
}
impl Dispose for C {
    fn dispose(&self) {
        self.0.dispose()
    }
}

fn tracked(name: &'static str, log: &Log) -> Tracked {
    Tracked {
        name,
        log: log.clone(),
    }
}

#[test]
fn test_scope_disposes_in_reverse_creation_order() {
    let log: Log = Arc::default();
    let (la, lb, lc) = (log.clone(), log.clone(), log.clone());

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<A, _>(Lifetime::Scoped, move |_| Ok(A(tracked("A", &la))));
    sc.add_disposable_factory::<B, _>(Lifetime::Scoped, move |_| Ok(B(tracked("B", &lb))));
    sc.add_disposable_factory::<C, _>(Lifetime::Scoped, move |_| Ok(C(tracked("C", &lc))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<A>();
    scope.get_required::<B>();
    scope.get_required::<C>();
    assert_eq!(scope.tracked_disposables(), 3);

    scope.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["C", "B", "A"]);
}

#[test]
fn test_dependencies_disposed_after_dependents() {
    struct Repo(Tracked);
    struct Service(Tracked, Arc<Repo>);

    impl Dispose for Repo {
        fn dispose(&self) {
            self.0.dispose()
        }
    }
    impl Dispose for Service {
        fn dispose(&self) {
            self.0.dispose()
        }
    }

    let log: Log = Arc::default();
    let (lr, ls) = (log.clone(), log.clone());

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<Repo, _>(Lifetime::Scoped, move |_| Ok(Repo(tracked("repo", &lr))));
    sc.add_disposable_factory::<Service, _>(Lifetime::Scoped, move |r| {
        Ok(Service(tracked("service", &ls), r.get::<Repo>()?))
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<Service>();
    scope.dispose().unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["service", "repo"]);
}

#[test]
fn test_dispose_is_idempotent() {
    let log: Log = Arc::default();
    let la = log.clone();

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<A, _>(Lifetime::Scoped, move |_| Ok(A(tracked("A", &la))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<A>();

    scope.dispose().unwrap();
    scope.dispose().unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_transients_captured_by_resolving_scope() {
    let log: Log = Arc::default();
    let la = log.clone();

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<A, _>(Lifetime::Transient, move |_| Ok(A(tracked("A", &la))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<A>();
    scope.get_required::<A>();
    assert_eq!(scope.tracked_disposables(), 2);
    assert_eq!(sp.root_scope().tracked_disposables(), 0);

    scope.dispose().unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn test_singletons_disposed_with_root_only() {
    let log: Log = Arc::default();
    let la = log.clone();

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<A, _>(Lifetime::Singleton, move |_| Ok(A(tracked("A", &la))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<A>();

    scope.dispose().unwrap();
    assert!(log.lock().unwrap().is_empty());

    sp.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["A"]);
}

#[test]
fn test_registered_instances_are_never_disposed() {
    let log: Log = Arc::default();

    let mut sc = ServiceCollection::new();
    sc.add_singleton(A(tracked("instance", &log)));

    let sp = sc.build();
    sp.get_required::<A>();
    sp.dispose().unwrap();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_constructor_activated_disposables() {
    struct Connection(Tracked);

    impl Dispose for Connection {
        fn dispose(&self) {
            self.0.dispose()
        }
    }

    impl Injectable for Connection {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>()
                .param::<Log>()
                .build_disposable(|args| {
                    let log = args.next::<Log>()?;
                    Ok(Connection(tracked("connection", &log)))
                })]
        }
    }

    let log: Log = Arc::default();
    let mut sc = ServiceCollection::new();
    sc.add_singleton(log.clone());
    sc.add_scoped_type::<Connection>();

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<Connection>();
    scope.dispose().unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["connection"]);
}

#[test]
fn test_sync_dispose_reports_async_only_services() {
    let log: Log = Arc::default();
    let (la, lx) = (log.clone(), log.clone());

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<A, _>(Lifetime::Scoped, move |_| Ok(A(tracked("A", &la))));
    sc.add_async_disposable_factory::<AsyncTracked, _>(Lifetime::Scoped, move |_| {
        Ok(AsyncTracked {
            name: "async",
            log: lx.clone(),
        })
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<A>();
    scope.get_required::<AsyncTracked>();

    match scope.dispose() {
        Err(DiError::AsyncDisposalRequired(service)) => assert!(service.ends_with("AsyncTracked")),
        other => panic!("expected async disposal error, got {other:?}"),
    }
    // Sync services were still disposed
    assert_eq!(*log.lock().unwrap(), vec!["A"]);
    assert!(scope.is_disposed());
}

#[tokio::test]
async fn test_async_dispose_handles_both_kinds() {
    let log: Log = Arc::default();
    let (la, lx, lb) = (log.clone(), log.clone(), log.clone());

    let mut sc = ServiceCollection::new();
    sc.add_disposable_factory::<A, _>(Lifetime::Scoped, move |_| Ok(A(tracked("A", &la))));
    sc.add_async_disposable_factory::<AsyncTracked, _>(Lifetime::Scoped, move |_| {
        Ok(AsyncTracked {
            name: "async",
            log: lx.clone(),
        })
    });
    sc.add_disposable_factory::<B, _>(Lifetime::Scoped, move |_| Ok(B(tracked("B", &lb))));

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<A>();
    scope.get_required::<AsyncTracked>();
    scope.get_required::<B>();

    scope.dispose_async().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["B", "async", "A"]);

    // Second call is a no-op
    scope.dispose_async().await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_provider_async_dispose() {
    let log: Log = Arc::default();
    let lx = log.clone();

    let mut sc = ServiceCollection::new();
    sc.add_async_disposable_factory::<AsyncTracked, _>(Lifetime::Singleton, move |_| {
        Ok(AsyncTracked {
            name: "singleton",
            log: lx.clone(),
        })
    });

    let sp = sc.build();
    sp.get_required::<AsyncTracked>();
    sp.dispose_async().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["singleton"]);
    assert!(matches!(sp.get::<AsyncTracked>(), Err(DiError::ScopeDisposed)));
}

#[test]
fn test_disposal_breaks_scope_cycles() {
    use callsite_di::Scope;
    use std::sync::Weak;

    struct Owner {
        _scope: Scope,
    }

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Owner, _>(|r| Ok(Owner { _scope: r.clone() }));

    let sp = sc.build();
    let scope = sp.create_scope();
    let owner: Weak<Owner> = Arc::downgrade(&scope.get_required::<Owner>());
    assert!(owner.upgrade().is_some());

    scope.dispose().unwrap();
    assert!(owner.upgrade().is_none());
}

#[test]
fn test_provider_disposal_frees_singleton_holding_root() {
    use callsite_di::Scope;
    use std::sync::Weak;

    struct Locator {
        _root: Scope,
    }

    impl Injectable for Locator {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>()
                .param_provider()
                .build(|args| Ok(Locator { _root: args.next_provider()? }))]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_type::<Locator>();

    let sp = sc.build();
    let locator: Weak<Locator> = Arc::downgrade(&sp.get_required::<Locator>());
    assert!(locator.upgrade().is_some());

    sp.dispose().unwrap();
    drop(sp);
    assert!(locator.upgrade().is_none());
}
