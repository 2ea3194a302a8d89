use callsite_di::{Constructor, DiError, Injectable, Resolver, ServiceCollection};
use std::sync::Arc;

struct ServiceA;
struct ServiceB;
struct ServiceC;

impl Injectable for ServiceA {
    fn constructors() -> Vec<Constructor> {
        vec![Constructor::of::<Self>().param::<ServiceB>().build(|_| Ok(ServiceA))]
    }
}

impl Injectable for ServiceB {
    fn constructors() -> Vec<Constructor> {
        vec![Constructor::of::<Self>().param::<ServiceC>().build(|_| Ok(ServiceB))]
    }
}

impl Injectable for ServiceC {
    fn constructors() -> Vec<Constructor> {
        vec![Constructor::of::<Self>().param::<ServiceA>().build(|_| Ok(ServiceC))]
    }
}

fn short(path: &[&'static str]) -> Vec<String> {
    path.iter()
        .map(|name| name.rsplit("::").next().unwrap_or(name).to_string())
        .collect()
}

#[test]
fn test_constructor_cycle_reports_path() {
    let mut sc = ServiceCollection::new();
    sc.add_transient_type::<ServiceA>();
    sc.add_transient_type::<ServiceB>();
    sc.add_transient_type::<ServiceC>();

    let sp = sc.build();
    match sp.get::<ServiceA>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(short(&path), vec!["ServiceA", "ServiceB", "ServiceC", "ServiceA"]);
        }
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_cycle_detected_before_any_construction() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_type::<ServiceA>();
    sc.add_singleton_type::<ServiceB>();
    sc.add_singleton_type::<ServiceC>();

    let sp = sc.build();
    // Entering the cycle at a different point reports a rotated path
    match sp.get::<ServiceB>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(short(&path), vec!["ServiceB", "ServiceC", "ServiceA", "ServiceB"]);
        }
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }
    // Failures are not cached
    assert!(matches!(sp.get::<ServiceB>(), Err(DiError::Circular(_))));
}

#[test]
fn test_self_resolving_factory_is_circular() {
    struct Recursive;

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Recursive, _>(|r| {
        r.get::<Recursive>()?;
        Ok(Recursive)
    });

    let sp = sc.build();
    match sp.get::<Recursive>() {
        Err(DiError::Circular(path)) => assert_eq!(path.len(), 2),
        other => panic!("expected circular dependency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_mutually_resolving_factories_are_circular() {
    struct Left;
    struct Right;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Left, _>(|r| {
        r.get::<Right>()?;
        Ok(Left)
    });
    sc.add_scoped_factory::<Right, _>(|r| {
        r.get::<Left>()?;
        Ok(Right)
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    assert!(matches!(scope.get::<Left>(), Err(DiError::Circular(_))));

    // The scope is still usable afterwards
    assert!(matches!(scope.get::<Right>(), Err(DiError::Circular(_))));
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Shared;
    struct Left(Arc<Shared>);
    struct Right(Arc<Shared>);
    struct Top(Arc<Left>, Arc<Right>);

    impl Injectable for Shared {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().build(|_| Ok(Shared))]
        }
    }
    impl Injectable for Left {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().param::<Shared>().build(|a| Ok(Left(a.next()?)))]
        }
    }
    impl Injectable for Right {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>().param::<Shared>().build(|a| Ok(Right(a.next()?)))]
        }
    }
    impl Injectable for Top {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>()
                .param::<Left>()
                .param::<Right>()
                .build(|a| Ok(Top(a.next()?, a.next()?)))]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_scoped_type::<Shared>();
    sc.add_transient_type::<Left>();
    sc.add_transient_type::<Right>();
    sc.add_transient_type::<Top>();

    let sp = sc.build();
    let scope = sp.create_scope();
    let top = scope.get_required::<Top>();
    assert!(Arc::ptr_eq(&(top.0).0, &(top.1).0));
}
