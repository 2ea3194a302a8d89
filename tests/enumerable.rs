use callsite_di::{Constructor, Injectable, Lifetime, Resolver, ServiceCollection, ServiceType};
use std::sync::Arc;

trait Step: Send + Sync {
    fn name(&self) -> &'static str;
}

struct X;
struct Y;
struct Z;

impl Step for X {
    fn name(&self) -> &'static str {
        "X"
    }
}
impl Step for Y {
    fn name(&self) -> &'static str {
        "Y"
    }
}
impl Step for Z {
    fn name(&self) -> &'static str {
        "Z"
    }
}

fn names(steps: &[Arc<dyn Step>]) -> Vec<&'static str> {
    steps.iter().map(|s| s.name()).collect()
}

#[test]
fn test_collection_in_registration_order() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Step>(Arc::new(X));
    sc.add_trait_factory::<dyn Step, _>(Lifetime::Scoped, |_| Ok(Arc::new(Y)));
    sc.add_trait_factory::<dyn Step, _>(Lifetime::Transient, |_| Ok(Arc::new(Z)));

    let sp = sc.build();
    let scope = sp.create_scope();
    assert_eq!(names(&scope.get_all_trait::<dyn Step>().unwrap()), vec!["X", "Y", "Z"]);
    assert_eq!(scope.get_required_trait::<dyn Step>().name(), "Z");
}

#[test]
fn test_empty_collection() {
    let sp = ServiceCollection::new().build();
    assert!(sp.get_all_trait::<dyn Step>().unwrap().is_empty());
    assert!(sp.is_service(&ServiceType::enumerable_of::<dyn Step>()));
    assert!(!sp.is_service(&ServiceType::of::<dyn Step>()));
}

#[test]
fn test_last_element_shares_instance_with_single_resolution() {
    struct Counter(u8);

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Counter, _>(|_| Ok(Counter(1)));
    sc.add_singleton_factory::<Counter, _>(|_| Ok(Counter(2)));

    let sp = sc.build();
    let all = sp.get_all::<Counter>().unwrap();
    let single = sp.get_required::<Counter>();

    assert_eq!(all.len(), 2);
    assert_eq!(all[0].0, 1);
    assert!(Arc::ptr_eq(&all[1], &single));
    assert!(!Arc::ptr_eq(&all[0], &single));

    // Elements keep their identity across collection requests
    let again = sp.get_all::<Counter>().unwrap();
    assert!(Arc::ptr_eq(&all[0], &again[0]));
}

#[test]
fn test_collection_elements_follow_their_lifetimes() {
    struct Item(u8);

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Item, _>(|_| Ok(Item(1)));
    sc.add_transient_factory::<Item, _>(|_| Ok(Item(2)));

    let sp = sc.build();
    let scope = sp.create_scope();
    let first = scope.get_all::<Item>().unwrap();
    let second = scope.get_all::<Item>().unwrap();

    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(!Arc::ptr_eq(&first[1], &second[1]));

    let other = sp.create_scope().get_all::<Item>().unwrap();
    assert!(!Arc::ptr_eq(&first[0], &other[0]));
}

#[test]
fn test_collection_parameter() {
    struct Pipeline(Vec<Arc<u32>>);

    impl Injectable for Pipeline {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>()
                .param_all::<u32>()
                .build(|args| Ok(Pipeline(args.next_all()?)))]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(10u32);
    sc.add_singleton(20u32);
    sc.add_singleton(30u32);
    sc.add_transient_type::<Pipeline>();

    let sp = sc.build();
    let pipeline = sp.get_required::<Pipeline>();
    let values: Vec<u32> = pipeline.0.iter().map(|v| **v).collect();
    assert_eq!(values, vec![10, 20, 30]);
}

#[test]
fn test_empty_collection_parameter_is_satisfiable() {
    struct Listeners(usize);

    impl Injectable for Listeners {
        fn constructors() -> Vec<Constructor> {
            vec![Constructor::of::<Self>()
                .param_all::<dyn Step>()
                .build(|args| Ok(Listeners(args.next_all_trait::<dyn Step>()?.len())))]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_type::<Listeners>();
    let sp = sc.build();
    assert_eq!(sp.get_required::<Listeners>().0, 0);
}
