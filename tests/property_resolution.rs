/// Property-based tests for service resolution
///
/// These tests verify that sharing, ordering and disposal follow the same
/// rules whatever the registrations or scope shapes happen to be.

use ferrous_resolve::{ContainerBuilder, Dispose, DisposeResult, Lifetime, Resolver};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Labelled {
    value: String,
}

struct Recorder {
    index: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Dispose for Recorder {
    fn dispose(&self) -> DisposeResult {
        self.log.lock().unwrap().push(self.index);
        Ok(())
    }
}

fn lifetime_strategy() -> impl Strategy<Value = Lifetime> {
    prop_oneof![
        Just(Lifetime::Root),
        Just(Lifetime::per_scope()),
        Just(Lifetime::PerDependency),
    ]
}

// Property: singletons resolve to the same instance from every scope
proptest! {
    #[test]
    fn singleton_resolution_consistency(value in "\\PC{0,50}", depth in 0usize..5) {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Arc::new(Labelled { value: value.clone() }));
        let container = builder.build().unwrap();

        let root = container.resolve::<Labelled>().unwrap();
        let mut scope = container.begin_scope().unwrap();
        for _ in 0..depth {
            scope = scope.begin_scope().unwrap();
        }
        let nested = scope.resolve::<Labelled>().unwrap();

        prop_assert!(Arc::ptr_eq(&root, &nested));
        prop_assert_eq!(&nested.value, &value);
    }
}

// Property: sharing follows the lifetime for any lifetime and scope count
proptest! {
    #[test]
    fn sharing_follows_lifetime(lifetime in lifetime_strategy(), scope_count in 1usize..5) {
        let mut builder = ContainerBuilder::new();
        builder
            .register(|_, _| Ok(Arc::new(Labelled { value: String::new() })))
            .lifetime(lifetime.clone());
        let container = builder.build().unwrap();

        let root_instance = container.resolve::<Labelled>().unwrap();
        for _ in 0..scope_count {
            let scope = container.begin_scope().unwrap();
            let first = scope.resolve::<Labelled>().unwrap();
            let second = scope.resolve::<Labelled>().unwrap();

            match &lifetime {
                Lifetime::Root => {
                    prop_assert!(Arc::ptr_eq(&first, &root_instance));
                    prop_assert!(Arc::ptr_eq(&first, &second));
                }
                Lifetime::PerDependency => {
                    prop_assert!(!Arc::ptr_eq(&first, &second));
                }
                Lifetime::MatchingScope(_) => {
                    prop_assert!(Arc::ptr_eq(&first, &second));
                    prop_assert!(!Arc::ptr_eq(&first, &root_instance));
                }
            }
        }
    }
}

// Property: collections preserve registration order and the default is the last one
proptest! {
    #[test]
    fn collection_preserves_registration_order(values in prop::collection::vec(any::<u32>(), 1..20)) {
        let mut builder = ContainerBuilder::new();
        for value in &values {
            let value = *value;
            builder.register(move |_, _| Ok(Arc::new(value)));
        }
        let container = builder.build().unwrap();

        let all: Vec<u32> = container.resolve_all::<u32>().unwrap().iter().map(|v| **v).collect();
        prop_assert_eq!(&all, &values);
        prop_assert_eq!(*container.resolve::<u32>().unwrap(), *values.last().unwrap());
    }
}

// Property: optional resolution mirrors registration state
proptest! {
    #[test]
    fn optional_resolution_behavior(register in any::<bool>()) {
        let mut builder = ContainerBuilder::new();
        if register {
            builder.register_instance(Arc::new(42u64));
        }
        let container = builder.build().unwrap();

        prop_assert_eq!(container.try_resolve::<u64>().unwrap().is_some(), register);
        prop_assert_eq!(container.resolve::<u64>().is_err(), !register);
        prop_assert_eq!(container.is_registered::<u64>(), register);
    }
}

// Property: disposal is the exact reverse of tracking order
proptest! {
    #[test]
    fn disposal_reverses_tracking_order(count in 0usize..30) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = ContainerBuilder::new().build().unwrap();
        let scope = container.begin_scope().unwrap();

        for index in 0..count {
            scope
                .register_disposer(Arc::new(Recorder { index, log: log.clone() }))
                .unwrap();
        }
        scope.dispose().unwrap();

        let expected: Vec<usize> = (0..count).rev().collect();
        prop_assert_eq!(&*log.lock().unwrap(), &expected);
    }
}
