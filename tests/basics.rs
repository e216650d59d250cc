use ferrous_resolve::{
    ContainerBuilder, DiError, Lifetime, Parameter, Parameters, Resolver, Service,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn test_root_singleton() {
    let mut builder = ContainerBuilder::new();
    builder.register_instance(Arc::new(42usize));
    builder.register(|_, _| Ok(Arc::new("hello".to_string()))).single_instance();

    let container = builder.build().unwrap();

    let num1 = container.resolve::<usize>().unwrap();
    let num2 = container.resolve::<usize>().unwrap();
    let str1 = container.resolve::<String>().unwrap();
    let str2 = container.resolve::<String>().unwrap();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2)); // Same instance
    assert!(Arc::ptr_eq(&str1, &str2)); // Same instance
}

#[test]
fn test_activator_with_dependencies() {
    #[derive(Debug)]
    struct Config {
        port: u16,
    }

    #[derive(Debug)]
    struct Server {
        config: Arc<Config>,
        name: String,
    }

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Arc::new(Config { port: 8080 }));
    builder
        .register(|ctx, _| {
            Ok(Arc::new(Server {
                config: ctx.resolve::<Config>()?,
                name: "MyServer".to_string(),
            }))
        })
        .single_instance();

    let container = builder.build().unwrap();
    let server = container.resolve::<Server>().unwrap();

    assert_eq!(server.config.port, 8080);
    assert_eq!(server.name, "MyServer");
}

#[test]
fn test_per_dependency_creates_new_instances() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    let mut builder = ContainerBuilder::new();
    builder.register(move |_, _| {
        let n = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(format!("instance-{n}")))
    });

    let container = builder.build().unwrap();
    let a = container.resolve::<String>().unwrap();
    let b = container.resolve::<String>().unwrap();

    assert_eq!(*a, "instance-1");
    assert_eq!(*b, "instance-2");
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_trait_resolution() {
    trait Greeter: Send + Sync {
        fn greet(&self, name: &str) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self, name: &str) -> String {
            format!("Hello, {name}")
        }
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register(|_, _| Ok(Arc::new(English)))
        .as_service::<dyn Greeter, _>(|english| english);

    let container = builder.build().unwrap();
    let greeter = container.resolve::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet("Ferris"), "Hello, Ferris");

    // Exposed only as the trait unless asked to keep the concrete type.
    assert!(!container.is_registered::<English>());
}

#[test]
fn test_one_component_many_services_share_instance() {
    trait Reader: Send + Sync {
        fn read(&self) -> u32;
    }
    trait Writer: Send + Sync {
        fn write(&self, value: u32);
    }

    struct Store(AtomicUsize);
    impl Reader for Store {
        fn read(&self) -> u32 {
            self.0.load(Ordering::SeqCst) as u32
        }
    }
    impl Writer for Store {
        fn write(&self, value: u32) {
            self.0.store(value as usize, Ordering::SeqCst);
        }
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register(|_, _| Ok(Arc::new(Store(AtomicUsize::new(0)))))
        .as_service::<dyn Reader, _>(|store| store)
        .as_service::<dyn Writer, _>(|store| store)
        .single_instance();

    let container = builder.build().unwrap();
    container.resolve::<dyn Writer>().unwrap().write(7);
    assert_eq!(container.resolve::<dyn Reader>().unwrap().read(), 7);
}

#[test]
fn test_not_registered_vs_try_resolve() {
    let container = ContainerBuilder::new().build().unwrap();

    match container.resolve::<String>() {
        Err(DiError::NotRegistered { service }) => assert_eq!(service, Service::of::<String>()),
        other => panic!("expected NotRegistered, got {other:?}"),
    }
    assert!(container.try_resolve::<String>().unwrap().is_none());
    assert!(!container.is_registered::<String>());
}

#[test]
fn test_missing_dependency_is_wrapped_in_activation_error() {
    #[derive(Debug)]
    struct NeedsString;

    let mut builder = ContainerBuilder::new();
    builder.register(|ctx, _| {
        ctx.resolve::<String>()?;
        Ok(Arc::new(NeedsString))
    });
    let container = builder.build().unwrap();

    let error = container.resolve::<NeedsString>().unwrap_err();
    assert!(matches!(error, DiError::Activation { .. }));
    assert!(error.is_not_registered());
    assert_eq!(error.activation_chain(), vec![&Service::of::<NeedsString>()]);
}

#[test]
fn test_named_and_keyed_services() {
    let mut builder = ContainerBuilder::new();
    builder.register_instance(Arc::new("primary-db".to_string())).named("primary");
    builder.register_instance(Arc::new("replica-db".to_string())).named("replica");
    builder.register_instance(Arc::new(10u32)).keyed(1);

    let container = builder.build().unwrap();

    assert_eq!(*container.resolve_named::<String>("primary").unwrap(), "primary-db");
    assert_eq!(*container.resolve_named::<String>("replica").unwrap(), "replica-db");
    assert_eq!(*container.resolve_keyed::<u32>(1).unwrap(), 10);
    assert!(container.resolve_named::<String>("missing").is_err());
    // Keyed services do not satisfy the unkeyed service.
    assert!(container.try_resolve::<String>().unwrap().is_none());
}

#[test]
fn test_parameters_reach_the_activator() {
    struct Greeting(String);

    let mut builder = ContainerBuilder::new();
    builder
        .register(|_, params: &Parameters| {
            let name = params.named::<String>("name").map(|n| (*n).clone()).unwrap_or_default();
            let excited = params.typed::<bool>().map(|b| *b).unwrap_or(false);
            Ok(Arc::new(Greeting(format!("hi {name}{}", if excited { "!" } else { "" }))))
        })
        .with_parameter(Parameter::named("name", "world".to_string()));

    let container = builder.build().unwrap();

    // Registration defaults apply when the caller supplies nothing.
    assert_eq!(container.resolve::<Greeting>().unwrap().0, "hi world");

    // Caller parameters come first.
    let greeting = container
        .resolve_with_parameters::<Greeting>([
            Parameter::named("name", "ferris".to_string()),
            Parameter::typed(true),
        ])
        .unwrap();
    assert_eq!(greeting.0, "hi ferris!");
}

#[test]
fn test_preserve_existing_defaults() {
    let mut builder = ContainerBuilder::new();
    builder.register_instance(Arc::new("first".to_string()));
    builder
        .register_instance(Arc::new("second".to_string()))
        .preserve_existing_defaults();

    let container = builder.build().unwrap();
    assert_eq!(*container.resolve::<String>().unwrap(), "first");

    let all = container.resolve_all::<String>().unwrap();
    assert_eq!(all.iter().map(|s| s.as_str()).collect::<Vec<_>>(), vec!["first", "second"]);
}

#[test]
fn test_activation_handlers() {
    let activated = Arc::new(AtomicUsize::new(0));
    let seen = activated.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register(|_, _| Ok(Arc::new(1u32)))
        .on_activating(|event| {
            let value = event.instance_as::<u32>().unwrap();
            event.replace(Arc::new(*value + 1));
            Ok(())
        })
        .on_activated(move |event| {
            assert_eq!(*event.instance_as::<u32>().unwrap(), 2);
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .single_instance();

    let container = builder.build().unwrap();
    assert_eq!(*container.resolve::<u32>().unwrap(), 2);
    assert_eq!(*container.resolve::<u32>().unwrap(), 2);

    // Handlers only run for fresh activations.
    assert_eq!(activated.load(Ordering::SeqCst), 1);
}

#[test]
fn test_resolving_again_returns_identical_shared_instances() {
    let activations = Arc::new(AtomicUsize::new(0));
    let counter = activations.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(vec![1u8, 2, 3]))
        })
        .lifetime(Lifetime::per_scope());

    let container = builder.build().unwrap();
    let scope = container.begin_scope().unwrap();
    let first = scope.resolve::<Vec<u8>>().unwrap();
    for _ in 0..10 {
        assert!(Arc::ptr_eq(&first, &scope.resolve::<Vec<u8>>().unwrap()));
    }
    assert_eq!(scope.shared_instance_count(), 1);
    assert_eq!(activations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cached_dependency_leaves_sibling_depth_unchanged() {
    struct Cached;
    struct Sibling;
    struct Parent;

    let activations = Arc::new(AtomicUsize::new(0));
    let depths = Arc::new(Mutex::new(Vec::new()));
    let (counter, log) = (activations.clone(), depths.clone());

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Cached))
        })
        .single_instance();
    builder.register(move |ctx, _| {
        log.lock().unwrap().push(ctx.depth());
        Ok(Arc::new(Sibling))
    });
    builder.register(|ctx, _| {
        ctx.resolve::<Cached>()?;
        ctx.resolve::<Sibling>()?;
        Ok(Arc::new(Parent))
    });
    let container = builder.build().unwrap();

    // First pass builds `Cached`; the later ones find it in the root scope.
    container.resolve::<Parent>().unwrap();
    container.resolve::<Parent>().unwrap();
    container.begin_scope().unwrap().resolve::<Parent>().unwrap();

    assert_eq!(activations.load(Ordering::SeqCst), 1);
    assert_eq!(*depths.lock().unwrap(), vec![2, 2, 2]);
}

#[test]
fn test_descriptors_list_registrations_in_order() {
    let mut builder = ContainerBuilder::new();
    builder.register_instance(Arc::new(1u8));
    builder.register(|_, _| Ok(Arc::new(2u16))).with_metadata("role", "counter");

    let container = builder.build().unwrap();
    let descriptors = container.descriptors();

    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].type_name(), "u8");
    assert!(descriptors[0].is_shared());
    assert_eq!(descriptors[1].type_name(), "u16");
    assert!(descriptors[1].has_metadata);
    assert!(!descriptors[1].is_shared());
}
