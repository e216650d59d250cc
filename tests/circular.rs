use ferrous_resolve::{ContainerBuilder, ContainerOptions, DiError, Lifetime, Parameters, Resolver, Service};
use std::sync::Arc;

#[derive(Debug)]
struct ServiceA;
#[derive(Debug)]
struct ServiceB;
#[derive(Debug)]
struct ServiceC;

fn circular_path(error: DiError) -> Vec<Service> {
    match error {
        DiError::Circular { path } => path,
        other => panic!("expected a circular dependency error, got {other:?}"),
    }
}

#[test]
fn test_self_circular_dependency() {
    #[derive(Debug)]
    struct SelfReferencing;

    let mut builder = ContainerBuilder::new();
    builder.register(|ctx, _| {
        ctx.resolve::<SelfReferencing>()?;
        Ok(Arc::new(SelfReferencing))
    });
    let container = builder.build().unwrap();

    let path = circular_path(container.resolve::<SelfReferencing>().unwrap_err());
    assert_eq!(path, vec![Service::of::<SelfReferencing>(), Service::of::<SelfReferencing>()]);
}

#[test]
fn test_two_service_cycle_reports_full_path() {
    let mut builder = ContainerBuilder::new();
    builder.register(|ctx, _| {
        ctx.resolve::<ServiceB>()?;
        Ok(Arc::new(ServiceA))
    });
    builder.register(|ctx, _| {
        ctx.resolve::<ServiceA>()?;
        Ok(Arc::new(ServiceB))
    });
    let container = builder.build().unwrap();

    let error = container.resolve::<ServiceA>().unwrap_err();
    assert!(error.is_circular());
    let message = error.to_string();
    assert!(message.starts_with("circular dependency detected: "), "got: {message}");

    let path = circular_path(error);
    assert_eq!(
        path,
        vec![Service::of::<ServiceA>(), Service::of::<ServiceB>(), Service::of::<ServiceA>()]
    );
}

#[test]
fn test_three_service_cycle_through_shared_instances() {
    let mut builder = ContainerBuilder::new();
    builder
        .register(|ctx, _| {
            ctx.resolve::<ServiceB>()?;
            Ok(Arc::new(ServiceA))
        })
        .single_instance();
    builder
        .register(|ctx, _| {
            ctx.resolve::<ServiceC>()?;
            Ok(Arc::new(ServiceB))
        })
        .lifetime(Lifetime::per_scope());
    builder.register(|ctx, _| {
        ctx.resolve::<ServiceA>()?;
        Ok(Arc::new(ServiceC))
    });
    let container = builder.build().unwrap();

    let path = circular_path(container.resolve::<ServiceB>().unwrap_err());
    assert_eq!(
        path,
        vec![
            Service::of::<ServiceB>(),
            Service::of::<ServiceC>(),
            Service::of::<ServiceA>(),
            Service::of::<ServiceB>(),
        ]
    );

    // Nothing half-built was cached.
    assert_eq!(container.shared_instance_count(), 0);
    assert!(container.resolve::<ServiceC>().unwrap_err().is_circular());
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Shared;
    struct Left(Arc<Shared>);
    struct Right(Arc<Shared>);
    struct Top(Arc<Left>, Arc<Right>);

    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(Arc::new(Shared))).single_instance();
    builder.register(|ctx, _| Ok(Arc::new(Left(ctx.resolve()?))));
    builder.register(|ctx, _| Ok(Arc::new(Right(ctx.resolve()?))));
    builder.register(|ctx, _| Ok(Arc::new(Top(ctx.resolve()?, ctx.resolve()?))));
    let container = builder.build().unwrap();

    let top = container.resolve::<Top>().unwrap();
    assert!(Arc::ptr_eq(&top.0 .0, &top.1 .0));
}

#[test]
fn test_composite_may_resolve_other_implementations_of_its_service() {
    trait Plugin: Send + Sync {
        fn names(&self) -> Vec<&'static str>;
    }
    struct Single(&'static str);
    impl Plugin for Single {
        fn names(&self) -> Vec<&'static str> {
            vec![self.0]
        }
    }
    struct Composite(Vec<Arc<dyn Plugin>>);
    impl Plugin for Composite {
        fn names(&self) -> Vec<&'static str> {
            self.0.iter().flat_map(|p| p.names()).collect()
        }
    }

    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(Arc::new(Single("a")) as Arc<dyn Plugin>));
    builder.register(|_, _| Ok(Arc::new(Single("b")) as Arc<dyn Plugin>));
    builder.register(|ctx, _| {
        let service = Service::of::<dyn Plugin>();
        let own = ctx.registration().id();
        let mut parts = Vec::new();
        for registration in ctx.registrations_for(&service).iter().filter(|r| r.id() != own) {
            let instance = ctx.resolve_registration(&service, registration, &Parameters::empty())?;
            parts.push(instance.downcast::<dyn Plugin>().expect("plugin instance"));
        }
        Ok(Arc::new(Composite(parts)) as Arc<dyn Plugin>)
    });
    let container = builder.build().unwrap();

    // The same service is on the stack twice, through different registrations.
    assert_eq!(container.resolve::<dyn Plugin>().unwrap().names(), vec!["b", "a"]);
}

#[test]
fn test_cycle_through_lazy_is_reported_not_deadlocked() {
    let mut builder = ContainerBuilder::new();
    builder
        .register(|ctx, _| {
            let lazy = ctx.resolve_lazy::<ServiceA>()?;
            // Forcing the lazy inside the activator re-enters the same singleton.
            lazy.value()?;
            Ok(Arc::new(ServiceA))
        })
        .single_instance();
    let container = builder.build().unwrap();

    let error = container.resolve::<ServiceA>().unwrap_err();
    assert!(error.is_circular(), "got: {error}");
}

#[test]
fn test_depth_limit() {
    #[derive(Debug)]
    struct Node;

    let mut builder = ContainerBuilder::with_options(ContainerOptions::default().with_max_resolve_depth(4));
    builder.register(|ctx, _| {
        ctx.resolve::<u8>()?;
        Ok(Arc::new(Node))
    });
    builder.register(|ctx, _| {
        ctx.resolve::<u16>()?;
        Ok(Arc::new(0u8))
    });
    builder.register(|ctx, _| {
        ctx.resolve::<u32>()?;
        Ok(Arc::new(0u16))
    });
    builder.register(|ctx, _| {
        ctx.resolve::<u64>()?;
        Ok(Arc::new(0u32))
    });
    builder.register(|_, _| Ok(Arc::new(0u64)));
    let container = builder.build().unwrap();

    // Node -> u8 -> u16 -> u32 -> u64 is five requests deep.
    match container.resolve::<Node>() {
        Err(DiError::DepthExceeded(4)) => {}
        other => panic!("expected DepthExceeded, got {other:?}"),
    }
    // u8 -> u16 -> u32 -> u64 fits.
    assert!(container.resolve::<u8>().is_ok());
}
