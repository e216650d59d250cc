use ferrous_resolve::{ContainerBuilder, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Handler: Send + Sync {
    fn handle(&self) -> String;
}

struct Raw(&'static str);

impl Handler for Raw {
    fn handle(&self) -> String {
        self.0.to_string()
    }
}

struct Wrapped {
    label: &'static str,
    inner: Arc<dyn Handler>,
}

impl Handler for Wrapped {
    fn handle(&self) -> String {
        format!("{}({})", self.label, self.inner.handle())
    }
}

fn wrap(label: &'static str, inner: Arc<dyn Handler>) -> Arc<dyn Handler> {
    Arc::new(Wrapped { label, inner })
}

fn raw(value: &'static str) -> Arc<dyn Handler> {
    Arc::new(Raw(value))
}

#[test]
fn test_decorators_compose_in_registration_order() {
    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(raw("raw")));
    builder.register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("D1", inner)));
    builder.register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("D2", inner)));
    let container = builder.build().unwrap();

    assert_eq!(container.resolve::<dyn Handler>().unwrap().handle(), "D2(D1(raw))");
}

#[test]
fn test_conditional_decorator_sees_applied_chain() {
    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(raw("raw")));
    let first = builder
        .register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("D1", inner)))
        .when(|ctx| ctx.applied_decorators().is_empty())
        .id();
    builder
        .register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("skipped", inner)))
        .when(|ctx| ctx.applied_decorators().is_empty());
    builder
        .register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("D3", inner)))
        .when(move |ctx| ctx.is_applied(first));
    let container = builder.build().unwrap();

    assert_eq!(container.resolve::<dyn Handler>().unwrap().handle(), "D3(D1(raw))");
}

#[test]
fn test_decorator_predicate_on_implementation_metadata() {
    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(raw("fast"))).with_metadata("slow", false);
    builder.register(|_, _| Ok(raw("slow"))).with_metadata("slow", true);
    builder
        .register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("timed", inner)))
        .when(|ctx| ctx.metadata().get("slow").and_then(|v| v.as_bool()) == Some(true));
    let container = builder.build().unwrap();

    let handled: Vec<String> = container
        .resolve_all::<dyn Handler>()
        .unwrap()
        .iter()
        .map(|h| h.handle())
        .collect();
    assert_eq!(handled, vec!["fast", "timed(slow)"]);
}

#[test]
fn test_decorated_singleton_is_decorated_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let decorated = Arc::new(AtomicUsize::new(0));
    let (built_count, decorated_count) = (built.clone(), decorated.clone());

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| {
            built_count.fetch_add(1, Ordering::SeqCst);
            Ok(raw("raw"))
        })
        .single_instance();
    builder.register_decorator::<dyn Handler, _>(move |_, _, inner| {
        decorated_count.fetch_add(1, Ordering::SeqCst);
        Ok(wrap("D", inner))
    });
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    let a = container.resolve::<dyn Handler>().unwrap();
    let b = scope.resolve::<dyn Handler>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.handle(), "D(raw)");
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(decorated.load(Ordering::SeqCst), 1);
}

#[test]
fn test_per_dependency_is_decorated_every_time() {
    let decorated = Arc::new(AtomicUsize::new(0));
    let counter = decorated.clone();

    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(raw("raw")));
    builder.register_decorator::<dyn Handler, _>(move |_, _, inner| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(wrap("D", inner))
    });
    let container = builder.build().unwrap();

    container.resolve::<dyn Handler>().unwrap();
    container.resolve::<dyn Handler>().unwrap();
    assert_eq!(decorated.load(Ordering::SeqCst), 2);
}

#[test]
fn test_decorator_can_resolve_dependencies() {
    struct Prefix(&'static str);

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Arc::new(Prefix("audit")));
    builder.register(|_, _| Ok(raw("raw")));
    builder.register_decorator::<dyn Handler, _>(|ctx, _, inner| {
        let prefix = ctx.resolve::<Prefix>()?;
        Ok(wrap(prefix.0, inner))
    });
    let container = builder.build().unwrap();

    assert_eq!(container.resolve::<dyn Handler>().unwrap().handle(), "audit(raw)");
}

#[test]
fn test_decorator_does_not_touch_other_services() {
    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(raw("raw")));
    builder.register(|_, _| Ok(Arc::new(String::from("untouched"))));
    builder.register_decorator::<dyn Handler, _>(|_, _, inner| Ok(wrap("D", inner)));
    let container = builder.build().unwrap();

    assert_eq!(*container.resolve::<String>().unwrap(), "untouched");
}
