use async_trait::async_trait;
use ferrous_resolve::{
    AsyncDispose, ContainerBuilder, ContainerOptions, DiError, Dispose, DisposeResult, Resolver,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

struct Tracked {
    name: String,
    log: Log,
}

impl Dispose for Tracked {
    fn dispose(&self) -> DisposeResult {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

struct Failing;

impl Dispose for Failing {
    fn dispose(&self) -> DisposeResult {
        Err("flush failed".into())
    }
}

struct Connection {
    log: Log,
}

#[async_trait]
impl AsyncDispose for Connection {
    async fn dispose(&self) -> DisposeResult {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push("connection".to_string());
        Ok(())
    }
}

fn tracked(name: &str, log: &Log) -> Arc<Tracked> {
    Arc::new(Tracked {
        name: name.to_string(),
        log: log.clone(),
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn test_sync_disposal_reverse_creation_order() {
    let log: Log = Arc::default();

    let (x, y, z) = (log.clone(), log.clone(), log.clone());
    let mut builder = ContainerBuilder::new();
    builder.register(move |_, _| Ok(tracked("x", &x))).named("x").disposable();
    builder.register(move |_, _| Ok(tracked("y", &y))).named("y").disposable();
    builder.register(move |_, _| Ok(tracked("z", &z))).named("z").disposable();
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    for name in ["x", "y", "z"] {
        scope.resolve_named::<Tracked>(name).unwrap();
    }
    scope.dispose().unwrap();

    assert_eq!(entries(&log), vec!["z", "y", "x"]);
}

#[test]
fn test_dependencies_outlive_their_dependents() {
    struct Repository(#[allow(dead_code)] Arc<Tracked>);

    let log: Log = Arc::default();
    let db_log = log.clone();
    let repo_log = log.clone();

    let mut builder = ContainerBuilder::new();
    builder.register(move |_, _| Ok(tracked("database", &db_log))).disposable();
    builder
        .register(move |ctx, _| {
            let db = ctx.resolve::<Tracked>()?;
            ctx.register_disposer(tracked("repository", &repo_log))?;
            Ok(Arc::new(Repository(db)))
        });
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    scope.resolve::<Repository>().unwrap();
    scope.dispose().unwrap();

    // The database finished activating first, so it is released last.
    assert_eq!(entries(&log), vec!["repository", "database"]);
}

#[test]
fn test_children_disposed_before_parent() {
    let log: Log = Arc::default();
    let container = ContainerBuilder::new().build().unwrap();

    let parent = container.begin_scope().unwrap();
    parent.register_disposer(tracked("parent", &log)).unwrap();
    let first = parent.begin_scope().unwrap();
    first.register_disposer(tracked("first-child", &log)).unwrap();
    let second = parent.begin_scope().unwrap();
    second.register_disposer(tracked("second-child", &log)).unwrap();
    let grandchild = first.begin_scope().unwrap();
    grandchild.register_disposer(tracked("grandchild", &log)).unwrap();

    parent.dispose().unwrap();

    assert_eq!(entries(&log), vec!["second-child", "grandchild", "first-child", "parent"]);
    assert!(grandchild.is_disposed());
}

#[test]
fn test_dispose_is_idempotent() {
    let log: Log = Arc::default();
    let container = ContainerBuilder::new().build().unwrap();

    let scope = container.begin_scope().unwrap();
    scope.register_disposer(tracked("once", &log)).unwrap();
    scope.dispose().unwrap();
    scope.dispose().unwrap();

    assert_eq!(entries(&log), vec!["once"]);
}

#[test]
fn test_failures_are_collected_and_everything_still_runs() {
    let log: Log = Arc::default();
    let container = ContainerBuilder::new().build().unwrap();

    let scope = container.begin_scope().unwrap();
    scope.register_disposer(tracked("before", &log)).unwrap();
    scope.register_disposer(Arc::new(Failing)).unwrap();
    scope.register_disposer(tracked("after", &log)).unwrap();

    match scope.dispose() {
        Err(DiError::Disposal(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors.failures()[0].component.contains("Failing"));
            assert_eq!(errors.failures()[0].error.to_string(), "flush failed");
        }
        other => panic!("expected disposal errors, got {other:?}"),
    }
    assert_eq!(entries(&log), vec!["after", "before"]);
    assert!(scope.is_disposed());
}

#[test]
fn test_externally_owned_is_never_disposed() {
    let log: Log = Arc::default();
    let owned = log.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| Ok(tracked("external", &owned)))
        .disposable()
        .externally_owned();
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    scope.resolve::<Tracked>().unwrap();
    scope.dispose().unwrap();

    assert!(entries(&log).is_empty());
}

#[test]
fn test_root_instances_released_with_the_container() {
    let log: Log = Arc::default();
    let owned = log.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| Ok(tracked("singleton", &owned)))
        .single_instance()
        .disposable();
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    scope.resolve::<Tracked>().unwrap();
    scope.dispose().unwrap();
    assert!(entries(&log).is_empty());

    drop(container);
    assert_eq!(entries(&log), vec!["singleton"]);
}

#[test]
fn test_drop_without_dispose_when_disabled() {
    let log: Log = Arc::default();
    let owned = log.clone();

    let mut builder =
        ContainerBuilder::with_options(ContainerOptions::default().with_dispose_on_drop(false));
    builder
        .register(move |_, _| Ok(tracked("kept", &owned)))
        .single_instance()
        .disposable();
    let container = builder.build().unwrap();
    container.resolve::<Tracked>().unwrap();

    drop(container);
    assert!(entries(&log).is_empty());
}

#[test]
fn test_sync_dispose_rejects_async_disposables() {
    let log: Log = Arc::default();
    let owned = log.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| Ok(Arc::new(Connection { log: owned.clone() })))
        .async_disposable();
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    scope.resolve::<Connection>().unwrap();

    let error = scope.dispose().unwrap_err();
    assert!(error.to_string().contains("dispose_async"), "got: {error}");
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_async_disposal_runs_both_kinds_in_reverse() {
    let log: Log = Arc::default();
    let (conn_log, cache_log) = (log.clone(), log.clone());

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| Ok(Arc::new(Connection { log: conn_log.clone() })))
        .async_disposable();
    builder.register(move |_, _| Ok(tracked("cache", &cache_log))).disposable();
    let container = builder.build().unwrap();

    let scope = container.begin_scope().unwrap();
    let child = scope.begin_scope().unwrap();
    child.register_disposer(tracked("child", &log)).unwrap();
    scope.resolve::<Connection>().unwrap();
    scope.resolve::<Tracked>().unwrap();

    scope.dispose_async().await.unwrap();

    assert_eq!(entries(&log), vec!["child", "cache", "connection"]);
    assert!(child.is_disposed());
}

#[tokio::test]
async fn test_async_container_shutdown() {
    let log: Log = Arc::default();
    let owned = log.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register(move |_, _| Ok(Arc::new(Connection { log: owned.clone() })))
        .single_instance()
        .async_disposable();
    let container = builder.build().unwrap();
    container.resolve::<Connection>().unwrap();

    container.dispose_async().await.unwrap();
    assert_eq!(entries(&log), vec!["connection"]);
    assert!(container.resolve::<Connection>().is_err());
}
