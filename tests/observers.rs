use ferrous_resolve::{
    ComponentRegistration, ContainerBuilder, DiError, ResolveObserver, Resolver, Service, TracingObserver,
};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recording {
    events: Mutex<Vec<String>>,
}

impl Recording {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ResolveObserver for Recording {
    fn operation_started(&self, service: &Service) {
        self.push(format!("operation {service}"));
    }

    fn request_started(&self, service: &Service, _registration: &ComponentRegistration) {
        self.push(format!("start {service}"));
    }

    fn request_completed(&self, service: &Service, _registration: &ComponentRegistration, _duration: Duration) {
        self.push(format!("done {service}"));
    }

    fn request_failed(&self, service: &Service, _error: &DiError) {
        self.push(format!("failed {service}"));
    }

    fn operation_completed(&self, service: &Service, error: Option<&DiError>) {
        self.push(format!("finished {service} ok={}", error.is_none()));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ferrous_resolve=trace")
        .with_test_writer()
        .try_init();
}

#[test]
#[serial]
fn test_observer_sees_nested_requests() {
    init_tracing();
    let recording = Arc::new(Recording::default());

    let mut builder = ContainerBuilder::new();
    builder.register(|_, _| Ok(Arc::new(1u8)));
    builder.register(|ctx, _| Ok(Arc::new(u16::from(*ctx.resolve::<u8>()?))));
    builder.add_observer(recording.clone());
    builder.add_observer(Arc::new(TracingObserver));
    let container = builder.build().unwrap();

    container.resolve::<u16>().unwrap();

    assert_eq!(
        recording.events(),
        vec!["operation u16", "start u16", "start u8", "done u8", "done u16", "finished u16 ok=true"]
    );
}

#[test]
#[serial]
fn test_observer_sees_failures() {
    init_tracing();
    let recording = Arc::new(Recording::default());

    let mut builder = ContainerBuilder::new();
    builder.register(|ctx, _| Ok(Arc::new(u16::from(*ctx.resolve::<u8>()?))));
    builder.add_observer(recording.clone());
    builder.add_observer(Arc::new(TracingObserver));
    let container = builder.build().unwrap();

    assert!(container.resolve::<u16>().unwrap_err().is_not_registered());

    assert_eq!(
        recording.events(),
        vec!["operation u16", "start u16", "failed u16", "finished u16 ok=false"]
    );
}

#[test]
#[serial]
fn test_unregistered_top_level_service_is_not_an_operation() {
    init_tracing();
    let recording = Arc::new(Recording::default());

    let mut builder = ContainerBuilder::new();
    builder.add_observer(recording.clone());
    let container = builder.build().unwrap();

    assert!(container.resolve::<u8>().is_err());
    assert!(recording.events().is_empty());
}
