//! Diagnostic hooks into resolution.
//!
//! Observers are called synchronously on the resolving thread, so keep
//! them cheap. With no observer registered the engine skips the timing and
//! notification work entirely.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::DiError;
use crate::registration::ComponentRegistration;
use crate::service::Service;

/// Receives resolution events.
///
/// Every method has an empty default, so implementations only override what
/// they care about.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{ContainerBuilder, ResolveObserver, Resolver, Service};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl ResolveObserver for Counter {
///     fn operation_started(&self, _service: &Service) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(Counter::default());
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Arc::new(1u8));
/// builder.add_observer(counter.clone());
/// let container = builder.build().unwrap();
///
/// container.resolve::<u8>().unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait ResolveObserver: Send + Sync {
    /// A top-level resolve operation started.
    fn operation_started(&self, _service: &Service) {}

    /// A request (top-level or nested) is about to run its pipeline.
    fn request_started(&self, _service: &Service, _registration: &ComponentRegistration) {}

    /// A request produced an instance.
    fn request_completed(&self, _service: &Service, _registration: &ComponentRegistration, _duration: Duration) {}

    /// A request failed.
    fn request_failed(&self, _service: &Service, _error: &DiError) {}

    /// A top-level operation finished, successfully when `error` is `None`.
    fn operation_completed(&self, _service: &Service, _error: Option<&DiError>) {}
}

/// The observers of one container.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolveObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ResolveObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn operation_started(&self, service: &Service) {
        for observer in &self.observers {
            observer.operation_started(service);
        }
    }

    pub(crate) fn request_started(&self, service: &Service, registration: &ComponentRegistration) {
        for observer in &self.observers {
            observer.request_started(service, registration);
        }
    }

    pub(crate) fn request_completed(&self, service: &Service, registration: &ComponentRegistration, duration: Duration) {
        for observer in &self.observers {
            observer.request_completed(service, registration, duration);
        }
    }

    pub(crate) fn request_failed(&self, service: &Service, error: &DiError) {
        for observer in &self.observers {
            observer.request_failed(service, error);
        }
    }

    pub(crate) fn operation_completed(&self, service: &Service, error: Option<&DiError>) {
        for observer in &self.observers {
            observer.operation_completed(service, error);
        }
    }
}

/// Forwards resolution events to `tracing`.
///
/// Requests are logged at `trace`, failed operations at `debug`.
///
/// ```
/// use ferrous_resolve::{ContainerBuilder, TracingObserver};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(TracingObserver));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn request_started(&self, service: &Service, registration: &ComponentRegistration) {
        trace!(service = %service, registration = %registration.id(), "Request started");
    }

    fn request_completed(&self, service: &Service, registration: &ComponentRegistration, duration: Duration) {
        trace!(
            service = %service,
            registration = %registration.id(),
            elapsed_us = duration.as_micros() as u64,
            "Request completed"
        );
    }

    fn request_failed(&self, service: &Service, error: &DiError) {
        trace!(service = %service, %error, "Request failed");
    }

    fn operation_completed(&self, service: &Service, error: Option<&DiError>) {
        if let Some(error) = error {
            debug!(service = %service, %error, "Resolve operation failed");
        }
    }
}
