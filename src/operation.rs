//! Top-level resolve operations and the context handed to activators.

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use crate::disposer::DisposerEntry;
use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::internal::{ResolutionStack, StackGuard};
use crate::parameters::Parameters;
use crate::pipeline::ResolveRequestContext;
use crate::registration::ComponentRegistration;
use crate::scope::LifetimeScope;
use crate::service::Service;
use crate::traits::ResolverCore;

type Deferred = Box<dyn FnOnce() -> DiResult<()>>;

/// One top-level resolve call and everything it builds on the way.
///
/// An operation owns the resolution stack used for cycle detection; nested
/// requests made by activators join the operation of their caller, so the
/// stack covers the whole graph being built. Handlers deferred with
/// [`defer`](Self::defer) run after the outermost request has finished.
pub struct ResolveOperation {
    initiator: LifetimeScope,
    stack: RefCell<ResolutionStack>,
    deferred: RefCell<Vec<Deferred>>,
    max_depth: usize,
    requests: Cell<usize>,
}

impl ResolveOperation {
    fn new(initiator: &LifetimeScope) -> Self {
        Self {
            initiator: initiator.clone(),
            stack: RefCell::new(ResolutionStack::default()),
            deferred: RefCell::new(Vec::new()),
            max_depth: initiator.options().max_resolve_depth,
            requests: Cell::new(0),
        }
    }

    /// Resolves `registration` for `service` as a new top-level operation.
    pub(crate) fn execute(
        scope: &LifetimeScope,
        service: &Service,
        registration: &Arc<ComponentRegistration>,
        parameters: &Parameters,
    ) -> DiResult<Instance> {
        let operation = Self::new(scope);
        let observers = scope.observers();
        observers.operation_started(service);

        let result = operation
            .resolve_request(scope, service, registration, parameters, None)
            .and_then(|instance| {
                operation.complete()?;
                Ok(instance)
            });

        observers.operation_completed(service, result.as_ref().err());
        result
    }

    /// Resolves the default registration of `service` within this operation.
    pub(crate) fn resolve_default(
        &self,
        scope: &LifetimeScope,
        service: &Service,
        parameters: &Parameters,
    ) -> DiResult<Instance> {
        let service = &scope.registry().canonical(service);
        let registration = scope
            .registry()
            .default_registration(service)
            .ok_or_else(|| DiError::NotRegistered { service: service.clone() })?;
        self.resolve_request(scope, service, &registration, parameters, None)
    }

    /// Runs the pipeline of `registration` within this operation.
    pub(crate) fn resolve_request(
        &self,
        scope: &LifetimeScope,
        service: &Service,
        registration: &Arc<ComponentRegistration>,
        parameters: &Parameters,
        decorator_target: Option<Instance>,
    ) -> DiResult<Instance> {
        scope.ensure_alive()?;
        let _guard = StackGuard::push(&self.stack, service, registration.id(), self.max_depth)?;
        self.requests.set(self.requests.get() + 1);

        trace!(
            service = %service,
            registration = %registration.id(),
            depth = self.depth(),
            "Resolving"
        );

        let observers = scope.observers();
        let started = (!observers.is_empty()).then(|| {
            observers.request_started(service, registration);
            Instant::now()
        });

        let pipeline = scope.registry().pipeline_for(registration);
        let mut ctx = ResolveRequestContext::new(
            self,
            scope.clone(),
            service.clone(),
            registration.clone(),
            parameters.clone(),
            decorator_target,
        );
        let result = pipeline.invoke(&mut ctx).and_then(|()| ctx.take_instance());

        if let Some(started) = started {
            match &result {
                Ok(_) => observers.request_completed(service, registration, started.elapsed()),
                Err(error) => observers.request_failed(service, error),
            }
        }
        result
    }

    /// Queues `f` to run once the top-level request succeeded.
    pub fn defer(&self, f: impl FnOnce() -> DiResult<()> + 'static) {
        self.deferred.borrow_mut().push(Box::new(f));
    }

    fn complete(&self) -> DiResult<()> {
        loop {
            let batch = std::mem::take(&mut *self.deferred.borrow_mut());
            if batch.is_empty() {
                return Ok(());
            }
            for f in batch {
                f()?;
            }
        }
    }

    /// Number of requests currently in flight.
    pub fn depth(&self) -> usize {
        self.stack.borrow().depth()
    }

    /// Service currently being built, if any.
    pub fn current_service(&self) -> Option<Service> {
        self.stack.borrow().current().cloned()
    }

    /// Requests started so far, cache hits included.
    pub fn request_count(&self) -> usize {
        self.requests.get()
    }

    /// Scope the operation was started from.
    pub fn initiating_scope(&self) -> &LifetimeScope {
        &self.initiator
    }

    pub(crate) fn circular_path(&self, service: &Service) -> Vec<Service> {
        self.stack.borrow().path_to(service)
    }
}

/// What an activator sees while building an instance.
///
/// The context resolves dependencies as part of the caller's operation, so
/// cycles are detected across the whole graph. It implements
/// [`Resolver`](crate::Resolver) for typed access.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Client { config: Arc<Config> }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Arc::new(Config { url: "db://local".into() }));
/// builder.register(|ctx, _| Ok(Arc::new(Client { config: ctx.resolve::<Config>()? })));
///
/// let container = builder.build().unwrap();
/// assert_eq!(container.resolve::<Client>().unwrap().config.url, "db://local");
/// ```
pub struct ResolveContext<'a> {
    operation: &'a ResolveOperation,
    scope: &'a LifetimeScope,
    service: &'a Service,
    registration: &'a Arc<ComponentRegistration>,
    decorator_target: Option<&'a Instance>,
}

impl<'a> ResolveContext<'a> {
    pub(crate) fn new(
        operation: &'a ResolveOperation,
        scope: &'a LifetimeScope,
        service: &'a Service,
        registration: &'a Arc<ComponentRegistration>,
        decorator_target: Option<&'a Instance>,
    ) -> Self {
        Self {
            operation,
            scope,
            service,
            registration,
            decorator_target,
        }
    }

    /// Scope the instance is activated in.
    pub fn scope(&self) -> &'a LifetimeScope {
        self.scope
    }

    /// Service being built.
    pub fn service(&self) -> &'a Service {
        self.service
    }

    /// Registration being activated.
    pub fn registration(&self) -> &'a Arc<ComponentRegistration> {
        self.registration
    }

    /// Operation the activation belongs to.
    pub fn operation(&self) -> &'a ResolveOperation {
        self.operation
    }

    /// Depth of the resolution stack.
    pub fn depth(&self) -> usize {
        self.operation.depth()
    }

    /// For decorators, the instance being decorated.
    pub fn decorator_target(&self) -> Option<&'a Instance> {
        self.decorator_target
    }

    /// Typed decorator target.
    pub fn decorated<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.decorator_target
            .and_then(|instance| instance.downcast::<T>())
            .ok_or_else(|| DiError::TypeMismatch {
                service: self.service.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Registrations available for `service`, default first.
    pub fn registrations_for(&self, service: &Service) -> Arc<[Arc<ComponentRegistration>]> {
        self.scope.registry().registrations_for(service)
    }

    /// Resolves one specific registration as part of this operation.
    pub fn resolve_registration(
        &self,
        service: &Service,
        registration: &Arc<ComponentRegistration>,
        parameters: &Parameters,
    ) -> DiResult<Instance> {
        self.operation
            .resolve_request(self.scope, service, registration, parameters, None)
    }

    pub(crate) fn resolve_registration_in(
        &self,
        scope: &LifetimeScope,
        service: &Service,
        registration: &Arc<ComponentRegistration>,
        parameters: &Parameters,
    ) -> DiResult<Instance> {
        self.operation
            .resolve_request(scope, service, registration, parameters, None)
    }
}

impl ResolverCore for ResolveContext<'_> {
    fn resolve_service_with(&self, service: &Service, parameters: &Parameters) -> DiResult<Instance> {
        self.operation.resolve_default(self.scope, service, parameters)
    }

    fn is_service_registered(&self, service: &Service) -> bool {
        self.scope.registry().is_registered(service)
    }

    fn add_for_disposal(&self, entry: DisposerEntry) -> DiResult<()> {
        self.scope.disposer().add_for_disposal(entry)
    }
}
