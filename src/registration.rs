//! Component registrations: what can be built and how it is shared.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::disposer::DisposerEntry;
use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::lifetime::{Lifetime, Ownership};
use crate::metadata::{Metadata, MetadataValue};
use crate::operation::ResolveContext;
use crate::parameters::{Parameter, Parameters};
use crate::pipeline::{InsertionMode, MiddlewareEntry, ResolveMiddleware, ResolvePipeline};
use crate::scope::LifetimeScope;
use crate::service::Service;

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Builds a raw instance. The engine never looks inside.
pub type Activator = Arc<dyn Fn(&ResolveContext<'_>, &Parameters) -> DiResult<Instance> + Send + Sync>;

/// Converts a raw instance into the representation of one exposed service.
pub(crate) type ServiceCast = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Produces a disposer entry for a freshly activated instance.
pub(crate) type DisposalHook = Arc<dyn Fn(&Instance) -> Option<DisposerEntry> + Send + Sync>;

/// Runs right after activation and may replace the instance.
pub type ActivatingHandler = Arc<dyn Fn(&mut ActivatingEvent<'_>) -> DiResult<()> + Send + Sync>;

/// Runs once the whole top-level resolve operation has succeeded.
pub type ActivatedHandler = Arc<dyn Fn(&ActivatedEvent<'_>) -> DiResult<()> + Send + Sync>;

/// Where a registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOrigin {
    /// Registered explicitly before the container was built.
    Explicit,
    /// Synthesized on demand by a registration source.
    Source {
        /// Source name.
        name: &'static str,
        /// Whether the source adapts individual registrations one to one.
        adapter: bool,
    },
    /// A decorator of another service.
    Decorator,
}

/// Data handed to `on_activating` handlers.
pub struct ActivatingEvent<'a> {
    context: &'a ResolveContext<'a>,
    parameters: &'a Parameters,
    instance: Instance,
}

impl<'a> ActivatingEvent<'a> {
    pub(crate) fn new(context: &'a ResolveContext<'a>, parameters: &'a Parameters, instance: Instance) -> Self {
        Self { context, parameters, instance }
    }

    /// Context the instance was activated in; can resolve further services.
    pub fn context(&self) -> &ResolveContext<'a> {
        self.context
    }

    /// Parameters of the request.
    pub fn parameters(&self) -> &Parameters {
        self.parameters
    }

    /// The activated instance.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The activated instance as `T`.
    pub fn instance_as<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instance.downcast::<T>()
    }

    /// Substitutes the instance for the rest of the pipeline.
    pub fn replace_instance(&mut self, instance: Instance) {
        self.instance = instance;
    }

    /// Typed form of [`replace_instance`](Self::replace_instance).
    pub fn replace<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.instance = Instance::new(value);
    }

    pub(crate) fn into_instance(self) -> Instance {
        self.instance
    }
}

/// Data handed to `on_activated` handlers.
pub struct ActivatedEvent<'a> {
    pub(crate) scope: &'a LifetimeScope,
    pub(crate) registration: &'a ComponentRegistration,
    pub(crate) parameters: &'a Parameters,
    pub(crate) instance: &'a Instance,
}

impl ActivatedEvent<'_> {
    /// Scope that owns the instance.
    pub fn scope(&self) -> &LifetimeScope {
        self.scope
    }

    /// Registration that produced the instance.
    pub fn registration(&self) -> &ComponentRegistration {
        self.registration
    }

    /// Parameters of the request.
    pub fn parameters(&self) -> &Parameters {
        self.parameters
    }

    /// The activated instance.
    pub fn instance(&self) -> &Instance {
        self.instance
    }

    /// The activated instance as `T`.
    pub fn instance_as<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instance.downcast::<T>()
    }
}

/// Immutable description of a component.
///
/// A registration names the services it satisfies, the lifetime that decides
/// where instances are cached, who disposes them, and the activator that
/// builds a raw instance. Its resolve pipeline is compiled once, the first
/// time the registry needs it, and never changes afterwards.
///
/// Registrations are usually produced by [`ContainerBuilder`](crate::ContainerBuilder);
/// [`ComponentRegistration::builder`] is the untyped form used by
/// registration sources.
///
/// ```rust
/// use ferrous_resolve::{ComponentRegistration, Instance, Lifetime, Service};
///
/// let registration = ComponentRegistration::builder(|_, _| Ok(Instance::from_value(5u8)))
///     .service(Service::of::<u8>())
///     .lifetime(Lifetime::Root)
///     .metadata("answer", 5)
///     .build();
/// assert_eq!(registration.services(), &[Service::of::<u8>()]);
/// assert!(registration.lifetime().is_shared());
/// ```
pub struct ComponentRegistration {
    pub(crate) id: RegistrationId,
    pub(crate) services: Vec<Service>,
    pub(crate) lifetime: Lifetime,
    pub(crate) ownership: Ownership,
    pub(crate) activator: Activator,
    pub(crate) casts: Vec<(Service, ServiceCast)>,
    pub(crate) metadata: Metadata,
    pub(crate) parameters: Parameters,
    pub(crate) preserve_existing_defaults: bool,
    pub(crate) auto_activate: bool,
    pub(crate) auto_activated: AtomicBool,
    pub(crate) disposal: Option<DisposalHook>,
    pub(crate) activating: Vec<ActivatingHandler>,
    pub(crate) activated: Vec<ActivatedHandler>,
    pub(crate) middleware: Vec<MiddlewareEntry>,
    pub(crate) origin: RegistrationOrigin,
    pub(crate) target: Option<RegistrationId>,
    pub(crate) order: Option<u64>,
    pub(crate) pipeline: OnceCell<ResolvePipeline>,
}

impl ComponentRegistration {
    /// Starts a registration around `activator`.
    pub fn builder<F>(activator: F) -> ComponentRegistrationBuilder
    where
        F: Fn(&ResolveContext<'_>, &Parameters) -> DiResult<Instance> + Send + Sync + 'static,
    {
        ComponentRegistrationBuilder::new(Arc::new(activator))
    }

    /// Unique id.
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Services this registration satisfies.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Sharing policy.
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Disposal responsibility.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Attached metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Default parameters appended after caller parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Where the registration came from.
    pub fn origin(&self) -> RegistrationOrigin {
        self.origin
    }

    /// For adapter registrations, the registration being adapted.
    pub fn target(&self) -> Option<RegistrationId> {
        self.target
    }

    /// Registration order; adapters share the order of their target.
    pub fn order(&self) -> u64 {
        self.order.unwrap_or(u64::MAX)
    }

    /// Whether the registration should not replace an existing default.
    pub fn preserves_existing_defaults(&self) -> bool {
        self.preserve_existing_defaults
    }

    /// Whether the component is built when the container is built.
    pub fn is_auto_activated(&self) -> bool {
        self.auto_activate
    }

    /// Whether auto-activation already ran.
    pub fn auto_activation_done(&self) -> bool {
        self.auto_activated.load(Ordering::Acquire)
    }

    /// Compiled pipeline, once the registry has compiled it.
    pub fn pipeline(&self) -> Option<&ResolvePipeline> {
        self.pipeline.get()
    }

    pub(crate) fn activator(&self) -> &Activator {
        &self.activator
    }

    pub(crate) fn has_activation_handlers(&self) -> bool {
        !self.activating.is_empty() || !self.activated.is_empty()
    }

    /// Converts a raw instance to the representation of `service`.
    pub(crate) fn convert(&self, service: &Service, instance: &Instance) -> DiResult<Instance> {
        match self.casts.iter().find(|(s, _)| s == service) {
            None => Ok(instance.clone()),
            Some((_, cast)) => cast(instance).ok_or_else(|| DiError::TypeMismatch {
                service: service.clone(),
                expected: service.type_name(),
            }),
        }
    }

    pub(crate) fn disposal_entry(&self, instance: &Instance) -> Option<DisposerEntry> {
        match self.ownership {
            Ownership::ExternallyOwned => None,
            Ownership::OwnedByScope => self.disposal.as_ref().and_then(|hook| hook(instance)),
        }
    }
}

impl fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("id", &self.id)
            .field("services", &self.services)
            .field("lifetime", &self.lifetime)
            .field("ownership", &self.ownership)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`ComponentRegistration`].
pub struct ComponentRegistrationBuilder {
    activator: Activator,
    services: Vec<Service>,
    fallback_service: Option<Service>,
    lifetime: Lifetime,
    ownership: Ownership,
    casts: Vec<(Service, ServiceCast)>,
    metadata: Metadata,
    parameters: Vec<Parameter>,
    preserve_existing_defaults: bool,
    auto_activate: bool,
    disposal: Option<DisposalHook>,
    activating: Vec<ActivatingHandler>,
    activated: Vec<ActivatedHandler>,
    middleware: Vec<MiddlewareEntry>,
    origin: RegistrationOrigin,
    target: Option<RegistrationId>,
    order: Option<u64>,
}

impl ComponentRegistrationBuilder {
    fn new(activator: Activator) -> Self {
        Self {
            activator,
            services: Vec::new(),
            fallback_service: None,
            lifetime: Lifetime::PerDependency,
            ownership: Ownership::OwnedByScope,
            casts: Vec::new(),
            metadata: Metadata::new(),
            parameters: Vec::new(),
            preserve_existing_defaults: false,
            auto_activate: false,
            disposal: None,
            activating: Vec::new(),
            activated: Vec::new(),
            middleware: Vec::new(),
            origin: RegistrationOrigin::Explicit,
            target: None,
            order: None,
        }
    }

    /// Adds a service the registration satisfies.
    pub fn service(mut self, service: Service) -> Self {
        self.add_service(service);
        self
    }

    /// Adds several services.
    pub fn services(mut self, services: impl IntoIterator<Item = Service>) -> Self {
        for service in services {
            self.add_service(service);
        }
        self
    }

    /// Sets the sharing policy.
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets who disposes instances.
    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Attaches a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Replaces all metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds a default parameter.
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Keeps the current default for each service.
    pub fn preserve_existing_defaults(mut self) -> Self {
        self.preserve_existing_defaults = true;
        self
    }

    /// Builds the component when the container is built.
    pub fn auto_activate(mut self) -> Self {
        self.auto_activate = true;
        self
    }

    /// Registers `handler` to run right after activation.
    pub fn on_activating<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut ActivatingEvent<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.activating.push(Arc::new(handler));
        self
    }

    /// Registers `handler` to run when the top-level operation completes.
    pub fn on_activated<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ActivatedEvent<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.activated.push(Arc::new(handler));
        self
    }

    /// Decides how activated instances are disposed.
    pub fn dispose_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance) -> Option<DisposerEntry> + Send + Sync + 'static,
    {
        self.disposal = Some(Arc::new(hook));
        self
    }

    /// Exposes `service` through a conversion of the raw instance.
    pub fn cast<F>(mut self, service: Service, cast: F) -> Self
    where
        F: Fn(&Instance) -> Option<Instance> + Send + Sync + 'static,
    {
        self.add_service(service.clone());
        self.casts.push((service, Arc::new(cast)));
        self
    }

    /// Attaches middleware to this registration's pipeline.
    pub fn middleware(mut self, middleware: Arc<dyn ResolveMiddleware>, mode: InsertionMode) -> Self {
        self.middleware.push(MiddlewareEntry::new(middleware, mode));
        self
    }

    /// Marks where the registration came from.
    pub fn origin(mut self, origin: RegistrationOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Records the registration this one adapts and inherits its order.
    pub fn adapts(mut self, target: &ComponentRegistration) -> Self {
        self.target = Some(target.id);
        self.order = target.order;
        self
    }

    pub(crate) fn fallback_service(&mut self, service: Service) {
        self.fallback_service = Some(service);
    }

    pub(crate) fn add_service(&mut self, service: Service) {
        if !self.services.contains(&service) {
            self.services.push(service);
        }
    }

    pub(crate) fn push_cast(&mut self, service: Service, cast: ServiceCast) {
        self.add_service(service.clone());
        self.casts.push((service, cast));
    }

    pub(crate) fn set_lifetime(&mut self, lifetime: Lifetime) {
        self.lifetime = lifetime;
    }

    pub(crate) fn set_ownership(&mut self, ownership: Ownership) {
        self.ownership = ownership;
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub(crate) fn push_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub(crate) fn set_preserve_existing_defaults(&mut self) {
        self.preserve_existing_defaults = true;
    }

    pub(crate) fn set_auto_activate(&mut self) {
        self.auto_activate = true;
    }

    pub(crate) fn set_disposal(&mut self, hook: DisposalHook) {
        self.disposal = Some(hook);
    }

    pub(crate) fn push_activating(&mut self, handler: ActivatingHandler) {
        self.activating.push(handler);
    }

    pub(crate) fn push_activated(&mut self, handler: ActivatedHandler) {
        self.activated.push(handler);
    }

    pub(crate) fn push_middleware(&mut self, entry: MiddlewareEntry) {
        self.middleware.push(entry);
    }

    pub(crate) fn set_order(&mut self, order: u64) {
        self.order = Some(order);
    }

    /// Finishes the registration. A registration with no explicit service
    /// exposes the service it was created for, if any.
    pub fn build(mut self) -> ComponentRegistration {
        if self.services.is_empty() {
            if let Some(fallback) = self.fallback_service.take() {
                self.services.push(fallback);
            }
        }
        ComponentRegistration {
            id: RegistrationId::next(),
            services: self.services,
            lifetime: self.lifetime,
            ownership: self.ownership,
            activator: self.activator,
            casts: self.casts,
            metadata: self.metadata,
            parameters: self.parameters.into(),
            preserve_existing_defaults: self.preserve_existing_defaults,
            auto_activate: self.auto_activate,
            auto_activated: AtomicBool::new(false),
            disposal: self.disposal,
            activating: self.activating,
            activated: self.activated,
            middleware: self.middleware,
            origin: self.origin,
            target: self.target,
            order: self.order,
            pipeline: OnceCell::new(),
        }
    }
}
