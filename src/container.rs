//! Typed registration front end and the built container.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::config::ContainerOptions;
use crate::decoration::{DecoratorContext, DecoratorRegistration};
use crate::descriptors::ComponentDescriptor;
use crate::disposer::DisposerEntry;
use crate::error::DiResult;
use crate::instance::Instance;
use crate::lifetime::{Lifetime, Ownership, ScopeTag};
use crate::metadata::MetadataValue;
use crate::observer::{Observers, ResolveObserver};
use crate::operation::ResolveContext;
use crate::parameters::{Parameter, Parameters};
use crate::pipeline::{InsertionMode, MiddlewareEntry, ResolveMiddleware};
use crate::registration::{
    ActivatedEvent, ActivatingEvent, ComponentRegistration, ComponentRegistrationBuilder, RegistrationId,
    RegistrationOrigin,
};
use crate::registry::{ComponentRegistry, ComponentRegistryBuilder};
use crate::scope::{ContainerShared, LifetimeScope};
use crate::service::{Service, ServiceKey};
use crate::sources::{self, RegistrationSource};
use crate::traits::{AsyncDispose, Dispose, ResolverCore};

/// Collects registrations and builds a [`Container`].
///
/// Later registrations of a service become its default; earlier ones stay
/// reachable through `All<T>` and `Index<T>`.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
/// struct Users {
///     db: Arc<Database>,
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register(|_, _| Ok(Arc::new(Database { url: "postgres://localhost".into() })))
///     .single_instance();
/// builder.register(|ctx, _| Ok(Arc::new(Users { db: ctx.resolve::<Database>()? })));
///
/// let container = builder.build().unwrap();
/// let users = container.resolve::<Users>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    options: ContainerOptions,
    pending: Vec<ComponentRegistrationBuilder>,
    components: Vec<ComponentRegistration>,
    next_order: u64,
    decorators: Vec<DecoratorRegistration>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    middleware: Vec<MiddlewareEntry>,
    service_middleware: Vec<(Service, MiddlewareEntry)>,
    adapters: Vec<Service>,
    observers: Observers,
}

impl ContainerBuilder {
    /// A builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder with `options`.
    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Registers a component built by `activator`.
    ///
    /// The component is exposed as `T` unless services are configured on
    /// the returned builder, and is built anew for every dependency unless a
    /// lifetime is set.
    pub fn register<T, F>(&mut self, activator: F) -> RegistrationBuilder<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>, &Parameters) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let mut registration =
            ComponentRegistration::builder(move |ctx, params| activator(ctx, params).map(Instance::new));
        registration.fallback_service(Service::of::<T>());
        self.expose_adapters_of::<T>();
        self.push_pending(registration)
    }

    /// Registers an existing instance, shared by the whole container.
    pub fn register_instance<T>(&mut self, instance: Arc<T>) -> RegistrationBuilder<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut builder = self.register(move |_, _| Ok(instance.clone()));
        builder.single_instance();
        builder
    }

    /// Adds a prebuilt registration.
    pub fn register_component(&mut self, mut registration: ComponentRegistration) -> &mut Self {
        if registration.order.is_none() {
            registration.order = Some(self.take_order());
        }
        self.components.push(registration);
        self
    }

    /// Decorates every instance of `T` with `decorator`, which receives the
    /// instance built so far.
    pub fn register_decorator<T, F>(&mut self, decorator: F) -> DecoratorBuilder<'_>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>, &Parameters, Arc<T>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let registration = ComponentRegistration::builder(move |ctx, params| {
            let target = ctx.decorated::<T>()?;
            decorator(ctx, params, target).map(Instance::new)
        })
        .origin(RegistrationOrigin::Decorator)
        .build();
        self.register_decorator_registration(DecoratorRegistration::new(Service::of::<T>(), registration))
    }

    /// Adds an untyped decorator.
    pub fn register_decorator_registration(&mut self, decorator: DecoratorRegistration) -> DecoratorBuilder<'_> {
        let index = self.decorators.len();
        self.decorators.push(decorator);
        DecoratorBuilder {
            decorator: &mut self.decorators[index],
        }
    }

    /// Lets `All<T>`, `Lazy<T>` and the other adapters over `T` be resolved
    /// by their plain type, as in `resolve::<All<T>>()`.
    ///
    /// Types registered through [`register`](Self::register) or exposed
    /// through a typed cast are covered automatically; this is for types
    /// only reached through [`register_component`](Self::register_component)
    /// or not registered at all.
    ///
    /// ```rust
    /// use ferrous_resolve::{All, ContainerBuilder, Resolver};
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.expose_adapters_of::<String>();
    /// let container = builder.build().unwrap();
    ///
    /// assert!(container.resolve::<All<String>>().unwrap().is_empty());
    /// ```
    pub fn expose_adapters_of<T>(&mut self) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.adapters.extend(sources::adapter_services::<T>());
        self
    }

    /// Adds a registration source, queried after the built-in ones are
    /// considered only if the service has no static registration.
    pub fn add_source(&mut self, source: Arc<dyn RegistrationSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Attaches middleware to every pipeline.
    pub fn use_middleware(&mut self, middleware: Arc<dyn ResolveMiddleware>, mode: InsertionMode) -> &mut Self {
        self.middleware.push(MiddlewareEntry::new(middleware, mode));
        self
    }

    /// Attaches middleware to the pipelines of registrations exposing `service`.
    pub fn use_service_middleware(
        &mut self,
        service: Service,
        middleware: Arc<dyn ResolveMiddleware>,
        mode: InsertionMode,
    ) -> &mut Self {
        self.service_middleware.push((service, MiddlewareEntry::new(middleware, mode)));
        self
    }

    /// Adds a resolution observer.
    pub fn add_observer(&mut self, observer: Arc<dyn ResolveObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Number of registrations so far, decorators excluded.
    pub fn len(&self) -> usize {
        self.pending.len() + self.components.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seals the registrations and creates the root scope, then builds
    /// every auto-activated component.
    pub fn build(self) -> DiResult<Container> {
        let mut registrations: Vec<ComponentRegistration> = self
            .pending
            .into_iter()
            .map(ComponentRegistrationBuilder::build)
            .chain(self.components)
            .collect();
        registrations.sort_by_key(ComponentRegistration::order);

        let mut registry = ComponentRegistryBuilder::new();
        for registration in registrations {
            registry.register(registration);
        }
        for source in self.sources {
            registry.add_source(source);
        }
        if self.options.register_default_sources {
            for source in sources::default_sources() {
                registry.add_source(source);
            }
        }
        for decorator in self.decorators {
            registry.register_decorator(decorator);
        }
        for entry in self.middleware {
            registry.use_middleware(entry.middleware, entry.mode);
        }
        for (service, entry) in self.service_middleware {
            registry.use_service_middleware(service, entry.middleware, entry.mode);
        }
        for adapter in self.adapters {
            registry.expose_adapter(adapter);
        }

        let shared = Arc::new(ContainerShared::new(registry.build(), self.options, self.observers));
        let container = Container {
            root: LifetimeScope::root(shared),
        };
        container.auto_activate()?;
        Ok(container)
    }

    fn take_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    fn push_pending<T: ?Sized>(&mut self, mut registration: ComponentRegistrationBuilder) -> RegistrationBuilder<'_, T> {
        registration.set_order(self.take_order());
        let index = self.pending.len();
        self.pending.push(registration);
        RegistrationBuilder {
            registration: &mut self.pending[index],
            adapters: &mut self.adapters,
            _marker: PhantomData,
        }
    }
}

/// Configures one typed registration. Every method returns `&mut Self`,
/// so calls chain off [`ContainerBuilder::register`].
pub struct RegistrationBuilder<'b, T: ?Sized> {
    registration: &'b mut ComponentRegistrationBuilder,
    adapters: &'b mut Vec<Service>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> RegistrationBuilder<'_, T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// Sets the sharing policy.
    pub fn lifetime(&mut self, lifetime: Lifetime) -> &mut Self {
        self.registration.set_lifetime(lifetime);
        self
    }

    /// One instance for the whole container.
    pub fn single_instance(&mut self) -> &mut Self {
        self.lifetime(Lifetime::Root)
    }

    /// One instance per lifetime scope.
    pub fn instance_per_scope(&mut self) -> &mut Self {
        self.lifetime(Lifetime::per_scope())
    }

    /// One instance per scope tagged `tag`, shared by its descendants.
    pub fn instance_per_matching_scope(&mut self, tag: impl Into<ScopeTag>) -> &mut Self {
        self.lifetime(Lifetime::matching(tag))
    }

    /// One instance per `Owned<U>` resolution, shared by everything that
    /// resolution builds.
    pub fn instance_per_owned<U: ?Sized + 'static>(&mut self) -> &mut Self {
        self.lifetime(Lifetime::per_owned::<U>())
    }

    /// A new instance for every dependency. This is the default.
    pub fn instance_per_dependency(&mut self) -> &mut Self {
        self.lifetime(Lifetime::PerDependency)
    }

    /// Also exposes the component as `T`.
    pub fn as_self(&mut self) -> &mut Self {
        self.registration.add_service(Service::of::<T>());
        self
    }

    /// Exposes the component as `U` through `cast`.
    ///
    /// ```rust
    /// use ferrous_resolve::{ContainerBuilder, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    /// struct Fixed;
    /// impl Clock for Fixed {
    ///     fn now(&self) -> u64 { 42 }
    /// }
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder
    ///     .register(|_, _| Ok(Arc::new(Fixed)))
    ///     .as_service::<dyn Clock, _>(|fixed| fixed)
    ///     .as_self();
    /// let container = builder.build().unwrap();
    ///
    /// assert_eq!(container.resolve::<dyn Clock>().unwrap().now(), 42);
    /// assert!(container.is_registered::<Fixed>());
    /// ```
    pub fn as_service<U, F>(&mut self, cast: F) -> &mut Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        self.push_cast(Service::of::<U>(), cast)
    }

    /// Exposes the component as `T` under `name`.
    pub fn named(&mut self, name: impl Into<Cow<'static, str>>) -> &mut Self {
        self.keyed(ServiceKey::Name(name.into()))
    }

    /// Exposes the component as `T` under `key`.
    pub fn keyed(&mut self, key: impl Into<ServiceKey>) -> &mut Self {
        self.registration.add_service(Service::keyed::<T>(key));
        self
    }

    /// Exposes the component as `U` under `key`, through `cast`.
    pub fn keyed_as<U, F>(&mut self, key: impl Into<ServiceKey>, cast: F) -> &mut Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        self.push_cast(Service::keyed::<U>(key), cast)
    }

    /// Attaches a metadata entry.
    pub fn with_metadata(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> &mut Self {
        self.registration.metadata_mut().insert(key, value);
        self
    }

    /// Adds a default parameter, consulted after the caller's parameters.
    pub fn with_parameter(&mut self, parameter: Parameter) -> &mut Self {
        self.registration.push_parameter(parameter);
        self
    }

    /// The container never disposes instances of this component.
    pub fn externally_owned(&mut self) -> &mut Self {
        self.registration.set_ownership(Ownership::ExternallyOwned);
        self
    }

    /// Keeps an earlier registration as the default for shared services.
    pub fn preserve_existing_defaults(&mut self) -> &mut Self {
        self.registration.set_preserve_existing_defaults();
        self
    }

    /// Builds the component when the container is built.
    pub fn auto_activate(&mut self) -> &mut Self {
        self.registration.set_auto_activate();
        self
    }

    /// Runs `handler` right after each activation; it may replace the instance.
    pub fn on_activating<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut ActivatingEvent<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.registration.push_activating(Arc::new(handler));
        self
    }

    /// Runs `handler` once the resolve operation that activated the
    /// instance completes.
    pub fn on_activated<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&ActivatedEvent<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        self.registration.push_activated(Arc::new(handler));
        self
    }

    /// Disposes instances with [`Dispose`] when their owning scope ends.
    pub fn disposable(&mut self) -> &mut Self
    where
        T: Dispose,
    {
        self.registration
            .set_disposal(Arc::new(|instance: &Instance| instance.downcast::<T>().map(DisposerEntry::sync)));
        self
    }

    /// Disposes instances with [`AsyncDispose`]; the owning scope must be
    /// disposed with `dispose_async`.
    pub fn async_disposable(&mut self) -> &mut Self
    where
        T: AsyncDispose,
    {
        self.registration.set_disposal(Arc::new(|instance: &Instance| {
            instance.downcast::<T>().map(DisposerEntry::asynchronous)
        }));
        self
    }

    /// Attaches middleware to this registration's pipeline only.
    pub fn use_middleware(&mut self, middleware: Arc<dyn ResolveMiddleware>, mode: InsertionMode) -> &mut Self {
        self.registration.push_middleware(MiddlewareEntry::new(middleware, mode));
        self
    }

    fn push_cast<U, F>(&mut self, service: Service, cast: F) -> &mut Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        self.adapters.extend(sources::adapter_services::<U>());
        self.registration.push_cast(
            service,
            Arc::new(move |raw: &Instance| raw.downcast::<T>().map(|value| Instance::new(cast(value)))),
        );
        self
    }
}

/// Configures a decorator added with [`ContainerBuilder::register_decorator`].
pub struct DecoratorBuilder<'b> {
    decorator: &'b mut DecoratorRegistration,
}

impl DecoratorBuilder<'_> {
    /// Only decorates when `condition` holds.
    ///
    /// ```rust
    /// use ferrous_resolve::{ContainerBuilder, Resolver};
    /// use std::sync::Arc;
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register(|_, _| Ok(Arc::new(String::from("plain"))));
    /// builder
    ///     .register(|_, _| Ok(Arc::new(String::from("audited"))))
    ///     .with_metadata("audit", true)
    ///     .preserve_existing_defaults();
    /// builder
    ///     .register_decorator::<String, _>(|_, _, inner| Ok(Arc::new(format!("[{inner}]"))))
    ///     .when(|ctx| ctx.metadata().get("audit").and_then(|v| v.as_bool()).unwrap_or(false));
    /// let container = builder.build().unwrap();
    ///
    /// let all = container.resolve_all::<String>().unwrap();
    /// let values: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
    /// assert_eq!(values, vec!["plain", "[audited]"]);
    /// ```
    pub fn when<F>(&mut self, condition: F) -> &mut Self
    where
        F: Fn(&DecoratorContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.decorator.set_condition(Arc::new(condition));
        self
    }

    /// Id of the decorator registration, for use in other decorators'
    /// conditions.
    pub fn id(&self) -> RegistrationId {
        self.decorator.id()
    }

    /// Decorates the keyed service instead of the unkeyed one.
    pub fn keyed(&mut self, key: impl Into<ServiceKey>) -> &mut Self {
        let service = self.decorator.service().with_key(key);
        self.decorator.set_service(service);
        self
    }
}

/// A built container: the registry plus its root lifetime scope.
///
/// Dereferences to the root [`LifetimeScope`], so everything a scope can do
/// is available directly.
pub struct Container {
    root: LifetimeScope,
}

impl Container {
    /// The root scope.
    pub fn scope(&self) -> &LifetimeScope {
        &self.root
    }

    /// Descriptors of all static registrations, in registration order.
    pub fn descriptors(&self) -> Vec<ComponentDescriptor> {
        self.root
            .registry()
            .registrations()
            .iter()
            .map(|registration| ComponentDescriptor::from(&**registration))
            .collect()
    }

    fn auto_activate(&self) -> DiResult<()> {
        let registry: &ComponentRegistry = self.root.registry();
        let _guard = registry.activation_lock();
        let mut activated = 0usize;
        for registration in registry.registrations().iter().filter(|r| r.is_auto_activated()) {
            if registration.auto_activated.swap(true, Ordering::AcqRel) {
                continue;
            }
            let Some(service) = registration.services().first() else {
                continue;
            };
            self.root
                .resolve_registration(service, registration, &Parameters::empty())?;
            activated += 1;
        }
        if activated > 0 {
            debug!(components = activated, "Auto-activated components");
        }
        Ok(())
    }
}

impl Deref for Container {
    type Target = LifetimeScope;

    fn deref(&self) -> &LifetimeScope {
        &self.root
    }
}

impl ResolverCore for Container {
    fn resolve_service_with(&self, service: &Service, parameters: &Parameters) -> DiResult<Instance> {
        self.root.resolve_service_with(service, parameters)
    }

    fn is_service_registered(&self, service: &Service) -> bool {
        self.root.is_service_registered(service)
    }

    fn add_for_disposal(&self, entry: DisposerEntry) -> DiResult<()> {
        self.root.add_for_disposal(entry)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("root", &self.root).finish()
    }
}
