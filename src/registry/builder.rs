use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::decoration::DecoratorRegistration;
use crate::pipeline::{InsertionMode, MiddlewareEntry, ResolveMiddleware};
use crate::registration::{ComponentRegistration, RegistrationId};
use crate::registry::{ComponentRegistry, RegistrationList};
use crate::service::Service;
use crate::sources::RegistrationSource;

/// Collects registrations, sources, decorators and middleware, then seals
/// them into a [`ComponentRegistry`].
///
/// ```rust
/// use ferrous_resolve::{ComponentRegistration, ComponentRegistryBuilder, Instance, Service};
///
/// let mut builder = ComponentRegistryBuilder::new();
/// let first = builder.register(
///     ComponentRegistration::builder(|_, _| Ok(Instance::from_value(1u8))).service(Service::of::<u8>()).build(),
/// );
/// let second = builder.register(
///     ComponentRegistration::builder(|_, _| Ok(Instance::from_value(2u8))).service(Service::of::<u8>()).build(),
/// );
/// let registry = builder.build();
///
/// let found = registry.find_registrations(&Service::of::<u8>());
/// assert_eq!(found.iter().map(|r| r.id()).collect::<Vec<_>>(), vec![second, first]);
/// ```
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    registrations: Vec<ComponentRegistration>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    decorators: Vec<DecoratorRegistration>,
    middleware: Vec<MiddlewareEntry>,
    service_middleware: Vec<(Service, MiddlewareEntry)>,
    adapters: AHashMap<TypeId, Service>,
}

impl ComponentRegistryBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `registration`; later registrations become the default for the
    /// services they share with earlier ones.
    pub fn register(&mut self, mut registration: ComponentRegistration) -> RegistrationId {
        if registration.order.is_none() {
            registration.order = Some(self.registrations.len() as u64);
        }
        let id = registration.id();
        self.registrations.push(registration);
        id
    }

    /// Appends a registration source; sources are queried in insertion order.
    pub fn add_source(&mut self, source: Arc<dyn RegistrationSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Makes the plain type of an adapter service resolvable, so a request
    /// for `Service::of::<All<T>>()` finds the same registrations as
    /// `All::<T>::service()`. Services without adapter information are
    /// ignored.
    pub fn expose_adapter(&mut self, service: Service) -> &mut Self {
        if service.adapter_info().is_some() && !service.is_keyed() {
            self.adapters.insert(service.type_id(), service);
        }
        self
    }

    /// Adds a decorator.
    pub fn register_decorator(&mut self, decorator: DecoratorRegistration) -> RegistrationId {
        let id = decorator.id();
        self.decorators.push(decorator);
        id
    }

    /// Attaches middleware to every registration's pipeline.
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

    /// Number of registrations added so far.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Seals the registry.
    pub fn build(self) -> ComponentRegistry {
        let registrations: Vec<Arc<ComponentRegistration>> = self.registrations.into_iter().map(Arc::new).collect();

        let mut by_service: AHashMap<Service, (Vec<Arc<ComponentRegistration>>, Vec<Arc<ComponentRegistration>>)> =
            AHashMap::new();
        for registration in &registrations {
            for service in registration.services() {
                let (overriding, preserving) = by_service.entry(service.clone()).or_default();
                if registration.preserves_existing_defaults() {
                    preserving.push(registration.clone());
                } else {
                    overriding.push(registration.clone());
                }
            }
        }
        // Most recent overriding registration first, then preserving ones in
        // the order they were added.
        let index: AHashMap<Service, RegistrationList> = by_service
            .into_iter()
            .map(|(service, (overriding, preserving))| {
                let ordered: Vec<_> = overriding.into_iter().rev().chain(preserving).collect();
                (service, ordered.into())
            })
            .collect();

        let mut decorators: AHashMap<Service, Vec<DecoratorRegistration>> = AHashMap::new();
        for decorator in self.decorators {
            decorators.entry(decorator.service().clone()).or_default().push(decorator);
        }
        let decorators = decorators
            .into_iter()
            .map(|(service, list)| (service, list.into()))
            .collect();

        let mut service_middleware: AHashMap<Service, Vec<MiddlewareEntry>> = AHashMap::new();
        for (service, entry) in self.service_middleware {
            service_middleware.entry(service).or_default().push(entry);
        }

        debug!(
            registrations = registrations.len(),
            services = index.len(),
            sources = self.sources.len(),
            adapters = self.adapters.len(),
            "Built component registry"
        );

        ComponentRegistry {
            registrations,
            index,
            sources: self.sources,
            synthesized: RwLock::new(AHashMap::new()),
            decorators,
            middleware: self.middleware,
            service_middleware,
            adapters: self.adapters,
            activation_lock: Mutex::new(()),
        }
    }
}
