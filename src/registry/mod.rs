//! The sealed set of registrations a container resolves from.

mod builder;

use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::trace;

use crate::decoration::{DecoratorMiddleware, DecoratorRegistration};
use crate::pipeline::middleware::{
    ActivatorMiddleware, NotificationMiddleware, ParameterMiddleware, ScopeSelectionMiddleware,
    ServiceConversionMiddleware, SharingMiddleware,
};
use crate::pipeline::{InsertionMode, MiddlewareEntry, PipelineBuilder, ResolvePipeline};
use crate::registration::{ComponentRegistration, RegistrationOrigin};
use crate::service::Service;
use crate::sources::RegistrationSource;

pub use builder::ComponentRegistryBuilder;

/// Registrations of one service, default first.
pub type RegistrationList = Arc<[Arc<ComponentRegistration>]>;

/// Immutable registrations plus lazily synthesized ones.
///
/// Static lookups read a map that never changes after the registry is
/// built. Only services with no static registration reach the sources;
/// their answers are cached, and when two threads race on the same service
/// the first answer stored is the one everybody uses.
pub struct ComponentRegistry {
    registrations: Vec<Arc<ComponentRegistration>>,
    index: AHashMap<Service, RegistrationList>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    synthesized: RwLock<AHashMap<Service, RegistrationList>>,
    decorators: AHashMap<Service, Arc<[DecoratorRegistration]>>,
    middleware: Vec<MiddlewareEntry>,
    service_middleware: AHashMap<Service, Vec<MiddlewareEntry>>,
    adapters: AHashMap<TypeId, Service>,
    activation_lock: Mutex<()>,
}

impl ComponentRegistry {
    /// Starts an empty registry.
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::new()
    }

    /// Registrations satisfying `service`, default first.
    ///
    /// Static registrations win; sources are only consulted for services
    /// with none.
    pub fn registrations_for(&self, service: &Service) -> RegistrationList {
        let service = &self.canonical(service);
        if let Some(found) = self.index.get(service) {
            return found.clone();
        }
        if self.sources.is_empty() {
            return Arc::from([]);
        }
        if let Some(found) = self.synthesized.read().get(service) {
            return found.clone();
        }

        let synthesized = self.synthesize(service);
        if synthesized.is_empty() {
            return synthesized;
        }
        self.synthesized
            .write()
            .entry(service.clone())
            .or_insert(synthesized)
            .clone()
    }

    /// The service a request for `service` is answered as.
    ///
    /// A plain request for an exposed adapter type such as `All<T>` becomes
    /// the adapter service itself, unless the plain type has a static
    /// registration of its own. Everything else is returned unchanged.
    pub fn canonical(&self, service: &Service) -> Service {
        if service.adapter_info().is_none() && !service.is_keyed() && !self.index.contains_key(service) {
            if let Some(adapter) = self.adapters.get(&service.type_id()) {
                return adapter.clone();
            }
        }
        service.clone()
    }

    /// Registrations satisfying `service` as an owned list.
    pub fn find_registrations(&self, service: &Service) -> Vec<Arc<ComponentRegistration>> {
        self.registrations_for(service).to_vec()
    }

    /// The registration used when `service` is resolved.
    pub fn default_registration(&self, service: &Service) -> Option<Arc<ComponentRegistration>> {
        self.registrations_for(service).first().cloned()
    }

    /// Whether anything satisfies `service`.
    pub fn is_registered(&self, service: &Service) -> bool {
        !self.registrations_for(service).is_empty()
    }

    /// Every static registration, in registration order.
    pub fn registrations(&self) -> &[Arc<ComponentRegistration>] {
        &self.registrations
    }

    /// Registration sources, in query order.
    pub fn sources(&self) -> &[Arc<dyn RegistrationSource>] {
        &self.sources
    }

    /// Decorators of `service`, in application order.
    pub fn decorators_for(&self, service: &Service) -> &[DecoratorRegistration] {
        self.decorators.get(service).map_or(&[][..], |d| &d[..])
    }

    /// Number of services answered by sources so far.
    pub fn synthesized_count(&self) -> usize {
        self.synthesized.read().len()
    }

    /// The compiled pipeline of `registration`, compiling it on first use.
    pub fn pipeline_for<'r>(&self, registration: &'r ComponentRegistration) -> &'r ResolvePipeline {
        registration.pipeline.get_or_init(|| self.compile(registration))
    }

    pub(crate) fn activation_lock(&self) -> MutexGuard<'_, ()> {
        self.activation_lock.lock()
    }

    fn synthesize(&self, service: &Service) -> RegistrationList {
        let accessor = |other: &Service| self.registrations_for(other);
        let mut found = Vec::new();
        for source in &self.sources {
            let origin = RegistrationOrigin::Source {
                name: source.name(),
                adapter: source.is_adapter_for_individual_components(),
            };
            for mut registration in source.registrations_for(service, &accessor) {
                registration.origin = origin;
                found.push(Arc::new(registration));
            }
        }
        if !found.is_empty() {
            trace!(service = %service, count = found.len(), "Synthesized registrations");
        }
        found.into()
    }

    fn compile(&self, registration: &ComponentRegistration) -> ResolvePipeline {
        let mut builder = PipelineBuilder::new();
        builder.use_middleware(Arc::new(ScopeSelectionMiddleware), InsertionMode::EndOfPhase);

        if registration.origin() != RegistrationOrigin::Decorator {
            let decorators: Vec<_> = registration
                .services()
                .iter()
                .filter_map(|service| self.decorators.get(service).map(|d| (service.clone(), d.clone())))
                .collect();
            if !decorators.is_empty() {
                builder.use_middleware(
                    Arc::new(DecoratorMiddleware::new(decorators)),
                    InsertionMode::StartOfPhase,
                );
            }
            if !registration.casts.is_empty() {
                builder.use_middleware(Arc::new(ServiceConversionMiddleware), InsertionMode::EndOfPhase);
            }
        }
        if registration.lifetime().is_shared() {
            builder.use_middleware(Arc::new(SharingMiddleware), InsertionMode::EndOfPhase);
        }
        if !registration.parameters().is_empty() {
            builder.use_middleware(Arc::new(ParameterMiddleware), InsertionMode::EndOfPhase);
        }
        builder.use_middleware(Arc::new(ActivatorMiddleware), InsertionMode::EndOfPhase);
        if registration.has_activation_handlers() {
            builder.use_middleware(Arc::new(NotificationMiddleware), InsertionMode::EndOfPhase);
        }

        builder.use_entries(&self.middleware);
        for service in registration.services() {
            if let Some(entries) = self.service_middleware.get(service) {
                builder.use_entries(entries);
            }
        }
        builder.use_entries(&registration.middleware);

        let pipeline = builder.build();
        trace!(registration = %registration.id(), stages = pipeline.len(), "Compiled resolve pipeline");
        pipeline
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("registrations", &self.registrations.len())
            .field("services", &self.index.len())
            .field("sources", &self.sources.len())
            .field("adapters", &self.adapters.len())
            .field("synthesized", &self.synthesized_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use crate::lifetime::Lifetime;
    use crate::pipeline::PipelinePhase;
    use crate::registration::ComponentRegistrationBuilder;
    use crate::sources::{default_sources, AdapterType, All};

    fn registration(value: u8) -> ComponentRegistrationBuilder {
        ComponentRegistration::builder(move |_, _| Ok(Instance::from_value(value))).service(Service::of::<u8>())
    }

    #[test]
    fn preserving_registrations_do_not_take_the_default() {
        let mut builder = ComponentRegistryBuilder::new();
        let a = builder.register(registration(1).build());
        let b = builder.register(registration(2).preserve_existing_defaults().build());
        let c = builder.register(registration(3).build());
        let registry = builder.build();

        let ids: Vec<_> = registry
            .find_registrations(&Service::of::<u8>())
            .iter()
            .map(|r| r.id())
            .collect();
        assert_eq!(ids, vec![c, a, b]);
    }

    #[test]
    fn sources_only_answer_unregistered_services_and_are_cached() {
        let mut builder = ComponentRegistryBuilder::new();
        builder.register(registration(1).build());
        for source in default_sources() {
            builder.add_source(source);
        }
        let registry = builder.build();

        assert!(registry.is_registered(&Service::of::<u8>()));
        assert_eq!(registry.synthesized_count(), 0);

        let all = All::<u8>::service();
        let first = registry.default_registration(&all).unwrap();
        let second = registry.default_registration(&all).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(registry.synthesized_count(), 1);
        assert!(!registry.is_registered(&Service::of::<u16>()));
        assert_eq!(registry.synthesized_count(), 1);
    }

    #[test]
    fn plain_adapter_requests_follow_exposed_adapters() {
        let mut builder = ComponentRegistryBuilder::new();
        builder.register(registration(1).build());
        for source in default_sources() {
            builder.add_source(source);
        }
        builder.expose_adapter(All::<u8>::service());
        builder.expose_adapter(Service::of::<u16>());
        let registry = builder.build();

        let plain = Service::of::<All<u8>>();
        assert_eq!(registry.canonical(&plain), All::<u8>::service());
        assert!(registry.is_registered(&plain));
        assert_eq!(
            registry.default_registration(&plain).unwrap().id(),
            registry.default_registration(&All::<u8>::service()).unwrap().id()
        );
        assert_eq!(registry.canonical(&Service::of::<u16>()), Service::of::<u16>());
        // Not exposed: the plain type never reaches the sources.
        assert!(!registry.is_registered(&Service::of::<All<u16>>()));
    }

    #[test]
    fn pipelines_only_contain_needed_stages() {
        let mut builder = ComponentRegistryBuilder::new();
        builder.register(registration(1).build());
        builder.register(
            ComponentRegistration::builder(|_, _| Ok(Instance::from_value(1u16)))
                .service(Service::of::<u16>())
                .lifetime(Lifetime::Root)
                .build(),
        );
        let registry = builder.build();

        let transient = registry.default_registration(&Service::of::<u8>()).unwrap();
        assert_eq!(
            registry.pipeline_for(&transient).phases(),
            vec![PipelinePhase::ScopeSelection, PipelinePhase::Activation]
        );

        let singleton = registry.default_registration(&Service::of::<u16>()).unwrap();
        assert_eq!(
            registry.pipeline_for(&singleton).stage_names(),
            vec!["scope-selection", "sharing", "activator"]
        );
        assert!(singleton.pipeline().is_some());
    }
}
