//! Registration sources: registrations synthesized on first request.
//!
//! When no static registration satisfies a service the registry asks its
//! sources, in the order they were added, and caches whatever they return
//! for that service. The built-in sources implement the relationship types
//! [`All`], [`Lazy`], [`Owned`], [`Factory`], [`Index`] and [`Meta`]; each
//! one is an ordinary registration whose activator resolves the adapted
//! service and wraps the result.

mod collection;
mod factory;
mod index;
mod lazy;
mod meta;
mod owned;

use std::sync::Arc;

use crate::error::DiResult;
use crate::instance::Instance;
use crate::lifetime::Ownership;
use crate::metadata::Metadata;
use crate::operation::ResolveContext;
use crate::parameters::Parameters;
use crate::registration::{ComponentRegistration, ComponentRegistrationBuilder};
use crate::scope::LifetimeScope;
use crate::service::{AdapterKind, Service, ServiceKey};

pub use collection::{All, CollectionSource};
pub use factory::{Factory, FactorySource};
pub use index::{Index, IndexSource};
pub use lazy::{Lazy, LazySource};
pub use meta::{Meta, MetaSource};
pub use owned::{Owned, OwnedSource};

/// Looks up the registrations of another service while a source synthesizes.
pub type RegistrationAccessor<'a> = &'a dyn Fn(&Service) -> Arc<[Arc<ComponentRegistration>]>;

/// Synthesizes registrations for services nothing registered explicitly.
///
/// Sources must be deterministic: asked twice for the same service they
/// return equivalent registrations, and they have no side effects beyond
/// that. The registry caches the first answer per service.
///
/// ```rust
/// use ferrous_resolve::sources::{RegistrationAccessor, RegistrationSource};
/// use ferrous_resolve::{ComponentRegistration, ContainerBuilder, Instance, Resolver, Service};
/// use std::sync::Arc;
///
/// /// Answers every request for `u16` with its own default.
/// struct Defaults;
///
/// impl RegistrationSource for Defaults {
///     fn registrations_for(&self, service: &Service, _: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
///         if !service.is::<u16>() {
///             return Vec::new();
///         }
///         vec![ComponentRegistration::builder(|_, _| Ok(Instance::from_value(8080u16)))
///             .service(service.clone())
///             .build()]
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_source(Arc::new(Defaults));
/// let container = builder.build().unwrap();
/// assert_eq!(*container.resolve::<u16>().unwrap(), 8080);
/// ```
pub trait RegistrationSource: Send + Sync {
    /// Registrations satisfying `service`, default first. `accessor`
    /// returns the registrations of other services, synthesized ones
    /// included.
    fn registrations_for(&self, service: &Service, accessor: RegistrationAccessor<'_>) -> Vec<ComponentRegistration>;

    /// True when the source produces one registration per adapted
    /// registration (`Lazy<T>` for each `T`), as opposed to one
    /// registration for the whole service (`All<T>`).
    fn is_adapter_for_individual_components(&self) -> bool {
        false
    }

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// An adapter type that can be requested from a scope.
pub trait AdapterType: Send + Sync + 'static {
    /// The service requesting this adapter.
    fn service() -> Service;
}

pub(crate) type LazyInit = Box<dyn Fn() -> DiResult<Instance> + Send + Sync>;
pub(crate) type FactoryInit = Arc<dyn Fn(&Parameters) -> DiResult<Instance> + Send + Sync>;
pub(crate) type IndexInit = Arc<dyn Fn(&ServiceKey) -> DiResult<Option<Instance>> + Send + Sync>;
type AdapterActivator = Box<dyn Fn(&ResolveContext<'_>, &Parameters) -> DiResult<Instance> + Send + Sync>;

/// Typed constructor for an adapter value, captured when the adapter service
/// is named so the untyped sources can build `All<T>` and friends.
#[derive(Clone, Copy)]
pub(crate) enum AdapterWrap {
    Collection(fn(Vec<Instance>) -> DiResult<Instance>),
    Lazy(fn(LazyInit) -> Instance),
    Owned(fn(Instance, LifetimeScope) -> DiResult<Instance>),
    Factory(fn(FactoryInit) -> Instance),
    Index(fn(IndexInit) -> Instance),
    Meta(fn(Instance, Metadata) -> DiResult<Instance>),
}

/// The built-in sources, in the order a container registers them.
pub fn default_sources() -> Vec<Arc<dyn RegistrationSource>> {
    vec![
        Arc::new(CollectionSource),
        Arc::new(LazySource),
        Arc::new(OwnedSource),
        Arc::new(FactorySource),
        Arc::new(IndexSource),
        Arc::new(MetaSource),
    ]
}

/// The adapter services built over `T`: `All<T>`, `Lazy<T>`, `Owned<T>`,
/// `Factory<T>`, `Index<T>` and `Meta<T>`.
pub fn adapter_services<T: ?Sized + Send + Sync + 'static>() -> [Service; 6] {
    [
        All::<T>::service(),
        Lazy::<T>::service(),
        Owned::<T>::service(),
        Factory::<T>::service(),
        Index::<T>::service(),
        Meta::<T>::service(),
    ]
}

/// The inner service and wrap function when `service` is an adapter of `kind`.
fn adapter_of(service: &Service, kind: AdapterKind) -> Option<(Service, AdapterWrap)> {
    service
        .adapter_info()
        .filter(|info| info.kind() == kind)
        .map(|info| (info.inner().clone(), info.wrap))
}

/// Common shape of every adapter registration: per dependency, never
/// disposed by the scope, exposing exactly the adapter service.
fn adapter_registration<F>(service: &Service, activator: F) -> ComponentRegistrationBuilder
where
    F: Fn(&ResolveContext<'_>, &Parameters) -> DiResult<Instance> + Send + Sync + 'static,
{
    ComponentRegistration::builder(activator)
        .service(service.clone())
        .ownership(Ownership::ExternallyOwned)
}

/// One registration per registration of the inner service.
fn adapt_each<F>(
    service: &Service,
    inner: &Service,
    accessor: RegistrationAccessor<'_>,
    activator: F,
) -> Vec<ComponentRegistration>
where
    F: Fn(Arc<ComponentRegistration>) -> AdapterActivator,
{
    accessor(inner)
        .iter()
        .map(|target| {
            let activate = activator(target.clone());
            adapter_registration(service, move |ctx, params| activate(ctx, params))
                .with_metadata(target.metadata().clone())
                .adapts(target)
                .build()
        })
        .collect()
}
