use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::operation::ResolveContext;
use crate::parameters::{Parameter, Parameters};
use crate::registration::ComponentRegistration;
use crate::service::{AdapterKind, Service};
use crate::sources::{adapt_each, adapter_of, AdapterType, AdapterWrap, FactoryInit, RegistrationAccessor, RegistrationSource};

/// Creates `T` on demand, as many times as asked.
///
/// Each call runs a new resolve operation in the scope the factory was
/// resolved from; lifetimes still apply, so a factory for a singleton keeps
/// returning the singleton.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Parameter, Resolver};
/// use std::sync::Arc;
///
/// struct Job { id: u32 }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, params| Ok(Arc::new(Job { id: *params.typed::<u32>().unwrap_or_default() })));
/// let container = builder.build().unwrap();
///
/// let jobs = container.resolve_factory::<Job>().unwrap();
/// assert_eq!(jobs.create_with([Parameter::typed(7u32)]).unwrap().id, 7);
/// assert_eq!(jobs.create().unwrap().id, 0);
/// ```
pub struct Factory<T: ?Sized> {
    create: FactoryInit,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Factory<T> {
    fn wrap(create: FactoryInit) -> Instance {
        Instance::from_value(Factory::<T> {
            create,
            _marker: PhantomData,
        })
    }

    /// Creates an instance without parameters.
    pub fn create(&self) -> DiResult<Arc<T>> {
        self.create_from(&Parameters::empty())
    }

    /// Creates an instance, handing `parameters` to the activator.
    pub fn create_with(&self, parameters: impl IntoIterator<Item = Parameter>) -> DiResult<Arc<T>> {
        self.create_from(&parameters.into_iter().collect())
    }

    /// Creates an instance from prepared parameters.
    pub fn create_from(&self, parameters: &Parameters) -> DiResult<Arc<T>> {
        (self.create)(parameters)?
            .downcast::<T>()
            .ok_or_else(|| DiError::TypeMismatch {
                service: Service::of::<T>(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl<T: ?Sized> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

impl<T: ?Sized + Send + Sync + 'static> AdapterType for Factory<T> {
    fn service() -> Service {
        Service::adapter::<Factory<T>>(AdapterKind::Factory, Service::of::<T>(), AdapterWrap::Factory(Self::wrap))
    }
}

/// Synthesizes `Factory<T>` for every registration of `T`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FactorySource;

impl RegistrationSource for FactorySource {
    fn registrations_for(&self, service: &Service, accessor: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
        let Some((inner, AdapterWrap::Factory(wrap))) = adapter_of(service, AdapterKind::Factory) else {
            return Vec::new();
        };
        let adapted = inner.clone();
        adapt_each(service, &inner, accessor, move |target| {
            let inner = adapted.clone();
            Box::new(move |ctx: &ResolveContext<'_>, _: &Parameters| {
                let scope = ctx.scope().downgrade();
                let service = inner.clone();
                let target = target.clone();
                Ok(wrap(Arc::new(move |parameters: &Parameters| {
                    scope.upgrade()?.resolve_registration(&service, &target, parameters)
                })))
            })
        })
    }

    fn is_adapter_for_individual_components(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "factory"
    }
}
