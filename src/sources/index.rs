use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::parameters::Parameters;
use crate::registration::ComponentRegistration;
use crate::service::{AdapterKind, Service, ServiceKey};
use crate::sources::{adapter_of, adapter_registration, AdapterType, AdapterWrap, IndexInit, RegistrationAccessor, RegistrationSource};
use crate::traits::ResolverCore;

/// Keyed lookup of `T`.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// trait Store: Send + Sync {
///     fn region(&self) -> &'static str;
/// }
/// struct Eu;
/// impl Store for Eu { fn region(&self) -> &'static str { "eu" } }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| Ok(Arc::new(Eu) as Arc<dyn Store>)).named("eu");
/// let container = builder.build().unwrap();
///
/// let stores = container.resolve_index::<dyn Store>().unwrap();
/// assert_eq!(stores.get("eu").unwrap().region(), "eu");
/// assert!(stores.try_get("us").unwrap().is_none());
/// ```
pub struct Index<T: ?Sized> {
    lookup: IndexInit,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Index<T> {
    fn wrap(lookup: IndexInit) -> Instance {
        Instance::from_value(Index::<T> {
            lookup,
            _marker: PhantomData,
        })
    }

    /// The `T` registered under `key`, or `None` if nothing is.
    pub fn try_get(&self, key: impl Into<ServiceKey>) -> DiResult<Option<Arc<T>>> {
        let key = key.into();
        match (self.lookup)(&key)? {
            None => Ok(None),
            Some(instance) => instance.downcast::<T>().map(Some).ok_or_else(|| DiError::TypeMismatch {
                service: Service::keyed::<T>(key),
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// The `T` registered under `key`.
    pub fn get(&self, key: impl Into<ServiceKey>) -> DiResult<Arc<T>> {
        let key = key.into();
        self.try_get(key.clone())?.ok_or_else(|| DiError::NotRegistered {
            service: Service::keyed::<T>(key),
        })
    }
}

impl<T: ?Sized> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Index")
    }
}

impl<T: ?Sized + Send + Sync + 'static> AdapterType for Index<T> {
    fn service() -> Service {
        Service::adapter::<Index<T>>(AdapterKind::Index, Service::of::<T>(), AdapterWrap::Index(Self::wrap))
    }
}

/// Synthesizes `Index<T>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexSource;

impl RegistrationSource for IndexSource {
    fn registrations_for(&self, service: &Service, _: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
        let Some((inner, AdapterWrap::Index(wrap))) = adapter_of(service, AdapterKind::Index) else {
            return Vec::new();
        };
        let registration = adapter_registration(service, move |ctx, _| {
            let scope = ctx.scope().downgrade();
            let inner = inner.clone();
            Ok(wrap(Arc::new(move |key: &ServiceKey| {
                scope
                    .upgrade()?
                    .try_resolve_service_with(&inner.with_key(key.clone()), &Parameters::empty())
            })))
        });
        vec![registration.build()]
    }

    fn name(&self) -> &'static str {
        "index"
    }
}
