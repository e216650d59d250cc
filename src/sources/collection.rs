use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::registration::ComponentRegistration;
use crate::service::{AdapterKind, Service};
use crate::sources::{adapter_of, adapter_registration, AdapterType, AdapterWrap, RegistrationAccessor, RegistrationSource};

/// Every registration of `T`, in registration order.
///
/// Resolving `All<T>` never fails because nothing is registered; the
/// collection is simply empty.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Resolver};
/// use ferrous_resolve::sources::All;
/// use std::sync::Arc;
///
/// trait Plugin: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
/// struct A;
/// impl Plugin for A { fn name(&self) -> &'static str { "a" } }
/// struct B;
/// impl Plugin for B { fn name(&self) -> &'static str { "b" } }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| Ok(Arc::new(A) as Arc<dyn Plugin>));
/// builder.register(|_, _| Ok(Arc::new(B) as Arc<dyn Plugin>));
/// let container = builder.build().unwrap();
///
/// let plugins = container.resolve_adapter::<All<dyn Plugin>>().unwrap();
/// let names: Vec<_> = plugins.iter().map(|p| p.name()).collect();
/// assert_eq!(names, ["a", "b"]);
/// assert!(container.resolve_all::<String>().unwrap().is_empty());
/// ```
pub struct All<T: ?Sized> {
    items: Vec<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> All<T> {
    fn wrap(items: Vec<Instance>) -> DiResult<Instance> {
        let items = items
            .into_iter()
            .map(|item| {
                item.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
                    service: Service::of::<T>(),
                    expected: std::any::type_name::<T>(),
                })
            })
            .collect::<DiResult<Vec<_>>>()?;
        Ok(Instance::from_value(All { items }))
    }
}

impl<T: ?Sized> Deref for All<T> {
    type Target = [Arc<T>];

    fn deref(&self) -> &[Arc<T>] {
        &self.items
    }
}

impl<T: ?Sized> fmt::Debug for All<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("All").field("len", &self.items.len()).finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> AdapterType for All<T> {
    fn service() -> Service {
        Service::adapter::<All<T>>(AdapterKind::Collection, Service::of::<T>(), AdapterWrap::Collection(Self::wrap))
    }
}

/// Synthesizes `All<T>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectionSource;

impl RegistrationSource for CollectionSource {
    fn registrations_for(&self, service: &Service, accessor: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
        let Some((inner, AdapterWrap::Collection(wrap))) = adapter_of(service, AdapterKind::Collection) else {
            return Vec::new();
        };
        let mut elements: Vec<Arc<ComponentRegistration>> = accessor(&inner).to_vec();
        elements.sort_by_key(|r| (r.order(), r.id()));

        let registration = adapter_registration(service, move |ctx, params| {
            let items = elements
                .iter()
                .map(|element| ctx.resolve_registration(&inner, element, params))
                .collect::<DiResult<Vec<_>>>()?;
            wrap(items)
        });
        vec![registration.build()]
    }

    fn name(&self) -> &'static str {
        "collection"
    }
}
