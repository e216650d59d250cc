use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::metadata::Metadata;
use crate::operation::ResolveContext;
use crate::parameters::Parameters;
use crate::registration::ComponentRegistration;
use crate::service::{AdapterKind, Service};
use crate::sources::{adapt_each, adapter_of, AdapterType, AdapterWrap, RegistrationAccessor, RegistrationSource};

/// `T` paired with the metadata of the registration that produced it.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// struct Handler(&'static str);
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| Ok(Arc::new(Handler("audit")))).with_metadata("priority", 2);
/// let container = builder.build().unwrap();
///
/// let handler = container.resolve_meta::<Handler>().unwrap();
/// assert_eq!(handler.value().0, "audit");
/// assert_eq!(handler.metadata().get("priority").and_then(|v| v.as_int()), Some(2));
/// ```
pub struct Meta<T: ?Sized> {
    value: Arc<T>,
    metadata: Metadata,
}

impl<T: ?Sized + Send + Sync + 'static> Meta<T> {
    fn wrap(instance: Instance, metadata: Metadata) -> DiResult<Instance> {
        let value = instance.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
            service: Service::of::<T>(),
            expected: std::any::type_name::<T>(),
        })?;
        Ok(Instance::from_value(Meta { value, metadata }))
    }

    /// The instance.
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// Metadata of its registration.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<T: ?Sized> Deref for Meta<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: ?Sized> fmt::Debug for Meta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta").field("metadata", &self.metadata).finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> AdapterType for Meta<T> {
    fn service() -> Service {
        Service::adapter::<Meta<T>>(AdapterKind::Meta, Service::of::<T>(), AdapterWrap::Meta(Self::wrap))
    }
}

/// Synthesizes `Meta<T>` for every registration of `T`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetaSource;

impl RegistrationSource for MetaSource {
    fn registrations_for(&self, service: &Service, accessor: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
        let Some((inner, AdapterWrap::Meta(wrap))) = adapter_of(service, AdapterKind::Meta) else {
            return Vec::new();
        };
        let adapted = inner.clone();
        adapt_each(service, &inner, accessor, move |target| {
            let inner = adapted.clone();
            Box::new(move |ctx: &ResolveContext<'_>, params: &Parameters| {
                let instance = ctx.resolve_registration(&inner, &target, params)?;
                wrap(instance, target.metadata().clone())
            })
        })
    }

    fn is_adapter_for_individual_components(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "meta"
    }
}
