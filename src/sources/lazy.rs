use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::operation::ResolveContext;
use crate::parameters::Parameters;
use crate::registration::ComponentRegistration;
use crate::service::{AdapterKind, Service};
use crate::sources::{adapt_each, adapter_of, AdapterType, AdapterWrap, LazyInit, RegistrationAccessor, RegistrationSource};

/// `T`, built the first time [`value`](Lazy::value) is called.
///
/// The value is resolved from the scope the `Lazy` was resolved in, as a new
/// resolve operation. Shared lifetimes still apply, so a lazy singleton
/// and a direct one are the same instance.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Resolver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// static BUILT: AtomicUsize = AtomicUsize::new(0);
/// struct Expensive;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| {
///     BUILT.fetch_add(1, Ordering::SeqCst);
///     Ok(Arc::new(Expensive))
/// });
/// let container = builder.build().unwrap();
///
/// let lazy = container.resolve_lazy::<Expensive>().unwrap();
/// assert_eq!(BUILT.load(Ordering::SeqCst), 0);
/// let first = lazy.value().unwrap();
/// let second = lazy.value().unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(BUILT.load(Ordering::SeqCst), 1);
/// ```
pub struct Lazy<T: ?Sized> {
    init: LazyInit,
    value: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    fn wrap(init: LazyInit) -> Instance {
        Instance::from_value(Lazy::<T> {
            init,
            value: OnceCell::new(),
        })
    }

    /// The value, resolving it on first call. A failed resolution is
    /// retried on the next call.
    pub fn value(&self) -> DiResult<Arc<T>> {
        self.value
            .get_or_try_init(|| {
                (self.init)()?.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
                    service: Service::of::<T>(),
                    expected: std::any::type_name::<T>(),
                })
            })
            .cloned()
    }

    /// Whether the value has been resolved.
    pub fn is_value_created(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("created", &self.value.get().is_some())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> AdapterType for Lazy<T> {
    fn service() -> Service {
        Service::adapter::<Lazy<T>>(AdapterKind::Lazy, Service::of::<T>(), AdapterWrap::Lazy(Self::wrap))
    }
}

/// Synthesizes `Lazy<T>` for every registration of `T`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LazySource;

impl RegistrationSource for LazySource {
    fn registrations_for(&self, service: &Service, accessor: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
        let Some((inner, AdapterWrap::Lazy(wrap))) = adapter_of(service, AdapterKind::Lazy) else {
            return Vec::new();
        };
        let adapted = inner.clone();
        adapt_each(service, &inner, accessor, move |target| {
            let inner = adapted.clone();
            Box::new(move |ctx: &ResolveContext<'_>, params: &Parameters| {
                let scope = ctx.scope().downgrade();
                let service = inner.clone();
                let target = target.clone();
                let params = params.clone();
                Ok(wrap(Box::new(move || {
                    scope.upgrade()?.resolve_registration(&service, &target, &params)
                })))
            })
        })
    }

    fn is_adapter_for_individual_components(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "lazy"
    }
}
