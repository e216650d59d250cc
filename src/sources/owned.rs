use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::lifetime::ScopeTag;
use crate::operation::ResolveContext;
use crate::parameters::Parameters;
use crate::registration::ComponentRegistration;
use crate::scope::LifetimeScope;
use crate::service::{AdapterKind, Service};
use crate::sources::{adapt_each, adapter_of, AdapterType, AdapterWrap, RegistrationAccessor, RegistrationSource};

/// `T` together with a child scope that owns it and everything it pulled in.
///
/// Disposing the `Owned` (explicitly or by dropping the last handle)
/// disposes that scope, releasing the instance's dependencies without
/// touching the scope it was resolved from. Shared instances owned by
/// outer scopes are unaffected.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Dispose, DisposeResult, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// static CLOSED: AtomicBool = AtomicBool::new(false);
/// struct Connection;
/// impl Dispose for Connection {
///     fn dispose(&self) -> DisposeResult {
///         CLOSED.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| Ok(Arc::new(Connection))).disposable();
/// let container = builder.build().unwrap();
///
/// let owned = container.resolve_owned::<Connection>().unwrap();
/// owned.dispose().unwrap();
/// assert!(CLOSED.load(Ordering::SeqCst));
/// ```
pub struct Owned<T: ?Sized> {
    value: Arc<T>,
    scope: LifetimeScope,
}

impl<T: ?Sized + Send + Sync + 'static> Owned<T> {
    fn wrap(instance: Instance, scope: LifetimeScope) -> DiResult<Instance> {
        match instance.downcast::<T>() {
            Some(value) => Ok(Instance::from_value(Owned { value, scope })),
            None => {
                if let Err(error) = scope.dispose() {
                    debug!(%error, "Failed to dispose scope of mistyped owned instance");
                }
                Err(DiError::TypeMismatch {
                    service: Service::of::<T>(),
                    expected: std::any::type_name::<T>(),
                })
            }
        }
    }

    /// The owned instance.
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// Scope owning the instance.
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    /// Disposes the owning scope.
    pub fn dispose(&self) -> DiResult<()> {
        self.scope.dispose()
    }
}

impl<T: ?Sized> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: ?Sized> Drop for Owned<T> {
    fn drop(&mut self) {
        if let Err(error) = self.scope.dispose() {
            warn!(%error, "Failed to dispose owned instance scope");
        }
    }
}

impl<T: ?Sized> fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned").field("scope", &self.scope).finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> AdapterType for Owned<T> {
    fn service() -> Service {
        Service::adapter::<Owned<T>>(AdapterKind::Owned, Service::of::<T>(), AdapterWrap::Owned(Self::wrap))
    }
}

/// Synthesizes `Owned<T>` for every registration of `T`.
///
/// The child scope is tagged [`ScopeTag::owned_by`] the adapted service, so
/// registrations using [`Lifetime::per_owned`](crate::Lifetime::per_owned)
/// share one instance per owned graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnedSource;

impl RegistrationSource for OwnedSource {
    fn registrations_for(&self, service: &Service, accessor: RegistrationAccessor<'_>) -> Vec<ComponentRegistration> {
        let Some((inner, AdapterWrap::Owned(wrap))) = adapter_of(service, AdapterKind::Owned) else {
            return Vec::new();
        };
        let adapted = inner.clone();
        adapt_each(service, &inner, accessor, move |target| {
            let inner = adapted.clone();
            Box::new(move |ctx: &ResolveContext<'_>, params: &Parameters| {
                let child = ctx.scope().begin_tagged_scope(ScopeTag::owned_by(&inner))?;
                match ctx.resolve_registration_in(&child, &inner, &target, params) {
                    Ok(instance) => wrap(instance, child),
                    Err(error) => {
                        if let Err(dispose_error) = child.dispose() {
                            debug!(error = %dispose_error, "Failed to dispose scope of failed owned resolution");
                        }
                        Err(error)
                    }
                }
            })
        })
    }

    fn is_adapter_for_individual_components(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "owned"
    }
}
