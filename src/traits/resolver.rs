//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::disposer::DisposerEntry;
use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::parameters::{Parameter, Parameters};
use crate::service::{Service, ServiceKey};
use crate::sources::{AdapterType, All, Factory, Index, Lazy, Meta, Owned};
use crate::traits::{AsyncDispose, Dispose};

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`LifetimeScope`](crate::LifetimeScope) (each call starts a
/// new resolve operation) and by [`ResolveContext`](crate::ResolveContext)
/// (calls join the operation of the activator that makes them).
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// typed methods on top of this one.
pub trait ResolverCore {
    /// Resolves the default registration of `service`.
    fn resolve_service_with(&self, service: &Service, parameters: &Parameters) -> DiResult<Instance>;

    /// Whether anything (static or synthesized) satisfies `service`.
    fn is_service_registered(&self, service: &Service) -> bool;

    /// Hands `entry` to the disposer of the scope behind this resolver.
    fn add_for_disposal(&self, entry: DisposerEntry) -> DiResult<()>;

    /// Resolves `service` without parameters.
    fn resolve_service(&self, service: &Service) -> DiResult<Instance> {
        self.resolve_service_with(service, &Parameters::empty())
    }

    /// Like [`resolve_service_with`](Self::resolve_service_with) but returns
    /// `Ok(None)` when `service` itself is not registered. Missing services
    /// deeper in the graph are still errors.
    fn try_resolve_service_with(&self, service: &Service, parameters: &Parameters) -> DiResult<Option<Instance>> {
        if !self.is_service_registered(service) {
            return Ok(None);
        }
        self.resolve_service_with(service, parameters).map(Some)
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(service: &Service, instance: Instance) -> DiResult<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
        service: service.clone(),
        expected: std::any::type_name::<T>(),
    })
}

/// Typed resolution on top of [`ResolverCore`].
///
/// Sized types and trait objects resolve the same way: `T` is whatever the
/// registration was created for.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {msg}")
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Arc::new(42usize));
/// builder
///     .register(|_, _| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>))
///     .lifetime(Lifetime::Root);
///
/// let container = builder.build().unwrap();
/// assert_eq!(*container.resolve_required::<usize>(), 42);
/// let logger = container.resolve::<dyn Logger>().unwrap();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T`.
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve_with::<T>(&Parameters::empty())
    }

    /// Resolves `T`, passing `parameters` to its activator.
    fn resolve_with<T: ?Sized + Send + Sync + 'static>(&self, parameters: &Parameters) -> DiResult<Arc<T>> {
        let service = Service::of::<T>();
        let instance = self.resolve_service_with(&service, parameters)?;
        downcast(&service, instance)
    }

    /// Resolves `T` with the given parameters.
    fn resolve_with_parameters<T: ?Sized + Send + Sync + 'static>(
        &self,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> DiResult<Arc<T>> {
        self.resolve_with::<T>(&parameters.into_iter().collect())
    }

    /// Resolves `T`, or `None` when `T` is not registered.
    fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let service = Service::of::<T>();
        match self.try_resolve_service_with(&service, &Parameters::empty())? {
            Some(instance) => downcast(&service, instance).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// Use this when a missing service is a configuration bug.
    fn resolve_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.resolve::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves the `T` registered under `name`.
    fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.resolve_keyed::<T>(ServiceKey::from(name.to_string()))
    }

    /// Resolves the `T` registered under `key`.
    fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(&self, key: impl Into<ServiceKey>) -> DiResult<Arc<T>> {
        let service = Service::keyed::<T>(key);
        let instance = self.resolve_service(&service)?;
        downcast(&service, instance)
    }

    /// Resolves an adapter type such as `Lazy<T>` or `Meta<T>`.
    fn resolve_adapter<A: AdapterType>(&self) -> DiResult<Arc<A>> {
        let service = A::service();
        let instance = self.resolve_service(&service)?;
        downcast(&service, instance)
    }

    /// Every registration of `T`, in registration order.
    fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        Ok(self.resolve_adapter::<All<T>>()?.to_vec())
    }

    /// `T`, built on first access.
    fn resolve_lazy<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<Lazy<T>>> {
        self.resolve_adapter::<Lazy<T>>()
    }

    /// `T` in its own disposable child scope.
    fn resolve_owned<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<Owned<T>>> {
        self.resolve_adapter::<Owned<T>>()
    }

    /// A factory creating `T` on demand.
    fn resolve_factory<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<Factory<T>>> {
        self.resolve_adapter::<Factory<T>>()
    }

    /// Keyed lookup of `T`.
    fn resolve_index<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<Index<T>>> {
        self.resolve_adapter::<Index<T>>()
    }

    /// `T` together with its registration metadata.
    fn resolve_meta<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<Meta<T>>> {
        self.resolve_adapter::<Meta<T>>()
    }

    /// Whether `T` is registered.
    fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.is_service_registered(&Service::of::<T>())
    }

    /// Tracks `service` for synchronous disposal by the current scope.
    ///
    /// ```
    /// use ferrous_resolve::{ContainerBuilder, Dispose, DisposeResult, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Temp;
    /// impl Dispose for Temp {
    ///     fn dispose(&self) -> DisposeResult { Ok(()) }
    /// }
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register(|ctx, _| {
    ///     let temp = Arc::new(Temp);
    ///     ctx.register_disposer(temp.clone())?;
    ///     Ok(temp)
    /// });
    /// let container = builder.build().unwrap();
    /// container.resolve::<Temp>().unwrap();
    /// container.dispose().unwrap();
    /// ```
    fn register_disposer<T: ?Sized + Dispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.add_for_disposal(DisposerEntry::sync(service))
    }

    /// Tracks `service` for asynchronous disposal by the current scope.
    fn register_async_disposer<T: ?Sized + AsyncDispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.add_for_disposal(DisposerEntry::asynchronous(service))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
