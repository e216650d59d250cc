//! Disposal traits for resource cleanup.

use crate::error::BoxError;

/// Outcome of a single dispose call.
pub type DisposeResult = Result<(), BoxError>;

/// Trait for synchronous resource disposal.
///
/// Implement this for components that need structured teardown (flushing
/// caches, closing connections). Registrations marked `disposable()` hand
/// their instances to the owning scope, which calls `dispose` in reverse
/// creation order when the scope ends.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{ContainerBuilder, Dispose, DisposeResult, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> DisposeResult {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register(|_, _| Ok(Arc::new(Cache { name: "user_cache".to_string() })))
///     .lifetime(Lifetime::per_scope())
///     .disposable();
///
/// let container = builder.build().unwrap();
/// let scope = container.begin_scope().unwrap();
/// scope.resolve::<Cache>().unwrap();
/// scope.dispose().unwrap(); // prints "Flushing cache: user_cache"
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> DisposeResult;
}

/// Trait for asynchronous resource disposal.
///
/// Instances registered with `async_disposable()` are released by
/// `LifetimeScope::dispose_async`. A synchronous `dispose` reports them as
/// `DiError::AsyncDisposalRequired` instead of blocking.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{AsyncDispose, DisposeResult};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) -> DisposeResult {
///         println!("Closing database connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> DisposeResult;
}
