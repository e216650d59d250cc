//! Lifetime scopes: the tree instances are cached in and disposed with.

pub(crate) mod cache;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ContainerOptions;
use crate::disposer::{BoxFuture, Disposer, DisposerEntry};
use crate::error::{DiError, DiResult, DisposalErrors};
use crate::instance::Instance;
use crate::lifetime::{ScopeMatcher, ScopeTag};
use crate::observer::Observers;
use crate::operation::ResolveOperation;
use crate::parameters::Parameters;
use crate::registration::ComponentRegistration;
use crate::registry::ComponentRegistry;
use crate::service::Service;
use crate::traits::ResolverCore;

use cache::SharedInstances;

/// State shared by every scope of one container.
pub(crate) struct ContainerShared {
    pub(crate) registry: ComponentRegistry,
    pub(crate) options: ContainerOptions,
    pub(crate) observers: Observers,
    next_scope_id: AtomicU64,
}

impl ContainerShared {
    pub(crate) fn new(registry: ComponentRegistry, options: ContainerOptions, observers: Observers) -> Self {
        Self {
            registry,
            options,
            observers,
            next_scope_id: AtomicU64::new(0),
        }
    }
}

struct ScopeInner {
    id: u64,
    tag: Option<ScopeTag>,
    parent: Option<Weak<ScopeInner>>,
    shared: Arc<ContainerShared>,
    instances: SharedInstances,
    disposer: Disposer,
    children: Mutex<Vec<Arc<ScopeInner>>>,
    disposed: AtomicBool,
}

impl ScopeInner {
    fn new(tag: Option<ScopeTag>, parent: Option<Weak<ScopeInner>>, shared: Arc<ContainerShared>) -> Self {
        let id = shared.next_scope_id.fetch_add(1, Ordering::Relaxed);
        let owner = describe(id, tag.as_ref());
        Self {
            id,
            tag,
            parent,
            shared,
            instances: SharedInstances::default(),
            disposer: Disposer::new(owner),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    fn describe(&self) -> String {
        describe(self.id, self.tag.as_ref())
    }

    /// Marks the scope disposed and hands back its children, or `None` if it
    /// already was.
    fn begin_dispose(&self) -> Option<Vec<Arc<ScopeInner>>> {
        let mut children = self.children.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(std::mem::take(&mut *children))
    }

    fn dispose(&self) -> DiResult<()> {
        let Some(children) = self.begin_dispose() else {
            return Ok(());
        };
        debug!(scope = %self.describe(), children = children.len(), "Disposing lifetime scope");

        let mut errors = DisposalErrors::default();
        for child in children.iter().rev() {
            if let Err(error) = child.dispose() {
                errors.absorb(error);
            }
        }
        if let Err(error) = self.disposer.dispose() {
            errors.absorb(error);
        }
        self.finish_dispose();
        errors.into_result()
    }

    fn dispose_async(&self) -> BoxFuture<'_, DiResult<()>> {
        Box::pin(async move {
            let Some(children) = self.begin_dispose() else {
                return Ok(());
            };
            debug!(scope = %self.describe(), children = children.len(), "Disposing lifetime scope asynchronously");

            let mut errors = DisposalErrors::default();
            for child in children.iter().rev() {
                if let Err(error) = child.dispose_async().await {
                    errors.absorb(error);
                }
            }
            if let Err(error) = self.disposer.dispose_async().await {
                errors.absorb(error);
            }
            self.finish_dispose();
            errors.into_result()
        })
    }

    fn finish_dispose(&self) {
        self.instances.clear();
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            let me = self as *const ScopeInner;
            parent.children.lock().retain(|child| !std::ptr::eq(Arc::as_ptr(child), me));
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::Acquire) || !self.shared.options.dispose_on_drop {
            return;
        }
        if let Err(error) = self.dispose() {
            warn!(scope = %self.describe(), %error, "Lifetime scope dropped with disposal failures");
        }
    }
}

fn describe(id: u64, tag: Option<&ScopeTag>) -> String {
    match tag {
        Some(tag) => format!("#{id} {tag}"),
        None => format!("#{id}"),
    }
}

/// A node in the scope tree.
///
/// Scopes cache the shared instances they own and dispose everything they
/// activated when they are disposed: child scopes first, then their own
/// disposables in reverse activation order. A parent owns its children; a
/// child only holds a weak reference to its parent. Handles are cheap to
/// clone and all refer to the same scope.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct RequestContext;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| Ok(Arc::new(RequestContext))).lifetime(Lifetime::matching("request"));
/// let container = builder.build().unwrap();
///
/// let request = container.begin_tagged_scope("request").unwrap();
/// let nested = request.begin_scope().unwrap();
/// let a = request.resolve::<RequestContext>().unwrap();
/// let b = nested.resolve::<RequestContext>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// assert!(container.resolve::<RequestContext>().is_err());
/// request.dispose().unwrap();
/// assert!(nested.resolve::<RequestContext>().is_err());
/// ```
#[derive(Clone)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

impl LifetimeScope {
    pub(crate) fn root(shared: Arc<ContainerShared>) -> Self {
        let scope = Self {
            inner: Arc::new(ScopeInner::new(Some(ScopeTag::root()), None, shared)),
        };
        debug!(scope = %scope.inner.describe(), "Created root lifetime scope");
        scope
    }

    /// Starts an untagged child scope.
    pub fn begin_scope(&self) -> DiResult<LifetimeScope> {
        self.begin_child(None)
    }

    /// Starts a child scope carrying `tag`.
    pub fn begin_tagged_scope(&self, tag: impl Into<ScopeTag>) -> DiResult<LifetimeScope> {
        self.begin_child(Some(tag.into()))
    }

    fn begin_child(&self, tag: Option<ScopeTag>) -> DiResult<LifetimeScope> {
        let mut children = self.inner.children.lock();
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(self.disposed_error());
        }
        let child = Arc::new(ScopeInner::new(
            tag,
            Some(Arc::downgrade(&self.inner)),
            self.inner.shared.clone(),
        ));
        children.push(child.clone());
        debug!(parent = %self.inner.describe(), scope = %child.describe(), "Began lifetime scope");
        Ok(LifetimeScope { inner: child })
    }

    /// Disposes child scopes, then this scope's disposables in reverse
    /// order. Every disposable runs even if some fail; failures are
    /// returned together. Disposing twice is a no-op.
    ///
    /// Entries that only support asynchronous disposal fail with
    /// [`DiError::AsyncDisposalRequired`]; use
    /// [`dispose_async`](Self::dispose_async) for those.
    pub fn dispose(&self) -> DiResult<()> {
        self.inner.dispose()
    }

    /// Like [`dispose`](Self::dispose), awaiting asynchronous disposables.
    pub async fn dispose_async(&self) -> DiResult<()> {
        self.inner.dispose_async().await
    }

    /// Whether the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Fails with [`DiError::ScopeDisposed`] once the scope is disposed.
    pub fn ensure_alive(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    fn disposed_error(&self) -> DiError {
        DiError::ScopeDisposed {
            scope: self.inner.describe(),
        }
    }

    /// Numeric id, unique within the container.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Tag of the scope; the root scope is tagged [`ScopeTag::root`].
    pub fn tag(&self) -> Option<&ScopeTag> {
        self.inner.tag.as_ref()
    }

    /// Parent scope, unless this is the root or the parent is gone.
    pub fn parent(&self) -> Option<LifetimeScope> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| LifetimeScope { inner })
    }

    /// The outermost ancestor.
    pub fn root_scope(&self) -> DiResult<LifetimeScope> {
        let mut current = self.clone();
        while let Some(parent) = &current.inner.parent {
            current = match parent.upgrade() {
                Some(inner) => LifetimeScope { inner },
                None => return Err(self.disposed_error()),
            };
        }
        Ok(current)
    }

    /// Nearest ancestor-or-self accepted by `matcher`.
    pub fn find_matching(&self, matcher: &ScopeMatcher) -> Option<LifetimeScope> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if matcher.matches(scope.tag()) {
                return Some(scope);
            }
            current = scope.parent();
        }
        None
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }

    /// Number of shared instances cached in this scope.
    pub fn shared_instance_count(&self) -> usize {
        self.inner.instances.len()
    }

    /// The disposer of this scope.
    pub fn disposer(&self) -> &Disposer {
        &self.inner.disposer
    }

    /// The registry the scope resolves from.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.shared.registry
    }

    /// Options of the owning container.
    pub fn options(&self) -> &ContainerOptions {
        &self.inner.shared.options
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.shared.observers
    }

    pub(crate) fn shared_instances(&self) -> &SharedInstances {
        &self.inner.instances
    }

    /// A handle that does not keep the scope alive.
    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Resolves one specific registration for `service` as a new operation.
    pub fn resolve_registration(
        &self,
        service: &Service,
        registration: &Arc<ComponentRegistration>,
        parameters: &Parameters,
    ) -> DiResult<Instance> {
        self.ensure_alive()?;
        ResolveOperation::execute(self, service, registration, parameters)
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &LifetimeScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ResolverCore for LifetimeScope {
    fn resolve_service_with(&self, service: &Service, parameters: &Parameters) -> DiResult<Instance> {
        self.ensure_alive()?;
        let service = &self.registry().canonical(service);
        let registration = self
            .registry()
            .default_registration(service)
            .ok_or_else(|| DiError::NotRegistered { service: service.clone() })?;
        ResolveOperation::execute(self, service, &registration, parameters)
    }

    fn is_service_registered(&self, service: &Service) -> bool {
        self.registry().is_registered(service)
    }

    fn add_for_disposal(&self, entry: DisposerEntry) -> DiResult<()> {
        self.inner.disposer.add_for_disposal(entry)
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Weak handle to a [`LifetimeScope`], held by deferred adapters.
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    /// The scope, if it still exists and is not disposed.
    pub fn upgrade(&self) -> DiResult<LifetimeScope> {
        let scope = self
            .inner
            .upgrade()
            .map(|inner| LifetimeScope { inner })
            .ok_or_else(|| DiError::ScopeDisposed {
                scope: "<dropped>".to_string(),
            })?;
        scope.ensure_alive()?;
        Ok(scope)
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScope")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
