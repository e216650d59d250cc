//! Ownership tracking and ordered release of disposable instances.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{DiError, DiResult, DisposalErrors};
use crate::traits::{AsyncDispose, Dispose, DisposeResult};

/// Boxed future used for asynchronous disposal.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

enum EntryKind {
    Sync(Box<dyn FnOnce() -> DisposeResult + Send>),
    Async(Box<dyn FnOnce() -> BoxFuture<'static, DisposeResult> + Send>),
}

/// Something a [`Disposer`] releases when its scope ends.
pub struct DisposerEntry {
    component: &'static str,
    kind: EntryKind,
}

impl DisposerEntry {
    /// Disposes `instance` through [`Dispose`].
    pub fn sync<T: ?Sized + Dispose>(instance: Arc<T>) -> Self {
        Self {
            component: std::any::type_name::<T>(),
            kind: EntryKind::Sync(Box::new(move || instance.dispose())),
        }
    }

    /// Disposes `instance` through [`AsyncDispose`].
    pub fn asynchronous<T: ?Sized + AsyncDispose>(instance: Arc<T>) -> Self {
        Self {
            component: std::any::type_name::<T>(),
            kind: EntryKind::Async(Box::new(move || Box::pin(async move { instance.dispose().await }))),
        }
    }

    /// Runs an arbitrary cleanup closure.
    pub fn hook<F>(component: &'static str, f: F) -> Self
    where
        F: FnOnce() -> DisposeResult + Send + 'static,
    {
        Self {
            component,
            kind: EntryKind::Sync(Box::new(f)),
        }
    }

    /// Runs an arbitrary asynchronous cleanup closure.
    pub fn async_hook<F, Fut>(component: &'static str, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DisposeResult> + Send + 'static,
    {
        Self {
            component,
            kind: EntryKind::Async(Box::new(move || Box::pin(f()))),
        }
    }

    /// Type name of the tracked component.
    pub fn component(&self) -> &'static str {
        self.component
    }

    fn run_sync(self) -> DisposeResult {
        match self.kind {
            EntryKind::Sync(f) => match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(result) => result,
                Err(payload) => Err(panic_message(payload).into()),
            },
            EntryKind::Async(_) => Err(Box::new(DiError::AsyncDisposalRequired(self.component))),
        }
    }

    async fn run_async(self) -> DisposeResult {
        match self.kind {
            EntryKind::Async(f) => f().await,
            EntryKind::Sync(_) => self.run_sync(),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[derive(Default)]
struct DisposerState {
    entries: Vec<DisposerEntry>,
    disposed: bool,
}

/// LIFO collection of disposables owned by one lifetime scope.
///
/// Entries are released in reverse order of addition. Every entry runs even
/// when an earlier one fails or panics; failures come back aggregated in
/// [`DiError::Disposal`]. Disposing twice is a no-op.
///
/// ```
/// use ferrous_resolve::{Disposer, DisposerEntry};
/// use std::sync::{Arc, Mutex};
///
/// let order = Arc::new(Mutex::new(Vec::new()));
/// let disposer = Disposer::new("example");
/// for name in ["x", "y", "z"] {
///     let order = order.clone();
///     disposer
///         .add_for_disposal(DisposerEntry::hook(name, move || {
///             order.lock().unwrap().push(name);
///             Ok(())
///         }))
///         .unwrap();
/// }
/// disposer.dispose().unwrap();
/// assert_eq!(*order.lock().unwrap(), vec!["z", "y", "x"]);
/// ```
pub struct Disposer {
    owner: String,
    state: Mutex<DisposerState>,
}

impl Disposer {
    /// Creates an empty disposer; `owner` names it in errors and logs.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(DisposerState::default()),
        }
    }

    /// Takes ownership of `entry`.
    ///
    /// After disposal the entry is released on the spot and
    /// `DiError::ScopeDisposed` is returned, so nothing outlives its owner
    /// untracked.
    pub fn add_for_disposal(&self, entry: DisposerEntry) -> DiResult<()> {
        let mut state = self.state.lock();
        if !state.disposed {
            trace!(owner = %self.owner, component = entry.component, "Tracking disposable");
            state.entries.push(entry);
            return Ok(());
        }
        drop(state);
        let component = entry.component;
        if let Err(error) = entry.run_sync() {
            debug!(owner = %self.owner, component, %error, "Late disposable failed to dispose");
        }
        Err(DiError::ScopeDisposed { scope: self.owner.clone() })
    }

    /// Releases every entry, most recent first.
    pub fn dispose(&self) -> DiResult<()> {
        let entries = self.take_entries();
        let mut errors = DisposalErrors::default();
        for entry in entries.into_iter().rev() {
            let component = entry.component;
            if let Err(error) = entry.run_sync() {
                errors.push(component, error);
            }
        }
        errors.into_result()
    }

    /// Releases every entry, most recent first, awaiting asynchronous ones.
    pub async fn dispose_async(&self) -> DiResult<()> {
        let entries = self.take_entries();
        let mut errors = DisposalErrors::default();
        for entry in entries.into_iter().rev() {
            let component = entry.component;
            if let Err(error) = entry.run_async().await {
                errors.push(component, error);
            }
        }
        errors.into_result()
    }

    fn take_entries(&self) -> Vec<DisposerEntry> {
        let mut state = self.state.lock();
        state.disposed = true;
        let entries = std::mem::take(&mut state.entries);
        if !entries.is_empty() {
            debug!(owner = %self.owner, count = entries.len(), "Disposing tracked instances");
        }
        entries
    }

    /// Number of entries still awaiting disposal.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `dispose` or `dispose_async` has run.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Disposer")
            .field("owner", &self.owner)
            .field("entries", &state.entries.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}
