//! Error types for the resolution engine.

use std::fmt;

use crate::registration::RegistrationId;
use crate::service::Service;

/// Boxed error type accepted from activators, handlers and disposables.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Resolution engine errors.
///
/// `Circular` and `ScopeDisposed` travel through nested activations
/// unchanged. Any other failure raised while an activator runs is wrapped in
/// [`DiError::Activation`] once per level, so the chain of services that led
/// to the failure stays visible. Use [`DiError::root_cause`] to get at the
/// innermost error.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, DiError, Resolver};
///
/// let container = ContainerBuilder::new().build().unwrap();
/// match container.resolve::<String>() {
///     Err(DiError::NotRegistered { service }) => {
///         assert_eq!(service.type_name(), "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DiError {
    /// No registration (static or synthesized) satisfies the service.
    #[error("service not registered: {service}")]
    NotRegistered {
        /// The requested service.
        service: Service,
    },

    /// A service re-entered its own construction.
    #[error("{}", CircularPath(.path))]
    Circular {
        /// The in-flight stack followed by the repeated service.
        path: Vec<Service>,
    },

    /// An activator (or something it resolved) failed.
    #[error("failed to activate {service} (registration {registration}): {source}")]
    Activation {
        /// Service being resolved when the failure happened.
        service: Service,
        /// Registration whose activator failed.
        registration: RegistrationId,
        /// Underlying failure.
        #[source]
        source: Box<DiError>,
    },

    /// The scope (or one of its ancestors) has been disposed.
    #[error("lifetime scope {scope} has already been disposed")]
    ScopeDisposed {
        /// Description of the disposed scope.
        scope: String,
    },

    /// A matching-scope registration found no visible scope with an accepted tag.
    #[error("no lifetime scope tagged {tags} is visible from the scope resolving {service}")]
    NoMatchingScope {
        /// Service being resolved.
        service: Service,
        /// Human readable list of accepted tags.
        tags: String,
    },

    /// A produced instance did not have the representation of the requested service.
    #[error("instance produced for {service} is not a {expected}")]
    TypeMismatch {
        /// Service that was resolved.
        service: Service,
        /// Type that was expected.
        expected: &'static str,
    },

    /// Resolution nested deeper than the configured limit.
    #[error("maximum resolve depth {0} exceeded")]
    DepthExceeded(usize),

    /// A pipeline finished without an instance, usually a middleware that
    /// short-circuited without setting one.
    #[error("resolve pipeline for {service} completed without producing an instance")]
    NoInstance {
        /// Service that was resolved.
        service: Service,
    },

    /// An entry only supports asynchronous disposal but a synchronous dispose ran.
    #[error("{0} only supports asynchronous disposal; use dispose_async")]
    AsyncDisposalRequired(&'static str),

    /// One or more disposables failed. Every entry still ran.
    #[error("{0}")]
    Disposal(DisposalErrors),

    /// Failure raised by user code (activators, handlers, middleware).
    #[error("{0}")]
    Custom(BoxError),
}

impl DiError {
    /// Wraps an arbitrary error raised by user code.
    pub fn custom<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        DiError::Custom(error.into())
    }

    /// Convenience for a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        DiError::Custom(message.into().into())
    }

    /// Walks nested activation failures down to the innermost error.
    ///
    /// ```rust
    /// use ferrous_resolve::{DiError, Service};
    ///
    /// let inner = DiError::msg("boom");
    /// let outer = DiError::Activation {
    ///     service: Service::of::<u32>(),
    ///     registration: Default::default(),
    ///     source: Box::new(inner),
    /// };
    /// assert_eq!(outer.root_cause().to_string(), "boom");
    /// ```
    pub fn root_cause(&self) -> &DiError {
        let mut current = self;
        while let DiError::Activation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Services of every activation layer, outermost first.
    pub fn activation_chain(&self) -> Vec<&Service> {
        let mut chain = Vec::new();
        let mut current = self;
        while let DiError::Activation { service, source, .. } = current {
            chain.push(service);
            current = source;
        }
        chain
    }

    /// True when the root cause is a missing registration.
    pub fn is_not_registered(&self) -> bool {
        matches!(self.root_cause(), DiError::NotRegistered { .. })
    }

    /// True for a circular dependency at any nesting level.
    pub fn is_circular(&self) -> bool {
        matches!(self.root_cause(), DiError::Circular { .. })
    }

    /// True when the failure came from a disposed scope.
    pub fn is_scope_disposed(&self) -> bool {
        matches!(self.root_cause(), DiError::ScopeDisposed { .. })
    }

    /// Errors that must reach the top-level caller unwrapped.
    pub(crate) fn passes_through_activation(&self) -> bool {
        matches!(
            self,
            DiError::Circular { .. } | DiError::ScopeDisposed { .. } | DiError::DepthExceeded(_)
        )
    }
}

struct CircularPath<'a>(&'a [Service]);

impl fmt::Display for CircularPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("circular dependency detected: ")?;
        for (i, service) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{service}")?;
        }
        Ok(())
    }
}

/// A single failed disposal.
#[derive(Debug)]
pub struct DisposalFailure {
    /// Type name of the disposable that failed.
    pub component: &'static str,
    /// What went wrong. Panics are converted into messages.
    pub error: BoxError,
}

/// Every failure collected during one disposal pass, in disposal order.
#[derive(Debug, Default)]
pub struct DisposalErrors {
    failures: Vec<DisposalFailure>,
}

impl DisposalErrors {
    pub(crate) fn push(&mut self, component: &'static str, error: BoxError) {
        self.failures.push(DisposalFailure { component, error });
    }

    pub(crate) fn absorb(&mut self, error: DiError) {
        match error {
            DiError::Disposal(nested) => self.failures.extend(nested.failures),
            other => self.failures.push(DisposalFailure {
                component: "lifetime scope",
                error: Box::new(other),
            }),
        }
    }

    /// Failed disposals in the order they ran.
    pub fn failures(&self) -> &[DisposalFailure] {
        &self.failures
    }

    /// Number of failures.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn into_result(self) -> DiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal(self))
        }
    }
}

impl fmt::Display for DisposalErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} disposal failure(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.component, failure.error)?;
        }
        Ok(())
    }
}

/// Result type for resolution operations.
///
/// ```rust
/// use ferrous_resolve::{DiError, DiResult};
///
/// fn connect(url: &str) -> DiResult<String> {
///     if url.is_empty() {
///         return Err(DiError::msg("empty url"));
///     }
///     Ok(url.to_string())
/// }
///
/// assert!(connect("").is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
