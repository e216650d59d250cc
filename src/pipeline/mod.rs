//! Phased resolve pipeline.
//!
//! Every registration owns a pipeline: an ordered list of middleware, each
//! tagged with the [`PipelinePhase`] it belongs to. A request walks the list
//! front to back. Each middleware may act before and after handing over to
//! the rest of the chain through [`Next`], or short-circuit by returning
//! without calling it (which is how cached shared instances skip
//! activation).
//!
//! ```rust
//! use ferrous_resolve::pipeline::{middleware_fn, InsertionMode, PipelinePhase};
//! use ferrous_resolve::{ContainerBuilder, Resolver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! static ACTIVATIONS: AtomicUsize = AtomicUsize::new(0);
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register(|_, _| Ok(Arc::new(7u32))).use_middleware(
//!     middleware_fn("count", PipelinePhase::Activation, |ctx, next| {
//!         ACTIVATIONS.fetch_add(1, Ordering::SeqCst);
//!         next.run(ctx)
//!     }),
//!     InsertionMode::StartOfPhase,
//! );
//! let container = builder.build().unwrap();
//! container.resolve::<u32>().unwrap();
//! container.resolve::<u32>().unwrap();
//! assert_eq!(ACTIVATIONS.load(Ordering::SeqCst), 2);
//! ```

mod context;
pub(crate) mod middleware;

use std::fmt;
use std::sync::Arc;

use crate::error::DiResult;

pub use context::ResolveRequestContext;

/// Ordered stages of a resolve request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelinePhase {
    /// First stage; sees every request.
    ResolveRequestStart,
    /// Picks the scope that owns the instance.
    ScopeSelection,
    /// Applies decorators to the produced instance.
    Decoration,
    /// Returns cached shared instances.
    Sharing,
    /// Adjusts the parameters handed to the activator.
    ParameterSelection,
    /// Builds the raw instance.
    Activation,
    /// Runs after a new instance exists; the usual extension point.
    PostActivation,
    /// Fires activation handlers.
    Notification,
}

/// Where inside its phase a middleware is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionMode {
    /// Before the middleware already in the phase.
    StartOfPhase,
    /// After the middleware already in the phase.
    EndOfPhase,
}

/// One stage of a resolve pipeline.
pub trait ResolveMiddleware: Send + Sync {
    /// Phase the middleware belongs to.
    fn phase(&self) -> PipelinePhase;

    /// Handles the request. Call `next.run(ctx)` to continue the chain.
    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The remainder of a pipeline after the current middleware.
pub struct Next<'a> {
    rest: &'a [Arc<dyn ResolveMiddleware>],
}

impl Next<'_> {
    /// Runs the rest of the chain. At the end of the chain this is a no-op.
    pub fn run(self, ctx: &mut ResolveRequestContext<'_>) -> DiResult<()> {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware.execute(ctx, Next { rest }),
            None => Ok(()),
        }
    }

    /// Number of middleware still to run.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

/// Middleware built from a closure.
pub struct FnMiddleware<F> {
    name: &'static str,
    phase: PipelinePhase,
    f: F,
}

impl<F> ResolveMiddleware for FnMiddleware<F>
where
    F: Fn(&mut ResolveRequestContext<'_>, Next<'_>) -> DiResult<()> + Send + Sync,
{
    fn phase(&self) -> PipelinePhase {
        self.phase
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        (self.f)(ctx, next)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Wraps a closure as middleware for `phase`.
pub fn middleware_fn<F>(name: &'static str, phase: PipelinePhase, f: F) -> Arc<dyn ResolveMiddleware>
where
    F: Fn(&mut ResolveRequestContext<'_>, Next<'_>) -> DiResult<()> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware { name, phase, f })
}

/// Middleware waiting to be placed into a pipeline.
#[derive(Clone)]
pub(crate) struct MiddlewareEntry {
    pub(crate) middleware: Arc<dyn ResolveMiddleware>,
    pub(crate) mode: InsertionMode,
}

impl MiddlewareEntry {
    pub(crate) fn new(middleware: Arc<dyn ResolveMiddleware>, mode: InsertionMode) -> Self {
        Self { middleware, mode }
    }
}

/// A compiled, immutable pipeline.
#[derive(Clone)]
pub struct ResolvePipeline {
    stages: Arc<[Arc<dyn ResolveMiddleware>]>,
}

impl ResolvePipeline {
    /// Runs the whole pipeline for `ctx`.
    pub fn invoke(&self, ctx: &mut ResolveRequestContext<'_>) -> DiResult<()> {
        Next { rest: &self.stages }.run(ctx)
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True for a pipeline with no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Stage phases in execution order.
    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.stages.iter().map(|m| m.phase()).collect()
    }
}

impl fmt::Debug for ResolvePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

/// Assembles a [`ResolvePipeline`], keeping stages sorted by phase.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn ResolveMiddleware>>,
}

impl PipelineBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `middleware` at the start or end of its phase.
    pub fn use_middleware(&mut self, middleware: Arc<dyn ResolveMiddleware>, mode: InsertionMode) -> &mut Self {
        let phase = middleware.phase();
        let position = match mode {
            InsertionMode::StartOfPhase => self.stages.iter().position(|m| m.phase() >= phase),
            InsertionMode::EndOfPhase => self.stages.iter().position(|m| m.phase() > phase),
        }
        .unwrap_or(self.stages.len());
        self.stages.insert(position, middleware);
        self
    }

    pub(crate) fn use_entries<'a>(&mut self, entries: impl IntoIterator<Item = &'a MiddlewareEntry>) -> &mut Self {
        for entry in entries {
            self.use_middleware(entry.middleware.clone(), entry.mode);
        }
        self
    }

    /// Freezes the pipeline.
    pub fn build(self) -> ResolvePipeline {
        ResolvePipeline {
            stages: self.stages.into(),
        }
    }
}
