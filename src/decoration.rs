//! Decorators: registrations that wrap the instances of another service.
//!
//! A decorator never resolves on its own. It runs from the Decoration phase
//! of every registration exposing the decorated service, receives the
//! current instance through [`ResolveContext::decorator_target`] and returns
//! a replacement. Several decorators compose in registration order, so the
//! last one registered ends up outermost.
//!
//! ```rust
//! use ferrous_resolve::{ContainerBuilder, Resolver};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//! struct Plain;
//! impl Greeter for Plain {
//!     fn greet(&self) -> String { "hi".into() }
//! }
//! struct Loud(Arc<dyn Greeter>);
//! impl Greeter for Loud {
//!     fn greet(&self) -> String { self.0.greet().to_uppercase() }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register(|_, _| Ok(Arc::new(Plain) as Arc<dyn Greeter>));
//! builder.register_decorator::<dyn Greeter, _>(|_, _, inner| Ok(Arc::new(Loud(inner)) as Arc<dyn Greeter>));
//!
//! let container = builder.build().unwrap();
//! assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "HI");
//! ```
//!
//! [`ResolveContext::decorator_target`]: crate::ResolveContext::decorator_target

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::DiResult;
use crate::instance::Instance;
use crate::metadata::Metadata;
use crate::pipeline::{Next, PipelinePhase, ResolveMiddleware, ResolveRequestContext};
use crate::registration::{ComponentRegistration, RegistrationId};
use crate::scope::cache::{self, SharingKey};
use crate::service::Service;

/// Decides per resolution whether a decorator applies.
pub type DecoratorCondition = Arc<dyn Fn(&DecoratorContext<'_>) -> bool + Send + Sync>;

/// What a decorator condition can inspect.
pub struct DecoratorContext<'a> {
    service: &'a Service,
    implementation: &'a ComponentRegistration,
    applied: &'a [RegistrationId],
    current: &'a Instance,
}

impl DecoratorContext<'_> {
    /// Service being decorated.
    pub fn service(&self) -> &Service {
        self.service
    }

    /// Registration that produced the undecorated instance.
    pub fn implementation(&self) -> &ComponentRegistration {
        self.implementation
    }

    /// Metadata of the implementation.
    pub fn metadata(&self) -> &Metadata {
        self.implementation.metadata()
    }

    /// Decorators applied so far, innermost first.
    pub fn applied_decorators(&self) -> &[RegistrationId] {
        self.applied
    }

    /// Whether `decorator` already wrapped the instance.
    pub fn is_applied(&self, decorator: RegistrationId) -> bool {
        self.applied.contains(&decorator)
    }

    /// Instance as it stands before this decorator.
    pub fn current_instance(&self) -> &Instance {
        self.current
    }
}

/// A decorator for one service.
#[derive(Clone)]
pub struct DecoratorRegistration {
    service: Service,
    registration: Arc<ComponentRegistration>,
    condition: Option<DecoratorCondition>,
}

impl DecoratorRegistration {
    /// Decorates `service` with `registration`, whose activator reads the
    /// target from the resolve context.
    pub fn new(service: Service, registration: ComponentRegistration) -> Self {
        Self {
            service,
            registration: Arc::new(registration),
            condition: None,
        }
    }

    /// Only applies when `condition` holds.
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&DecoratorContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Decorated service.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// The decorator's own registration.
    pub fn registration(&self) -> &Arc<ComponentRegistration> {
        &self.registration
    }

    /// Id of the decorator registration.
    pub fn id(&self) -> RegistrationId {
        self.registration.id()
    }

    pub(crate) fn set_condition(&mut self, condition: DecoratorCondition) {
        self.condition = Some(condition);
    }

    pub(crate) fn set_service(&mut self, service: Service) {
        self.service = service;
    }

    fn applies(&self, ctx: &DecoratorContext<'_>) -> bool {
        self.condition.as_ref().map_or(true, |condition| condition(ctx))
    }
}

/// Applies the decorators of the requested service after the inner chain
/// produced an instance.
pub(crate) struct DecoratorMiddleware {
    decorators: Vec<(Service, Arc<[DecoratorRegistration]>)>,
}

impl DecoratorMiddleware {
    pub(crate) fn new(decorators: Vec<(Service, Arc<[DecoratorRegistration]>)>) -> Self {
        Self { decorators }
    }

    fn for_service(&self, service: &Service) -> Option<Arc<[DecoratorRegistration]>> {
        self.decorators
            .iter()
            .find(|(s, _)| s == service)
            .map(|(_, decorators)| decorators.clone())
    }
}

impl ResolveMiddleware for DecoratorMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Decoration
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        next.run(ctx)?;
        let Some(decorators) = self.for_service(ctx.service()) else {
            return Ok(());
        };

        let target = ctx.registration().clone();
        let service = ctx.service().clone();
        let shared = target.lifetime().is_shared();
        let mut current = ctx.require_instance()?.clone();
        let mut applied: SmallVec<[RegistrationId; 4]> = SmallVec::new();

        for decorator in decorators.iter() {
            let decorator_ctx = DecoratorContext {
                service: &service,
                implementation: &target,
                applied: &applied,
                current: &current,
            };
            if !decorator.applies(&decorator_ctx) {
                continue;
            }
            applied.push(decorator.id());

            let operation = ctx.operation();
            let scope = ctx.scope();
            let input = current.clone();
            let build = || {
                operation.resolve_request(scope, &service, decorator.registration(), ctx.parameters(), Some(input))
            };
            current = if shared {
                let cell = scope
                    .shared_instances()
                    .cell(SharingKey::decorated(target.id(), &service, &applied));
                cache::get_or_build(&cell, operation, &service, build)?
            } else {
                build()?
            };
        }

        ctx.set_instance(current);
        Ok(())
    }

    fn name(&self) -> &str {
        "decoration"
    }
}
