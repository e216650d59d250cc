//! Middleware every registration pipeline is assembled from.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::lifetime::Lifetime;
use crate::pipeline::{Next, PipelinePhase, ResolveMiddleware, ResolveRequestContext};
use crate::registration::{ActivatedEvent, ActivatingEvent, RegistrationId};
use crate::scope::cache::{self, SharingKey};
use crate::service::Service;

/// Wraps a failure raised while activating `registration` for `service`.
///
/// Cycles, disposed scopes and depth overflows describe the whole operation
/// and surface unchanged.
pub(crate) fn activation_failed(service: &Service, registration: RegistrationId, error: DiError) -> DiError {
    if error.passes_through_activation() {
        return error;
    }
    DiError::Activation {
        service: service.clone(),
        registration,
        source: Box::new(error),
    }
}

/// Moves the request to the scope that owns the instance.
pub(crate) struct ScopeSelectionMiddleware;

impl ResolveMiddleware for ScopeSelectionMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::ScopeSelection
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        let registration = ctx.registration().clone();
        match registration.lifetime() {
            Lifetime::Root => {
                let root = ctx.scope().root_scope()?;
                root.ensure_alive()?;
                ctx.change_scope(root);
            }
            Lifetime::MatchingScope(matcher) => {
                let owner = ctx.scope().find_matching(matcher).ok_or_else(|| DiError::NoMatchingScope {
                    service: ctx.service().clone(),
                    tags: matcher.describe(),
                })?;
                ctx.change_scope(owner);
            }
            Lifetime::PerDependency => {}
        }
        next.run(ctx)
    }

    fn name(&self) -> &str {
        "scope-selection"
    }
}

/// Turns the raw instance into the representation of the requested service.
pub(crate) struct ServiceConversionMiddleware;

impl ResolveMiddleware for ServiceConversionMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Decoration
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        next.run(ctx)?;
        let raw = ctx.require_instance()?;
        let converted = ctx.registration().convert(ctx.service(), raw)?;
        ctx.set_instance(converted);
        Ok(())
    }

    fn name(&self) -> &str {
        "service-conversion"
    }
}

/// Returns the cached instance of a shared registration, building it once.
pub(crate) struct SharingMiddleware;

impl ResolveMiddleware for SharingMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Sharing
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        let cell = ctx
            .scope()
            .shared_instances()
            .cell(SharingKey::component(ctx.registration().id()));
        let operation = ctx.operation();
        let service = ctx.service().clone();
        let instance = cache::get_or_build(&cell, operation, &service, || {
            next.run(ctx)?;
            ctx.take_instance()
        })?;
        ctx.set_instance(instance);
        Ok(())
    }

    fn name(&self) -> &str {
        "sharing"
    }
}

/// Appends registration-level parameters after the caller's.
pub(crate) struct ParameterMiddleware;

impl ResolveMiddleware for ParameterMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::ParameterSelection
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        let parameters = ctx.parameters().followed_by(ctx.registration().parameters());
        ctx.set_parameters(parameters);
        next.run(ctx)
    }

    fn name(&self) -> &str {
        "parameters"
    }
}

/// Runs the activator and tracks the new instance for disposal.
pub(crate) struct ActivatorMiddleware;

impl ResolveMiddleware for ActivatorMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Activation
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        let registration = ctx.registration().clone();
        let activated = {
            let activation = ctx.activation_context();
            (registration.activator())(&activation, ctx.parameters())
        };
        let instance = activated.map_err(|e| activation_failed(ctx.service(), registration.id(), e))?;

        if let Some(entry) = registration.disposal_entry(&instance) {
            ctx.scope().disposer().add_for_disposal(entry)?;
        }
        ctx.set_instance(instance);
        ctx.mark_activated();
        next.run(ctx)
    }

    fn name(&self) -> &str {
        "activator"
    }
}

/// Fires `on_activating` handlers now and queues `on_activated` handlers
/// until the operation completes.
pub(crate) struct NotificationMiddleware;

impl ResolveMiddleware for NotificationMiddleware {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Notification
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        if !ctx.new_instance_activated() {
            return next.run(ctx);
        }
        let registration = ctx.registration().clone();
        let service = ctx.service().clone();
        let mut instance = ctx.require_instance()?.clone();

        if !registration.activating.is_empty() {
            let activation = ctx.activation_context();
            let parameters = ctx.parameters().clone();
            let mut event = ActivatingEvent::new(&activation, &parameters, instance);
            for handler in &registration.activating {
                handler(&mut event).map_err(|e| activation_failed(&service, registration.id(), e))?;
            }
            instance = event.into_instance();
        }

        if !registration.activated.is_empty() {
            let scope = ctx.scope().clone();
            let parameters = ctx.parameters().clone();
            let instance = instance.clone();
            let registration = Arc::clone(&registration);
            ctx.operation().defer(move || {
                let event = ActivatedEvent {
                    scope: &scope,
                    registration: &registration,
                    parameters: &parameters,
                    instance: &instance,
                };
                for handler in &registration.activated {
                    handler(&event).map_err(|e| activation_failed(&service, registration.id(), e))?;
                }
                Ok(())
            });
        }

        ctx.set_instance(instance);
        next.run(ctx)
    }

    fn name(&self) -> &str {
        "notification"
    }
}
