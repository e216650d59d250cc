//! Per-request state threaded through a pipeline.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::operation::{ResolveContext, ResolveOperation};
use crate::parameters::Parameters;
use crate::registration::ComponentRegistration;
use crate::scope::LifetimeScope;
use crate::service::Service;

/// State of one resolve request while its pipeline runs.
///
/// The context starts in the scope the request was made from; scope
/// selection may move it to the scope that owns the instance. Whatever
/// instance is set when the pipeline returns is handed to the caller.
pub struct ResolveRequestContext<'op> {
    operation: &'op ResolveOperation,
    service: Service,
    registration: Arc<ComponentRegistration>,
    parameters: Parameters,
    scope: LifetimeScope,
    decorator_target: Option<Instance>,
    instance: Option<Instance>,
    new_instance_activated: bool,
}

impl<'op> ResolveRequestContext<'op> {
    pub(crate) fn new(
        operation: &'op ResolveOperation,
        scope: LifetimeScope,
        service: Service,
        registration: Arc<ComponentRegistration>,
        parameters: Parameters,
        decorator_target: Option<Instance>,
    ) -> Self {
        Self {
            operation,
            service,
            registration,
            parameters,
            scope,
            decorator_target,
            instance: None,
            new_instance_activated: false,
        }
    }

    /// The operation this request belongs to.
    pub fn operation(&self) -> &'op ResolveOperation {
        self.operation
    }

    /// Requested service.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Registration being resolved.
    pub fn registration(&self) -> &Arc<ComponentRegistration> {
        &self.registration
    }

    /// Parameters for the activator.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Replaces the parameters for the rest of the pipeline.
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    /// Scope the request currently runs in.
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    /// Moves the request to another scope.
    pub fn change_scope(&mut self, scope: LifetimeScope) {
        self.scope = scope;
    }

    /// For decorator registrations, the instance being decorated.
    pub fn decorator_target(&self) -> Option<&Instance> {
        self.decorator_target.as_ref()
    }

    /// Instance produced so far.
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    /// Sets or replaces the produced instance.
    pub fn set_instance(&mut self, instance: Instance) {
        self.instance = Some(instance);
    }

    /// The produced instance, or `NoInstance` if nothing set one.
    pub fn require_instance(&self) -> DiResult<&Instance> {
        self.instance.as_ref().ok_or_else(|| DiError::NoInstance {
            service: self.service.clone(),
        })
    }

    pub(crate) fn take_instance(&mut self) -> DiResult<Instance> {
        self.instance.take().ok_or_else(|| DiError::NoInstance {
            service: self.service.clone(),
        })
    }

    /// True once an activator ran for this request (as opposed to a cache hit).
    pub fn new_instance_activated(&self) -> bool {
        self.new_instance_activated
    }

    pub(crate) fn mark_activated(&mut self) {
        self.new_instance_activated = true;
    }

    /// Context handed to activators for this request.
    pub fn activation_context(&self) -> ResolveContext<'_> {
        ResolveContext::new(
            self.operation,
            &self.scope,
            &self.service,
            &self.registration,
            self.decorator_target.as_ref(),
        )
    }

    /// Resolves another service as part of the same operation.
    pub fn resolve_service(&self, service: &Service, parameters: &Parameters) -> DiResult<Instance> {
        self.operation.resolve_default(&self.scope, service, parameters)
    }
}
