//! Registration descriptors for introspection and diagnostics.

use crate::lifetime::{Lifetime, Ownership};
use crate::registration::{ComponentRegistration, RegistrationId};
use crate::service::Service;

/// Snapshot of one registration, for debugging and startup checks.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Lifetime};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register(|_, _| Ok(Arc::new(Database { url: "postgres://localhost".into() })))
///     .lifetime(Lifetime::Root)
///     .with_metadata("tier", "storage");
/// builder.register_instance(Arc::new(5432u32)).named("port");
/// let container = builder.build().unwrap();
///
/// let descriptors = container.descriptors();
/// let db = descriptors.iter().find(|d| d.type_name().contains("Database")).unwrap();
/// assert_eq!(db.lifetime, Lifetime::Root);
/// assert!(db.has_metadata);
///
/// let port = descriptors.iter().find(|d| d.is_keyed()).unwrap();
/// assert_eq!(port.type_name(), "u32");
/// assert_eq!(port.services[0].to_string(), "u32 [\"port\"]");
/// ```
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// Registration id.
    pub id: RegistrationId,
    /// Services the registration satisfies.
    pub services: Vec<Service>,
    /// Sharing policy.
    pub lifetime: Lifetime,
    /// Disposal responsibility.
    pub ownership: Ownership,
    /// Whether metadata is attached.
    pub has_metadata: bool,
    /// Whether the component is built eagerly.
    pub auto_activate: bool,
    /// Whether the registration keeps an existing default.
    pub preserves_existing_defaults: bool,
}

impl ComponentDescriptor {
    /// Type name of the first service, or `"<none>"`.
    pub fn type_name(&self) -> &'static str {
        self.services.first().map_or("<none>", Service::type_name)
    }

    /// True if any service is keyed.
    pub fn is_keyed(&self) -> bool {
        self.services.iter().any(Service::is_keyed)
    }

    /// True if the registration is shared.
    pub fn is_shared(&self) -> bool {
        self.lifetime.is_shared()
    }
}

impl From<&ComponentRegistration> for ComponentDescriptor {
    fn from(registration: &ComponentRegistration) -> Self {
        Self {
            id: registration.id(),
            services: registration.services().to_vec(),
            lifetime: registration.lifetime().clone(),
            ownership: registration.ownership(),
            has_metadata: !registration.metadata().is_empty(),
            auto_activate: registration.is_auto_activated(),
            preserves_existing_defaults: registration.preserves_existing_defaults(),
        }
    }
}
