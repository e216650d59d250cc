//! Service identities used for registration and lookup.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::sources::AdapterWrap;

/// Discriminator refining a service beyond its type.
///
/// ```rust
/// use ferrous_resolve::ServiceKey;
///
/// let by_name: ServiceKey = "primary".into();
/// let by_number: ServiceKey = 7.into();
/// assert_ne!(by_name, by_number);
/// assert_eq!(by_name.to_string(), "\"primary\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKey {
    /// String name, as used by named services.
    Name(Cow<'static, str>),
    /// Integer key.
    Int(i64),
}

impl From<&'static str> for ServiceKey {
    fn from(name: &'static str) -> Self {
        ServiceKey::Name(Cow::Borrowed(name))
    }
}

impl From<String> for ServiceKey {
    fn from(name: String) -> Self {
        ServiceKey::Name(Cow::Owned(name))
    }
}

impl From<i64> for ServiceKey {
    fn from(key: i64) -> Self {
        ServiceKey::Int(key)
    }
}

impl From<i32> for ServiceKey {
    fn from(key: i32) -> Self {
        ServiceKey::Int(key.into())
    }
}

impl From<u32> for ServiceKey {
    fn from(key: u32) -> Self {
        ServiceKey::Int(key.into())
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKey::Name(name) => write!(f, "{name:?}"),
            ServiceKey::Int(key) => write!(f, "{key}"),
        }
    }
}

/// Kind of relationship an adapter service expresses over its inner service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// `All<T>`: every registration of `T`.
    Collection,
    /// `Lazy<T>`: construction deferred until first use.
    Lazy,
    /// `Owned<T>`: instance living in its own disposable scope.
    Owned,
    /// `Factory<T>`: repeatable deferred construction.
    Factory,
    /// `Index<T>`: keyed lookup of `T`.
    Index,
    /// `Meta<T>`: instance paired with registration metadata.
    Meta,
}

/// Describes how an adapter service wraps its inner service.
pub struct AdapterInfo {
    pub(crate) kind: AdapterKind,
    pub(crate) inner: Service,
    pub(crate) wrap: AdapterWrap,
}

impl AdapterInfo {
    /// Adapter relationship.
    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    /// The adapted service.
    pub fn inner(&self) -> &Service {
        &self.inner
    }
}

impl fmt::Debug for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterInfo")
            .field("kind", &self.kind)
            .field("inner", &self.inner)
            .finish()
    }
}

/// Identity of something that can be requested from a lifetime scope.
///
/// A service is a type, optionally refined by a [`ServiceKey`]. Two services
/// are equal when their types and keys are equal. Adapter services such as
/// `All<T>` carry a description of the inner service they adapt and are
/// distinct from the plain service of the same type; the registry maps a
/// plain request for a known adapter type onto its adapter service.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::Service;
///
/// trait Logger: Send + Sync {}
///
/// assert_eq!(Service::of::<dyn Logger>(), Service::of::<dyn Logger>());
/// assert_ne!(Service::of::<u32>(), Service::named::<u32>("port"));
/// assert_eq!(Service::named::<u32>("port"), Service::keyed::<u32>("port"));
/// assert_eq!(Service::of::<u32>().to_string(), "u32");
/// ```
#[derive(Clone)]
pub struct Service {
    type_id: TypeId,
    type_name: &'static str,
    key: Option<ServiceKey>,
    adapter: Option<Arc<AdapterInfo>>,
}

impl Service {
    /// The service for type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
            adapter: None,
        }
    }

    /// The service for type `T` registered under `name`.
    pub fn named<T: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::keyed::<T>(ServiceKey::Name(name.into()))
    }

    /// The service for type `T` registered under `key`.
    pub fn keyed<T: ?Sized + 'static>(key: impl Into<ServiceKey>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::of::<T>()
        }
    }

    pub(crate) fn adapter<A: ?Sized + 'static>(kind: AdapterKind, inner: Service, wrap: AdapterWrap) -> Self {
        Self {
            adapter: Some(Arc::new(AdapterInfo { kind, inner, wrap })),
            ..Self::of::<A>()
        }
    }

    /// Same type, refined by `key`. Adapter information is dropped.
    pub fn with_key(&self, key: impl Into<ServiceKey>) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            key: Some(key.into()),
            adapter: None,
        }
    }

    /// The unkeyed service of the same type.
    pub fn without_key(&self) -> Self {
        Self {
            key: None,
            ..self.clone()
        }
    }

    /// Type identity of the service.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Key refining the service, if any.
    pub fn key(&self) -> Option<&ServiceKey> {
        self.key.as_ref()
    }

    /// True for keyed or named services.
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Adapter description for `All<T>`, `Lazy<T>` and friends.
    pub fn adapter_info(&self) -> Option<&AdapterInfo> {
        self.adapter.as_deref()
    }

    fn adapter_kind(&self) -> Option<AdapterKind> {
        self.adapter.as_ref().map(|info| info.kind)
    }

    /// Checks whether this service is the plain or keyed service for `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.key == other.key && self.adapter_kind() == other.adapter_kind()
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.key.hash(state);
        self.adapter_kind().hash(state);
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} [{}]", self.type_name, key),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Plugin: Send + Sync {}

    #[test]
    fn equality_uses_type_and_key() {
        let mut set = HashSet::new();
        set.insert(Service::of::<dyn Plugin>());
        set.insert(Service::of::<dyn Plugin>());
        set.insert(Service::named::<dyn Plugin>("a"));
        set.insert(Service::keyed::<dyn Plugin>(1));
        set.insert(Service::named::<dyn Plugin>("a"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn with_key_keeps_type_identity() {
        let plain = Service::of::<u64>();
        let keyed = plain.with_key("x");
        assert_eq!(keyed.type_id(), plain.type_id());
        assert_eq!(keyed.without_key(), plain);
        assert_eq!(keyed.to_string(), "u64 [\"x\"]");
    }

    #[test]
    fn adapter_service_is_distinct_from_plain_type() {
        use crate::sources::{AdapterType, All};

        let adapter = All::<u64>::service();
        assert_eq!(adapter, All::<u64>::service());
        assert_ne!(adapter, Service::of::<All<u64>>());
        assert_eq!(adapter.type_id(), Service::of::<All<u64>>().type_id());
    }
}
