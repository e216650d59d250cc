//! Type-erased component instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased, shareable component instance.
///
/// Every instance is stored as an `Arc<T>` behind `dyn Any`, which lets sized
/// types and trait objects share one representation: `Instance::new` accepts
/// `Arc<Database>` and `Arc<dyn Logger>` alike, and [`Instance::downcast`]
/// hands the same `Arc<T>` back. Cloning an `Instance` never clones the
/// component.
///
/// ```rust
/// use ferrous_resolve::Instance;
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn hi(&self) -> &str; }
/// struct English;
/// impl Greeter for English { fn hi(&self) -> &str { "hello" } }
///
/// let instance = Instance::new(Arc::new(English) as Arc<dyn Greeter>);
/// let greeter = instance.downcast::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.hi(), "hello");
/// assert!(instance.downcast::<English>().is_none());
/// ```
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    /// Erases `value`.
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Erases an owned value.
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Recovers the `Arc<T>` this instance was created from.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether the instance holds an `Arc<T>`.
    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }

    /// Name of the erased type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when both handles point at the same stored instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_component() {
        let a = Instance::from_value(String::from("x"));
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        let (sa, sb) = (a.downcast::<String>().unwrap(), b.downcast::<String>().unwrap());
        assert!(Arc::ptr_eq(&sa, &sb));
        assert_eq!(a.type_name(), "alloc::string::String");
    }
}
