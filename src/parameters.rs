//! Parameters supplied to activators at resolve time.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::instance::Instance;

/// A single value offered to an activator.
#[derive(Clone)]
pub enum Parameter {
    /// Matched by name.
    Named(Cow<'static, str>, Instance),
    /// Matched by type.
    Typed(TypeId, Instance),
    /// Matched by position.
    Positional(usize, Instance),
}

impl Parameter {
    /// Parameter matched by name.
    pub fn named<T: Send + Sync + 'static>(name: impl Into<Cow<'static, str>>, value: T) -> Self {
        Parameter::Named(name.into(), Instance::from_value(value))
    }

    /// Parameter matched by its type.
    pub fn typed<T: Send + Sync + 'static>(value: T) -> Self {
        Parameter::Typed(TypeId::of::<T>(), Instance::from_value(value))
    }

    /// Parameter matched by position.
    pub fn positional<T: Send + Sync + 'static>(position: usize, value: T) -> Self {
        Parameter::Positional(position, Instance::from_value(value))
    }

    fn value(&self) -> &Instance {
        match self {
            Parameter::Named(_, v) | Parameter::Typed(_, v) | Parameter::Positional(_, v) => v,
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Named(name, v) => write!(f, "Named({name}: {})", v.type_name()),
            Parameter::Typed(_, v) => write!(f, "Typed({})", v.type_name()),
            Parameter::Positional(pos, v) => write!(f, "Positional({pos}: {})", v.type_name()),
        }
    }
}

/// Ordered, cheaply clonable parameter list.
///
/// Lookups return the first match, so parameters supplied by the caller win
/// over registration defaults appended after them.
///
/// ```rust
/// use ferrous_resolve::{Parameter, Parameters};
///
/// let params = Parameters::from(vec![
///     Parameter::named("retries", 3u32),
///     Parameter::typed(String::from("eu-west")),
/// ]);
/// assert_eq!(*params.named::<u32>("retries").unwrap(), 3);
/// assert_eq!(params.typed::<String>().unwrap().as_str(), "eu-west");
/// assert!(params.positional::<u32>(0).is_none());
/// ```
#[derive(Clone, Default, Debug)]
pub struct Parameters {
    items: Arc<[Parameter]>,
}

impl Parameters {
    /// No parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// First named parameter called `name` holding a `T`.
    pub fn named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.items.iter().find_map(|p| match p {
            Parameter::Named(n, v) if n == name => v.downcast::<T>(),
            _ => None,
        })
    }

    /// First typed parameter holding a `T`.
    pub fn typed<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let id = TypeId::of::<T>();
        self.items.iter().find_map(|p| match p {
            Parameter::Typed(t, v) if *t == id => v.downcast::<T>(),
            _ => None,
        })
    }

    /// Positional parameter at `position` holding a `T`.
    pub fn positional<T: Send + Sync + 'static>(&self, position: usize) -> Option<Arc<T>> {
        self.items.iter().find_map(|p| match p {
            Parameter::Positional(i, v) if *i == position => v.downcast::<T>(),
            _ => None,
        })
    }

    /// Any parameter holding a `T`, whatever its matching rule.
    pub fn any<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.items.iter().find_map(|p| p.value().downcast::<T>())
    }

    /// Parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there are none.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `self` followed by `defaults`.
    pub(crate) fn followed_by(&self, defaults: &Parameters) -> Parameters {
        if defaults.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return defaults.clone();
        }
        self.items.iter().chain(defaults.items.iter()).cloned().collect::<Vec<_>>().into()
    }
}

impl From<Vec<Parameter>> for Parameters {
    fn from(items: Vec<Parameter>) -> Self {
        Self { items: items.into() }
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}
