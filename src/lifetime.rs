//! Lifetime policies, scope tags and ownership.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::service::Service;

/// Label attached to a lifetime scope.
///
/// Matching-scope registrations look for the nearest scope carrying one of
/// their tags. The outermost scope always carries [`ScopeTag::root`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeTag(Arc<str>);

impl ScopeTag {
    /// Tag carried by every container's root scope.
    pub const ROOT: &'static str = "root";

    /// Creates a tag.
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    /// The root scope tag.
    pub fn root() -> Self {
        Self::new(Self::ROOT)
    }

    /// Tag of the child scope created for an `Owned` instance of `service`.
    pub fn owned_by(service: &Service) -> Self {
        Self::new(format!("owned:{service}"))
    }

    /// Tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for ScopeTag {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.0)
    }
}

/// Predicate selecting the scope that owns a shared instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeMatcher {
    /// The resolving scope itself.
    Any,
    /// Nearest ancestor-or-self scope carrying one of these tags.
    Tags(SmallVec<[ScopeTag; 2]>),
}

impl ScopeMatcher {
    /// Whether a scope with `tag` satisfies the matcher.
    pub fn matches(&self, tag: Option<&ScopeTag>) -> bool {
        match self {
            ScopeMatcher::Any => true,
            ScopeMatcher::Tags(tags) => tag.is_some_and(|tag| tags.contains(tag)),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            ScopeMatcher::Any => "<any>".to_string(),
            ScopeMatcher::Tags(tags) => tags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// How instances of a registration are shared.
///
/// - **Root**: one instance for the whole container, owned by the root scope
///   no matter which scope asked first
/// - **MatchingScope**: one instance per matching scope, owned by that scope
/// - **PerDependency**: a new instance on every request, owned by the
///   resolving scope
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Settings;
/// struct UnitOfWork;
/// struct Command;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register(|_, _| Ok(Arc::new(Settings))).lifetime(Lifetime::Root);
/// builder.register(|_, _| Ok(Arc::new(UnitOfWork))).lifetime(Lifetime::per_scope());
/// builder.register(|_, _| Ok(Arc::new(Command)));
/// let container = builder.build().unwrap();
///
/// let request = container.begin_scope().unwrap();
/// let settings = container.resolve::<Settings>().unwrap();
/// assert!(Arc::ptr_eq(&settings, &request.resolve::<Settings>().unwrap()));
///
/// let uow = request.resolve::<UnitOfWork>().unwrap();
/// assert!(Arc::ptr_eq(&uow, &request.resolve::<UnitOfWork>().unwrap()));
/// assert!(!Arc::ptr_eq(&uow, &container.resolve::<UnitOfWork>().unwrap()));
///
/// let a = request.resolve::<Command>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &request.resolve::<Command>().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Shared by the whole container and stored in the root scope.
    Root,
    /// Shared within the nearest scope satisfying the matcher.
    MatchingScope(ScopeMatcher),
    /// Never shared.
    #[default]
    PerDependency,
}

impl Lifetime {
    /// One instance per lifetime scope.
    pub fn per_scope() -> Self {
        Lifetime::MatchingScope(ScopeMatcher::Any)
    }

    /// One instance per scope tagged with `tag`.
    pub fn matching(tag: impl Into<ScopeTag>) -> Self {
        Lifetime::MatchingScope(ScopeMatcher::Tags(smallvec::smallvec![tag.into()]))
    }

    /// One instance per scope tagged with any of `tags`.
    pub fn matching_any<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ScopeTag>,
    {
        Lifetime::MatchingScope(ScopeMatcher::Tags(tags.into_iter().map(Into::into).collect()))
    }

    /// One instance per `Owned<T>` graph.
    pub fn per_owned<T: ?Sized + 'static>() -> Self {
        Self::matching(ScopeTag::owned_by(&Service::of::<T>()))
    }

    /// True when instances are cached somewhere.
    pub fn is_shared(&self) -> bool {
        !matches!(self, Lifetime::PerDependency)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Root => f.write_str("root"),
            Lifetime::MatchingScope(ScopeMatcher::Any) => f.write_str("per-scope"),
            Lifetime::MatchingScope(matcher) => write!(f, "matching {}", matcher.describe()),
            Lifetime::PerDependency => f.write_str("per-dependency"),
        }
    }
}

/// Who is responsible for disposing an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
    /// The scope that owns the instance disposes it.
    #[default]
    OwnedByScope,
    /// The engine never disposes the instance.
    ExternallyOwned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_accepts_listed_tags_only() {
        let lifetime = Lifetime::matching_any(["request", "job"]);
        let Lifetime::MatchingScope(matcher) = lifetime else {
            panic!("expected matching scope");
        };
        assert!(matcher.matches(Some(&ScopeTag::from("job"))));
        assert!(!matcher.matches(Some(&ScopeTag::root())));
        assert!(!matcher.matches(None));
        assert!(ScopeMatcher::Any.matches(None));
    }

    #[test]
    fn sharing_by_lifetime() {
        assert!(Lifetime::Root.is_shared());
        assert!(Lifetime::per_scope().is_shared());
        assert!(!Lifetime::PerDependency.is_shared());
        assert_eq!(Lifetime::default(), Lifetime::PerDependency);
        assert_eq!(Lifetime::matching("request").to_string(), "matching 'request'");
    }

    #[test]
    fn owned_tags_follow_the_service() {
        assert_eq!(ScopeTag::owned_by(&Service::of::<u8>()).as_str(), "owned:u8");
        assert_eq!(
            Lifetime::per_owned::<u8>(),
            Lifetime::matching(ScopeTag::owned_by(&Service::of::<u8>()))
        );
    }
}
