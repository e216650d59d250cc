//! Container configuration.
//!
//! With the `config` feature the options can be loaded from JSON; missing
//! fields keep their defaults.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "config")]
use crate::error::{DiError, DiResult};

/// Tunables of a container.
///
/// ```rust
/// use ferrous_resolve::{ContainerBuilder, ContainerOptions};
///
/// let options = ContainerOptions::default()
///     .with_max_resolve_depth(32)
///     .with_dispose_on_drop(false);
/// let container = ContainerBuilder::with_options(options).build().unwrap();
/// assert_eq!(container.options().max_resolve_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Maximum number of nested resolve requests on one thread.
    pub max_resolve_depth: usize,
    /// Whether `All<T>`, `Lazy<T>`, `Owned<T>`, `Factory<T>`, `Index<T>` and
    /// `Meta<T>` are available without registering their sources.
    pub register_default_sources: bool,
    /// Whether dropping an undisposed scope tree disposes it.
    pub dispose_on_drop: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            max_resolve_depth: 128,
            register_default_sources: true,
            dispose_on_drop: true,
        }
    }
}

impl ContainerOptions {
    /// Sets [`max_resolve_depth`](Self::max_resolve_depth).
    pub fn with_max_resolve_depth(mut self, depth: usize) -> Self {
        self.max_resolve_depth = depth;
        self
    }

    /// Sets [`register_default_sources`](Self::register_default_sources).
    pub fn with_default_sources(mut self, enabled: bool) -> Self {
        self.register_default_sources = enabled;
        self
    }

    /// Sets [`dispose_on_drop`](Self::dispose_on_drop).
    pub fn with_dispose_on_drop(mut self, enabled: bool) -> Self {
        self.dispose_on_drop = enabled;
        self
    }

    /// Parses options from JSON.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(DiError::custom)
    }

    /// Serializes the options to JSON.
    #[cfg(feature = "config")]
    pub fn to_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(DiError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ContainerOptions::default();
        assert_eq!(options.max_resolve_depth, 128);
        assert!(options.register_default_sources);
        assert!(options.dispose_on_drop);
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_json_keeps_defaults() {
        let options = ContainerOptions::from_json(r#"{ "max_resolve_depth": 8 }"#).unwrap();
        assert_eq!(options.max_resolve_depth, 8);
        assert!(options.register_default_sources);

        let round = ContainerOptions::from_json(&options.to_json().unwrap()).unwrap();
        assert_eq!(round, options);
        assert!(ContainerOptions::from_json("not json").is_err());
    }
}
