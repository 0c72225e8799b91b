//! External collaborators: environment lookup and config sources.
//!
//! The engine performs no I/O of its own beyond asking these interfaces.
//! Config sources are queried in declaration order with dotted paths; the
//! first source that yields a value for a path wins, independently per
//! argument.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

/// A name-to-string-or-absent environment lookup.
pub trait EnvLookup {
    /// The variable's value, or `None` when unset.
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed in-memory environment, useful for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    /// Build from `(name, value)` pairs.
    #[must_use]
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvLookup for StaticEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// An already-loaded external configuration source.
///
/// Sources may cache and invalidate however they like; the engine only ever
/// calls [`lookup`](Self::lookup) with a dotted argument path.
pub trait ConfigSource {
    /// The value at `path`, or `None` when the source has nothing for it.
    fn lookup(&self, path: &str) -> Option<Value>;
}

/// A config source over an in-memory JSON tree.
#[derive(Clone, Debug)]
pub struct JsonSource {
    root: Value,
}

impl JsonSource {
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self { root }
    }
}

impl ConfigSource for JsonSource {
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut node = &self.root;
        for key in path.split('.') {
            node = node.as_object()?.get(key)?;
        }
        Some(node.clone())
    }
}

/// Adapter exposing any [`figment`] provider stack as a [`ConfigSource`].
///
/// This lets TOML/JSON files, prefixed environment providers and test jails
/// feed the engine without the core depending on any file format.
pub struct FigmentSource {
    figment: figment::Figment,
}

impl FigmentSource {
    #[must_use]
    pub fn new(figment: figment::Figment) -> Self {
        Self { figment }
    }
}

impl ConfigSource for FigmentSource {
    fn lookup(&self, path: &str) -> Option<Value> {
        match self.figment.extract_inner::<Value>(path) {
            Ok(value) => Some(value),
            Err(err) => {
                if !err.missing() {
                    debug!(path, %err, "figment lookup failed");
                }
                None
            }
        }
    }
}

impl From<figment::Figment> for FigmentSource {
    fn from(figment: figment::Figment) -> Self {
        Self::new(figment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_source_resolves_dotted_paths() {
        let source = JsonSource::new(json!({"user": {"id": 123}, "items": [1, 2]}));
        assert_eq!(source.lookup("user.id"), Some(json!(123)));
        assert_eq!(source.lookup("items"), Some(json!([1, 2])));
        assert_eq!(source.lookup("user.missing"), None);
        assert_eq!(source.lookup("items.0"), None);
    }
}
