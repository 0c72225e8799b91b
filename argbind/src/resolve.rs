//! Orchestration of a full resolution: CLI tokens, then environment
//! variables, then config sources, then declared defaults.
//!
//! Precedence is per argument leaf. A leaf that received CLI segments never
//! consults the environment; a leaf satisfied by the environment never
//! consults config sources. Defaults apply during assembly, inside the
//! declaration itself.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::argument::CommandSpec;
use crate::binder::{self, FillTable};
use crate::coerce;
use crate::collection::ArgumentCollection;
use crate::error::ResolveError;
use crate::schema::{ScalarKind, TypeDescriptor};
use crate::sources::{ConfigSource, EnvLookup, ProcessEnv};
use crate::token::{RawSegment, Source};
use crate::validate;

/// Which layer ultimately supplied an argument's value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provenance {
    Cli,
    Env,
    Config,
    Default,
}

/// Binds token streams against a command declaration, consulting an
/// environment lookup and an ordered list of config sources.
pub struct Resolver {
    env: Box<dyn EnvLookup>,
    sources: Vec<Box<dyn ConfigSource>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// A resolver over the process environment with no config sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Box::new(ProcessEnv),
            sources: Vec::new(),
        }
    }

    /// Replace the environment lookup; tests typically install a
    /// [`StaticEnv`](crate::sources::StaticEnv).
    #[must_use]
    pub fn env(mut self, env: impl EnvLookup + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Append a config source. Sources are consulted in the order added; the
    /// first one holding a value for a given path wins, per argument.
    #[must_use]
    pub fn source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Resolve `tokens` against `command`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Schema`] when the declaration itself is
    /// malformed, and [`ResolveError::Bind`] for any input-level failure:
    /// unknown options, coercion failures, missing required arguments,
    /// validation rejections.
    pub fn resolve<I, T>(&self, command: &CommandSpec, tokens: I) -> Result<BindResult, ResolveError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let collection = ArgumentCollection::build(command)?;
        let mut fills = binder::bind_cli(&collection, &tokens)?;
        self.apply_env(&collection, &mut fills);
        self.apply_config(&collection, &mut fills);

        let outcomes = coerce::assemble_all(&collection, &fills)?;
        validate::run(command, &outcomes)?;

        let mut values = Map::new();
        let mut provenance = BTreeMap::new();
        for (outcome, root) in outcomes.into_iter().zip(&collection.roots) {
            let supplied_by = root
                .leaves
                .iter()
                .filter_map(|&leaf| fills.get(leaf))
                .flatten()
                .map(|segment| match segment.source {
                    Source::Cli => Provenance::Cli,
                    Source::Env => Provenance::Env,
                    Source::Config => Provenance::Config,
                })
                .min_by_key(|p| match p {
                    Provenance::Cli => 0,
                    Provenance::Env => 1,
                    Provenance::Config => 2,
                    Provenance::Default => 3,
                });
            if let Some(value) = outcome.value {
                provenance.insert(
                    outcome.name.clone(),
                    supplied_by.unwrap_or(Provenance::Default),
                );
                values.insert(outcome.name, value);
            }
        }
        Ok(BindResult { values, provenance })
    }

    /// Fill still-empty leaves from their environment variable candidates.
    fn apply_env(&self, collection: &ArgumentCollection<'_>, fills: &mut FillTable) {
        for (leaf, fill) in collection.leaves.iter().zip(fills.iter_mut()) {
            if !fill.is_empty() {
                continue;
            }
            let Some((variable, raw)) = leaf
                .env_vars
                .iter()
                .find_map(|name| self.env.get(name).map(|v| (name, v)))
            else {
                continue;
            };
            debug!(leaf = %leaf.name, %variable, "filled from environment");

            if leaf.overrides.allow_json() {
                let trimmed = raw.trim_start();
                if trimmed.starts_with('[') || trimmed.starts_with('{') {
                    if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                        fill.push(RawSegment::env_json(variable, value));
                        continue;
                    }
                }
            }
            if leaf.descriptor.is_container() {
                for (i, part) in split_env_value(&leaf.descriptor, &raw).into_iter().enumerate() {
                    fill.push(RawSegment::env(variable, part, i));
                }
            } else {
                fill.push(RawSegment::env(variable, raw, 0));
            }
        }
    }

    /// Fill still-empty leaves from config sources, first source wins.
    fn apply_config(&self, collection: &ArgumentCollection<'_>, fills: &mut FillTable) {
        for (leaf, fill) in collection.leaves.iter().zip(fills.iter_mut()) {
            if !fill.is_empty() {
                continue;
            }
            for source in &self.sources {
                if let Some(value) = source.lookup(&leaf.name) {
                    debug!(leaf = %leaf.name, "filled from config source");
                    fill.push(RawSegment::config(&leaf.name, value));
                    break;
                }
            }
        }
    }
}

/// Container environment values split on whitespace; path containers split
/// on the platform's path-list separator instead, so `PATH`-style variables
/// work unmodified.
fn split_env_value(descriptor: &TypeDescriptor, raw: &str) -> Vec<String> {
    let path_elements = matches!(
        descriptor.unwrap_optional(),
        TypeDescriptor::Container { element, .. }
            if matches!(element.unwrap_optional(), TypeDescriptor::Scalar(ScalarKind::Path))
    );
    if path_elements {
        let separator = if cfg!(windows) { ';' } else { ':' };
        raw.split(separator)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    } else {
        raw.split_whitespace().map(str::to_owned).collect()
    }
}

/// The outcome of a successful resolution: each declared argument's final
/// typed value, plus which arguments were explicitly supplied.
#[derive(Debug, Clone)]
pub struct BindResult {
    values: Map<String, Value>,
    provenance: BTreeMap<String, Provenance>,
}

impl BindResult {
    /// The bound value for a declared argument name, defaults included.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The layer that supplied the argument's value, when one is bound.
    #[must_use]
    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.provenance.get(name).copied()
    }

    /// Whether some non-default source supplied the argument.
    #[must_use]
    pub fn is_supplied(&self, name: &str) -> bool {
        self.provenance(name)
            .is_some_and(|p| p != Provenance::Default)
    }

    /// Deserialize the whole binding into a typed structure.
    ///
    /// # Errors
    ///
    /// Propagates the [`serde_json::Error`] when the bound values do not fit
    /// the target's shape.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.values.clone()))
    }

    /// The binding as one JSON object, argument name to value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}
