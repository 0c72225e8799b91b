//! Error types produced while building schemas and resolving arguments.

use thiserror::Error;

/// Errors detected while constructing an argument collection, before any
/// tokens are seen.
///
/// These indicate a malformed declaration rather than bad user input, so they
/// are kept separate from [`BindError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// Two arguments (or generated negatives/aliases) share a flag name.
    #[error("flag name '{name}' is declared more than once")]
    NameCollision { name: String },

    /// A structured type directly or indirectly contains itself.
    #[error("structured type '{type_name}' is cyclic")]
    CyclicStructured { type_name: String },

    /// An argument references a group that was never declared.
    #[error("argument '{argument}' references unknown group '{group}'")]
    UnknownGroup { argument: String, group: String },

    /// Two all-consuming positional arguments cannot be disambiguated.
    #[error("cannot declare two all-consuming positional arguments ('{first}' and '{second}')")]
    DuplicateVariadic { first: String, second: String },
}

/// A single per-argument validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Canonical name of the offending argument, or the group name for group
    /// constraint failures.
    pub name: String,
    /// Message produced by the failing validator.
    pub message: String,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.name, self.message)
    }
}

/// Errors raised during a resolution attempt.
///
/// All variants are terminal: the engine never partially applies a failed
/// resolution. Each carries the offending argument's canonical name and, where
/// applicable, the raw value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BindError {
    /// A required argument received no value from any source.
    #[error("missing required argument '{name}'")]
    MissingArgument { name: String },

    /// A flag-shaped token matched no known name.
    #[error("unknown option '{token}'")]
    UnknownOption { token: String },

    /// Non-flag tokens remained after every positional slot was filled.
    #[error("unused tokens: {}", .tokens.join(", "))]
    UnusedCliTokens { tokens: Vec<String> },

    /// A non-repeatable argument's flag was supplied more than once.
    #[error("argument '{name}' was supplied multiple times")]
    RepeatKeyword { name: String },

    /// An attached-value-only argument received space-separated syntax.
    #[error("argument '{name}' requires '{name}=VALUE' syntax")]
    RequiresEquals { name: String },

    /// A raw value could not be converted to the target type.
    #[error("invalid value '{}' for '{name}': {message}", .value.as_deref().unwrap_or("<none>"))]
    Coercion {
        name: String,
        value: Option<String>,
        message: String,
    },

    /// A converted value failed a per-argument or group validator.
    #[error("validation failed: {}", .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation { failures: Vec<ValidationFailure> },

    /// A kind of argument that cannot accept a positional token was asked to.
    #[error("argument '{name}' cannot be supplied positionally")]
    UnsupportedPositional { name: String },

    /// Positional and keyed segments, or two union alternatives, were mixed
    /// for one argument.
    #[error("argument '{name}' received values for conflicting alternatives")]
    MixedArgument { name: String },
}

/// Top-level error for a full resolution: either the declaration itself was
/// malformed, or the supplied input did not bind.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl BindError {
    /// Construct a [`BindError::Coercion`] for a single raw value.
    #[must_use]
    pub fn coercion(name: impl Into<String>, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Coercion {
            name: name.into(),
            value: Some(value.into()),
            message: message.into(),
        }
    }

    /// The canonical name of the offending argument, when one applies.
    #[must_use]
    pub fn argument_name(&self) -> Option<&str> {
        match self {
            Self::MissingArgument { name }
            | Self::RepeatKeyword { name }
            | Self::RequiresEquals { name }
            | Self::Coercion { name, .. }
            | Self::UnsupportedPositional { name }
            | Self::MixedArgument { name } => Some(name),
            Self::UnknownOption { .. } | Self::UnusedCliTokens { .. } | Self::Validation { .. } => None,
        }
    }
}
