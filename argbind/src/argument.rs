//! Declared argument templates and their configuration cascade.
//!
//! An [`ArgSpec`] describes one bindable parameter before any tokens are
//! seen: its names, shape, multiplicity rules and fallback sources. Specs are
//! immutable, shared read-only data; each resolution expands them into a
//! fresh argument collection.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::schema::TypeDescriptor;

/// How an argument may be supplied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgKind {
    /// Only by position.
    PositionalOnly,
    /// Only by flag name.
    KeywordOnly,
    /// By position or by flag name, interchangeably.
    PositionalOrKeyword,
    /// Swallows every remaining positional token.
    VarPositional,
    /// Accepts arbitrary `--key value` pairs not matched elsewhere.
    VarKeyword,
}

impl ArgKind {
    pub(crate) fn is_positional(self) -> bool {
        matches!(
            self,
            Self::PositionalOnly | Self::PositionalOrKeyword | Self::VarPositional
        )
    }

    pub(crate) fn is_keyword(self) -> bool {
        !matches!(self, Self::PositionalOnly)
    }
}

/// User-supplied conversion from raw segments to a final value, replacing
/// structural coercion when present.
pub type Converter = Arc<dyn Fn(&[String]) -> Result<Value, String> + Send + Sync>;

/// Per-argument validator over the final value.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Group validator over the explicitly filled members `(name, value)`.
pub type GroupValidator = Arc<dyn Fn(&[(&str, &Value)]) -> Result<(), String> + Send + Sync>;

/// Naming-rule and behaviour defaults, cascaded most-specific-wins.
///
/// Layers are merged per field: argument over owning group over owning
/// command over ancestor commands. The merge is pure and deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Prefix for auto-generated boolean negatives (`no-` by default).
    pub negative_prefix: Option<String>,
    /// Prefix for auto-generated container negatives (`empty-` by default).
    pub empty_prefix: Option<String>,
    /// Prefix prepended to derived environment variable names.
    pub env_prefix: Option<String>,
    /// Whether a single raw segment that looks like a JSON array may expand
    /// into multiple elements (`true` by default).
    pub allow_json: Option<bool>,
}

impl Overrides {
    /// Merge `self` over `base`, keeping `self`'s set fields.
    #[must_use]
    pub fn merged_over(&self, base: &Overrides) -> Overrides {
        Overrides {
            negative_prefix: self.negative_prefix.clone().or_else(|| base.negative_prefix.clone()),
            empty_prefix: self.empty_prefix.clone().or_else(|| base.empty_prefix.clone()),
            env_prefix: self.env_prefix.clone().or_else(|| base.env_prefix.clone()),
            allow_json: self.allow_json.or(base.allow_json),
        }
    }

    pub(crate) fn negative_prefix(&self) -> &str {
        self.negative_prefix.as_deref().unwrap_or("no-")
    }

    pub(crate) fn empty_prefix(&self) -> &str {
        self.empty_prefix.as_deref().unwrap_or("empty-")
    }

    pub(crate) fn allow_json(&self) -> bool {
        self.allow_json.unwrap_or(true)
    }
}

/// A named set of sibling arguments with an optional constraint validator.
///
/// Groups reference arguments by name; they never own them.
#[derive(Clone)]
pub struct GroupSpec {
    pub(crate) name: String,
    pub(crate) validator: Option<GroupValidator>,
    pub(crate) overrides: Overrides,
}

impl GroupSpec {
    /// A group with no constraint; useful for help-page organisation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            validator: None,
            overrides: Overrides::default(),
        }
    }

    /// Attach a constraint validator invoked with the explicitly filled
    /// members.
    #[must_use]
    pub fn validator(mut self, validator: GroupValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Enforce an inclusive `[min, max]` bound on the number of explicitly
    /// filled members. `[0, 1]` is mutual exclusivity; `[1, 1]` is
    /// "exactly one of".
    #[must_use]
    pub fn limited_choice(self, min: usize, max: usize) -> Self {
        self.validator(crate::validate::limited_choice(min, max))
    }

    /// Naming-rule defaults for this group's members.
    #[must_use]
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// The group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupSpec")
            .field("name", &self.name)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// One declared, bindable parameter.
#[derive(Clone)]
pub struct ArgSpec {
    pub(crate) name: String,
    pub(crate) extra_names: Vec<String>,
    pub(crate) negative_names: Vec<String>,
    pub(crate) short_aliases: Vec<char>,
    pub(crate) kind: ArgKind,
    pub(crate) descriptor: TypeDescriptor,
    pub(crate) required: bool,
    pub(crate) default: Option<Value>,
    pub(crate) env_vars: Vec<String>,
    pub(crate) consume_multiple: bool,
    pub(crate) requires_attached_value: bool,
    pub(crate) counted: bool,
    pub(crate) converter: Option<Converter>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) groups: Vec<String>,
    pub(crate) overrides: Overrides,
    pub(crate) help: Option<String>,
}

impl ArgSpec {
    /// A keyword-or-positional argument named `name` with the given shape.
    ///
    /// `name` is the bare parameter name (`items`, not `--items`).
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            extra_names: Vec::new(),
            negative_names: Vec::new(),
            short_aliases: Vec::new(),
            kind: ArgKind::PositionalOrKeyword,
            descriptor,
            required: false,
            default: None,
            env_vars: Vec::new(),
            consume_multiple: false,
            requires_attached_value: false,
            counted: false,
            converter: None,
            validators: Vec::new(),
            groups: Vec::new(),
            overrides: Overrides::default(),
            help: None,
        }
    }

    /// Change how the argument may be supplied.
    #[must_use]
    pub fn kind(mut self, kind: ArgKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add an alternative positive flag name.
    #[must_use]
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.extra_names.push(name.into());
        self
    }

    /// Add an explicit negative flag name, replacing the auto-generated one.
    #[must_use]
    pub fn negative(mut self, name: impl Into<String>) -> Self {
        self.negative_names.push(name.into());
        self
    }

    /// Add a single-character short alias (`-x`).
    #[must_use]
    pub fn short(mut self, alias: char) -> Self {
        self.short_aliases.push(alias);
        self
    }

    /// The argument must receive a value from some source.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value applied when no source supplies one.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Add an environment variable candidate; the first set variable wins.
    #[must_use]
    pub fn env_var(mut self, name: impl Into<String>) -> Self {
        self.env_vars.push(name.into());
        self
    }

    /// One flag occurrence may swallow several following value tokens.
    #[must_use]
    pub fn consume_multiple(mut self) -> Self {
        self.consume_multiple = true;
        self
    }

    /// Forbid `--flag value`; only `--flag=value` is accepted.
    #[must_use]
    pub fn requires_attached_value(mut self) -> Self {
        self.requires_attached_value = true;
        self
    }

    /// Count bare occurrences instead of taking values (`-vvv`).
    ///
    /// The descriptor should be an integer shape; the bound value is the
    /// number of occurrences.
    #[must_use]
    pub fn counted(mut self) -> Self {
        self.counted = true;
        self
    }

    /// Replace structural coercion with a user converter.
    #[must_use]
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Append a validator run on the final value.
    #[must_use]
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Join a declared group.
    #[must_use]
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(name.into());
        self
    }

    /// Per-argument naming-rule overrides; the most specific layer wins.
    #[must_use]
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Help text shown by external renderers; never affects binding.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// The bare declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared help text, when any. Binding never consults it.
    #[must_use]
    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }
}

impl fmt::Debug for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("descriptor", &self.descriptor)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// The full declared parameter set for one command invocation.
#[derive(Clone, Debug, Default)]
pub struct CommandSpec {
    pub(crate) args: Vec<ArgSpec>,
    pub(crate) groups: Vec<GroupSpec>,
    pub(crate) overrides: Overrides,
}

impl CommandSpec {
    /// An empty command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument declaration.
    #[must_use]
    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    /// Declare a group.
    #[must_use]
    pub fn group(mut self, group: GroupSpec) -> Self {
        self.groups.push(group);
        self
    }

    /// Command-level naming-rule defaults.
    #[must_use]
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Cascade an ancestor command's defaults under this command's own.
    #[must_use]
    pub fn inherit(mut self, ancestor: &Overrides) -> Self {
        self.overrides = self.overrides.merged_over(ancestor);
        self
    }

    /// Effective overrides for `spec`, merging argument over group over
    /// command layers. Pure; recomputing yields an identical result.
    #[must_use]
    pub fn effective_overrides(&self, spec: &ArgSpec) -> Overrides {
        let mut layered = self.overrides.clone();
        for group_name in &spec.groups {
            if let Some(group) = self.groups.iter().find(|g| g.name == *group_name) {
                layered = group.overrides.merged_over(&layered);
            }
        }
        spec.overrides.merged_over(&layered)
    }
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    reason = "tests panic to surface declaration mistakes"
)]
mod tests {
    use super::*;

    #[test]
    fn override_merge_is_field_wise() {
        let command = Overrides {
            negative_prefix: Some("not-".into()),
            env_prefix: Some("APP_".into()),
            ..Overrides::default()
        };
        let argument = Overrides {
            negative_prefix: Some("without-".into()),
            ..Overrides::default()
        };
        let merged = argument.merged_over(&command);
        assert_eq!(merged.negative_prefix.as_deref(), Some("without-"));
        assert_eq!(merged.env_prefix.as_deref(), Some("APP_"));
    }

    #[test]
    fn override_merge_is_deterministic() {
        let spec = CommandSpec::new()
            .overrides(Overrides {
                empty_prefix: Some("clear-".into()),
                ..Overrides::default()
            })
            .group(GroupSpec::new("io").overrides(Overrides {
                negative_prefix: Some("not-".into()),
                ..Overrides::default()
            }))
            .arg(ArgSpec::new("verbose", TypeDescriptor::boolean()).group("io"));

        let first = spec.effective_overrides(&spec.args[0]);
        let second = spec.effective_overrides(&spec.args[0]);
        assert_eq!(first, second);
        assert_eq!(first.negative_prefix.as_deref(), Some("not-"));
        assert_eq!(first.empty_prefix.as_deref(), Some("clear-"));
    }
}
