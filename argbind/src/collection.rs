//! Flattening declared parameter shapes into an indexed set of bindable
//! leaves.
//!
//! An [`ArgumentCollection`] is built fresh for every resolution by walking
//! each declared [`ArgSpec`]'s descriptor depth-first and expanding structured
//! nodes into dotted-path leaves. The collection owns two indexes: flag name
//! to leaf (covering positive, negative, alias and generated bit-flag names)
//! and positional slot to leaf. It is never mutated once token matching
//! begins; raw segments accumulate in the binder's own fill table.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use crate::argument::{ArgKind, ArgSpec, CommandSpec, Overrides};
use crate::error::SchemaError;
use crate::schema::{StructuredAdapter, TypeDescriptor};

/// What a flag-name index entry means for the matched leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    /// A positive flag; values (or an implicit `true`) follow.
    Positive,
    /// A negation: boolean `false`, or container reset to empty.
    Negative,
    /// Set the given bit-flag member bits.
    BitSet(u64),
    /// Clear the given bit-flag member bits.
    BitClear(u64),
}

/// One entry in the flag-name index.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NameHit {
    pub leaf: usize,
    pub role: Role,
}

/// A terminal, directly bindable argument produced by flattening.
#[derive(Clone, Debug)]
pub(crate) struct Leaf {
    /// Index of the owning [`ArgSpec`] within the command.
    pub spec_index: usize,
    /// Field path from the owning spec's root to this leaf. Empty for
    /// unstructured arguments.
    pub keys: Vec<String>,
    /// Canonical dotted bare name, e.g. `user.id`.
    pub name: String,
    /// Full positive flags, e.g. `--user.id`.
    pub flags: Vec<String>,
    /// Negative flags (boolean/container negation).
    pub negatives: Vec<String>,
    /// Shape of this leaf's value.
    pub descriptor: TypeDescriptor,
    pub kind: ArgKind,
    /// Logical AND of this field's requiredness and its ancestors'.
    pub required: bool,
    pub default: Option<Value>,
    /// Environment variable candidates, first set wins.
    pub env_vars: Vec<String>,
    pub consume_multiple: bool,
    pub requires_attached_value: bool,
    pub counted: bool,
    /// `(union ordinal within the spec, alternative ordinal)` when this leaf
    /// belongs to one alternative of a union; at most one alternative per
    /// union may receive tokens.
    pub union_alt: Option<(usize, usize)>,
    pub(crate) overrides: Overrides,
}

impl Leaf {
    /// The name used in error messages: the first flag when one exists,
    /// otherwise the bare name (positional-only arguments).
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.flags.first().map_or(self.name.as_str(), String::as_str)
    }

    /// Token consumption for one occurrence of this leaf.
    pub(crate) fn token_count(&self) -> (usize, bool) {
        if self.counted {
            (0, false)
        } else {
            self.descriptor.token_count()
        }
    }

    pub(crate) fn is_flag_like(&self) -> bool {
        self.counted || self.descriptor.is_boolean()
    }

    /// Whether repeated keyword occurrences are legal for this leaf.
    pub(crate) fn repeatable(&self) -> bool {
        let (_, consume_all) = self.descriptor.token_count();
        consume_all || self.counted || self.descriptor.is_bitflag()
    }
}

/// Per-spec grouping of leaves, used for reassembly and group validation.
#[derive(Clone, Debug)]
pub(crate) struct Root {
    pub spec_index: usize,
    pub leaves: Vec<usize>,
}

/// The flattened, indexed set of all bindable leaves for one command.
#[derive(Debug)]
pub struct ArgumentCollection<'spec> {
    pub(crate) command: &'spec CommandSpec,
    pub(crate) leaves: Vec<Leaf>,
    pub(crate) roots: Vec<Root>,
    by_name: HashMap<String, NameHit>,
    by_path: HashMap<(usize, String), usize>,
    positional: Vec<usize>,
    pub(crate) var_keyword: Option<usize>,
}

impl<'spec> ArgumentCollection<'spec> {
    /// Expand `command` into a fresh collection.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for name collisions, cyclic structured
    /// types, unknown group references or ambiguous variadic positionals.
    pub fn build(command: &'spec CommandSpec) -> Result<Self, SchemaError> {
        let mut collection = Self {
            command,
            leaves: Vec::new(),
            roots: Vec::new(),
            by_name: HashMap::new(),
            by_path: HashMap::new(),
            positional: Vec::new(),
            var_keyword: None,
        };

        for (spec_index, spec) in command.args.iter().enumerate() {
            for group in &spec.groups {
                if !command.groups.iter().any(|g| g.name == *group) {
                    return Err(SchemaError::UnknownGroup {
                        argument: spec.name.clone(),
                        group: group.clone(),
                    });
                }
            }

            let overrides = command.effective_overrides(spec);
            let mut expansion = Expansion {
                spec_index,
                spec,
                overrides,
                leaves: Vec::new(),
                adapter_stack: Vec::new(),
                union_counter: 0,
            };
            expansion.walk(
                &spec.descriptor,
                spec.name.clone(),
                Vec::new(),
                spec.required,
                spec.default.clone(),
                None,
                None,
            )?;

            let mut root = Root {
                spec_index,
                leaves: Vec::new(),
            };
            for leaf in expansion.leaves {
                let index = collection.leaves.len();
                collection.index_leaf(&leaf, index)?;
                root.leaves.push(index);
                collection
                    .by_path
                    .insert((spec_index, leaf.keys.join(".")), index);
                trace!(name = %leaf.name, keys = ?leaf.keys, "flattened leaf");
                collection.leaves.push(leaf);
            }
            collection.roots.push(root);
        }

        collection.build_positional_index()?;
        Ok(collection)
    }

    fn index_leaf(&mut self, leaf: &Leaf, index: usize) -> Result<(), SchemaError> {
        if leaf.kind == ArgKind::VarKeyword {
            self.var_keyword = Some(index);
            return Ok(());
        }
        if leaf.kind == ArgKind::PositionalOnly {
            return Ok(());
        }
        for flag in &leaf.flags {
            self.insert_name(flag.clone(), NameHit { leaf: index, role: Role::Positive })?;
        }
        for flag in &leaf.negatives {
            self.insert_name(flag.clone(), NameHit { leaf: index, role: Role::Negative })?;
        }
        if let TypeDescriptor::BitFlag(members) = leaf.descriptor.unwrap_optional() {
            let negative_prefix = leaf.overrides.negative_prefix().to_owned();
            for member in members {
                let member_flag = member.name.to_lowercase().replace('_', "-");
                self.insert_name(
                    format!("--{}.{member_flag}", leaf.name),
                    NameHit { leaf: index, role: Role::BitSet(member.bits) },
                )?;
                self.insert_name(
                    format!("--{}.{negative_prefix}{member_flag}", leaf.name),
                    NameHit { leaf: index, role: Role::BitClear(member.bits) },
                )?;
            }
        }
        Ok(())
    }

    fn insert_name(&mut self, name: String, hit: NameHit) -> Result<(), SchemaError> {
        if self.by_name.insert(name.clone(), hit).is_some() {
            return Err(SchemaError::NameCollision { name });
        }
        Ok(())
    }

    fn build_positional_index(&mut self) -> Result<(), SchemaError> {
        let mut variadic: Option<String> = None;
        for (index, leaf) in self.leaves.iter().enumerate() {
            // Structured expansions bind by keyword; only root-level leaves
            // occupy positional slots.
            if !leaf.keys.is_empty() || !leaf.kind.is_positional() {
                continue;
            }
            let (_, consume_all) = leaf.token_count();
            if leaf.kind == ArgKind::VarPositional || consume_all {
                if let Some(first) = variadic.take() {
                    return Err(SchemaError::DuplicateVariadic {
                        first,
                        second: leaf.name.clone(),
                    });
                }
                variadic = Some(leaf.name.clone());
            }
            self.positional.push(index);
        }
        Ok(())
    }

    /// Exact-match a flag token (the part before `=`) against the name index.
    pub(crate) fn match_flag(&self, flag: &str) -> Option<(usize, &Leaf, Role)> {
        let hit = self.by_name.get(flag)?;
        let leaf = self.leaves.get(hit.leaf)?;
        Some((hit.leaf, leaf, hit.role))
    }

    pub(crate) fn leaf(&self, index: usize) -> Option<&Leaf> {
        self.leaves.get(index)
    }

    pub(crate) fn positional_slots(&self) -> &[usize] {
        &self.positional
    }

    pub(crate) fn leaf_by_path(&self, spec_index: usize, path: &str) -> Option<usize> {
        self.by_path.get(&(spec_index, path.to_owned())).copied()
    }

    /// All flag names known to the collection, in insertion-independent
    /// sorted order. Exposed for diagnostics and tests.
    #[must_use]
    pub fn known_flags(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Canonical dotted names of every leaf, in declaration order.
    #[must_use]
    pub fn leaf_names(&self) -> Vec<&str> {
        self.leaves.iter().map(|l| l.name.as_str()).collect()
    }
}

/// Depth-first expansion of one spec's descriptor tree.
struct Expansion<'spec> {
    spec_index: usize,
    spec: &'spec ArgSpec,
    overrides: Overrides,
    leaves: Vec<Leaf>,
    adapter_stack: Vec<String>,
    union_counter: usize,
}

impl Expansion<'_> {
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        descriptor: &TypeDescriptor,
        name: String,
        keys: Vec<String>,
        required: bool,
        default: Option<Value>,
        union_alt: Option<(usize, usize)>,
        flatten_override: Option<bool>,
    ) -> Result<(), SchemaError> {
        match descriptor.unwrap_optional() {
            TypeDescriptor::Structured(adapter) => self.walk_structured(
                adapter.as_ref(),
                &name,
                &keys,
                required,
                union_alt,
                flatten_override,
            ),
            TypeDescriptor::Union(alternatives)
                if alternatives
                    .iter()
                    .any(|alt| matches!(alt.unwrap_optional(), TypeDescriptor::Structured(_))) =>
            {
                self.walk_union(alternatives, name, keys, required, default)
            }
            _ => {
                self.emit(descriptor.clone(), name, keys, required, default, union_alt);
                Ok(())
            }
        }
    }

    fn walk_structured(
        &mut self,
        adapter: &dyn StructuredAdapter,
        name: &str,
        keys: &[String],
        required: bool,
        union_alt: Option<(usize, usize)>,
        flatten_override: Option<bool>,
    ) -> Result<(), SchemaError> {
        let type_name = adapter.type_name().to_owned();
        if self.adapter_stack.contains(&type_name) {
            return Err(SchemaError::CyclicStructured { type_name });
        }
        self.adapter_stack.push(type_name);

        // Flattening drops this node's own name segment: fields appear at
        // the level the node's name lives at, instead of under `name.field`.
        let flatten = flatten_override.unwrap_or_else(|| adapter.flatten());
        let base = if flatten {
            name.rsplit_once('.').map_or("", |(head, _)| head).to_owned()
        } else {
            name.to_owned()
        };
        for field in adapter.fields() {
            let child_name = if base.is_empty() {
                field.name.clone()
            } else {
                format!("{base}.{}", field.name)
            };
            let mut child_keys = keys.to_vec();
            child_keys.push(field.name.clone());
            self.walk(
                &field.descriptor,
                child_name,
                child_keys,
                required && field.required,
                field.default.clone(),
                union_alt,
                field.flatten,
            )?;
        }

        self.adapter_stack.pop();
        Ok(())
    }

    /// A union containing a structured alternative produces leaves for every
    /// alternative; the binder decides at match time which one was touched.
    fn walk_union(
        &mut self,
        alternatives: &[TypeDescriptor],
        name: String,
        keys: Vec<String>,
        required: bool,
        default: Option<Value>,
    ) -> Result<(), SchemaError> {
        let union_ordinal = self.union_counter;
        self.union_counter += 1;

        let scalar_alts: Vec<TypeDescriptor> = alternatives
            .iter()
            .filter(|alt| !matches!(alt.unwrap_optional(), TypeDescriptor::Structured(_)))
            .cloned()
            .collect();
        if !scalar_alts.is_empty() {
            self.emit(
                TypeDescriptor::Union(scalar_alts),
                name.clone(),
                keys.clone(),
                false,
                default,
                Some((union_ordinal, 0)),
            );
        }
        let mut alt_ordinal = 1;
        for alt in alternatives {
            if let TypeDescriptor::Structured(adapter) = alt.unwrap_optional() {
                self.walk_structured(
                    adapter.as_ref(),
                    &name,
                    &keys,
                    required,
                    Some((union_ordinal, alt_ordinal)),
                    None,
                )?;
                alt_ordinal += 1;
            }
        }
        Ok(())
    }

    fn emit(
        &mut self,
        descriptor: TypeDescriptor,
        name: String,
        keys: Vec<String>,
        required: bool,
        default: Option<Value>,
        union_alt: Option<(usize, usize)>,
    ) {
        let is_root = keys.is_empty();
        let mut flags = Vec::new();
        if self.spec.kind.is_keyword() && self.spec.kind != ArgKind::VarKeyword {
            flags.push(format!("--{name}"));
            if is_root {
                for extra in &self.spec.extra_names {
                    flags.push(format!("--{extra}"));
                }
                for short in &self.spec.short_aliases {
                    flags.push(format!("-{short}"));
                }
            }
        }

        let negatives = if is_root && !self.spec.negative_names.is_empty() {
            self.spec
                .negative_names
                .iter()
                .map(|n| format!("--{n}"))
                .collect()
        } else {
            self.auto_negatives(&descriptor, &name)
        };

        let mut env_vars = Vec::new();
        if is_root {
            env_vars.extend(self.spec.env_vars.iter().cloned());
        }
        if let Some(prefix) = &self.overrides.env_prefix {
            let derived = name.to_uppercase().replace(['.', '-'], "_");
            env_vars.push(format!("{prefix}{derived}"));
        }

        self.leaves.push(Leaf {
            spec_index: self.spec_index,
            keys,
            name,
            flags,
            negatives,
            descriptor,
            kind: self.spec.kind,
            required,
            default,
            env_vars,
            consume_multiple: self.spec.consume_multiple,
            requires_attached_value: self.spec.requires_attached_value,
            counted: self.spec.counted && is_root,
            union_alt,
            overrides: self.overrides.clone(),
        });
    }

    fn auto_negatives(&self, descriptor: &TypeDescriptor, name: &str) -> Vec<String> {
        if !self.spec.kind.is_keyword() {
            return Vec::new();
        }
        if descriptor.is_boolean() {
            vec![prefixed_name(name, self.overrides.negative_prefix())]
        } else if descriptor.is_container() {
            vec![prefixed_name(name, self.overrides.empty_prefix())]
        } else {
            Vec::new()
        }
    }
}

/// Apply a negation prefix to the last dotted component, keeping the
/// namespace grouping: `user.active` becomes `--user.no-active`.
fn prefixed_name(name: &str, prefix: &str) -> String {
    match name.rsplit_once('.') {
        Some((head, tail)) => format!("--{head}.{prefix}{tail}"),
        None => format!("--{prefix}{name}"),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "tests panic to surface declaration mistakes"
)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, StructSchema};
    use serde_json::json;

    fn user_command() -> CommandSpec {
        let user = StructSchema::new("User")
            .field(FieldSpec::required("id", TypeDescriptor::integer()))
            .field(FieldSpec::with_default(
                "name",
                TypeDescriptor::string(),
                json!("John Doe"),
            ))
            .into_descriptor();
        CommandSpec::new()
            .arg(ArgSpec::new("user", user).required())
            .arg(ArgSpec::new("verbose", TypeDescriptor::boolean()))
    }

    #[test]
    fn structured_fields_become_dotted_leaves() {
        let command = user_command();
        let collection = ArgumentCollection::build(&command).unwrap();
        assert_eq!(collection.leaf_names(), vec!["user.id", "user.name", "verbose"]);
        assert!(collection.match_flag("--user.id").is_some());
        assert!(collection.match_flag("--no-verbose").is_some());
    }

    #[test]
    fn flattening_is_idempotent() {
        let command = user_command();
        let first = ArgumentCollection::build(&command).unwrap();
        let second = ArgumentCollection::build(&command).unwrap();
        assert_eq!(first.leaf_names(), second.leaf_names());
        assert_eq!(first.known_flags(), second.known_flags());
        assert_eq!(first.positional_slots(), second.positional_slots());
    }

    #[test]
    fn flattened_fields_join_the_parent_namespace() {
        let point = StructSchema::new("Point")
            .field(FieldSpec::required("x", TypeDescriptor::integer()))
            .field(FieldSpec::required("y", TypeDescriptor::integer()))
            .flattened()
            .into_descriptor();
        let command = CommandSpec::new().arg(ArgSpec::new("origin", point));
        let collection = ArgumentCollection::build(&command).unwrap();
        // The node's own name drops out of the CLI surface; the field path
        // is still tracked for reassembly.
        assert_eq!(collection.leaf_names(), vec!["x", "y"]);
        assert_eq!(collection.leaves[0].keys, vec!["x"]);
        assert_eq!(collection.leaves[1].keys, vec!["y"]);
    }

    #[test]
    fn duplicate_flag_names_are_a_construction_error() {
        let command = CommandSpec::new()
            .arg(ArgSpec::new("out", TypeDescriptor::string()))
            .arg(ArgSpec::new("output", TypeDescriptor::string()).alias("out"));
        let err = ArgumentCollection::build(&command).unwrap_err();
        assert!(matches!(err, SchemaError::NameCollision { name } if name == "--out"));
    }

    #[test]
    fn cyclic_structured_types_are_rejected_at_build_time() {
        struct Cyclic;
        impl StructuredAdapter for Cyclic {
            fn type_name(&self) -> &str {
                "Node"
            }
            fn fields(&self) -> Vec<FieldSpec> {
                vec![FieldSpec::optional(
                    "next",
                    TypeDescriptor::Structured(std::sync::Arc::new(Cyclic)),
                )]
            }
        }
        let command = CommandSpec::new().arg(ArgSpec::new(
            "node",
            TypeDescriptor::Structured(std::sync::Arc::new(Cyclic)),
        ));
        let err = ArgumentCollection::build(&command).unwrap_err();
        assert!(matches!(err, SchemaError::CyclicStructured { type_name } if type_name == "Node"));
    }

    #[test]
    fn two_variadic_positionals_are_rejected() {
        let command = CommandSpec::new()
            .arg(ArgSpec::new("inputs", TypeDescriptor::list(TypeDescriptor::path())))
            .arg(ArgSpec::new("extras", TypeDescriptor::list(TypeDescriptor::path())));
        let err = ArgumentCollection::build(&command).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateVariadic { .. }));
    }
}
