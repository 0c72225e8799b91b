//! Converting raw segments into typed values.
//!
//! Dispatch is purely structural on the [`TypeDescriptor`]: scalars parse
//! with kind-specific grammars, containers accumulate across occurrences,
//! unions try alternatives in order (choices before open scalars), and
//! structured shapes are reassembled from their already-coerced leaves
//! through the adapter's constructor.

use serde_json::{Map, Number, Value};

use crate::argument::{ArgKind, ArgSpec};
use crate::collection::{ArgumentCollection, Leaf, Root};
use crate::error::BindError;
use crate::schema::{Arity, BitFlagMember, ChoiceMember, ScalarKind, TypeDescriptor};
use crate::token::{RawSegment, SegmentKind};

/// Case-insensitive boolean synonyms, matching the conservative set the
/// engine documents.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Integer grammar: optional sign, `0x`/`0o`/`0b` prefixes, `_` separators.
/// The sign stays attached through parsing so `i64::MIN` round-trips.
fn parse_int(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace('_', "").to_ascii_lowercase();
    let (sign, body) = match cleaned.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    if let Some(hex) = body.strip_prefix("0x") {
        i64::from_str_radix(&format!("{sign}{hex}"), 16).ok()
    } else if let Some(oct) = body.strip_prefix("0o") {
        i64::from_str_radix(&format!("{sign}{oct}"), 8).ok()
    } else if let Some(bin) = body.strip_prefix("0b") {
        i64::from_str_radix(&format!("{sign}{bin}"), 2).ok()
    } else {
        format!("{sign}{body}").parse::<i64>().ok()
    }
}

fn coercion_error(name: &str, raw: &str, message: impl Into<String>) -> BindError {
    BindError::coercion(name, raw, message)
}

/// Parse one raw token with a kind-specific grammar.
fn coerce_scalar(kind: ScalarKind, raw: &str, name: &str) -> Result<Value, BindError> {
    match kind {
        ScalarKind::Str | ScalarKind::Path | ScalarKind::Opaque => Ok(Value::String(raw.to_owned())),
        ScalarKind::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| coercion_error(name, raw, "expected a boolean")),
        ScalarKind::Int => parse_int(raw)
            .map(|v| Value::Number(v.into()))
            .ok_or_else(|| coercion_error(name, raw, "expected an integer")),
        ScalarKind::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| coercion_error(name, raw, "expected a number")),
    }
}

/// Coerce an already-structured value (from a config source or JSON
/// expansion) against a scalar kind. Strings re-enter the token grammar so
/// that `"0x10"` from a file behaves like `--flag 0x10`.
fn coerce_scalar_value(kind: ScalarKind, value: &Value, name: &str) -> Result<Value, BindError> {
    match (kind, value) {
        (_, Value::String(s)) => coerce_scalar(kind, s, name),
        (ScalarKind::Bool, Value::Bool(_))
        | (ScalarKind::Int | ScalarKind::Float, Value::Number(_)) => Ok(value.clone()),
        _ => Err(BindError::Coercion {
            name: name.to_owned(),
            value: Some(value.to_string()),
            message: format!("expected a {}", kind.describe()),
        }),
    }
}

fn choice_error(name: &str, raw: &str, members: &[ChoiceMember]) -> BindError {
    let allowed: Vec<&str> = members.iter().map(|m| m.value.as_str()).collect();
    coercion_error(name, raw, format!("expected one of {allowed:?}"))
}

fn coerce_choice(members: &[ChoiceMember], raw: &str, name: &str) -> Result<Value, BindError> {
    members
        .iter()
        .find(|m| m.value == raw)
        .map(|m| Value::String(m.value.clone()))
        .ok_or_else(|| choice_error(name, raw, members))
}

fn bitflag_member<'a>(
    members: &'a [BitFlagMember],
    raw: &str,
    name: &str,
) -> Result<&'a BitFlagMember, BindError> {
    members.iter().find(|m| m.name == raw).ok_or_else(|| {
        let allowed: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        coercion_error(name, raw, format!("expected one of {allowed:?}"))
    })
}

/// Alternatives are attempted in declared order, except that choice
/// alternatives are tried before open scalars so an ambiguous literal-looking
/// value prefers exact membership over generic parsing.
fn union_order(alternatives: &[TypeDescriptor]) -> Vec<&TypeDescriptor> {
    let mut ordered: Vec<&TypeDescriptor> = Vec::with_capacity(alternatives.len());
    ordered.extend(
        alternatives
            .iter()
            .filter(|alt| matches!(alt.unwrap_optional(), TypeDescriptor::Choice(_))),
    );
    ordered.extend(
        alternatives
            .iter()
            .filter(|alt| !matches!(alt.unwrap_optional(), TypeDescriptor::Choice(_))),
    );
    ordered
}

/// Context for one leaf's coercion.
struct LeafCoercion<'a> {
    name: &'a str,
    allow_json: bool,
}

impl LeafCoercion<'_> {
    fn error(&self, raw: &str, message: impl Into<String>) -> BindError {
        coercion_error(self.name, raw, message)
    }

    /// One element's worth of raw material: either a raw token or an
    /// already-structured value.
    fn element(&self, descriptor: &TypeDescriptor, material: &Material<'_>) -> Result<Value, BindError> {
        match material {
            Material::Raw(raw) => self.from_raw(descriptor, raw),
            Material::Structured(value) => self.from_value(descriptor, value),
        }
    }

    fn from_raw(&self, descriptor: &TypeDescriptor, raw: &str) -> Result<Value, BindError> {
        match descriptor.unwrap_optional() {
            TypeDescriptor::Scalar(kind) => coerce_scalar(*kind, raw, self.name),
            TypeDescriptor::Choice(members) => coerce_choice(members, raw, self.name),
            TypeDescriptor::BitFlag(members) => {
                // A single string source may carry several space-delimited
                // members.
                let mut bits = 0u64;
                for word in raw.split_whitespace() {
                    bits |= bitflag_member(members, word, self.name)?.bits;
                }
                Ok(Value::Number(bits.into()))
            }
            TypeDescriptor::Union(alternatives) => self.union(alternatives, &Material::Raw(raw)),
            TypeDescriptor::Container { element, .. } => {
                // A lone raw token for a container is one element, unless it
                // reads as a JSON array.
                if let Some(expanded) = self.try_json_array(raw) {
                    let coerced: Result<Vec<Value>, BindError> = expanded
                        .iter()
                        .map(|v| self.from_value(element, v))
                        .collect();
                    Ok(Value::Array(coerced?))
                } else {
                    Ok(Value::Array(vec![self.from_raw(element, raw)?]))
                }
            }
            TypeDescriptor::Tuple(_) | TypeDescriptor::Structured(_) => {
                Err(self.error(raw, "cannot build a structured value from one token"))
            }
            TypeDescriptor::Optional(inner) => self.from_raw(inner, raw),
        }
    }

    fn from_value(&self, descriptor: &TypeDescriptor, value: &Value) -> Result<Value, BindError> {
        match descriptor.unwrap_optional() {
            TypeDescriptor::Scalar(kind) => coerce_scalar_value(*kind, value, self.name),
            TypeDescriptor::Choice(members) => match value {
                Value::String(s) => coerce_choice(members, s, self.name),
                other => Err(self.error(&other.to_string(), "expected a choice string")),
            },
            TypeDescriptor::BitFlag(members) => match value {
                Value::String(s) => self.from_raw(descriptor, s),
                Value::Number(n) => Ok(Value::Number(n.clone())),
                Value::Array(items) => {
                    let mut bits = 0u64;
                    for item in items {
                        match item {
                            Value::String(s) => bits |= bitflag_member(members, s, self.name)?.bits,
                            other => {
                                return Err(self.error(&other.to_string(), "expected a member name"));
                            }
                        }
                    }
                    Ok(Value::Number(bits.into()))
                }
                other => Err(self.error(&other.to_string(), "expected bit-flag members")),
            },
            TypeDescriptor::Union(alternatives) => self.union(alternatives, &Material::Structured(value)),
            TypeDescriptor::Container { element, arity } => match value {
                Value::Array(items) => {
                    let coerced: Result<Vec<Value>, BindError> =
                        items.iter().map(|v| self.from_value(element, v)).collect();
                    let mut coerced = coerced?;
                    if *arity == Arity::Set {
                        coerced = dedup(coerced);
                    }
                    Ok(Value::Array(coerced))
                }
                other => Ok(Value::Array(vec![self.from_value(element, other)?])),
            },
            TypeDescriptor::Tuple(elements) => match value {
                Value::Array(items) if items.len() == elements.len() => {
                    let coerced: Result<Vec<Value>, BindError> = elements
                        .iter()
                        .zip(items)
                        .map(|(d, v)| self.from_value(d, v))
                        .collect();
                    Ok(Value::Array(coerced?))
                }
                other => Err(self.error(
                    &other.to_string(),
                    format!("expected {} elements", elements.len()),
                )),
            },
            TypeDescriptor::Structured(_) => match value {
                Value::Object(_) => Ok(value.clone()),
                other => Err(self.error(&other.to_string(), "expected an object")),
            },
            TypeDescriptor::Optional(inner) => self.from_value(inner, value),
        }
    }

    fn union(&self, alternatives: &[TypeDescriptor], material: &Material<'_>) -> Result<Value, BindError> {
        let mut failures = Vec::new();
        for alt in union_order(alternatives) {
            match self.element(alt, material) {
                Ok(value) => return Ok(value),
                Err(err) => failures.push(err.to_string()),
            }
        }
        let raw = match material {
            Material::Raw(raw) => (*raw).to_owned(),
            Material::Structured(value) => value.to_string(),
        };
        Err(self.error(&raw, format!("no union alternative matched ({})", failures.join("; "))))
    }

    fn try_json_array(&self, raw: &str) -> Option<Vec<Value>> {
        if !self.allow_json || !raw.trim_start().starts_with('[') {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

enum Material<'a> {
    Raw(&'a str),
    Structured(&'a Value),
}

fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Coerce one leaf's accumulated segments into its typed value.
///
/// Returns `Ok(None)` when the leaf is unset: no segments arrived and no
/// default or absence sentinel applies.
pub(crate) fn coerce_leaf(leaf: &Leaf, segments: &[RawSegment]) -> Result<Option<Value>, BindError> {
    let ctx = LeafCoercion {
        name: leaf.display_name(),
        allow_json: leaf.overrides.allow_json(),
    };

    if leaf.counted {
        if segments.is_empty() {
            return Ok(leaf.default.clone());
        }
        let mut count: i64 = 0;
        for segment in segments {
            match &segment.kind {
                SegmentKind::Flag | SegmentKind::Count => count += 1,
                // Environment and config sources supply the count directly.
                SegmentKind::Value(raw) => {
                    count = parse_int(raw).ok_or_else(|| ctx.error(raw, "expected an integer"))?;
                }
                SegmentKind::Json(Value::Number(n)) => {
                    count = n
                        .as_i64()
                        .ok_or_else(|| ctx.error(&n.to_string(), "expected an integer"))?;
                }
                other => {
                    return Err(BindError::Coercion {
                        name: ctx.name.to_owned(),
                        value: None,
                        message: format!("cannot interpret {other:?} as a count"),
                    });
                }
            }
        }
        return Ok(Some(Value::Number(count.into())));
    }

    if segments.is_empty() {
        if leaf.default.is_some() {
            return Ok(leaf.default.clone());
        }
        if matches!(leaf.descriptor, TypeDescriptor::Optional(_)) {
            // Absence is a valid terminal state, distinct from unset.
            return Ok(Some(Value::Null));
        }
        return Ok(None);
    }

    match leaf.descriptor.unwrap_optional() {
        TypeDescriptor::Scalar(ScalarKind::Bool) => coerce_bool_leaf(&ctx, segments).map(Some),
        TypeDescriptor::BitFlag(members) => coerce_bitflag_leaf(&ctx, members, segments).map(Some),
        TypeDescriptor::Container { element, arity } => {
            coerce_container_leaf(&ctx, element, *arity, segments)
        }
        TypeDescriptor::Tuple(elements) => coerce_tuple_leaf(&ctx, leaf, elements, segments).map(Some),
        descriptor if leaf.kind == ArgKind::VarKeyword => {
            coerce_var_keyword_leaf(&ctx, descriptor, segments).map(Some)
        }
        descriptor => {
            // Single-value shapes: exactly one meaningful segment.
            let Some(segment) = segments.last() else {
                return Ok(None);
            };
            match &segment.kind {
                SegmentKind::Value(raw) => ctx.from_raw(descriptor, raw).map(Some),
                SegmentKind::Json(value) => ctx.from_value(descriptor, value).map(Some),
                SegmentKind::Negate => Ok(Some(Value::Null)),
                other => Err(BindError::Coercion {
                    name: ctx.name.to_owned(),
                    value: None,
                    message: format!("flag-style input {other:?} cannot fill a value"),
                }),
            }
        }
    }
}

/// Booleans fold occurrences in order; the last positive/negative wins.
fn coerce_bool_leaf(ctx: &LeafCoercion<'_>, segments: &[RawSegment]) -> Result<Value, BindError> {
    let mut state = false;
    for segment in segments {
        state = match &segment.kind {
            SegmentKind::Flag => true,
            SegmentKind::Negate | SegmentKind::Empty => false,
            SegmentKind::Value(raw) => parse_bool(raw).ok_or_else(|| ctx.error(raw, "expected a boolean"))?,
            SegmentKind::Json(Value::Bool(b)) => *b,
            SegmentKind::Json(Value::String(s)) => {
                parse_bool(s).ok_or_else(|| ctx.error(s, "expected a boolean"))?
            }
            other => {
                return Err(BindError::Coercion {
                    name: ctx.name.to_owned(),
                    value: None,
                    message: format!("cannot interpret {other:?} as a boolean"),
                });
            }
        };
    }
    Ok(Value::Bool(state))
}

/// Bit flags accumulate by OR across every occurrence. A declared default is
/// replaced wholesale, not OR'ed, the moment any member is supplied.
fn coerce_bitflag_leaf(
    ctx: &LeafCoercion<'_>,
    members: &[BitFlagMember],
    segments: &[RawSegment],
) -> Result<Value, BindError> {
    let mut bits = 0u64;
    for segment in segments {
        match &segment.kind {
            SegmentKind::SetBits(member_bits) => bits |= member_bits,
            SegmentKind::ClearBits(member_bits) => bits &= !member_bits,
            SegmentKind::Empty | SegmentKind::Negate => bits = 0,
            SegmentKind::Value(raw) => {
                for word in raw.split_whitespace() {
                    bits |= bitflag_member(members, word, ctx.name)?.bits;
                }
            }
            SegmentKind::Json(value) => {
                if let Value::Number(n) =
                    ctx.from_value(&TypeDescriptor::BitFlag(members.to_vec()), value)?
                {
                    bits |= n.as_u64().unwrap_or(0);
                }
            }
            other => {
                return Err(BindError::Coercion {
                    name: ctx.name.to_owned(),
                    value: None,
                    message: format!("cannot interpret {other:?} as bit-flag members"),
                });
            }
        }
    }
    Ok(Value::Number(bits.into()))
}

/// Containers append one element per occurrence; a negative occurrence
/// resets the accumulator regardless of what came before it.
fn coerce_container_leaf(
    ctx: &LeafCoercion<'_>,
    element: &TypeDescriptor,
    arity: Arity,
    segments: &[RawSegment],
) -> Result<Option<Value>, BindError> {
    let mut items: Vec<Value> = Vec::new();
    let mut reset_seen = false;
    for segment in segments {
        match &segment.kind {
            SegmentKind::Empty | SegmentKind::Negate => {
                items.clear();
                reset_seen = true;
            }
            SegmentKind::Value(raw) => {
                if let Some(expanded) = ctx.try_json_array(raw) {
                    for value in &expanded {
                        items.push(ctx.from_value(element, value)?);
                    }
                } else {
                    items.push(ctx.from_raw(element, raw)?);
                }
            }
            SegmentKind::Json(Value::Array(values)) => {
                for value in values {
                    items.push(ctx.from_value(element, value)?);
                }
            }
            SegmentKind::Json(value) => items.push(ctx.from_value(element, value)?),
            other => {
                return Err(BindError::Coercion {
                    name: ctx.name.to_owned(),
                    value: None,
                    message: format!("cannot interpret {other:?} as a container element"),
                });
            }
        }
    }
    if items.is_empty() && !reset_seen {
        return Ok(None);
    }
    if arity == Arity::Set {
        items = dedup(items);
    }
    Ok(Some(Value::Array(items)))
}

/// Fixed tuples group exactly their arity's worth of adjacent raw segments,
/// coercing each position against its own element descriptor.
fn coerce_tuple_leaf(
    ctx: &LeafCoercion<'_>,
    leaf: &Leaf,
    elements: &[TypeDescriptor],
    segments: &[RawSegment],
) -> Result<Value, BindError> {
    if let [single] = segments {
        if let SegmentKind::Json(value) = &single.kind {
            return ctx.from_value(&leaf.descriptor, value);
        }
    }
    let raws: Vec<&str> = segments.iter().filter_map(RawSegment::value).collect();
    if raws.len() != elements.len() {
        return Err(BindError::MissingArgument {
            name: leaf.display_name().to_owned(),
        });
    }
    let coerced: Result<Vec<Value>, BindError> = elements
        .iter()
        .zip(&raws)
        .map(|(d, raw)| ctx.from_raw(d, raw))
        .collect();
    Ok(Value::Array(coerced?))
}

/// Var-keyword arguments collect arbitrary `--key value` pairs into an
/// object, coercing each value against the declared element shape.
fn coerce_var_keyword_leaf(
    ctx: &LeafCoercion<'_>,
    descriptor: &TypeDescriptor,
    segments: &[RawSegment],
) -> Result<Value, BindError> {
    let mut out = Map::new();
    for segment in segments {
        let Some(key) = segment.keyword.as_deref() else {
            return Err(BindError::UnsupportedPositional {
                name: ctx.name.to_owned(),
            });
        };
        let key = key.trim_start_matches('-').to_owned();
        let value = match &segment.kind {
            SegmentKind::Value(raw) => ctx.from_raw(descriptor, raw)?,
            SegmentKind::Json(value) => ctx.from_value(descriptor, value)?,
            SegmentKind::Flag => Value::Bool(true),
            other => {
                return Err(BindError::Coercion {
                    name: ctx.name.to_owned(),
                    value: None,
                    message: format!("cannot interpret {other:?} as a keyword value"),
                });
            }
        };
        if out.insert(key.clone(), value).is_some() {
            return Err(BindError::RepeatKeyword { name: format!("--{key}") });
        }
    }
    Ok(Value::Object(out))
}

/// Outcome of assembling one declared argument.
pub(crate) struct RootOutcome {
    pub name: String,
    pub value: Option<Value>,
    /// Whether any non-default source supplied the argument; group
    /// constraints count only these.
    pub touched: bool,
}

/// Assemble every declared argument of the command from the fill table.
pub(crate) fn assemble_all(
    collection: &ArgumentCollection<'_>,
    fills: &[Vec<RawSegment>],
) -> Result<Vec<RootOutcome>, BindError> {
    let mut outcomes = Vec::with_capacity(collection.roots.len());
    // Roots are created one per declared argument, in declaration order.
    for (root, spec) in collection.roots.iter().zip(&collection.command.args) {
        outcomes.push(assemble_root(collection, fills, root, spec)?);
    }
    Ok(outcomes)
}

fn assemble_root<'a>(
    collection: &'a ArgumentCollection<'a>,
    fills: &'a [Vec<RawSegment>],
    root: &Root,
    spec: &'a ArgSpec,
) -> Result<RootOutcome, BindError> {
    let mut assembly = Assembly {
        collection,
        fills,
        spec_index: root.spec_index,
        spec,
        union_counter: 0,
    };
    let eval = assembly.assemble(
        &spec.descriptor,
        Vec::new(),
        spec.required,
        spec.default.clone(),
    )?;

    // A user converter receives the raw segments instead of the structural
    // result and is solely responsible for the final value.
    let value = match (&spec.converter, root.leaves.as_slice()) {
        (Some(converter), [single]) if eval.touched => {
            let raws: Vec<String> = fills
                .get(*single)
                .into_iter()
                .flatten()
                .filter_map(|s| s.value().map(str::to_owned))
                .collect();
            let display = collection
                .leaves
                .get(*single)
                .map_or_else(|| spec.name.clone(), |leaf| leaf.display_name().to_owned());
            Some(converter(&raws).map_err(|message| BindError::Coercion {
                name: display,
                value: raws.first().cloned(),
                message,
            })?)
        }
        _ => eval.value,
    };

    Ok(RootOutcome {
        name: spec.name.clone(),
        value,
        touched: eval.touched,
    })
}

struct Eval {
    value: Option<Value>,
    touched: bool,
}

struct Assembly<'a> {
    collection: &'a ArgumentCollection<'a>,
    fills: &'a [Vec<RawSegment>],
    spec_index: usize,
    spec: &'a ArgSpec,
    union_counter: usize,
}

impl Assembly<'_> {
    /// Mirror of the flattening walk: structured nodes recurse per field,
    /// everything else resolves to the leaf recorded at this key path.
    fn assemble(
        &mut self,
        descriptor: &TypeDescriptor,
        keys: Vec<String>,
        required: bool,
        default: Option<Value>,
    ) -> Result<Eval, BindError> {
        match descriptor.unwrap_optional() {
            TypeDescriptor::Structured(adapter) => {
                self.assemble_structured(adapter.as_ref(), keys, required, default)
            }
            TypeDescriptor::Union(alternatives)
                if alternatives
                    .iter()
                    .any(|alt| matches!(alt.unwrap_optional(), TypeDescriptor::Structured(_))) =>
            {
                self.assemble_union(alternatives, keys, required, default)
            }
            _ => self.assemble_leaf(&keys, required),
        }
    }

    fn assemble_leaf(&self, keys: &[String], required: bool) -> Result<Eval, BindError> {
        let path = keys.join(".");
        let found = self
            .collection
            .leaf_by_path(self.spec_index, &path)
            .and_then(|index| Some((self.collection.leaves.get(index)?, self.fills.get(index)?)));
        // Assembly mirrors flattening, so every path resolves; a miss reads
        // as unset.
        let Some((leaf, segments)) = found else {
            return if required {
                Err(BindError::MissingArgument {
                    name: self.display_name(keys),
                })
            } else {
                Ok(Eval {
                    value: None,
                    touched: false,
                })
            };
        };
        let value = coerce_leaf(leaf, segments)?;
        if value.is_none() && (required || leaf.required) {
            return Err(BindError::MissingArgument {
                name: leaf.display_name().to_owned(),
            });
        }
        Ok(Eval {
            value,
            touched: !segments.is_empty(),
        })
    }

    fn assemble_structured(
        &mut self,
        adapter: &dyn crate::schema::StructuredAdapter,
        keys: Vec<String>,
        required: bool,
        default: Option<Value>,
    ) -> Result<Eval, BindError> {
        let touched = self.subtree_touched(&keys);
        if !touched && !required {
            return Ok(Eval { value: default, touched: false });
        }

        let mut fields = Map::new();
        for field in adapter.fields() {
            let mut child_keys = keys.clone();
            child_keys.push(field.name.clone());
            let child = self.assemble(
                &field.descriptor,
                child_keys,
                field.required,
                field.default.clone(),
            )?;
            if let Some(value) = child.value {
                fields.insert(field.name, value);
            }
        }

        let value = adapter.construct(fields).map_err(|message| BindError::Coercion {
            name: self.display_name(&keys),
            value: None,
            message,
        })?;
        Ok(Eval { value: Some(value), touched })
    }

    /// Canonical name for errors raised above the leaf level, matching the
    /// flag form leaves report (`--user.address`, not `user.address`).
    fn display_name(&self, keys: &[String]) -> String {
        let dotted = if keys.is_empty() {
            self.spec.name.clone()
        } else {
            keys.join(".")
        };
        if self.spec.kind.is_keyword() {
            format!("--{dotted}")
        } else {
            dotted
        }
    }

    /// At most one union alternative may have been touched; the touched
    /// alternative's assembly wins.
    fn assemble_union(
        &mut self,
        alternatives: &[TypeDescriptor],
        keys: Vec<String>,
        required: bool,
        default: Option<Value>,
    ) -> Result<Eval, BindError> {
        let ordinal = self.union_counter;
        self.union_counter += 1;

        let mut touched_alts: Vec<usize> = Vec::new();
        for (leaf, fill) in self.collection.leaves.iter().zip(self.fills) {
            if leaf.spec_index != self.spec_index {
                continue;
            }
            if let Some((leaf_ordinal, alt)) = leaf.union_alt {
                if leaf_ordinal == ordinal && !fill.is_empty() && !touched_alts.contains(&alt) {
                    touched_alts.push(alt);
                }
            }
        }
        let display = self.display_name(&keys);
        if touched_alts.len() > 1 {
            return Err(BindError::MixedArgument { name: display });
        }

        let has_scalar_alt = alternatives
            .iter()
            .any(|alt| !matches!(alt.unwrap_optional(), TypeDescriptor::Structured(_)));

        match touched_alts.first() {
            Some(0) if has_scalar_alt => self.assemble_leaf(&keys, required),
            Some(&alt) => {
                let adapter = alt.checked_sub(1).and_then(|nth| {
                    alternatives
                        .iter()
                        .filter_map(|alternative| match alternative.unwrap_optional() {
                            TypeDescriptor::Structured(adapter) => Some(adapter),
                            _ => None,
                        })
                        .nth(nth)
                });
                match adapter {
                    Some(adapter) => {
                        self.assemble_structured(adapter.as_ref(), keys, required, default)
                    }
                    None => Ok(Eval { value: default, touched: false }),
                }
            }
            None => {
                if required {
                    return Err(BindError::MissingArgument { name: display });
                }
                Ok(Eval { value: default, touched: false })
            }
        }
    }

    fn subtree_touched(&self, keys: &[String]) -> bool {
        self.collection
            .leaves
            .iter()
            .zip(self.fills)
            .any(|(leaf, fill)| {
                leaf.spec_index == self.spec_index
                    && leaf.keys.starts_with(keys)
                    && !fill.is_empty()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("true", Some(true))]
    #[case("YES", Some(true))]
    #[case("on", Some(true))]
    #[case("1", Some(true))]
    #[case("false", Some(false))]
    #[case("N", Some(false))]
    #[case("off", Some(false))]
    #[case("0", Some(false))]
    #[case("maybe", None)]
    fn boolean_synonyms(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_bool(raw), expected);
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case("-7", Some(-7))]
    #[case("+7", Some(7))]
    #[case("0x10", Some(16))]
    #[case("-0x10", Some(-16))]
    #[case("0o17", Some(15))]
    #[case("0b101", Some(5))]
    #[case("1_000", Some(1000))]
    #[case("-9223372036854775808", Some(i64::MIN))]
    #[case("9223372036854775807", Some(i64::MAX))]
    #[case("9223372036854775808", None)]
    #[case("12.5", None)]
    #[case("ten", None)]
    fn integer_grammar(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_int(raw), expected);
    }
}
