//! Normalized, recursive descriptions of what an argument's value must look
//! like.
//!
//! A [`TypeDescriptor`] is pure data: it says nothing about *how* a value is
//! obtained, only what shape the coercion engine should produce. Structured
//! shapes are supplied by an external [`StructuredAdapter`] rather than by
//! reflecting over any particular object model; [`StructSchema`] is the
//! built-in declarative adapter for the common case.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Scalar grammars understood by the coercion engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScalarKind {
    /// Any UTF-8 string, taken verbatim.
    Str,
    /// Integer; accepts `0x`/`0o`/`0b` prefixes and `_` separators.
    Int,
    /// Floating point number.
    Float,
    /// Boolean; accepts case-insensitive `true/t/yes/y/1/on` and friends.
    Bool,
    /// Filesystem path, constructed verbatim. Existence checks are
    /// validators, not coercion.
    Path,
    /// Opaque one-token user type; the raw string is passed through for a
    /// user-supplied converter to interpret.
    Opaque,
}

impl ScalarKind {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Bool => "boolean",
            Self::Path => "path",
            Self::Opaque => "value",
        }
    }
}

/// One allowed representation in a [`TypeDescriptor::Choice`].
#[derive(Clone, Debug)]
pub struct ChoiceMember {
    /// The exact string a raw token must equal (case-sensitive).
    pub value: String,
    /// Optional per-member help text.
    pub help: Option<String>,
}

impl ChoiceMember {
    /// A member with no help text.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            help: None,
        }
    }
}

impl From<&str> for ChoiceMember {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChoiceMember {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One independently settable and clearable member of a
/// [`TypeDescriptor::BitFlag`].
#[derive(Clone, Debug)]
pub struct BitFlagMember {
    /// Member name; also the suffix of its generated flag (`--perms.write`).
    pub name: String,
    /// Bit pattern contributed when the member is set.
    pub bits: u64,
    /// Optional per-member help text.
    pub help: Option<String>,
}

impl BitFlagMember {
    #[must_use]
    pub fn new(name: impl Into<String>, bits: u64) -> Self {
        Self {
            name: name.into(),
            bits,
            help: None,
        }
    }
}

/// Arity of a [`TypeDescriptor::Container`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Arity {
    /// Unbounded, order-preserving, repeatable.
    List,
    /// Unbounded, order-preserving with duplicates removed.
    Set,
    /// Homogeneous and unbounded, materialized as a fixed-arity collection
    /// once binding completes.
    VariadicTuple,
}

/// A normalized, recursive description of a bindable value's shape.
///
/// Descriptor trees are finite and acyclic; cycles through structured
/// adapters are rejected when the argument collection is built.
#[derive(Clone)]
pub enum TypeDescriptor {
    /// A single token parsed with a kind-specific grammar.
    Scalar(ScalarKind),
    /// An ordered set of allowed string representations.
    Choice(Vec<ChoiceMember>),
    /// Members combine via bitwise OR; each is independently settable and
    /// clearable through generated per-member flags.
    BitFlag(Vec<BitFlagMember>),
    /// A homogeneous collection of `element` values.
    Container {
        element: Box<TypeDescriptor>,
        arity: Arity,
    },
    /// Exactly `n` heterogeneous elements taken from adjacent tokens, each
    /// coerced against its own descriptor.
    Tuple(Vec<TypeDescriptor>),
    /// Ordered alternatives; choice alternatives are attempted before open
    /// scalars, and the first successful coercion wins.
    Union(Vec<TypeDescriptor>),
    /// Fields supplied by an external adapter, expanded into dotted leaves.
    Structured(Arc<dyn StructuredAdapter>),
    /// Absence is a valid terminal state (`null`), distinct from unset.
    Optional(Box<TypeDescriptor>),
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "Scalar({kind:?})"),
            Self::Choice(members) => {
                let values: Vec<&str> = members.iter().map(|m| m.value.as_str()).collect();
                write!(f, "Choice({values:?})")
            }
            Self::BitFlag(members) => {
                let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
                write!(f, "BitFlag({names:?})")
            }
            Self::Container { element, arity } => write!(f, "Container({element:?}, {arity:?})"),
            Self::Tuple(elements) => write!(f, "Tuple({elements:?})"),
            Self::Union(alternatives) => write!(f, "Union({alternatives:?})"),
            Self::Structured(adapter) => write!(f, "Structured({})", adapter.type_name()),
            Self::Optional(inner) => write!(f, "Optional({inner:?})"),
        }
    }
}

impl TypeDescriptor {
    /// Shorthand for `Scalar(ScalarKind::Str)`.
    #[must_use]
    pub fn string() -> Self {
        Self::Scalar(ScalarKind::Str)
    }

    /// Shorthand for `Scalar(ScalarKind::Int)`.
    #[must_use]
    pub fn integer() -> Self {
        Self::Scalar(ScalarKind::Int)
    }

    /// Shorthand for `Scalar(ScalarKind::Float)`.
    #[must_use]
    pub fn float() -> Self {
        Self::Scalar(ScalarKind::Float)
    }

    /// Shorthand for `Scalar(ScalarKind::Bool)`.
    #[must_use]
    pub fn boolean() -> Self {
        Self::Scalar(ScalarKind::Bool)
    }

    /// Shorthand for `Scalar(ScalarKind::Path)`.
    #[must_use]
    pub fn path() -> Self {
        Self::Scalar(ScalarKind::Path)
    }

    /// A choice set built from string-like members.
    #[must_use]
    pub fn choice<I, M>(members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ChoiceMember>,
    {
        Self::Choice(members.into_iter().map(Into::into).collect())
    }

    /// An unbounded, order-preserving list of `element`.
    #[must_use]
    pub fn list(element: TypeDescriptor) -> Self {
        Self::Container {
            element: Box::new(element),
            arity: Arity::List,
        }
    }

    /// An order-preserving set of `element` with duplicates removed.
    #[must_use]
    pub fn set(element: TypeDescriptor) -> Self {
        Self::Container {
            element: Box::new(element),
            arity: Arity::Set,
        }
    }

    /// Wrap `inner` so that absence binds `null` instead of erroring.
    #[must_use]
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Strip any `Optional` wrapper.
    #[must_use]
    pub(crate) fn unwrap_optional(&self) -> &TypeDescriptor {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// How many raw tokens one occurrence of this shape consumes, and
    /// whether it keeps consuming until the next recognized flag.
    pub(crate) fn token_count(&self) -> (usize, bool) {
        match self.unwrap_optional() {
            Self::Scalar(ScalarKind::Bool) => (0, false),
            Self::Scalar(_) | Self::Choice(_) => (1, false),
            Self::BitFlag(_) => (1, true),
            Self::Container { element, .. } => (element.token_count().0.max(1), true),
            Self::Tuple(elements) => {
                let per_element: usize = elements.iter().map(|e| e.token_count().0.max(1)).sum();
                (per_element, false)
            }
            Self::Union(alternatives) => {
                // A union consumes what its widest alternative would.
                let mut count = 1;
                let mut consume_all = false;
                for alt in alternatives {
                    let (alt_count, alt_all) = alt.token_count();
                    count = count.max(alt_count);
                    consume_all |= alt_all;
                }
                (count, consume_all)
            }
            Self::Structured(_) => (1, false),
            Self::Optional(inner) => inner.token_count(),
        }
    }

    /// Whether a negation flag should reset this shape to an empty
    /// container rather than a boolean `false`.
    pub(crate) fn is_container(&self) -> bool {
        matches!(
            self.unwrap_optional(),
            Self::Container { .. } | Self::Tuple(_)
        )
    }

    pub(crate) fn is_boolean(&self) -> bool {
        matches!(self.unwrap_optional(), Self::Scalar(ScalarKind::Bool))
    }

    pub(crate) fn is_bitflag(&self) -> bool {
        matches!(self.unwrap_optional(), Self::BitFlag(_))
    }
}

/// Supplies the field list and constructor for a structured shape.
///
/// The engine never introspects a language-native object model; any concrete
/// structured type a host wants to support implements this adapter instead.
pub trait StructuredAdapter: Send + Sync {
    /// Name used in diagnostics and for cycle detection.
    fn type_name(&self) -> &str;

    /// Ordered field list, expanded into leaves during flattening.
    fn fields(&self) -> Vec<FieldSpec>;

    /// Whether fields merge into the parent namespace instead of appearing
    /// under `parent.field`. Defaults to namespacing.
    fn flatten(&self) -> bool {
        false
    }

    /// Assemble typed field values back into the structured value.
    ///
    /// The default constructor produces a JSON object, which suits hosts
    /// that deserialize the bind result with serde.
    ///
    /// # Errors
    ///
    /// Returns a message when the field values cannot form a valid instance.
    fn construct(&self, fields: serde_json::Map<String, Value>) -> Result<Value, String> {
        Ok(Value::Object(fields))
    }
}

/// One field of a structured shape.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    /// Field name; becomes a dotted-path component unless flattened.
    pub name: String,
    /// Shape of the field's value.
    pub descriptor: TypeDescriptor,
    /// Whether the field must be supplied when its parent is.
    pub required: bool,
    /// Value applied when the field is never touched.
    pub default: Option<Value>,
    /// Per-field override of the parent's flattening choice.
    pub flatten: Option<bool>,
}

impl FieldSpec {
    /// A required field with no default.
    #[must_use]
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: true,
            default: None,
            flatten: None,
        }
    }

    /// An optional field with a default value.
    #[must_use]
    pub fn with_default(name: impl Into<String>, descriptor: TypeDescriptor, default: Value) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: false,
            default: Some(default),
            flatten: None,
        }
    }

    /// An optional field with no default; absence leaves it out entirely.
    #[must_use]
    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: false,
            default: None,
            flatten: None,
        }
    }

    /// Override the parent's flattening choice for this field.
    #[must_use]
    pub fn flattened(mut self) -> Self {
        self.flatten = Some(true);
        self
    }
}

/// Declarative [`StructuredAdapter`] for schema-described structs.
///
/// This is the mandatory replacement for reflection-driven argument
/// construction: names, shapes, requiredness and defaults are stated up
/// front.
#[derive(Clone)]
pub struct StructSchema {
    name: String,
    fields: Vec<FieldSpec>,
    flatten: bool,
}

impl StructSchema {
    /// Start an empty schema named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            flatten: false,
        }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Merge every field into the parent namespace.
    #[must_use]
    pub fn flattened(mut self) -> Self {
        self.flatten = true;
        self
    }

    /// Finish the schema as a [`TypeDescriptor::Structured`].
    #[must_use]
    pub fn into_descriptor(self) -> TypeDescriptor {
        TypeDescriptor::Structured(Arc::new(self))
    }
}

impl StructuredAdapter for StructSchema {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        self.fields.clone()
    }

    fn flatten(&self) -> bool {
        self.flatten
    }
}
