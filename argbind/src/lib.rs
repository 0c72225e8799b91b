//! Declarative argument resolution and coercion.
//!
//! `argbind` turns a declared parameter set into typed values by merging
//! CLI tokens, environment variables, external config sources and declared
//! defaults, in that order of precedence, decided independently per
//! argument. Structured parameter shapes flatten into dotted flags
//! (`--user.id`), containers accumulate across repeated occurrences, and
//! every value passes through type-directed coercion and validation before
//! the caller sees it.
//!
//! ```
//! use argbind::{ArgSpec, CommandSpec, Resolver, TypeDescriptor};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), argbind::ResolveError> {
//! let command = CommandSpec::new()
//!     .arg(ArgSpec::new("a", TypeDescriptor::integer()).required())
//!     .arg(ArgSpec::new("b", TypeDescriptor::integer()).required())
//!     .arg(ArgSpec::new("c", TypeDescriptor::integer()).default(json!(0)));
//!
//! let bound = Resolver::new().resolve(&command, ["--c", "3", "1", "2"])?;
//! assert_eq!(bound.get("a"), Some(&json!(1)));
//! assert_eq!(bound.get("b"), Some(&json!(2)));
//! assert_eq!(bound.get("c"), Some(&json!(3)));
//! # Ok(())
//! # }
//! ```

mod argument;
mod binder;
mod coerce;
mod collection;
mod error;
mod resolve;
mod schema;
mod sources;
mod token;
mod validate;

pub use argument::{
    ArgKind, ArgSpec, CommandSpec, Converter, GroupSpec, GroupValidator, Overrides, Validator,
};
pub use collection::ArgumentCollection;
pub use error::{BindError, ResolveError, SchemaError, ValidationFailure};
pub use resolve::{BindResult, Provenance, Resolver};
pub use schema::{
    Arity, BitFlagMember, ChoiceMember, FieldSpec, ScalarKind, StructSchema, StructuredAdapter,
    TypeDescriptor,
};
pub use sources::{ConfigSource, EnvLookup, FigmentSource, JsonSource, ProcessEnv, StaticEnv};
pub use token::{RawSegment, SegmentKind, Source};
pub use validate::limited_choice;
