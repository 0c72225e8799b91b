//! Book-keeping for how a user supplied a value.
//!
//! A [`RawSegment`] records one unit of raw input assigned to an argument,
//! pretty much unadulterated, together with where it came from. Segments are
//! consumed by the coercion engine in the order they were recorded.

use serde_json::Value;

/// Where a segment came from. Used for source-precedence decisions and
/// diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    /// Parsed from the CLI token stream.
    Cli,
    /// Read from an environment variable.
    Env,
    /// Looked up in an external config source.
    Config,
}

/// The payload of a segment.
#[derive(Clone, Debug, PartialEq)]
pub enum SegmentKind {
    /// A raw string value still awaiting coercion.
    Value(String),
    /// An already-structured value from a config source.
    Json(Value),
    /// A bare positive flag occurrence (`--verbose`).
    Flag,
    /// A negative flag occurrence; binds `false` for booleans.
    Negate,
    /// A container negative; resets the accumulator to empty.
    Empty,
    /// Set the given bit-flag member bits.
    SetBits(u64),
    /// Clear the given bit-flag member bits.
    ClearBits(u64),
    /// One counted occurrence of a counting argument.
    Count,
}

/// One unit of raw input assigned to an argument.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSegment {
    /// The keyword that introduced the segment: a flag like `--user.id`, an
    /// environment variable name, or a config dotted path. `None` when
    /// positional.
    pub keyword: Option<String>,
    /// The segment payload.
    pub kind: SegmentKind,
    /// Ordinal within a multi-token occurrence, or the positional index.
    pub index: usize,
    /// Provenance of the segment.
    pub source: Source,
}

impl RawSegment {
    pub(crate) fn cli_value(keyword: Option<&str>, value: impl Into<String>, index: usize) -> Self {
        Self {
            keyword: keyword.map(str::to_owned),
            kind: SegmentKind::Value(value.into()),
            index,
            source: Source::Cli,
        }
    }

    pub(crate) fn cli_implicit(keyword: &str, kind: SegmentKind) -> Self {
        Self {
            keyword: Some(keyword.to_owned()),
            kind,
            index: 0,
            source: Source::Cli,
        }
    }

    pub(crate) fn env(variable: &str, value: impl Into<String>, index: usize) -> Self {
        Self {
            keyword: Some(variable.to_owned()),
            kind: SegmentKind::Value(value.into()),
            index,
            source: Source::Env,
        }
    }

    pub(crate) fn env_json(variable: &str, value: Value) -> Self {
        Self {
            keyword: Some(variable.to_owned()),
            kind: SegmentKind::Json(value),
            index: 0,
            source: Source::Env,
        }
    }

    pub(crate) fn config(path: &str, value: Value) -> Self {
        Self {
            keyword: Some(path.to_owned()),
            kind: SegmentKind::Json(value),
            index: 0,
            source: Source::Config,
        }
    }

    /// The raw string value, when this segment carries one.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Value(v) => Some(v),
            _ => None,
        }
    }
}
