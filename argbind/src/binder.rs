//! The CLI token state machine.
//!
//! Tokens are consumed strictly left to right with no backtracking. The
//! binder alternates between scanning for flags and consuming value tokens
//! for the most recently matched leaf; positional tokens fill declared slots
//! in order, skipping slots already supplied by keyword. Matching mutates
//! only the binder's own fill table; the collection stays immutable.

use std::collections::HashSet;

use tracing::trace;

use crate::argument::ArgKind;
use crate::coerce::parse_bool;
use crate::collection::{ArgumentCollection, Leaf, Role};
use crate::error::BindError;
use crate::schema::TypeDescriptor;
use crate::token::{RawSegment, SegmentKind};

/// Per-leaf accumulated raw segments, indexed like the collection's leaves.
pub(crate) type FillTable = Vec<Vec<RawSegment>>;

/// Bind a CLI token stream against the collection, producing the fill table.
///
/// # Errors
///
/// Flag-shaped tokens that match nothing fail immediately with
/// [`BindError::UnknownOption`]; value tokens with no remaining positional
/// slot are gathered and reported together at end of stream as
/// [`BindError::UnusedCliTokens`].
pub(crate) fn bind_cli(
    collection: &ArgumentCollection<'_>,
    tokens: &[String],
) -> Result<FillTable, BindError> {
    for spec in &collection.command.args {
        // Structured shapes bind through dotted keywords; a positional-only
        // declaration leaves them unreachable.
        if spec.kind == ArgKind::PositionalOnly
            && matches!(
                spec.descriptor.unwrap_optional(),
                TypeDescriptor::Structured(_) | TypeDescriptor::Union(_)
            )
        {
            return Err(BindError::UnsupportedPositional {
                name: spec.name.clone(),
            });
        }
    }

    let mut binder = Binder {
        collection,
        fills: vec![Vec::new(); collection.leaves.len()],
        keyword_filled: HashSet::new(),
        slot_cursor: 0,
        slot_consumed: 0,
        unused: Vec::new(),
        end_of_options: false,
    };
    binder.run(tokens)?;
    if binder.unused.is_empty() {
        Ok(binder.fills)
    } else {
        Err(BindError::UnusedCliTokens {
            tokens: binder.unused,
        })
    }
}

struct Binder<'a, 'spec> {
    collection: &'a ArgumentCollection<'spec>,
    fills: FillTable,
    /// Leaves that received at least one keyword-introduced segment.
    keyword_filled: HashSet<usize>,
    /// Cursor into the collection's positional slots.
    slot_cursor: usize,
    /// Tokens consumed within the current slot's occurrence.
    slot_consumed: usize,
    unused: Vec<String>,
    end_of_options: bool,
}

impl Binder<'_, '_> {
    fn run(&mut self, tokens: &[String]) -> Result<(), BindError> {
        let mut i = 0;
        while let Some(token) = tokens.get(i) {
            i += 1;
            if !self.end_of_options && token == "--" {
                self.end_of_options = true;
                continue;
            }
            if !self.end_of_options && is_flag_token(token) {
                let (flag, attached) = split_attached(token);
                if let Some((leaf_index, leaf, role)) = self.collection.match_flag(flag) {
                    self.handle_flag(leaf_index, leaf, role, flag, attached, tokens, &mut i)?;
                } else if let Some((leaf_index, count)) = self.match_counted_run(flag, attached) {
                    for _ in 0..count {
                        self.push(leaf_index, RawSegment::cli_implicit(flag, SegmentKind::Count));
                    }
                    self.keyword_filled.insert(leaf_index);
                } else if let Some(var_keyword) = self.collection.var_keyword {
                    self.handle_var_keyword(var_keyword, flag, attached, tokens, &mut i);
                } else {
                    return Err(BindError::UnknownOption {
                        token: token.clone(),
                    });
                }
            } else {
                self.handle_positional(token);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_flag(
        &mut self,
        leaf_index: usize,
        leaf: &Leaf,
        role: Role,
        flag: &str,
        attached: Option<&str>,
        tokens: &[String],
        i: &mut usize,
    ) -> Result<(), BindError> {
        trace!(flag, role = ?role, leaf = %leaf.name, "matched flag");

        match role {
            Role::Positive if leaf.counted => {
                if let Some(value) = attached {
                    return Err(BindError::coercion(flag, value, "counting flags take no value"));
                }
                self.push(leaf_index, RawSegment::cli_implicit(flag, SegmentKind::Count));
            }
            Role::Positive if leaf.is_flag_like() => match attached {
                // `--verbose=false` is the spelled-out inverse of the
                // implicit `true`.
                Some(value) => self.push(leaf_index, RawSegment::cli_value(Some(flag), value, 0)),
                None => self.push(leaf_index, RawSegment::cli_implicit(flag, SegmentKind::Flag)),
            },
            Role::Positive => {
                if !leaf.repeatable() && self.filled(leaf_index) {
                    return Err(BindError::RepeatKeyword {
                        name: flag.to_owned(),
                    });
                }
                match attached {
                    Some(value) => {
                        self.push(leaf_index, RawSegment::cli_value(Some(flag), value, 0));
                    }
                    None => {
                        if leaf.requires_attached_value {
                            return Err(BindError::RequiresEquals {
                                name: flag.to_owned(),
                            });
                        }
                        self.consume_values(leaf_index, leaf, flag, tokens, i)?;
                    }
                }
            }
            Role::Negative => match attached {
                Some(value) => {
                    // `--no-flag=false` double-negates; a false-valued
                    // container negative is a no-op.
                    let parsed = parse_bool(value)
                        .ok_or_else(|| BindError::coercion(flag, value, "expected a boolean"))?;
                    if parsed {
                        let kind = negative_kind(leaf.descriptor.is_boolean());
                        self.push(leaf_index, RawSegment::cli_implicit(flag, kind));
                    } else if leaf.descriptor.is_boolean() {
                        self.push(leaf_index, RawSegment::cli_implicit(flag, SegmentKind::Flag));
                    }
                }
                None => {
                    let kind = negative_kind(leaf.descriptor.is_boolean());
                    self.push(leaf_index, RawSegment::cli_implicit(flag, kind));
                }
            },
            Role::BitSet(bits) | Role::BitClear(bits) => {
                let mut set = matches!(role, Role::BitSet(_));
                if let Some(value) = attached {
                    let parsed = parse_bool(value)
                        .ok_or_else(|| BindError::coercion(flag, value, "expected a boolean"))?;
                    if !parsed {
                        set = !set;
                    }
                }
                let kind = if set {
                    SegmentKind::SetBits(bits)
                } else {
                    SegmentKind::ClearBits(bits)
                };
                self.push(leaf_index, RawSegment::cli_implicit(flag, kind));
            }
        }
        self.keyword_filled.insert(leaf_index);
        Ok(())
    }

    /// Consume the value tokens one flag occurrence is owed.
    fn consume_values(
        &mut self,
        leaf_index: usize,
        leaf: &Leaf,
        flag: &str,
        tokens: &[String],
        i: &mut usize,
    ) -> Result<(), BindError> {
        let (per_element, consume_all) = leaf.token_count();
        let greedy = consume_all && leaf.consume_multiple;
        let wanted = if greedy { usize::MAX } else { per_element.max(1) };

        let mut taken = 0;
        while taken < wanted {
            let Some(token) = tokens.get(*i) else { break };
            if greedy && is_flag_token(token) {
                break;
            }
            self.push(
                leaf_index,
                RawSegment::cli_value(Some(flag), token.clone(), taken),
            );
            *i += 1;
            taken += 1;
        }
        if taken == 0 && greedy {
            // A greedy flag with nothing to swallow binds the empty
            // container rather than erroring.
            self.push(leaf_index, RawSegment::cli_implicit(flag, SegmentKind::Empty));
            return Ok(());
        }
        if taken < wanted && !greedy {
            return Err(BindError::MissingArgument {
                name: flag.to_owned(),
            });
        }
        Ok(())
    }

    /// `-vvv` style runs of one counting short alias.
    fn match_counted_run(&self, flag: &str, attached: Option<&str>) -> Option<(usize, usize)> {
        if attached.is_some() {
            return None;
        }
        let run = flag.strip_prefix('-')?;
        if run.len() < 2 || flag.starts_with("--") {
            return None;
        }
        let mut chars = run.chars();
        let first = chars.next()?;
        if !chars.all(|c| c == first) {
            return None;
        }
        let (leaf_index, leaf, role) = self.collection.match_flag(&format!("-{first}"))?;
        (leaf.counted && role == Role::Positive).then_some((leaf_index, run.len()))
    }

    /// An unmatched flag lands on the var-keyword sink when one is declared.
    fn handle_var_keyword(
        &mut self,
        leaf_index: usize,
        flag: &str,
        attached: Option<&str>,
        tokens: &[String],
        i: &mut usize,
    ) {
        match attached {
            Some(value) => {
                self.push(leaf_index, RawSegment::cli_value(Some(flag), value, 0));
            }
            None => match tokens.get(*i) {
                Some(next) if !is_flag_token(next) => {
                    self.push(leaf_index, RawSegment::cli_value(Some(flag), next.clone(), 0));
                    *i += 1;
                }
                _ => self.push(leaf_index, RawSegment::cli_implicit(flag, SegmentKind::Flag)),
            },
        }
    }

    fn handle_positional(&mut self, token: &str) {
        let slots = self.collection.positional_slots();
        loop {
            let Some(&leaf_index) = slots.get(self.slot_cursor) else {
                self.unused.push(token.to_owned());
                return;
            };
            let Some(leaf) = self.collection.leaf(leaf_index) else {
                self.slot_cursor += 1;
                self.slot_consumed = 0;
                continue;
            };
            let (per_element, consume_all) = leaf.token_count();
            if self.keyword_filled.contains(&leaf_index) && !consume_all {
                self.slot_cursor += 1;
                self.slot_consumed = 0;
                continue;
            }
            let index = self.slot_consumed;
            self.push(leaf_index, RawSegment::cli_value(None, token, index));
            self.slot_consumed += 1;
            if !consume_all && self.slot_consumed >= per_element.max(1) {
                self.slot_cursor += 1;
                self.slot_consumed = 0;
            }
            return;
        }
    }

    fn filled(&self, leaf_index: usize) -> bool {
        self.fills.get(leaf_index).is_some_and(|fill| !fill.is_empty())
    }

    fn push(&mut self, leaf_index: usize, segment: RawSegment) {
        if let Some(fill) = self.fills.get_mut(leaf_index) {
            fill.push(segment);
        }
    }
}

/// Whether a token is flag-shaped. A lone dash and dash-prefixed numbers
/// (`-5`, `-.5`) read as values.
fn is_flag_token(token: &str) -> bool {
    let mut chars = token.chars();
    if chars.next() != Some('-') {
        return false;
    }
    match chars.next() {
        None => false,
        Some(c) => !(c.is_ascii_digit() || c == '.'),
    }
}

fn split_attached(token: &str) -> (&str, Option<&str>) {
    match token.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (token, None),
    }
}

/// The kind of segment a negative flag contributes.
fn negative_kind(is_boolean: bool) -> SegmentKind {
    if is_boolean {
        SegmentKind::Negate
    } else {
        SegmentKind::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("--flag", true)]
    #[case("-v", true)]
    #[case("-", false)]
    #[case("-5", false)]
    #[case("-.5", false)]
    #[case("value", false)]
    #[case("", false)]
    fn flag_shaped_tokens(#[case] token: &str, #[case] expected: bool) {
        assert_eq!(is_flag_token(token), expected);
    }

    #[test]
    fn attached_values_split_once() {
        assert_eq!(split_attached("--k=v"), ("--k", Some("v")));
        assert_eq!(split_attached("--k=a=b"), ("--k", Some("a=b")));
        assert_eq!(split_attached("--k"), ("--k", None));
    }
}
