//! Post-coercion validation.
//!
//! Per-argument validators run over every bound value, defaults included;
//! group validators see only the members that were explicitly supplied by
//! some source. All failures are collected before reporting so the caller
//! sees the complete picture in one error.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::argument::{CommandSpec, GroupValidator};
use crate::coerce::RootOutcome;
use crate::error::{BindError, ValidationFailure};

/// An inclusive `[min, max]` bound on the number of explicitly supplied
/// group members. `[0, 1]` expresses mutual exclusivity.
#[must_use]
pub fn limited_choice(min: usize, max: usize) -> GroupValidator {
    Arc::new(move |members: &[(&str, &Value)]| {
        let supplied = members.len();
        if supplied < min || supplied > max {
            let names: Vec<&str> = members.iter().map(|(name, _)| *name).collect();
            return Err(if min == max {
                format!("expected exactly {min} of the group, got {supplied} ({names:?})")
            } else {
                format!("expected between {min} and {max} of the group, got {supplied} ({names:?})")
            });
        }
        Ok(())
    })
}

/// Run every per-argument and group validator over the assembled outcomes.
///
/// # Errors
///
/// Returns [`BindError::Validation`] carrying every failure.
pub(crate) fn run(command: &CommandSpec, outcomes: &[RootOutcome]) -> Result<(), BindError> {
    let mut failures: Vec<ValidationFailure> = Vec::new();

    for outcome in outcomes {
        let Some(value) = &outcome.value else { continue };
        let Some(spec) = command.args.iter().find(|s| s.name == outcome.name) else {
            continue;
        };
        // First failure stops the argument's chain; other arguments still run.
        for validator in &spec.validators {
            if let Err(message) = validator(value) {
                debug!(argument = %outcome.name, %message, "validator rejected value");
                failures.push(ValidationFailure {
                    name: outcome.name.clone(),
                    message,
                });
                break;
            }
        }
    }

    for group in &command.groups {
        let Some(validator) = &group.validator else { continue };
        let members: Vec<(&str, &Value)> = outcomes
            .iter()
            .filter(|outcome| {
                outcome.touched
                    && command
                        .args
                        .iter()
                        .any(|s| s.name == outcome.name && s.groups.contains(&group.name))
            })
            .filter_map(|outcome| outcome.value.as_ref().map(|v| (outcome.name.as_str(), v)))
            .collect();
        if let Err(message) = validator(&members) {
            debug!(group = %group.name, %message, "group constraint failed");
            failures.push(ValidationFailure {
                name: group.name.clone(),
                message,
            });
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(BindError::Validation { failures })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests panic to surface validation mistakes"
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limited_choice_bounds_are_inclusive() {
        let at_most_one = limited_choice(0, 1);
        let value = json!(true);
        assert!(at_most_one(&[]).is_ok());
        assert!(at_most_one(&[("car", &value)]).is_ok());
        assert!(at_most_one(&[("car", &value), ("motorcycle", &value)]).is_err());
    }

    #[test]
    fn exactly_one_reports_the_member_names() {
        let exactly_one = limited_choice(1, 1);
        let value = json!(1);
        let message = exactly_one(&[("a", &value), ("b", &value)]).unwrap_err();
        assert!(message.contains("exactly 1"));
        assert!(message.contains("\"a\""));
    }
}
