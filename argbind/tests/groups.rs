//! Per-argument validators and group constraints.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "tests panic to surface binding mistakes"
)]

use std::sync::Arc;

use argbind::{
    ArgKind, ArgSpec, BindError, CommandSpec, GroupSpec, ResolveError, Resolver, SchemaError,
    StaticEnv, TypeDescriptor,
};
use serde_json::json;

fn resolver() -> Resolver {
    Resolver::new().env(StaticEnv::default())
}

fn vehicle_command() -> CommandSpec {
    CommandSpec::new()
        .group(GroupSpec::new("vehicle").limited_choice(0, 1))
        .arg(
            ArgSpec::new("car", TypeDescriptor::boolean())
                .kind(ArgKind::KeywordOnly)
                .group("vehicle"),
        )
        .arg(
            ArgSpec::new("motorcycle", TypeDescriptor::boolean())
                .kind(ArgKind::KeywordOnly)
                .group("vehicle"),
        )
}

#[test]
fn mutually_exclusive_members_reject_both() {
    let err = resolver()
        .resolve(&vehicle_command(), ["--car", "--motorcycle"])
        .unwrap_err();
    match err {
        ResolveError::Bind(BindError::Validation { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].name, "vehicle");
        }
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn one_member_or_none_is_fine() {
    let bound = resolver().resolve(&vehicle_command(), ["--car"]).unwrap();
    assert_eq!(bound.get("car"), Some(&json!(true)));

    resolver()
        .resolve(&vehicle_command(), Vec::<String>::new())
        .unwrap();
}

#[test]
fn defaulted_members_do_not_count_toward_the_constraint() {
    let command = CommandSpec::new()
        .group(GroupSpec::new("vehicle").limited_choice(0, 1))
        .arg(
            ArgSpec::new("car", TypeDescriptor::boolean())
                .kind(ArgKind::KeywordOnly)
                .default(json!(true))
                .group("vehicle"),
        )
        .arg(
            ArgSpec::new("motorcycle", TypeDescriptor::boolean())
                .kind(ArgKind::KeywordOnly)
                .group("vehicle"),
        );
    // `car`'s default is present in the result but was not supplied.
    let bound = resolver().resolve(&command, ["--motorcycle"]).unwrap();
    assert_eq!(bound.get("car"), Some(&json!(true)));
    assert_eq!(bound.get("motorcycle"), Some(&json!(true)));
}

#[test]
fn exactly_one_constraints_reject_silence() {
    let command = CommandSpec::new()
        .group(GroupSpec::new("output").limited_choice(1, 1))
        .arg(
            ArgSpec::new("text", TypeDescriptor::boolean())
                .kind(ArgKind::KeywordOnly)
                .group("output"),
        )
        .arg(
            ArgSpec::new("json", TypeDescriptor::boolean())
                .kind(ArgKind::KeywordOnly)
                .group("output"),
        );
    let err = resolver().resolve(&command, Vec::<String>::new()).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Bind(BindError::Validation { failures })
            if failures[0].name == "output" && failures[0].message.contains("exactly 1")
    ));
}

#[test]
fn per_argument_validators_see_the_final_value() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("port", TypeDescriptor::integer()).validator(Arc::new(|value| {
            match value.as_i64() {
                Some(1..=65535) => Ok(()),
                _ => Err("port must be in 1..=65535".to_owned()),
            }
        })),
    );

    resolver().resolve(&command, ["--port", "8080"]).unwrap();

    let err = resolver().resolve(&command, ["--port", "0"]).unwrap_err();
    match err {
        ResolveError::Bind(BindError::Validation { failures }) => {
            assert_eq!(failures[0].name, "port");
            assert!(failures[0].message.contains("65535"));
        }
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn all_validation_failures_are_reported_together() {
    let positive = |name: &'static str| {
        ArgSpec::new(name, TypeDescriptor::integer()).validator(Arc::new(|value| {
            if value.as_i64().unwrap_or(-1) >= 0 {
                Ok(())
            } else {
                Err("must be non-negative".to_owned())
            }
        }))
    };
    let command = CommandSpec::new().arg(positive("a")).arg(positive("b"));
    let err = resolver()
        .resolve(&command, ["--a", "-1", "--b", "-2"])
        .unwrap_err();
    match err {
        ResolveError::Bind(BindError::Validation { failures }) => {
            let names: Vec<&str> = failures.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["a", "b"]);
        }
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn referencing_an_undeclared_group_is_a_schema_error() {
    let command = CommandSpec::new()
        .arg(ArgSpec::new("car", TypeDescriptor::boolean()).group("vehicle"));
    let err = resolver().resolve(&command, Vec::<String>::new()).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Schema(SchemaError::UnknownGroup { argument, group })
            if argument == "car" && group == "vehicle"
    ));
}
