//! Token-stream binding behaviour: flag matching, positional slots,
//! repetition rules and the end-of-options delimiter.
#![allow(
    clippy::unwrap_used,
    reason = "tests panic to surface binding mistakes"
)]

use argbind::{
    ArgKind, ArgSpec, BindError, CommandSpec, ResolveError, Resolver, StaticEnv, TypeDescriptor,
};
use rstest::rstest;
use serde_json::json;

fn resolver() -> Resolver {
    Resolver::new().env(StaticEnv::default())
}

fn three_ints() -> CommandSpec {
    CommandSpec::new()
        .arg(ArgSpec::new("a", TypeDescriptor::integer()).required())
        .arg(ArgSpec::new("b", TypeDescriptor::integer()).required())
        .arg(ArgSpec::new("c", TypeDescriptor::integer()).default(json!(0)))
}

fn bind_err(result: Result<argbind::BindResult, ResolveError>) -> BindError {
    match result {
        Err(ResolveError::Bind(err)) => err,
        Err(other) => panic!("expected a bind error, got {other}"),
        Ok(_) => panic!("expected a bind error, got a successful binding"),
    }
}

#[test]
fn keyword_out_of_order_interleaves_with_positionals() {
    let bound = resolver()
        .resolve(&three_ints(), ["--c", "3", "1", "2"])
        .unwrap();
    assert_eq!(bound.get("a"), Some(&json!(1)));
    assert_eq!(bound.get("b"), Some(&json!(2)));
    assert_eq!(bound.get("c"), Some(&json!(3)));
}

#[rstest]
#[case::positional(&["1", "2"])]
#[case::keyword(&["--a", "1", "--b", "2"])]
#[case::attached(&["--a=1", "--b=2"])]
#[case::mixed(&["1", "--b", "2"])]
fn positional_and_keyword_are_interchangeable(#[case] tokens: &[&str]) {
    let bound = resolver()
        .resolve(&three_ints(), tokens.iter().copied())
        .unwrap();
    assert_eq!(bound.get("a"), Some(&json!(1)));
    assert_eq!(bound.get("b"), Some(&json!(2)));
    assert_eq!(bound.get("c"), Some(&json!(0)));
}

#[test]
fn unknown_flags_fail_immediately() {
    let err = bind_err(resolver().resolve(&three_ints(), ["--nope", "1", "2"]));
    assert!(matches!(err, BindError::UnknownOption { token } if token == "--nope"));
}

#[test]
fn leftover_positionals_are_reported_together_at_end_of_stream() {
    let err = bind_err(resolver().resolve(&three_ints(), ["1", "2", "3", "4", "5"]));
    assert!(matches!(
        err,
        BindError::UnusedCliTokens { tokens } if tokens == vec!["4".to_owned(), "5".to_owned()]
    ));
}

#[test]
fn repeated_scalar_keywords_are_rejected() {
    let err = bind_err(resolver().resolve(&three_ints(), ["--a", "1", "--a", "2", "3"]));
    assert!(matches!(err, BindError::RepeatKeyword { name } if name == "--a"));
}

#[test]
fn attached_only_arguments_reject_space_separated_values() {
    let command =
        CommandSpec::new().arg(ArgSpec::new("mode", TypeDescriptor::string()).requires_attached_value());
    let err = bind_err(resolver().resolve(&command, ["--mode", "fast"]));
    assert!(matches!(err, BindError::RequiresEquals { name } if name == "--mode"));

    let bound = resolver().resolve(&command, ["--mode=fast"]).unwrap();
    assert_eq!(bound.get("mode"), Some(&json!("fast")));
}

#[test]
fn double_dash_turns_the_rest_positional() {
    let command = CommandSpec::new().arg(ArgSpec::new("pattern", TypeDescriptor::string()));
    let bound = resolver().resolve(&command, ["--", "--not-a-flag"]).unwrap();
    assert_eq!(bound.get("pattern"), Some(&json!("--not-a-flag")));
}

#[test]
fn dash_prefixed_numbers_are_values() {
    let bound = resolver().resolve(&three_ints(), ["-5", "-0x10"]).unwrap();
    assert_eq!(bound.get("a"), Some(&json!(-5)));
    assert_eq!(bound.get("b"), Some(&json!(-16)));
}

#[test]
fn one_flag_occurrence_may_consume_several_values() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("items", TypeDescriptor::list(TypeDescriptor::string()))
            .kind(ArgKind::KeywordOnly)
            .consume_multiple(),
    );
    let bound = resolver()
        .resolve(&command, ["--items", "a", "b", "c"])
        .unwrap();
    assert_eq!(bound.get("items"), Some(&json!(["a", "b", "c"])));
}

#[test]
fn flags_end_a_greedy_value_run() {
    let command = CommandSpec::new()
        .arg(
            ArgSpec::new("items", TypeDescriptor::list(TypeDescriptor::string()))
                .kind(ArgKind::KeywordOnly)
                .consume_multiple(),
        )
        .arg(ArgSpec::new("verbose", TypeDescriptor::boolean()).kind(ArgKind::KeywordOnly));
    let bound = resolver()
        .resolve(&command, ["--items", "a", "b", "--verbose"])
        .unwrap();
    assert_eq!(bound.get("items"), Some(&json!(["a", "b"])));
    assert_eq!(bound.get("verbose"), Some(&json!(true)));
}

#[test]
fn short_aliases_match_exactly() {
    let command = CommandSpec::new()
        .arg(ArgSpec::new("output", TypeDescriptor::path()).short('o').kind(ArgKind::KeywordOnly));
    let bound = resolver().resolve(&command, ["-o", "out.txt"]).unwrap();
    assert_eq!(bound.get("output"), Some(&json!("out.txt")));
}

#[test]
fn counting_flags_count_occurrences() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("verbose", TypeDescriptor::integer())
            .counted()
            .short('v')
            .kind(ArgKind::KeywordOnly),
    );
    let bound = resolver().resolve(&command, ["-v", "-v", "--verbose"]).unwrap();
    assert_eq!(bound.get("verbose"), Some(&json!(3)));

    let bound = resolver().resolve(&command, ["-vvv"]).unwrap();
    assert_eq!(bound.get("verbose"), Some(&json!(3)));

    let bound = resolver().resolve(&command, Vec::<String>::new()).unwrap();
    assert_eq!(bound.get("verbose"), None);
}

#[rstest]
#[case::bare(&["--verbose"], true)]
#[case::negated(&["--no-verbose"], false)]
#[case::spelled_out(&["--verbose=false"], false)]
#[case::double_negative(&["--no-verbose=false"], true)]
#[case::last_wins(&["--verbose", "--no-verbose"], false)]
fn boolean_flag_forms(#[case] tokens: &[&str], #[case] expected: bool) {
    let command = CommandSpec::new().arg(ArgSpec::new("verbose", TypeDescriptor::boolean()));
    let bound = resolver().resolve(&command, tokens.iter().copied()).unwrap();
    assert_eq!(bound.get("verbose"), Some(&json!(expected)));
}

#[test]
fn var_keyword_collects_unmatched_flags() {
    let command = CommandSpec::new()
        .arg(ArgSpec::new("a", TypeDescriptor::integer()))
        .arg(ArgSpec::new("extras", TypeDescriptor::string()).kind(ArgKind::VarKeyword));
    let bound = resolver()
        .resolve(&command, ["--a", "1", "--color", "red", "--label=x"])
        .unwrap();
    assert_eq!(bound.get("a"), Some(&json!(1)));
    assert_eq!(bound.get("extras"), Some(&json!({"color": "red", "label": "x"})));
}

#[test]
fn missing_flag_value_names_the_flag() {
    let err = bind_err(resolver().resolve(&three_ints(), ["1", "2", "--c"]));
    assert!(matches!(err, BindError::MissingArgument { name } if name == "--c"));
}
