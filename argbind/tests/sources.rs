//! Source precedence: CLI over environment over config sources over
//! declared defaults, decided independently per argument.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "tests panic to surface binding mistakes"
)]

use std::io::Write;

use anyhow::Result;
use argbind::{
    ArgKind, ArgSpec, BindError, CommandSpec, FieldSpec, FigmentSource, JsonSource, Overrides,
    Provenance, ResolveError, Resolver, StaticEnv, StructSchema, TypeDescriptor,
};
use figment::Figment;
use figment::providers::{Format, Toml};
use serde_json::json;

fn precedence_command() -> CommandSpec {
    CommandSpec::new()
        .arg(
            ArgSpec::new("level", TypeDescriptor::integer())
                .env_var("APP_LEVEL")
                .default(json!(4)),
        )
        .arg(ArgSpec::new("other", TypeDescriptor::string()).default(json!("untouched")))
}

fn config() -> JsonSource {
    JsonSource::new(json!({"level": 3, "other": "from-config"}))
}

#[test]
fn cli_beats_every_other_source() {
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_LEVEL", "2")]))
        .source(config())
        .resolve(&precedence_command(), ["--level", "1"])
        .unwrap();
    assert_eq!(bound.get("level"), Some(&json!(1)));
    assert_eq!(bound.provenance("level"), Some(Provenance::Cli));
    // Precedence is per argument: the sibling still reads from config.
    assert_eq!(bound.get("other"), Some(&json!("from-config")));
    assert_eq!(bound.provenance("other"), Some(Provenance::Config));
}

#[test]
fn environment_beats_config_and_defaults() {
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_LEVEL", "2")]))
        .source(config())
        .resolve(&precedence_command(), Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("level"), Some(&json!(2)));
    assert_eq!(bound.provenance("level"), Some(Provenance::Env));
}

#[test]
fn config_beats_defaults() {
    let bound = Resolver::new()
        .env(StaticEnv::default())
        .source(config())
        .resolve(&precedence_command(), Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("level"), Some(&json!(3)));
    assert!(bound.is_supplied("level"));
}

#[test]
fn defaults_apply_last_and_do_not_count_as_supplied() {
    let bound = Resolver::new()
        .env(StaticEnv::default())
        .resolve(&precedence_command(), Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("level"), Some(&json!(4)));
    assert!(!bound.is_supplied("level"));
    assert_eq!(bound.provenance("level"), Some(Provenance::Default));
}

#[test]
fn json_files_load_into_an_in_memory_source() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{"level": 5, "other": "from-file"}}"#)?;
    let root: serde_json::Value = serde_json::from_reader(std::fs::File::open(file.path())?)?;

    let bound = Resolver::new()
        .env(StaticEnv::default())
        .source(JsonSource::new(root))
        .resolve(&precedence_command(), Vec::<String>::new())?;
    assert_eq!(bound.get("level"), Some(&json!(5)));
    assert_eq!(bound.get("other"), Some(&json!("from-file")));
    Ok(())
}

#[test]
fn earlier_config_sources_win() {
    let bound = Resolver::new()
        .env(StaticEnv::default())
        .source(JsonSource::new(json!({"level": 10})))
        .source(config())
        .resolve(&precedence_command(), Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("level"), Some(&json!(10)));
    // The first source had nothing for the sibling; the next one answers.
    assert_eq!(bound.get("other"), Some(&json!("from-config")));
}

#[test]
fn container_env_values_split_on_whitespace() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("items", TypeDescriptor::list(TypeDescriptor::string())).env_var("APP_ITEMS"),
    );
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_ITEMS", "a b c")]))
        .resolve(&command, Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("items"), Some(&json!(["a", "b", "c"])));
}

#[test]
fn json_env_values_decode_structurally() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("ports", TypeDescriptor::list(TypeDescriptor::integer())).env_var("APP_PORTS"),
    );
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_PORTS", "[8080, 443]")]))
        .resolve(&command, Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("ports"), Some(&json!([8080, 443])));
}

#[test]
fn path_list_env_values_split_on_the_path_separator() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("dirs", TypeDescriptor::list(TypeDescriptor::path())).env_var("APP_DIRS"),
    );
    let raw = if cfg!(windows) { "/a;/b c" } else { "/a:/b c" };
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_DIRS", raw)]))
        .resolve(&command, Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("dirs"), Some(&json!(["/a", "/b c"])));
}

#[test]
fn counting_flags_read_a_count_from_the_environment() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("verbose", TypeDescriptor::integer())
            .counted()
            .kind(ArgKind::KeywordOnly)
            .env_var("APP_VERBOSE"),
    );
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_VERBOSE", "3")]))
        .resolve(&command, Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("verbose"), Some(&json!(3)));
    assert_eq!(bound.provenance("verbose"), Some(Provenance::Env));
}

#[test]
fn non_integer_environment_counts_are_rejected() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("verbose", TypeDescriptor::integer())
            .counted()
            .kind(ArgKind::KeywordOnly)
            .env_var("APP_VERBOSE"),
    );
    let err = Resolver::new()
        .env(StaticEnv::new([("APP_VERBOSE", "loud")]))
        .resolve(&command, Vec::<String>::new())
        .unwrap_err();
    match err {
        ResolveError::Bind(BindError::Coercion { name, value, .. }) => {
            assert_eq!(name, "--verbose");
            assert_eq!(value.as_deref(), Some("loud"));
        }
        other => panic!("expected a coercion error, got {other}"),
    }
}

#[test]
fn env_prefix_derives_variable_names_for_struct_fields() {
    let user = StructSchema::new("User")
        .field(FieldSpec::required("id", TypeDescriptor::integer()))
        .into_descriptor();
    let command = CommandSpec::new()
        .overrides(Overrides {
            env_prefix: Some("APP_".into()),
            ..Overrides::default()
        })
        .arg(ArgSpec::new("user", user).required());
    let bound = Resolver::new()
        .env(StaticEnv::new([("APP_USER_ID", "7")]))
        .resolve(&command, Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("user"), Some(&json!({"id": 7})));
}

#[test]
fn first_set_env_candidate_wins() {
    let command = CommandSpec::new().arg(
        ArgSpec::new("level", TypeDescriptor::integer())
            .env_var("APP_LEVEL")
            .env_var("LEVEL"),
    );
    let bound = Resolver::new()
        .env(StaticEnv::new([("LEVEL", "9"), ("APP_LEVEL", "2")]))
        .resolve(&command, Vec::<String>::new())
        .unwrap();
    assert_eq!(bound.get("level"), Some(&json!(2)));
}

#[test]
fn figment_files_feed_structured_arguments() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "app.toml",
            r#"
                level = 6

                [user]
                id = 42
            "#,
        )?;
        let user = StructSchema::new("User")
            .field(FieldSpec::required("id", TypeDescriptor::integer()))
            .into_descriptor();
        let command = CommandSpec::new()
            .arg(ArgSpec::new("level", TypeDescriptor::integer()))
            .arg(ArgSpec::new("user", user).required());

        let bound = Resolver::new()
            .env(StaticEnv::default())
            .source(FigmentSource::new(Figment::new().merge(Toml::file("app.toml"))))
            .resolve(&command, Vec::<String>::new())
            .expect("binding from the jailed config file succeeds");
        assert_eq!(bound.get("level"), Some(&json!(6)));
        assert_eq!(bound.get("user"), Some(&json!({"id": 42})));
        Ok(())
    });
}
