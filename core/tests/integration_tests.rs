use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use option_schema_core::*;
use rust_decimal::Decimal;

fn isolated() -> Arc<Environment> {
    Arc::new(Environment::isolated())
}

fn strings() -> Arc<Schema> {
    Schema::builder("Strings")
        .option(OptionDecl::new("string", ValueType::String))
        .option(OptionDecl::new("stringWithDefault", ValueType::String).default_value("default"))
        .option(OptionDecl::new("listOfString", ValueType::list(ValueType::String)))
        .build()
}

fn nested_options() -> Arc<Schema> {
    let strings = strings();
    Schema::builder("NestedOptions")
        .option(OptionDecl::new("source", ValueType::nested(&strings)))
        .option(OptionDecl::new("target", ValueType::nested(&strings)))
        .extension(Arc::new(EnvironmentVariables))
        .extension(Arc::new(ArgumentsEquals))
        .build()
}

// ---------------------------------------------------------------------------
// Builder basics
// ---------------------------------------------------------------------------

#[test]
fn strings_prefill_default_and_reset() {
    let options = OptionsFactory::builder(&strings())
        .value("string", "localhost")
        .environment(isolated())
        .create()
        .unwrap();
    assert_eq!(options.get("string").unwrap(), Some(Value::from("localhost")));
    assert_eq!(options.get("stringWithDefault").unwrap(), Some(Value::from("default")));

    let mut builder = options.to_builder();
    assert_eq!(builder.reset_value("string").unwrap(), Some(Value::from("localhost")));
    builder.reset_value("stringWithDefault").unwrap();
    let rebuilt = builder.build().unwrap();
    assert_eq!(rebuilt.get("string").unwrap(), None);
    assert_eq!(rebuilt.get("stringWithDefault").unwrap(), Some(Value::from("default")));
    assert!(rebuilt.is_valid());
}

#[test]
fn unknown_keys_are_rejected() {
    let err = OptionsFactory::builder(&strings())
        .value("nope", 1)
        .environment(isolated())
        .create()
        .unwrap_err();
    assert!(matches!(err, OptionsError::InvalidKey { ref key, .. } if key == "nope"));

    let options = OptionsFactory::builder(&strings()).environment(isolated()).create().unwrap();
    assert!(matches!(options.get("nope"), Err(OptionsError::InvalidKey { .. })));
    assert!(!options.contains("nope"));
    assert!(options.contains("STRING_WITH_DEFAULT"));
}

#[test]
fn cli_arguments_example() {
    let schema = Schema::builder("Primitives")
        .option(OptionDecl::new("primitiveInt", ValueType::Int).primitive())
        .option(OptionDecl::new("string", ValueType::String))
        .extension(Arc::new(ArgumentsEquals))
        .build();
    let options = OptionsFactory::builder(&schema)
        .args(["--primitiveInt=1", "--string=test"])
        .environment(isolated())
        .create()
        .unwrap();
    assert_eq!(options.get_as::<i32>("primitiveInt").unwrap(), Some(1));
    assert_eq!(options.get_as::<String>("string").unwrap().as_deref(), Some("test"));
}

// ---------------------------------------------------------------------------
// Nested options
// ---------------------------------------------------------------------------

#[test]
fn nested_prefill_from_json() {
    let options = OptionsFactory::builder(&nested_options())
        .json_values(serde_json::json!({
            "source": {"string": "text"},
            "target": {"listOfString": ["x", "y", "z"]}
        }))
        .unwrap()
        .environment(isolated())
        .create()
        .unwrap();

    assert_eq!(options.get_path(&["source", "string"]).unwrap(), Some(Value::from("text")));
    assert_eq!(
        options.nested("target").unwrap().get_as::<Vec<String>>("listOfString").unwrap(),
        Some(vec!["x".to_string(), "y".to_string(), "z".to_string()])
    );
    assert_eq!(
        options.get_path(&["source", "stringWithDefault"]).unwrap(),
        Some(Value::from("default"))
    );
    assert_eq!(options.get_path(&["target", "string"]).unwrap(), None);
    assert_eq!(options.get_path(&["source", "listOfString"]).unwrap(), None);
}

#[test]
fn nested_values_from_environment_and_arguments() {
    let env = Arc::new(Environment::with_vars([
        ("SOURCE__STRING", "from-env"),
        ("TARGET__LIST_OF_STRING", "a\\,b,c"),
    ]));
    let options = OptionsFactory::builder(&nested_options())
        .args(["--target.string=from-args"])
        .environment(env)
        .create()
        .unwrap();

    assert_eq!(options.get_path(&["source", "string"]).unwrap(), Some(Value::from("from-env")));
    assert_eq!(options.get_path(&["target", "string"]).unwrap(), Some(Value::from("from-args")));
    assert_eq!(
        options.get_path(&["target", "listOfString"]).unwrap(),
        Some(Value::from(vec!["a,b", "c"]))
    );
}

#[test]
fn nested_value_must_be_a_map() {
    let err = OptionsFactory::builder(&nested_options())
        .value("source", "flat")
        .environment(isolated())
        .create()
        .unwrap_err();
    assert!(matches!(err, OptionsError::TypeMismatch { .. }));
}

#[test]
fn nested_snapshot_resolves_to_map() {
    let options = OptionsFactory::builder(&nested_options())
        .args(["--source.string=s"])
        .environment(isolated())
        .create()
        .unwrap();
    let source = options.get("source").unwrap().unwrap();
    let map = source.as_map().unwrap();
    assert_eq!(map.get("string"), Some(&Value::from("s")));
    assert_eq!(map.get("stringWithDefault"), Some(&Value::from("default")));
    assert_eq!(
        options.to_string(),
        "NestedOptions{source=Strings{string=s, stringWithDefault=default}, \
         target=Strings{stringWithDefault=default}}"
    );
}

// ---------------------------------------------------------------------------
// Priority law
// ---------------------------------------------------------------------------

#[test]
fn arguments_beat_environment_beat_prefill() {
    let schema = Schema::builder("Ranked")
        .option(OptionDecl::new("a", ValueType::String))
        .option(OptionDecl::new("b", ValueType::String))
        .option(OptionDecl::new("c", ValueType::String))
        .extension(Arc::new(ArgumentsEquals))
        .extension(Arc::new(EnvironmentVariables))
        .build();
    let env = Arc::new(Environment::with_vars([("A", "env"), ("B", "env")]));
    let options = OptionsFactory::builder(&schema)
        .value("a", "prefill")
        .value("b", "prefill")
        .value("c", "prefill")
        .args(["--a=args"])
        .environment(env)
        .create()
        .unwrap();

    assert_eq!(options.get("a").unwrap(), Some(Value::from("args")));
    assert_eq!(options.get("b").unwrap(), Some(Value::from("env")));
    assert_eq!(options.get("c").unwrap(), Some(Value::from("prefill")));
}

#[test]
fn explicit_values_survive_rebuild() {
    let schema = nested_options();
    let env = Arc::new(Environment::with_vars([("SOURCE__STRING", "env")]));
    let options = OptionsFactory::builder(&schema).environment(env).create().unwrap();

    let mut builder = options.to_builder();
    builder.set_path(&["source", "string"], "explicit").unwrap();
    let rebuilt = builder.build().unwrap();
    assert_eq!(rebuilt.get_path(&["source", "string"]).unwrap(), Some(Value::from("explicit")));
    assert_eq!(
        rebuilt.nested("source").unwrap().origin("string").unwrap(),
        Some(Origin::Explicit)
    );
}

// ---------------------------------------------------------------------------
// Withers
// ---------------------------------------------------------------------------

#[test]
fn wither_law() {
    let schema = Schema::builder("Server")
        .option(OptionDecl::new("host", ValueType::String).default_value("localhost"))
        .option(OptionDecl::new("port", ValueType::Int).default_value(8080))
        .wither(WitherDecl::new("port", ValueType::Int, "Server"))
        .build();
    let a = OptionsFactory::builder(&schema).environment(isolated()).create().unwrap();
    let b = a.wither("port", 9090).unwrap();

    assert_eq!(b.get_as::<i32>("port").unwrap(), Some(9090));
    assert_ne!(a, b);
    assert_eq!(a.get_as::<i32>("port").unwrap(), Some(8080));
    assert_eq!(b.get("host").unwrap(), a.get("host").unwrap());
    assert!(matches!(
        a.wither("host", "x"),
        Err(OptionsError::WitherUnavailable { .. })
    ));
}

// ---------------------------------------------------------------------------
// Schema composition
// ---------------------------------------------------------------------------

#[test]
fn diamond_conflict_and_alias_union() {
    let left = Schema::builder("Left")
        .option(OptionDecl::new("value", ValueType::Int).alias("LEFT_VALUE"))
        .build();
    let right_same = Schema::builder("RightSame")
        .option(OptionDecl::new("value", ValueType::Int).alias("RIGHT_VALUE"))
        .build();
    let right_other = Schema::builder("RightOther")
        .option(OptionDecl::new("value", ValueType::String))
        .build();

    let merged = Schema::builder("Merged").extends(&left).extends(&right_same).build();
    let defs = merged.definitions().unwrap();
    let keys: BTreeSet<&str> = defs
        .get("value")
        .unwrap()
        .keys()
        .iter()
        .map(String::as_str)
        .collect();
    assert!(keys.contains("LEFT_VALUE") && keys.contains("RIGHT_VALUE"));

    let conflicting = Schema::builder("Conflicting").extends(&left).extends(&right_other).build();
    assert!(matches!(
        conflicting.definitions(),
        Err(OptionsError::SchemaConflict { .. })
    ));
    let err = OptionsFactory::create(&conflicting, Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, OptionsError::SchemaConflict { .. }));
}

#[test]
fn alias_lookup_through_environment() {
    let schema = Schema::builder("Aliased")
        .option(OptionDecl::new("host", ValueType::String).alias("DB_HOST"))
        .extension(Arc::new(EnvironmentVariables))
        .build();
    let env = Arc::new(Environment::with_vars([("DB_HOST", "aliased")]));
    let options = OptionsFactory::builder(&schema).environment(env).create().unwrap();
    assert_eq!(options.get("DB_HOST").unwrap(), Some(Value::from("aliased")));
}

#[test]
fn two_exclusive_argument_extensions_are_illegal() {
    let schema = Schema::builder("TwoArgs")
        .option(OptionDecl::new("x", ValueType::String))
        .extension(Arc::new(ArgumentsEquals))
        .extension(Arc::new(ArgumentsSpace))
        .build();
    let err = OptionsFactory::builder(&schema)
        .environment(isolated())
        .create()
        .unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, OptionsError::IllegalExtension(_)));
    assert!(message.contains("ArgumentsEquals") && message.contains("ArgumentsSpace"));
}

#[test]
fn dynamic_extension_cannot_duplicate_declared_exclusive_stage() {
    let err = OptionsFactory::builder(&nested_options())
        .extension(Arc::new(ArgumentsSpace))
        .environment(isolated())
        .create()
        .unwrap_err();
    assert!(matches!(err, OptionsError::IllegalExtension(_)));
}

#[test]
fn dynamic_argument_extension_on_bare_schema() {
    let options = OptionsFactory::builder(&strings())
        .extension(Arc::new(ArgumentsSpace))
        .args(["--string", "dynamic"])
        .environment(isolated())
        .create()
        .unwrap();
    assert_eq!(options.get("string").unwrap(), Some(Value::from("dynamic")));
    assert_eq!(options.dynamic_extensions().len(), 1);

    let copy = OptionsFactory::clone_options(&options).unwrap();
    assert_eq!(copy, options);
}

// ---------------------------------------------------------------------------
// Environment file
// ---------------------------------------------------------------------------

#[test]
fn env_file_argument_loads_below_environment() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("app.env");
    std::fs::write(&file, "# comment\n\nA=file\nB=file\nbroken line\n").unwrap();

    let schema = Schema::builder("FileBacked")
        .option(OptionDecl::new("a", ValueType::String))
        .option(OptionDecl::new("b", ValueType::String))
        .extension(Arc::new(EnvironmentFile::new()))
        .extension(Arc::new(EnvironmentVariables))
        .extension(Arc::new(ArgumentsEquals))
        .build();
    let env = Arc::new(Environment::with_vars([("B", "env")]));
    let options = OptionsFactory::builder(&schema)
        .args([format!("--envFile={}", file.display())])
        .environment(env.clone())
        .create()
        .unwrap();

    assert_eq!(options.get("a").unwrap(), Some(Value::from("file")));
    assert_eq!(options.get("b").unwrap(), Some(Value::from("env")));
    assert!(env.var("A").is_none());
}

#[test]
fn missing_env_file_is_skipped() {
    let schema = Schema::builder("FileBacked")
        .option(OptionDecl::new("a", ValueType::String))
        .extension(Arc::new(EnvironmentFile::at("/nonexistent/.env")))
        .build();
    let options = OptionsFactory::builder(&schema).environment(isolated()).create().unwrap();
    assert_eq!(options.get("a").unwrap(), None);
}

// ---------------------------------------------------------------------------
// Defaults and validation
// ---------------------------------------------------------------------------

#[test]
fn dependent_default_reads_other_options() {
    let schema = Schema::builder("Jdbc")
        .option(OptionDecl::new("host", ValueType::String))
        .option(OptionDecl::new("port", ValueType::Int).default_value(3306))
        .option(OptionDecl::new("url", ValueType::String).default_with(|view| {
            let host: String = view.require("host")?;
            let port: i32 = view.require("port")?;
            Ok(Value::from(format!("jdbc:mysql://{host}:{port}")))
        }))
        .build();

    let options = OptionsFactory::builder(&schema)
        .value("host", "db")
        .environment(isolated())
        .create()
        .unwrap();
    assert_eq!(options.get("url").unwrap(), Some(Value::from("jdbc:mysql://db:3306")));

    let moved = options.with_value("port", 5432).unwrap();
    assert_eq!(moved.get("url").unwrap(), Some(Value::from("jdbc:mysql://db:5432")));

    let missing = OptionsFactory::builder(&schema).environment(isolated()).create().unwrap();
    assert!(matches!(missing.get("url"), Err(OptionsError::DefaultValue { .. })));
}

#[test]
fn constraint_violations_are_aggregated() {
    let schema = Schema::builder("Constrained")
        .option(OptionDecl::new("name", ValueType::String).constraint(Constraint::size(2, 4)))
        .option(
            OptionDecl::new("ratio", ValueType::Decimal)
                .constraint(Constraint::decimal_max(Decimal::ONE, false)),
        )
        .option(
            OptionDecl::new("code", ValueType::String)
                .constraint(Constraint::pattern("[A-Z]{3}").unwrap()),
        )
        .option(OptionDecl::new("tags", ValueType::set(ValueType::String)).constraint(Constraint::not_empty()))
        .build();

    let options = OptionsFactory::builder(&schema)
        .value("name", "toolong")
        .value("ratio", "1.0")
        .value("code", "ABC")
        .value("tags", "")
        .environment(isolated())
        .create()
        .unwrap();

    let kinds: Vec<ConstraintKind> = options.validate().iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![ConstraintKind::Size, ConstraintKind::DecimalMax, ConstraintKind::NotEmpty]
    );

    let err = options.validated().unwrap_err();
    assert!(err.to_string().starts_with("3 options validation failed:"));
}

// ---------------------------------------------------------------------------
// Coercion round trips
// ---------------------------------------------------------------------------

#[test]
fn rendered_values_parse_back() {
    let level = EnumType::new("Level", ["LOW", "HIGH"]);
    let cases = [
        (ValueType::Bool, Value::Bool(true)),
        (ValueType::Byte, Value::Byte(-8)),
        (ValueType::Long, Value::Long(i64::MAX)),
        (ValueType::Double, Value::Double(2.5)),
        (ValueType::Char, Value::Char('x')),
        (ValueType::Decimal, Value::Decimal(Decimal::new(12345, 2))),
        (ValueType::Enum(level), Value::Enum("HIGH".to_string())),
        (
            ValueType::LocalDate,
            Value::LocalDate(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
        ),
        (
            ValueType::LocalDateTime,
            Value::LocalDateTime(
                NaiveDateTime::parse_from_str("2024-02-29 13:45:10", "%Y-%m-%d %H:%M:%S").unwrap(),
            ),
        ),
        (
            ValueType::list(ValueType::String),
            Value::from(vec!["a,b", "c\\d"]),
        ),
    ];

    let parser = DefaultParser;
    for (value_type, value) in cases {
        let parsed = parser.parse(&value_type, &value.render()).unwrap();
        assert_eq!(parsed, value, "round trip of {value_type}");
    }
}

// ---------------------------------------------------------------------------
// Snapshot equality, numeric bounds and escaping
// ---------------------------------------------------------------------------

#[test]
fn equal_values_from_different_sources_are_equal_snapshots() {
    let prefilled = OptionsFactory::builder(&nested_options())
        .json_values(serde_json::json!({"source": {"string": "h"}}))
        .unwrap()
        .environment(isolated())
        .create()
        .unwrap();
    let loaded = OptionsFactory::builder(&nested_options())
        .environment(Arc::new(Environment::with_vars([("SOURCE__STRING", "h")])))
        .create()
        .unwrap();
    let other = OptionsFactory::builder(&nested_options())
        .environment(Arc::new(Environment::with_vars([("TARGET__STRING", "h")])))
        .create()
        .unwrap();

    assert_eq!(prefilled, loaded);
    assert_ne!(prefilled, other);
    let set: HashSet<Options> = [prefilled, loaded, other].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn floating_values_outside_decimal_range_violate_bounds() {
    let schema = Schema::builder("Bounded")
        .option(OptionDecl::new("high", ValueType::Double).constraint(Constraint::max(65535)))
        .option(OptionDecl::new("low", ValueType::Double).constraint(Constraint::min(0)))
        .option(OptionDecl::new("fine", ValueType::Double).constraint(Constraint::max(65535)))
        .build();
    let options = OptionsFactory::builder(&schema)
        .value("high", Value::Double(1e30))
        .value("low", Value::Double(-1e-30))
        .value("fine", Value::Double(65535.0))
        .environment(isolated())
        .create()
        .unwrap();

    let violations: Vec<(String, ConstraintKind)> = options
        .validate()
        .iter()
        .map(|v| (v.path.to_string(), v.kind))
        .collect();
    assert_eq!(
        violations,
        vec![
            ("high".to_string(), ConstraintKind::Max),
            ("low".to_string(), ConstraintKind::Min),
        ]
    );
}

#[test]
fn backslashes_in_list_elements_survive_render_and_load() {
    let list = Value::from(vec!["a\\", "b", "c\\,d"]);
    let rendered = list.render();
    assert_eq!(
        DefaultParser.parse(&ValueType::list(ValueType::String), &rendered).unwrap(),
        list
    );

    let options = OptionsFactory::builder(&nested_options())
        .environment(Arc::new(Environment::with_vars([(
            "SOURCE__LIST_OF_STRING",
            rendered.as_str(),
        )])))
        .create()
        .unwrap();
    assert_eq!(options.get_path(&["source", "listOfString"]).unwrap(), Some(list));
}
