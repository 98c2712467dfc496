use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Runs `options-inspect` in `dir` with a controlled environment.
fn inspect(dir: &Path, args: &[&str], vars: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_options-inspect"));
    command
        .current_dir(dir)
        .args(args)
        .env_remove("ENV_FILE")
        .env_remove("RUST_LOG");
    for (name, value) in vars {
        command.env(name, value);
    }
    command.output().expect("failed to run options-inspect")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const COMPLETE_PRIMARY: &[(&str, &str)] = &[
    ("PRIMARYDB__HOST", "primary.local"),
    ("PRIMARYDB__TYPE", "mysql"),
    ("PRIMARYDB__USERNAME", "app"),
    ("PRIMARYDB__PASSWORD", "secret"),
    ("PRIMARYDB__DATABASE", "main"),
];

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[test]
fn definitions_json_lists_nested_paths() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(dir.path(), &["definitions", "--format", "json"], &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let paths: Vec<&str> = report
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["path"].as_str())
        .collect();
    assert!(paths.contains(&"primarydb"));
    assert!(paths.contains(&"primarydb.host"));
    assert!(paths.contains(&"secondarydb.port"));

    let port = report
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["path"] == "primarydb.port")
        .unwrap();
    assert_eq!(port["default"], "3306");
    assert_eq!(port["wither"], true);
}

#[test]
fn definitions_table_shows_keys() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(dir.path(), &["definitions"], &[]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("PATH"));
    assert!(text.contains("USERNAME"));
}

// ---------------------------------------------------------------------------
// Resolve
// ---------------------------------------------------------------------------

#[test]
fn resolve_merges_environment_and_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(
        dir.path(),
        &["resolve", "--format", "json", "--", "--primarydb.host=arg.local", "--secondarydb.port=5433"],
        COMPLETE_PRIMARY,
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["primarydb"]["host"], "arg.local");
    assert_eq!(json["primarydb"]["type"], "MYSQL");
    assert_eq!(json["primarydb"]["port"], 3306);
    assert_eq!(json["primarydb"]["url"], "jdbc:mysql://arg.local:3306/main");
    assert_eq!(json["secondarydb"]["port"], 5433);
    assert!(json["secondarydb"].get("host").is_none());
}

#[test]
fn resolve_space_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(
        dir.path(),
        &["resolve", "--space-args", "--", "--primarydb.port", "6000"],
        &[],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("primarydb.port = 6000"));
    assert!(stdout(&output).contains("primarydb.host = <unset>"));
}

#[test]
fn resolve_reads_env_file_below_real_environment() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".env"),
        "# demo\nPRIMARYDB__HOST=file.local\nPRIMARYDB__DATABASE=from-file\n",
    )
    .unwrap();

    let output = inspect(
        dir.path(),
        &["resolve", "--format", "json"],
        &[("PRIMARYDB__DATABASE", "from-env")],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["primarydb"]["host"], "file.local");
    assert_eq!(json["primarydb"]["database"], "from-env");
}

#[test]
fn resolve_env_file_argument_selects_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("custom.env"), "SECONDARYDB__HOST=custom.local\n").unwrap();

    let output = inspect(
        dir.path(),
        &["resolve", "--format", "yaml", "--", "--envFile=custom.env"],
        &[],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let yaml: serde_yaml::Value = serde_yaml::from_str(&stdout(&output)).unwrap();
    assert_eq!(yaml["secondarydb"]["host"].as_str(), Some("custom.local"));
}

#[test]
fn resolve_validate_fails_with_violations() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(
        dir.path(),
        &["resolve", "--validate", "--", "--primarydb.port=70000"],
        COMPLETE_PRIMARY,
    );
    assert!(!output.status.success());
    assert!(stdout(&output).contains("violation: Option 'port' is not valid: Max (primarydb.port)"));
    assert!(stderr(&output).contains("options validation failed"));
}

#[test]
fn resolve_rejects_malformed_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(dir.path(), &["resolve", "--", "primarydb.host=x"], &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid argument"));
}

#[test]
fn resolve_rejects_bad_enum_value() {
    let dir = tempfile::tempdir().unwrap();
    let output = inspect(
        dir.path(),
        &["resolve"],
        &[("SECONDARYDB__TYPE", "db2")],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not match any of the enum values"));
}
