use std::collections::BTreeSet;

use clap::{Args, Parser, Subcommand};
use option_schema_core::{DefinitionReport, Options, OptionsFactory, ValidationFailure, Value, Violation};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod demo;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Table,
}

#[derive(Debug, Parser)]
#[command(name = "options-inspect")]
#[command(about = "Inspect option definitions and resolved values of the bundled demo schema")]
struct Cli {
    /// Log loader decisions at debug level.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the flattened option definitions.
    Definitions(DefinitionsArgs),
    /// Resolve options from the environment, `.env` and program arguments.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
struct DefinitionsArgs {
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
    /// Validate the resolved options and fail on violations.
    #[arg(long)]
    validate: bool,
    /// Read program arguments as `--name value` pairs instead of `--name=value`.
    #[arg(long)]
    space_args: bool,
    /// Program arguments handed to the options, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Definitions(args) => run_definitions(args),
        Command::Resolve(args) => run_resolve(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_definitions(args: DefinitionsArgs) -> Result<(), String> {
    let schema = demo::my_options(false);
    let definitions = schema.definitions().map_err(|e| e.to_string())?;
    let report = definitions.report();
    let text = match args.format {
        CliOutputFormat::Table => definitions_table(&report),
        format => serialize(&report, format)?,
    };
    println!("{text}");
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let schema = demo::my_options(args.space_args);
    debug!(args = ?args.args, "resolving options");
    let options = OptionsFactory::create(&schema, args.args).map_err(|e| e.to_string())?;

    let text = match args.format {
        CliOutputFormat::Table => values_table(&options)?,
        format => serialize(&options.to_json().map_err(|e| e.to_string())?, format)?,
    };
    println!("{text}");

    if args.validate {
        let violations = options.validate();
        if !violations.is_empty() {
            print_violations(&violations, args.format)?;
            return Err(ValidationFailure::new(violations).to_string());
        }
    }
    Ok(())
}

fn serialize<T: Serialize>(value: &T, format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        CliOutputFormat::Table => Err("table output is not supported here".to_string()),
    }
}

fn definitions_table(report: &[DefinitionReport]) -> String {
    let mut lines = vec![format!(
        "{:<24} {:<10} {:<10} {}",
        "PATH", "TYPE", "DEFAULT", "KEYS"
    )];
    for def in report {
        lines.push(format!(
            "{:<24} {:<10} {:<10} {}",
            def.path.to_string(),
            def.value_type,
            def.default.as_deref().unwrap_or("-"),
            def.keys.join(", ")
        ));
    }
    lines.join("\n")
}

fn values_table(options: &Options) -> Result<String, String> {
    let mut lines = Vec::new();
    collect_rows(options, "", &mut lines)?;
    Ok(lines.join("\n"))
}

fn collect_rows(options: &Options, prefix: &str, lines: &mut Vec<String>) -> Result<(), String> {
    for def in options.definitions().iter() {
        let path = format!("{prefix}{}", def.name());
        if def.is_nested() {
            let nested = options.nested(def.name()).map_err(|e| e.to_string())?;
            collect_rows(nested, &format!("{path}."), lines)?;
            continue;
        }
        let shown = match options.get(def.name()) {
            Ok(Some(Value::String(text))) => text,
            Ok(Some(value)) => value.to_string(),
            Ok(None) => "<unset>".to_string(),
            Err(e) => format!("<error: {e}>"),
        };
        lines.push(format!("{path} = {shown}"));
    }
    Ok(())
}

fn print_violations(violations: &BTreeSet<Violation>, format: CliOutputFormat) -> Result<(), String> {
    match format {
        CliOutputFormat::Table => {
            for violation in violations {
                println!("violation: {} ({})", violation.message, violation.path);
            }
        }
        format => println!("{}", serialize(violations, format)?),
    }
    Ok(())
}
