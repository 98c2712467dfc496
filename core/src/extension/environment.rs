//! Environment variable loader.
//!
//! Every key of an option (canonical name, upper snake case form, aliases)
//! is looked up as a variable name. Nested options join each key of the
//! parent with each key of the child using `__`, so `primarydb.host` is read
//! from `PRIMARYDB__HOST` among others.
//!
//! A value of the form `$NAME` or `${NAME}` refers to another variable and is
//! resolved once; an unresolvable reference leaves the option untouched.

use std::sync::Arc;

use super::provider::EnvProvider;
use super::{ExtensionStage, OptionsExtension};
use crate::builder::OptionsBuilder;
use crate::definition::DefinitionSet;
use crate::error::Result;

/// Separator between the keys of a parent and a nested option.
pub const NESTED_SEPARATOR: &str = "__";

const ORIGIN: &str = "environment variable";

/// Loads option values from the builder's [`EnvProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVariables;

impl OptionsExtension for EnvironmentVariables {
    fn id(&self) -> &str {
        "EnvironmentVariables"
    }

    fn stage(&self) -> ExtensionStage {
        ExtensionStage::Environment
    }

    fn extend(&self, builder: &mut OptionsBuilder) -> Result<()> {
        let env = Arc::clone(builder.environment());
        load_variables(builder, env.as_ref(), ORIGIN, &|name| name.to_string())
    }
}

/// Variable name and option path of every lookup key, in definition order.
pub fn variable_keys(definitions: &DefinitionSet) -> Vec<(String, Vec<String>)> {
    let mut out = Vec::new();
    collect_keys(definitions, &[], &[], &mut out);
    out
}

fn collect_keys(
    definitions: &DefinitionSet,
    prefixes: &[String],
    path: &[String],
    out: &mut Vec<(String, Vec<String>)>,
) {
    for def in definitions {
        let names: Vec<String> = if prefixes.is_empty() {
            def.keys().iter().cloned().collect()
        } else {
            prefixes
                .iter()
                .flat_map(|prefix| {
                    def.keys()
                        .iter()
                        .map(move |key| format!("{prefix}{NESTED_SEPARATOR}{key}"))
                })
                .collect()
        };
        let mut def_path = path.to_vec();
        def_path.push(def.name().to_string());

        match def.children() {
            Some(children) => collect_keys(children, &names, &def_path, out),
            None => out.extend(names.into_iter().map(|name| (name, def_path.clone()))),
        }
    }
}

/// Resolves `$NAME` and `${NAME}` one level deep.
pub fn resolve_reference(env: &dyn EnvProvider, value: String) -> Option<String> {
    let reference = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .or_else(|| value.strip_prefix('$'))
        .filter(|name| !name.is_empty());
    match reference {
        Some(name) => env.var(name),
        None => Some(value),
    }
}

/// Loads every defined variable of `env` into `builder`. `describe` turns a
/// variable name into the source reported in logs.
pub(crate) fn load_variables(
    builder: &mut OptionsBuilder,
    env: &dyn EnvProvider,
    origin: &str,
    describe: &dyn Fn(&str) -> String,
) -> Result<()> {
    let definitions = Arc::clone(builder.definitions());
    for (name, path) in variable_keys(&definitions) {
        let Some(raw) = env.var(&name) else {
            continue;
        };
        let Some(value) = resolve_reference(env, raw) else {
            continue;
        };
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        builder.load(&path, &value, origin, &describe(&name))?;
    }
    Ok(())
}
