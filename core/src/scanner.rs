//! Option definition registry.
//!
//! Flattens a schema and its ancestors into one [`DefinitionSet`]. Options
//! declared on a schema shadow inherited ones; options reaching the schema
//! from more than one parent must be strongly equal and are merged.
//!
//! # Example
//!
//! ```
//! use option_schema_core::*;
//!
//! let left = Schema::builder("Left")
//!     .option(OptionDecl::new("name", ValueType::String).alias("LEFT_NAME"))
//!     .build();
//! let right = Schema::builder("Right")
//!     .option(OptionDecl::new("name", ValueType::String).alias("RIGHT_NAME"))
//!     .build();
//! let both = Schema::builder("Both").extends(&left).extends(&right).build();
//!
//! let definitions = both.definitions().unwrap();
//! let name = definitions.get("name").unwrap();
//! assert!(name.keys().contains("LEFT_NAME"));
//! assert!(name.keys().contains("RIGHT_NAME"));
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::definition::{DefinitionSet, OptionDef, upper_snake_case};
use crate::error::{OptionsError, Result};
use crate::path::OptionPath;
use crate::schema::{OptionDecl, RESERVED_NAMES, Schema, WitherDecl};

/// How an incoming definition is combined with one already collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    /// The collected definition was declared on a descendant and wins.
    Shadow,
    /// Both definitions come from sibling parents and must agree.
    Sibling,
}

/// Scans `schema` and all of its ancestors.
pub(crate) fn scan(schema: &Schema) -> Result<DefinitionSet> {
    let mut withers = BTreeMap::new();
    collect_withers(schema, &mut withers);
    for (option, (_, declared_in)) in &withers {
        let accessor = wither_accessor(option);
        if RESERVED_NAMES.contains(&accessor.as_str()) {
            return Err(OptionsError::ReservedName {
                name: accessor,
                schema: declared_in.to_string(),
            });
        }
    }
    let lineage = schema.lineage();
    let defs = collect(schema, &withers, &lineage)?;
    DefinitionSet::new(schema.name(), defs.into_values())
}

/// Withers of the whole hierarchy, nearest declaration first.
fn collect_withers<'a>(schema: &'a Schema, withers: &mut BTreeMap<String, (&'a WitherDecl, &'a str)>) {
    for wither in schema.withers() {
        withers
            .entry(wither.option.clone())
            .or_insert((wither, schema.name()));
    }
    for parent in schema.parents() {
        collect_withers(parent, withers);
    }
}

/// Accessor name of the wither for `option`: `port` becomes `withPort`.
fn wither_accessor(option: &str) -> String {
    let mut chars = option.chars();
    match chars.next() {
        Some(first) => format!("with{}{}", first.to_uppercase(), chars.as_str()),
        None => "with".to_string(),
    }
}

fn collect(
    schema: &Schema,
    withers: &BTreeMap<String, (&WitherDecl, &str)>,
    lineage: &[String],
) -> Result<BTreeMap<String, OptionDef>> {
    let mut declared: BTreeMap<String, OptionDef> = BTreeMap::new();
    for decl in schema.options() {
        let def = definition(schema, decl, withers, lineage)?;
        if declared.contains_key(&def.name) {
            return Err(OptionsError::SchemaConflict {
                name: def.name.clone(),
                first: schema.name().to_string(),
                second: schema.name().to_string(),
                detail: "the option is declared twice on the same schema".to_string(),
            });
        }
        declared.insert(def.name.clone(), def);
    }

    let mut inherited: BTreeMap<String, OptionDef> = BTreeMap::new();
    for parent in schema.parents() {
        for (name, def) in collect(parent, withers, lineage)? {
            if let Some(own) = declared.get_mut(&name) {
                debug!(
                    option = %name,
                    parent = %def.declared_in,
                    schema = %schema.name(),
                    "inherited option is overridden"
                );
                merge_into(own, def, MergeMode::Shadow)?;
                continue;
            }
            match inherited.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(def);
                }
                Entry::Occupied(mut slot) => merge_into(slot.get_mut(), def, MergeMode::Sibling)?,
            }
        }
    }

    declared.extend(inherited);
    Ok(declared)
}

/// Merges `incoming` into `target`: keys and constraints are unioned, the
/// remaining attributes of `target` win unless it lacks them.
fn merge_into(target: &mut OptionDef, incoming: OptionDef, mode: MergeMode) -> Result<()> {
    if mode == MergeMode::Sibling && !target.is_strongly_equal(&incoming) {
        return Err(OptionsError::SchemaConflict {
            name: target.name.clone(),
            first: target.declared_in.clone(),
            second: incoming.declared_in.clone(),
            detail: format!(
                "an option declared multiple times must have the same type and parser \
                 ({} with parser {} vs {} with parser {})",
                target.value_type,
                target.parser.id(),
                incoming.value_type,
                incoming.parser.id()
            ),
        });
    }

    target.keys.extend(incoming.keys);
    for constraint in incoming.constraints {
        if !target.constraints.contains(&constraint) {
            target.constraints.push(constraint);
        }
    }
    if mode == MergeMode::Sibling {
        target.wither_available |= incoming.wither_available;
        target.required |= incoming.required;
        if target.default.is_none() {
            target.default = incoming.default;
        }
        if target.description.is_none() {
            target.description = incoming.description;
        }
    }
    Ok(())
}

fn definition(
    schema: &Schema,
    decl: &OptionDecl,
    withers: &BTreeMap<String, (&WitherDecl, &str)>,
    lineage: &[String],
) -> Result<OptionDef> {
    if RESERVED_NAMES.contains(&decl.name.as_str()) {
        return Err(OptionsError::ReservedName {
            name: decl.name.clone(),
            schema: schema.name().to_string(),
        });
    }
    if decl.primitive && !decl.value_type.supports_primitive() {
        return Err(OptionsError::type_mismatch(
            &decl.name,
            "a primitive scalar type",
            &decl.value_type,
            "only scalar types have a zero value",
        ));
    }

    let path = OptionPath::of(decl.name.as_str());
    let children = match decl.value_type.nested_schema() {
        Some(nested) => Some(Arc::new(nested.definitions()?.rebased(&path))),
        None => None,
    };

    let mut keys: std::collections::BTreeSet<String> = [decl.name.clone(), upper_snake_case(&decl.name)]
        .into_iter()
        .collect();
    keys.extend(
        decl.aliases
            .iter()
            .filter(|alias| !alias.trim().is_empty())
            .cloned(),
    );

    Ok(OptionDef {
        name: decl.name.clone(),
        keys,
        value_type: decl.value_type.clone(),
        primitive: decl.primitive,
        description: decl.description.clone(),
        default: decl.default.clone(),
        required: decl.required,
        constraints: decl.constraints.clone(),
        parser: Arc::clone(&decl.parser),
        wither_available: wither_available(decl, withers, lineage),
        path,
        children,
        declared_in: schema.name().to_string(),
    })
}

fn wither_available(
    decl: &OptionDecl,
    withers: &BTreeMap<String, (&WitherDecl, &str)>,
    lineage: &[String],
) -> bool {
    let Some((wither, declared_in)) = withers.get(&decl.name) else {
        return false;
    };
    if !decl.value_type.is_assignable_from(&wither.param_type) {
        warn!(
            option = %decl.name,
            schema = %declared_in,
            expected = %decl.value_type,
            actual = %wither.param_type,
            "wither parameter is not assignable to the option type, ignoring it"
        );
        return false;
    }
    if !lineage.iter().any(|name| name == &wither.returns) {
        warn!(
            option = %decl.name,
            schema = %declared_in,
            returns = %wither.returns,
            "wither returns an unrelated schema, ignoring it"
        );
        return false;
    }
    true
}
