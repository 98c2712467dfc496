//! Flattened option definitions.
//!
//! An [`OptionDef`] is the canonical record of one option across a schema
//! hierarchy; a [`DefinitionSet`] is what scanning a schema produces.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::coerce::ValueParser;
use crate::constraint::Constraint;
use crate::error::{OptionsError, Result};
use crate::path::OptionPath;
use crate::schema::DefaultValue;
use crate::types::ValueType;
use crate::value::Value;

/// Converts a lower camel case option name to its upper snake case key.
///
/// # Examples
///
/// ```
/// use option_schema_core::upper_snake_case;
///
/// assert_eq!(upper_snake_case("primitiveInt"), "PRIMITIVE_INT");
/// assert_eq!(upper_snake_case("jdbcURL"), "JDBC_URL");
/// assert_eq!(upper_snake_case("host"), "HOST");
/// ```
pub fn upper_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == '.' || c == ' ' {
            out.push('_');
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_uppercase());
    }
    out
}

/// Canonical metadata of one option.
///
/// Two definitions are equal when their names are equal; use
/// [`is_strongly_equal`](Self::is_strongly_equal) to compare the parts that
/// must agree across inheritance branches.
#[derive(Debug, Clone)]
pub struct OptionDef {
    pub(crate) name: String,
    pub(crate) keys: BTreeSet<String>,
    pub(crate) value_type: ValueType,
    pub(crate) primitive: bool,
    pub(crate) description: Option<String>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) required: bool,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) parser: Arc<dyn ValueParser>,
    pub(crate) wither_available: bool,
    pub(crate) path: OptionPath,
    pub(crate) children: Option<Arc<DefinitionSet>>,
    pub(crate) declared_in: String,
}

impl OptionDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical name, upper snake case form and declared aliases.
    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Whether a value is available without any external input.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.primitive
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn parser(&self) -> &Arc<dyn ValueParser> {
        &self.parser
    }

    pub fn wither_available(&self) -> bool {
        self.wither_available
    }

    pub fn path(&self) -> &OptionPath {
        &self.path
    }

    /// Definitions of a nested option's schema.
    pub fn children(&self) -> Option<&Arc<DefinitionSet>> {
        self.children.as_ref()
    }

    pub fn is_nested(&self) -> bool {
        self.value_type.is_nested()
    }

    /// Schema that declared the winning declaration.
    pub fn declared_in(&self) -> &str {
        &self.declared_in
    }

    /// Zero value for primitive options.
    pub fn primitive_default(&self) -> Option<Value> {
        if self.primitive {
            self.value_type.zero_value()
        } else {
            None
        }
    }

    /// Same declared type and same parser.
    pub fn is_strongly_equal(&self, other: &OptionDef) -> bool {
        self.value_type == other.value_type && self.parser.id() == other.parser.id()
    }

    fn rebased(&self, prefix: &OptionPath) -> OptionDef {
        let mut path = prefix.clone();
        for segment in self.path.segments() {
            path = path.add(segment.as_str());
        }
        OptionDef {
            path,
            children: self
                .children
                .as_ref()
                .map(|children| Arc::new(children.rebased(prefix))),
            ..self.clone()
        }
    }
}

impl PartialEq for OptionDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for OptionDef {}

impl fmt::Display for OptionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value_type, self.path)
    }
}

/// The flattened definitions of one schema, addressable by name or alias.
#[derive(Debug, Clone)]
pub struct DefinitionSet {
    schema: String,
    defs: BTreeMap<String, OptionDef>,
    keys: BTreeMap<String, String>,
}

impl DefinitionSet {
    /// Indexes `defs`; a key claimed by two options is a conflict.
    pub(crate) fn new(schema: &str, defs: impl IntoIterator<Item = OptionDef>) -> Result<Self> {
        let defs: BTreeMap<String, OptionDef> =
            defs.into_iter().map(|d| (d.name.clone(), d)).collect();
        let mut keys: BTreeMap<String, String> = BTreeMap::new();
        for def in defs.values() {
            for key in &def.keys {
                if let Some(owner) = keys.get(key) {
                    if owner != &def.name {
                        return Err(OptionsError::SchemaConflict {
                            name: key.clone(),
                            first: format!("{schema}.{owner}"),
                            second: format!("{schema}.{}", def.name),
                            detail: "the same key is used by two different options".to_string(),
                        });
                    }
                }
                keys.insert(key.clone(), def.name.clone());
            }
        }
        Ok(Self {
            schema: schema.to_string(),
            defs,
            keys,
        })
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Looks up a definition by canonical name or alias.
    pub fn get(&self, key: &str) -> Option<&OptionDef> {
        self.keys.get(key).and_then(|name| self.defs.get(name))
    }

    /// Like [`get`](Self::get), failing with [`OptionsError::InvalidKey`].
    pub fn resolve(&self, key: &str) -> Result<&OptionDef> {
        self.get(key)
            .ok_or_else(|| OptionsError::invalid_key(key, &self.schema))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Definitions ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &OptionDef> {
        self.defs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Every definition, nested ones included, depth first.
    pub fn flatten(&self) -> Vec<&OptionDef> {
        let mut out = Vec::new();
        for def in self.defs.values() {
            out.push(def);
            if let Some(children) = &def.children {
                out.extend(children.flatten());
            }
        }
        out
    }

    /// Serializable description of every definition.
    pub fn report(&self) -> Vec<DefinitionReport> {
        self.flatten().into_iter().map(DefinitionReport::from).collect()
    }

    /// Copy with every path prefixed by `prefix`.
    pub(crate) fn rebased(&self, prefix: &OptionPath) -> DefinitionSet {
        DefinitionSet {
            schema: self.schema.clone(),
            defs: self
                .defs
                .iter()
                .map(|(name, def)| (name.clone(), def.rebased(prefix)))
                .collect(),
            keys: self.keys.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a DefinitionSet {
    type Item = &'a OptionDef;
    type IntoIter = std::collections::btree_map::Values<'a, String, OptionDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.defs.values()
    }
}

/// Flat, serializable view of an [`OptionDef`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionReport {
    pub path: OptionPath,
    pub value_type: String,
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub primitive: bool,
    pub required: bool,
    pub constraints: Vec<String>,
    pub parser: String,
    pub wither: bool,
    pub declared_in: String,
}

impl From<&OptionDef> for DefinitionReport {
    fn from(def: &OptionDef) -> Self {
        Self {
            path: def.path.clone(),
            value_type: def.value_type.to_string(),
            keys: def.keys.iter().cloned().collect(),
            description: def.description.clone(),
            default: def.default.as_ref().map(|d| match d {
                DefaultValue::Static(value) => value.to_string(),
                DefaultValue::Computed(_) => "<computed>".to_string(),
            }),
            primitive: def.primitive,
            required: def.required,
            constraints: def.constraints.iter().map(ToString::to_string).collect(),
            parser: def.parser.id().to_string(),
            wither: def.wither_available,
            declared_in: def.declared_in.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::DefaultParser;

    fn def(name: &str, keys: &[&str]) -> OptionDef {
        OptionDef {
            name: name.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            value_type: ValueType::String,
            primitive: false,
            description: None,
            default: None,
            required: false,
            constraints: Vec::new(),
            parser: DefaultParser::shared(),
            wither_available: false,
            path: OptionPath::of(name),
            children: None,
            declared_in: "Test".to_string(),
        }
    }

    #[test]
    fn test_upper_snake_case_variants() {
        assert_eq!(upper_snake_case("listOfString"), "LIST_OF_STRING");
        assert_eq!(upper_snake_case("envFile"), "ENV_FILE");
        assert_eq!(upper_snake_case("value2Name"), "VALUE2_NAME");
        assert_eq!(upper_snake_case("ALREADY_UPPER"), "ALREADY_UPPER");
    }

    #[test]
    fn test_lookup_by_alias() {
        let set = DefinitionSet::new("Test", [def("host", &["host", "HOST", "DB_HOST"])]).unwrap();
        assert_eq!(set.get("DB_HOST").map(OptionDef::name), Some("host"));
        assert!(matches!(set.resolve("port"), Err(OptionsError::InvalidKey { .. })));
    }

    #[test]
    fn test_shared_key_is_a_conflict() {
        let result = DefinitionSet::new(
            "Test",
            [def("a", &["a", "SHARED"]), def("b", &["b", "SHARED"])],
        );
        assert!(matches!(result, Err(OptionsError::SchemaConflict { .. })));
    }

    #[test]
    fn test_rebased_prefixes_paths() {
        let set = DefinitionSet::new("Test", [def("host", &["host"])]).unwrap();
        let rebased = set.rebased(&OptionPath::of("primarydb"));
        assert_eq!(rebased.get("host").unwrap().path().to_string(), "primarydb.host");
        assert_eq!(set.get("host").unwrap().path().to_string(), "host");
    }
}
