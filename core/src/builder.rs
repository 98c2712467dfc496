//! Options builder.
//!
//! An [`OptionsBuilder`] stages values per option definition before an
//! immutable [`Options`] snapshot is built from it. Nested options are staged
//! in nested builders that the parent owns.
//!
//! Every staged value remembers its [`Origin`]. Loader extensions write
//! through [`OptionsBuilder::load`], which never replaces a loaded or
//! explicitly set value; prefilled values are replaced by any loader.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::coerce::coerce_value;
use crate::definition::{DefinitionSet, OptionDef};
use crate::error::{OptionsError, Result};
use crate::extension::OptionsExtension;
use crate::extension::provider::{EnvProvider, Environment};
use crate::factory;
use crate::options::Options;
use crate::schema::{Schema, ValueView};
use crate::value::{Value, ValueMap};

/// Where a staged value came from, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    /// Programmatic initial values; replaced by every loader.
    Prefill,
    /// Written by a loader extension.
    Loaded,
    /// Set through the builder API.
    Explicit,
}

#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Value { value: Value, origin: Origin },
    Nested(Box<OptionsBuilder>),
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value { value: a, .. }, Self::Value { value: b, .. }) => a == b,
            (Self::Nested(a), Self::Nested(b)) => a == b,
            _ => false,
        }
    }
}

/// Mutable staging area for one schema.
///
/// Cloning a builder is a deep copy: nested builders and collection values
/// are never shared between the clone and the original.
///
/// # Examples
///
/// ```
/// use option_schema_core::*;
///
/// let schema = Schema::builder("Strings")
///     .option(OptionDecl::new("string", ValueType::String))
///     .option(OptionDecl::new("stringWithDefault", ValueType::String).default_value("default"))
///     .build();
///
/// let mut builder = OptionsBuilder::new(&schema).unwrap();
/// builder.set("string", "localhost").unwrap();
/// assert_eq!(builder.resolve("string").unwrap(), Some(Value::from("localhost")));
/// assert_eq!(builder.resolve("stringWithDefault").unwrap(), Some(Value::from("default")));
///
/// builder.reset_value("string").unwrap();
/// assert_eq!(builder.resolve("string").unwrap(), None);
/// ```
#[derive(Clone)]
pub struct OptionsBuilder {
    schema: Arc<Schema>,
    definitions: Arc<DefinitionSet>,
    slots: BTreeMap<String, Slot>,
    args: Arc<[String]>,
    dynamic_extensions: Vec<Arc<dyn OptionsExtension>>,
    env: Arc<dyn EnvProvider>,
}

impl OptionsBuilder {
    /// An empty builder reading the process-wide [`Environment`].
    pub fn new(schema: &Arc<Schema>) -> Result<Self> {
        let definitions = schema.definitions()?;
        Self::seeded(
            schema,
            definitions,
            ValueMap::new(),
            Origin::Prefill,
            Arc::from(Vec::new()),
            Vec::new(),
            Environment::global(),
        )
    }

    /// Creates a builder staging `values` (keyed by name or alias) with
    /// `origin`. Nested options get a nested builder from their sub-map.
    pub(crate) fn seeded(
        schema: &Arc<Schema>,
        definitions: Arc<DefinitionSet>,
        values: ValueMap,
        origin: Origin,
        args: Arc<[String]>,
        dynamic_extensions: Vec<Arc<dyn OptionsExtension>>,
        env: Arc<dyn EnvProvider>,
    ) -> Result<Self> {
        let mut by_name: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in values {
            let def = definitions.resolve(&key)?;
            if by_name.insert(def.name.clone(), value).is_some() {
                warn!(option = %def.name, key = %key, "option prefilled under more than one key");
                return Err(OptionsError::invalid_key(key, schema.name()));
            }
        }

        let mut slots = BTreeMap::new();
        for def in definitions.iter() {
            let value = by_name.remove(&def.name);
            if let Some(nested_schema) = def.value_type.nested_schema() {
                let map = match value {
                    None => ValueMap::new(),
                    Some(Value::Map(map)) => map,
                    Some(other) => return Err(nested_value_mismatch(def, &other)),
                };
                let nested = Self::seeded(
                    nested_schema,
                    child_definitions(def, nested_schema)?,
                    map,
                    origin,
                    Arc::clone(&args),
                    Vec::new(),
                    Arc::clone(&env),
                )?;
                slots.insert(def.name.clone(), Slot::Nested(Box::new(nested)));
            } else if let Some(value) = value {
                let value = coerce(def, value)?;
                slots.insert(def.name.clone(), Slot::Value { value, origin });
            }
        }

        Ok(Self {
            schema: Arc::clone(schema),
            definitions,
            slots,
            args,
            dynamic_extensions,
            env,
        })
    }

    /// Reassembles a builder from a snapshot's staged state.
    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        definitions: Arc<DefinitionSet>,
        slots: BTreeMap<String, Slot>,
        args: Arc<[String]>,
        dynamic_extensions: Vec<Arc<dyn OptionsExtension>>,
        env: Arc<dyn EnvProvider>,
    ) -> Self {
        Self {
            schema,
            definitions,
            slots,
            args,
            dynamic_extensions,
            env,
        }
    }

    pub(crate) fn into_slots(self) -> BTreeMap<String, Slot> {
        self.slots
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn definitions(&self) -> &Arc<DefinitionSet> {
        &self.definitions
    }

    /// Program arguments the builder was created with.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn shared_args(&self) -> Arc<[String]> {
        Arc::clone(&self.args)
    }

    pub fn dynamic_extensions(&self) -> &[Arc<dyn OptionsExtension>] {
        &self.dynamic_extensions
    }

    pub fn environment(&self) -> &Arc<dyn EnvProvider> {
        &self.env
    }

    /// Staged value of a scalar or collection option.
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        let def = self.definitions.resolve(key)?;
        Ok(match self.slots.get(&def.name) {
            Some(Slot::Value { value, .. }) => Some(value),
            _ => None,
        })
    }

    /// Origin of the staged value, if any.
    pub fn origin(&self, key: &str) -> Result<Option<Origin>> {
        let def = self.definitions.resolve(key)?;
        Ok(match self.slots.get(&def.name) {
            Some(Slot::Value { origin, .. }) => Some(*origin),
            _ => None,
        })
    }

    pub fn is_set(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Staged value, or the zero value of a primitive option that declares
    /// no other default.
    pub fn get_or_primitive_default(&self, key: &str) -> Result<Option<Value>> {
        let def = self.definitions.resolve(key)?;
        if let Some(value) = self.get(key)? {
            return Ok(Some(value.clone()));
        }
        if def.default.is_some() {
            return Ok(None);
        }
        Ok(def.primitive_default())
    }

    /// Staged value, else the declared default evaluated against this
    /// builder, else the primitive zero value.
    pub fn resolve(&self, key: &str) -> Result<Option<Value>> {
        let def = self.definitions.resolve(key)?;
        if def.is_nested() {
            return self.nested(key)?.resolved_map().map(|map| Some(Value::Map(map)));
        }
        if let Some(value) = self.get(key)? {
            return Ok(Some(value.clone()));
        }
        match &def.default {
            Some(default) => default.evaluate(self).map(Some),
            None => Ok(def.primitive_default()),
        }
    }

    /// Resolved values of every option that has one; computed defaults that
    /// cannot be computed yet are left out.
    pub fn resolved_map(&self) -> Result<ValueMap> {
        let mut map = ValueMap::new();
        for name in self.definitions.names() {
            match self.resolve(name) {
                Ok(Some(value)) => {
                    map.insert(name.to_string(), value);
                }
                Ok(None) | Err(OptionsError::DefaultValue { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(map)
    }

    /// Coerces and stages `value` as an explicit value.
    ///
    /// A map assigned to a nested option replaces its nested builder.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.stage(key, value.into(), Origin::Explicit)
    }

    /// Chaining form of [`set`](Self::set).
    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Sets a nested option addressed by `path`; every segment but the last
    /// must name a nested option.
    pub fn set_path(&mut self, path: &[&str], value: impl Into<Value>) -> Result<()> {
        let (last, parents) = path
            .split_last()
            .ok_or_else(|| OptionsError::invalid_key("", self.schema.name()))?;
        let mut builder = self;
        for segment in parents {
            builder = builder.descend(segment, path)?;
        }
        builder.set(last, value)
    }

    /// Removes the staged value and returns it. A nested option is reset to
    /// an empty nested builder.
    pub fn reset_value(&mut self, key: &str) -> Result<Option<Value>> {
        let def = self.definitions.resolve(key)?.clone();
        if let Some(nested_schema) = def.value_type.nested_schema() {
            let previous = self.nested(key)?.resolved_map().ok().map(Value::Map);
            let empty = Self::seeded(
                nested_schema,
                child_definitions(&def, nested_schema)?,
                ValueMap::new(),
                Origin::Prefill,
                self.shared_args(),
                Vec::new(),
                Arc::clone(&self.env),
            )?;
            self.slots.insert(def.name, Slot::Nested(Box::new(empty)));
            return Ok(previous);
        }
        Ok(match self.slots.remove(&def.name) {
            Some(Slot::Value { value, .. }) => Some(value),
            _ => None,
        })
    }

    /// Nested builder of a nested option.
    pub fn nested(&self, key: &str) -> Result<&OptionsBuilder> {
        let def = self.definitions.resolve(key)?;
        match self.slots.get(&def.name) {
            Some(Slot::Nested(builder)) => Ok(builder),
            _ => Err(not_nested(def)),
        }
    }

    pub fn nested_mut(&mut self, key: &str) -> Result<&mut OptionsBuilder> {
        let def = self.definitions.resolve(key)?;
        match self.slots.get_mut(&def.name) {
            Some(Slot::Nested(builder)) => Ok(builder),
            _ => Err(not_nested(def)),
        }
    }

    /// Loader write: stages `text` at `path` unless a loaded or explicit
    /// value is already there. Returns whether the value was staged.
    ///
    /// An unknown first segment is skipped with a warning so one stray
    /// variable or argument does not fail the whole construction.
    pub fn load(&mut self, path: &[&str], text: &str, origin: &str, source: &str) -> Result<bool> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(false);
        };
        let Some(def) = self.definitions.get(first) else {
            warn!(
                key = %first,
                path = %path.join("."),
                source = %source,
                "no such option, value is ignored"
            );
            return Ok(false);
        };
        let name = def.name.clone();
        if !rest.is_empty() {
            return self.descend(first, path)?.load(rest, text, origin, source);
        }
        if def.is_nested() {
            return Err(OptionsError::type_mismatch(
                def.path.to_string(),
                def.value_type.clone(),
                text,
                "a nested option cannot be loaded from a single value",
            ));
        }
        if let Some(Slot::Value { origin: staged, .. }) = self.slots.get(&name) {
            if *staged != Origin::Prefill {
                return Ok(false);
            }
        }

        let previous = self.resolve(&name).ok().flatten();
        let value = coerce(def, Value::String(text.to_string()))?;
        let changed = previous.as_ref() != Some(&value);
        let path = def.path.clone();
        self.slots.insert(
            name,
            Slot::Value {
                value,
                origin: Origin::Loaded,
            },
        );
        if changed {
            info!(option = %path, value = %text, origin = %origin, source = %source, "option value set");
        }
        Ok(true)
    }

    /// Builds an immutable snapshot: applies the extensions of the schema and
    /// the dynamic extensions, then materializes nested builders.
    pub fn build(self) -> Result<Options> {
        factory::build_options(self)
    }

    fn stage(&mut self, key: &str, value: Value, origin: Origin) -> Result<()> {
        let def = self.definitions.resolve(key)?.clone();
        if let Some(nested_schema) = def.value_type.nested_schema() {
            let Value::Map(map) = value else {
                return Err(nested_value_mismatch(&def, &value));
            };
            let nested = Self::seeded(
                nested_schema,
                child_definitions(&def, nested_schema)?,
                map,
                origin,
                self.shared_args(),
                Vec::new(),
                Arc::clone(&self.env),
            )?;
            self.slots.insert(def.name, Slot::Nested(Box::new(nested)));
            return Ok(());
        }
        let value = coerce(&def, value)?;
        self.slots.insert(def.name, Slot::Value { value, origin });
        Ok(())
    }

    fn descend(&mut self, segment: &str, path: &[&str]) -> Result<&mut OptionsBuilder> {
        let def = self.definitions.resolve(segment)?;
        match self.slots.get_mut(&def.name) {
            Some(Slot::Nested(builder)) => Ok(builder),
            _ => Err(OptionsError::type_mismatch(
                path.join("."),
                "a nested option",
                segment,
                format!("{segment} is not a nested option"),
            )),
        }
    }
}

impl ValueView for OptionsBuilder {
    fn value(&self, key: &str) -> Result<Option<Value>> {
        self.resolve(key)
    }
}

impl PartialEq for OptionsBuilder {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.slots == other.slots
    }
}

impl fmt::Debug for OptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsBuilder")
            .field("schema", &self.schema.name())
            .field("slots", &self.slots)
            .field("args", &self.args)
            .finish()
    }
}

/// Coerces `value` with the option's parser, reporting the option path.
pub(crate) fn coerce(def: &OptionDef, value: Value) -> Result<Value> {
    let shown = value.render();
    coerce_value(def.parser.as_ref(), &def.value_type, value).map_err(|reason| {
        OptionsError::type_mismatch(def.path.to_string(), &def.value_type, shown, reason)
    })
}

/// Definitions of a nested option, falling back to a fresh scan of its schema.
fn child_definitions(def: &OptionDef, nested_schema: &Arc<Schema>) -> Result<Arc<DefinitionSet>> {
    match &def.children {
        Some(children) => Ok(Arc::clone(children)),
        None => nested_schema.definitions(),
    }
}

fn nested_value_mismatch(def: &OptionDef, value: &Value) -> OptionsError {
    OptionsError::type_mismatch(
        def.path.to_string(),
        &def.value_type,
        value,
        format!("the nested values for '{}' must be a map", def.path),
    )
}

fn not_nested(def: &OptionDef) -> OptionsError {
    OptionsError::type_mismatch(
        def.path.to_string(),
        "a nested option",
        &def.value_type,
        format!("{} is not a nested option", def.name),
    )
}
