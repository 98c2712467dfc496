//! Immutable options snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::builder::{Origin, OptionsBuilder, Slot};
use crate::definition::DefinitionSet;
use crate::error::{OptionsError, Result, ValidationFailure};
use crate::extension::OptionsExtension;
use crate::extension::provider::EnvProvider;
use crate::schema::{Schema, ValueView};
use crate::validate::{self, Violation};
use crate::value::{FromValue, Value, ValueMap};

#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Value { value: Value, origin: Origin },
    Nested(Options),
}

// Origin is provenance only; equal values from different sources are equal.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value { value: a, .. }, Self::Value { value: b, .. }) => a == b,
            (Self::Nested(a), Self::Nested(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Value { value, .. } => {
                state.write_u8(0);
                value.hash(state);
            }
            Self::Nested(nested) => {
                state.write_u8(1);
                nested.hash(state);
            }
        }
    }
}

pub(crate) struct Inner {
    pub(crate) schema: Arc<Schema>,
    pub(crate) definitions: Arc<DefinitionSet>,
    pub(crate) entries: BTreeMap<String, Entry>,
    pub(crate) args: Arc<[String]>,
    pub(crate) dynamic_extensions: Vec<Arc<dyn OptionsExtension>>,
    pub(crate) validators: Vec<Arc<dyn OptionsExtension>>,
    pub(crate) env: Arc<dyn EnvProvider>,
}

/// Resolved, immutable options of one schema.
///
/// Values are read by canonical name or alias. Options without a staged
/// value fall back to their declared default, evaluated on read against the
/// snapshot itself, then to the zero value of primitive options.
///
/// Cloning is cheap; "changing" a value goes through
/// [`to_builder`](Self::to_builder), [`with_value`](Self::with_value) or
/// [`wither`](Self::wither) and yields a new snapshot.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use option_schema_core::*;
///
/// let schema = Schema::builder("Strings")
///     .option(OptionDecl::new("string", ValueType::String))
///     .option(OptionDecl::new("stringWithDefault", ValueType::String).default_value("default"))
///     .build();
/// let options = OptionsFactory::builder(&schema)
///     .value("string", "localhost")
///     .environment(Arc::new(Environment::isolated()))
///     .create()
///     .unwrap();
///
/// assert_eq!(options.get_as::<String>("string").unwrap().as_deref(), Some("localhost"));
/// assert_eq!(options.to_string(), "Strings{string=localhost, stringWithDefault=default}");
/// ```
#[derive(Clone)]
pub struct Options {
    inner: Arc<Inner>,
}

impl Options {
    pub(crate) fn new(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    pub fn definitions(&self) -> &Arc<DefinitionSet> {
        &self.inner.definitions
    }

    /// Program arguments the snapshot was built from.
    pub fn args(&self) -> &[String] {
        &self.inner.args
    }

    pub fn dynamic_extensions(&self) -> &[Arc<dyn OptionsExtension>] {
        &self.inner.dynamic_extensions
    }

    /// Validation extensions of this level: declared ones, plus dynamic ones
    /// at the root.
    pub(crate) fn validators(&self) -> &[Arc<dyn OptionsExtension>] {
        &self.inner.validators
    }

    pub fn environment(&self) -> &Arc<dyn EnvProvider> {
        &self.inner.env
    }

    /// Whether `key` addresses an option of the schema.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.definitions.contains(key)
    }

    /// Whether a value was staged for `key`, as opposed to a default.
    pub fn is_set(&self, key: &str) -> Result<bool> {
        Ok(self.origin(key)?.is_some())
    }

    pub fn origin(&self, key: &str) -> Result<Option<Origin>> {
        let def = self.inner.definitions.resolve(key)?;
        Ok(match self.inner.entries.get(&def.name) {
            Some(Entry::Value { origin, .. }) => Some(*origin),
            _ => None,
        })
    }

    /// Resolved value of `key`; a nested option resolves to a map.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let def = self.inner.definitions.resolve(key)?;
        match self.inner.entries.get(&def.name) {
            Some(Entry::Value { value, .. }) => Ok(Some(value.clone())),
            Some(Entry::Nested(nested)) => nested.to_value_map().map(|map| Some(Value::Map(map))),
            None => match &def.default {
                Some(default) => default.evaluate(self).map(Some),
                None => Ok(def.primitive_default()),
            },
        }
    }

    /// Typed variant of [`get`](Self::get).
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<Option<T>> {
        let view: &dyn ValueView = self;
        view.get_as(key)
    }

    /// Snapshot of a nested option.
    pub fn nested(&self, key: &str) -> Result<&Options> {
        let def = self.inner.definitions.resolve(key)?;
        match self.inner.entries.get(&def.name) {
            Some(Entry::Nested(nested)) => Ok(nested),
            _ => Err(OptionsError::type_mismatch(
                def.path.to_string(),
                "a nested option",
                &def.value_type,
                format!("{} is not a nested option", def.name),
            )),
        }
    }

    /// Resolved value at a dotted path such as `["primarydb", "host"]`.
    pub fn get_path(&self, path: &[&str]) -> Result<Option<Value>> {
        let Some((last, parents)) = path.split_last() else {
            return Err(OptionsError::invalid_key("", self.inner.schema.name()));
        };
        let mut options = self;
        for segment in parents {
            options = options.nested(segment)?;
        }
        options.get(last)
    }

    /// Every resolved value by canonical name. Absent values and computed
    /// defaults that cannot be computed yet are omitted.
    pub fn to_value_map(&self) -> Result<ValueMap> {
        let mut map = ValueMap::new();
        for name in self.inner.definitions.names() {
            match self.get(name) {
                Ok(Some(value)) => {
                    map.insert(name.to_string(), value);
                }
                Ok(None) | Err(OptionsError::DefaultValue { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(map)
    }

    /// JSON object of the resolved values.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(Value::Map(self.to_value_map()?).to_json())
    }

    /// A builder holding a deep copy of the staged values. Arguments,
    /// dynamic extensions and environment are carried over.
    pub fn to_builder(&self) -> OptionsBuilder {
        let slots = self
            .inner
            .entries
            .iter()
            .map(|(name, entry)| {
                let slot = match entry {
                    Entry::Value { value, origin } => Slot::Value {
                        value: value.clone(),
                        origin: *origin,
                    },
                    Entry::Nested(nested) => Slot::Nested(Box::new(nested.to_builder())),
                };
                (name.clone(), slot)
            })
            .collect();
        OptionsBuilder::from_parts(
            Arc::clone(&self.inner.schema),
            Arc::clone(&self.inner.definitions),
            slots,
            Arc::clone(&self.inner.args),
            self.inner.dynamic_extensions.clone(),
            Arc::clone(&self.inner.env),
        )
    }

    /// New snapshot with `key` set to `value`.
    pub fn with_value(&self, key: &str, value: impl Into<Value>) -> Result<Options> {
        self.to_builder().with_value(key, value)?.build()
    }

    /// Wither: like [`with_value`](Self::with_value) but only for options
    /// whose schema declares a wither.
    pub fn wither(&self, key: &str, value: impl Into<Value>) -> Result<Options> {
        let def = self.inner.definitions.resolve(key)?;
        if !def.wither_available {
            return Err(OptionsError::WitherUnavailable {
                name: def.name.clone(),
                schema: self.inner.schema.name().to_string(),
            });
        }
        self.with_value(key, value)
    }

    pub fn validate(&self) -> BTreeSet<Violation> {
        validate::validate(self)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Returns the snapshot if it has no violations.
    pub fn validated(self) -> Result<Options> {
        let violations = self.validate();
        if violations.is_empty() {
            Ok(self)
        } else {
            Err(OptionsError::ValidationFailure(ValidationFailure::new(violations)))
        }
    }
}

impl ValueView for Options {
    fn value(&self, key: &str) -> Result<Option<Value>> {
        self.get(key)
    }
}

impl PartialEq for Options {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.schema.name() == other.inner.schema.name()
                && self.inner.entries == other.inner.entries)
    }
}

impl Eq for Options {}

impl Hash for Options {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.schema.name().hash(state);
        self.inner.entries.hash(state);
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.inner.schema.name())?;
        let mut first = true;
        for def in self.inner.definitions.iter() {
            let rendered = match self.inner.entries.get(&def.name) {
                Some(Entry::Nested(nested)) => nested.to_string(),
                _ => match self.get(&def.name) {
                    Ok(Some(value)) => value.to_string(),
                    _ => continue,
                },
            };
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={}", def.name, rendered)?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("schema", &self.inner.schema.name())
            .field("entries", &self.inner.entries)
            .finish()
    }
}
