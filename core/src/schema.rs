//! Declarative schema surface.
//!
//! A [`Schema`] is a named set of option declarations, optionally inheriting
//! from parent schemas. Schemas are immutable once built and shared through
//! `Arc`; the flattened definitions are computed on first use and cached.
//!
//! # Example
//!
//! ```
//! use option_schema_core::*;
//!
//! let strings = Schema::builder("Strings")
//!     .option(OptionDecl::new("string", ValueType::String))
//!     .option(OptionDecl::new("stringWithDefault", ValueType::String).default_value("default"))
//!     .build();
//!
//! let definitions = strings.definitions().unwrap();
//! assert_eq!(definitions.len(), 2);
//! assert!(definitions.get("STRING_WITH_DEFAULT").is_some());
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::coerce::{DefaultParser, ValueParser};
use crate::constraint::Constraint;
use crate::definition::DefinitionSet;
use crate::error::{OptionsError, Result};
use crate::extension::OptionsExtension;
use crate::scanner;
use crate::types::ValueType;
use crate::value::{FromValue, Value};

/// Accessor names that belong to the snapshot API and cannot be options.
pub const RESERVED_NAMES: &[&str] = &[
    "equals", "hashCode", "toString", "getClass", "setValue", "getValue", "toBuilder", "withValue",
];

/// Read access to the values resolved so far, handed to computed defaults.
pub trait ValueView {
    /// Resolved value of the option addressed by `key`, including defaults.
    fn value(&self, key: &str) -> Result<Option<Value>>;
}

impl dyn ValueView + '_ {
    /// Typed variant of [`ValueView::value`].
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<Option<T>> {
        match self.value(key)? {
            Some(value) => T::from_value(&value).map(Some).ok_or_else(|| {
                OptionsError::type_mismatch(
                    key,
                    std::any::type_name::<T>(),
                    value,
                    "the stored value has another type",
                )
            }),
            None => Ok(None),
        }
    }

    /// Like [`get_as`](Self::get_as) but an absent value is an error, which a
    /// computed default reports as "cannot be computed".
    pub fn require<T: FromValue>(&self, key: &str) -> Result<T> {
        self.get_as(key)?.ok_or_else(|| OptionsError::DefaultValue {
            option: key.to_string(),
            message: "the option has no value".to_string(),
        })
    }
}

type Computed = Arc<dyn Fn(&dyn ValueView) -> Result<Value> + Send + Sync + 'static>;

/// Default of an option: a constant, or computed lazily from other options.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Computed(Computed),
}

impl DefaultValue {
    pub fn evaluate(&self, view: &dyn ValueView) -> Result<Value> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Computed(compute) => compute(view),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// Declaration of one option on one schema.
#[derive(Debug, Clone)]
pub struct OptionDecl {
    pub(crate) name: String,
    pub(crate) value_type: ValueType,
    pub(crate) description: Option<String>,
    pub(crate) aliases: Vec<String>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) primitive: bool,
    pub(crate) required: bool,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) parser: Arc<dyn ValueParser>,
}

impl OptionDecl {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            description: None,
            aliases: Vec::new(),
            default: None,
            primitive: false,
            required: false,
            constraints: Vec::new(),
            parser: DefaultParser::shared(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Adds an extra lookup key (environment variable name, argument name).
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// A default computed on read from the other resolved options.
    ///
    /// # Examples
    ///
    /// ```
    /// use option_schema_core::*;
    ///
    /// let decl = OptionDecl::new("url", ValueType::String).default_with(|view| {
    ///     let host: String = view.require("host")?;
    ///     Ok(Value::from(format!("http://{host}")))
    /// });
    /// # let _ = decl;
    /// ```
    pub fn default_with<F>(mut self, compute: F) -> Self
    where
        F: Fn(&dyn ValueView) -> Result<Value> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(compute)));
        self
    }

    /// Gives a scalar option its zero value as fallback.
    pub fn primitive(mut self) -> Self {
        self.primitive = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ValueParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }
}

/// A "with new value" operation for one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitherDecl {
    pub(crate) option: String,
    pub(crate) param_type: ValueType,
    pub(crate) returns: String,
}

impl WitherDecl {
    /// `returns` names the schema the wither produces.
    pub fn new(option: &str, param_type: ValueType, returns: &str) -> Self {
        Self {
            option: option.to_string(),
            param_type,
            returns: returns.to_string(),
        }
    }

    pub fn option(&self) -> &str {
        &self.option
    }
}

/// An immutable, named set of option declarations.
pub struct Schema {
    name: String,
    parents: Vec<Arc<Schema>>,
    options: Vec<OptionDecl>,
    withers: Vec<WitherDecl>,
    extensions: Vec<Arc<dyn OptionsExtension>>,
    definitions: OnceLock<Arc<DefinitionSet>>,
}

impl Schema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder {
            name: name.to_string(),
            parents: Vec::new(),
            options: Vec::new(),
            withers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[Arc<Schema>] {
        &self.parents
    }

    /// Options declared directly on this schema.
    pub fn options(&self) -> &[OptionDecl] {
        &self.options
    }

    pub fn withers(&self) -> &[WitherDecl] {
        &self.withers
    }

    /// Extensions declared directly on this schema.
    pub fn extensions(&self) -> &[Arc<dyn OptionsExtension>] {
        &self.extensions
    }

    /// Whether this schema is `other` or inherits from it.
    pub fn is_descendant_of(&self, other: &Schema) -> bool {
        self.name == other.name || self.parents.iter().any(|p| p.is_descendant_of(other))
    }

    /// Names of this schema and all of its ancestors, nearest first.
    pub fn lineage(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        for parent in &self.parents {
            for name in parent.lineage() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// The flattened option definitions, scanned on first call.
    pub fn definitions(&self) -> Result<Arc<DefinitionSet>> {
        if let Some(definitions) = self.definitions.get() {
            return Ok(Arc::clone(definitions));
        }
        let scanned = Arc::new(scanner::scan(self)?);
        Ok(Arc::clone(self.definitions.get_or_init(|| scanned)))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field(
                "parents",
                &self.parents.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "options",
                &self.options.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for [`Schema`].
#[must_use]
pub struct SchemaBuilder {
    name: String,
    parents: Vec<Arc<Schema>>,
    options: Vec<OptionDecl>,
    withers: Vec<WitherDecl>,
    extensions: Vec<Arc<dyn OptionsExtension>>,
}

impl SchemaBuilder {
    /// Inherits from `parent`. Parents are merged in declaration order.
    pub fn extends(mut self, parent: &Arc<Schema>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    pub fn option(mut self, option: OptionDecl) -> Self {
        self.options.push(option);
        self
    }

    pub fn wither(mut self, wither: WitherDecl) -> Self {
        self.withers.push(wither);
        self
    }

    pub fn extension(mut self, extension: Arc<dyn OptionsExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema {
            name: self.name,
            parents: self.parents,
            options: self.options,
            withers: self.withers,
            extensions: self.extensions,
            definitions: OnceLock::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lineage_lists_each_ancestor_once() {
        let base = Schema::builder("Base").build();
        let left = Schema::builder("Left").extends(&base).build();
        let right = Schema::builder("Right").extends(&base).build();
        let diamond = Schema::builder("Diamond").extends(&left).extends(&right).build();

        assert_eq!(diamond.lineage(), vec!["Diamond", "Left", "Base", "Right"]);
        assert!(diamond.is_descendant_of(&base));
        assert!(!base.is_descendant_of(&diamond));
    }

    #[test]
    fn test_definitions_are_cached() {
        let schema = Schema::builder("Cached")
            .option(OptionDecl::new("a", ValueType::Int))
            .build();
        let first = schema.definitions().unwrap();
        let second = schema.definitions().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_static_default_evaluates_without_view() {
        struct Empty;
        impl ValueView for Empty {
            fn value(&self, _key: &str) -> Result<Option<Value>> {
                Ok(None)
            }
        }

        let default = DefaultValue::Static(Value::Int(3306));
        assert_eq!(default.evaluate(&Empty).unwrap(), Value::Int(3306));

        let computed = DefaultValue::Computed(Arc::new(|view: &dyn ValueView| {
            view.require::<String>("host").map(Value::from)
        }));
        assert!(matches!(
            computed.evaluate(&Empty),
            Err(OptionsError::DefaultValue { .. })
        ));
    }
}
