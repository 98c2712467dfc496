//! Options construction.
//!
//! [`OptionsFactory`] turns a schema plus prefill values, program arguments
//! and dynamic extensions into an [`Options`] snapshot: the schema is
//! scanned, a builder is seeded with the prefill values, the loader
//! extensions run in priority order, and nested builders are materialized
//! into nested snapshots. Validation only runs when asked for.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::builder::{Origin, OptionsBuilder, Slot};
use crate::error::{OptionsError, Result};
use crate::extension::provider::{EnvProvider, Environment};
use crate::extension::{self, OptionsExtension, resolve_extensions};
use crate::options::{Entry, Inner, Options};
use crate::schema::Schema;
use crate::validate::{self, Violation};
use crate::value::{Value, ValueMap};

/// Entry points for building snapshots.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use option_schema_core::*;
///
/// let schema = Schema::builder("Cli")
///     .option(OptionDecl::new("primitiveInt", ValueType::Int).primitive())
///     .option(OptionDecl::new("string", ValueType::String))
///     .extension(Arc::new(ArgumentsEquals))
///     .build();
///
/// let options = OptionsFactory::create(&schema, ["--primitiveInt=1", "--string=test"]).unwrap();
/// assert_eq!(options.get_as::<i32>("primitiveInt").unwrap(), Some(1));
/// assert_eq!(options.get_as::<String>("string").unwrap().as_deref(), Some("test"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsFactory;

impl OptionsFactory {
    /// Builds a snapshot of `schema` from program arguments alone.
    pub fn create<I, S>(schema: &Arc<Schema>, args: I) -> Result<Options>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(schema).args(args).create()
    }

    /// Builds a snapshot with prefill `values` (lowest priority).
    pub fn create_with_values<I, S>(schema: &Arc<Schema>, values: ValueMap, args: I) -> Result<Options>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(schema).values(values).args(args).create()
    }

    pub fn builder(schema: &Arc<Schema>) -> FactoryBuilder {
        FactoryBuilder {
            schema: Arc::clone(schema),
            values: ValueMap::new(),
            extensions: Vec::new(),
            args: Vec::new(),
            env: None,
        }
    }

    /// Independent copy of `options`, rebuilt through the pipeline.
    pub fn clone_options(options: &Options) -> Result<Options> {
        options.to_builder().build()
    }

    pub fn validate(options: &Options) -> BTreeSet<Violation> {
        validate::validate(options)
    }
}

/// Configures one snapshot construction.
#[must_use]
pub struct FactoryBuilder {
    schema: Arc<Schema>,
    values: ValueMap,
    extensions: Vec<Arc<dyn OptionsExtension>>,
    args: Vec<String>,
    env: Option<Arc<dyn EnvProvider>>,
}

impl FactoryBuilder {
    /// Prefills one option, addressed by name or alias.
    pub fn value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn values(mut self, values: ValueMap) -> Self {
        self.values.extend(values);
        self
    }

    /// Prefills from a JSON object; nested objects fill nested options and
    /// `null` entries are ignored.
    pub fn json_values(mut self, json: serde_json::Value) -> Result<Self> {
        match Value::from_json(json) {
            Some(Value::Map(map)) => {
                self.values.extend(map);
                Ok(self)
            }
            None => Ok(self),
            Some(other) => Err(OptionsError::type_mismatch(
                self.schema.name(),
                "a JSON object",
                other.type_name(),
                "prefill values must be keyed by option name",
            )),
        }
    }

    /// Adds a dynamic extension.
    pub fn extension(mut self, extension: Arc<dyn OptionsExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Environment used by the loaders; defaults to [`Environment::global`].
    pub fn environment(mut self, env: Arc<dyn EnvProvider>) -> Self {
        self.env = Some(env);
        self
    }

    /// The seeded builder, before any extension ran.
    pub fn into_builder(self) -> Result<OptionsBuilder> {
        let definitions = self.schema.definitions()?;
        let env: Arc<dyn EnvProvider> = match self.env {
            Some(env) => env,
            None => Environment::global(),
        };
        OptionsBuilder::seeded(
            &self.schema,
            definitions,
            self.values,
            Origin::Prefill,
            Arc::from(self.args),
            self.extensions,
            env,
        )
    }

    pub fn create(self) -> Result<Options> {
        self.into_builder()?.build()
    }

    /// Like [`create`](Self::create) but fails with
    /// [`OptionsError::ValidationFailure`] when any constraint is violated.
    pub fn create_validated(self) -> Result<Options> {
        self.create()?.validated()
    }
}

/// Applies the extensions of the builder's schema and its dynamic
/// extensions, then materializes the snapshot.
pub(crate) fn build_options(mut builder: OptionsBuilder) -> Result<Options> {
    let dynamic = builder.dynamic_extensions().to_vec();
    let plan = resolve_extensions(builder.schema(), &dynamic)?;
    extension::apply(&mut builder, &plan)?;
    debug!(
        schema = %builder.schema().name(),
        extensions = ?plan.ids(),
        "extensions applied"
    );

    let schema = Arc::clone(builder.schema());
    let definitions = Arc::clone(builder.definitions());
    let args = builder.shared_args();
    let env = Arc::clone(builder.environment());
    let validators = plan.validators().cloned().collect();

    let mut entries = std::collections::BTreeMap::new();
    for (name, slot) in builder.into_slots() {
        let entry = match slot {
            Slot::Value { value, origin } => Entry::Value { value, origin },
            Slot::Nested(nested) => Entry::Nested(build_options(*nested)?),
        };
        entries.insert(name, entry);
    }

    Ok(Options::new(Inner {
        schema,
        definitions,
        entries,
        args,
        dynamic_extensions: dynamic,
        validators,
        env,
    }))
}
