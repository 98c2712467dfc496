//! Extension pipeline.
//!
//! Extensions either load values into an [`OptionsBuilder`] or inspect a
//! built [`Options`] snapshot for violations. Each extension belongs to an
//! [`ExtensionStage`]; loader stages are applied highest priority first and
//! loaders never replace a value staged by an earlier (higher priority)
//! loader, so the highest priority source wins.
//!
//! A schema declares its extensions with [`SchemaBuilder::extension`];
//! callers add dynamic extensions through the factory. Both sets are merged
//! by [`resolve_extensions`], which enforces stage exclusivity.
//!
//! [`SchemaBuilder::extension`]: crate::SchemaBuilder::extension

pub mod arguments;
pub mod env_file;
pub mod environment;
pub mod provider;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::builder::OptionsBuilder;
use crate::error::{OptionsError, Result};
use crate::options::Options;
use crate::schema::Schema;
use crate::validate::Violation;

pub use arguments::{ArgumentsEquals, ArgumentsSpace};
pub use env_file::EnvironmentFile;
pub use environment::EnvironmentVariables;
pub use provider::{EnvProvider, Environment};

/// Pipeline stage of an extension, in ascending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStage {
    /// User supplied loaders; several may coexist.
    Custom,
    File,
    Database,
    Environment,
    Arguments,
    /// Validators; run only when validation is requested.
    Validation,
}

impl ExtensionStage {
    /// At most one extension of an exclusive stage is active per schema.
    pub fn is_exclusive(self) -> bool {
        !matches!(self, Self::Custom | Self::Validation)
    }

    pub fn is_loader(self) -> bool {
        self != Self::Validation
    }
}

impl fmt::Display for ExtensionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Custom => "custom",
            Self::File => "file",
            Self::Database => "database",
            Self::Environment => "environment",
            Self::Arguments => "arguments",
            Self::Validation => "validation",
        };
        f.write_str(name)
    }
}

/// A pluggable loader or validator.
///
/// Loaders override [`extend`](Self::extend) and write through
/// [`OptionsBuilder::load`]; validators override
/// [`validate`](Self::validate).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use option_schema_core::*;
///
/// #[derive(Debug)]
/// struct Fixed;
///
/// impl OptionsExtension for Fixed {
///     fn id(&self) -> &str {
///         "Fixed"
///     }
///
///     fn stage(&self) -> ExtensionStage {
///         ExtensionStage::Custom
///     }
///
///     fn extend(&self, builder: &mut OptionsBuilder) -> Result<()> {
///         builder.load(&["host"], "db.internal", "fixed value", "Fixed")?;
///         Ok(())
///     }
/// }
///
/// let schema = Schema::builder("Db")
///     .option(OptionDecl::new("host", ValueType::String))
///     .build();
/// let options = OptionsFactory::builder(&schema)
///     .extension(Arc::new(Fixed))
///     .environment(Arc::new(Environment::isolated()))
///     .create()
///     .unwrap();
/// assert_eq!(options.get_as::<String>("host").unwrap().as_deref(), Some("db.internal"));
/// ```
pub trait OptionsExtension: fmt::Debug + Send + Sync {
    /// Stable identifier used in logs and exclusivity errors.
    fn id(&self) -> &str;

    fn stage(&self) -> ExtensionStage;

    /// Loads values into `builder`.
    fn extend(&self, builder: &mut OptionsBuilder) -> Result<()> {
        let _ = builder;
        Ok(())
    }

    /// Inspects a built snapshot.
    fn validate(&self, options: &Options) -> Vec<Violation> {
        let _ = options;
        Vec::new()
    }
}

/// An extension together with the schema that declared it.
#[derive(Debug, Clone)]
struct Declared {
    extension: Arc<dyn OptionsExtension>,
    declared_in: String,
}

impl Declared {
    fn is_same(&self, other: &Declared) -> bool {
        self.extension.id() == other.extension.id() && self.declared_in == other.declared_in
    }
}

/// Extensions of one schema, ordered by descending stage priority.
#[derive(Debug, Clone, Default)]
pub struct ExtensionPlan {
    extensions: Vec<Arc<dyn OptionsExtension>>,
}

impl ExtensionPlan {
    /// Loader extensions in application order.
    pub fn loaders(&self) -> impl Iterator<Item = &Arc<dyn OptionsExtension>> {
        self.extensions.iter().filter(|e| e.stage().is_loader())
    }

    pub fn validators(&self) -> impl Iterator<Item = &Arc<dyn OptionsExtension>> {
        self.extensions
            .iter()
            .filter(|e| e.stage() == ExtensionStage::Validation)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Merges the extensions declared on `schema` and its ancestors with the
/// `dynamic` ones and orders them for application.
///
/// # Errors
///
/// [`OptionsError::IllegalExtension`] when one schema declares two
/// extensions of the same exclusive stage, when a dynamic extension targets
/// an exclusive stage that is already occupied, or when two dynamic
/// extensions share an exclusive stage.
pub fn resolve_extensions(
    schema: &Schema,
    dynamic: &[Arc<dyn OptionsExtension>],
) -> Result<ExtensionPlan> {
    let mut all: Vec<Declared> = declared(schema)?;

    for extension in dynamic {
        let stage = extension.stage();
        if stage.is_exclusive() {
            if let Some(dup) = dynamic
                .iter()
                .find(|other| !Arc::ptr_eq(other, extension) && other.stage() == stage)
            {
                return Err(OptionsError::IllegalExtension(format!(
                    "multiple dynamic extensions of exclusive stage {stage} for {}: {} and {}",
                    schema.name(),
                    extension.id(),
                    dup.id()
                )));
            }
            if let Some(existing) = all.iter().find(|d| d.extension.stage() == stage) {
                return Err(OptionsError::IllegalExtension(format!(
                    "cannot add dynamic extension {} of exclusive stage {stage}: {} already \
                     declares {}",
                    extension.id(),
                    existing.declared_in,
                    existing.extension.id()
                )));
            }
        }
        all.push(Declared {
            extension: Arc::clone(extension),
            declared_in: format!("{} (dynamic)", schema.name()),
        });
    }

    // stable: within a stage, declaration order is kept
    all.sort_by(|a, b| b.extension.stage().cmp(&a.extension.stage()));
    Ok(ExtensionPlan {
        extensions: all.into_iter().map(|d| d.extension).collect(),
    })
}

/// Extensions declared on `schema` and inherited from its parents.
fn declared(schema: &Schema) -> Result<Vec<Declared>> {
    let mut own: Vec<Declared> = Vec::new();
    for extension in schema.extensions() {
        let stage = extension.stage();
        if stage.is_exclusive() {
            let same: Vec<&str> = schema
                .extensions()
                .iter()
                .filter(|e| e.stage() == stage)
                .map(|e| e.id())
                .collect();
            if same.len() > 1 {
                return Err(OptionsError::IllegalExtension(format!(
                    "{} declares more than one ({}) exclusive extension of the same stage {stage}: {}",
                    schema.name(),
                    same.len(),
                    same.join(", ")
                )));
            }
        }
        own.push(Declared {
            extension: Arc::clone(extension),
            declared_in: schema.name().to_string(),
        });
    }

    for parent in schema.parents() {
        for inherited in declared(parent)? {
            let stage = inherited.extension.stage();
            if own.iter().any(|d| d.is_same(&inherited)) {
                continue;
            }
            if stage.is_exclusive() {
                if let Some(preferred) = own.iter().find(|d| d.extension.stage() == stage) {
                    info!(
                        extension = %inherited.extension.id(),
                        declared_in = %inherited.declared_in,
                        preferred = %preferred.extension.id(),
                        preferred_in = %preferred.declared_in,
                        "inherited extension is overridden"
                    );
                    continue;
                }
            }
            own.push(inherited);
        }
    }
    Ok(own)
}

/// Runs every loader of `plan` against `builder`.
pub fn apply(builder: &mut OptionsBuilder, plan: &ExtensionPlan) -> Result<()> {
    for extension in plan.loaders() {
        debug!(
            schema = %builder.schema().name(),
            extension = %extension.id(),
            stage = %extension.stage(),
            "applying extension"
        );
        extension.extend(builder)?;
    }
    Ok(())
}
