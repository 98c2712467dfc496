//! Schema-driven options resolution.
//!
//! This crate turns a declarative schema of named, typed options into an
//! immutable, validated [`Options`] snapshot:
//!
//! - [`Schema`]: options declared with [`OptionDecl`], inheritance through
//!   [`SchemaBuilder::extends`], withers and extensions.
//! - [`DefinitionSet`]: the flattened, conflict-checked definitions of a
//!   schema hierarchy, including nested schemas.
//! - [`OptionsBuilder`]: staged values, coerced to their declared type.
//! - [`OptionsExtension`]: loaders (program arguments, environment
//!   variables, `.env` files, custom) and validators, applied in
//!   [`ExtensionStage`] priority order.
//! - [`OptionsFactory`]: orchestrates scanning, loading and materializing.
//!
//! Validation ([`validate`]) checks the declared [`Constraint`]s of every
//! option, nested ones included, and reports path-addressed [`Violation`]s.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use option_schema_core::*;
//!
//! let db = Schema::builder("JdbcOptions")
//!     .option(OptionDecl::new("host", ValueType::String).constraint(Constraint::not_null()))
//!     .option(OptionDecl::new("port", ValueType::Int).default_value(3306))
//!     .build();
//! let app = Schema::builder("MyOptions")
//!     .option(OptionDecl::new("primarydb", ValueType::nested(&db)))
//!     .extension(Arc::new(EnvironmentVariables))
//!     .extension(Arc::new(ArgumentsEquals))
//!     .build();
//!
//! let env = Arc::new(Environment::with_vars([("PRIMARYDB__HOST", "db.local")]));
//! let options = OptionsFactory::builder(&app)
//!     .args(["--primarydb.port=5432"])
//!     .environment(env)
//!     .create()
//!     .unwrap();
//!
//! assert_eq!(
//!     options.get_path(&["primarydb", "host"]).unwrap(),
//!     Some(Value::from("db.local"))
//! );
//! assert_eq!(options.nested("primarydb").unwrap().get_as::<i32>("port").unwrap(), Some(5432));
//! assert!(options.is_valid());
//! ```

mod builder;
mod coerce;
mod constraint;
mod definition;
mod error;
pub mod extension;
mod factory;
mod options;
mod path;
mod scanner;
mod schema;
mod types;
mod validate;
mod value;

pub use builder::{OptionsBuilder, Origin};
pub use coerce::{COLLECTION_SEPARATOR, DefaultParser, ESCAPE, ValueParser, coerce_value, fits, split_escaped};
pub use constraint::{Constraint, ConstraintKind, Predicate};
pub use definition::{DefinitionReport, DefinitionSet, OptionDef, upper_snake_case};
pub use error::{OptionsError, Result, ValidationFailure};
pub use extension::{
    ArgumentsEquals, ArgumentsSpace, EnvProvider, Environment, EnvironmentFile,
    EnvironmentVariables, ExtensionPlan, ExtensionStage, OptionsExtension, resolve_extensions,
};
pub use factory::{FactoryBuilder, OptionsFactory};
pub use options::Options;
pub use path::OptionPath;
pub use schema::{
    DefaultValue, OptionDecl, RESERVED_NAMES, Schema, SchemaBuilder, ValueView, WitherDecl,
};
pub use types::{CustomConversion, CustomType, EnumType, ValueType};
pub use validate::{Violation, validate};
pub use value::{FromValue, Value, ValueMap};
