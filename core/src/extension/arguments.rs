//! Program argument loaders.
//!
//! Option names are written with dotted paths for nested options:
//! `--primarydb.host=localhost` ([`ArgumentsEquals`]) or
//! `--primarydb.host localhost` ([`ArgumentsSpace`]). The `--envFile=<path>`
//! argument belongs to [`EnvironmentFile`](super::EnvironmentFile) and is
//! skipped by both.

use tracing::debug;

use super::{ExtensionStage, OptionsExtension};
use crate::builder::OptionsBuilder;
use crate::error::{OptionsError, Result};

/// Argument that selects the environment file.
pub const ENV_FILE_ARGUMENT: &str = "--envFile=";

const ORIGIN: &str = "program argument";

/// Loads `--name=value` arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentsEquals;

impl OptionsExtension for ArgumentsEquals {
    fn id(&self) -> &str {
        "ArgumentsEquals"
    }

    fn stage(&self) -> ExtensionStage {
        ExtensionStage::Arguments
    }

    fn extend(&self, builder: &mut OptionsBuilder) -> Result<()> {
        let args = builder.shared_args();
        for arg in args.iter() {
            if arg.starts_with(ENV_FILE_ARGUMENT) {
                continue;
            }
            let name = flag_name(arg, "--name=value")?;
            let (name, value) = name.split_once('=').ok_or_else(|| {
                OptionsError::InvalidArgument(format!("expected --name=value, got '{arg}'"))
            })?;
            load(builder, name, value, arg)?;
        }
        Ok(())
    }
}

/// Loads `--name value` argument pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentsSpace;

impl OptionsExtension for ArgumentsSpace {
    fn id(&self) -> &str {
        "ArgumentsSpace"
    }

    fn stage(&self) -> ExtensionStage {
        ExtensionStage::Arguments
    }

    fn extend(&self, builder: &mut OptionsBuilder) -> Result<()> {
        let args = builder.shared_args();
        let mut tokens = args.iter().filter(|arg| !arg.starts_with(ENV_FILE_ARGUMENT));
        while let Some(arg) = tokens.next() {
            let name = flag_name(arg, "--name value")?;
            let value = tokens.next().ok_or_else(|| {
                OptionsError::InvalidArgument(format!("missing value for argument '{arg}'"))
            })?;
            load(builder, name, value, arg)?;
        }
        Ok(())
    }
}

fn flag_name<'a>(arg: &'a str, form: &str) -> Result<&'a str> {
    arg.strip_prefix("--")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| OptionsError::InvalidArgument(format!("expected {form}, got '{arg}'")))
}

fn load(builder: &mut OptionsBuilder, name: &str, value: &str, arg: &str) -> Result<()> {
    let path: Vec<&str> = name.split('.').collect();
    if !builder.load(&path, value, ORIGIN, arg)? {
        debug!(argument = %arg, "argument not applied");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::factory::OptionsFactory;
    use crate::extension::provider::Environment;
    use crate::schema::{OptionDecl, Schema};
    use crate::types::ValueType;
    use crate::value::Value;

    fn schema(extension: Arc<dyn OptionsExtension>) -> Arc<Schema> {
        let strings = Schema::builder("Strings")
            .option(OptionDecl::new("string", ValueType::String))
            .build();
        Schema::builder("Args")
            .option(OptionDecl::new("primitiveInt", ValueType::Int).primitive())
            .option(OptionDecl::new("string", ValueType::String))
            .option(OptionDecl::new("nested", ValueType::nested(&strings)))
            .extension(extension)
            .build()
    }

    fn create(extension: Arc<dyn OptionsExtension>, args: &[&str]) -> Result<crate::Options> {
        OptionsFactory::builder(&schema(extension))
            .args(args.iter().copied())
            .environment(Arc::new(Environment::isolated()))
            .create()
    }

    #[test]
    fn test_equals_form() {
        let options = create(
            Arc::new(ArgumentsEquals),
            &["--primitiveInt=1", "--string=test", "--nested.string=inner=x"],
        )
        .unwrap();
        assert_eq!(options.get("primitiveInt").unwrap(), Some(Value::Int(1)));
        assert_eq!(options.get("string").unwrap(), Some(Value::from("test")));
        assert_eq!(
            options.get_path(&["nested", "string"]).unwrap(),
            Some(Value::from("inner=x"))
        );
    }

    #[test]
    fn test_space_form() {
        let options = create(
            Arc::new(ArgumentsSpace),
            &["--primitiveInt", "7", "--envFile=.env.test", "--string", "a b"],
        )
        .unwrap();
        assert_eq!(options.get("primitiveInt").unwrap(), Some(Value::Int(7)));
        assert_eq!(options.get("string").unwrap(), Some(Value::from("a b")));
    }

    #[test]
    fn test_malformed_arguments() {
        let err = create(Arc::new(ArgumentsEquals), &["string=test"]).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidArgument(_)));

        let err = create(Arc::new(ArgumentsEquals), &["--string"]).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidArgument(_)));

        let err = create(Arc::new(ArgumentsSpace), &["--string"]).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidArgument(ref m) if m.contains("missing value")));
    }

    #[test]
    fn test_unknown_argument_is_ignored() {
        let options = create(Arc::new(ArgumentsEquals), &["--unknown=1", "--string=x"]).unwrap();
        assert_eq!(options.get("string").unwrap(), Some(Value::from("x")));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let options = create(Arc::new(ArgumentsEquals), &["--string=first", "--string=second"]).unwrap();
        assert_eq!(options.get("string").unwrap(), Some(Value::from("first")));
    }

    #[test]
    fn test_bad_value_is_a_type_mismatch() {
        let err = create(Arc::new(ArgumentsEquals), &["--primitiveInt=abc"]).unwrap_err();
        assert!(matches!(err, OptionsError::TypeMismatch { .. }));
    }
}
