//! Constraint validation of built snapshots.
//!
//! Every definition, nested ones included, is checked against its declared
//! constraints using the resolved value (staged, default or absent). The
//! validation extensions of each level run afterwards. Violations of all
//! levels are collected into one ordered set.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use option_schema_core::*;
//!
//! let schema = Schema::builder("Db")
//!     .option(
//!         OptionDecl::new("port", ValueType::Int)
//!             .default_value(3306)
//!             .constraint(Constraint::max(65535)),
//!     )
//!     .build();
//! let options = OptionsFactory::builder(&schema)
//!     .value("port", 70000)
//!     .environment(Arc::new(Environment::isolated()))
//!     .create()
//!     .unwrap();
//!
//! let violations = validate(&options);
//! assert_eq!(violations.len(), 1);
//! assert_eq!(
//!     violations.first().unwrap().message,
//!     "Option 'port' is not valid: Max"
//! );
//! ```

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::constraint::{Constraint, ConstraintKind};
use crate::definition::OptionDef;
use crate::options::Options;
use crate::path::OptionPath;
use crate::value::Value;

/// One failed constraint on one option.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Violation {
    pub path: OptionPath,
    pub kind: ConstraintKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_value: Option<Value>,
}

impl Violation {
    /// A violation with the standard message for `kind`.
    pub fn new(path: OptionPath, kind: ConstraintKind, invalid_value: Option<Value>) -> Self {
        let name = path.last().unwrap_or_default();
        let message = format!("Option '{name}' is not valid: {kind}");
        Self {
            path,
            kind,
            message,
            invalid_value,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn of(def: &OptionDef, constraint: &Constraint, value: Option<&Value>) -> Self {
        let violation = Self::new(def.path().clone(), constraint.kind(), value.cloned());
        match constraint.message() {
            Some(message) => violation.with_message(message),
            None => violation,
        }
    }
}

/// Validates `options` and every nested snapshot.
pub fn validate(options: &Options) -> BTreeSet<Violation> {
    let mut violations = BTreeSet::new();
    collect(options, &mut violations);
    violations
}

fn collect(options: &Options, violations: &mut BTreeSet<Violation>) {
    for def in options.definitions().iter() {
        if def.is_nested() {
            if let Ok(nested) = options.nested(def.name()) {
                collect(nested, violations);
            }
            continue;
        }

        let value = match options.get(def.name()) {
            Ok(value) => value,
            Err(e) => {
                warn!(option = %def.path(), error = %e, "value cannot be retrieved, validating as absent");
                None
            }
        };
        if def.is_required() && value.is_none() {
            violations.insert(Violation::new(def.path().clone(), ConstraintKind::Required, None));
        }
        for constraint in def.constraints() {
            if constraint.is_invalid(value.as_ref()) {
                violations.insert(Violation::of(def, constraint, value.as_ref()));
            }
        }
    }

    for validator in options.validators() {
        violations.extend(validator.validate(options));
    }
}
