//! Error types for schema scanning, staging and resolution.
//!
//! Structural errors ([`ReservedName`](OptionsError::ReservedName),
//! [`SchemaConflict`](OptionsError::SchemaConflict),
//! [`IllegalExtension`](OptionsError::IllegalExtension)) indicate a broken
//! schema declaration and are raised when a schema is scanned. The remaining
//! variants are raised by the `set`/`build`/`validate` call that hit them.

use std::fmt;

use thiserror::Error;

use crate::validate::Violation;

/// Errors that can occur while resolving options.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// A key (canonical name or alias) does not address any option.
    #[error("invalid key: {key} (schema {schema})")]
    InvalidKey { key: String, schema: String },

    /// A schema declares an accessor whose name is reserved by the snapshot API.
    #[error("the option name {name} is reserved (declared in {schema})")]
    ReservedName { name: String, schema: String },

    /// Two inheritance branches declare the same option incompatibly, or two
    /// options claim the same alias.
    #[error("option {name} is defined multiple times in {first} and {second}: {detail}")]
    SchemaConflict {
        name: String,
        first: String,
        second: String,
        detail: String,
    },

    /// A value cannot be coerced to the declared type of its option.
    #[error("cannot convert {value} to {expected} for option {option}: {reason}")]
    TypeMismatch {
        option: String,
        expected: String,
        value: String,
        reason: String,
    },

    /// Extension exclusivity was violated.
    #[error("illegal extension: {0}")]
    IllegalExtension(String),

    /// Validation was requested and produced at least one violation.
    #[error("{0}")]
    ValidationFailure(ValidationFailure),

    /// A program argument does not follow the configured argument format.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The schema declares no wither for the option.
    #[error("option {name} of {schema} has no wither")]
    WitherUnavailable { name: String, schema: String },

    /// A computed default value failed to evaluate.
    #[error("default value of option {option} cannot be computed: {message}")]
    DefaultValue { option: String, message: String },
}

impl OptionsError {
    pub(crate) fn invalid_key(key: impl Into<String>, schema: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            schema: schema.into(),
        }
    }

    pub(crate) fn type_mismatch(
        option: impl Into<String>,
        expected: impl fmt::Display,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            option: option.into(),
            expected: expected.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// The aggregated violations of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    violations: Vec<Violation>,
}

impl ValidationFailure {
    pub fn new(violations: impl IntoIterator<Item = Violation>) -> Self {
        let mut violations: Vec<Violation> = violations.into_iter().collect();
        violations.sort();
        violations.dedup();
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut messages: Vec<&str> = self.violations.iter().map(|v| v.message.as_str()).collect();
        messages.sort_unstable();
        write!(f, "{} options validation failed:", self.violations.len())?;
        for message in messages {
            write!(f, "\n{message}")?;
        }
        Ok(())
    }
}

/// Convenience alias for results with [`OptionsError`].
pub type Result<T> = std::result::Result<T, OptionsError>;
