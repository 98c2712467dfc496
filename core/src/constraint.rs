//! Constraint markers attached to option declarations.
//!
//! A [`Constraint`] only knows whether a value is invalid; collecting
//! violations across a snapshot is done by [`crate::validate`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::value::Value;

/// Predicate of a custom constraint; returns `true` when the value is valid.
pub type Predicate = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync + 'static>;

/// Kind of a constraint, reported in violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConstraintKind {
    NotNull,
    NotEmpty,
    NotBlank,
    Size,
    Min,
    Max,
    DecimalMin,
    DecimalMax,
    Positive,
    PositiveOrZero,
    Pattern,
    Custom,
    /// Raised for `required` options without a value.
    Required,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone)]
enum Rule {
    NotNull,
    NotEmpty,
    NotBlank,
    Size { min: usize, max: usize },
    Min(i64),
    Max(i64),
    DecimalMin { value: Decimal, inclusive: bool },
    DecimalMax { value: Decimal, inclusive: bool },
    Positive,
    PositiveOrZero,
    Pattern { source: String, regex: Regex },
    Custom { name: String, predicate: Predicate },
}

/// A validation marker on one option.
///
/// Every constraint except the null checks accepts an absent value.
///
/// # Examples
///
/// ```
/// use option_schema_core::{Constraint, Value};
///
/// let port = Constraint::max(65535);
/// assert!(!port.is_invalid(Some(&Value::Int(3306))));
/// assert!(port.is_invalid(Some(&Value::Int(70000))));
/// assert!(!port.is_invalid(None));
/// ```
#[derive(Clone)]
pub struct Constraint {
    rule: Rule,
    message: Option<String>,
}

impl Constraint {
    fn new(rule: Rule) -> Self {
        Self { rule, message: None }
    }

    pub fn not_null() -> Self {
        Self::new(Rule::NotNull)
    }

    /// Not absent, and not an empty string or collection.
    pub fn not_empty() -> Self {
        Self::new(Rule::NotEmpty)
    }

    /// Not absent, and not a string made of whitespace only.
    pub fn not_blank() -> Self {
        Self::new(Rule::NotBlank)
    }

    /// Length of a string or collection within `min..=max`.
    pub fn size(min: usize, max: usize) -> Self {
        Self::new(Rule::Size { min, max })
    }

    pub fn min(value: i64) -> Self {
        Self::new(Rule::Min(value))
    }

    pub fn max(value: i64) -> Self {
        Self::new(Rule::Max(value))
    }

    pub fn decimal_min(value: Decimal, inclusive: bool) -> Self {
        Self::new(Rule::DecimalMin { value, inclusive })
    }

    pub fn decimal_max(value: Decimal, inclusive: bool) -> Self {
        Self::new(Rule::DecimalMax { value, inclusive })
    }

    pub fn positive() -> Self {
        Self::new(Rule::Positive)
    }

    pub fn positive_or_zero() -> Self {
        Self::new(Rule::PositiveOrZero)
    }

    /// The whole textual value must match `pattern`.
    pub fn pattern(pattern: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self::new(Rule::Pattern {
            source: pattern.to_string(),
            regex,
        }))
    }

    pub fn custom<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self::new(Rule::Custom {
            name: name.to_string(),
            predicate: Arc::new(predicate),
        })
    }

    /// Replaces the default violation message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn kind(&self) -> ConstraintKind {
        match &self.rule {
            Rule::NotNull => ConstraintKind::NotNull,
            Rule::NotEmpty => ConstraintKind::NotEmpty,
            Rule::NotBlank => ConstraintKind::NotBlank,
            Rule::Size { .. } => ConstraintKind::Size,
            Rule::Min(_) => ConstraintKind::Min,
            Rule::Max(_) => ConstraintKind::Max,
            Rule::DecimalMin { .. } => ConstraintKind::DecimalMin,
            Rule::DecimalMax { .. } => ConstraintKind::DecimalMax,
            Rule::Positive => ConstraintKind::Positive,
            Rule::PositiveOrZero => ConstraintKind::PositiveOrZero,
            Rule::Pattern { .. } => ConstraintKind::Pattern,
            Rule::Custom { .. } => ConstraintKind::Custom,
        }
    }

    /// Whether `value` violates this constraint.
    pub fn is_invalid(&self, value: Option<&Value>) -> bool {
        match (&self.rule, value) {
            (Rule::NotNull, value) => value.is_none(),
            (Rule::NotEmpty, None) | (Rule::NotBlank, None) => true,
            (Rule::NotEmpty, Some(value)) => length(value) == Some(0),
            (Rule::NotBlank, Some(value)) => value.as_str().is_some_and(|s| s.trim().is_empty()),
            (Rule::Custom { predicate, .. }, value) => !predicate(value),
            (_, None) => false,
            (Rule::Size { min, max }, Some(value)) => {
                length(value).is_some_and(|len| len < *min || len > *max)
            }
            (Rule::Min(min), Some(value)) => {
                compare(value, Decimal::from(*min)) == Some(Ordering::Less)
            }
            (Rule::Max(max), Some(value)) => {
                compare(value, Decimal::from(*max)) == Some(Ordering::Greater)
            }
            (Rule::DecimalMin { value: min, inclusive }, Some(value)) => match compare(value, *min) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => !inclusive,
                _ => false,
            },
            (Rule::DecimalMax { value: max, inclusive }, Some(value)) => match compare(value, *max) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => !inclusive,
                _ => false,
            },
            (Rule::Positive, Some(value)) => sign(value).is_some_and(|s| s <= 0),
            (Rule::PositiveOrZero, Some(value)) => sign(value).is_some_and(|s| s < 0),
            (Rule::Pattern { regex, .. }, Some(value)) => {
                value.as_str().is_some_and(|s| !regex.is_match(s))
            }
        }
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        Value::Set(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        _ => None,
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_decimal(),
    }
}

/// Orders a numeric `value` against `bound`. Floating point values, and
/// text that only parses as one, are compared as `f64` so magnitudes outside
/// the range or precision of `Decimal` still order correctly.
fn compare(value: &Value, bound: Decimal) -> Option<Ordering> {
    let float = match value {
        Value::Float(v) => Some(f64::from(*v)),
        Value::Double(v) => Some(*v),
        Value::String(s) if decimal(value).is_none() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match float {
        Some(v) => v.partial_cmp(&bound.to_f64()?),
        None => decimal(value).map(|v| v.cmp(&bound)),
    }
}

fn sign(value: &Value) -> Option<i8> {
    let number = match value {
        Value::Float(v) => f64::from(*v),
        Value::Double(v) => *v,
        other => {
            let d = decimal(other)?;
            return Some(if d.is_zero() {
                0
            } else if d.is_sign_negative() {
                -1
            } else {
                1
            });
        }
    };
    if number.is_nan() {
        None
    } else if number > 0.0 {
        Some(1)
    } else if number < 0.0 {
        Some(-1)
    } else {
        Some(0)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        let same_predicate = match (&self.rule, &other.rule) {
            (Rule::Custom { predicate: a, .. }, Rule::Custom { predicate: b, .. }) => Arc::ptr_eq(a, b),
            _ => true,
        };
        same_predicate && self.message == other.message && self.to_string() == other.to_string()
    }
}

impl Eq for Constraint {}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Rule::Size { min, max } => write!(f, "Size(min={min}, max={max})"),
            Rule::Min(v) => write!(f, "Min({v})"),
            Rule::Max(v) => write!(f, "Max({v})"),
            Rule::DecimalMin { value, inclusive } => {
                write!(f, "DecimalMin({value}, inclusive={inclusive})")
            }
            Rule::DecimalMax { value, inclusive } => {
                write!(f, "DecimalMax({value}, inclusive={inclusive})")
            }
            Rule::Pattern { source, .. } => write!(f, "Pattern({source})"),
            Rule::Custom { name, .. } => write!(f, "Custom({name})"),
            _ => write!(f, "{}", self.kind()),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("rule", &self.to_string())
            .field("message", &self.message)
            .finish()
    }
}
