//! Value coercion.
//!
//! Turns strings and loosely typed values into values of an option's declared
//! type. Strings go through a [`ValueParser`]; already typed values are kept
//! when they fit, widened when the widening is lossless, and otherwise
//! rendered and parsed again.
//!
//! # Examples
//!
//! ```
//! use option_schema_core::{DefaultParser, Value, ValueParser, ValueType};
//!
//! let parser = DefaultParser;
//! let list = parser
//!     .parse(&ValueType::list(ValueType::String), "a\\,b,c")
//!     .unwrap();
//! assert_eq!(list, Value::List(vec!["a,b".into(), "c".into()]));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::types::ValueType;
use crate::value::Value;

/// Separator between collection elements in textual form.
pub const COLLECTION_SEPARATOR: char = ',';

/// Marks a following separator as a literal character.
pub const ESCAPE: char = '\\';

/// Converts text into a value of a declared type.
///
/// Parsers are identified by [`id`](ValueParser::id); two option
/// declarations are only strongly equal when their parser ids match.
pub trait ValueParser: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Parses `text` as `target`; the error is a human-readable reason.
    fn parse(&self, target: &ValueType, text: &str) -> std::result::Result<Value, String>;
}

/// The parser used when an option declares none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParser;

impl DefaultParser {
    pub const ID: &'static str = "default";

    /// Shared instance.
    pub fn shared() -> Arc<dyn ValueParser> {
        static SHARED: OnceLock<Arc<dyn ValueParser>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(DefaultParser)))
    }

    fn parse_scalar(&self, target: &ValueType, text: &str) -> std::result::Result<Value, String> {
        match target {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Bool => parse_bool(text).map(Value::Bool),
            ValueType::Byte => parse_number(text).map(Value::Byte),
            ValueType::Short => parse_number(text).map(Value::Short),
            ValueType::Int => parse_number(text).map(Value::Int),
            ValueType::Long => parse_number(text).map(Value::Long),
            ValueType::Float => parse_number(text).map(Value::Float),
            ValueType::Double => parse_number(text).map(Value::Double),
            ValueType::Decimal => Decimal::from_str(text.trim())
                .or_else(|_| Decimal::from_scientific(text.trim()))
                .map(Value::Decimal)
                .map_err(|e| e.to_string()),
            ValueType::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(format!("expected exactly one character, got {:?}", text)),
                }
            }
            ValueType::Enum(enum_type) => match enum_type.matching(text.trim()).as_slice() {
                [constant] => Ok(Value::Enum((*constant).to_string())),
                [] => Err(format!(
                    "{text} does not match any of the enum values of {}",
                    enum_type.name
                )),
                _ => Err(format!(
                    "{text} matches multiple enum values of {}",
                    enum_type.name
                )),
            },
            ValueType::Date => parse_temporal(text).map(|t| Value::Date(t.to_utc())),
            ValueType::LocalDate => parse_temporal(text).map(|t| Value::LocalDate(t.to_naive().date())),
            ValueType::LocalDateTime => parse_temporal(text).map(|t| Value::LocalDateTime(t.to_naive())),
            ValueType::OffsetDateTime => parse_temporal(text).map(|t| Value::OffsetDateTime(t.to_offset())),
            ValueType::Custom(custom) => custom.convert(text),
            ValueType::List(_) | ValueType::Set(_) => {
                Err("collections of collections are not supported".to_string())
            }
            ValueType::Map(_, _) => Err("map types are not supported".to_string()),
            ValueType::Nested(schema) => Err(format!(
                "nested options of {} cannot be parsed from text",
                schema.name()
            )),
        }
    }
}

impl ValueParser for DefaultParser {
    fn id(&self) -> &str {
        Self::ID
    }

    fn parse(&self, target: &ValueType, text: &str) -> std::result::Result<Value, String> {
        match target {
            ValueType::List(element) => {
                if text.trim().is_empty() {
                    return Ok(Value::List(Vec::new()));
                }
                split_escaped(text, COLLECTION_SEPARATOR)
                    .iter()
                    .map(|part| self.parse_scalar(element, part))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            ValueType::Set(element) => {
                if text.trim().is_empty() {
                    return Ok(Value::Set(BTreeSet::new()));
                }
                split_escaped(text, COLLECTION_SEPARATOR)
                    .iter()
                    .map(|part| self.parse_scalar(element, part))
                    .collect::<std::result::Result<BTreeSet<_>, _>>()
                    .map(Value::Set)
            }
            other => self.parse_scalar(other, text),
        }
    }
}

/// Splits `text` on every `separator` not preceded by [`ESCAPE`]. An escaped
/// separator or escape character becomes a literal one; any other escape
/// character is kept.
///
/// # Examples
///
/// ```
/// use option_schema_core::split_escaped;
///
/// assert_eq!(split_escaped("a,b\\,c", ','), vec!["a", "b,c"]);
/// assert_eq!(split_escaped("a\\b", ','), vec!["a\\b"]);
/// ```
pub fn split_escaped(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESCAPE && matches!(chars.peek(), Some(&next) if next == separator || next == ESCAPE) {
            current.extend(chars.next());
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Coerces an already typed value to `target`.
///
/// Values that fit are returned unchanged, lossless widenings are applied,
/// collections are coerced element-wise, strings are parsed with `parser`,
/// and anything else is rendered to text and parsed.
pub fn coerce_value(
    parser: &dyn ValueParser,
    target: &ValueType,
    value: Value,
) -> std::result::Result<Value, String> {
    if let ValueType::Map(_, _) = target {
        return Err("map types are not supported".to_string());
    }
    if let ValueType::Nested(schema) = target {
        return Err(format!("expected a map of {} options", schema.name()));
    }
    if let ValueType::Custom(custom) = target {
        return match value {
            Value::String(text) => custom.convert(&text),
            Value::Map(_) => Err(format!("a map cannot be converted to {}", custom.name)),
            other => custom.convert(&other.render()),
        };
    }
    if fits(target, &value) {
        return Ok(value);
    }
    if let Some(widened) = widen(target, &value) {
        return Ok(widened);
    }
    match (target, value) {
        (_, Value::String(text)) => parser.parse(target, &text),
        (ValueType::List(element), Value::List(items)) => items
            .into_iter()
            .map(|item| coerce_value(parser, element, item))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        (ValueType::List(element), Value::Set(items)) => items
            .into_iter()
            .map(|item| coerce_value(parser, element, item))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        (ValueType::Set(element), Value::List(items)) => items
            .into_iter()
            .map(|item| coerce_value(parser, element, item))
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map(Value::Set),
        (ValueType::Set(element), Value::Set(items)) => items
            .into_iter()
            .map(|item| coerce_value(parser, element, item))
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map(Value::Set),
        (_, Value::Map(_)) => Err("a map cannot be converted to a single value".to_string()),
        (_, other) => parser.parse(target, &other.render()),
    }
}

/// Whether `value` already has exactly the declared type.
pub fn fits(target: &ValueType, value: &Value) -> bool {
    match (target, value) {
        (ValueType::Bool, Value::Bool(_))
        | (ValueType::Byte, Value::Byte(_))
        | (ValueType::Short, Value::Short(_))
        | (ValueType::Int, Value::Int(_))
        | (ValueType::Long, Value::Long(_))
        | (ValueType::Float, Value::Float(_))
        | (ValueType::Double, Value::Double(_))
        | (ValueType::Char, Value::Char(_))
        | (ValueType::String, Value::String(_))
        | (ValueType::Decimal, Value::Decimal(_))
        | (ValueType::Date, Value::Date(_))
        | (ValueType::LocalDate, Value::LocalDate(_))
        | (ValueType::LocalDateTime, Value::LocalDateTime(_))
        | (ValueType::OffsetDateTime, Value::OffsetDateTime(_)) => true,
        (ValueType::Enum(enum_type), Value::Enum(constant)) => enum_type.contains(constant),
        (ValueType::List(element), Value::List(items)) => items.iter().all(|i| fits(element, i)),
        (ValueType::Set(element), Value::Set(items)) => items.iter().all(|i| fits(element, i)),
        // Already converted when converting its text gives it back.
        (ValueType::Custom(custom), _) => custom.convert(&value.render()).is_ok_and(|v| v == *value),
        _ => false,
    }
}

fn widen(target: &ValueType, value: &Value) -> Option<Value> {
    match (target, value) {
        (ValueType::Short, Value::Byte(v)) => Some(Value::Short(i16::from(*v))),
        (ValueType::Int, Value::Byte(v)) => Some(Value::Int(i32::from(*v))),
        (ValueType::Int, Value::Short(v)) => Some(Value::Int(i32::from(*v))),
        (ValueType::Long, Value::Byte(_) | Value::Short(_) | Value::Int(_)) => {
            value.as_i64().map(Value::Long)
        }
        // Narrowing is accepted when the value fits, so JSON prefill works.
        (ValueType::Byte, Value::Short(_) | Value::Int(_) | Value::Long(_)) => {
            value.as_i64().and_then(|v| i8::try_from(v).ok()).map(Value::Byte)
        }
        (ValueType::Short, Value::Int(_) | Value::Long(_)) => {
            value.as_i64().and_then(|v| i16::try_from(v).ok()).map(Value::Short)
        }
        (ValueType::Int, Value::Long(v)) => i32::try_from(*v).ok().map(Value::Int),
        (ValueType::Float, Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)) => {
            value.as_i64().map(|v| Value::Float(v as f32))
        }
        (ValueType::Double, Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)) => {
            value.as_i64().map(|v| Value::Double(v as f64))
        }
        (ValueType::Double, Value::Float(v)) => Some(Value::Double(f64::from(*v))),
        (ValueType::Decimal, Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)) => {
            value.as_i64().map(|v| Value::Decimal(Decimal::from(v)))
        }
        (ValueType::Enum(enum_type), Value::String(text)) if enum_type.contains(text) => {
            Some(Value::Enum(text.clone()))
        }
        _ => None,
    }
}

fn parse_bool(text: &str) -> std::result::Result<bool, String> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("{text:?} is neither true nor false"))
    }
}

fn parse_number<T>(text: &str) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    text.trim().parse::<T>().map_err(|e| e.to_string())
}

/// A parsed point in time, before it is narrowed to the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Temporal {
    Offset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Temporal {
    fn to_utc(self) -> DateTime<Utc> {
        match self {
            Self::Offset(dt) => dt.with_timezone(&Utc),
            Self::Naive(dt) => dt.and_utc(),
        }
    }

    fn to_naive(self) -> NaiveDateTime {
        match self {
            Self::Offset(dt) => dt.naive_local(),
            Self::Naive(dt) => dt,
        }
    }

    fn to_offset(self) -> DateTime<FixedOffset> {
        match self {
            Self::Offset(dt) => dt,
            Self::Naive(dt) => dt.and_utc().fixed_offset(),
        }
    }
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Permissive date parsing: standard formats, a few common local formats,
/// relative words and Unix epochs.
fn parse_temporal(text: &str) -> std::result::Result<Temporal, String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(Temporal::Offset(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(Temporal::Offset(dt));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Ok(Temporal::Offset(dt));
        }
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Temporal::Naive(dt));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(Temporal::Naive(date.and_time(NaiveTime::MIN)));
        }
    }
    if let Some(temporal) = parse_relative(text) {
        return Ok(temporal);
    }
    if let Some(temporal) = parse_epoch(text) {
        return Ok(temporal);
    }
    Err(format!("{text:?} is not a recognized date"))
}

fn parse_relative(text: &str) -> Option<Temporal> {
    let now = Utc::now();
    let today = now.date_naive();
    let date = match text.to_ascii_lowercase().as_str() {
        "now" => return Some(Temporal::Offset(now.fixed_offset())),
        "today" => today,
        "yesterday" => today.checked_sub_days(Days::new(1))?,
        "tomorrow" => today.checked_add_days(Days::new(1))?,
        _ => return None,
    };
    Some(Temporal::Naive(date.and_time(NaiveTime::MIN)))
}

fn parse_epoch(text: &str) -> Option<Temporal> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: i64 = text.parse().ok()?;
    let instant = if digits.len() >= 13 {
        DateTime::<Utc>::from_timestamp_millis(number)?
    } else {
        DateTime::<Utc>::from_timestamp(number, 0)?
    };
    Some(Temporal::Offset(instant.fixed_offset()))
}
