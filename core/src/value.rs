//! Dynamically typed option values.
//!
//! [`Value`] is what a builder stages and a snapshot resolves. It carries a
//! total order so values can live in sets and snapshots can be hashed, a
//! canonical textual form ([`Value::render`]) that the default parser reads
//! back, and a bridge to and from `serde_json`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Plain name → value map, used for prefill and nested values.
pub type ValueMap = BTreeMap<String, Value>;

/// A resolved or staged option value.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),
    Decimal(Decimal),
    /// An enum constant, by name.
    Enum(String),
    Date(DateTime<Utc>),
    LocalDate(NaiveDate),
    LocalDateTime(NaiveDateTime),
    OffsetDateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(ValueMap),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Char(_) => "char",
            Self::String(_) => "String",
            Self::Decimal(_) => "Decimal",
            Self::Enum(_) => "enum",
            Self::Date(_) => "Date",
            Self::LocalDate(_) => "LocalDate",
            Self::LocalDateTime(_) => "LocalDateTime",
            Self::OffsetDateTime(_) => "OffsetDateTime",
            Self::List(_) => "List",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integral value, widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Short(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Any numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::Decimal(d) => d.to_string().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Any numeric value as an exact decimal, when representable.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Float(v) => Decimal::from_str_exact(&v.to_string()).ok(),
            Self::Double(v) => Decimal::from_str_exact(&v.to_string()).ok(),
            other => other.as_i64().map(Decimal::from),
        }
    }

    /// Elements of a list or set, in iteration order.
    pub fn elements(&self) -> Option<Vec<&Value>> {
        match self {
            Self::List(items) => Some(items.iter().collect()),
            Self::Set(items) => Some(items.iter().collect()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Canonical textual form. Collections are comma separated with literal
    /// commas escaped as `\,`.
    ///
    /// # Examples
    ///
    /// ```
    /// use option_schema_core::Value;
    ///
    /// let list = Value::List(vec!["a,b".into(), "c".into()]);
    /// assert_eq!(list.render(), "a\\,b,c");
    /// assert_eq!(Value::Int(42).render(), "42");
    /// ```
    pub fn render(&self) -> String {
        match self {
            Self::List(items) => render_elements(items.iter()),
            Self::Set(items) => render_elements(items.iter()),
            Self::Map(map) => {
                let entries: Vec<String> =
                    map.iter().map(|(k, v)| format!("{k}={}", v.render())).collect();
                format!("{{{}}}", entries.join(", "))
            }
            Self::Bool(v) => v.to_string(),
            Self::Byte(v) => v.to_string(),
            Self::Short(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Long(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Char(v) => v.to_string(),
            Self::String(v) | Self::Enum(v) => v.clone(),
            Self::Decimal(v) => v.to_string(),
            Self::Date(v) => v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::LocalDate(v) => v.format("%Y-%m-%d").to_string(),
            Self::LocalDateTime(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Self::OffsetDateTime(v) => v.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        }
    }

    /// JSON form. Numbers that JSON cannot carry (NaN, infinities) become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Bool(v) => Json::Bool(*v),
            Self::Byte(_) | Self::Short(_) | Self::Int(_) | Self::Long(_) => {
                self.as_i64().map_or(Json::Null, Json::from)
            }
            Self::Float(v) => serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
            Self::Double(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Self::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Set(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            other => Json::String(other.render()),
        }
    }

    /// Converts JSON input. `null` (at any depth) means absent.
    ///
    /// Integral numbers become [`Value::Long`], other numbers
    /// [`Value::Double`]; coercion narrows them to the declared type.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        use serde_json::Value as Json;
        match json {
            Json::Null => None,
            Json::Bool(b) => Some(Self::Bool(b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Long(i)),
                None => n.as_f64().map(Self::Double),
            },
            Json::String(s) => Some(Self::String(s)),
            Json::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            Json::Object(entries) => Some(Self::Map(
                entries
                    .into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Byte(_) => 1,
            Self::Short(_) => 2,
            Self::Int(_) => 3,
            Self::Long(_) => 4,
            Self::Float(_) => 5,
            Self::Double(_) => 6,
            Self::Char(_) => 7,
            Self::String(_) => 8,
            Self::Decimal(_) => 9,
            Self::Enum(_) => 10,
            Self::Date(_) => 11,
            Self::LocalDate(_) => 12,
            Self::LocalDateTime(_) => 13,
            Self::OffsetDateTime(_) => 14,
            Self::List(_) => 15,
            Self::Set(_) => 16,
            Self::Map(_) => 17,
        }
    }
}

fn render_elements<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items
        .map(|item| item.render().replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Byte(a), Self::Byte(b)) => a.cmp(b),
            (Self::Short(a), Self::Short(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Long(a), Self::Long(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::Char(a), Self::Char(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) | (Self::Enum(a), Self::Enum(b)) => a.cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::LocalDate(a), Self::LocalDate(b)) => a.cmp(b),
            (Self::LocalDateTime(a), Self::LocalDateTime(b)) => a.cmp(b),
            (Self::OffsetDateTime(a), Self::OffsetDateTime(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a.cmp(b),
            (Self::Set(a), Self::Set(b)) => a.cmp(b),
            (Self::Map(a), Self::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Byte(v) => v.hash(state),
            Self::Short(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Long(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::Char(v) => v.hash(state),
            Self::String(v) | Self::Enum(v) => v.hash(state),
            Self::Decimal(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
            Self::LocalDate(v) => v.hash(state),
            Self::LocalDateTime(v) => v.hash(state),
            Self::OffsetDateTime(v) => v.hash(state),
            Self::List(v) => v.hash(state),
            Self::Set(v) => v.hash(state),
            Self::Map(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(_) | Self::Set(_) => {
                let items: Vec<String> = self
                    .elements()
                    .unwrap_or_default()
                    .into_iter()
                    .map(ToString::to_string)
                    .collect();
                write!(f, "[{}]", items.join(", "))
            }
            other => f.write_str(&other.render()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        })*
    };
}

impl_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => String,
    Decimal => Decimal,
    DateTime<Utc> => Date,
    NaiveDate => LocalDate,
    NaiveDateTime => LocalDateTime,
    DateTime<FixedOffset> => OffsetDateTime,
    ValueMap => Map,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Typed extraction from a [`Value`].
///
/// Integral and floating extraction accepts any lossless widening of the
/// stored value, so an `int` option can be read as `i64`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                value.as_i64().and_then(|v| <$ty>::try_from(v).ok())
            }
        })*
    };
}

impl_from_value_int!(i8, i16, i32, i64);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(_) => None,
            other => other.as_f64(),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                value.as_i64().map(|v| v as f32)
            }
            _ => None,
        }
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_decimal()
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(v) => Some(*v),
            Value::OffsetDateTime(v) => Some(v.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::OffsetDateTime(v) => Some(*v),
            Value::Date(v) => Some(v.fixed_offset()),
            _ => None,
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::LocalDate(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::LocalDateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.elements()?.into_iter().map(T::from_value).collect()
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.elements()?.into_iter().map(T::from_value).collect()
    }
}
