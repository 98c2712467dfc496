//! Declared option types.
//!
//! A [`ValueType`] describes what an option holds. Scalars, enums, temporal
//! types and collections are coerced by [`crate::coerce`]; a
//! [`ValueType::Nested`] option holds a whole sub-schema and is staged as a
//! nested builder instead of a value.

use std::fmt;
use std::sync::Arc;

use crate::schema::Schema;
use crate::value::Value;

/// Conversion used by [`ValueType::Custom`] options.
pub type CustomConversion =
    Arc<dyn Fn(&str) -> std::result::Result<Value, String> + Send + Sync + 'static>;

/// An enumeration with a fixed list of constants.
///
/// # Examples
///
/// ```
/// use option_schema_core::EnumType;
///
/// let color = EnumType::new("Color", ["RED", "GREEN"]);
/// assert!(color.contains("GREEN"));
/// assert_eq!(color.matching("red"), vec!["RED"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: String,
    pub constants: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: &str, constants: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            name: name.to_string(),
            constants: constants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn contains(&self, constant: &str) -> bool {
        self.constants.iter().any(|c| c == constant)
    }

    /// Constants equal to `text` ignoring ASCII case.
    pub fn matching(&self, text: &str) -> Vec<&str> {
        self.constants
            .iter()
            .filter(|c| c.eq_ignore_ascii_case(text))
            .map(String::as_str)
            .collect()
    }
}

/// A type converted from its textual form by a user-supplied function.
#[derive(Clone)]
pub struct CustomType {
    pub name: String,
    convert: CustomConversion,
}

impl CustomType {
    pub fn new<F>(name: &str, convert: F) -> Arc<Self>
    where
        F: Fn(&str) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            convert: Arc::new(convert),
        })
    }

    pub fn convert(&self, text: &str) -> std::result::Result<Value, String> {
        (self.convert)(text)
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType").field("name", &self.name).finish()
    }
}

/// Declared type of an option.
#[derive(Debug, Clone)]
pub enum ValueType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Decimal,
    Enum(Arc<EnumType>),
    /// An instant, normalized to UTC.
    Date,
    LocalDate,
    LocalDateTime,
    OffsetDateTime,
    List(Box<ValueType>),
    Set(Box<ValueType>),
    /// Declarable, but never coerced from text.
    Map(Box<ValueType>, Box<ValueType>),
    Nested(Arc<Schema>),
    Custom(Arc<CustomType>),
}

impl ValueType {
    pub fn list(element: ValueType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: ValueType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: ValueType, value: ValueType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn nested(schema: &Arc<Schema>) -> Self {
        Self::Nested(Arc::clone(schema))
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }

    pub fn nested_schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Self::Nested(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_))
    }

    /// Element type of a list or set.
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            Self::List(element) | Self::Set(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::Float
                | Self::Double
                | Self::Decimal
        )
    }

    /// Whether the type has a zero value and can therefore be declared primitive.
    pub fn supports_primitive(&self) -> bool {
        self.zero_value().is_some()
    }

    /// Zero value of a primitive-capable scalar.
    pub fn zero_value(&self) -> Option<Value> {
        match self {
            Self::Bool => Some(Value::Bool(false)),
            Self::Byte => Some(Value::Byte(0)),
            Self::Short => Some(Value::Short(0)),
            Self::Int => Some(Value::Int(0)),
            Self::Long => Some(Value::Long(0)),
            Self::Float => Some(Value::Float(0.0)),
            Self::Double => Some(Value::Double(0.0)),
            Self::Char => Some(Value::Char('\0')),
            _ => None,
        }
    }

    /// Whether a value of type `source` can be handed to an option of this
    /// type without loss (identity or widening).
    pub fn is_assignable_from(&self, source: &ValueType) -> bool {
        if self == source {
            return true;
        }
        match (self, source) {
            (Self::Short, Self::Byte) => true,
            (Self::Int, Self::Byte | Self::Short | Self::Char) => true,
            (Self::Long, Self::Byte | Self::Short | Self::Int | Self::Char) => true,
            (Self::Float, Self::Byte | Self::Short | Self::Int | Self::Long) => true,
            (Self::Double, Self::Byte | Self::Short | Self::Int | Self::Long | Self::Float) => true,
            (Self::Decimal, s) => s.is_numeric(),
            (Self::List(a), Self::List(b)) | (Self::Set(a), Self::Set(b)) => a.is_assignable_from(b),
            (Self::Nested(target), Self::Nested(source)) => source.is_descendant_of(target),
            _ => false,
        }
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(ak, av), Self::Map(bk, bv)) => ak == bk && av == bv,
            (Self::Nested(a), Self::Nested(b)) => a.name() == b.name(),
            (Self::Custom(a), Self::Custom(b)) => a.name == b.name,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for ValueType {}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Byte => f.write_str("byte"),
            Self::Short => f.write_str("short"),
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Char => f.write_str("char"),
            Self::String => f.write_str("String"),
            Self::Decimal => f.write_str("Decimal"),
            Self::Enum(e) => f.write_str(&e.name),
            Self::Date => f.write_str("Date"),
            Self::LocalDate => f.write_str("LocalDate"),
            Self::LocalDateTime => f.write_str("LocalDateTime"),
            Self::OffsetDateTime => f.write_str("OffsetDateTime"),
            Self::List(e) => write!(f, "List<{e}>"),
            Self::Set(e) => write!(f, "Set<{e}>"),
            Self::Map(k, v) => write!(f, "Map<{k}, {v}>"),
            Self::Nested(schema) => f.write_str(schema.name()),
            Self::Custom(c) => f.write_str(&c.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_of_generic_types() {
        assert_eq!(ValueType::list(ValueType::String).to_string(), "List<String>");
        assert_eq!(
            ValueType::map(ValueType::String, ValueType::Int).to_string(),
            "Map<String, int>"
        );
    }

    #[test]
    fn test_widening_assignability() {
        assert!(ValueType::Long.is_assignable_from(&ValueType::Int));
        assert!(ValueType::Double.is_assignable_from(&ValueType::Float));
        assert!(!ValueType::Int.is_assignable_from(&ValueType::Long));
        assert!(!ValueType::String.is_assignable_from(&ValueType::Int));
        assert!(
            ValueType::list(ValueType::Long).is_assignable_from(&ValueType::list(ValueType::Int))
        );
    }

    #[test]
    fn test_enum_equality_includes_constants() {
        let a = ValueType::Enum(EnumType::new("E", ["A", "B"]));
        let b = ValueType::Enum(EnumType::new("E", ["A", "B"]));
        let c = ValueType::Enum(EnumType::new("E", ["A"]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_values_only_for_scalars() {
        assert_eq!(ValueType::Int.zero_value(), Some(Value::Int(0)));
        assert_eq!(ValueType::Bool.zero_value(), Some(Value::Bool(false)));
        assert!(ValueType::String.zero_value().is_none());
        assert!(!ValueType::list(ValueType::Int).supports_primitive());
    }
}
