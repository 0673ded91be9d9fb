use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Semantic column type of an entity attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Integer,
    Float,
    Boolean,
    String,
    Text,
    DateTime,
    Uuid,
    Json,
}

impl AttributeType {
    /// String and text columns, the ones trimmed before validation
    pub fn is_string_like(&self) -> bool {
        matches!(self, AttributeType::String | AttributeType::Text)
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeType::Integer => write!(f, "Integer"),
            AttributeType::Float => write!(f, "Float"),
            AttributeType::Boolean => write!(f, "Boolean"),
            AttributeType::String => write!(f, "String"),
            AttributeType::Text => write!(f, "Text"),
            AttributeType::DateTime => write!(f, "DateTime"),
            AttributeType::Uuid => write!(f, "Uuid"),
            AttributeType::Json => write!(f, "Json"),
        }
    }
}

/// A value evaluated by the storage engine at write time.
///
/// Opaque to the lifecycle layer: it is recognised by tag and passed through
/// untouched, never converted or compared against literal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    /// Current server time, in the storage zone
    CurrentTimestamp,
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::CurrentTimestamp => write!(f, "NOW()"),
        }
    }
}

/// Typed value of a single entity attribute.
///
/// Datetime attributes hold their literal as `Text` in the configured datetime
/// format; which zone that literal is expressed in depends on where the entity
/// is in its save cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Json(serde_json::Value),
    Expression(Expression),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Null or an empty string
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, AttributeValue::Expression(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            AttributeValue::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// JSON form used in audit entries. Expressions render as their SQL text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Null => serde_json::Value::Null,
            AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
            AttributeValue::Integer(i) => serde_json::Value::from(*i),
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
            AttributeValue::Uuid(id) => serde_json::Value::String(id.to_string()),
            AttributeValue::Json(v) => v.clone(),
            AttributeValue::Expression(e) => serde_json::Value::String(e.to_string()),
        }
    }

    /// Reads a JSON value back as an attribute of the given type.
    ///
    /// Values that do not fit the type come back as `Json` rather than failing.
    pub fn from_json(ty: AttributeType, value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match (ty, value) {
            (_, Value::Null) => AttributeValue::Null,
            (AttributeType::Boolean, Value::Bool(b)) => AttributeValue::Bool(*b),
            (AttributeType::Integer, Value::Number(n)) if n.is_i64() => {
                n.as_i64().map(AttributeValue::Integer).unwrap_or(AttributeValue::Null)
            }
            (AttributeType::Float, Value::Number(n)) => {
                n.as_f64().map(AttributeValue::Float).unwrap_or(AttributeValue::Null)
            }
            (AttributeType::Uuid, Value::String(s)) => match Uuid::parse_str(s) {
                Ok(id) => AttributeValue::Uuid(id),
                Err(_) => AttributeValue::Text(s.clone()),
            },
            (AttributeType::String | AttributeType::Text | AttributeType::DateTime, Value::String(s)) => {
                AttributeValue::Text(s.clone())
            }
            (_, other) => AttributeValue::Json(other.clone()),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Integer(value as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<Uuid> for AttributeValue {
    fn from(value: Uuid) -> Self {
        AttributeValue::Uuid(value)
    }
}

impl From<Expression> for AttributeValue {
    fn from(value: Expression) -> Self {
        AttributeValue::Expression(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}
