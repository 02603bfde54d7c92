use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{RecordType, Type};

/// Runtime value of a script expression or variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    Text(Arc<str>),
    Record(Arc<BTreeMap<String, Value>>),
}

/// A [`TryFrom<Value>`] conversion was asked to produce the wrong type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected a {expected} value, found {found}")]
pub struct CastError {
    pub expected: &'static str,
    pub found: Type,
}

impl Value {
    pub fn data_type(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Decimal(_) => Type::Decimal,
            Value::Bool(_) => Type::Bool,
            Value::Text(_) => Type::Text,
            Value::Record(fields) => {
                let record = RecordType::new(
                    fields
                        .iter()
                        .map(|(name, value)| (name.clone(), value.data_type())),
                );
                Type::Record(Arc::new(record))
            }
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view with `int` widened to `decimal`.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(n) => Some(Decimal::from(*n)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Arc::<str>::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Arc::<str>::from(value))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Value::Record(Arc::new(fields))
    }
}

impl TryFrom<Value> for i64 {
    type Error = CastError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_int().ok_or(CastError {
            expected: "int",
            found: value.data_type(),
        })
    }
}

impl TryFrom<Value> for Decimal {
    type Error = CastError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Decimal(d) => Ok(d),
            other => Err(CastError {
                expected: "decimal",
                found: other.data_type(),
            }),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = CastError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or(CastError {
            expected: "bool",
            found: value.data_type(),
        })
    }
}

impl TryFrom<Value> for String {
    type Error = CastError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(s) => Ok(s.to_string()),
            other => Err(CastError {
                expected: "text",
                found: other.data_type(),
            }),
        }
    }
}
