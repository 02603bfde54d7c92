use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Static type of a script value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Decimal,
    Bool,
    Text,
    Record(Arc<RecordType>),
}

/// Field layout of a record-typed context member.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RecordType {
    pub fields: BTreeMap<String, Type>,
}

impl RecordType {
    pub fn new(fields: impl IntoIterator<Item = (String, Type)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.get(name)
    }
}

impl Type {
    /// Parse a scalar type name as it appears in a declaration statement.
    pub fn parse_name(name: &str) -> Option<Type> {
        match name {
            "int" => Some(Type::Int),
            "decimal" => Some(Type::Decimal),
            "bool" => Some(Type::Bool),
            "text" => Some(Type::Text),
            _ => None,
        }
    }

    /// Whether a value of type `other` can be bound to a slot of type `self`.
    ///
    /// Every type accepts itself; `decimal` additionally accepts `int`
    /// (widening is the only implicit conversion in the language).
    pub fn accepts(&self, other: &Type) -> bool {
        self == other || (*self == Type::Decimal && *other == Type::Int)
    }

    /// Whether a `decimal` value can be bound to a slot of this type.
    pub fn admits_decimal(&self) -> bool {
        self.accepts(&Type::Decimal)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Decimal)
    }

    /// Common type of a mixed numeric pair, if there is one.
    pub fn unify_numeric(left: &Type, right: &Type) -> Option<Type> {
        match (left, right) {
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Int, Type::Decimal)
            | (Type::Decimal, Type::Int)
            | (Type::Decimal, Type::Decimal) => Some(Type::Decimal),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Decimal => write!(f, "decimal"),
            Type::Bool => write!(f, "bool"),
            Type::Text => write!(f, "text"),
            Type::Record(_) => write!(f, "record"),
        }
    }
}
