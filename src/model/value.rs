//! Attribute values and types.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// AttributeType - 속성 타입
// ============================================================================

/// 속성 타입
///
/// The discriminant is the type byte used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttributeType {
    /// Unknown type byte
    Invalid = 0,
    Boolean = 1,
    Byte = 2,
    Char = 3,
    Short = 4,
    Integer = 5,
    Long = 6,
    Float = 7,
    Double = 8,
    /// Arbitrary-precision decimal
    Number = 9,
    String = 10,
    Date = 11,
    Time = 12,
    TimeStamp = 13,
    /// Binary large object
    Blob = 14,
    /// Character large object
    Clob = 15,
}

impl AttributeType {
    /// Map a wire type byte; unknown values become [`AttributeType::Invalid`].
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Boolean,
            2 => Self::Byte,
            3 => Self::Char,
            4 => Self::Short,
            5 => Self::Integer,
            6 => Self::Long,
            7 => Self::Float,
            8 => Self::Double,
            9 => Self::Number,
            10 => Self::String,
            11 => Self::Date,
            12 => Self::Time,
            13 => Self::TimeStamp,
            14 => Self::Blob,
            15 => Self::Clob,
            _ => Self::Invalid,
        }
    }

    /// Wire type byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Type name
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::Char => "Char",
            Self::Short => "Short",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Number => "Number",
            Self::String => "String",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::TimeStamp => "TimeStamp",
            Self::Blob => "Blob",
            Self::Clob => "Clob",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// LargeObject - 대용량 객체
// ============================================================================

/// Blob/Clob content.
///
/// Values read from the server carry only the large-object entity id; the
/// bytes are fetched on demand with `Connection::get_large_object_as_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LargeObject {
    /// Server entity id of the object (0 before the first commit)
    pub entity_id: i64,
    /// Inline content, if loaded or set locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl LargeObject {
    /// Local content not yet stored on the server.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            entity_id: 0,
            data: Some(data.into()),
        }
    }

    /// Reference to server-side content.
    pub fn reference(entity_id: i64) -> Self {
        Self {
            entity_id,
            data: None,
        }
    }

    /// Whether the content is available locally.
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }
}

// ============================================================================
// Value - 속성 값
// ============================================================================

/// 속성 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null
    Null,
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Decimal in plain notation, e.g. `"1234.50"`
    Number(String),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeStamp(NaiveDateTime),
    Blob(LargeObject),
    Clob(LargeObject),
}

impl Value {
    /// Null 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attribute type of this value; `None` for null.
    pub fn attribute_type(&self) -> Option<AttributeType> {
        let ty = match self {
            Value::Null => return None,
            Value::Boolean(_) => AttributeType::Boolean,
            Value::Byte(_) => AttributeType::Byte,
            Value::Char(_) => AttributeType::Char,
            Value::Short(_) => AttributeType::Short,
            Value::Integer(_) => AttributeType::Integer,
            Value::Long(_) => AttributeType::Long,
            Value::Float(_) => AttributeType::Float,
            Value::Double(_) => AttributeType::Double,
            Value::Number(_) => AttributeType::Number,
            Value::String(_) => AttributeType::String,
            Value::Date(_) => AttributeType::Date,
            Value::Time(_) => AttributeType::Time,
            Value::TimeStamp(_) => AttributeType::TimeStamp,
            Value::Blob(_) => AttributeType::Blob,
            Value::Clob(_) => AttributeType::Clob,
        };
        Some(ty)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integral value widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// String or decimal text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Number(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_large_object(&self) -> Option<&LargeObject> {
        match self {
            Value::Blob(lob) | Value::Clob(lob) => Some(lob),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Number(v) | Value::String(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::TimeStamp(v) => write!(f, "{}", v),
            Value::Blob(lob) | Value::Clob(lob) => match &lob.data {
                Some(data) => write!(f, "<{} bytes>", data.len()),
                None => write!(f, "<lob #{}>", lob.entity_id),
            },
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Boolean,
    i8 => Byte,
    char => Char,
    i16 => Short,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => TimeStamp,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(LargeObject::from_bytes(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
