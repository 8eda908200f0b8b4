//! Record values accepted by [`FluentLogger`](crate::FluentLogger).
//!
//! Values fall into three kinds. Primitives and containers map directly onto
//! MessagePack. Opaque values (timestamps and arbitrary `Debug` objects) have
//! no native encoding and are carried as text by the encoder's fallback path.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::Error as _};

/// A record: string keys mapped to values.
pub type Record = BTreeMap<String, RecordValue>;

/// Format used when rendering timestamps as text.
pub const TIMESTAMP_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Coarse classification of a [`RecordValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// Nil, booleans, numbers, strings and binary blobs.
    Primitive,
    /// Arrays and maps.
    Container,
    /// Values without a native MessagePack form.
    Opaque,
}

/// A value with no native wire representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Opaque {
    /// A point in time.
    Timestamp(DateTime<Utc>),
    /// An arbitrary object captured through its `Debug` output.
    Debug(String),
}

impl Opaque {
    /// Canonical textual form used when the value is encoded.
    pub fn to_text(&self) -> String {
        match self {
            Opaque::Timestamp(ts) => ts.format(TIMESTAMP_TEXT_FORMAT).to_string(),
            Opaque::Debug(text) => text.clone(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Opaque::Timestamp(_) => "timestamp",
            Opaque::Debug(_) => "object",
        }
    }
}

/// A single value stored in a record.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordValue {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<RecordValue>),
    Map(Record),
    Opaque(Opaque),
}

impl RecordValue {
    /// Capture an arbitrary value through its `Debug` representation.
    pub fn opaque(value: &dyn fmt::Debug) -> Self {
        RecordValue::Opaque(Opaque::Debug(format!("{value:?}")))
    }

    /// Wrap raw bytes as a binary value.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        RecordValue::Bin(bytes.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            RecordValue::Array(_) | RecordValue::Map(_) => ValueKind::Container,
            RecordValue::Opaque(_) => ValueKind::Opaque,
            _ => ValueKind::Primitive,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, RecordValue::Map(_))
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            RecordValue::Nil => "nil",
            RecordValue::Bool(_) => "bool",
            RecordValue::Int(_) | RecordValue::UInt(_) => "integer",
            RecordValue::Float(_) => "float",
            RecordValue::Str(_) => "string",
            RecordValue::Bin(_) => "binary",
            RecordValue::Array(_) => "array",
            RecordValue::Map(_) => "map",
            RecordValue::Opaque(opaque) => opaque.type_name(),
        }
    }

    /// Whether this value or any nested value is opaque.
    pub fn contains_opaque(&self) -> bool {
        match self {
            RecordValue::Opaque(_) => true,
            RecordValue::Array(items) => items.iter().any(RecordValue::contains_opaque),
            RecordValue::Map(map) => map.values().any(RecordValue::contains_opaque),
            _ => false,
        }
    }
}

/// Native MessagePack form. Opaque values and non-finite floats refuse to
/// serialise so the encoder can switch to its portable fallback.
impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordValue::Nil => serializer.serialize_unit(),
            RecordValue::Bool(v) => serializer.serialize_bool(*v),
            RecordValue::Int(v) => serializer.serialize_i64(*v),
            RecordValue::UInt(v) => serializer.serialize_u64(*v),
            RecordValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            RecordValue::Float(v) => Err(S::Error::custom(format!("non-finite float {v}"))),
            RecordValue::Str(v) => serializer.serialize_str(v),
            RecordValue::Bin(v) => serializer.serialize_bytes(v),
            RecordValue::Array(items) => items.serialize(serializer),
            RecordValue::Map(map) => map.serialize(serializer),
            RecordValue::Opaque(opaque) => Err(S::Error::custom(format!(
                "unsupported {} value",
                opaque.type_name()
            ))),
        }
    }
}

macro_rules! from_scalar {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for RecordValue {
                fn from(value: $ty) -> Self {
                    RecordValue::$variant(<$target>::from(value))
                }
            }
        )*
    };
}

from_scalar!(
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Str as String,
    &str => Str as String,
);

impl From<DateTime<Utc>> for RecordValue {
    fn from(value: DateTime<Utc>) -> Self {
        RecordValue::Opaque(Opaque::Timestamp(value))
    }
}

impl From<Record> for RecordValue {
    fn from(value: Record) -> Self {
        RecordValue::Map(value)
    }
}

impl<T: Into<RecordValue>> From<Vec<T>> for RecordValue {
    fn from(value: Vec<T>) -> Self {
        RecordValue::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RecordValue>> From<Option<T>> for RecordValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RecordValue::Nil, Into::into)
    }
}

impl<K: Into<String>, V: Into<RecordValue>> FromIterator<(K, V)> for RecordValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RecordValue::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Build a [`RecordValue::Map`] from `key => value` pairs.
///
/// ```
/// use fluent_logger::record;
///
/// let value = record! { "a" => "b", "count" => 3 };
/// assert!(value.is_map());
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::RecordValue::Map($crate::Record::new())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Record::new();
        $(
            map.insert(::std::string::String::from($key), $crate::RecordValue::from($value));
        )+
        $crate::RecordValue::Map(map)
    }};
}
