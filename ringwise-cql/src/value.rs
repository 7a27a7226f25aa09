//! Typed CQL scalar values.

use std::fmt;
use std::net::IpAddr;

use num_bigint::BigInt;
use uuid::Uuid;

/// The CQL type of a scalar value, as it appears in a table's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColumnType {
    Ascii,
    Boolean,
    Blob,
    Counter,
    Date,
    Double,
    Duration,
    Float,
    Int,
    BigInt,
    Text,
    Timestamp,
    Inet,
    SmallInt,
    TinyInt,
    Time,
    Timeuuid,
    Uuid,
    Varint,
}

impl ColumnType {
    /// Size of the encoded value for fixed-width types, `None` for variable-width ones.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ColumnType::Boolean | ColumnType::TinyInt => Some(1),
            ColumnType::SmallInt => Some(2),
            ColumnType::Int | ColumnType::Float | ColumnType::Date => Some(4),
            ColumnType::BigInt
            | ColumnType::Counter
            | ColumnType::Double
            | ColumnType::Timestamp
            | ColumnType::Time => Some(8),
            ColumnType::Uuid | ColumnType::Timeuuid => Some(16),
            ColumnType::Ascii
            | ColumnType::Blob
            | ColumnType::Duration
            | ColumnType::Text
            | ColumnType::Inet
            | ColumnType::Varint => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Ascii => "ascii",
            ColumnType::Boolean => "boolean",
            ColumnType::Blob => "blob",
            ColumnType::Counter => "counter",
            ColumnType::Date => "date",
            ColumnType::Double => "double",
            ColumnType::Duration => "duration",
            ColumnType::Float => "float",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Text => "text",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Inet => "inet",
            ColumnType::SmallInt => "smallint",
            ColumnType::TinyInt => "tinyint",
            ColumnType::Time => "time",
            ColumnType::Timeuuid => "timeuuid",
            ColumnType::Uuid => "uuid",
            ColumnType::Varint => "varint",
        };
        f.write_str(name)
    }
}

/// A CQL duration: months, days and nanoseconds, each signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CqlDuration {
    pub months: i32,
    pub days: i32,
    pub nanoseconds: i64,
}

/// A single typed CQL scalar.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CqlValue {
    Ascii(String),
    Boolean(bool),
    Blob(Vec<u8>),
    Counter(i64),
    /// Days since -5877641-06-23 i.e. 2^31 days before unix epoch
    Date(u32),
    Double(f64),
    Duration(CqlDuration),
    /// The zero-length value, valid for any type.
    Empty,
    Float(f32),
    Int(i32),
    BigInt(i64),
    Text(String),
    /// Milliseconds since unix epoch
    Timestamp(i64),
    Inet(IpAddr),
    SmallInt(i16),
    TinyInt(i8),
    /// Nanoseconds since midnight
    Time(i64),
    Timeuuid(Uuid),
    Uuid(Uuid),
    Varint(BigInt),
}

impl CqlValue {
    /// The type of this value; `None` for [`CqlValue::Empty`], which has no type of its own.
    pub fn column_type(&self) -> Option<ColumnType> {
        let typ = match self {
            CqlValue::Ascii(_) => ColumnType::Ascii,
            CqlValue::Boolean(_) => ColumnType::Boolean,
            CqlValue::Blob(_) => ColumnType::Blob,
            CqlValue::Counter(_) => ColumnType::Counter,
            CqlValue::Date(_) => ColumnType::Date,
            CqlValue::Double(_) => ColumnType::Double,
            CqlValue::Duration(_) => ColumnType::Duration,
            CqlValue::Empty => return None,
            CqlValue::Float(_) => ColumnType::Float,
            CqlValue::Int(_) => ColumnType::Int,
            CqlValue::BigInt(_) => ColumnType::BigInt,
            CqlValue::Text(_) => ColumnType::Text,
            CqlValue::Timestamp(_) => ColumnType::Timestamp,
            CqlValue::Inet(_) => ColumnType::Inet,
            CqlValue::SmallInt(_) => ColumnType::SmallInt,
            CqlValue::TinyInt(_) => ColumnType::TinyInt,
            CqlValue::Time(_) => ColumnType::Time,
            CqlValue::Timeuuid(_) => ColumnType::Timeuuid,
            CqlValue::Uuid(_) => ColumnType::Uuid,
            CqlValue::Varint(_) => ColumnType::Varint,
        };
        Some(typ)
    }

    pub fn as_text(&self) -> Option<&String> {
        match self {
            Self::Ascii(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Self::BigInt(i) | Self::Counter(i) => Some(*i),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_cql_value {
    ($($rust:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$rust> for CqlValue {
                fn from(v: $rust) -> Self {
                    CqlValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_cql_value! {
    bool => Boolean,
    Vec<u8> => Blob,
    f64 => Double,
    f32 => Float,
    i32 => Int,
    i64 => BigInt,
    String => Text,
    IpAddr => Inet,
    i16 => SmallInt,
    i8 => TinyInt,
    Uuid => Uuid,
    BigInt => Varint,
    CqlDuration => Duration,
}

impl From<&str> for CqlValue {
    fn from(v: &str) -> Self {
        CqlValue::Text(v.to_owned())
    }
}

impl From<&[u8]> for CqlValue {
    fn from(v: &[u8]) -> Self {
        CqlValue::Blob(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_types_map_to_expected_cql_types() {
        assert_eq!(CqlValue::from(1_i32).column_type(), Some(ColumnType::Int));
        assert_eq!(CqlValue::from(1_i64).column_type(), Some(ColumnType::BigInt));
        assert_eq!(CqlValue::from("x").column_type(), Some(ColumnType::Text));
        assert_eq!(
            CqlValue::from(&b"ab"[..]).column_type(),
            Some(ColumnType::Blob)
        );
        assert_eq!(CqlValue::Empty.column_type(), None);
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(ColumnType::Int.fixed_width(), Some(4));
        assert_eq!(ColumnType::Timeuuid.fixed_width(), Some(16));
        assert_eq!(ColumnType::Text.fixed_width(), None);
        assert_eq!(ColumnType::Varint.fixed_width(), None);
    }
}
