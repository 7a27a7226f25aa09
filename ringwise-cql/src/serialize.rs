//! Encoding of [`CqlValue`]s into their canonical CQL byte representation.
//!
//! The bytes produced here are the raw cell contents, without the `[int]`
//! length prefix that frames a value inside a request.

use bytes::BufMut;
use thiserror::Error;

use crate::types::vint_encode;
use crate::value::{ColumnType, CqlValue};

/// Largest value of the `time` type: one nanosecond before midnight.
const MAX_TIME_NANOS: i64 = 86_399_999_999_999;

/// Failed to produce the byte representation of a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerializationError {
    /// An `ascii` value contained a non-ASCII character.
    #[error("Value of type ascii contains non-ASCII characters")]
    NonAsciiText,

    /// The value lies outside the domain of its CQL type.
    #[error("Value out of range for CQL type {0}")]
    ValueOverflow(ColumnType),

    /// The value's type may not be part of a partition key.
    #[error("Values of CQL type {0} cannot be used as partition key components")]
    UnsupportedKeyType(ColumnType),

    /// Partition key components may not be empty.
    #[error("Partition key component must not be an empty value")]
    EmptyKeyComponent,
}

/// Appends the canonical encoding of `value` to `buf`.
pub fn serialize_value(value: &CqlValue, buf: &mut impl BufMut) -> Result<(), SerializationError> {
    match value {
        CqlValue::Ascii(s) => {
            if !s.is_ascii() {
                return Err(SerializationError::NonAsciiText);
            }
            buf.put_slice(s.as_bytes());
        }
        CqlValue::Text(s) => buf.put_slice(s.as_bytes()),
        CqlValue::Boolean(b) => buf.put_u8(*b as u8),
        CqlValue::Blob(b) => buf.put_slice(b),
        CqlValue::Counter(v) | CqlValue::BigInt(v) | CqlValue::Timestamp(v) => buf.put_i64(*v),
        CqlValue::Date(d) => buf.put_u32(*d),
        CqlValue::Double(d) => buf.put_f64(*d),
        CqlValue::Float(f) => buf.put_f32(*f),
        CqlValue::Duration(d) => {
            vint_encode(d.months as i64, buf);
            vint_encode(d.days as i64, buf);
            vint_encode(d.nanoseconds, buf);
        }
        CqlValue::Empty => (),
        CqlValue::Int(v) => buf.put_i32(*v),
        CqlValue::Inet(addr) => match addr {
            std::net::IpAddr::V4(v4) => buf.put_slice(&v4.octets()),
            std::net::IpAddr::V6(v6) => buf.put_slice(&v6.octets()),
        },
        CqlValue::SmallInt(v) => buf.put_i16(*v),
        CqlValue::TinyInt(v) => buf.put_i8(*v),
        CqlValue::Time(nanos) => {
            if !(0..=MAX_TIME_NANOS).contains(nanos) {
                return Err(SerializationError::ValueOverflow(ColumnType::Time));
            }
            buf.put_i64(*nanos);
        }
        CqlValue::Timeuuid(u) | CqlValue::Uuid(u) => buf.put_slice(u.as_bytes()),
        CqlValue::Varint(v) => buf.put_slice(&v.to_signed_bytes_be()),
    }
    Ok(())
}

/// Encodes a value that is about to become a partition key component.
///
/// Stricter than [`serialize_value`]: types the cluster refuses in a
/// primary key (`duration`) and empty values are rejected, since hashing
/// them would yield a token the cluster never assigns.
pub fn serialize_key_value(value: &CqlValue) -> Result<Vec<u8>, SerializationError> {
    match value.column_type() {
        None => return Err(SerializationError::EmptyKeyComponent),
        Some(ColumnType::Duration) => {
            return Err(SerializationError::UnsupportedKeyType(ColumnType::Duration))
        }
        Some(_) => (),
    }
    let mut buf = Vec::new();
    serialize_value(value, &mut buf)?;
    Ok(buf)
}
