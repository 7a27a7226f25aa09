//! Decoding of raw cell bytes into [`CqlValue`]s.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ReadBytesExt};
use num_bigint::BigInt;
use thiserror::Error;
use uuid::Uuid;

use crate::types::vint_decode;
use crate::value::{ColumnType, CqlDuration, CqlValue};

/// Failed to decode a value of the given type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeserializationError {
    #[error("Expected {expected} bytes for CQL type {typ}, got {got}")]
    ByteLengthMismatch {
        typ: ColumnType,
        expected: usize,
        got: usize,
    },

    #[error("Expected 4 or 16 bytes for inet, got {0}")]
    BadInetLength(usize),

    #[error("Value of type ascii contains non-ASCII characters")]
    ExpectedAscii,

    #[error("Invalid UTF-8 in text value: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed duration: {0}")]
    BadDuration(&'static str),

    #[error("Value out of range for CQL type {0}")]
    ValueOverflow(ColumnType),
}

fn ensure_exact_length(typ: ColumnType, bytes: &[u8]) -> Result<(), DeserializationError> {
    match typ.fixed_width() {
        Some(expected) if expected != bytes.len() => Err(DeserializationError::ByteLengthMismatch {
            typ,
            expected,
            got: bytes.len(),
        }),
        _ => Ok(()),
    }
}

/// Decodes `bytes` as a value of type `typ`.
///
/// A zero-length input of a fixed-width type decodes to [`CqlValue::Empty`].
pub fn deserialize_value(typ: ColumnType, bytes: &[u8]) -> Result<CqlValue, DeserializationError> {
    if bytes.is_empty() && typ.fixed_width().is_some() {
        return Ok(CqlValue::Empty);
    }
    ensure_exact_length(typ, bytes)?;

    let mut buf = bytes;
    // Length was checked above, reads of fixed-width types cannot run short.
    let short = |_: std::io::Error| DeserializationError::ByteLengthMismatch {
        typ,
        expected: typ.fixed_width().unwrap_or_default(),
        got: bytes.len(),
    };

    let value = match typ {
        ColumnType::Ascii => {
            if !bytes.is_ascii() {
                return Err(DeserializationError::ExpectedAscii);
            }
            CqlValue::Ascii(std::str::from_utf8(bytes)?.to_owned())
        }
        ColumnType::Text => CqlValue::Text(std::str::from_utf8(bytes)?.to_owned()),
        ColumnType::Blob => CqlValue::Blob(bytes.to_vec()),
        ColumnType::Boolean => CqlValue::Boolean(bytes[0] != 0),
        ColumnType::Counter => CqlValue::Counter(buf.read_i64::<BigEndian>().map_err(short)?),
        ColumnType::BigInt => CqlValue::BigInt(buf.read_i64::<BigEndian>().map_err(short)?),
        ColumnType::Timestamp => CqlValue::Timestamp(buf.read_i64::<BigEndian>().map_err(short)?),
        ColumnType::Date => CqlValue::Date(buf.read_u32::<BigEndian>().map_err(short)?),
        ColumnType::Double => CqlValue::Double(buf.read_f64::<BigEndian>().map_err(short)?),
        ColumnType::Float => CqlValue::Float(buf.read_f32::<BigEndian>().map_err(short)?),
        ColumnType::Int => CqlValue::Int(buf.read_i32::<BigEndian>().map_err(short)?),
        ColumnType::SmallInt => CqlValue::SmallInt(buf.read_i16::<BigEndian>().map_err(short)?),
        ColumnType::TinyInt => CqlValue::TinyInt(buf.read_i8().map_err(short)?),
        ColumnType::Time => {
            let nanos = buf.read_i64::<BigEndian>().map_err(short)?;
            if !(0..=86_399_999_999_999).contains(&nanos) {
                return Err(DeserializationError::ValueOverflow(ColumnType::Time));
            }
            CqlValue::Time(nanos)
        }
        ColumnType::Uuid | ColumnType::Timeuuid => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(bytes);
            let uuid = Uuid::from_bytes(raw);
            if typ == ColumnType::Uuid {
                CqlValue::Uuid(uuid)
            } else {
                CqlValue::Timeuuid(uuid)
            }
        }
        ColumnType::Inet => match bytes.len() {
            4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(bytes);
                CqlValue::Inet(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(bytes);
                CqlValue::Inet(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            len => return Err(DeserializationError::BadInetLength(len)),
        },
        ColumnType::Varint => {
            if bytes.is_empty() {
                CqlValue::Empty
            } else {
                CqlValue::Varint(BigInt::from_signed_bytes_be(bytes))
            }
        }
        ColumnType::Duration => {
            if bytes.is_empty() {
                return Ok(CqlValue::Empty);
            }
            let months = vint_decode(&mut buf)
                .map_err(|_| DeserializationError::BadDuration("missing months"))?;
            let days =
                vint_decode(&mut buf).map_err(|_| DeserializationError::BadDuration("missing days"))?;
            let nanoseconds = vint_decode(&mut buf)
                .map_err(|_| DeserializationError::BadDuration("missing nanoseconds"))?;
            if !buf.is_empty() {
                return Err(DeserializationError::BadDuration("trailing bytes"));
            }
            CqlValue::Duration(CqlDuration {
                months: i32::try_from(months)
                    .map_err(|_| DeserializationError::ValueOverflow(ColumnType::Duration))?,
                days: i32::try_from(days)
                    .map_err(|_| DeserializationError::ValueOverflow(ColumnType::Duration))?,
                nanoseconds,
            })
        }
    };
    Ok(value)
}
