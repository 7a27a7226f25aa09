//! CQL scalar values and their canonical wire encoding.
//!
//! This crate is the value codec consumed by the `ringwise` routing core:
//! the partitioner asks it for the exact bytes the cluster itself would
//! hash when computing the token of a partition key. The encoding must be
//! byte-exact, and [`deserialize::deserialize_value`] must invert
//! [`serialize::serialize_value`] for every supported type.

pub mod deserialize;
pub mod serialize;
pub mod types;
pub mod value;

pub use crate::deserialize::{deserialize_value, DeserializationError};
pub use crate::serialize::{serialize_key_value, serialize_value, SerializationError};
pub use crate::value::{ColumnType, CqlDuration, CqlValue};
