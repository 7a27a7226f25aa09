//! This module holds entities whose goal is to enable routing requests optimally,
//! that is, choosing a target node that is a replica for the data a request concerns.
//!
//! This includes:
//! - token representation,
//! - partition keys, the typed values a token is computed from,
//! - partitioners, which compute token based on a partition key.

use std::fmt;

use num_bigint::BigInt;

mod partition_key;
pub mod partitioner;

pub use partition_key::PartitionKey;

/// Token is a result of computing a hash of a partition key.
///
/// It is an arbitrary-precision signed integer: Murmur3 tokens fit in an
/// `i64`, but RandomPartitioner tokens range over `0..=2^127`. Tokens are
/// totally ordered and compare by exact integer value.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
pub struct Token {
    value: BigInt,
}

impl Token {
    /// Creates a new token with given value.
    #[inline]
    pub fn new(value: impl Into<BigInt>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The ring position represented by this token.
    #[inline]
    pub fn value(&self) -> &BigInt {
        &self.value
    }

    /// Consumes the token, returning the ring position.
    pub fn into_value(self) -> BigInt {
        self.value
    }
}

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token::new(value)
    }
}

impl From<BigInt> for Token {
    fn from(value: BigInt) -> Self {
        Token { value }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::Token;
    use num_bigint::BigInt;

    #[test]
    fn tokens_beyond_64_bits_are_ordered_numerically() {
        let small = Token::from(i64::MAX);
        let big = Token::new(BigInt::from(1_u8) << 127);
        let negative = Token::from(-1_i64);
        assert!(negative < small);
        assert!(small < big);
        assert_eq!(big.to_string(), "170141183460469231731687303715884105728");
    }
}
