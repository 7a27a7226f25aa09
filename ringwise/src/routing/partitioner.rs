//! Partitioners are algorithms that can compute token for a given partition key,
//! ultimately allowing optimised routing of requests (such that a request is routed
//! to replicas, which are nodes that really own the data the request concerns).
//! Currently, three partitioners are supported:
//! - Murmur3Partitioner
//!     - the default partitioner,
//!     - modified for compatibility with Cassandra's buggy implementation.
//! - RandomPartitioner
//!     - MD5-based, tokens range over `0..=2^127`.
//! - CDCPartitioner
//!     - the partitioner employed when using CDC (_Change Data Capture_).
//!
//! Whatever the hash, the bytes it receives are laid out the same way: a
//! single-column key is hashed as the raw encoding of its value, while a
//! composite key is hashed as the concatenation, for every column in order,
//! of `[u16 big-endian length][encoded value][0x00]`.

use std::num::Wrapping;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use md5::{Digest, Md5};
use num_bigint::{BigInt, Sign};
use ringwise_cql::serialize_key_value;
use ringwise_cql::types::write_short;
use tracing::trace;

use crate::errors::TokenCalculationError;
use crate::routing::{PartitionKey, Token};

/// Names a partitioner the cluster may be configured with.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[non_exhaustive]
pub enum PartitionerName {
    /// `org.apache.cassandra.dht.Murmur3Partitioner`
    #[default]
    Murmur3,
    /// `org.apache.cassandra.dht.RandomPartitioner`
    Random,
    /// `com.scylladb.dht.CDCPartitioner`
    CDC,
}

impl PartitionerName {
    /// Resolves a partitioner by (possibly fully qualified) class name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<Self> {
        if name.ends_with("Murmur3Partitioner") || name == "Murmur3" {
            Some(PartitionerName::Murmur3)
        } else if name.ends_with("RandomPartitioner") || name == "Random" {
            Some(PartitionerName::Random)
        } else if name.ends_with("CDCPartitioner") || name == "CDC" {
            Some(PartitionerName::CDC)
        } else {
            None
        }
    }

    /// Computes the token of `key` with this partitioner.
    pub fn compute_token(&self, key: &PartitionKey) -> Result<Option<Token>, TokenCalculationError> {
        compute_token(self, key)
    }
}

impl Partitioner for PartitionerName {
    type Hasher = PartitionerHasherAny;

    fn build_hasher(&self) -> Self::Hasher {
        match self {
            PartitionerName::Murmur3 => {
                PartitionerHasherAny::Murmur3(Murmur3Partitioner.build_hasher())
            }
            PartitionerName::Random => {
                PartitionerHasherAny::Random(RandomPartitioner.build_hasher())
            }
            PartitionerName::CDC => PartitionerHasherAny::CDC(CDCPartitioner.build_hasher()),
        }
    }
}

/// Hasher of whichever partitioner a [`PartitionerName`] names.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug)]
pub enum PartitionerHasherAny {
    /// See [`Murmur3PartitionerHasher`].
    Murmur3(Murmur3PartitionerHasher),
    /// See [`RandomPartitionerHasher`].
    Random(RandomPartitionerHasher),
    /// See [`CDCPartitionerHasher`].
    CDC(CDCPartitionerHasher),
}

impl PartitionerHasher for PartitionerHasherAny {
    fn write(&mut self, pk_part: &[u8]) {
        match self {
            PartitionerHasherAny::Murmur3(h) => h.write(pk_part),
            PartitionerHasherAny::Random(h) => h.write(pk_part),
            PartitionerHasherAny::CDC(h) => h.write(pk_part),
        }
    }

    fn finish(&self) -> Option<Token> {
        match self {
            PartitionerHasherAny::Murmur3(h) => h.finish(),
            PartitionerHasherAny::Random(h) => h.finish(),
            PartitionerHasherAny::CDC(h) => h.finish(),
        }
    }
}

/// A trait for creating instances of `PartitionHasher`, which ultimately compute the token.
///
/// The Partitioners' design is based on std::hash design: `Partitioner`
/// corresponds to `HasherBuilder`, and `PartitionerHasher` to `Hasher`.
/// See their documentation for more details.
pub trait Partitioner {
    /// The stateful hasher this partitioner builds.
    type Hasher: PartitionerHasher;

    /// Creates a fresh hasher.
    fn build_hasher(&self) -> Self::Hasher;

    /// Hashes a complete byte buffer in one go.
    fn hash_one(&self, data: &[u8]) -> Option<Token> {
        let mut hasher = self.build_hasher();
        hasher.write(data);
        hasher.finish()
    }
}

/// A trait for hashing a stream of encoded partition key bytes.
///
/// Instances of this trait are created by a `Partitioner` and are stateful.
/// At any point, one can call `finish()` and a `Token` will be computed
/// based on values that has been fed so far. A hasher may decline to
/// produce a token for the input it got, in which case `finish()` yields `None`.
pub trait PartitionerHasher {
    /// Feeds more bytes. Splitting the input differently never changes the result.
    fn write(&mut self, pk_part: &[u8]);
    /// Computes the token of everything written so far.
    fn finish(&self) -> Option<Token>;
}

/// Cassandra's default partitioner: x64 128-bit murmur3, first half of the hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Murmur3Partitioner;

impl Partitioner for Murmur3Partitioner {
    type Hasher = Murmur3PartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Self::Hasher {
            total_len: 0,
            buf: Default::default(),
            h1: Wrapping(0),
            h2: Wrapping(0),
        }
    }
}

/// Incremental state of [`Murmur3Partitioner`].
#[derive(Debug)]
pub struct Murmur3PartitionerHasher {
    total_len: usize,
    buf: [u8; Self::BUF_CAPACITY],
    h1: Wrapping<i64>,
    h2: Wrapping<i64>,
}

impl Murmur3PartitionerHasher {
    const BUF_CAPACITY: usize = 16;

    const C1: Wrapping<i64> = Wrapping(0x87c3_7b91_1142_53d5_u64 as i64);
    const C2: Wrapping<i64> = Wrapping(0x4cf5_ad43_2745_937f_u64 as i64);

    fn hash_16_bytes(&mut self, mut k1: Wrapping<i64>, mut k2: Wrapping<i64>) {
        k1 *= Self::C1;
        k1 = Self::rotl64(k1, 31);
        k1 *= Self::C2;
        self.h1 ^= k1;

        self.h1 = Self::rotl64(self.h1, 27);
        self.h1 += self.h2;
        self.h1 = self.h1 * Wrapping(5) + Wrapping(0x52dce729);

        k2 *= Self::C2;
        k2 = Self::rotl64(k2, 33);
        k2 *= Self::C1;
        self.h2 ^= k2;

        self.h2 = Self::rotl64(self.h2, 31);
        self.h2 += self.h1;
        self.h2 = self.h2 * Wrapping(5) + Wrapping(0x38495ab5);
    }

    fn fetch_16_bytes_from_buf(buf: &mut &[u8]) -> (Wrapping<i64>, Wrapping<i64>) {
        let k1 = Wrapping(buf.get_i64_le());
        let k2 = Wrapping(buf.get_i64_le());
        (k1, k2)
    }

    #[inline]
    fn rotl64(v: Wrapping<i64>, n: u32) -> Wrapping<i64> {
        Wrapping((v.0 << n) | (v.0 as u64 >> (64 - n)) as i64)
    }

    #[inline]
    fn fmix(mut k: Wrapping<i64>) -> Wrapping<i64> {
        k ^= Wrapping((k.0 as u64 >> 33) as i64);
        k *= Wrapping(0xff51afd7ed558ccd_u64 as i64);
        k ^= Wrapping((k.0 as u64 >> 33) as i64);
        k *= Wrapping(0xc4ceb9fe1a85ec53_u64 as i64);
        k ^= Wrapping((k.0 as u64 >> 33) as i64);

        k
    }
}

// The implemented Murmur3 algorithm is roughly as follows:
// 1. while there are at least 16 bytes given:
//      consume 16 bytes by parsing them into i64s, then
//      include them in h1, h2, k1, k2;
// 2. do some magic with remaining n < 16 bytes,
//      include them in h1, h2, k1, k2;
// 3. compute the token based on h1, h2, k1, k2.
//
// Therefore, the buffer of capacity 16 is used. As soon as it gets full,
// point 1. is executed. Points 2. and 3. are exclusively done in `finish()`,
// so they don't mutate the state.
impl PartitionerHasher for Murmur3PartitionerHasher {
    fn write(&mut self, mut pk_part: &[u8]) {
        let mut buf_len = self.total_len % Self::BUF_CAPACITY;
        self.total_len += pk_part.len();

        // If the buffer is nonempty and can be filled completely, so that we can fetch two i64s from it,
        // fill it and hash its contents, then make it empty.
        if buf_len > 0 && Self::BUF_CAPACITY - buf_len <= pk_part.len() {
            let to_write = Ord::min(Self::BUF_CAPACITY - buf_len, pk_part.len());
            self.buf[buf_len..buf_len + to_write].copy_from_slice(&pk_part[..to_write]);
            pk_part.advance(to_write);
            buf_len += to_write;

            debug_assert_eq!(buf_len, Self::BUF_CAPACITY);
            let mut buf_ptr = &self.buf[..];
            let (k1, k2) = Self::fetch_16_bytes_from_buf(&mut buf_ptr);
            debug_assert!(buf_ptr.is_empty());
            self.hash_16_bytes(k1, k2);
            buf_len = 0;
        }

        // With an empty buffer, big inputs are hashed directly from the external slice.
        if buf_len == 0 {
            while pk_part.len() >= Self::BUF_CAPACITY {
                let (k1, k2) = Self::fetch_16_bytes_from_buf(&mut pk_part);
                self.hash_16_bytes(k1, k2);
            }
        }

        // Remaining bytes wait in the buffer.
        debug_assert!(pk_part.len() < Self::BUF_CAPACITY - buf_len);
        let to_write = pk_part.len();
        self.buf[buf_len..buf_len + to_write].copy_from_slice(&pk_part[..to_write]);
        pk_part.advance(to_write);
        debug_assert!(pk_part.is_empty());
    }

    fn finish(&self) -> Option<Token> {
        let mut h1 = self.h1;
        let mut h2 = self.h2;

        let mut k1 = Wrapping(0_i64);
        let mut k2 = Wrapping(0_i64);

        let buf_len = self.total_len % Self::BUF_CAPACITY;

        // Tail bytes are sign-extended, as in Cassandra's implementation.
        if buf_len > 8 {
            for i in (8..buf_len).rev() {
                k2 ^= Wrapping(self.buf[i] as i8 as i64) << ((i - 8) * 8);
            }

            k2 *= Self::C2;
            k2 = Self::rotl64(k2, 33);
            k2 *= Self::C1;
            h2 ^= k2;
        }

        if buf_len > 0 {
            for i in (0..std::cmp::min(8, buf_len)).rev() {
                k1 ^= Wrapping(self.buf[i] as i8 as i64) << (i * 8);
            }

            k1 *= Self::C1;
            k1 = Self::rotl64(k1, 31);
            k1 *= Self::C2;
            h1 ^= k1;
        }

        h1 ^= Wrapping(self.total_len as i64);
        h2 ^= Wrapping(self.total_len as i64);

        h1 += h2;
        h2 += h1;

        h1 = Self::fmix(h1);
        h2 = Self::fmix(h2);

        h1 += h2;

        // i64::MIN is reserved by the cluster as the ring's minimum token.
        let value = if h1.0 == i64::MIN { i64::MAX } else { h1.0 };
        Some(Token::from(value))
    }
}

/// Cassandra's RandomPartitioner: the MD5 digest read as a signed
/// big-endian integer, absolute value taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPartitioner;

impl Partitioner for RandomPartitioner {
    type Hasher = RandomPartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        RandomPartitionerHasher { md5: Md5::new() }
    }
}

/// Incremental state of [`RandomPartitioner`].
#[derive(Debug, Clone)]
pub struct RandomPartitionerHasher {
    md5: Md5,
}

impl PartitionerHasher for RandomPartitionerHasher {
    fn write(&mut self, pk_part: &[u8]) {
        self.md5.update(pk_part);
    }

    fn finish(&self) -> Option<Token> {
        let digest = self.md5.clone().finalize();
        let signed = BigInt::from_signed_bytes_be(&digest);
        let (_, magnitude) = signed.into_parts();
        Some(Token::new(BigInt::from_biguint(Sign::Plus, magnitude)))
    }
}

enum CDCPartitionerHasherState {
    Feeding {
        len: usize,
        buf: [u8; CDCPartitionerHasher::BUF_CAPACITY],
    },
    Computed(i64),
}

/// The partitioner of CDC log tables: the token is stored verbatim in the
/// first 8 bytes of the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CDCPartitioner;

/// Incremental state of [`CDCPartitioner`].
pub struct CDCPartitionerHasher {
    state: CDCPartitionerHasherState,
}

impl std::fmt::Debug for CDCPartitionerHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            CDCPartitionerHasherState::Feeding { len, .. } => {
                write!(f, "CDCPartitionerHasher(feeding, {len} bytes)")
            }
            CDCPartitionerHasherState::Computed(value) => {
                write!(f, "CDCPartitionerHasher(computed {value})")
            }
        }
    }
}

impl Partitioner for CDCPartitioner {
    type Hasher = CDCPartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Self::Hasher {
            state: CDCPartitionerHasherState::Feeding {
                len: 0,
                buf: Default::default(),
            },
        }
    }
}

impl CDCPartitionerHasher {
    const BUF_CAPACITY: usize = 8;
}

impl PartitionerHasher for CDCPartitionerHasher {
    fn write(&mut self, pk_part: &[u8]) {
        match &mut self.state {
            CDCPartitionerHasherState::Feeding { len, buf } => {
                // We feed the buffer until it's full.
                let copied_len = Ord::min(pk_part.len(), Self::BUF_CAPACITY - *len);
                buf[*len..*len + copied_len].copy_from_slice(&pk_part[..copied_len]);
                *len += copied_len;

                if *len == Self::BUF_CAPACITY {
                    let value = (&mut &buf[..]).get_i64();
                    self.state = CDCPartitionerHasherState::Computed(value);
                }
            }
            CDCPartitionerHasherState::Computed(_) => (),
        }
    }

    fn finish(&self) -> Option<Token> {
        match self.state {
            // A key shorter than 8 bytes has no token of its own; the cluster
            // falls back to the ring minimum, which is not routable.
            CDCPartitionerHasherState::Feeding { .. } => None,
            CDCPartitionerHasherState::Computed(value) => Some(Token::from(value)),
        }
    }
}

/// Lays out a partition key the way the cluster hashes it.
///
/// A single component is its plain encoding. Each component of a composite
/// key contributes its length as a big-endian `u16`, its encoding, and a
/// single `0x00` terminator, the last component included.
pub fn encode_partition_key(key: &PartitionKey) -> Result<Bytes, TokenCalculationError> {
    let components = key.components();
    if components.len() == 1 {
        let encoded = serialize_key_value(&components[0])
            .map_err(|error| TokenCalculationError::Serialization { index: 0, error })?;
        return Ok(Bytes::from(encoded));
    }

    let mut buf = BytesMut::new();
    for (index, component) in components.iter().enumerate() {
        let encoded = serialize_key_value(component)
            .map_err(|error| TokenCalculationError::Serialization { index, error })?;
        let len_u16: u16 = encoded
            .len()
            .try_into()
            .map_err(|_| TokenCalculationError::ValueTooLong(encoded.len()))?;
        write_short(len_u16, &mut buf);
        buf.put_slice(&encoded);
        buf.put_u8(0);
    }
    Ok(buf.freeze())
}

/// Computes the token the cluster assigns to `key` under `partitioner`.
///
/// `Ok(None)` means the partitioner produces no token for this key; it is
/// up to the caller to decide how to route such a request.
pub fn compute_token<P: Partitioner + ?Sized>(
    partitioner: &P,
    key: &PartitionKey,
) -> Result<Option<Token>, TokenCalculationError> {
    let encoded = encode_partition_key(key)?;
    let mut hasher = partitioner.build_hasher();
    hasher.write(&encoded);
    let token = hasher.finish();
    trace!(
        components = key.len(),
        encoded_len = encoded.len(),
        token = ?token,
        "Computed token for partition key"
    );
    Ok(token)
}
