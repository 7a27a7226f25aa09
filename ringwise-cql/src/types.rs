//! Low-level primitives of the CQL binary encoding.

use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;

/// Writes a `[short]`: a big-endian `u16`.
pub fn write_short(v: u16, buf: &mut impl BufMut) {
    buf.put_u16(v);
}

fn zig_zag_encode(v: i64) -> u64 {
    ((v >> 63) ^ (v << 1)) as u64
}

fn zig_zag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub(crate) fn unsigned_vint_encode(v: u64, buf: &mut impl BufMut) {
    let mut v = v;
    let mut number_of_bytes = (639 - 9 * v.leading_zeros()) >> 6;
    if number_of_bytes <= 1 {
        return buf.put_u8(v as u8);
    }

    if number_of_bytes != 9 {
        let extra_bytes = number_of_bytes - 1;
        let length_bits = !(0xff >> extra_bytes);
        v |= (length_bits as u64) << (8 * extra_bytes);
    } else {
        buf.put_u8(0xff);
        number_of_bytes -= 1;
    }
    buf.put_uint(v, number_of_bytes as usize)
}

pub(crate) fn unsigned_vint_decode(buf: &mut &[u8]) -> Result<u64, std::io::Error> {
    let first_byte = buf.read_u8()?;
    let extra_bytes = first_byte.leading_ones() as usize;

    let mut v = if extra_bytes != 8 {
        let first_byte_bits = first_byte & (0xffu8 >> extra_bytes);
        (first_byte_bits as u64) << (8 * extra_bytes)
    } else {
        0
    };

    if extra_bytes != 0 {
        v += buf.read_uint::<BigEndian>(extra_bytes)?;
    }

    Ok(v)
}

/// Writes a signed variable-length integer (zig-zag, then unsigned vint).
pub fn vint_encode(v: i64, buf: &mut impl BufMut) {
    unsigned_vint_encode(zig_zag_encode(v), buf)
}

pub fn vint_decode(buf: &mut &[u8]) -> Result<i64, std::io::Error> {
    unsigned_vint_decode(buf).map(zig_zag_decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zig_zag_interleaves_signs() {
        for (v, encoded) in [(0, 0), (-1, 1), (1, 2), (-2, 3), (2, 4), (-3, 5), (3, 6)] {
            assert_eq!(zig_zag_encode(v), encoded);
            assert_eq!(zig_zag_decode(encoded), v);
        }
    }

    #[test]
    fn unsigned_vint_lengths() {
        let cases: Vec<(u64, Vec<u8>)> = vec![
            (0, vec![0]),
            (127, vec![127]),
            (128, vec![0x80, 0x80]),
            ((1 << 14) - 1, vec![0xbf, 0xff]),
            (1 << 14, vec![0xc0, 0x40, 0x00]),
            (u64::MAX, vec![0xff; 9]),
        ];
        for (v, expected) in cases {
            let mut buf = Vec::new();
            unsigned_vint_encode(v, &mut buf);
            assert_eq!(buf, expected, "encoding of {v}");
            assert_eq!(unsigned_vint_decode(&mut buf.as_slice()).unwrap(), v);
        }
    }

    #[test]
    fn signed_vint_extremes() {
        for v in [i64::MIN, -300, -1, 0, 1, 300, i64::MAX] {
            let mut buf = Vec::new();
            vint_encode(v, &mut buf);
            assert_eq!(vint_decode(&mut buf.as_slice()).unwrap(), v);
        }
    }

    #[test]
    fn short_is_big_endian() {
        let mut buf = Vec::new();
        write_short(0x0102, &mut buf);
        assert_eq!(buf, [0x01, 0x02]);
    }
}
