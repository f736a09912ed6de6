//! LEB128 and zig-zag helpers used by compressed integer fields.

/// Encode a u64 as an unsigned LEB128 integer.
pub fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode an unsigned LEB128 integer. Returns (value, bytes_consumed).
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), &'static str> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        // The tenth byte may only carry the top bit of a u64.
        if shift >= 64 || (shift == 63 && byte & 0x7E != 0) {
            return Err("varint overflow");
        }
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err("truncated varint")
}

pub const fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub const fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub const fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub const fn unzigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn varint_zero() {
        let mut buf = Vec::new();
        encode_varint(&mut buf, 0);
        assert_eq!(buf, [0]);
        assert_eq!(decode_varint(&buf), Ok((0, 1)));
    }

    #[test]
    fn varint_known_encoding() {
        let mut buf = Vec::new();
        encode_varint(&mut buf, 624_485);
        assert_eq!(buf, [0xE5, 0x8E, 0x26]);
    }

    #[test]
    fn decode_varint_truncated() {
        assert_eq!(decode_varint(&[0x80]), Err("truncated varint"));
        assert_eq!(decode_varint(&[]), Err("truncated varint"));
    }

    #[test]
    fn decode_varint_overflow() {
        let data = [0xFFu8; 11];
        assert_eq!(decode_varint(&data), Err("varint overflow"));
    }

    #[test]
    fn decode_varint_rejects_bits_past_u64() {
        let mut data = vec![0xFFu8; 9];
        data.push(0x7F);
        assert_eq!(decode_varint(&data), Err("varint overflow"));

        let mut max = vec![0xFFu8; 9];
        max.push(0x01);
        assert_eq!(decode_varint(&max), Ok((u64::MAX, 10)));
    }

    #[test]
    fn zigzag_small_values_stay_small() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag32(i32::MIN), u32::MAX);
    }

    proptest! {
        #[test]
        fn varint_roundtrip(value in any::<u64>()) {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            prop_assert_eq!(decode_varint(&buf), Ok((value, buf.len())));
        }

        #[test]
        fn zigzag_roundtrip(a in any::<i32>(), b in any::<i64>()) {
            prop_assert_eq!(unzigzag32(zigzag32(a)), a);
            prop_assert_eq!(unzigzag64(zigzag64(b)), b);
        }
    }
}
