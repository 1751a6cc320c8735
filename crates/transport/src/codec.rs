//! Payload packing shared by every transport
//!
//! Bits: 8 per byte, first item in the least significant bit, trailing bits
//! zero. Registers: big-endian, 2 bytes each.

use bytes::{BufMut, Bytes, BytesMut};

pub fn pack_bits(bits: &[bool]) -> Bytes {
    let mut out = BytesMut::zeroed(bits.len().div_ceil(8));
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out.freeze()
}

pub fn pack_registers(registers: &[u16]) -> Bytes {
    let mut out = BytesMut::with_capacity(registers.len() * 2);
    for value in registers {
        out.put_u16(*value);
    }
    out.freeze()
}

/// First `quantity` bits of a packed payload; missing bytes read as zero
pub fn unpack_bits(data: &[u8], quantity: usize) -> Vec<bool> {
    (0..quantity)
        .map(|i| data.get(i / 8).is_some_and(|byte| byte & (1 << (i % 8)) != 0))
        .collect()
}

/// Registers of a big-endian payload; a trailing odd byte is ignored
pub fn unpack_registers(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_bits_lsb_first() {
        let bits = [true, false, true, true, false, false, true, true, true, true];
        let packed = pack_bits(&bits);
        assert_eq!(packed.as_ref(), &[0xCD, 0x03]);
        assert_eq!(unpack_bits(&packed, bits.len()), bits);
    }

    #[test]
    fn test_pack_registers_big_endian() {
        let packed = pack_registers(&[0x1234, 0x00FF]);
        assert_eq!(packed.as_ref(), &[0x12, 0x34, 0x00, 0xFF]);
        assert_eq!(unpack_registers(&packed), vec![0x1234, 0x00FF]);
    }

    #[test]
    fn test_empty_payloads() {
        assert!(pack_bits(&[]).is_empty());
        assert!(pack_registers(&[]).is_empty());
        assert_eq!(unpack_bits(&[], 3), vec![false; 3]);
    }
}
