// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the ina219-server project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register word codec
//!
//! The INA219 transmits every register as two bytes, most significant byte
//! first. Buses hand those bytes over in wire order; they must be reassembled
//! before any arithmetic.

/// Mask of the sign bit of a 16-bit register.
pub const SIGN_BIT: u16 = 0x8000;

/// Reassemble a register word from the two bytes received on the wire.
pub fn decode_word(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// Split a register word into the two bytes to transmit, MSB first.
pub fn encode_word(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Whether the sign bit of a raw register value is set.
pub fn is_negative(raw: u16) -> bool {
    raw & SIGN_BIT != 0
}

/// Magnitude of a negative two's-complement register value.
///
/// Computed as the bitwise complement plus one, kept to the register width:
/// `0xFFFF` yields `1` and `0x8000` yields `0x8000`.
pub fn twos_complement_magnitude(raw: u16) -> u16 {
    (!raw).wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_uses_wire_order() {
        assert_eq!(decode_word([0x12, 0x34]), 0x1234);
        assert_eq!(decode_word([0x00, 0x01]), 0x0001);
        assert_eq!(decode_word([0xFF, 0x00]), 0xFF00);
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        assert_eq!(encode_word(0x1FFF), [0x1F, 0xFF]);
        assert_eq!(decode_word(encode_word(0x1400)), 0x1400);
    }

    #[test]
    fn sign_bit_detection() {
        assert!(is_negative(0x8000));
        assert!(is_negative(0xFFFF));
        assert!(!is_negative(0x7FFF));
        assert!(!is_negative(0x0000));
    }

    #[test]
    fn magnitude_of_known_patterns() {
        assert_eq!(twos_complement_magnitude(0xFFFF), 1);
        assert_eq!(twos_complement_magnitude(0xFFFE), 2);
        assert_eq!(twos_complement_magnitude(0xF060), 4000);
        assert_eq!(twos_complement_magnitude(0x8000), 0x8000);
    }

    #[test]
    fn magnitude_matches_signed_negation() {
        for raw in [0x8001u16, 0x9C40, 0xC000, 0xFF38, 0xFFFF] {
            let signed = raw as i16;
            assert_eq!(twos_complement_magnitude(raw) as i32, -(signed as i32));
        }
    }
}
