use std::fmt;

use thiserror::Error;

/// Offset of the little-endian weight field in the scale's manufacturer data.
pub const DEFAULT_WEIGHT_OFFSET: usize = 17;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload too short: {len} bytes, weight field needs {needed}")]
    PayloadTooShort { len: usize, needed: usize },
}

/// A weight as broadcast by the scale, in hundredths of a kilogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weight(u16);

impl Weight {
    pub fn from_hundredths(hundredths: u16) -> Self {
        Weight(hundredths)
    }

    pub fn kilograms(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Weight {
    // `{:?}` on f64 keeps the shortest round-trip digits but never drops the
    // fractional part, so 0 prints as "0.0" rather than "0".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}Kg", self.kilograms())
    }
}

/// Reads the two-byte little-endian weight starting at `offset`.
pub fn decode_weight(raw: &[u8], offset: usize) -> Result<Weight, DecodeError> {
    let needed = offset.saturating_add(2);
    match raw.get(offset..needed) {
        Some(&[low, high]) => Ok(Weight::from_hundredths(u16::from_le_bytes([low, high]))),
        _ => Err(DecodeError::PayloadTooShort {
            len: raw.len(),
            needed,
        }),
    }
}

/// Uppercase hex dump grouped in byte pairs, e.g. `AABB ED67 39`.
pub fn format_raw_hex(raw: &[u8]) -> String {
    raw.chunks(2)
        .map(|pair| pair.iter().map(|b| format!("{:02X}", b)).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(low: u8, high: u8) -> Vec<u8> {
        let mut raw = vec![0xAA; 19];
        raw[17] = low;
        raw[18] = high;
        raw
    }

    #[test]
    fn test_decode_scale_reading() {
        let raw = payload_with(0xC5, 0x03);
        let weight = decode_weight(&raw, DEFAULT_WEIGHT_OFFSET).unwrap();
        assert_eq!(weight, Weight::from_hundredths(965));
        assert_eq!(weight.to_string(), "9.65Kg");
    }

    #[test]
    fn test_decode_bounds() {
        let zero = decode_weight(&payload_with(0x00, 0x00), DEFAULT_WEIGHT_OFFSET).unwrap();
        assert_eq!(zero.to_string(), "0.0Kg");

        let max = decode_weight(&payload_with(0xFF, 0xFF), DEFAULT_WEIGHT_OFFSET).unwrap();
        assert_eq!(max.to_string(), "655.35Kg");
    }

    #[test]
    fn test_decode_matches_float_division() {
        for (low, high) in [(0x01, 0x00), (0x10, 0x27), (0x64, 0x00), (0x39, 0x30), (0xE8, 0x03)] {
            let mut raw = payload_with(low, high);
            raw.extend_from_slice(&[0x12, 0x34]);
            let expected = f64::from(u16::from_le_bytes([low, high])) / 100.0;
            let weight = decode_weight(&raw, DEFAULT_WEIGHT_OFFSET).unwrap();
            assert_eq!(weight.to_string(), format!("{:?}Kg", expected));
        }
        let whole = decode_weight(&payload_with(0x10, 0x27), DEFAULT_WEIGHT_OFFSET).unwrap();
        assert_eq!(whole.to_string(), "100.0Kg");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let raw = payload_with(0x2A, 0x1F);
        assert_eq!(
            decode_weight(&raw, DEFAULT_WEIGHT_OFFSET),
            decode_weight(&raw, DEFAULT_WEIGHT_OFFSET)
        );
    }

    #[test]
    fn test_decode_short_payload() {
        let raw = [0u8; 18];
        assert_eq!(
            decode_weight(&raw, DEFAULT_WEIGHT_OFFSET),
            Err(DecodeError::PayloadTooShort { len: 18, needed: 19 })
        );
        assert!(decode_weight(&[], DEFAULT_WEIGHT_OFFSET).is_err());
        assert!(decode_weight(&[0x01], usize::MAX).is_err());
    }

    #[test]
    fn test_decode_custom_offset() {
        let weight = decode_weight(&[0x00, 0xC5, 0x03], 1).unwrap();
        assert_eq!(weight.to_string(), "9.65Kg");
    }

    #[test]
    fn test_format_raw_hex() {
        let raw = [0xAA, 0xBB, 0xED, 0x67, 0x39, 0x0A, 0xC5, 0xC0];
        assert_eq!(format_raw_hex(&raw), "AABB ED67 390A C5C0");
        assert_eq!(format_raw_hex(&[0x0F, 0xA0, 0x01]), "0FA0 01");
        assert_eq!(format_raw_hex(&[]), "");
    }

    #[test]
    fn test_format_raw_hex_round_trips() {
        let raw: Vec<u8> = (0u8..=40).map(|b| b.wrapping_mul(37)).collect();
        let hex = format_raw_hex(&raw).replace(' ', "");
        let decoded: Vec<u8> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect();
        assert_eq!(decoded, raw);
    }
}
