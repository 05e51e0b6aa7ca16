//! # Telemetry Frame Encoder
//!
//! Encodes samples the way the peripheral firmware puts them on the air.

use super::protocol::{Sample, FRAME_LEN};

/// Encode a sample into an 8-byte little-endian frame
///
/// # Examples
///
/// ```
/// use ble_telemetry::frame::encoder::encode_sample;
///
/// let frame = encode_sample(1.52);
/// assert_eq!(frame.len(), 8);
/// ```
pub fn encode_sample(sample: Sample) -> [u8; FRAME_LEN] {
    sample.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_little_endian() {
        // 1.0 = 0x3FF0_0000_0000_0000
        assert_eq!(encode_sample(1.0), [0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);
    }

    #[test]
    fn test_encode_zero() {
        assert_eq!(encode_sample(0.0), [0u8; FRAME_LEN]);
    }

    #[test]
    fn test_encode_negative_zero_sets_sign_bit() {
        let frame = encode_sample(-0.0);
        assert_eq!(frame[7], 0x80);
        assert!(frame[..7].iter().all(|&b| b == 0));
    }
}
