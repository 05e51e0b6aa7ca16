//! # Telemetry Frame Decoder
//!
//! Decodes notification payloads into samples.

use super::protocol::{Sample, FRAME_LEN};
use crate::error::{Result, TelemetryError};

/// Decode a notification payload into a sample
///
/// # Arguments
///
/// * `frame` - Raw notification payload
///
/// # Returns
///
/// * `Result<Sample>` - Decoded sample, or `MalformedFrame` if the payload
///   is not exactly [`FRAME_LEN`] bytes
pub fn try_decode_sample(frame: &[u8]) -> Result<Sample> {
    let bytes: [u8; FRAME_LEN] = frame.try_into().map_err(|_| TelemetryError::MalformedFrame {
        expected: FRAME_LEN,
        actual: frame.len(),
    })?;

    Ok(Sample::from_le_bytes(bytes))
}

/// Decode a notification payload, yielding nothing for malformed frames
///
/// Truncated or oversized notifications are dropped without raising.
///
/// # Examples
///
/// ```
/// use ble_telemetry::frame::decoder::decode_sample;
///
/// assert_eq!(decode_sample(&2.5f64.to_le_bytes()), Some(2.5));
/// assert_eq!(decode_sample(&[0x01, 0x02, 0x03]), None);
/// ```
pub fn decode_sample(frame: &[u8]) -> Option<Sample> {
    try_decode_sample(frame).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::encode_sample;

    #[test]
    fn test_decode_known_frame() {
        let frame = [0, 0, 0, 0, 0, 0, 0xF0, 0x3F];
        assert_eq!(decode_sample(&frame), Some(1.0));
    }

    #[test]
    fn test_decode_firmware_initial_value() {
        // custom_value = 1.52 on the nRF52840 before the first random update
        let frame = 1.52f64.to_le_bytes();
        assert_eq!(decode_sample(&frame), Some(1.52));
    }

    #[test]
    fn test_decode_wrong_lengths_yield_no_sample() {
        let buffer = [0xAAu8; 32];
        for len in (0..=32).filter(|&len| len != FRAME_LEN) {
            assert_eq!(decode_sample(&buffer[..len]), None, "length {} should be dropped", len);
        }
    }

    #[test]
    fn test_try_decode_reports_actual_length() {
        let result = try_decode_sample(&[1, 2, 3, 4, 5]);
        match result {
            Err(TelemetryError::MalformedFrame { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 5);
            }
            other => panic!("Expected MalformedFrame, got: {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let values = [
            0.0,
            -0.0,
            1.0,
            -1.0,
            2.999_999_999,
            f64::MIN_POSITIVE,
            f64::MAX,
            f64::MIN,
            f64::EPSILON,
            5e-324, // smallest subnormal
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];

        for value in values {
            let decoded = decode_sample(&encode_sample(value)).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits(), "value {:e} changed", value);
        }
    }

    #[test]
    fn test_round_trip_preserves_nan_payload() {
        let frame = [0x01, 0, 0, 0, 0, 0, 0xF8, 0x7F];
        let decoded = decode_sample(&frame).unwrap();
        assert!(decoded.is_nan());
        assert_eq!(encode_sample(decoded), frame);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let frame = encode_sample(std::f64::consts::PI);
        assert_eq!(decode_sample(&frame), decode_sample(&frame));
    }
}
