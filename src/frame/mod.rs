//! # Telemetry Frame Module
//!
//! Wire contract for the peripheral's notification payloads.
//!
//! This module handles:
//! - Frame and GATT constants (payload size, handles, UUIDs, CCCD value)
//! - Decoding 8-byte little-endian IEEE-754 frames into samples
//! - Encoding samples back into frames (tests and simulated peripherals)

pub mod protocol;
pub mod encoder;
pub mod decoder;
