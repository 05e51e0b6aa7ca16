//! # Telemetry Protocol Constants and Types
//!
//! Core wire definitions shared by the peripheral firmware and the host.

use uuid::Uuid;

/// A single telemetry sample (no intrinsic timestamp)
pub type Sample = f64;

/// Notification payload size: one little-endian `f64`
pub const FRAME_LEN: usize = 8;

/// Value written to the client characteristic configuration descriptor
/// to enable notifications (little-endian `0x0001`)
pub const NOTIFY_ENABLE_VALUE: [u8; 2] = [0x01, 0x00];

/// Client Characteristic Configuration Descriptor UUID (0x2902)
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5f9b_34fb);

/// Default data characteristic handle on the nRF52840 firmware
pub const DEFAULT_DATA_HANDLE: u16 = 0x0012;

/// Default peripheral address
pub const DEFAULT_DEVICE_ADDRESS: &str = "6C:91:36:90:97:D7";

/// Custom telemetry service UUID advertised by the firmware
pub const TELEMETRY_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x1234_5678_1234_5678_1234_5678_9abc_def0);

/// Custom telemetry characteristic UUID (READ | NOTIFY)
pub const TELEMETRY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x1234_5678_1234_5678_1234_5678_9abc_def1);

/// The data characteristic a session subscribes to
///
/// BLE stacks that expose raw ATT handles use `handle` and
/// [`DataCharacteristic::cccd_handle`]; stacks that only expose GATT UUIDs
/// (btleplug) resolve the characteristic through `uuid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataCharacteristic {
    /// Value handle of the data characteristic
    pub handle: u16,

    /// GATT UUID of the data characteristic
    pub uuid: Uuid,
}

impl DataCharacteristic {
    pub fn new(handle: u16, uuid: Uuid) -> Self {
        Self { handle, uuid }
    }

    /// Handle of the notification-control descriptor
    ///
    /// By convention the CCCD sits directly after the value handle.
    /// Returns `None` for the last handle in the ATT range.
    pub fn cccd_handle(&self) -> Option<u16> {
        self.handle.checked_add(1)
    }
}

impl Default for DataCharacteristic {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_HANDLE, TELEMETRY_CHARACTERISTIC_UUID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len_matches_f64() {
        assert_eq!(FRAME_LEN, std::mem::size_of::<f64>());
    }

    #[test]
    fn test_notify_enable_value() {
        assert_eq!(u16::from_le_bytes(NOTIFY_ENABLE_VALUE), 0x0001);
    }

    #[test]
    fn test_default_cccd_handle() {
        let characteristic = DataCharacteristic::default();
        assert_eq!(characteristic.handle, 0x0012);
        assert_eq!(characteristic.cccd_handle(), Some(0x0013));
    }

    #[test]
    fn test_cccd_handle_at_end_of_range() {
        let characteristic = DataCharacteristic::new(u16::MAX, TELEMETRY_CHARACTERISTIC_UUID);
        assert_eq!(characteristic.cccd_handle(), None);
    }

    #[test]
    fn test_uuids_match_firmware() {
        assert_eq!(
            TELEMETRY_SERVICE_UUID.to_string(),
            "12345678-1234-5678-1234-56789abcdef0"
        );
        assert_eq!(
            TELEMETRY_CHARACTERISTIC_UUID.to_string(),
            "12345678-1234-5678-1234-56789abcdef1"
        );
        assert_eq!(CCCD_UUID.to_string(), "00002902-0000-1000-8000-00805f9b34fb");
    }
}
