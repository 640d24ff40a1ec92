//! Application-wide constants and runtime platform configuration.
//!
//! Protocol identifiers, timing parameters and capacities live here so
//! they can be tuned in one place. The only runtime input is the
//! Homebridge-style platform block parsed by [`PlatformConfig::from_json`].

use embassy_time::Duration;
use heapless::String;
use serde::Deserialize;
use uuid::Uuid;

use crate::ble::BleAddress;
use crate::color::ColorValueMode;
use crate::error::ConfigError;

// Platform identity

/// Name users put in the `platform` key of the host configuration.
pub const PLATFORM_NAME: &str = "Homebridge MohuanLED BLE";

/// Package name the host registers accessories under.
pub const PLUGIN_NAME: &str = "@sorae42/homebridge-mohuan-ble";

// BLE

/// Vendor service exposing the command characteristic (0xEEA0).
pub const LED_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000eea0_0000_1000_8000_00805f9b34fb);

/// Writable command characteristic (0xEE01).
pub const LED_WRITE_CHAR_UUID: Uuid = Uuid::from_u128(0x0000ee01_0000_1000_8000_00805f9b34fb);

/// Service filter passed to the scanner. The strips do not advertise the
/// vendor service, so scanning is unfiltered and matching is by address.
pub const SCAN_SERVICE_FILTER: &[Uuid] = &[];

/// Idle time after the last successful write before the link is dropped.
pub const IDLE_DISCONNECT_MS: u64 = 5_000;

/// Maximum number of addresses the scan service can track.
pub const MAX_SCAN_SUBSCRIPTIONS: usize = 4;

/// Depth of the discovery report queue between the transport and the
/// scan service.
pub const DISCOVERY_QUEUE_DEPTH: usize = 8;

/// Depth of each platform's event queue.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Longest peripheral / accessory name we keep (bytes).
pub const MAX_NAME_LEN: usize = 32;

// Colour

/// Divisor for the device brightness byte: `round(brightness / 100 * 255)`.
pub const BRIGHTNESS_SCALE_DIVISOR: u16 = 100;

/// Divisor that reproduces the legacy dimmed colours (`brightness / 200`).
/// Opt in through `colorValueDivisor` in the platform config.
pub const LEGACY_COLOR_VALUE_DIVISOR: u16 = 200;

// Accessory information

/// Used when the peripheral advertises no local name.
pub const DEFAULT_ACCESSORY_NAME: &str = "Light Strip";

pub const ACCESSORY_MANUFACTURER: &str = "Welpur, Kimoji LLC.";
pub const ACCESSORY_MODEL: &str = "5050RGBLED";
pub const ACCESSORY_SERIAL_NUMBER: &str = "CNLEDNOSERIALLOL";

/// Namespace for name-based accessory ids (`hkid`).
pub const HKID_NAMESPACE: Uuid = Uuid::from_u128(0x6d6f6875_616e_4c45_8442_4c4548415021);

// Runtime configuration

/// Validated platform configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformConfig {
    /// Instance name (for logs only).
    pub name: String<MAX_NAME_LEN>,
    /// Peripheral to bind to.
    pub address: BleAddress,
    /// Debounce window for the idle disconnect.
    pub idle_timeout: Duration,
    /// How the HSV value input is derived from brightness.
    pub color_value: ColorValueMode,
}

/// Wire shape of the platform block. Unknown keys are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlatformConfig<'a> {
    #[serde(borrow)]
    platform: Option<&'a str>,
    #[serde(borrow)]
    name: Option<&'a str>,
    #[serde(borrow)]
    bluetoothuuid: Option<&'a str>,
    idle_timeout_ms: Option<u64>,
    color_value_divisor: Option<u16>,
}

impl PlatformConfig {
    /// Config bound to `address` with every optional setting at its default.
    pub fn new(address: BleAddress) -> Self {
        Self {
            name: truncated(PLATFORM_NAME),
            address,
            idle_timeout: Duration::from_millis(IDLE_DISCONNECT_MS),
            color_value: ColorValueMode::Full,
        }
    }

    /// Parse and validate a platform block.
    pub fn from_json(json: &[u8]) -> Result<Self, ConfigError> {
        let (raw, _) = serde_json_core::from_slice::<RawPlatformConfig<'_>>(json)
            .map_err(|_| ConfigError::Malformed)?;

        if let Some(platform) = raw.platform {
            if platform != PLATFORM_NAME {
                warn!("config is for platform `{}`, expected `{}`", platform, PLATFORM_NAME);
            }
        }

        let address = raw
            .bluetoothuuid
            .ok_or(ConfigError::MissingAddress)?
            .parse::<BleAddress>()
            .map_err(|_| ConfigError::InvalidAddress)?;

        let mut config = Self::new(address);

        if let Some(name) = raw.name {
            config.name = truncated(name);
        }

        if let Some(ms) = raw.idle_timeout_ms {
            if ms == 0 {
                return Err(ConfigError::InvalidIdleTimeout);
            }
            config.idle_timeout = Duration::from_millis(ms);
        }

        if let Some(divisor) = raw.color_value_divisor {
            if divisor == 0 {
                return Err(ConfigError::InvalidColorDivisor);
            }
            config.color_value = ColorValueMode::Brightness { divisor };
        }

        Ok(config)
    }
}

/// Copy `s` into a bounded string, cutting at a char boundary.
pub(crate) fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let json = br#"{"bluetoothuuid": "aa:bb:cc:dd:ee:ff"}"#;
        let config = PlatformConfig::from_json(json).unwrap();
        assert_eq!(config.address, BleAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert_eq!(config.idle_timeout, Duration::from_millis(5_000));
        assert_eq!(config.color_value, ColorValueMode::Full);
        assert_eq!(config.name.as_str(), PLATFORM_NAME);
    }

    #[test]
    fn full_homebridge_block() {
        let json = br#"{
            "platform": "Homebridge MohuanLED BLE",
            "name": "Desk strip",
            "bluetoothuuid": "aabbccddeeff",
            "idleTimeoutMs": 2500,
            "colorValueDivisor": 200,
            "accessory": "ignored"
        }"#;
        let config = PlatformConfig::from_json(json).unwrap();
        assert_eq!(config.name.as_str(), "Desk strip");
        assert_eq!(config.address, BleAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert_eq!(config.idle_timeout, Duration::from_millis(2_500));
        assert_eq!(config.color_value, ColorValueMode::Brightness { divisor: 200 });
    }

    #[test]
    fn missing_address_rejected() {
        let json = br#"{"platform": "Homebridge MohuanLED BLE"}"#;
        assert_eq!(PlatformConfig::from_json(json), Err(ConfigError::MissingAddress));
    }

    #[test]
    fn invalid_address_rejected() {
        let json = br#"{"bluetoothuuid": "not-an-address"}"#;
        assert_eq!(PlatformConfig::from_json(json), Err(ConfigError::InvalidAddress));
    }

    #[test]
    fn zero_timeout_rejected() {
        let json = br#"{"bluetoothuuid": "AA:BB:CC:DD:EE:FF", "idleTimeoutMs": 0}"#;
        assert_eq!(PlatformConfig::from_json(json), Err(ConfigError::InvalidIdleTimeout));
    }

    #[test]
    fn zero_divisor_rejected() {
        let json = br#"{"bluetoothuuid": "AA:BB:CC:DD:EE:FF", "colorValueDivisor": 0}"#;
        assert_eq!(PlatformConfig::from_json(json), Err(ConfigError::InvalidColorDivisor));
    }

    #[test]
    fn malformed_json_rejected() {
        assert_eq!(PlatformConfig::from_json(b"{"), Err(ConfigError::Malformed));
        assert_eq!(PlatformConfig::from_json(b"[1, 2]"), Err(ConfigError::Malformed));
    }

    #[test]
    fn long_name_truncated() {
        let name: String<8> = truncated("Living room strip");
        assert_eq!(name.as_str(), "Living r");
    }
}
