//! Bluetooth Low Energy subsystem (Central role).
//!
//! 1. **Transport** - the [`Central`] / [`Peripheral`] traits the BLE stack
//!    has to provide (scan, connect, discover, write, disconnect).
//! 2. **Scanner** - one process-wide scan service that routes discovery
//!    reports to subscribers keyed by address.
//! 3. **Link** - the per-accessory connection state machine with the
//!    debounced idle disconnect.
//!
//! The btleplug-backed transport lives in `btle` and is only built with the
//! `host` feature.

pub mod link;
pub mod scanner;
pub mod transport;

#[cfg(feature = "host")]
pub mod btle;

#[cfg(test)]
pub(crate) mod fake;

use core::fmt;
use core::str::FromStr;

use heapless::String;

use crate::config::MAX_NAME_LEN;

pub use link::{DeviceLink, LinkState};
pub use scanner::{ScanService, ScanTrigger};
pub use transport::{Central, Peripheral};

/// 48-bit BLE device address, most significant byte first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BleAddress(pub [u8; 6]);

/// Returned when a string is not a 6-byte hex address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressParseError;

impl FromStr for BleAddress {
    type Err = AddressParseError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff` and `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut nibbles = 0usize;

        for c in s.trim().chars() {
            if c == ':' || c == '-' {
                continue;
            }
            let digit = c.to_digit(16).ok_or(AddressParseError)? as u8;
            let idx = nibbles / 2;
            if idx >= bytes.len() {
                return Err(AddressParseError);
            }
            bytes[idx] = (bytes[idx] << 4) | digit;
            nibbles += 1;
        }

        if nibbles != 12 {
            return Err(AddressParseError);
        }
        Ok(BleAddress(bytes))
    }
}

impl fmt::Display for BleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

/// A peripheral reported by the scanner.
pub struct DiscoveredDevice<P> {
    /// BLE address.
    pub address: BleAddress,
    /// Advertised local name (truncated to 32 bytes), empty if none.
    pub name: String<MAX_NAME_LEN>,
    /// Transport handle used to connect later.
    pub peripheral: P,
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
