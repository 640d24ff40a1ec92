//! Stable accessory identity and its cached form.
//!
//! The host persists one small JSON record per accessory so it can be
//! restored before the peripheral is seen again:
//!
//! ```json
//! {"hkid":"<uuid>","uuid":"AA:BB:CC:DD:EE:FF","name":"MohuanLED"}
//! ```
//!
//! `uuid` holds the BLE address; the name is historical.

use core::fmt::Write;

use heapless::String;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ble::BleAddress;
use crate::config::{truncated, DEFAULT_ACCESSORY_NAME, HKID_NAMESPACE, MAX_NAME_LEN};
use crate::error::Error;

/// Upper bound for one serialized record.
pub const MAX_CACHE_RECORD_LEN: usize = 160;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// HomeKit accessory id, derived from the address.
    pub hkid: Uuid,
    pub address: BleAddress,
    pub display_name: String<MAX_NAME_LEN>,
}

#[derive(Serialize, Deserialize)]
struct CachedContext<'a> {
    hkid: &'a str,
    uuid: &'a str,
    name: &'a str,
}

impl DeviceIdentity {
    /// Identity for a freshly discovered peripheral. An empty advertised
    /// name falls back to the default accessory name.
    pub fn new(address: BleAddress, advertised_name: &str) -> Self {
        let name = if advertised_name.is_empty() {
            DEFAULT_ACCESSORY_NAME
        } else {
            advertised_name
        };
        Self {
            hkid: Self::hkid_for(address),
            address,
            display_name: truncated(name),
        }
    }

    /// Name-based (v5) UUID of the address, so the same strip keeps the
    /// same HomeKit id across restarts and reinstalls.
    pub fn hkid_for(address: BleAddress) -> Uuid {
        Uuid::new_v5(&HKID_NAMESPACE, &address.0)
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut hkid_buf = Uuid::encode_buffer();
        let hkid = self.hkid.hyphenated().encode_lower(&mut hkid_buf);

        let mut address: String<17> = String::new();
        write!(address, "{}", self.address).map_err(|_| Error::BufferOverflow)?;

        let record = CachedContext {
            hkid,
            uuid: address.as_str(),
            name: self.display_name.as_str(),
        };
        serde_json_core::to_slice(&record, buf).map_err(|_| Error::BufferOverflow)
    }

    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        let (record, _) =
            serde_json_core::from_slice::<CachedContext<'_>>(json).map_err(|_| Error::Cache)?;
        let hkid = Uuid::parse_str(record.hkid).map_err(|_| Error::Cache)?;
        let address = record.uuid.parse().map_err(|_| Error::Cache)?;
        Ok(Self {
            hkid,
            address,
            display_name: truncated(record.name),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
