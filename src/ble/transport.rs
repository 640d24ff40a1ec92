//! What the core needs from a BLE stack.
//!
//! Implementations report failures as [`BleError`]; raw stack errors never
//! cross this boundary.

#![allow(async_fn_in_trait)]

use uuid::Uuid;

use crate::error::BleError;

/// Process-wide scanner control.
pub trait Central {
    /// Start reporting advertisements. Only peripherals advertising one of
    /// `service_filter` are reported; an empty filter reports everything.
    async fn start_scan(&self, service_filter: &[Uuid]) -> Result<(), BleError>;

    async fn stop_scan(&self) -> Result<(), BleError>;
}

/// A single remote peripheral.
pub trait Peripheral {
    /// Handle to a discovered characteristic, valid while connected.
    type Characteristic;

    async fn connect(&mut self) -> Result<(), BleError>;

    /// Discover `service` and return its `characteristic`.
    async fn discover_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Self::Characteristic, BleError>;

    /// Write `data`; with `with_ack` the call resolves only after the
    /// peripheral acknowledged the write.
    async fn write(
        &mut self,
        characteristic: &Self::Characteristic,
        data: &[u8],
        with_ack: bool,
    ) -> Result<(), BleError>;

    async fn disconnect(&mut self) -> Result<(), BleError>;
}
