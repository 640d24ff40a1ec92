//! Per-accessory BLE link.
//!
//! ```text
//!   Idle ──discovery──► Discovered ──connect+discover──► Connected
//!    ▲                      ▲                                │
//!    └── (never) ───────────┴──── idle timeout / write error ┘
//! ```
//!
//! The peripheral handle is kept after a disconnect, so a link never goes
//! back to `Idle`. Every acknowledged write re-arms the idle deadline, and
//! only the last armed deadline can fire.

use embassy_time::{Duration, Instant, Timer};

use crate::ble::scanner::ScanTrigger;
use crate::ble::transport::Peripheral;
use crate::ble::BleAddress;
use crate::config::{LED_SERVICE_UUID, LED_WRITE_CHAR_UUID};
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// No peripheral handle yet.
    Idle,
    /// Handle known, not connected.
    Discovered,
    /// Connected with the write characteristic resolved.
    Connected,
}

struct ConnectionHandle<C> {
    characteristic: C,
}

pub struct DeviceLink<'a, P: Peripheral> {
    address: BleAddress,
    scanner: &'a dyn ScanTrigger,
    peripheral: Option<P>,
    connection: Option<ConnectionHandle<P::Characteristic>>,
    idle_timeout: Duration,
    idle_deadline: Option<Instant>,
}

impl<'a, P: Peripheral> DeviceLink<'a, P> {
    pub fn new(address: BleAddress, scanner: &'a dyn ScanTrigger, idle_timeout: Duration) -> Self {
        Self {
            address,
            scanner,
            peripheral: None,
            connection: None,
            idle_timeout,
            idle_deadline: None,
        }
    }

    pub fn address(&self) -> BleAddress {
        self.address
    }

    pub fn state(&self) -> LinkState {
        match (&self.peripheral, &self.connection) {
            (None, _) => LinkState::Idle,
            (Some(_), None) => LinkState::Discovered,
            (Some(_), Some(_)) => LinkState::Connected,
        }
    }

    /// Store the handle from a discovery report.
    ///
    /// Returns `false` if a handle is already held; the existing one is kept.
    pub fn attach(&mut self, peripheral: P) -> bool {
        if self.peripheral.is_some() {
            debug!("{} rediscovered, keeping existing handle", self.address);
            return false;
        }
        info!("{} discovered", self.address);
        self.peripheral = Some(peripheral);
        true
    }

    /// Bring the link to `Connected`.
    ///
    /// Without a peripheral handle this only asks the scan service for one
    /// and fails with [`Error::PeripheralNotFound`]; the caller is expected
    /// to retry once the host does.
    pub async fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.connection.is_some() {
            return Ok(());
        }

        let Some(peripheral) = self.peripheral.as_mut() else {
            info!("{} not discovered yet, requesting scan", self.address);
            self.scanner.request_scan(self.address);
            return Err(Error::PeripheralNotFound);
        };

        debug!("connecting to {}", self.address);
        if let Err(e) = peripheral.connect().await {
            warn!("connect to {} failed: {:?}", self.address, e);
            return Err(e.into());
        }

        match peripheral
            .discover_characteristic(LED_SERVICE_UUID, LED_WRITE_CHAR_UUID)
            .await
        {
            Ok(characteristic) => {
                info!("connected to {}", self.address);
                self.connection = Some(ConnectionHandle { characteristic });
                self.idle_deadline = Some(Instant::now() + self.idle_timeout);
                Ok(())
            }
            Err(e) => {
                warn!("{} has no LED write characteristic: {:?}", self.address, e);
                if let Err(e) = peripheral.disconnect().await {
                    debug!("disconnect after failed discovery: {:?}", e);
                }
                Err(e.into())
            }
        }
    }

    /// Write one frame with acknowledgement and re-arm the idle timer.
    ///
    /// A failed write tears the connection down so the next command
    /// reconnects from scratch.
    pub async fn send_command(&mut self, frame: &[u8]) -> Result<(), Error> {
        let (Some(peripheral), Some(connection)) =
            (self.peripheral.as_mut(), self.connection.as_ref())
        else {
            return Err(Error::NotConnected);
        };

        trace!("write {:?} to {}", frame, self.address);
        let written = peripheral.write(&connection.characteristic, frame, true).await;
        match written {
            Ok(()) => {
                self.arm_idle_disconnect(self.idle_timeout);
                Ok(())
            }
            Err(e) => {
                error!("write to {} failed: {:?}", self.address, e);
                self.teardown().await;
                Err(e.into())
            }
        }
    }

    /// Replace any pending idle deadline with one `timeout` from now.
    pub fn arm_idle_disconnect(&mut self, timeout: Duration) {
        self.idle_deadline = Some(Instant::now() + timeout);
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_deadline
    }

    /// Resolves once the armed deadline passes; never resolves when none is armed.
    pub async fn idle_expired(&self) {
        match self.idle_deadline {
            Some(at) => Timer::at(at).await,
            None => core::future::pending::<()>().await,
        }
    }

    /// Called when the idle deadline fires.
    pub async fn on_idle_expired(&mut self) {
        self.idle_deadline = None;
        if self.connection.is_some() {
            info!("{} idle, disconnecting", self.address);
            self.teardown().await;
        }
    }

    /// Drop the connection, best effort. The peripheral handle is kept.
    pub async fn disconnect(&mut self) {
        if self.connection.is_some() {
            self.teardown().await;
        }
    }

    async fn teardown(&mut self) {
        self.connection = None;
        self.idle_deadline = None;
        if let Some(peripheral) = self.peripheral.as_mut() {
            if let Err(e) = peripheral.disconnect().await {
                warn!("disconnect from {} failed: {:?}", self.address, e);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
