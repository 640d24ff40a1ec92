//! btleplug-backed transport for desktop hosts.

use btleplug::api::{
    Central as _, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral};
use embassy_sync::channel::DynamicSender;
use futures::stream::StreamExt;
use uuid::Uuid;

use crate::ble::transport::{Central, Peripheral};
use crate::ble::{BleAddress, DiscoveredDevice};
use crate::config::truncated;
use crate::error::{BleError, Error};

/// The host's first Bluetooth adapter.
pub struct BtleCentral {
    adapter: Adapter,
}

impl BtleCentral {
    pub async fn first_adapter() -> Result<Self, Error> {
        let manager = Manager::new().await.map_err(|e| {
            error!("Bluetooth manager unavailable: {}", e);
            Error::BleNotAvailable
        })?;
        let adapters = manager.adapters().await.map_err(|e| {
            error!("could not list Bluetooth adapters: {}", e);
            Error::BleNotAvailable
        })?;
        let adapter = adapters.into_iter().next().ok_or(Error::BleNotAvailable)?;
        Ok(Self { adapter })
    }

    /// Forward every discovery and advertisement update to `reports` until
    /// the adapter's event stream ends.
    pub async fn pump_discoveries(
        &self,
        reports: DynamicSender<'_, DiscoveredDevice<BtlePeripheral>>,
    ) -> Result<(), Error> {
        let mut events = self.adapter.events().await.map_err(|e| {
            error!("adapter event stream unavailable: {}", e);
            Error::Ble(BleError::ScanFailed)
        })?;

        while let Some(event) = events.next().await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };
            let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                continue;
            };
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };

            let address = BleAddress(props.address.into_inner());
            let name = truncated(props.local_name.as_deref().unwrap_or(""));
            trace!("advertisement from {} ({})", address, name.as_str());
            reports
                .send(DiscoveredDevice {
                    address,
                    name,
                    peripheral: BtlePeripheral { inner: peripheral },
                })
                .await;
        }
        Ok(())
    }
}

impl Central for BtleCentral {
    async fn start_scan(&self, service_filter: &[Uuid]) -> Result<(), BleError> {
        let filter = ScanFilter {
            services: service_filter.to_vec(),
        };
        self.adapter.start_scan(filter).await.map_err(|e| {
            warn!("start_scan: {}", e);
            BleError::ScanFailed
        })
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.adapter.stop_scan().await.map_err(|e| {
            warn!("stop_scan: {}", e);
            BleError::ScanFailed
        })
    }
}

pub struct BtlePeripheral {
    inner: PlatformPeripheral,
}

impl Peripheral for BtlePeripheral {
    type Characteristic = Characteristic;

    async fn connect(&mut self) -> Result<(), BleError> {
        if self.inner.is_connected().await.unwrap_or(false) {
            return Ok(());
        }
        self.inner.connect().await.map_err(|e| {
            debug!("connect: {}", e);
            BleError::ConnectFailed
        })
    }

    async fn discover_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic, BleError> {
        self.inner.discover_services().await.map_err(|e| {
            debug!("discover_services: {}", e);
            BleError::DiscoveryFailed
        })?;
        self.inner
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
            .ok_or(BleError::CharacteristicNotFound)
    }

    async fn write(
        &mut self,
        characteristic: &Characteristic,
        data: &[u8],
        with_ack: bool,
    ) -> Result<(), BleError> {
        let write_type = if with_ack {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.inner
            .write(characteristic, data, write_type)
            .await
            .map_err(|e| match e {
                btleplug::Error::NotConnected => BleError::Disconnected,
                other => {
                    debug!("write: {}", other);
                    BleError::WriteFailed
                }
            })
    }

    async fn disconnect(&mut self) -> Result<(), BleError> {
        self.inner.disconnect().await.map_err(|e| {
            debug!("disconnect: {}", e);
            BleError::Disconnected
        })
    }
}
