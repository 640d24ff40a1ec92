//! Platform: binds one configured strip to one HomeKit accessory and runs
//! the dispatch loop.
//!
//! Everything that touches accessory state runs on this loop: discovery
//! reports, host requests and the idle timer. Requests are served one at a
//! time, so writes to the strip never interleave.

use embassy_futures::select::{select, Either};
use embassy_sync::channel::{DynamicReceiver, DynamicSender};

use crate::accessory::LightbulbAccessory;
use crate::ble::{DiscoveredDevice, Peripheral, ScanTrigger};
use crate::ble::link::DeviceLink;
use crate::config::PlatformConfig;
use crate::error::Error;
use crate::hap::{HapStatus, HostReply, HostRequest};
use crate::identity::DeviceIdentity;

/// Host-side persistence of accessories.
pub trait AccessoryHost {
    /// Persist a newly created accessory so it is restored on next start.
    fn register_accessory(&mut self, identity: &DeviceIdentity) -> Result<(), Error>;
}

/// Everything the dispatch loop reacts to besides its timer.
pub enum PlatformEvent<P> {
    Discovered(DiscoveredDevice<P>),
    Request(HostRequest),
}

impl<P> From<DiscoveredDevice<P>> for PlatformEvent<P> {
    fn from(device: DiscoveredDevice<P>) -> Self {
        PlatformEvent::Discovered(device)
    }
}

impl<P> From<HostRequest> for PlatformEvent<P> {
    fn from(request: HostRequest) -> Self {
        PlatformEvent::Request(request)
    }
}

/// The scan service must already route the configured address to this
/// platform's event queue; the platform only ever requests scans.
pub struct Platform<'a, P: Peripheral, H: AccessoryHost> {
    config: PlatformConfig,
    host: H,
    scanner: &'a dyn ScanTrigger,
    accessory: Option<LightbulbAccessory<'a, P>>,
}

impl<'a, P: Peripheral, H: AccessoryHost> Platform<'a, P, H> {
    pub fn new(config: PlatformConfig, host: H, scanner: &'a dyn ScanTrigger) -> Self {
        info!("Finished initializing platform: {}", config.name.as_str());
        Self {
            config,
            host,
            scanner,
            accessory: None,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn accessory(&self) -> Option<&LightbulbAccessory<'a, P>> {
        self.accessory.as_ref()
    }

    /// Restore an accessory the host cached on a previous run. The link
    /// starts in `Idle` until the peripheral is rediscovered.
    pub fn configure_accessory(&mut self, identity: DeviceIdentity) {
        if identity.address != self.config.address {
            warn!("ignoring cached accessory for {}", identity.address);
            return;
        }
        if self.accessory.is_some() {
            debug!("accessory for {} already configured", identity.address);
            return;
        }
        info!("Loading accessory from cache: {}", identity.display_name.as_str());
        self.accessory = Some(self.build_accessory(identity));
    }

    /// Kick off the initial discovery.
    pub fn discover_devices(&self) {
        self.scanner.request_scan(self.config.address);
    }

    pub fn handle_discovery(&mut self, device: DiscoveredDevice<P>) {
        if device.address != self.config.address {
            trace!("ignoring report for {}", device.address);
            return;
        }

        if self.accessory.is_none() {
            let identity = DeviceIdentity::new(device.address, device.name.as_str());
            info!("Setting up new accessory: {}", identity.display_name.as_str());
            if let Err(e) = self.host.register_accessory(&identity) {
                warn!("could not persist accessory {}: {:?}", identity.address, e);
            }
            self.accessory = Some(self.build_accessory(identity));
        }

        if let Some(accessory) = self.accessory.as_mut() {
            accessory.link_mut().attach(device.peripheral);
        }
    }

    pub async fn handle_request(&mut self, request: HostRequest) -> HostReply {
        match self.accessory.as_mut() {
            Some(accessory) => accessory.handle(request).await,
            None => {
                debug!("request before the strip was found: {:?}", request);
                self.scanner.request_scan(self.config.address);
                Err(HapStatus::ServiceCommunicationFailure)
            }
        }
    }

    /// Dispatch loop. Every request gets exactly one reply on `replies`.
    pub async fn run(
        &mut self,
        events: DynamicReceiver<'_, PlatformEvent<P>>,
        replies: DynamicSender<'_, HostReply>,
    ) -> ! {
        self.discover_devices();
        loop {
            let event = match select(events.receive(), self.idle_expired()).await {
                Either::First(event) => Some(event),
                Either::Second(()) => None,
            };

            match event {
                Some(PlatformEvent::Discovered(device)) => self.handle_discovery(device),
                Some(PlatformEvent::Request(request)) => {
                    let reply = self.handle_request(request).await;
                    replies.send(reply).await;
                }
                None => {
                    if let Some(accessory) = self.accessory.as_mut() {
                        accessory.link_mut().on_idle_expired().await;
                    }
                }
            }
        }
    }

    async fn idle_expired(&self) {
        match self.accessory.as_ref() {
            Some(accessory) => accessory.link().idle_expired().await,
            None => core::future::pending::<()>().await,
        }
    }

    fn build_accessory(&self, identity: DeviceIdentity) -> LightbulbAccessory<'a, P> {
        let link = DeviceLink::new(identity.address, self.scanner, self.config.idle_timeout);
        LightbulbAccessory::new(identity, link, self.config.color_value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
