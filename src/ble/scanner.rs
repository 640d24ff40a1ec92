//! Process-wide scan service.
//!
//! Only one BLE scan runs at a time no matter how many accessories are
//! waiting for their peripheral. Each accessory subscribes once with its
//! address and event queue, then calls [`ScanTrigger::request_scan`]
//! whenever it needs the peripheral. A discovery report is forwarded to the
//! matching subscriber at most once per request; the scan stops as soon as
//! nobody is waiting.

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{DynamicReceiver, DynamicSender};
use embassy_sync::signal::Signal;
use heapless::LinearMap;

use crate::ble::transport::Central;
use crate::ble::{BleAddress, DiscoveredDevice};
use crate::config::SCAN_SERVICE_FILTER;
use crate::error::Error;

/// Handle accessories use to ask for their peripheral.
pub trait ScanTrigger {
    /// Ask for the next discovery report for `address`.
    fn request_scan(&self, address: BleAddress);
}

struct Subscription<'a, E> {
    sender: DynamicSender<'a, E>,
    /// A report is owed to this subscriber.
    pending: bool,
}

struct Registry<'a, E, const N: usize> {
    subscriptions: LinearMap<BleAddress, Subscription<'a, E>, N>,
    scanning: bool,
}

/// Address-keyed discovery router owning the adapter's scan state.
///
/// `E` is the subscriber's event type; reports are converted into it with
/// `From<DiscoveredDevice<P>>`.
pub struct ScanService<'a, E, const N: usize> {
    registry: Mutex<CriticalSectionRawMutex, RefCell<Registry<'a, E, N>>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl<'a, E, const N: usize> Default for ScanService<'a, E, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, E, const N: usize> ScanService<'a, E, N> {
    pub const fn new() -> Self {
        Self {
            registry: Mutex::new(RefCell::new(Registry {
                subscriptions: LinearMap::new(),
                scanning: false,
            })),
            wake: Signal::new(),
        }
    }

    /// Route reports for `address` to `sender`. Re-subscribing replaces the
    /// previous sender.
    pub fn subscribe(
        &self,
        address: BleAddress,
        sender: DynamicSender<'a, E>,
    ) -> Result<(), Error> {
        self.registry.lock(|registry| {
            let mut registry = registry.borrow_mut();
            let subscription = Subscription { sender, pending: false };
            match registry.subscriptions.insert(address, subscription) {
                Ok(_) => {
                    debug!("scan subscriber added for {}", address);
                    Ok(())
                }
                Err(_) => {
                    warn!("scan registry full, dropping subscriber {}", address);
                    Err(Error::RegistryFull)
                }
            }
        })
    }

    pub fn unsubscribe(&self, address: BleAddress) {
        let removed = self
            .registry
            .lock(|registry| registry.borrow_mut().subscriptions.remove(&address).is_some());
        if removed {
            self.wake.signal(());
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.registry.lock(|registry| registry.borrow().scanning)
    }

    /// Whether a report is still owed to `address`.
    pub fn is_pending(&self, address: BleAddress) -> bool {
        self.registry.lock(|registry| {
            registry
                .borrow()
                .subscriptions
                .get(&address)
                .map(|s| s.pending)
                .unwrap_or(false)
        })
    }

    /// Forward `device` to its subscriber if one is waiting.
    ///
    /// Returns `true` when the report was delivered. Reports for unknown
    /// addresses, or for subscribers that already got theirs, are dropped.
    pub fn dispatch<P>(&self, device: DiscoveredDevice<P>) -> bool
    where
        E: From<DiscoveredDevice<P>>,
    {
        let address = device.address;
        let delivered = self.registry.lock(|registry| {
            let mut registry = registry.borrow_mut();
            let Some(subscription) = registry.subscriptions.get_mut(&address) else {
                return false;
            };
            if !subscription.pending {
                return false;
            }
            match subscription.sender.try_send(E::from(device)) {
                Ok(()) => {
                    subscription.pending = false;
                    true
                }
                Err(_) => {
                    warn!("event queue full, report for {} kept pending", address);
                    false
                }
            }
        });
        if delivered {
            debug!("discovered {}", address);
            self.wake.signal(());
        }
        delivered
    }

    /// Start or stop the adapter scan so that it runs exactly while some
    /// subscriber is pending.
    async fn reconcile<C: Central>(&self, central: &C) {
        let (wanted, scanning) = self.registry.lock(|registry| {
            let registry = registry.borrow();
            let wanted = registry.subscriptions.values().any(|s| s.pending);
            (wanted, registry.scanning)
        });

        if wanted && !scanning {
            match central.start_scan(SCAN_SERVICE_FILTER).await {
                Ok(()) => {
                    info!("BLE scan started");
                    self.set_scanning(true);
                }
                Err(e) => warn!("BLE scan could not start: {:?}", e),
            }
        } else if !wanted && scanning {
            match central.stop_scan().await {
                Ok(()) => {
                    info!("BLE scan stopped");
                    self.set_scanning(false);
                }
                Err(e) => warn!("BLE scan could not stop: {:?}", e),
            }
        }
    }

    fn set_scanning(&self, scanning: bool) {
        self.registry.lock(|registry| registry.borrow_mut().scanning = scanning);
    }

    /// Service loop: route raw discovery reports and keep the adapter scan
    /// in step with pending requests.
    pub async fn run<C, P>(
        &self,
        central: &C,
        discoveries: DynamicReceiver<'_, DiscoveredDevice<P>>,
    ) -> !
    where
        C: Central,
        E: From<DiscoveredDevice<P>>,
    {
        loop {
            match select(self.wake.wait(), discoveries.receive()).await {
                Either::First(()) => {}
                Either::Second(device) => {
                    self.dispatch(device);
                }
            }
            self.reconcile(central).await;
        }
    }
}

impl<'a, E, const N: usize> ScanTrigger for ScanService<'a, E, N> {
    fn request_scan(&self, address: BleAddress) {
        let known = self.registry.lock(|registry| {
            match registry.borrow_mut().subscriptions.get_mut(&address) {
                Some(subscription) => {
                    subscription.pending = true;
                    true
                }
                None => false,
            }
        });
        if known {
            debug!("scan requested for {}", address);
            self.wake.signal(());
        } else {
            warn!("scan requested for unsubscribed address {}", address);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
