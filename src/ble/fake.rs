//! In-memory transport for unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use uuid::Uuid;

use crate::ble::transport::{Central, Peripheral};
use crate::ble::{BleAddress, DiscoveredDevice};
use crate::config::truncated;
use crate::error::BleError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    StartScan,
    StopScan,
    Connect,
    Discover,
    Write(Vec<u8>),
    Disconnect,
}

#[derive(Default)]
pub(crate) struct BusState {
    pub ops: Vec<Op>,
    pub fail_scan: bool,
    pub fail_connect: bool,
    pub fail_discover: bool,
    /// The next this-many writes fail.
    pub failing_writes: u32,
}

/// Shared log of everything the fakes were asked to do.
#[derive(Clone, Default)]
pub(crate) struct FakeBus(Rc<RefCell<BusState>>);

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().ops.clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0
            .borrow()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, op: &Op) -> usize {
        self.0.borrow().ops.iter().filter(|o| *o == op).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().ops.clear();
    }

    pub fn central(&self) -> FakeCentral {
        FakeCentral(self.clone())
    }

    pub fn peripheral(&self) -> FakePeripheral {
        FakePeripheral(self.clone())
    }

    pub fn device(&self, address: BleAddress, name: &str) -> DiscoveredDevice<FakePeripheral> {
        DiscoveredDevice {
            address,
            name: truncated(name),
            peripheral: self.peripheral(),
        }
    }

    fn record(&self, op: Op) {
        self.0.borrow_mut().ops.push(op);
    }
}

pub(crate) struct FakeCentral(FakeBus);

impl Central for FakeCentral {
    async fn start_scan(&self, _service_filter: &[Uuid]) -> Result<(), BleError> {
        if self.0.with(|s| s.fail_scan) {
            return Err(BleError::ScanFailed);
        }
        self.0.record(Op::StartScan);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.0.record(Op::StopScan);
        Ok(())
    }
}

pub(crate) struct FakePeripheral(FakeBus);

impl Peripheral for FakePeripheral {
    type Characteristic = Uuid;

    async fn connect(&mut self) -> Result<(), BleError> {
        if self.0.with(|s| s.fail_connect) {
            return Err(BleError::ConnectFailed);
        }
        self.0.record(Op::Connect);
        Ok(())
    }

    async fn discover_characteristic(
        &mut self,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<Uuid, BleError> {
        if self.0.with(|s| s.fail_discover) {
            return Err(BleError::CharacteristicNotFound);
        }
        self.0.record(Op::Discover);
        Ok(characteristic)
    }

    async fn write(
        &mut self,
        _characteristic: &Uuid,
        data: &[u8],
        _with_ack: bool,
    ) -> Result<(), BleError> {
        let fail = self.0.with(|s| {
            if s.failing_writes > 0 {
                s.failing_writes -= 1;
                true
            } else {
                false
            }
        });
        if fail {
            return Err(BleError::WriteFailed);
        }
        self.0.record(Op::Write(data.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BleError> {
        self.0.record(Op::Disconnect);
        Ok(())
    }
}

/// Scan trigger that only counts requests.
#[derive(Default)]
pub(crate) struct RecordingTrigger {
    pub requests: RefCell<Vec<BleAddress>>,
}

impl crate::ble::ScanTrigger for RecordingTrigger {
    fn request_scan(&self, address: BleAddress) {
        self.requests.borrow_mut().push(address);
    }
}

/// Give every other future in a `select` a few polls.
pub(crate) async fn settle() {
    for _ in 0..16 {
        embassy_futures::yield_now().await;
    }
}
