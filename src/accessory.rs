//! One HomeKit Lightbulb backed by one strip.
//!
//! Sets go out over the link immediately, one acknowledged write per
//! command. Brightness, hue and saturation reads are answered from the
//! cached state; an `On` read doubles as a reachability probe.

use crate::ble::{DeviceLink, LinkState, Peripheral};
use crate::color::ColorValueMode;
use crate::config::{ACCESSORY_MANUFACTURER, ACCESSORY_MODEL, ACCESSORY_SERIAL_NUMBER};
use crate::error::Error;
use crate::hap::{
    AccessoryInformation, Characteristic, CharacteristicValue, CharacteristicWrite, HapStatus,
    HostReply, HostRequest,
};
use crate::identity::DeviceIdentity;
use crate::light::LightState;
use crate::protocol::build_power_command;

pub struct LightbulbAccessory<'a, P: Peripheral> {
    identity: DeviceIdentity,
    state: LightState,
    link: DeviceLink<'a, P>,
    color_value: ColorValueMode,
}

impl<'a, P: Peripheral> LightbulbAccessory<'a, P> {
    pub fn new(
        identity: DeviceIdentity,
        link: DeviceLink<'a, P>,
        color_value: ColorValueMode,
    ) -> Self {
        Self {
            identity,
            state: LightState::default(),
            link,
            color_value,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn information(&self) -> AccessoryInformation {
        AccessoryInformation {
            name: self.identity.display_name.clone(),
            manufacturer: ACCESSORY_MANUFACTURER,
            model: ACCESSORY_MODEL,
            serial_number: ACCESSORY_SERIAL_NUMBER,
        }
    }

    pub fn state(&self) -> &LightState {
        &self.state
    }

    pub fn link(&self) -> &DeviceLink<'a, P> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut DeviceLink<'a, P> {
        &mut self.link
    }

    /// Switch the strip. A no-op when already in the requested state.
    ///
    /// Switching on also re-sends the colour, since the power-on frame
    /// resets the strip to red.
    pub async fn set_power(&mut self, on: bool) -> Result<(), Error> {
        if self.state.on == on {
            debug!("On already {}, nothing to send", on);
            return Ok(());
        }

        self.link.ensure_connected().await?;
        self.link.send_command(&build_power_command(on)).await?;
        self.state.on = on;
        debug!("Set Characteristic On -> {}", on);

        if on {
            self.send_color().await?;
        }
        Ok(())
    }

    pub async fn set_brightness(&mut self, brightness: u8) -> Result<(), Error> {
        self.state.brightness = brightness.min(100);
        debug!("Set Characteristic Brightness -> {}", self.state.brightness);
        self.send_color().await
    }

    pub async fn set_hue(&mut self, hue: f32) -> Result<(), Error> {
        self.state.hue = hue;
        debug!("Set Characteristic Hue -> {}", hue);
        self.send_color().await
    }

    pub async fn set_saturation(&mut self, saturation: f32) -> Result<(), Error> {
        self.state.saturation = saturation;
        debug!("Set Characteristic Saturation -> {}", saturation);
        self.send_color().await
    }

    /// Cached `On` if connected. Otherwise a reconnect is kicked off and
    /// the read fails so the host retries.
    pub async fn get_power(&mut self) -> Result<bool, Error> {
        if self.link.state() == LinkState::Connected {
            return Ok(self.state.on);
        }
        if let Err(e) = self.link.ensure_connected().await {
            debug!("On read while unreachable: {:?}", e);
        }
        Err(Error::NotConnected)
    }

    async fn send_color(&mut self) -> Result<(), Error> {
        self.link.ensure_connected().await?;
        let command = self.state.color_command(self.color_value);
        trace!("colour {:?}", command);
        self.link.send_command(&command.encode()).await
    }

    /// Serve one host request.
    pub async fn handle(&mut self, request: HostRequest) -> HostReply {
        match request {
            HostRequest::Set(write) => {
                let result = match write {
                    CharacteristicWrite::On(on) => self.set_power(on).await,
                    CharacteristicWrite::Brightness(b) => self.set_brightness(b).await,
                    CharacteristicWrite::Hue(h) => self.set_hue(h).await,
                    CharacteristicWrite::Saturation(s) => self.set_saturation(s).await,
                };
                result.map(|()| None).map_err(HapStatus::from)
            }
            HostRequest::Get(characteristic) => {
                let value = match characteristic {
                    Characteristic::On => CharacteristicValue::Bool(self.get_power().await?),
                    Characteristic::Brightness => CharacteristicValue::Int(self.state.brightness),
                    Characteristic::Hue => CharacteristicValue::Float(self.state.hue),
                    Characteristic::Saturation => CharacteristicValue::Float(self.state.saturation),
                };
                Ok(Some(value))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::fake::{FakeBus, FakePeripheral, Op, RecordingTrigger};
    use crate::ble::BleAddress;
    use crate::color::Rgb;
    use crate::protocol::{build_color_command, Command};
    use embassy_futures::block_on;
    use embassy_time::Duration;

    const ADDR: BleAddress = BleAddress([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    fn accessory<'t>(
        bus: &FakeBus,
        trigger: &'t RecordingTrigger,
    ) -> LightbulbAccessory<'t, FakePeripheral> {
        let mut link = DeviceLink::new(ADDR, trigger, Duration::from_millis(5_000));
        link.attach(bus.peripheral());
        LightbulbAccessory::new(DeviceIdentity::new(ADDR, "Desk"), link, ColorValueMode::Full)
    }

    fn decoded(bus: &FakeBus) -> Vec<Command> {
        bus.writes()
            .iter()
            .map(|w| Command::decode(w).unwrap())
            .collect()
    }

    #[test]
    fn information_service() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let info = accessory(&bus, &trigger).information();
        assert_eq!(info.name.as_str(), "Desk");
        assert_eq!(info.manufacturer, "Welpur, Kimoji LLC.");
        assert_eq!(info.model, "5050RGBLED");
        assert_eq!(info.serial_number, "CNLEDNOSERIALLOL");
    }

    #[test]
    fn power_on_resends_colour() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let mut acc = accessory(&bus, &trigger);

        block_on(acc.set_power(true)).unwrap();
        assert!(acc.state().on);
        assert_eq!(
            decoded(&bus),
            vec![
                Command::Power(true),
                Command::Color { rgb: Rgb::new(255, 255, 255), brightness: 0xFF },
            ]
        );
    }

    #[test]
    fn repeated_power_state_sends_nothing() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let mut acc = accessory(&bus, &trigger);

        // initial state is off
        block_on(acc.set_power(false)).unwrap();
        assert!(bus.ops().is_empty());

        block_on(acc.set_power(true)).unwrap();
        let writes = bus.writes().len();
        block_on(acc.set_power(true)).unwrap();
        assert_eq!(bus.writes().len(), writes);
    }

    #[test]
    fn colour_writes_follow_cached_state() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let mut acc = accessory(&bus, &trigger);

        block_on(acc.set_hue(240.0)).unwrap();
        block_on(acc.set_saturation(100.0)).unwrap();
        block_on(acc.set_brightness(50)).unwrap();

        let writes = bus.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[2], build_color_command(Rgb::new(0, 0, 255), 0x80).to_vec());
    }

    #[test]
    fn failed_power_write_keeps_previous_state() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let mut acc = accessory(&bus, &trigger);
        bus.with(|s| s.failing_writes = 1);

        assert!(block_on(acc.set_power(true)).is_err());
        assert!(!acc.state().on);
        assert_eq!(acc.link().state(), LinkState::Discovered);

        // retry succeeds and sends the full sequence
        block_on(acc.set_power(true)).unwrap();
        assert!(acc.state().on);
        assert_eq!(decoded(&bus).len(), 2);
    }

    #[test]
    fn reads_serve_cached_values() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let mut acc = accessory(&bus, &trigger);
        block_on(acc.set_brightness(42)).unwrap();
        bus.clear();

        assert_eq!(
            block_on(acc.handle(HostRequest::Get(Characteristic::Brightness))),
            Ok(Some(CharacteristicValue::Int(42)))
        );
        assert_eq!(
            block_on(acc.handle(HostRequest::Get(Characteristic::Hue))),
            Ok(Some(CharacteristicValue::Float(0.0)))
        );
        assert_eq!(
            block_on(acc.handle(HostRequest::Get(Characteristic::On))),
            Ok(Some(CharacteristicValue::Bool(false)))
        );
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn power_read_while_disconnected_reconnects_and_fails() {
        let bus = FakeBus::new();
        let trigger = RecordingTrigger::default();
        let mut acc = accessory(&bus, &trigger);

        assert_eq!(
            block_on(acc.handle(HostRequest::Get(Characteristic::On))),
            Err(HapStatus::ServiceCommunicationFailure)
        );
        assert_eq!(bus.ops(), vec![Op::Connect, Op::Discover]);
        assert!(acc.link().idle_deadline().is_some());
        assert_eq!(
            block_on(acc.handle(HostRequest::Get(Characteristic::On))),
            Ok(Some(CharacteristicValue::Bool(false)))
        );
    }

    #[test]
    fn set_without_peripheral_requests_scan() {
        let trigger = RecordingTrigger::default();
        let link = DeviceLink::<FakePeripheral>::new(ADDR, &trigger, Duration::from_millis(5_000));
        let identity = DeviceIdentity::new(ADDR, "");
        let mut acc = LightbulbAccessory::new(identity, link, ColorValueMode::Full);

        assert_eq!(
            block_on(acc.handle(HostRequest::Set(CharacteristicWrite::Hue(10.0)))),
            Err(HapStatus::ServiceCommunicationFailure)
        );
        assert_eq!(*trigger.requests.borrow(), vec![ADDR]);
        // the cached value is still updated for the next successful write
        assert_eq!(acc.state().hue, 10.0);
    }
}
