//! The accessory host boundary.
//!
//! Requests arrive as [`HostRequest`]s with HomeKit-native values; replies
//! carry either the read value or a [`HapStatus`]. Every BLE-level failure
//! is folded into [`HapStatus::ServiceCommunicationFailure`] so the host
//! shows "No Response" and retries on its own schedule.

use core::fmt;

use embassy_sync::channel::{DynamicReceiver, DynamicSender};
use heapless::String;

use crate::config::MAX_NAME_LEN;
use crate::error::Error;

/// HAP status codes surfaced to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HapStatus {
    /// The accessory could not be reached; the host should retry later.
    ServiceCommunicationFailure,
    /// The value is outside the characteristic's declared range.
    InvalidValueInRequest,
}

impl HapStatus {
    pub const fn code(self) -> i32 {
        match self {
            HapStatus::ServiceCommunicationFailure => -70402,
            HapStatus::InvalidValueInRequest => -70410,
        }
    }
}

impl From<Error> for HapStatus {
    fn from(_: Error) -> Self {
        HapStatus::ServiceCommunicationFailure
    }
}

impl fmt::Display for HapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HapStatus::ServiceCommunicationFailure => "SERVICE_COMMUNICATION_FAILURE",
            HapStatus::InvalidValueInRequest => "INVALID_VALUE_IN_REQUEST",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Lightbulb characteristics we implement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    On,
    Brightness,
    Hue,
    Saturation,
}

impl Characteristic {
    pub const fn name(self) -> &'static str {
        match self {
            Characteristic::On => "On",
            Characteristic::Brightness => "Brightness",
            Characteristic::Hue => "Hue",
            Characteristic::Saturation => "Saturation",
        }
    }

    /// Inclusive range the host enforces before a write reaches us.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Characteristic::On => (0.0, 1.0),
            Characteristic::Brightness | Characteristic::Saturation => (0.0, 100.0),
            Characteristic::Hue => (0.0, 360.0),
        }
    }
}

/// A value read back from a characteristic.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharacteristicValue {
    Bool(bool),
    Int(u8),
    Float(f32),
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Bool(v) => write!(f, "{}", v),
            CharacteristicValue::Int(v) => write!(f, "{}", v),
            CharacteristicValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A characteristic write with its HomeKit-native value.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharacteristicWrite {
    On(bool),
    Brightness(u8),
    Hue(f32),
    Saturation(f32),
}

impl CharacteristicWrite {
    /// Build a write from a raw numeric value, enforcing the range the
    /// host framework would. `On` accepts 0 or 1.
    pub fn new(characteristic: Characteristic, value: f32) -> Result<Self, HapStatus> {
        let (min, max) = characteristic.range();
        if !value.is_finite() || value < min || value > max {
            return Err(HapStatus::InvalidValueInRequest);
        }
        Ok(match characteristic {
            Characteristic::On => {
                if value != 0.0 && value != 1.0 {
                    return Err(HapStatus::InvalidValueInRequest);
                }
                CharacteristicWrite::On(value == 1.0)
            }
            // HomeKit brightness is an integer characteristic.
            Characteristic::Brightness => {
                CharacteristicWrite::Brightness(libm::roundf(value) as u8)
            }
            Characteristic::Hue => CharacteristicWrite::Hue(value),
            Characteristic::Saturation => CharacteristicWrite::Saturation(value),
        })
    }

    pub fn characteristic(&self) -> Characteristic {
        match self {
            CharacteristicWrite::On(_) => Characteristic::On,
            CharacteristicWrite::Brightness(_) => Characteristic::Brightness,
            CharacteristicWrite::Hue(_) => Characteristic::Hue,
            CharacteristicWrite::Saturation(_) => Characteristic::Saturation,
        }
    }
}

/// Host → accessory request.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostRequest {
    Set(CharacteristicWrite),
    Get(Characteristic),
}

/// `Ok(None)` acknowledges a set, `Ok(Some(_))` answers a get.
pub type HostReply = Result<Option<CharacteristicValue>, HapStatus>;

/// Static accessory information service contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessoryInformation {
    pub name: String<MAX_NAME_LEN>,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: &'static str,
}

/// Host-side handle that turns request/reply message passing back into
/// plain async calls. One request is in flight at a time.
pub struct AccessoryClient<'a, E> {
    events: DynamicSender<'a, E>,
    replies: DynamicReceiver<'a, HostReply>,
}

impl<'a, E: From<HostRequest>> AccessoryClient<'a, E> {
    pub fn new(events: DynamicSender<'a, E>, replies: DynamicReceiver<'a, HostReply>) -> Self {
        Self { events, replies }
    }

    pub async fn set(&mut self, write: CharacteristicWrite) -> Result<(), HapStatus> {
        self.request(HostRequest::Set(write)).await.map(|_| ())
    }

    pub async fn get(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<CharacteristicValue, HapStatus> {
        self.request(HostRequest::Get(characteristic))
            .await?
            .ok_or(HapStatus::ServiceCommunicationFailure)
    }

    async fn request(&mut self, request: HostRequest) -> HostReply {
        self.events.send(E::from(request)).await;
        self.replies.receive().await
    }
}
