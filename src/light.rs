//! Per-accessory light state as HomeKit sees it.

use crate::color::{brightness_byte, hsv_to_rgb, ColorValueMode, Rgb};
use crate::protocol::Command;

/// Last values written by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightState {
    pub on: bool,
    /// Percent, 0..=100.
    pub brightness: u8,
    /// Degrees, 0..=360.
    pub hue: f32,
    /// Percent, 0..=100.
    pub saturation: f32,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            on: false,
            brightness: 100,
            hue: 0.0,
            saturation: 0.0,
        }
    }
}

impl LightState {
    pub fn rgb(&self, mode: ColorValueMode) -> Rgb {
        hsv_to_rgb(
            f64::from(self.hue),
            f64::from(self.saturation),
            mode.value_percent(self.brightness),
        )
    }

    /// Colour frame for the current state.
    pub fn color_command(&self, mode: ColorValueMode) -> Command {
        Command::Color {
            rgb: self.rgb(mode),
            brightness: brightness_byte(self.brightness),
        }
    }
}
