//! HSV → RGB conversion and HomeKit → device brightness scaling.
//!
//! HomeKit hands us hue in degrees and saturation / brightness in percent.
//! The strip wants 8-bit RGB plus an independent 8-bit brightness byte.

use libm::{fabs, floor};

use crate::config::BRIGHTNESS_SCALE_DIVISOR;

/// 8-bit RGB triple as sent to the strip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Where the HSV `value` input comes from when building a colour frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorValueMode {
    /// Always 100 %; brightness travels only in the device brightness byte.
    #[default]
    Full,
    /// `brightness * 100 / divisor` percent. 200 reproduces the legacy dim colours.
    Brightness { divisor: u16 },
}

impl ColorValueMode {
    /// HSV value in percent for the given HomeKit brightness.
    pub fn value_percent(self, brightness: u8) -> f64 {
        match self {
            ColorValueMode::Full => 100.0,
            ColorValueMode::Brightness { divisor } => {
                f64::from(brightness) * 100.0 / f64::from(divisor.max(1))
            }
        }
    }
}

/// Convert HSV (hue in degrees, saturation and value in percent) to RGB.
///
/// Channels are rounded half-up. A hue that lands outside sectors 0..=5
/// (negative input) yields plain red; anything else out of range saturates
/// into `0..=255` instead of failing.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let h = hue / 60.0;
    let s = saturation / 100.0;
    let v = value / 100.0;

    let c = v * s;
    let m = v - c;
    let x = c * (1.0 - fabs(h % 2.0 - 1.0));

    let sector = floor(h) as i64 % 6;
    let (r, g, b) = match sector {
        0 => (c + m, x + m, m),
        1 => (x + m, c + m, m),
        2 => (m, c + m, x + m),
        3 => (m, x + m, c + m),
        4 => (x + m, m, c + m),
        5 => (c + m, m, x + m),
        _ => return Rgb::RED,
    };

    Rgb::new(to_channel(r), to_channel(g), to_channel(b))
}

/// Scale a unit intensity to a byte, rounding half-up.
/// Float → int casts saturate, so NaN and overshoot stay in range.
fn to_channel(unit: f64) -> u8 {
    floor(unit * 255.0 + 0.5) as u8
}

/// Device brightness byte for a HomeKit brightness percentage:
/// `round(brightness / 100 * 255)`.
pub fn brightness_byte(brightness: u8) -> u8 {
    let divisor = u32::from(BRIGHTNESS_SCALE_DIVISOR);
    let pct = u32::from(brightness).min(divisor);
    ((pct * 255 + divisor / 2) / divisor) as u8
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_and_secondary_hues() {
        let expected = [
            (0.0, Rgb::new(255, 0, 0)),
            (60.0, Rgb::new(255, 255, 0)),
            (120.0, Rgb::new(0, 255, 0)),
            (180.0, Rgb::new(0, 255, 255)),
            (240.0, Rgb::new(0, 0, 255)),
            (300.0, Rgb::new(255, 0, 255)),
        ];
        for (hue, rgb) in expected {
            assert_eq!(hsv_to_rgb(hue, 100.0, 100.0), rgb, "hue {}", hue);
        }
    }

    #[test]
    fn zero_saturation_is_grey() {
        for hue in [0.0, 45.0, 200.0, 359.0] {
            assert_eq!(hsv_to_rgb(hue, 0.0, 100.0), Rgb::new(255, 255, 255));
            assert_eq!(hsv_to_rgb(hue, 0.0, 0.0), Rgb::new(0, 0, 0));
            let grey = hsv_to_rgb(hue, 0.0, 50.0);
            assert_eq!(grey, Rgb::new(128, 128, 128)); // 127.5 rounds up
        }
    }

    #[test]
    fn full_circle_wraps_to_red() {
        assert_eq!(hsv_to_rgb(360.0, 100.0, 100.0), Rgb::RED);
    }

    #[test]
    fn negative_hue_falls_back_to_red() {
        assert_eq!(hsv_to_rgb(-30.0, 50.0, 20.0), Rgb::RED);
    }

    #[test]
    fn intermediate_hue_rounds_to_nearest() {
        // h=30: sector 0, x = 0.5 → g = 127.5 → 128
        assert_eq!(hsv_to_rgb(30.0, 100.0, 100.0), Rgb::new(255, 128, 0));
        // h=210, s=50, v=80: c=0.4, m=0.4, x=0.2 → (0.4, 0.6, 0.8)
        assert_eq!(hsv_to_rgb(210.0, 50.0, 80.0), Rgb::new(102, 153, 204));
    }

    #[test]
    fn channels_match_continuous_formula() {
        // Per sector: which channel carries C, which carries X; the third is 0.
        const ROLES: [(usize, usize); 6] = [(0, 1), (1, 0), (1, 2), (2, 1), (2, 0), (0, 2)];
        let byte = |unit: f64| floor(unit * 255.0 + 0.5) as u8;

        let mut hue = 0.0;
        while hue < 360.0 {
            for sat in [0.0, 13.0, 50.0, 87.0, 100.0] {
                for val in [0.0, 25.0, 66.0, 100.0] {
                    let v = val / 100.0;
                    let c = v * (sat / 100.0);
                    let m = v - c;
                    let x = c * (1.0 - fabs((hue / 60.0) % 2.0 - 1.0));
                    let (c_at, x_at) = ROLES[floor(hue / 60.0) as usize];

                    let mut unit = [m; 3];
                    unit[c_at] = c + m;
                    unit[x_at] = x + m;
                    let expected = Rgb::new(byte(unit[0]), byte(unit[1]), byte(unit[2]));

                    assert_eq!(
                        hsv_to_rgb(hue, sat, val),
                        expected,
                        "h={} s={} v={}",
                        hue,
                        sat,
                        val
                    );
                }
            }
            hue += 7.5;
        }
    }

    #[test]
    fn sector_boundaries_are_exact() {
        assert_eq!(hsv_to_rgb(60.0, 100.0, 100.0), Rgb::new(255, 255, 0));
        assert_eq!(hsv_to_rgb(180.0, 100.0, 100.0), Rgb::new(0, 255, 255));
        assert_eq!(hsv_to_rgb(300.0, 100.0, 100.0), Rgb::new(255, 0, 255));
        assert_eq!(hsv_to_rgb(90.0, 100.0, 100.0), Rgb::new(128, 255, 0));
    }

    #[test]
    fn out_of_range_inputs_saturate() {
        assert_eq!(hsv_to_rgb(0.0, 100.0, 250.0), Rgb::new(255, 0, 0));
        assert_eq!(hsv_to_rgb(0.0, 100.0, -10.0), Rgb::new(0, 0, 0));
        let _ = hsv_to_rgb(f64::NAN, f64::NAN, f64::NAN);
    }

    #[test]
    fn brightness_byte_scaling() {
        assert_eq!(brightness_byte(0), 0x00);
        assert_eq!(brightness_byte(50), 0x80);
        assert_eq!(brightness_byte(100), 0xFF);
        assert_eq!(brightness_byte(1), 3); // 2.55 → 3
        assert_eq!(brightness_byte(200), 0xFF);
    }

    #[test]
    fn color_value_modes() {
        assert_eq!(ColorValueMode::Full.value_percent(10), 100.0);
        let legacy = ColorValueMode::Brightness { divisor: 200 };
        assert_eq!(legacy.value_percent(100), 50.0);
        assert_eq!(legacy.value_percent(50), 25.0);
    }
}
