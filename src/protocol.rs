//! MohuanLED command frames.
//!
//! Every frame starts with the `69 96` header followed by a sub-command.
//! There is no checksum and no length field:
//!
//! | command   | bytes                              |
//! |-----------|------------------------------------|
//! | power on  | `69 96 06 01 01 FF 00 00 FF`       |
//! | power off | `69 96 02 01 00`                   |
//! | colour    | `69 96 05 02 RR GG BB LL`          |
//!
//! The power-on frame also forces the strip to plain red, which is why the
//! accessory re-sends its colour after switching on.

use heapless::Vec;

use crate::color::Rgb;

/// Frame header shared by all commands.
pub const HEADER: [u8; 2] = [0x69, 0x96];

/// Sub-command for a colour + brightness write.
pub const COLOR_SUBCOMMAND: [u8; 2] = [0x05, 0x02];

const POWER_ON_BODY: [u8; 7] = [0x06, 0x01, 0x01, 0xFF, 0x00, 0x00, 0xFF];
const POWER_OFF_BODY: [u8; 3] = [0x02, 0x01, 0x00];

/// Longest frame (power on).
pub const MAX_FRAME_LEN: usize = HEADER.len() + POWER_ON_BODY.len();

/// An encoded frame, ready to be written to the command characteristic.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// A command the strip understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Power(bool),
    Color { rgb: Rgb, brightness: u8 },
}

impl Command {
    pub fn encode(&self) -> Frame {
        let mut frame = Frame::new();
        // MAX_FRAME_LEN covers the longest body, pushes cannot fail.
        let _ = frame.extend_from_slice(&HEADER);
        match *self {
            Command::Power(true) => {
                let _ = frame.extend_from_slice(&POWER_ON_BODY);
            }
            Command::Power(false) => {
                let _ = frame.extend_from_slice(&POWER_OFF_BODY);
            }
            Command::Color { rgb, brightness } => {
                let _ = frame.extend_from_slice(&COLOR_SUBCOMMAND);
                let _ = frame.extend_from_slice(&[rgb.r, rgb.g, rgb.b, brightness]);
            }
        }
        frame
    }

    /// Parse a frame produced by [`Command::encode`]. Anything else is `None`.
    pub fn decode(bytes: &[u8]) -> Option<Command> {
        let body = bytes.strip_prefix(HEADER.as_slice())?;
        match body {
            [0x05, 0x02, r, g, b, brightness] => Some(Command::Color {
                rgb: Rgb::new(*r, *g, *b),
                brightness: *brightness,
            }),
            _ if body == POWER_ON_BODY => Some(Command::Power(true)),
            _ if body == POWER_OFF_BODY => Some(Command::Power(false)),
            _ => None,
        }
    }
}

/// Colour frame: header, `05 02`, then R, G, B and the brightness byte.
pub fn build_color_command(rgb: Rgb, brightness: u8) -> Frame {
    Command::Color { rgb, brightness }.encode()
}

/// Power frame for `on`.
pub fn build_power_command(on: bool) -> Frame {
    Command::Power(on).encode()
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
