//! HomeKit lightbulb bridge for MohuanLED BLE RGB strips.
//!
//! The core is `no_std` and transport-agnostic: it encodes HomeKit
//! Hue/Saturation/Brightness/On writes into the strip's vendor frames,
//! manages the BLE link (lazy connect, acknowledged writes, debounced idle
//! disconnect) and shares one scanner between accessories. A BLE stack
//! plugs in through [`ble::Central`] / [`ble::Peripheral`]; the `host`
//! feature provides one on top of btleplug.
//!
//! Host-side tests: `cargo test`. Host bridge: `cargo run --features host`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod accessory;
pub mod ble;
pub mod color;
pub mod config;
pub mod error;
pub mod hap;
pub mod identity;
pub mod light;
pub mod platform;
pub mod protocol;

pub use accessory::LightbulbAccessory;
pub use ble::{BleAddress, DiscoveredDevice};
pub use color::{hsv_to_rgb, ColorValueMode, Rgb};
pub use config::PlatformConfig;
pub use error::{BleError, ConfigError, Error, Result};
pub use identity::DeviceIdentity;
pub use platform::{AccessoryHost, Platform, PlatformEvent};
pub use protocol::{build_color_command, build_power_command, Command};
