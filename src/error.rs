//! Unified error type for mohuan-ble.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for on-target
//! logging, and `core::error::Error` so host code can box it.

use core::fmt;

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The BLE stack reported a failure.
    Ble(BleError),

    /// No BLE adapter could be found or initialised.
    BleNotAvailable,

    /// The peripheral has not been discovered yet; a scan was requested.
    PeripheralNotFound,

    /// A write was attempted without a live connection.
    NotConnected,

    /// The scan registry has no room for another subscription.
    RegistryFull,

    // Configuration / cache
    /// Platform configuration is unusable.
    Config(ConfigError),

    /// Cached accessory record could not be parsed or written.
    Cache,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// Scan could not be started or stopped.
    ScanFailed,
    /// Connection attempt failed.
    ConnectFailed,
    /// GATT service/characteristic discovery failed.
    DiscoveryFailed,
    /// The vendor write characteristic was not found.
    CharacteristicNotFound,
    /// Write was rejected or not acknowledged.
    WriteFailed,
    /// The link dropped while an operation was pending.
    Disconnected,
}

/// Reasons a platform configuration is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The document is not valid JSON or has the wrong shape.
    Malformed,
    /// `bluetoothuuid` is absent.
    MissingAddress,
    /// `bluetoothuuid` is not a 6-byte BLE address.
    InvalidAddress,
    /// `idleTimeoutMs` is zero.
    InvalidIdleTimeout,
    /// `colorValueDivisor` is zero.
    InvalidColorDivisor,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BleError::ScanFailed => "scan failed",
            BleError::ConnectFailed => "connect failed",
            BleError::DiscoveryFailed => "GATT discovery failed",
            BleError::CharacteristicNotFound => "write characteristic not found",
            BleError::WriteFailed => "write not acknowledged",
            BleError::Disconnected => "link dropped",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigError::Malformed => "malformed platform config",
            ConfigError::MissingAddress => "missing `bluetoothuuid`",
            ConfigError::InvalidAddress => "`bluetoothuuid` is not a BLE address",
            ConfigError::InvalidIdleTimeout => "`idleTimeoutMs` must be greater than zero",
            ConfigError::InvalidColorDivisor => "`colorValueDivisor` must be greater than zero",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Ble(e) => write!(f, "BLE: {}", e),
            Error::BleNotAvailable => f.write_str("no BLE adapter available"),
            Error::PeripheralNotFound => f.write_str("peripheral not discovered yet"),
            Error::NotConnected => f.write_str("not connected"),
            Error::RegistryFull => f.write_str("scan registry full"),
            Error::Config(e) => write!(f, "config: {}", e),
            Error::Cache => f.write_str("accessory cache record unusable"),
            Error::BufferOverflow => f.write_str("buffer too small"),
        }
    }
}

impl core::error::Error for BleError {}
impl core::error::Error for ConfigError {}
impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;

    fn load(json: &[u8]) -> Result<PlatformConfig> {
        Ok(PlatformConfig::from_json(json)?)
    }

    #[test]
    fn config_rejection_converts_into_crate_error() {
        let err = load(br#"{"platform":"MohuanLED"}"#).unwrap_err();
        assert_eq!(err, Error::Config(ConfigError::MissingAddress));
        assert_eq!(err.to_string(), "config: missing `bluetoothuuid`");
    }

    #[test]
    fn ble_errors_display_nested() {
        assert_eq!(Error::from(BleError::WriteFailed).to_string(), "BLE: write not acknowledged");
    }
}
