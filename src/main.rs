//! Host bridge: drives one MohuanLED strip from a line-based console.
//!
//! ```text
//! mohuan-ble <config.json> [accessory-cache.json]
//! ```
//!
//! The console stands in for the accessory host: every line becomes one
//! characteristic set or get and prints the result or HAP status.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use embassy_futures::select::{select4, Either4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use tokio::io::{AsyncBufReadExt, BufReader};

use mohuan_ble::ble::btle::{BtleCentral, BtlePeripheral};
use mohuan_ble::ble::ScanService;
use mohuan_ble::config::{
    DISCOVERY_QUEUE_DEPTH, EVENT_QUEUE_DEPTH, MAX_SCAN_SUBSCRIPTIONS, PLUGIN_NAME,
};
use mohuan_ble::hap::{AccessoryClient, Characteristic, CharacteristicWrite, HapStatus, HostReply};
use mohuan_ble::identity::{DeviceIdentity, MAX_CACHE_RECORD_LEN};
use mohuan_ble::{AccessoryHost, DiscoveredDevice, Platform, PlatformConfig, PlatformEvent};

type Event = PlatformEvent<BtlePeripheral>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("{} v{}", PLUGIN_NAME, env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(
        args.next()
            .context("usage: mohuan-ble <config.json> [accessory-cache.json]")?,
    );
    let cache_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| config_path.with_file_name("accessory-cache.json"));

    let raw = std::fs::read(&config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let config = PlatformConfig::from_json(&raw)
        .map_err(mohuan_ble::Error::from)
        .with_context(|| format!("invalid platform config in {}", config_path.display()))?;

    let central = BtleCentral::first_adapter()
        .await
        .context("no usable Bluetooth adapter")?;

    let discoveries: Channel<
        CriticalSectionRawMutex,
        DiscoveredDevice<BtlePeripheral>,
        DISCOVERY_QUEUE_DEPTH,
    > = Channel::new();
    let events: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH> = Channel::new();
    let replies: Channel<CriticalSectionRawMutex, HostReply, 1> = Channel::new();

    let scanner: ScanService<'_, Event, MAX_SCAN_SUBSCRIPTIONS> = ScanService::new();
    scanner.subscribe(config.address, events.dyn_sender())?;

    let cached = FileCache::load(&cache_path);
    let mut platform = Platform::new(config, FileCache { path: cache_path }, &scanner);
    if let Some(identity) = cached {
        platform.configure_accessory(identity);
    }

    let client = AccessoryClient::new(events.dyn_sender(), replies.dyn_receiver());

    match select4(
        scanner.run(&central, discoveries.dyn_receiver()),
        central.pump_discoveries(discoveries.dyn_sender()),
        platform.run(events.dyn_receiver(), replies.dyn_sender()),
        console(client),
    )
    .await
    {
        Either4::First(never) | Either4::Third(never) => match never {},
        Either4::Second(pumped) => {
            pumped?;
            bail!("Bluetooth adapter event stream ended")
        }
        Either4::Fourth(result) => result,
    }
}

/// Single-record accessory cache in a JSON file.
struct FileCache {
    path: PathBuf,
}

impl FileCache {
    fn load(path: &Path) -> Option<DeviceIdentity> {
        let json = match std::fs::read(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("could not read accessory cache {}: {}", path.display(), e);
                return None;
            }
        };
        match DeviceIdentity::from_json(&json) {
            Ok(identity) => Some(identity),
            Err(e) => {
                log::warn!("discarding accessory cache {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl AccessoryHost for FileCache {
    fn register_accessory(&mut self, identity: &DeviceIdentity) -> mohuan_ble::Result<()> {
        let mut buf = [0u8; MAX_CACHE_RECORD_LEN];
        let len = identity.to_json(&mut buf)?;
        std::fs::write(&self.path, &buf[..len]).map_err(|e| {
            log::error!("could not write accessory cache {}: {}", self.path.display(), e);
            mohuan_ble::Error::Cache
        })
    }
}

enum ConsoleCommand {
    Set(CharacteristicWrite),
    Get(Characteristic),
    Help,
    Quit,
}

fn characteristic(name: &str) -> Option<Characteristic> {
    match name {
        "on" | "power" => Some(Characteristic::On),
        "brightness" | "b" => Some(Characteristic::Brightness),
        "hue" | "h" => Some(Characteristic::Hue),
        "saturation" | "sat" | "s" => Some(Characteristic::Saturation),
        _ => None,
    }
}

fn parse_command(line: &str) -> Result<ConsoleCommand, HapStatus> {
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or("").to_ascii_lowercase();
    let arg = words.next();

    match (head.as_str(), arg) {
        ("on", None) => Ok(ConsoleCommand::Set(CharacteristicWrite::On(true))),
        ("off", None) => Ok(ConsoleCommand::Set(CharacteristicWrite::On(false))),
        ("help" | "?", _) => Ok(ConsoleCommand::Help),
        ("quit" | "exit" | "q", _) => Ok(ConsoleCommand::Quit),
        ("get", Some(name)) => characteristic(&name.to_ascii_lowercase())
            .map(ConsoleCommand::Get)
            .ok_or(HapStatus::InvalidValueInRequest),
        (name, Some(value)) => {
            let target = characteristic(name).ok_or(HapStatus::InvalidValueInRequest)?;
            let value: f32 = value.parse().map_err(|_| HapStatus::InvalidValueInRequest)?;
            CharacteristicWrite::new(target, value).map(ConsoleCommand::Set)
        }
        _ => Err(HapStatus::InvalidValueInRequest),
    }
}

fn print_help() {
    println!("commands:");
    println!("  on | off");
    println!("  brightness <0-100>");
    println!("  hue <0-360>");
    println!("  saturation <0-100>");
    println!("  get <on|brightness|hue|saturation>");
    println!("  quit");
}

async fn console(mut client: AccessoryClient<'_, Event>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_help();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Help) => print_help(),
            Ok(ConsoleCommand::Set(write)) => match client.set(write).await {
                Ok(()) => println!("{} ok", write.characteristic().name()),
                Err(status) => println!("{} failed: {}", write.characteristic().name(), status),
            },
            Ok(ConsoleCommand::Get(target)) => match client.get(target).await {
                Ok(value) => println!("{} = {}", target.name(), value),
                Err(status) => println!("{} failed: {}", target.name(), status),
            },
            Err(status) => println!("rejected: {} (try `help`)", status),
        }
    }
    Ok(())
}
