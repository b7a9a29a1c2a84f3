//! Command-line parsing and the resulting immutable run configuration.
//!
//! Built once from `argv` before any resource (ring buffer, transport,
//! socket) exists; a parse failure is a usage error and the process exits
//! before anything else runs (clap handles this for us).

use std::net::Ipv4Addr;
use std::process;

use clap::{error::ErrorKind, Parser};

#[cfg(feature = "hw-nanopi-neo2")]
pub const USB_RAW_GADGET_DRIVER_DEFAULT: &str = "musb-hdrc";
#[cfg(feature = "hw-nanopi-neo2")]
pub const USB_RAW_GADGET_DEVICE_DEFAULT: &str = "musb-hdrc.2.auto";

#[cfg(feature = "hw-rpi-zero")]
pub const USB_RAW_GADGET_DRIVER_DEFAULT: &str = "20980000.usb";
#[cfg(feature = "hw-rpi-zero")]
pub const USB_RAW_GADGET_DEVICE_DEFAULT: &str = "20980000.usb";

#[cfg(feature = "hw-rpi-zero2")]
pub const USB_RAW_GADGET_DRIVER_DEFAULT: &str = "3f980000.usb";
#[cfg(feature = "hw-rpi-zero2")]
pub const USB_RAW_GADGET_DEVICE_DEFAULT: &str = "3f980000.usb";

#[cfg(not(any(
    feature = "hw-nanopi-neo2",
    feature = "hw-rpi-zero",
    feature = "hw-rpi-zero2"
)))]
pub const USB_RAW_GADGET_DRIVER_DEFAULT: &str = "fe980000.usb";
#[cfg(not(any(
    feature = "hw-nanopi-neo2",
    feature = "hw-rpi-zero",
    feature = "hw-rpi-zero2"
)))]
pub const USB_RAW_GADGET_DEVICE_DEFAULT: &str = "fe980000.usb";

/// USB gadget emulation of an Omron ME56PS2 modem, bridged to a TCP peer.
#[derive(Parser, Debug)]
#[command(name = "me56ps2-emu", version, about)]
struct Cli {
    /// Run as server (listen on ip_addr:port instead of dialling it)
    #[arg(short = 's', long = "server")]
    server: bool,

    /// Increase debug verbosity (repeatable: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// On TCP peer disconnect while on-line, clear the connection flag and
    /// emit NO CARRIER instead of leaving the modem permanently on-line
    #[arg(long = "hangup-on-disconnect")]
    hangup_on_disconnect: bool,

    /// Peer/bind IPv4 address
    ip_addr: Ipv4Addr,

    /// TCP port
    port: u16,

    /// raw-gadget driver name (defaults to a platform-specific constant)
    usb_driver: Option<String>,

    /// raw-gadget device name (defaults to a platform-specific constant)
    usb_device: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Immutable snapshot of the run configuration, built once from `argv`.
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub ip_addr: Ipv4Addr,
    pub port: u16,
    pub usb_driver: String,
    pub usb_device: String,
    pub verbosity: u8,
    pub allow_hangup_on_peer_eof: bool,
}

impl Config {
    /// Parses `argv`. `--help`/`--version` print and exit 0, same as
    /// clap's default. A usage error prints clap's message but exits 1,
    /// not clap's default of 2.
    pub fn from_args() -> Config {
        let cli = Cli::try_parse().unwrap_or_else(|e| {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            e.print().ok();
            process::exit(code);
        });

        Config {
            role: if cli.server { Role::Server } else { Role::Client },
            ip_addr: cli.ip_addr,
            port: cli.port,
            usb_driver: cli
                .usb_driver
                .unwrap_or_else(|| USB_RAW_GADGET_DRIVER_DEFAULT.to_string()),
            usb_device: cli
                .usb_device
                .unwrap_or_else(|| USB_RAW_GADGET_DEVICE_DEFAULT.to_string()),
            verbosity: cli.verbose,
            allow_hangup_on_peer_eof: cli.hangup_on_disconnect,
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
