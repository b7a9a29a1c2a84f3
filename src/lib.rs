//! USB-gadget emulation of an Omron ME56PS2 analog modem, bridging its
//! serial data stream to a TCP peer.
//!
//! The library surface is split along the three cooperating state
//! machines: [`usb`] (enumeration, descriptors, bulk-endpoint framing),
//! [`modem`] (AT-command interpretation and mode transitions), and
//! [`tcp_bridge`] (the TCP listener/dialer and receive activity). They
//! communicate through [`ring_buffer::RingBuffer`] and a shared
//! connection flag rather than through one another directly.

pub mod config;
pub mod error;
pub mod modem;
pub mod ring_buffer;
pub mod tcp_bridge;
pub mod usb;

pub use error::{AppError, Result};
