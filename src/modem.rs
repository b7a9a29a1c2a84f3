//! Hayes-style AT-command interpreter: command-mode line parsing, echo,
//! and the data-mode passthrough to the TCP bridge.
//!
//! Consumes whatever the bulk-OUT reader hands it and produces bytes for
//! the bulk-IN ring buffer. Knows nothing about USB framing or raw-gadget
//! at all — that's the caller's job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

use crate::ring_buffer::RingBuffer;

const CONNECT_BANNER: &[u8] = b"CONNECT 57600 V42\r\n";
const BUSY_BANNER: &[u8] = b"BUSY\r\n";
const OK_BANNER: &[u8] = b"OK\r\n";

/// What the modem state machine needs from the TCP side: dial out on
/// `ATD`/`ATA`, and hand off bytes once on-line. Lets the state machine
/// itself be exercised without a real socket.
pub trait Dialer: Send + Sync {
    fn connect(&self) -> bool;
    fn send(&self, data: &[u8]);
}

pub struct Modem {
    accumulator: Vec<u8>,
    echo: bool,
    connected: Arc<AtomicBool>,
    ring: Arc<RingBuffer>,
    bridge: Arc<dyn Dialer>,
}

impl Modem {
    pub fn new(connected: Arc<AtomicBool>, ring: Arc<RingBuffer>, bridge: Arc<dyn Dialer>) -> Self {
        Modem {
            accumulator: Vec::new(),
            echo: false,
            connected,
            ring,
            bridge,
        }
    }

    /// Feeds one bulk-OUT payload through the state machine: appends it
    /// to the accumulator, then runs the command-mode loop (if off-line)
    /// or forwards straight to TCP (if on-line).
    pub fn feed(&mut self, payload: &[u8]) {
        self.accumulator.extend_from_slice(payload);

        if self.connected.load(Ordering::SeqCst) {
            self.run_data_mode();
        } else {
            self.run_command_mode();
        }
    }

    fn run_command_mode(&mut self) {
        loop {
            let Some(cr_pos) = self.accumulator.iter().position(|&b| b == b'\r') else {
                return;
            };

            let line: Vec<u8> = self.accumulator.drain(..=cr_pos).collect();
            let line = &line[..line.len() - 1]; // drop the trailing \r

            if line.is_empty() {
                return;
            }

            let command = String::from_utf8_lossy(line).to_string();
            info!(target: "modem", "command: {command}");

            if self.echo {
                self.reply_raw(line);
                self.reply_raw(b"\r\n");
            }

            let reply = self.interpret(&command);
            self.reply_raw(reply);

            if self.connected.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn run_data_mode(&mut self) {
        if self.accumulator.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.accumulator);
        self.bridge.send(&data);
    }

    fn interpret(&mut self, command: &str) -> &'static [u8] {
        let upper = command.to_ascii_uppercase();
        match upper.as_str() {
            "AT&F" => {
                self.echo = true;
                OK_BANNER
            }
            "ATE0" => {
                self.echo = false;
                OK_BANNER
            }
            "ATA" => {
                self.connected.store(true, Ordering::SeqCst);
                CONNECT_BANNER
            }
            other if other.starts_with("ATD") => {
                if self.bridge.connect() {
                    self.connected.store(true, Ordering::SeqCst);
                    CONNECT_BANNER
                } else {
                    BUSY_BANNER
                }
            }
            _ => OK_BANNER,
        }
    }

    fn reply_raw(&self, bytes: &[u8]) {
        self.ring.enqueue(bytes);
        self.ring.notify_one();
    }

    /// Called through the TCP bridge's hangup hook when the enhanced
    /// hangup policy observes a peer EOF: clears the accumulator so stray
    /// partial command text left over from on-line mode doesn't leak into
    /// the next command-mode session.
    pub fn reset_accumulator(&mut self) {
        self.accumulator.clear();
    }
}
