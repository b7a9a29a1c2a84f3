//! The bulk-IN pacer: a fixed 40 ms cadence activity that drains the ring
//! buffer into framed packets regardless of whether there's anything to
//! send, since the status byte doubles as the modem's keepalive/DCD
//! signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;

use crate::ring_buffer::RingBuffer;
use crate::usb::transport::EndpointHandle;
use crate::usb::{UsbTransport, MAX_PACKET_SIZE_BULK};

const PACER_PERIOD: Duration = Duration::from_millis(40);
const STATUS_BASE: u8 = 0x31;
const STATUS_CONNECTED_BIT: u8 = 0x80;
const HEADER_BYTE_1: u8 = 0x60;
const PAYLOAD_MAX: usize = MAX_PACKET_SIZE_BULK - 2;

/// Spawns the pacer activity. Shares the transport with the other
/// endpoint activities (each ioctl only touches its own endpoint number
/// on the fd) and runs until the process exits.
pub fn spawn<T>(
    transport: Arc<T>,
    ep: EndpointHandle,
    ring: Arc<RingBuffer>,
    connected: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    T: UsbTransport + Send + Sync + 'static,
{
    thread::spawn(move || {
        let mut deadline = Instant::now() + PACER_PERIOD;
        loop {
            ring.wait(deadline);

            let now = Instant::now();
            while deadline <= now {
                deadline += PACER_PERIOD;
            }

            let mut packet = [0u8; MAX_PACKET_SIZE_BULK];
            let payload_len = ring.dequeue(&mut packet[2..2 + PAYLOAD_MAX]);

            let status = if connected.load(Ordering::SeqCst) {
                STATUS_BASE | STATUS_CONNECTED_BIT
            } else {
                STATUS_BASE
            };
            packet[0] = status;
            packet[1] = HEADER_BYTE_1;

            if let Err(e) = transport.ep_write(ep, &packet[..2 + payload_len]) {
                warn!(target: "ep1", "bulk-IN write failed: {e}");
            }
        }
    })
}
