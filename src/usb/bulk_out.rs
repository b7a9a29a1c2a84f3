//! The bulk-OUT reader activity: pulls framed packets off the bulk-OUT
//! endpoint and drives the modem state machine with their payloads.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::warn;

use crate::modem::Modem;
use crate::usb::transport::EndpointHandle;
use crate::usb::{UsbTransport, MAX_PACKET_SIZE_BULK};

/// Splits one bulk-OUT transfer into its declared and effective payload
/// length: byte 0's top six bits are the declared length; if it
/// disagrees with what actually arrived, the smaller of the two wins.
fn effective_payload_len(packet: &[u8]) -> Option<usize> {
    let &header = packet.first()?;
    let declared = (header >> 2) as usize;
    let actual = packet.len().saturating_sub(1);
    if declared != actual {
        warn!(
            target: "modem",
            "bulk-OUT payload length mismatch: declared {declared}, actual {actual}"
        );
    }
    Some(declared.min(actual))
}

/// Spawns the reader activity, which shares the transport with the other
/// endpoint activities and feeds the shared `Modem` until the process exits.
pub fn spawn<T>(transport: Arc<T>, ep: EndpointHandle, modem: Arc<Mutex<Modem>>) -> JoinHandle<()>
where
    T: UsbTransport + Send + Sync + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; MAX_PACKET_SIZE_BULK];
        loop {
            let n = match transport.ep_read(ep, &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    warn!(target: "ep2", "bulk-OUT read failed: {e}");
                    continue;
                }
            };

            if n == 0 {
                continue;
            }

            let packet = &buf[..n];
            let Some(effective_len) = effective_payload_len(packet) else {
                continue;
            };
            let payload = &packet[1..1 + effective_len.min(packet.len() - 1)];

            modem.lock().unwrap().feed(payload);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_len_matches_when_declared_agrees() {
        let packet = [(3u8) << 2, b'h', b'i', b'!'];
        assert_eq!(effective_payload_len(&packet), Some(3));
    }

    #[test]
    fn effective_len_clamps_to_smaller_of_declared_and_actual() {
        let over_declared = [(10u8) << 2, b'h', b'i'];
        assert_eq!(effective_payload_len(&over_declared), Some(2));

        let under_declared = [(1u8) << 2, b'h', b'i', b'!'];
        assert_eq!(effective_payload_len(&under_declared), Some(1));
    }

    #[test]
    fn effective_len_empty_packet_is_none() {
        let packet: [u8; 0] = [];
        assert_eq!(effective_payload_len(&packet), None);
    }
}
