use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use me56ps2_emu::modem::{Dialer, Modem};
use me56ps2_emu::ring_buffer::RingBuffer;

struct FakeDialer {
    connect_result: bool,
    sent: Mutex<Vec<u8>>,
}

impl FakeDialer {
    fn new(connect_result: bool) -> Self {
        FakeDialer {
            connect_result,
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl Dialer for FakeDialer {
    fn connect(&self) -> bool {
        self.connect_result
    }

    fn send(&self, data: &[u8]) {
        self.sent.lock().unwrap().extend_from_slice(data);
    }
}

fn drain_ring(ring: &RingBuffer) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut chunk = [0u8; 64];
        let n = ring.dequeue(&mut chunk);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    out
}

fn new_modem(dialer: Arc<FakeDialer>) -> (Modem, Arc<AtomicBool>, Arc<RingBuffer>) {
    let connected = Arc::new(AtomicBool::new(false));
    let ring = Arc::new(RingBuffer::new(4096));
    let modem = Modem::new(
        Arc::clone(&connected),
        Arc::clone(&ring),
        dialer as Arc<dyn Dialer>,
    );
    (modem, connected, ring)
}

#[test]
fn unknown_command_replies_ok_with_no_echo_by_default() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, _connected, ring) = new_modem(dialer);

    modem.feed(b"ATZ\r");

    assert_eq!(drain_ring(&ring), b"OK\r\n");
}

#[test]
fn at_amp_f_enables_echo_then_echoes_subsequent_lines() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, _connected, ring) = new_modem(dialer);

    modem.feed(b"AT&F\r");
    assert_eq!(drain_ring(&ring), b"OK\r\n");

    modem.feed(b"HELLO\r");
    assert_eq!(drain_ring(&ring), b"HELLO\r\nOK\r\n");
}

#[test]
fn ate0_disables_echo_again() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, _connected, ring) = new_modem(dialer);

    modem.feed(b"AT&F\r");
    drain_ring(&ring);
    modem.feed(b"ATE0\r");
    // Echo was still on when this command line arrived, so it is itself
    // echoed before taking effect.
    assert_eq!(drain_ring(&ring), b"ATE0\r\nOK\r\n");

    modem.feed(b"HELLO\r");
    assert_eq!(drain_ring(&ring), b"OK\r\n");
}

#[test]
fn ata_answers_and_marks_connected() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, connected, ring) = new_modem(dialer);

    modem.feed(b"ATA\r");

    assert_eq!(drain_ring(&ring), b"CONNECT 57600 V42\r\n");
    assert!(connected.load(Ordering::SeqCst));
}

#[test]
fn atd_dials_and_connects_on_success() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, connected, ring) = new_modem(dialer);

    modem.feed(b"ATDT5551234\r");

    assert_eq!(drain_ring(&ring), b"CONNECT 57600 V42\r\n");
    assert!(connected.load(Ordering::SeqCst));
}

#[test]
fn atd_replies_busy_and_stays_offline_on_dial_failure() {
    let dialer = Arc::new(FakeDialer::new(false));
    let (mut modem, connected, ring) = new_modem(dialer);

    modem.feed(b"ATDT5551234\r");

    assert_eq!(drain_ring(&ring), b"BUSY\r\n");
    assert!(!connected.load(Ordering::SeqCst));
}

#[test]
fn once_connected_bytes_are_forwarded_to_tcp_not_interpreted() {
    let dialer = Arc::new(FakeDialer::new(true));
    let sent_check = Arc::clone(&dialer);
    let (mut modem, _connected, ring) = new_modem(Arc::clone(&dialer));

    modem.feed(b"ATA\r");
    drain_ring(&ring);

    modem.feed(b"hello world");

    assert_eq!(*sent_check.sent.lock().unwrap(), b"hello world");
    assert!(drain_ring(&ring).is_empty());
}

#[test]
fn empty_line_halts_command_loop_without_reply() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, _connected, ring) = new_modem(dialer);

    modem.feed(b"\r");

    assert!(drain_ring(&ring).is_empty());
}

#[test]
fn reset_accumulator_drops_partial_command_text() {
    let dialer = Arc::new(FakeDialer::new(true));
    let (mut modem, _connected, ring) = new_modem(dialer);

    modem.feed(b"AT&F\r");
    drain_ring(&ring);
    modem.feed(b"partial-no-cr-yet");
    modem.reset_accumulator();
    modem.feed(b"\r");

    assert!(drain_ring(&ring).is_empty());
}
