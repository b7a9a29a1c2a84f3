use std::time::{Duration, Instant};

use me56ps2_emu::ring_buffer::RingBuffer;

#[test]
fn enqueue_dequeue_round_trips_in_order() {
    let ring = RingBuffer::new(8);
    assert_eq!(ring.enqueue(b"abcd"), 4);

    let mut out = [0u8; 8];
    assert_eq!(ring.dequeue(&mut out), 4);
    assert_eq!(&out[..4], b"abcd");
}

#[test]
fn dequeue_on_empty_buffer_returns_zero() {
    let ring = RingBuffer::new(8);
    let mut out = [0u8; 8];
    assert_eq!(ring.dequeue(&mut out), 0);
    assert!(ring.is_empty());
}

#[test]
fn enqueue_stops_accepting_once_full_capacity_minus_one_is_reached() {
    // Usable capacity is N - 1; the ring keeps one slot open to
    // distinguish full from empty.
    let ring = RingBuffer::new(4);
    let accepted = ring.enqueue(&[1, 2, 3, 4, 5]);
    assert_eq!(accepted, 3);

    let mut out = [0u8; 8];
    assert_eq!(ring.dequeue(&mut out), 3);
    assert_eq!(&out[..3], &[1, 2, 3]);
}

#[test]
fn wraparound_preserves_fifo_order_across_many_cycles() {
    let ring = RingBuffer::new(4);
    for round in 0..10u8 {
        assert_eq!(ring.enqueue(&[round, round.wrapping_add(1), round.wrapping_add(2)]), 3);
        let mut out = [0u8; 3];
        assert_eq!(ring.dequeue(&mut out), 3);
        assert_eq!(out, [round, round.wrapping_add(1), round.wrapping_add(2)]);
    }
}

#[test]
fn wait_returns_immediately_when_data_already_present() {
    let ring = RingBuffer::new(8);
    ring.enqueue(b"x");

    let start = Instant::now();
    let had_data = ring.wait(start + Duration::from_secs(5));
    assert!(!had_data, "wait reports false for the immediate non-blocking path");
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn wait_times_out_and_reports_empty_when_nothing_arrives() {
    let ring = RingBuffer::new(8);
    let deadline = Instant::now() + Duration::from_millis(20);
    let had_data = ring.wait(deadline);
    assert!(!had_data);
}

#[test]
fn wait_wakes_on_notify_after_another_thread_enqueues() {
    use std::sync::Arc;
    use std::thread;

    let ring = Arc::new(RingBuffer::new(8));
    let writer = Arc::clone(&ring);

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        writer.enqueue(b"y");
        writer.notify_one();
    });

    let had_data = ring.wait(Instant::now() + Duration::from_secs(5));
    assert!(had_data);
    handle.join().unwrap();
}

#[test]
fn occupancy_invariant_holds_across_mixed_operations() {
    let ring = RingBuffer::new(16);
    let mut total_enqueued = 0usize;
    let mut total_dequeued = 0usize;

    for i in 0..50u8 {
        let chunk = [i];
        total_enqueued += ring.enqueue(&chunk);
        if i % 3 == 0 {
            let mut out = [0u8; 2];
            total_dequeued += ring.dequeue(&mut out);
        }
    }

    let mut out = [0u8; 64];
    total_dequeued += ring.dequeue(&mut out);

    assert_eq!(total_enqueued, total_dequeued);
}
