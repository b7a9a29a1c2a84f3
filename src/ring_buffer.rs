//! Bounded single-writer-at-a-time byte queue shared between the TCP
//! receive path, the modem state machine and the bulk-IN pacer.
//!
//! A fixed-capacity circular buffer guarded by a mutex, with a condvar so
//! the pacer can block until data arrives or a deadline passes instead of
//! busy-polling.

use std::sync::{Condvar, Mutex};
use std::time::Instant;

struct RingInner {
    buffer: Vec<u8>,
    write_ptr: usize,
    read_ptr: usize,
}

impl RingInner {
    fn is_empty(&self) -> bool {
        self.write_ptr == self.read_ptr
    }

    fn is_full(&self) -> bool {
        let next_write_ptr = (self.write_ptr + 1) % self.buffer.len();
        next_write_ptr == self.read_ptr
    }

    fn enqueue_single(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buffer[self.write_ptr] = byte;
        self.write_ptr = (self.write_ptr + 1) % self.buffer.len();
        true
    }

    fn dequeue_single(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buffer[self.read_ptr];
        self.read_ptr = (self.read_ptr + 1) % self.buffer.len();
        Some(byte)
    }
}

/// Capacity of the bulk-IN transmit buffer. Effective usable capacity is
/// `RING_BUFFER_CAPACITY - 1`, since the ring distinguishes full from
/// empty by keeping one slot open.
pub const RING_BUFFER_CAPACITY: usize = 524288;

pub struct RingBuffer {
    inner: Mutex<RingInner>,
    cv: Condvar,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            inner: Mutex::new(RingInner {
                buffer: vec![0u8; capacity],
                write_ptr: 0,
                read_ptr: 0,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Enqueues as many bytes from `data` as fit before the buffer fills.
    /// Returns the number actually accepted; the caller is responsible
    /// for surfacing any shortfall (the bulk-IN pacer logs
    /// "Transmit buffer is full!" when this is less than `data.len()`).
    pub fn enqueue(&self, data: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut accepted = 0;
        for &byte in data {
            if !inner.enqueue_single(byte) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Drains up to `out.len()` bytes into `out`, returning how many were
    /// written. Returns 0 if the buffer was empty.
    pub fn dequeue(&self, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0;
        for slot in out.iter_mut() {
            match inner.dequeue_single() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Blocks until the buffer is non-empty or `deadline` passes.
    /// Returns `false` immediately without blocking if data is already
    /// present. Returns whatever "non-empty" was observed at wake time.
    pub fn wait(&self, deadline: Instant) -> bool {
        let inner = self.inner.lock().unwrap();
        if !inner.is_empty() {
            return false;
        }

        let now = Instant::now();
        if deadline <= now {
            return !inner.is_empty();
        }

        let (inner, _timeout_result) = self
            .cv
            .wait_timeout_while(inner, deadline - now, |inner| inner.is_empty())
            .unwrap();
        !inner.is_empty()
    }

    /// Wakes one thread blocked in `wait`. Callers that enqueue data MUST
    /// call this afterwards.
    pub fn notify_one(&self) {
        self.cv.notify_one();
    }
}
