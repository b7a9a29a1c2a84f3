//! The TCP side of the bridge: a listener (server role) or on-demand
//! dialer (client role), a single attached-peer slot, and the background
//! activity that drains it into the ring buffer.
//!
//! Unlike a bare-socket-plus-callback design, this bridge owns explicit
//! `Arc` handles to the ring buffer and the connection flag, captured at
//! construction time, so the receive activity can push bytes and flip
//! state without reaching through any global.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::Result;
use crate::modem::Dialer;
use crate::ring_buffer::RingBuffer;

const RECV_CHUNK: usize = 64;
const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// What a freshly attached peer means to the rest of the system:
/// server role rings the host, client role just carries data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

struct Comm {
    stream: TcpStream,
    receiver: Option<JoinHandle<()>>,
}

type HangupHook = Box<dyn Fn() + Send + Sync>;

pub struct TcpBridge {
    role: Role,
    bind_addr: SocketAddrV4,
    ring: Arc<RingBuffer>,
    connected: Arc<AtomicBool>,
    hangup_on_peer_eof: bool,
    comm: Arc<Mutex<Option<Comm>>>,
    listener_thread: Mutex<Option<JoinHandle<()>>>,
    on_hangup: Arc<Mutex<Option<HangupHook>>>,
}

impl TcpBridge {
    pub fn new(
        role: Role,
        ip_addr: Ipv4Addr,
        port: u16,
        ring: Arc<RingBuffer>,
        connected: Arc<AtomicBool>,
        hangup_on_peer_eof: bool,
    ) -> Self {
        TcpBridge {
            role,
            bind_addr: SocketAddrV4::new(ip_addr, port),
            ring,
            connected,
            hangup_on_peer_eof,
            comm: Arc::new(Mutex::new(None)),
            listener_thread: Mutex::new(None),
            on_hangup: Arc::new(Mutex::new(None)),
        }
    }

    /// Registers a callback fired when the enhanced hangup policy
    /// (`hangup_on_peer_eof`) observes a peer EOF while connected. The
    /// modem state machine uses this to clear its command accumulator.
    pub fn set_on_hangup(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_hangup.lock().unwrap() = Some(Box::new(hook));
    }

    /// Server role only: binds, listens, and spawns the accept activity.
    /// `on_attach` fires once per attached peer (the modem SM uses it to
    /// enqueue `RING\r\n`).
    pub fn start_listening(&self, on_attach: impl Fn() + Send + 'static) -> Result<()> {
        debug_assert_eq!(self.role, Role::Server);
        let listener = TcpListener::bind(self.bind_addr)?;
        info!(target: "tcp_sock", "listening on {}", self.bind_addr);

        let comm = Arc::clone(&self.comm);
        let ring = Arc::clone(&self.ring);
        let connected = Arc::clone(&self.connected);
        let hangup_on_peer_eof = self.hangup_on_peer_eof;
        let on_hangup = Arc::clone(&self.on_hangup);

        let handle = thread::spawn(move || loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let mut slot = comm.lock().unwrap();
                    if slot.is_some() {
                        info!(target: "tcp_sock", "rejecting second peer {peer}, already attached");
                        drop(stream);
                        continue;
                    }
                    info!(target: "tcp_sock", "accepted peer {peer}");
                    let receiver = spawn_receiver(
                        stream.try_clone().expect("try_clone on accepted stream"),
                        Arc::clone(&comm),
                        Arc::clone(&ring),
                        Arc::clone(&connected),
                        hangup_on_peer_eof,
                        Arc::clone(&on_hangup),
                    );
                    *slot = Some(Comm {
                        stream,
                        receiver: Some(receiver),
                    });
                    drop(slot);
                    on_attach();
                }
                Err(e) => {
                    warn!(target: "tcp_sock", "accept failed: {e}");
                }
            }
        });

        *self.listener_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Client role only: dials out. Returns `true` and attaches the comm
    /// slot on success; `false` on refusal (the modem replies `BUSY`).
    pub fn connect(&self) -> bool {
        debug_assert_eq!(self.role, Role::Client);

        let mut slot = self.comm.lock().unwrap();
        if slot.is_some() {
            return true;
        }

        match TcpStream::connect(self.bind_addr) {
            Ok(stream) => {
                info!(target: "tcp_sock", "connected to {}", self.bind_addr);
                let receiver = spawn_receiver(
                    stream.try_clone().expect("try_clone on connected stream"),
                    Arc::clone(&self.comm),
                    Arc::clone(&self.ring),
                    Arc::clone(&self.connected),
                    self.hangup_on_peer_eof,
                    Arc::clone(&self.on_hangup),
                );
                *slot = Some(Comm {
                    stream,
                    receiver: Some(receiver),
                });
                true
            }
            Err(e) => {
                debug!(target: "tcp_sock", "connect to {} failed: {e}", self.bind_addr);
                false
            }
        }
    }

    /// Best-effort send of the whole buffer, looping over partial writes.
    /// A no-op (with a log line) if no peer is attached.
    pub fn send(&self, data: &[u8]) {
        let mut slot = self.comm.lock().unwrap();
        let Some(comm) = slot.as_mut() else {
            debug!(target: "tcp_sock", "send of {} bytes dropped, no peer attached", data.len());
            return;
        };

        let mut sent = 0;
        while sent < data.len() {
            match comm.stream.write(&data[sent..]) {
                Ok(0) => break,
                Ok(n) => sent += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(target: "tcp_sock", "send failed: {e}");
                    break;
                }
            }
        }
    }

    /// Idempotent: closes the comm socket, joins the receive activity,
    /// clears the slot.
    pub fn disconnect(&self) {
        let comm = { self.comm.lock().unwrap().take() };
        if let Some(mut comm) = comm {
            let _ = comm.stream.shutdown(std::net::Shutdown::Both);
            if let Some(handle) = comm.receiver.take() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.comm.lock().unwrap().is_some()
    }
}

impl Dialer for TcpBridge {
    fn connect(&self) -> bool {
        TcpBridge::connect(self)
    }

    fn send(&self, data: &[u8]) {
        TcpBridge::send(self, data)
    }
}

fn spawn_receiver(
    stream: TcpStream,
    comm: Arc<Mutex<Option<Comm>>>,
    ring: Arc<RingBuffer>,
    connected: Arc<AtomicBool>,
    hangup_on_peer_eof: bool,
    on_hangup: Arc<Mutex<Option<HangupHook>>>,
) -> JoinHandle<()> {
    stream
        .set_read_timeout(Some(RECV_POLL_TIMEOUT))
        .expect("set_read_timeout");

    thread::spawn(move || {
        let mut stream = stream;
        let mut buf = [0u8; RECV_CHUNK];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    info!(target: "tcp_sock", "peer closed connection");
                    break;
                }
                Ok(n) => {
                    if ring.enqueue(&buf[..n]) < n {
                        warn!(target: "tcp_sock", "Transmit buffer is full!");
                    }
                    ring.notify_one();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    warn!(target: "tcp_sock", "recv failed: {e}");
                    break;
                }
            }
        }

        if hangup_on_peer_eof && connected.swap(false, Ordering::SeqCst) {
            if let Some(hook) = on_hangup.lock().unwrap().as_ref() {
                hook();
            }
            ring.enqueue(b"NO CARRIER\r\n");
            ring.notify_one();
        }

        *comm.lock().unwrap() = None;
    })
}
