//! Binary entry point: parses the CLI, opens the raw-gadget device, and
//! drives the control-event loop. The pacer, reader, listener and
//! receive activities are spawned by the control loop itself once the
//! host selects a configuration.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use log::{info, warn};

use me56ps2_emu::config::{Config, Role};
use me56ps2_emu::modem::{Dialer, Modem};
use me56ps2_emu::ring_buffer::{RingBuffer, RING_BUFFER_CAPACITY};
use me56ps2_emu::tcp_bridge::TcpBridge;
use me56ps2_emu::usb::enumeration::{clamp_to_w_length, EnumerationOutcome, EnumerationResponder};
use me56ps2_emu::usb::transport::{RawEvent, RawGadgetDevice, Speed};
use me56ps2_emu::usb::{bulk_in, bulk_out, descriptors, ControlEvent, UsbTransport};

const RAW_GADGET_DEVICE_NODE: &str = "/dev/raw-gadget";

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    pretty_env_logger::formatted_builder()
        .filter_level(config.log_level_filter())
        .parse_default_env()
        .init();

    info!("starting as {:?} on {}:{}", config.role, config.ip_addr, config.port);

    let device = RawGadgetDevice::open(RAW_GADGET_DEVICE_NODE)
        .with_context(|| format!("opening {RAW_GADGET_DEVICE_NODE}"))?;
    device
        .init(Speed::Full, &config.usb_driver, &config.usb_device)
        .context("initializing raw-gadget device")?;
    device.run().context("running raw-gadget device")?;

    let transport = Arc::new(device);
    let ring = Arc::new(RingBuffer::new(RING_BUFFER_CAPACITY));
    let connected = Arc::new(AtomicBool::new(false));

    let role = match config.role {
        Role::Server => me56ps2_emu::tcp_bridge::Role::Server,
        Role::Client => me56ps2_emu::tcp_bridge::Role::Client,
    };
    let bridge = Arc::new(TcpBridge::new(
        role,
        config.ip_addr,
        config.port,
        Arc::clone(&ring),
        Arc::clone(&connected),
        config.allow_hangup_on_peer_eof,
    ));

    let modem = Arc::new(Mutex::new(Modem::new(
        Arc::clone(&connected),
        Arc::clone(&ring),
        Arc::clone(&bridge) as Arc<dyn Dialer>,
    )));

    if config.allow_hangup_on_peer_eof {
        let modem_for_hangup = Arc::clone(&modem);
        bridge.set_on_hangup(move || modem_for_hangup.lock().unwrap().reset_accumulator());
    }

    let mut responder = EnumerationResponder::new();
    // Retained (not detached) so a future cancellation mechanism has
    // join points to work with, even though nothing joins them today.
    let mut activities: Vec<std::thread::JoinHandle<()>> = Vec::new();

    loop {
        let event = transport.event_fetch();

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "ep0", "event_fetch failed: {e}");
                return Err(e.into());
            }
        };

        match event {
            RawEvent::Connect => info!(target: "ep0", "connect event"),
            RawEvent::Other(kind) => info!(target: "ep0", "unhandled event type {kind}"),
            RawEvent::Control(raw) => {
                let control_event = ControlEvent::new(raw);
                let outcome = responder.handle(&control_event);
                handle_outcome(
                    &transport,
                    &control_event,
                    outcome,
                    &ring,
                    &connected,
                    &bridge,
                    &modem,
                    config.role,
                    &mut activities,
                )?;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_outcome(
    transport: &Arc<RawGadgetDevice>,
    event: &ControlEvent,
    outcome: EnumerationOutcome,
    ring: &Arc<RingBuffer>,
    connected: &Arc<AtomicBool>,
    bridge: &Arc<TcpBridge>,
    modem: &Arc<Mutex<Modem>>,
    role: Role,
    activities: &mut Vec<std::thread::JoinHandle<()>>,
) -> anyhow::Result<()> {
    match outcome {
        EnumerationOutcome::Stall => {
            transport.ep0_stall().context("stalling ep0")?;
        }
        EnumerationOutcome::Data(data) => {
            let data = clamp_to_w_length(data, event.w_length());
            transport.ep0_write(&data).context("ep0 data stage")?;
        }
        EnumerationOutcome::Ack => {
            acknowledge(transport, event)?;
        }
        EnumerationOutcome::ActivateConfiguration => {
            acknowledge(transport, event)?;
            activate_configuration(transport, ring, connected, bridge, modem, role, activities)?;
        }
    }
    Ok(())
}

fn acknowledge(transport: &Arc<RawGadgetDevice>, event: &ControlEvent) -> anyhow::Result<()> {
    if event.is_device_to_host() {
        transport.ep0_write(&[]).context("ep0 zero-length ack")?;
    } else {
        transport.ep0_read(0).context("ep0 zero-length ack")?;
    }
    Ok(())
}

fn activate_configuration(
    transport: &Arc<RawGadgetDevice>,
    ring: &Arc<RingBuffer>,
    connected: &Arc<AtomicBool>,
    bridge: &Arc<TcpBridge>,
    modem: &Arc<Mutex<Modem>>,
    role: Role,
    activities: &mut Vec<std::thread::JoinHandle<()>>,
) -> anyhow::Result<()> {
    let ep_in = transport
        .ep_enable(&descriptors::ioctl_endpoint_bulk_in())
        .context("enabling bulk-IN endpoint")?;
    let ep_out = transport
        .ep_enable(&descriptors::ioctl_endpoint_bulk_out())
        .context("enabling bulk-OUT endpoint")?;
    transport
        .vbus_draw(descriptors::MAX_POWER)
        .context("vbus_draw")?;
    transport.configure().context("configure")?;

    activities.push(bulk_in::spawn(
        Arc::clone(transport),
        ep_in,
        Arc::clone(ring),
        Arc::clone(connected),
    ));
    activities.push(bulk_out::spawn(Arc::clone(transport), ep_out, Arc::clone(modem)));

    if role == Role::Server {
        let ring = Arc::clone(ring);
        bridge
            .start_listening(move || {
                ring.enqueue(b"RING\r\n");
                ring.notify_one();
            })
            .context("starting TCP listener")?;
    }

    Ok(())
}
