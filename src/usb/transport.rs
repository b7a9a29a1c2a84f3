//! Thin operation surface over a `/dev/raw-gadget` device node.
//!
//! `UsbTransport` is the trait the rest of the system programs against:
//! the behavioral core is generic over how bytes actually reach hardware,
//! so it can be driven by a fake in tests. `RawGadgetDevice` is the only
//! production implementation, talking to the kernel's documented
//! `raw_gadget` UAPI via `nix`'s ioctl wrappers.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};

use log::{debug, trace};

use crate::error::{AppError, Result};
use crate::usb::{MAX_PACKET_SIZE_BULK, MAX_PACKET_SIZE_CONTROL};

/// Matches `enum usb_device_speed` from `<linux/usb/ch9.h>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Speed {
    Unknown = 0,
    Low = 1,
    Full = 2,
    High = 3,
    Wireless = 4,
    Super = 5,
    SuperPlus = 6,
}

/// Opaque endpoint identifier returned by `ep_enable`, matching the
/// non-negative ep number the kernel hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointHandle(pub u32);

/// In-process description of a non-zero endpoint, packed to the exact
/// on-wire `struct usb_endpoint_descriptor` layout `USB_RAW_IOCTL_EP_ENABLE`
/// expects (9 bytes: the kernel's struct carries two audio-class-only
/// trailing fields past the 7-byte USB_DT_ENDPOINT_SIZE core, which must
/// still be present and zeroed so the ioctl doesn't read past our buffer).
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct EndpointDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub b_endpoint_address: u8,
    pub bm_attributes: u8,
    pub w_max_packet_size: u16,
    pub b_interval: u8,
    b_refresh: u8,
    b_synch_address: u8,
}

impl EndpointDescriptor {
    pub const fn new(address: u8, max_packet_size: u16) -> Self {
        EndpointDescriptor {
            b_length: 7, // USB_DT_ENDPOINT_SIZE
            b_descriptor_type: 5, // USB_DT_ENDPOINT
            b_endpoint_address: address,
            bm_attributes: 2, // USB_ENDPOINT_XFER_BULK
            w_max_packet_size: max_packet_size,
            b_interval: 0,
            b_refresh: 0,
            b_synch_address: 0,
        }
    }
}

/// One classified control request as delivered by `USB_RAW_EVENT_CONTROL`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RawControlRequest {
    pub b_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

/// A single fetched gadget event. `Connect`/`Other` carry no payload;
/// `Control` carries the 8-byte control request.
#[derive(Debug, Clone, Copy)]
pub enum RawEvent {
    Connect,
    Control(RawControlRequest),
    Other(u32),
}

/// Every operation here only needs the raw fd, never exclusive access to
/// `Self` — the kernel multiplexes control, bulk-IN and bulk-OUT on one
/// fd by endpoint number, and each blocks independently (`event_fetch`
/// until the next control request, `ep_read` until the host sends
/// bulk-OUT data). Taking `&self` lets the control loop, the pacer and
/// the reader issue concurrent blocking ioctls on their own endpoints
/// instead of serializing behind one lock.
pub trait UsbTransport {
    fn init(&self, speed: Speed, driver_name: &str, device_name: &str) -> Result<()>;
    fn run(&self) -> Result<()>;
    fn event_fetch(&self) -> Result<RawEvent>;
    fn ep_enable(&self, desc: &EndpointDescriptor) -> Result<EndpointHandle>;
    fn ep0_write(&self, data: &[u8]) -> Result<usize>;
    fn ep0_read(&self, max_len: usize) -> Result<Vec<u8>>;
    fn ep0_stall(&self) -> Result<()>;
    fn ep_write(&self, ep: EndpointHandle, data: &[u8]) -> Result<usize>;
    fn ep_read(&self, ep: EndpointHandle, buf: &mut [u8]) -> Result<usize>;
    fn vbus_draw(&self, max_power: u8) -> Result<()>;
    fn configure(&self) -> Result<()>;
}

// -- raw_gadget UAPI (linux/usb/raw_gadget.h): these ioctl numbers and
// -- struct layouts are part of the stable Linux kernel ABI, not invented
// -- for this crate.

const UDC_NAME_LENGTH_MAX: usize = 128;

#[repr(C)]
struct RawGadgetInit {
    driver_name: [u8; UDC_NAME_LENGTH_MAX],
    device_name: [u8; UDC_NAME_LENGTH_MAX],
    speed: u8,
}

const USB_RAW_EVENT_CONNECT: u32 = 1;
const USB_RAW_EVENT_CONTROL: u32 = 2;

#[repr(C)]
struct RawGadgetControlEvent {
    event_type: u32,
    length: u32,
    ctrl: RawControlRequest,
}

#[repr(C)]
struct RawGadgetEpIo<const N: usize> {
    ep: u16,
    flags: u16,
    length: u32,
    data: [u8; N],
}

mod ioctl {
    use super::*;

    nix::ioctl_write_ptr!(init, b'U', 0, RawGadgetInit);
    nix::ioctl_none!(run, b'U', 1);
    nix::ioctl_read!(event_fetch, b'U', 2, RawGadgetControlEvent);
    nix::ioctl_write_ptr!(
        ep0_write,
        b'U',
        3,
        RawGadgetEpIo<{ MAX_PACKET_SIZE_CONTROL }>
    );
    nix::ioctl_readwrite!(
        ep0_read,
        b'U',
        4,
        RawGadgetEpIo<{ MAX_PACKET_SIZE_CONTROL }>
    );
    nix::ioctl_write_ptr!(ep_enable, b'U', 5, EndpointDescriptor);
    nix::ioctl_write_ptr!(ep_write, b'U', 7, RawGadgetEpIo<{ MAX_PACKET_SIZE_BULK }>);
    nix::ioctl_readwrite!(ep_read, b'U', 8, RawGadgetEpIo<{ MAX_PACKET_SIZE_BULK }>);
    nix::ioctl_none!(configure, b'U', 9);
    nix::ioctl_write_int!(vbus_draw, b'U', 10);
    nix::ioctl_none!(ep0_stall, b'U', 12);
}

fn copy_name(dst: &mut [u8; UDC_NAME_LENGTH_MAX], name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() >= UDC_NAME_LENGTH_MAX {
        return Err(AppError::Device(format!(
            "driver/device name {name:?} too long for raw-gadget ({} bytes max)",
            UDC_NAME_LENGTH_MAX - 1
        )));
    }
    dst[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn dump_hex_and_ascii(data: &[u8]) {
    for chunk in data.chunks(16) {
        let hex: String = chunk.iter().map(|b| format!("{b:02x} ")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        trace!("  {hex:<48}{ascii}");
    }
}

pub struct RawGadgetDevice {
    file: File,
}

impl RawGadgetDevice {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| AppError::Device(format!("open({path}): {e}")))?;
        Ok(RawGadgetDevice { file })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl UsbTransport for RawGadgetDevice {
    fn init(&self, speed: Speed, driver_name: &str, device_name: &str) -> Result<()> {
        let mut arg = RawGadgetInit {
            driver_name: [0u8; UDC_NAME_LENGTH_MAX],
            device_name: [0u8; UDC_NAME_LENGTH_MAX],
            speed: speed as u8,
        };
        copy_name(&mut arg.driver_name, driver_name)?;
        copy_name(&mut arg.device_name, device_name)?;

        unsafe { ioctl::init(self.fd(), &arg) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_INIT): {e}")))?;
        Ok(())
    }

    fn run(&self) -> Result<()> {
        unsafe { ioctl::run(self.fd()) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_RUN): {e}")))?;
        Ok(())
    }

    fn event_fetch(&self) -> Result<RawEvent> {
        let mut event = RawGadgetControlEvent {
            event_type: 0,
            length: std::mem::size_of::<RawControlRequest>() as u32,
            ctrl: RawControlRequest {
                b_request_type: 0,
                b_request: 0,
                w_value: 0,
                w_index: 0,
                w_length: 0,
            },
        };

        unsafe { ioctl::event_fetch(self.fd(), &mut event) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EVENT_FETCH): {e}")))?;

        Ok(match event.event_type {
            USB_RAW_EVENT_CONNECT => RawEvent::Connect,
            USB_RAW_EVENT_CONTROL => RawEvent::Control(event.ctrl),
            other => RawEvent::Other(other),
        })
    }

    fn ep_enable(&self, desc: &EndpointDescriptor) -> Result<EndpointHandle> {
        let ret = unsafe { ioctl::ep_enable(self.fd(), desc) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EP_ENABLE): {e}")))?;
        Ok(EndpointHandle(ret as u32))
    }

    fn ep0_write(&self, data: &[u8]) -> Result<usize> {
        if data.len() > MAX_PACKET_SIZE_CONTROL {
            return Err(AppError::Protocol(format!(
                "ep0 write of {} bytes exceeds control max packet size",
                data.len()
            )));
        }
        let mut io = RawGadgetEpIo::<{ MAX_PACKET_SIZE_CONTROL }> {
            ep: 0,
            flags: 0,
            length: data.len() as u32,
            data: [0u8; MAX_PACKET_SIZE_CONTROL],
        };
        io.data[..data.len()].copy_from_slice(data);

        let ret = unsafe { ioctl::ep0_write(self.fd(), &io) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EP0_WRITE): {e}")))?;
        debug!("ep0: write: transferred {ret} bytes");
        dump_hex_and_ascii(&io.data[..ret as usize]);
        Ok(ret as usize)
    }

    fn ep0_read(&self, max_len: usize) -> Result<Vec<u8>> {
        let max_len = max_len.min(MAX_PACKET_SIZE_CONTROL);
        let mut io = RawGadgetEpIo::<{ MAX_PACKET_SIZE_CONTROL }> {
            ep: 0,
            flags: 0,
            length: max_len as u32,
            data: [0u8; MAX_PACKET_SIZE_CONTROL],
        };

        let ret = unsafe { ioctl::ep0_read(self.fd(), &mut io) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EP0_READ): {e}")))?;
        debug!("ep0: read: transferred {ret} bytes");
        dump_hex_and_ascii(&io.data[..ret as usize]);
        Ok(io.data[..ret as usize].to_vec())
    }

    fn ep0_stall(&self) -> Result<()> {
        debug!("ep0: stall");
        unsafe { ioctl::ep0_stall(self.fd()) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EP0_STALL): {e}")))?;
        Ok(())
    }

    fn ep_write(&self, ep: EndpointHandle, data: &[u8]) -> Result<usize> {
        if data.len() > MAX_PACKET_SIZE_BULK {
            return Err(AppError::Protocol(format!(
                "ep{} write of {} bytes exceeds bulk max packet size",
                ep.0,
                data.len()
            )));
        }
        let mut io = RawGadgetEpIo::<{ MAX_PACKET_SIZE_BULK }> {
            ep: ep.0 as u16,
            flags: 0,
            length: data.len() as u32,
            data: [0u8; MAX_PACKET_SIZE_BULK],
        };
        io.data[..data.len()].copy_from_slice(data);

        let ret = unsafe { ioctl::ep_write(self.fd(), &io) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EP_WRITE): {e}")))?;
        debug!("ep{}: write: transferred {ret} bytes", ep.0);
        dump_hex_and_ascii(&io.data[..ret as usize]);
        Ok(ret as usize)
    }

    fn ep_read(&self, ep: EndpointHandle, buf: &mut [u8]) -> Result<usize> {
        let max_len = buf.len().min(MAX_PACKET_SIZE_BULK);
        let mut io = RawGadgetEpIo::<{ MAX_PACKET_SIZE_BULK }> {
            ep: ep.0 as u16,
            flags: 0,
            length: max_len as u32,
            data: [0u8; MAX_PACKET_SIZE_BULK],
        };

        let ret = unsafe { ioctl::ep_read(self.fd(), &mut io) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_EP_READ): {e}")))?;
        debug!("ep{}: read: transferred {ret} bytes", ep.0);
        dump_hex_and_ascii(&io.data[..ret as usize]);
        buf[..ret as usize].copy_from_slice(&io.data[..ret as usize]);
        Ok(ret as usize)
    }

    fn vbus_draw(&self, max_power: u8) -> Result<()> {
        // USB_RAW_IOCTL_VBUS_DRAW takes bMaxPower (2 mA units) by value and
        // doubles it internally; pass it through unchanged, not pre-doubled.
        unsafe { ioctl::vbus_draw(self.fd(), max_power as _) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_VBUS_DRAW): {e}")))?;
        Ok(())
    }

    fn configure(&self) -> Result<()> {
        unsafe { ioctl::configure(self.fd()) }
            .map_err(|e| AppError::Device(format!("ioctl(USB_RAW_IOCTL_CONFIGURE): {e}")))?;
        Ok(())
    }
}
