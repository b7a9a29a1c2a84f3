//! Decomposes a raw control request into the fields the enumeration
//! responder matches on. Purely derivative — no state of its own.

use crate::usb::transport::RawControlRequest;

const USB_TYPE_MASK: u8 = 0x60;
const USB_DIR_IN: u8 = 0x80;

pub const USB_REQ_GET_DESCRIPTOR: u8 = 0x06;
pub const USB_REQ_SET_CONFIGURATION: u8 = 0x09;
pub const USB_REQ_SET_INTERFACE: u8 = 0x0b;

pub const USB_DT_DEVICE: u8 = 0x01;
pub const USB_DT_CONFIG: u8 = 0x02;
pub const USB_DT_STRING: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Standard,
    Class,
    Vendor,
    Reserved,
}

impl RequestType {
    fn from_bm_request_type(bm_request_type: u8) -> RequestType {
        match bm_request_type & USB_TYPE_MASK {
            0x00 => RequestType::Standard,
            0x20 => RequestType::Class,
            0x40 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }
}

/// A control request, decomposed into request-type, request, descriptor
/// type/index, and the raw `wValue`/`wIndex`/`wLength` fields.
#[derive(Debug, Clone, Copy)]
pub struct ControlEvent {
    raw: RawControlRequest,
}

impl ControlEvent {
    pub fn new(raw: RawControlRequest) -> Self {
        ControlEvent { raw }
    }

    pub fn request_type(&self) -> RequestType {
        RequestType::from_bm_request_type(self.raw.b_request_type)
    }

    pub fn request(&self) -> u8 {
        self.raw.b_request
    }

    pub fn is_device_to_host(&self) -> bool {
        self.raw.b_request_type & USB_DIR_IN != 0
    }

    /// Only meaningful when `(request_type, request) == (Standard, GET_DESCRIPTOR)`.
    pub fn descriptor_type(&self) -> u8 {
        (self.raw.w_value >> 8) as u8
    }

    pub fn descriptor_index(&self) -> u8 {
        (self.raw.w_value & 0xff) as u8
    }

    pub fn w_value(&self) -> u16 {
        self.raw.w_value
    }

    pub fn w_index(&self) -> u16 {
        self.raw.w_index
    }

    pub fn w_length(&self) -> u16 {
        self.raw.w_length
    }

    pub fn is(&self, request_type: RequestType, request: u8) -> bool {
        self.request_type() == request_type && self.request() == request
    }
}
