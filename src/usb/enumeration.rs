//! Answers standard descriptor/configuration requests and the vendor
//! DTR request, using the fixed descriptor set.
//!
//! Stateless aside from the one-shot "has SET_CONFIGURATION already
//! fired" latch, which exists purely to make repeated SET_CONFIGURATION
//! idempotent: the pacer and reader activities must be spawned exactly
//! once for the life of the process, not once per SET_CONFIGURATION.

use log::{debug, info};

use crate::usb::control_event::{
    ControlEvent, RequestType, USB_DT_CONFIG, USB_DT_DEVICE, USB_DT_STRING,
    USB_REQ_GET_DESCRIPTOR, USB_REQ_SET_CONFIGURATION, USB_REQ_SET_INTERFACE,
};
use crate::usb::descriptors;
use crate::usb::STRING_DESCRIPTORS_NUM;

const VENDOR_REQUEST_DTR: u8 = 0x01;
const DTR_MASK: u16 = 0x0101;
const DTR_ON_HOOK: u16 = 0x0100;
const DTR_OFF_HOOK: u16 = 0x0101;

/// What the control loop should do with ep0 after a request is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationOutcome {
    /// Write this data as the data stage, clamped to `wLength` by the caller.
    Data(Vec<u8>),
    /// Zero-length status-stage-only acknowledgement.
    Ack,
    /// The first SET_CONFIGURATION: acknowledge, and the caller MUST
    /// enable both bulk endpoints and spawn the pacer/reader activities
    /// before doing anything else.
    ActivateConfiguration,
    /// No handler matched; stall the default pipe.
    Stall,
}

#[derive(Default)]
pub struct EnumerationResponder {
    configured: bool,
}

impl EnumerationResponder {
    pub fn new() -> Self {
        EnumerationResponder { configured: false }
    }

    pub fn handle(&mut self, event: &ControlEvent) -> EnumerationOutcome {
        if event.is(RequestType::Standard, USB_REQ_GET_DESCRIPTOR) {
            return self.handle_get_descriptor(event);
        }

        if event.is(RequestType::Standard, USB_REQ_SET_CONFIGURATION) {
            if self.configured {
                debug!("SET_CONFIGURATION received again, already configured");
                return EnumerationOutcome::Ack;
            }
            self.configured = true;
            info!("USB configured");
            return EnumerationOutcome::ActivateConfiguration;
        }

        if event.is(RequestType::Standard, USB_REQ_SET_INTERFACE) {
            return EnumerationOutcome::Ack;
        }

        if event.request_type() == RequestType::Vendor {
            if event.request() == VENDOR_REQUEST_DTR {
                match event.w_value() & DTR_MASK {
                    DTR_ON_HOOK => debug!("on-hook"),
                    DTR_OFF_HOOK => debug!("off-hook"),
                    _ => {}
                }
            }
            return EnumerationOutcome::Ack;
        }

        EnumerationOutcome::Stall
    }

    fn handle_get_descriptor(&self, event: &ControlEvent) -> EnumerationOutcome {
        match event.descriptor_type() {
            t if t == USB_DT_DEVICE => EnumerationOutcome::Data(descriptors::device_descriptor()),
            t if t == USB_DT_CONFIG => {
                EnumerationOutcome::Data(descriptors::config_descriptor_block())
            }
            t if t == USB_DT_STRING => {
                let index = event.descriptor_index();
                if index as usize >= STRING_DESCRIPTORS_NUM {
                    return EnumerationOutcome::Stall;
                }
                match descriptors::string_descriptor(index) {
                    Some(bytes) => EnumerationOutcome::Data(bytes),
                    None => EnumerationOutcome::Stall,
                }
            }
            _ => EnumerationOutcome::Stall,
        }
    }
}

/// Clamps a descriptor's length to `min(descriptor_length, wLength)`
/// before the data stage, as a real USB host will only read `wLength`
/// bytes regardless of how much the device offers.
pub fn clamp_to_w_length(mut data: Vec<u8>, w_length: u16) -> Vec<u8> {
    let max_len = data.len().min(w_length as usize);
    data.truncate(max_len);
    data
}
