//! USB gadget plumbing: the raw-gadget transport, the control-event
//! classifier, the fixed descriptor table, the enumeration responder,
//! and the two bulk-endpoint activities.

pub mod bulk_in;
pub mod bulk_out;
pub mod control_event;
pub mod descriptors;
pub mod enumeration;
pub mod transport;

/// USB vendor-specific class code used by the ME56PS2's sole interface.
pub const ENDPOINT_ADDR_BULK: u8 = 2;
pub const MAX_PACKET_SIZE_CONTROL: usize = 64; // 8 on the real ME56PS2; raw-gadget wants the gadget-side value
pub const MAX_PACKET_SIZE_BULK: usize = 64;

pub const STRING_ID_MANUFACTURER: u8 = 1;
pub const STRING_ID_PRODUCT: u8 = 2;
pub const STRING_ID_SERIAL: u8 = 3;
pub const STRING_DESCRIPTORS_NUM: usize = 4;

pub use control_event::{ControlEvent, RequestType};
pub use transport::{EndpointDescriptor, EndpointHandle, RawGadgetDevice, Speed, UsbTransport};
