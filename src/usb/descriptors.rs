//! The fixed descriptor set for the ME56PS2. These byte layouts MUST
//! be emitted bit-identically — they are reverse-engineered protocol
//! constants, not something to "clean up". Built with `packed_struct`,
//! the same crate the rest of this codebase uses for wire-format structs.

use packed_struct::prelude::*;

use crate::usb::transport::EndpointDescriptor as IoctlEndpointDescriptor;
use crate::usb::{
    ENDPOINT_ADDR_BULK, MAX_PACKET_SIZE_BULK, STRING_ID_MANUFACTURER, STRING_ID_PRODUCT,
    STRING_ID_SERIAL,
};

const BCD_USB: u16 = 0x0110; // USB 1.1
const BCD_DEVICE: u16 = 0x0101;
const USB_VENDOR: u16 = 0x0590; // Omron Corp.
const USB_PRODUCT: u16 = 0x001a; // ME56PS2
const MAX_PACKET_SIZE_CONTROL: u8 = 64; // 8 on the real ME56PS2, 64 on the gadget side

const USB_DT_DEVICE: u8 = 0x01;
const USB_DT_CONFIG: u8 = 0x02;
const USB_DT_STRING: u8 = 0x03;
const USB_DT_INTERFACE: u8 = 0x04;
const USB_DT_ENDPOINT: u8 = 0x05;

const USB_DIR_IN: u8 = 0x80;
const USB_DIR_OUT: u8 = 0x00;
const USB_ENDPOINT_XFER_BULK: u8 = 0x02;
const USB_CONFIG_ATT_WAKEUP: u8 = 0x20;

#[derive(PackedStruct, Debug, Clone, Copy)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "18", endian = "lsb")]
struct DeviceDescriptor {
    #[packed_field(bytes = "0")]
    b_length: u8,
    #[packed_field(bytes = "1")]
    b_descriptor_type: u8,
    #[packed_field(bytes = "2:3")]
    bcd_usb: u16,
    #[packed_field(bytes = "4")]
    b_device_class: u8,
    #[packed_field(bytes = "5")]
    b_device_sub_class: u8,
    #[packed_field(bytes = "6")]
    b_device_protocol: u8,
    #[packed_field(bytes = "7")]
    b_max_packet_size0: u8,
    #[packed_field(bytes = "8:9")]
    id_vendor: u16,
    #[packed_field(bytes = "10:11")]
    id_product: u16,
    #[packed_field(bytes = "12:13")]
    bcd_device: u16,
    #[packed_field(bytes = "14")]
    i_manufacturer: u8,
    #[packed_field(bytes = "15")]
    i_product: u8,
    #[packed_field(bytes = "16")]
    i_serial_number: u8,
    #[packed_field(bytes = "17")]
    b_num_configurations: u8,
}

#[derive(PackedStruct, Debug, Clone, Copy)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "9", endian = "lsb")]
struct ConfigDescriptor {
    #[packed_field(bytes = "0")]
    b_length: u8,
    #[packed_field(bytes = "1")]
    b_descriptor_type: u8,
    #[packed_field(bytes = "2:3")]
    w_total_length: u16,
    #[packed_field(bytes = "4")]
    b_num_interfaces: u8,
    #[packed_field(bytes = "5")]
    b_configuration_value: u8,
    #[packed_field(bytes = "6")]
    i_configuration: u8,
    #[packed_field(bytes = "7")]
    bm_attributes: u8,
    #[packed_field(bytes = "8")]
    b_max_power: u8,
}

#[derive(PackedStruct, Debug, Clone, Copy)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "9", endian = "lsb")]
struct InterfaceDescriptor {
    #[packed_field(bytes = "0")]
    b_length: u8,
    #[packed_field(bytes = "1")]
    b_descriptor_type: u8,
    #[packed_field(bytes = "2")]
    b_interface_number: u8,
    #[packed_field(bytes = "3")]
    b_alternate_setting: u8,
    #[packed_field(bytes = "4")]
    b_num_endpoints: u8,
    #[packed_field(bytes = "5")]
    b_interface_class: u8,
    #[packed_field(bytes = "6")]
    b_interface_sub_class: u8,
    #[packed_field(bytes = "7")]
    b_interface_protocol: u8,
    #[packed_field(bytes = "8")]
    i_interface: u8,
}

#[derive(PackedStruct, Debug, Clone, Copy)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "7", endian = "lsb")]
struct WireEndpointDescriptor {
    #[packed_field(bytes = "0")]
    b_length: u8,
    #[packed_field(bytes = "1")]
    b_descriptor_type: u8,
    #[packed_field(bytes = "2")]
    b_endpoint_address: u8,
    #[packed_field(bytes = "3")]
    bm_attributes: u8,
    #[packed_field(bytes = "4:5")]
    w_max_packet_size: u16,
    #[packed_field(bytes = "6")]
    b_interval: u8,
}

const CONFIG_BLOCK_TOTAL_LENGTH: u16 = 9 + 9 + 7 + 7; // config + interface + 2 endpoints

/// `bMaxPower` in 2 mA units; the control loop reuses this when it calls
/// `vbus_draw` on the first `SET_CONFIGURATION`.
pub const MAX_POWER: u8 = 0x1e; // 60 mA

/// The 18-byte device descriptor, returned verbatim for
/// `GET_DESCRIPTOR(DEVICE)`.
pub fn device_descriptor() -> Vec<u8> {
    DeviceDescriptor {
        b_length: 18,
        b_descriptor_type: USB_DT_DEVICE,
        bcd_usb: BCD_USB,
        b_device_class: 0,
        b_device_sub_class: 0,
        b_device_protocol: 0,
        b_max_packet_size0: MAX_PACKET_SIZE_CONTROL,
        id_vendor: USB_VENDOR,
        id_product: USB_PRODUCT,
        bcd_device: BCD_DEVICE,
        i_manufacturer: STRING_ID_MANUFACTURER,
        i_product: STRING_ID_PRODUCT,
        i_serial_number: STRING_ID_SERIAL,
        b_num_configurations: 1,
    }
    .pack()
    .expect("fixed-size descriptor always packs")
    .to_vec()
}

/// The full configuration block: config + interface + bulk-IN ep +
/// bulk-OUT ep, concatenated in that order, returned for
/// `GET_DESCRIPTOR(CONFIG)`.
pub fn config_descriptor_block() -> Vec<u8> {
    let config = ConfigDescriptor {
        b_length: 9,
        b_descriptor_type: USB_DT_CONFIG,
        w_total_length: CONFIG_BLOCK_TOTAL_LENGTH,
        b_num_interfaces: 1,
        b_configuration_value: 1,
        i_configuration: 2,
        bm_attributes: USB_CONFIG_ATT_WAKEUP,
        b_max_power: MAX_POWER,
    };

    let interface = InterfaceDescriptor {
        b_length: 9,
        b_descriptor_type: USB_DT_INTERFACE,
        b_interface_number: 0,
        b_alternate_setting: 0,
        b_num_endpoints: 2,
        b_interface_class: 0xff, // vendor-specific
        b_interface_sub_class: 0xff,
        b_interface_protocol: 0xff,
        i_interface: 2,
    };

    let ep_in = WireEndpointDescriptor {
        b_length: 7,
        b_descriptor_type: USB_DT_ENDPOINT,
        b_endpoint_address: USB_DIR_IN | ENDPOINT_ADDR_BULK,
        bm_attributes: USB_ENDPOINT_XFER_BULK,
        w_max_packet_size: MAX_PACKET_SIZE_BULK as u16,
        b_interval: 0,
    };

    let ep_out = WireEndpointDescriptor {
        b_length: 7,
        b_descriptor_type: USB_DT_ENDPOINT,
        b_endpoint_address: USB_DIR_OUT | ENDPOINT_ADDR_BULK,
        bm_attributes: USB_ENDPOINT_XFER_BULK,
        w_max_packet_size: MAX_PACKET_SIZE_BULK as u16,
        b_interval: 0,
    };

    let mut block = Vec::with_capacity(CONFIG_BLOCK_TOTAL_LENGTH as usize);
    block.extend_from_slice(&config.pack().expect("fixed-size descriptor always packs"));
    block.extend_from_slice(
        &interface
            .pack()
            .expect("fixed-size descriptor always packs"),
    );
    block.extend_from_slice(&ep_in.pack().expect("fixed-size descriptor always packs"));
    block.extend_from_slice(&ep_out.pack().expect("fixed-size descriptor always packs"));
    block
}

/// The kernel-facing (9-byte) endpoint descriptor used to enable the
/// bulk-IN endpoint via `ep_enable`.
pub fn ioctl_endpoint_bulk_in() -> IoctlEndpointDescriptor {
    IoctlEndpointDescriptor::new(USB_DIR_IN | ENDPOINT_ADDR_BULK, MAX_PACKET_SIZE_BULK as u16)
}

/// The kernel-facing (9-byte) endpoint descriptor used to enable the
/// bulk-OUT endpoint via `ep_enable`.
pub fn ioctl_endpoint_bulk_out() -> IoctlEndpointDescriptor {
    IoctlEndpointDescriptor::new(USB_DIR_OUT | ENDPOINT_ADDR_BULK, MAX_PACKET_SIZE_BULK as u16)
}

fn utf16le_string_descriptor(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut out = Vec::with_capacity(2 + units.len() * 2);
    out.push((2 + units.len() * 2) as u8);
    out.push(USB_DT_STRING);
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// String descriptor 0 (the LANGID array) plus 1 ("N/A" manufacturer), 2
/// ("Modem emulator" product) and 3 ("N/A" serial), indexed by
/// `wValue & 0xff`. Index ≥ `STRING_DESCRIPTORS_NUM` has no entry here;
/// the enumeration responder stalls on that case.
pub fn string_descriptor(index: u8) -> Option<Vec<u8>> {
    match index {
        0 => Some(vec![0x04, USB_DT_STRING, 0x09, 0x04]), // LANGID 0x0409
        1 => Some(utf16le_string_descriptor("N/A")),
        2 => Some(utf16le_string_descriptor("Modem emulator")),
        3 => Some(utf16le_string_descriptor("N/A")),
        _ => None,
    }
}
