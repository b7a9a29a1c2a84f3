use me56ps2_emu::usb::control_event::{
    ControlEvent, RequestType, USB_DT_CONFIG, USB_DT_DEVICE, USB_REQ_GET_DESCRIPTOR,
    USB_REQ_SET_CONFIGURATION,
};
use me56ps2_emu::usb::transport::RawControlRequest;

fn raw(b_request_type: u8, b_request: u8, w_value: u16, w_index: u16, w_length: u16) -> RawControlRequest {
    RawControlRequest {
        b_request_type,
        b_request,
        w_value,
        w_index,
        w_length,
    }
}

#[test]
fn classifies_standard_device_to_host_get_descriptor_device() {
    // 0x80 = standard | device-to-host; wValue hi byte = DEVICE descriptor type.
    let event = ControlEvent::new(raw(0x80, USB_REQ_GET_DESCRIPTOR, (USB_DT_DEVICE as u16) << 8, 0, 18));

    assert_eq!(event.request_type(), RequestType::Standard);
    assert!(event.is_device_to_host());
    assert_eq!(event.descriptor_type(), USB_DT_DEVICE);
    assert_eq!(event.descriptor_index(), 0);
    assert_eq!(event.w_length(), 18);
    assert!(event.is(RequestType::Standard, USB_REQ_GET_DESCRIPTOR));
}

#[test]
fn classifies_standard_get_descriptor_config_with_index() {
    let w_value = ((USB_DT_CONFIG as u16) << 8) | 0x00;
    let event = ControlEvent::new(raw(0x80, USB_REQ_GET_DESCRIPTOR, w_value, 0, 255));

    assert_eq!(event.descriptor_type(), USB_DT_CONFIG);
    assert_eq!(event.descriptor_index(), 0);
}

#[test]
fn classifies_standard_host_to_device_set_configuration() {
    // 0x00 = standard | host-to-device.
    let event = ControlEvent::new(raw(0x00, USB_REQ_SET_CONFIGURATION, 1, 0, 0));

    assert_eq!(event.request_type(), RequestType::Standard);
    assert!(!event.is_device_to_host());
    assert!(event.is(RequestType::Standard, USB_REQ_SET_CONFIGURATION));
    assert_eq!(event.w_value(), 1);
}

#[test]
fn classifies_vendor_request() {
    // 0x40 = vendor | host-to-device.
    let event = ControlEvent::new(raw(0x40, 0x01, 0x0101, 0, 0));

    assert_eq!(event.request_type(), RequestType::Vendor);
    assert_eq!(event.request(), 0x01);
    assert_eq!(event.w_value(), 0x0101);
}

#[test]
fn classifies_class_and_reserved_types() {
    let class_event = ControlEvent::new(raw(0x20, 0x00, 0, 0, 0));
    assert_eq!(class_event.request_type(), RequestType::Class);

    let reserved_event = ControlEvent::new(raw(0x60, 0x00, 0, 0, 0));
    assert_eq!(reserved_event.request_type(), RequestType::Reserved);
}
