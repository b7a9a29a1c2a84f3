use me56ps2_emu::usb::control_event::{
    ControlEvent, USB_DT_CONFIG, USB_DT_DEVICE, USB_DT_STRING, USB_REQ_GET_DESCRIPTOR,
    USB_REQ_SET_CONFIGURATION, USB_REQ_SET_INTERFACE,
};
use me56ps2_emu::usb::enumeration::{clamp_to_w_length, EnumerationOutcome, EnumerationResponder};
use me56ps2_emu::usb::transport::RawControlRequest;
use me56ps2_emu::usb::{descriptors, STRING_DESCRIPTORS_NUM};

fn raw(b_request_type: u8, b_request: u8, w_value: u16, w_length: u16) -> RawControlRequest {
    RawControlRequest {
        b_request_type,
        b_request,
        w_value,
        w_index: 0,
        w_length,
    }
}

#[test]
fn get_descriptor_device_returns_the_fixed_device_descriptor() {
    let mut responder = EnumerationResponder::new();
    let event = ControlEvent::new(raw(0x80, USB_REQ_GET_DESCRIPTOR, (USB_DT_DEVICE as u16) << 8, 18));

    let outcome = responder.handle(&event);

    assert_eq!(outcome, EnumerationOutcome::Data(descriptors::device_descriptor()));
}

#[test]
fn get_descriptor_config_returns_the_full_configuration_block() {
    let mut responder = EnumerationResponder::new();
    let event = ControlEvent::new(raw(0x80, USB_REQ_GET_DESCRIPTOR, (USB_DT_CONFIG as u16) << 8, 255));

    let outcome = responder.handle(&event);

    assert_eq!(outcome, EnumerationOutcome::Data(descriptors::config_descriptor_block()));
}

#[test]
fn get_descriptor_string_in_range_returns_the_matching_string() {
    let mut responder = EnumerationResponder::new();
    let w_value = ((USB_DT_STRING as u16) << 8) | 2;
    let event = ControlEvent::new(raw(0x80, USB_REQ_GET_DESCRIPTOR, w_value, 255));

    let outcome = responder.handle(&event);

    assert_eq!(outcome, EnumerationOutcome::Data(descriptors::string_descriptor(2).unwrap()));
}

#[test]
fn get_descriptor_string_out_of_range_stalls() {
    let mut responder = EnumerationResponder::new();
    let index = STRING_DESCRIPTORS_NUM as u16; // first invalid index
    let w_value = ((USB_DT_STRING as u16) << 8) | index;
    let event = ControlEvent::new(raw(0x80, USB_REQ_GET_DESCRIPTOR, w_value, 255));

    let outcome = responder.handle(&event);

    assert_eq!(outcome, EnumerationOutcome::Stall);
}

#[test]
fn clamp_truncates_data_to_w_length() {
    let data = vec![1, 2, 3, 4, 5];
    assert_eq!(clamp_to_w_length(data.clone(), 3), vec![1, 2, 3]);
    assert_eq!(clamp_to_w_length(data.clone(), 100), data);
}

#[test]
fn first_set_configuration_activates_repeats_just_ack() {
    let mut responder = EnumerationResponder::new();
    let event = ControlEvent::new(raw(0x00, USB_REQ_SET_CONFIGURATION, 1, 0));

    assert_eq!(responder.handle(&event), EnumerationOutcome::ActivateConfiguration);
    assert_eq!(responder.handle(&event), EnumerationOutcome::Ack);
    assert_eq!(responder.handle(&event), EnumerationOutcome::Ack);
}

#[test]
fn set_interface_is_a_zero_length_ack() {
    let mut responder = EnumerationResponder::new();
    let event = ControlEvent::new(raw(0x00, USB_REQ_SET_INTERFACE, 0, 0));

    assert_eq!(responder.handle(&event), EnumerationOutcome::Ack);
}

#[test]
fn vendor_dtr_request_and_other_vendor_requests_are_acked() {
    let mut responder = EnumerationResponder::new();

    let dtr_on_hook = ControlEvent::new(raw(0x40, 0x01, 0x0100, 0));
    assert_eq!(responder.handle(&dtr_on_hook), EnumerationOutcome::Ack);

    let dtr_off_hook = ControlEvent::new(raw(0x40, 0x01, 0x0101, 0));
    assert_eq!(responder.handle(&dtr_off_hook), EnumerationOutcome::Ack);

    let other_vendor = ControlEvent::new(raw(0x40, 0x42, 0, 0));
    assert_eq!(responder.handle(&other_vendor), EnumerationOutcome::Ack);
}

#[test]
fn unrecognised_standard_request_stalls() {
    let mut responder = EnumerationResponder::new();
    let event = ControlEvent::new(raw(0x00, 0xEE, 0, 0));

    assert_eq!(responder.handle(&event), EnumerationOutcome::Stall);
}
