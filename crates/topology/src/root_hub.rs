//! Virtual root hub
//!
//! The host controller has no upstream device to read descriptors from, so
//! the root hub carries a synthesized descriptor set: a USB 2.0 hub with
//! placeholder vendor/product ids and one configuration holding a single
//! hub interface without endpoints.

use crate::device::{DeviceNode, DeviceStrings};
use descriptor::{
    CLASS_HUB, Configuration, ConfigurationDescriptor, DescriptorKind, DeviceDescriptor, Interface,
    InterfaceDescriptor,
};
use std::sync::Arc;

pub const ROOT_HUB_VENDOR_ID: u16 = 0xffff;
pub const ROOT_HUB_PRODUCT_ID: u16 = 0xffff;

pub const ROOT_HUB_MANUFACTURER: &str = "usbtree";
pub const ROOT_HUB_PRODUCT: &str = "Virtual Root Hub";
pub const ROOT_HUB_SERIAL_NUMBER: &str = "1.0";

/// Bus-powered, no remote wakeup
const ROOT_HUB_ATTRIBUTES: u8 = 0x80;

pub fn root_hub_descriptor() -> DeviceDescriptor {
    DeviceDescriptor {
        length: DescriptorKind::Device.minimum_length(),
        descriptor_type: DescriptorKind::Device.descriptor_type(),
        bcd_usb: 0x0200,
        device_class: CLASS_HUB,
        device_sub_class: 0,
        device_protocol: 0,
        max_packet_size0: 64,
        vendor_id: ROOT_HUB_VENDOR_ID,
        product_id: ROOT_HUB_PRODUCT_ID,
        bcd_device: 0x0100,
        manufacturer_index: 1,
        product_index: 2,
        serial_number_index: 3,
        num_configurations: 1,
    }
}

pub fn root_hub_configuration() -> Configuration {
    let interface = InterfaceDescriptor {
        length: DescriptorKind::Interface.minimum_length(),
        descriptor_type: DescriptorKind::Interface.descriptor_type(),
        interface_number: 0,
        alternate_setting: 0,
        num_endpoints: 0,
        interface_class: CLASS_HUB,
        interface_sub_class: 0,
        interface_protocol: 0,
        interface_index: 0,
    };
    let header_len = DescriptorKind::Configuration.minimum_length();
    let descriptor = ConfigurationDescriptor {
        length: header_len,
        descriptor_type: DescriptorKind::Configuration.descriptor_type(),
        total_length: u16::from(header_len) + u16::from(interface.length),
        num_interfaces: 1,
        configuration_value: 1,
        configuration_index: 0,
        attributes: ROOT_HUB_ATTRIBUTES,
        max_power: 0,
    };
    Configuration {
        descriptor,
        interfaces: vec![Interface {
            descriptor: interface,
            endpoints: Vec::new(),
            extra: Vec::new(),
        }],
        extra: Vec::new(),
    }
}

/// Create a fresh root hub with no ports
pub fn create_root_hub() -> Arc<DeviceNode> {
    DeviceNode::build(
        None,
        root_hub_descriptor(),
        vec![root_hub_configuration()],
        DeviceStrings {
            manufacturer: Some(ROOT_HUB_MANUFACTURER.to_string()),
            product: Some(ROOT_HUB_PRODUCT.to_string()),
            serial_number: Some(ROOT_HUB_SERIAL_NUMBER.to_string()),
        },
    )
}
