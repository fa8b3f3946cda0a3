//! Raw descriptor decoding
//!
//! Decoding is a pure function of the input bytes. Each decoder validates
//! the two header bytes before touching the payload:
//!
//! ```text
//! [bLength: u8][bDescriptorType: u8][kind-specific fields, little-endian]
//! ```
//!
//! Bytes past `bLength` are ignored, so a caller may pass the head of a
//! larger buffer (e.g. a whole configuration bundle).

use crate::error::{DescriptorError, Result};
use crate::types::{
    ConfigurationDescriptor, Descriptor, DescriptorKind, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor,
};
use byteorder::{ByteOrder, LittleEndian};

/// Decode a descriptor of the requested kind
///
/// # Example
/// ```
/// use descriptor::{Descriptor, DescriptorKind, decode};
///
/// let bytes = [7, 5, 0x81, 0x03, 8, 0, 10];
/// let decoded = decode(DescriptorKind::Endpoint, &bytes).unwrap();
/// assert!(matches!(decoded, Descriptor::Endpoint(ep) if ep.interval == 10));
///
/// assert!(decode(DescriptorKind::Device, &bytes).is_err());
/// ```
pub fn decode(kind: DescriptorKind, bytes: &[u8]) -> Result<Descriptor> {
    match kind {
        DescriptorKind::Device => decode_device(bytes).map(Descriptor::Device),
        DescriptorKind::Configuration => {
            decode_configuration(bytes).map(Descriptor::Configuration)
        }
        DescriptorKind::Interface => decode_interface(bytes).map(Descriptor::Interface),
        DescriptorKind::Endpoint => decode_endpoint(bytes).map(Descriptor::Endpoint),
    }
}

/// Decode an 18-byte device descriptor
pub fn decode_device(bytes: &[u8]) -> Result<DeviceDescriptor> {
    let raw = check_header(DescriptorKind::Device, bytes)?;

    Ok(DeviceDescriptor {
        length: raw[0],
        descriptor_type: raw[1],
        bcd_usb: LittleEndian::read_u16(&raw[2..4]),
        device_class: raw[4],
        device_sub_class: raw[5],
        device_protocol: raw[6],
        max_packet_size0: raw[7],
        vendor_id: LittleEndian::read_u16(&raw[8..10]),
        product_id: LittleEndian::read_u16(&raw[10..12]),
        bcd_device: LittleEndian::read_u16(&raw[12..14]),
        manufacturer_index: raw[14],
        product_index: raw[15],
        serial_number_index: raw[16],
        num_configurations: raw[17],
    })
}

/// Decode the 9-byte header of a configuration bundle
pub fn decode_configuration(bytes: &[u8]) -> Result<ConfigurationDescriptor> {
    let raw = check_header(DescriptorKind::Configuration, bytes)?;

    Ok(ConfigurationDescriptor {
        length: raw[0],
        descriptor_type: raw[1],
        total_length: LittleEndian::read_u16(&raw[2..4]),
        num_interfaces: raw[4],
        configuration_value: raw[5],
        configuration_index: raw[6],
        attributes: raw[7],
        max_power: raw[8],
    })
}

/// Decode a 9-byte interface descriptor
pub fn decode_interface(bytes: &[u8]) -> Result<InterfaceDescriptor> {
    let raw = check_header(DescriptorKind::Interface, bytes)?;

    Ok(InterfaceDescriptor {
        length: raw[0],
        descriptor_type: raw[1],
        interface_number: raw[2],
        alternate_setting: raw[3],
        num_endpoints: raw[4],
        interface_class: raw[5],
        interface_sub_class: raw[6],
        interface_protocol: raw[7],
        interface_index: raw[8],
    })
}

/// Decode a 7-byte (or 9-byte audio) endpoint descriptor
pub fn decode_endpoint(bytes: &[u8]) -> Result<EndpointDescriptor> {
    let raw = check_header(DescriptorKind::Endpoint, bytes)?;
    let (refresh, synch_address) = if raw.len() >= 9 {
        (raw[7], raw[8])
    } else {
        (0, 0)
    };

    Ok(EndpointDescriptor {
        length: raw[0],
        descriptor_type: raw[1],
        endpoint_address: raw[2],
        attributes: raw[3],
        max_packet_size: LittleEndian::read_u16(&raw[4..6]),
        interval: raw[6],
        refresh,
        synch_address,
    })
}

/// Validate the header and return exactly `bLength` bytes
fn check_header(kind: DescriptorKind, bytes: &[u8]) -> Result<&[u8]> {
    let minimum = kind.minimum_length();

    if bytes.len() < usize::from(minimum) {
        return Err(DescriptorError::TooShort {
            kind,
            needed: usize::from(minimum),
            available: bytes.len(),
        });
    }

    let declared = bytes[0];
    if declared < minimum {
        return Err(DescriptorError::BadLength {
            kind,
            declared,
            minimum,
        });
    }

    if usize::from(declared) > bytes.len() {
        return Err(DescriptorError::TooShort {
            kind,
            needed: usize::from(declared),
            available: bytes.len(),
        });
    }

    let found = bytes[1];
    if found != kind.descriptor_type() {
        return Err(DescriptorError::WrongType {
            kind,
            expected: kind.descriptor_type(),
            found,
        });
    }

    Ok(&bytes[..usize::from(declared)])
}
