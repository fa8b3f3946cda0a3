//! Configuration bundle parsing
//!
//! A `GET_DESCRIPTOR(CONFIGURATION)` request returns `wTotalLength` bytes:
//! the configuration header followed by every interface, endpoint and
//! class-specific descriptor of that configuration, back to back.
//! Class-specific records are kept verbatim in the `extra` bytes of the
//! entity they follow, the same way libusb exposes them.

use crate::codec::{decode_configuration, decode_endpoint, decode_interface};
use crate::error::{DescriptorError, Result};
use crate::types::{ConfigurationDescriptor, DescriptorKind, EndpointDescriptor, InterfaceDescriptor};
use serde::Serialize;

/// An endpoint and any class-specific descriptors that follow it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub descriptor: EndpointDescriptor,
    pub extra: Vec<u8>,
}

/// One alternate setting of an interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Interface {
    pub descriptor: InterfaceDescriptor,
    pub endpoints: Vec<Endpoint>,
    pub extra: Vec<u8>,
}

impl Interface {
    pub fn number(&self) -> u8 {
        self.descriptor.interface_number
    }

    pub fn alternate_setting(&self) -> u8 {
        self.descriptor.alternate_setting
    }
}

/// A fully parsed configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Configuration {
    pub descriptor: ConfigurationDescriptor,
    /// Every alternate setting, in wire order
    pub interfaces: Vec<Interface>,
    /// Class-specific bytes between the header and the first interface
    pub extra: Vec<u8>,
}

impl Configuration {
    pub fn value(&self) -> u8 {
        self.descriptor.configuration_value
    }

    /// Distinct interface numbers, in first-seen order
    pub fn interface_numbers(&self) -> Vec<u8> {
        let mut numbers: Vec<u8> = Vec::new();
        for interface in &self.interfaces {
            if !numbers.contains(&interface.number()) {
                numbers.push(interface.number());
            }
        }
        numbers
    }

    /// All alternate settings for one interface number
    pub fn alternate_settings(&self, number: u8) -> Vec<&Interface> {
        self.interfaces
            .iter()
            .filter(|interface| interface.number() == number)
            .collect()
    }

    /// Re-encode the bundle; `wTotalLength` is recomputed
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = self.extra.clone();
        for interface in &self.interfaces {
            body.extend_from_slice(&interface.descriptor.to_bytes());
            body.extend_from_slice(&interface.extra);
            for endpoint in &interface.endpoints {
                body.extend_from_slice(&endpoint.descriptor.to_bytes());
                body.extend_from_slice(&endpoint.extra);
            }
        }

        let mut header = self.descriptor;
        let total = usize::from(header.length) + body.len();
        header.total_length = u16::try_from(total).unwrap_or(u16::MAX);

        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&body);
        bytes
    }
}

/// Parse a complete configuration bundle
///
/// Fails when the buffer is shorter than `wTotalLength`, when a nested
/// record has `bLength < 2` or runs past the bundle, when an endpoint
/// appears before any interface, or when any standard record fails to
/// decode.
pub fn parse_configuration(bytes: &[u8]) -> Result<Configuration> {
    let descriptor = decode_configuration(bytes)?;
    let header_len = usize::from(descriptor.length);
    let total = usize::from(descriptor.total_length);

    if total < header_len {
        return Err(DescriptorError::BadLength {
            kind: DescriptorKind::Configuration,
            declared: descriptor.total_length as u8,
            minimum: descriptor.length,
        });
    }
    if bytes.len() < total {
        return Err(DescriptorError::TooShort {
            kind: DescriptorKind::Configuration,
            needed: total,
            available: bytes.len(),
        });
    }

    let mut configuration = Configuration {
        descriptor,
        interfaces: Vec::new(),
        extra: Vec::new(),
    };

    let mut offset = header_len;
    while offset < total {
        let remaining = &bytes[offset..total];
        if remaining.len() < 2 {
            return Err(DescriptorError::TooShort {
                kind: DescriptorKind::Configuration,
                needed: offset + 2,
                available: total,
            });
        }

        let length = remaining[0];
        if length < 2 {
            return Err(DescriptorError::BadLength {
                kind: DescriptorKind::Configuration,
                declared: length,
                minimum: 2,
            });
        }
        if usize::from(length) > remaining.len() {
            return Err(DescriptorError::TooShort {
                kind: DescriptorKind::Configuration,
                needed: offset + usize::from(length),
                available: total,
            });
        }

        let record = &remaining[..usize::from(length)];
        match DescriptorKind::from_type(record[1]) {
            Some(DescriptorKind::Interface) => {
                configuration.interfaces.push(Interface {
                    descriptor: decode_interface(record)?,
                    endpoints: Vec::new(),
                    extra: Vec::new(),
                });
            }
            Some(DescriptorKind::Endpoint) => {
                let endpoint = Endpoint {
                    descriptor: decode_endpoint(record)?,
                    extra: Vec::new(),
                };
                match configuration.interfaces.last_mut() {
                    Some(interface) => interface.endpoints.push(endpoint),
                    None => {
                        return Err(DescriptorError::WrongType {
                            kind: DescriptorKind::Interface,
                            expected: DescriptorKind::Interface.descriptor_type(),
                            found: record[1],
                        });
                    }
                }
            }
            _ => append_extra(&mut configuration, record),
        }

        offset += usize::from(length);
    }

    Ok(configuration)
}

fn append_extra(configuration: &mut Configuration, record: &[u8]) {
    match configuration.interfaces.last_mut() {
        Some(interface) => match interface.endpoints.last_mut() {
            Some(endpoint) => endpoint.extra.extend_from_slice(record),
            None => interface.extra.extend_from_slice(record),
        },
        None => configuration.extra.extend_from_slice(record),
    }
}
