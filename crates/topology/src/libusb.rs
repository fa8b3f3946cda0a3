//! libusb transport
//!
//! Enumerates the bus through rusb and reads raw descriptors with a
//! standard `GET_DESCRIPTOR` control request. Opening a device needs
//! write access to its device node, which unprivileged users usually lack;
//! in that case the descriptors libusb cached at enumeration time are
//! re-encoded instead.

use crate::transport::Transport;
use common::{DeviceIdentity, EnumeratedDevice, Error, Result};
use descriptor::{
    CLASS_HUB, Configuration, ConfigurationDescriptor, DescriptorKind, DeviceDescriptor, Endpoint,
    EndpointDescriptor, Interface, InterfaceDescriptor,
};
use rusb::{Context, Device, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Linux Foundation, used by the kernel's host-controller root hubs
const LINUX_FOUNDATION_VID: u16 = 0x1d6b;

const GET_DESCRIPTOR: u8 = 0x06;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

pub struct LibUsbTransport {
    context: Context,
    skip_root_hubs: bool,
    timeout: Duration,
}

/// An enumerated device, opened when permissions allow
pub struct LibUsbHandle {
    device: Device<Context>,
    handle: Option<DeviceHandle<Context>>,
}

impl LibUsbTransport {
    pub fn new() -> Result<Self> {
        let context = Context::new().map_err(transport_error)?;
        Ok(Self {
            context,
            skip_root_hubs: false,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Leave the host controllers' own root hubs out of the enumeration
    ///
    /// Devices below them then attach directly to the virtual root hub.
    pub fn with_skip_root_hubs(mut self, skip: bool) -> Self {
        self.skip_root_hubs = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_root_hub(device: &Device<Context>) -> bool {
        device
            .device_descriptor()
            .map(|d| d.vendor_id() == LINUX_FOUNDATION_VID && d.class_code() == CLASS_HUB)
            .unwrap_or(false)
    }

    fn find(&self, identity: DeviceIdentity) -> Result<Device<Context>> {
        let devices = self.context.devices().map_err(transport_error)?;
        devices
            .iter()
            .find(|d| d.bus_number() == identity.bus && d.address() == identity.address)
            .ok_or_else(|| Error::Transport(format!("device {} not found", identity)))
    }

    fn read_descriptor(
        &self,
        handle: &DeviceHandle<Context>,
        kind: DescriptorKind,
        index: u8,
    ) -> Result<Vec<u8>> {
        let value = (u16::from(kind.descriptor_type()) << 8) | u16::from(index);
        let read = |len: usize| -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; len];
            let n = handle
                .read_control(
                    rusb::request_type(Direction::In, RequestType::Standard, Recipient::Device),
                    GET_DESCRIPTOR,
                    value,
                    0,
                    &mut buffer,
                    self.timeout,
                )
                .map_err(transport_error)?;
            buffer.truncate(n);
            Ok(buffer)
        };

        match kind {
            DescriptorKind::Device => read(usize::from(kind.minimum_length())),
            DescriptorKind::Configuration => {
                // Header first, for wTotalLength
                let header = read(usize::from(kind.minimum_length()))?;
                if header.len() < 4 {
                    return Ok(header);
                }
                let total = u16::from_le_bytes([header[2], header[3]]);
                read(usize::from(total))
            }
            other => Err(unsupported(other)),
        }
    }

    fn cached_descriptor(
        &self,
        device: &Device<Context>,
        kind: DescriptorKind,
        index: u8,
    ) -> Result<Vec<u8>> {
        match kind {
            DescriptorKind::Device => {
                let cached = device.device_descriptor().map_err(transport_error)?;
                Ok(encode_device(&cached).to_bytes())
            }
            DescriptorKind::Configuration => {
                let cached = device.config_descriptor(index).map_err(transport_error)?;
                Ok(encode_configuration(&cached).to_bytes())
            }
            other => Err(unsupported(other)),
        }
    }
}

impl Transport for LibUsbTransport {
    type Handle = LibUsbHandle;

    fn enumerate(&self) -> Result<Vec<EnumeratedDevice>> {
        let devices = self.context.devices().map_err(transport_error)?;
        let mut enumeration = Vec::new();

        for device in devices.iter() {
            if self.skip_root_hubs && Self::is_root_hub(&device) {
                debug!(
                    "Skipping root hub: bus={}, addr={}",
                    device.bus_number(),
                    device.address()
                );
                continue;
            }

            let parent = device
                .get_parent()
                .filter(|parent| !(self.skip_root_hubs && Self::is_root_hub(parent)))
                .map(|parent| identity_of(&parent));

            enumeration.push(EnumeratedDevice {
                identity: identity_of(&device),
                parent,
                port_number: parent.map(|_| device.port_number()),
            });
        }

        debug!("Enumerated {} devices", enumeration.len());
        Ok(enumeration)
    }

    fn open(&self, identity: DeviceIdentity) -> Result<Self::Handle> {
        let device = self.find(identity)?;
        let handle = match device.open() {
            Ok(handle) => Some(handle),
            Err(e) => {
                debug!(
                    "Cannot open {} ({}), using cached descriptors",
                    identity, e
                );
                None
            }
        };
        Ok(LibUsbHandle { device, handle })
    }

    fn close(&self, handle: Self::Handle) {
        // libusb closes the device when the handle is dropped
        drop(handle);
    }

    fn raw_descriptor(
        &self,
        handle: &Self::Handle,
        kind: DescriptorKind,
        index: u8,
    ) -> Result<Vec<u8>> {
        if let Some(opened) = &handle.handle {
            match self.read_descriptor(opened, kind, index) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => warn!(
                    "GET_DESCRIPTOR({}) failed on {}: {}, using cached copy",
                    kind,
                    identity_of(&handle.device),
                    e
                ),
            }
        }
        self.cached_descriptor(&handle.device, kind, index)
    }

    fn string_descriptor(&self, handle: &Self::Handle, index: u8) -> Result<String> {
        let opened = handle.handle.as_ref().ok_or_else(|| {
            Error::Transport(format!("{} is not open", identity_of(&handle.device)))
        })?;
        opened
            .read_string_descriptor_ascii(index)
            .map_err(transport_error)
    }
}

fn identity_of(device: &Device<Context>) -> DeviceIdentity {
    DeviceIdentity::new(device.bus_number(), device.address())
}

fn transport_error(e: rusb::Error) -> Error {
    Error::Transport(e.to_string())
}

fn unsupported(kind: DescriptorKind) -> Error {
    Error::Transport(format!("{} descriptors are not directly readable", kind))
}

/// Back to the BCD form libusb parsed the version from
fn version_bcd(version: rusb::Version) -> u16 {
    let major = u16::from(version.major());
    ((major / 10) << 12)
        | ((major % 10) << 8)
        | (u16::from(version.minor()) << 4)
        | u16::from(version.sub_minor())
}

fn encode_device(cached: &rusb::DeviceDescriptor) -> DeviceDescriptor {
    DeviceDescriptor {
        length: DescriptorKind::Device.minimum_length(),
        descriptor_type: DescriptorKind::Device.descriptor_type(),
        bcd_usb: version_bcd(cached.usb_version()),
        device_class: cached.class_code(),
        device_sub_class: cached.sub_class_code(),
        device_protocol: cached.protocol_code(),
        max_packet_size0: cached.max_packet_size(),
        vendor_id: cached.vendor_id(),
        product_id: cached.product_id(),
        bcd_device: version_bcd(cached.device_version()),
        manufacturer_index: cached.manufacturer_string_index().unwrap_or(0),
        product_index: cached.product_string_index().unwrap_or(0),
        serial_number_index: cached.serial_number_string_index().unwrap_or(0),
        num_configurations: cached.num_configurations(),
    }
}

/// Rebuild a configuration from libusb's parse
///
/// Class-specific descriptors are not carried over; `to_bytes` recomputes
/// `wTotalLength` for what remains.
fn encode_configuration(cached: &rusb::ConfigDescriptor) -> Configuration {
    let mut attributes = 0x80;
    if cached.self_powered() {
        attributes |= 0x40;
    }
    if cached.remote_wakeup() {
        attributes |= 0x20;
    }

    let mut interfaces = Vec::new();
    for interface in cached.interfaces() {
        for setting in interface.descriptors() {
            let endpoints = setting
                .endpoint_descriptors()
                .map(|endpoint| Endpoint {
                    descriptor: encode_endpoint(&endpoint),
                    extra: Vec::new(),
                })
                .collect();
            interfaces.push(Interface {
                descriptor: InterfaceDescriptor {
                    length: DescriptorKind::Interface.minimum_length(),
                    descriptor_type: DescriptorKind::Interface.descriptor_type(),
                    interface_number: setting.interface_number(),
                    alternate_setting: setting.setting_number(),
                    num_endpoints: setting.num_endpoints(),
                    interface_class: setting.class_code(),
                    interface_sub_class: setting.sub_class_code(),
                    interface_protocol: setting.protocol_code(),
                    interface_index: setting.description_string_index().unwrap_or(0),
                },
                endpoints,
                extra: Vec::new(),
            });
        }
    }

    Configuration {
        descriptor: ConfigurationDescriptor {
            length: DescriptorKind::Configuration.minimum_length(),
            descriptor_type: DescriptorKind::Configuration.descriptor_type(),
            total_length: 0,
            num_interfaces: cached.num_interfaces(),
            configuration_value: cached.number(),
            configuration_index: cached.description_string_index().unwrap_or(0),
            attributes,
            max_power: u8::try_from(cached.max_power() / 2).unwrap_or(u8::MAX),
        },
        interfaces,
        extra: Vec::new(),
    }
}

fn encode_endpoint(cached: &rusb::EndpointDescriptor) -> EndpointDescriptor {
    let transfer = match cached.transfer_type() {
        rusb::TransferType::Control => 0,
        rusb::TransferType::Isochronous => 1,
        rusb::TransferType::Bulk => 2,
        rusb::TransferType::Interrupt => 3,
    };
    let sync = match cached.sync_type() {
        rusb::SyncType::NoSync => 0,
        rusb::SyncType::Asynchronous => 1,
        rusb::SyncType::Adaptive => 2,
        rusb::SyncType::Synchronous => 3,
    };
    let usage = match cached.usage_type() {
        rusb::UsageType::Data => 0,
        rusb::UsageType::Feedback => 1,
        rusb::UsageType::FeedbackData => 2,
        rusb::UsageType::Reserved => 3,
    };

    EndpointDescriptor {
        length: DescriptorKind::Endpoint.minimum_length(),
        descriptor_type: DescriptorKind::Endpoint.descriptor_type(),
        endpoint_address: cached.address(),
        attributes: transfer | (sync << 2) | (usage << 4),
        max_packet_size: cached.max_packet_size(),
        interval: cached.interval(),
        refresh: 0,
        synch_address: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_bcd() {
        assert_eq!(version_bcd(rusb::Version::from_bcd(0x0200)), 0x0200);
        assert_eq!(version_bcd(rusb::Version::from_bcd(0x0310)), 0x0310);
        assert_eq!(version_bcd(rusb::Version::from_bcd(0x1234)), 0x1234);
    }
}
