//! Descriptor value objects
//!
//! Immutable mirrors of the fixed-layout standard descriptors defined in
//! chapter 9 of the USB 2.0 specification (with the USB 3.x additions that
//! libusb exposes). Multi-byte fields are little-endian on the wire and are
//! always treated as unsigned.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use std::fmt;

/// `bDeviceClass` / `bInterfaceClass` value for hubs
pub const CLASS_HUB: u8 = 0x09;

/// The standard descriptor kinds understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DescriptorKind {
    Device,
    Configuration,
    Interface,
    Endpoint,
}

impl DescriptorKind {
    /// Value stored in `bDescriptorType` for this kind
    pub const fn descriptor_type(self) -> u8 {
        match self {
            Self::Device => 0x01,
            Self::Configuration => 0x02,
            Self::Interface => 0x04,
            Self::Endpoint => 0x05,
        }
    }

    /// Size of the fixed layout, the smallest legal `bLength`
    pub const fn minimum_length(self) -> u8 {
        match self {
            Self::Device => 18,
            Self::Configuration => 9,
            Self::Interface => 9,
            Self::Endpoint => 7,
        }
    }

    /// Map a `bDescriptorType` byte back to a kind
    pub fn from_type(descriptor_type: u8) -> Option<Self> {
        match descriptor_type {
            0x01 => Some(Self::Device),
            0x02 => Some(Self::Configuration),
            0x04 => Some(Self::Interface),
            0x05 => Some(Self::Endpoint),
            _ => None,
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::Configuration => "configuration",
            Self::Interface => "interface",
            Self::Endpoint => "endpoint",
        };
        f.write_str(name)
    }
}

/// Capability shared by every descriptor: the two header bytes
pub trait UsbDescriptor {
    /// `bLength`: total size of the raw record in bytes
    fn length(&self) -> u8;

    /// `bDescriptorType`: discriminator byte
    fn descriptor_type(&self) -> u8;
}

/// Standard device descriptor (18 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    /// `bcdUSB`
    pub bcd_usb: u16,
    pub device_class: u8,
    pub device_sub_class: u8,
    pub device_protocol: u8,
    /// `bMaxPacketSize0`
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// `bcdDevice`
    pub bcd_device: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_number_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Whether the device class marks this device as a hub
    pub fn is_hub(&self) -> bool {
        self.device_class == CLASS_HUB
    }

    /// Canonical little-endian encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; 18];
        bytes[0] = self.length;
        bytes[1] = self.descriptor_type;
        LittleEndian::write_u16(&mut bytes[2..4], self.bcd_usb);
        bytes[4] = self.device_class;
        bytes[5] = self.device_sub_class;
        bytes[6] = self.device_protocol;
        bytes[7] = self.max_packet_size0;
        LittleEndian::write_u16(&mut bytes[8..10], self.vendor_id);
        LittleEndian::write_u16(&mut bytes[10..12], self.product_id);
        LittleEndian::write_u16(&mut bytes[12..14], self.bcd_device);
        bytes[14] = self.manufacturer_index;
        bytes[15] = self.product_index;
        bytes[16] = self.serial_number_index;
        bytes[17] = self.num_configurations;
        pad_to_length(bytes, self.length)
    }
}

impl UsbDescriptor for DeviceDescriptor {
    fn length(&self) -> u8 {
        self.length
    }

    fn descriptor_type(&self) -> u8 {
        self.descriptor_type
    }
}

/// Standard configuration descriptor header (9 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConfigurationDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    /// `wTotalLength`: size of the whole configuration bundle
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    /// `iConfiguration`
    pub configuration_index: u8,
    /// `bmAttributes`
    pub attributes: u8,
    /// `bMaxPower`, in 2mA units
    pub max_power: u8,
}

impl ConfigurationDescriptor {
    pub fn self_powered(&self) -> bool {
        self.attributes & 0x40 != 0
    }

    pub fn remote_wakeup(&self) -> bool {
        self.attributes & 0x20 != 0
    }

    /// Maximum bus power draw in milliamps
    pub fn max_power_ma(&self) -> u16 {
        u16::from(self.max_power) * 2
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; 9];
        bytes[0] = self.length;
        bytes[1] = self.descriptor_type;
        LittleEndian::write_u16(&mut bytes[2..4], self.total_length);
        bytes[4] = self.num_interfaces;
        bytes[5] = self.configuration_value;
        bytes[6] = self.configuration_index;
        bytes[7] = self.attributes;
        bytes[8] = self.max_power;
        pad_to_length(bytes, self.length)
    }
}

impl UsbDescriptor for ConfigurationDescriptor {
    fn length(&self) -> u8 {
        self.length
    }

    fn descriptor_type(&self) -> u8 {
        self.descriptor_type
    }
}

/// Standard interface descriptor (9 bytes), one per alternate setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InterfaceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_sub_class: u8,
    pub interface_protocol: u8,
    /// `iInterface`
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    pub fn to_bytes(&self) -> Vec<u8> {
        let bytes = vec![
            self.length,
            self.descriptor_type,
            self.interface_number,
            self.alternate_setting,
            self.num_endpoints,
            self.interface_class,
            self.interface_sub_class,
            self.interface_protocol,
            self.interface_index,
        ];
        pad_to_length(bytes, self.length)
    }
}

impl UsbDescriptor for InterfaceDescriptor {
    fn length(&self) -> u8 {
        self.length
    }

    fn descriptor_type(&self) -> u8 {
        self.descriptor_type
    }
}

/// Endpoint transfer direction, from bit 7 of `bEndpointAddress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    In,
    Out,
}

/// Endpoint transfer type, bits 0..1 of `bmAttributes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Isochronous synchronisation type, bits 2..3 of `bmAttributes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyncType {
    NoSync,
    Asynchronous,
    Adaptive,
    Synchronous,
}

/// Isochronous usage type, bits 4..5 of `bmAttributes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UsageType {
    Data,
    Feedback,
    ImplicitFeedback,
    Reserved,
}

/// Standard endpoint descriptor (7 bytes, 9 for audio-class endpoints)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub endpoint_address: u8,
    /// `bmAttributes`
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
    /// `bRefresh`, zero unless `bLength >= 9`
    pub refresh: u8,
    /// `bSynchAddress`, zero unless `bLength >= 9`
    pub synch_address: u8,
}

impl EndpointDescriptor {
    /// Endpoint number without the direction bit
    pub fn number(&self) -> u8 {
        self.endpoint_address & 0x0f
    }

    pub fn direction(&self) -> Direction {
        if self.endpoint_address & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn transfer_type(&self) -> TransferType {
        match self.attributes & 0x03 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }

    pub fn sync_type(&self) -> SyncType {
        match (self.attributes >> 2) & 0x03 {
            0 => SyncType::NoSync,
            1 => SyncType::Asynchronous,
            2 => SyncType::Adaptive,
            _ => SyncType::Synchronous,
        }
    }

    pub fn usage_type(&self) -> UsageType {
        match (self.attributes >> 4) & 0x03 {
            0 => UsageType::Data,
            1 => UsageType::Feedback,
            2 => UsageType::ImplicitFeedback,
            _ => UsageType::Reserved,
        }
    }

    /// Packet size in bytes, bits 0..10 of `wMaxPacketSize`
    pub fn packet_size(&self) -> u16 {
        self.max_packet_size & 0x07ff
    }

    /// Transactions per microframe for high-bandwidth endpoints (1..=3)
    pub fn transactions_per_microframe(&self) -> u8 {
        ((self.max_packet_size >> 11) & 0x03) as u8 + 1
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; 7];
        bytes[0] = self.length;
        bytes[1] = self.descriptor_type;
        bytes[2] = self.endpoint_address;
        bytes[3] = self.attributes;
        LittleEndian::write_u16(&mut bytes[4..6], self.max_packet_size);
        bytes[6] = self.interval;
        if self.length >= 9 {
            bytes.push(self.refresh);
            bytes.push(self.synch_address);
        }
        pad_to_length(bytes, self.length)
    }
}

impl UsbDescriptor for EndpointDescriptor {
    fn length(&self) -> u8 {
        self.length
    }

    fn descriptor_type(&self) -> u8 {
        self.descriptor_type
    }
}

/// Any of the standard descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Descriptor {
    Device(DeviceDescriptor),
    Configuration(ConfigurationDescriptor),
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
}

impl Descriptor {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Device(_) => DescriptorKind::Device,
            Self::Configuration(_) => DescriptorKind::Configuration,
            Self::Interface(_) => DescriptorKind::Interface,
            Self::Endpoint(_) => DescriptorKind::Endpoint,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Device(d) => d.to_bytes(),
            Self::Configuration(d) => d.to_bytes(),
            Self::Interface(d) => d.to_bytes(),
            Self::Endpoint(d) => d.to_bytes(),
        }
    }
}

impl UsbDescriptor for Descriptor {
    fn length(&self) -> u8 {
        match self {
            Self::Device(d) => d.length,
            Self::Configuration(d) => d.length,
            Self::Interface(d) => d.length,
            Self::Endpoint(d) => d.length,
        }
    }

    fn descriptor_type(&self) -> u8 {
        match self {
            Self::Device(d) => d.descriptor_type,
            Self::Configuration(d) => d.descriptor_type,
            Self::Interface(d) => d.descriptor_type,
            Self::Endpoint(d) => d.descriptor_type,
        }
    }
}

// Trailing bytes beyond the fixed layout are not modelled; emit zeros so the
// encoding still honours bLength.
fn pad_to_length(mut bytes: Vec<u8>, length: u8) -> Vec<u8> {
    if usize::from(length) > bytes.len() {
        bytes.resize(usize::from(length), 0);
    }
    bytes
}
