//! USB descriptor codec
//!
//! This crate decodes the fixed-layout standard descriptors (device,
//! configuration, interface, endpoint) into immutable value objects, parses
//! whole configuration bundles, and renders fixed-column diagnostic dumps.
//!
//! # Example
//!
//! ```
//! use descriptor::{DescriptorKind, decode, format};
//!
//! let bytes = [
//!     18, 1, 0x00, 0x02, 3, 0, 0, 64, 0x34, 0x12, 0x78, 0x56, 0x00, 0x01, 1, 2, 3, 1,
//! ];
//! let device = decode(DescriptorKind::Device, &bytes).unwrap();
//! let dump = format(&device);
//! assert!(dump.contains("HID"));
//! assert!(dump.contains("2.00"));
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod names;
pub mod types;

pub use codec::{decode, decode_configuration, decode_device, decode_endpoint, decode_interface};
pub use config::{Configuration, Endpoint, Interface, parse_configuration};
pub use error::{DescriptorError, Result};
pub use format::{format, format_bcd, format_configuration, format_configuration_indented, format_device};
pub use names::{UNKNOWN, class_name};
pub use types::{
    CLASS_HUB, ConfigurationDescriptor, Descriptor, DescriptorKind, DeviceDescriptor, Direction,
    EndpointDescriptor, InterfaceDescriptor, SyncType, TransferType, UsageType, UsbDescriptor,
};
