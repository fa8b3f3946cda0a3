//! Test utilities for the topology crate
//!
//! Provides an in-memory [`MockTransport`] and raw descriptor builders
//! shared by the unit tests and the integration tests.
//!
//! # Example
//!
//! ```
//! use common::DeviceIdentity;
//! use topology::TopologyManager;
//! use topology::test_utils::{MockDevice, MockTransport};
//!
//! let hub = DeviceIdentity::new(1, 2);
//! let transport = MockTransport::new(vec![
//!     MockDevice::hub(hub, None),
//!     MockDevice::hid(DeviceIdentity::new(1, 3), Some(hub)),
//! ]);
//! let manager = TopologyManager::new(transport);
//! let report = manager.rescan_transport().unwrap();
//! assert_eq!(report.attached.len(), 2);
//! ```

use crate::device::{DeviceNode, DeviceStrings};
use crate::transport::Transport;
use common::{DeviceIdentity, EnumeratedDevice, Error, Result};
use descriptor::{CLASS_HUB, DescriptorKind, decode_device, parse_configuration};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const MOCK_HID_VENDOR_ID: u16 = 0x046d;
pub const MOCK_HID_PRODUCT_ID: u16 = 0xc077;
pub const MOCK_HUB_VENDOR_ID: u16 = 0x05e3;
pub const MOCK_HUB_PRODUCT_ID: u16 = 0x0608;

/// Build an 18-byte USB 2.0 device descriptor
///
/// # Arguments
/// * `class` - `bDeviceClass`
/// * `vendor_id` - USB Vendor ID
/// * `product_id` - USB Product ID
///
/// String indices are 1/2/3 and the device has one configuration.
pub fn device_descriptor_bytes(class: u8, vendor_id: u16, product_id: u16) -> Vec<u8> {
    let mut bytes = vec![18, 0x01, 0x00, 0x02, class, 0, 0, 64];
    bytes.extend_from_slice(&vendor_id.to_le_bytes());
    bytes.extend_from_slice(&product_id.to_le_bytes());
    bytes.extend_from_slice(&[0x00, 0x01, 1, 2, 3, 1]);
    bytes
}

/// Configuration bundle of a self-powered hub: one hub interface with its
/// status-change interrupt endpoint
pub fn hub_configuration_bytes() -> Vec<u8> {
    vec![
        9, 0x02, 25, 0, 1, 1, 0, 0xe0, 50, // configuration
        9, 0x04, 0, 0, 1, CLASS_HUB, 0, 0, 0, // interface
        7, 0x05, 0x81, 0x03, 1, 0, 12, // endpoint
    ]
}

/// Configuration bundle of a boot mouse, including the HID class
/// descriptor between the interface and its endpoint
pub fn hid_configuration_bytes() -> Vec<u8> {
    vec![
        9, 0x02, 34, 0, 1, 1, 0, 0xa0, 50, // configuration
        9, 0x04, 0, 0, 1, 0x03, 1, 2, 0, // interface
        9, 0x21, 0x11, 0x01, 0, 1, 0x22, 0x34, 0x00, // HID
        7, 0x05, 0x81, 0x03, 8, 0, 10, // endpoint
    ]
}

/// Create a standalone (unattached) HID device node
pub fn create_mock_device(address: u8) -> Arc<DeviceNode> {
    create_node(
        address,
        &device_descriptor_bytes(0x00, MOCK_HID_VENDOR_ID, MOCK_HID_PRODUCT_ID),
        &hid_configuration_bytes(),
    )
}

/// Create a standalone (unattached) hub node with no ports yet
pub fn create_mock_hub(address: u8) -> Arc<DeviceNode> {
    create_node(
        address,
        &device_descriptor_bytes(CLASS_HUB, MOCK_HUB_VENDOR_ID, MOCK_HUB_PRODUCT_ID),
        &hub_configuration_bytes(),
    )
}

fn create_node(address: u8, device: &[u8], configuration: &[u8]) -> Arc<DeviceNode> {
    let descriptor = decode_device(device).expect("mock device descriptor decodes");
    let configuration = parse_configuration(configuration).expect("mock configuration parses");
    DeviceNode::new(
        DeviceIdentity::new(1, address),
        descriptor,
        vec![configuration],
        DeviceStrings::default(),
    )
    .expect("mock device node builds")
}

/// A device as served by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub identity: DeviceIdentity,
    pub parent: Option<DeviceIdentity>,
    pub device_descriptor: Vec<u8>,
    /// Configuration bundles, by configuration index
    pub configurations: Vec<Vec<u8>>,
    pub strings: HashMap<u8, String>,
}

impl MockDevice {
    pub fn hid(identity: DeviceIdentity, parent: Option<DeviceIdentity>) -> Self {
        Self {
            identity,
            parent,
            device_descriptor: device_descriptor_bytes(
                0x00,
                MOCK_HID_VENDOR_ID,
                MOCK_HID_PRODUCT_ID,
            ),
            configurations: vec![hid_configuration_bytes()],
            strings: HashMap::from([
                (1, "Logitech".to_string()),
                (2, "USB Optical Mouse".to_string()),
            ]),
        }
    }

    pub fn hub(identity: DeviceIdentity, parent: Option<DeviceIdentity>) -> Self {
        Self {
            identity,
            parent,
            device_descriptor: device_descriptor_bytes(
                CLASS_HUB,
                MOCK_HUB_VENDOR_ID,
                MOCK_HUB_PRODUCT_ID,
            ),
            configurations: vec![hub_configuration_bytes()],
            strings: HashMap::from([(2, "USB2.0 Hub".to_string())]),
        }
    }

    /// Replace the raw device descriptor, e.g. with malformed bytes
    pub fn with_device_descriptor(mut self, bytes: Vec<u8>) -> Self {
        self.device_descriptor = bytes;
        self
    }

    pub fn with_configurations(mut self, configurations: Vec<Vec<u8>>) -> Self {
        self.configurations = configurations;
        self
    }
}

/// In-memory bus
///
/// Handles are the device identities themselves. Open and close calls are
/// counted so tests can check that every handle is released.
#[derive(Debug, Default)]
pub struct MockTransport {
    devices: Mutex<Vec<MockDevice>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MockTransport {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn plug(&self, device: MockDevice) {
        self.lock().push(device);
    }

    pub fn unplug(&self, identity: DeviceIdentity) {
        self.lock().retain(|device| device.identity != identity);
    }

    pub fn set_devices(&self, devices: Vec<MockDevice>) {
        *self.lock() = devices;
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MockDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&self, identity: DeviceIdentity) -> Result<MockDevice> {
        self.lock()
            .iter()
            .find(|device| device.identity == identity)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no such device {}", identity)))
    }
}

impl Transport for MockTransport {
    type Handle = DeviceIdentity;

    fn enumerate(&self) -> Result<Vec<EnumeratedDevice>> {
        Ok(self
            .lock()
            .iter()
            .map(|device| EnumeratedDevice::new(device.identity, device.parent))
            .collect())
    }

    fn open(&self, identity: DeviceIdentity) -> Result<Self::Handle> {
        self.find(identity)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(identity)
    }

    fn close(&self, _handle: Self::Handle) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn raw_descriptor(
        &self,
        handle: &Self::Handle,
        kind: DescriptorKind,
        index: u8,
    ) -> Result<Vec<u8>> {
        let device = self.find(*handle)?;
        match kind {
            DescriptorKind::Device => Ok(device.device_descriptor),
            DescriptorKind::Configuration => device
                .configurations
                .get(usize::from(index))
                .cloned()
                .ok_or_else(|| {
                    Error::Transport(format!("{} has no configuration {}", handle, index))
                }),
            other => Err(Error::Transport(format!(
                "{} descriptors are not directly readable",
                other
            ))),
        }
    }

    fn string_descriptor(&self, handle: &Self::Handle, index: u8) -> Result<String> {
        self.find(*handle)?
            .strings
            .get(&index)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("{} has no string {}", handle, index)))
    }
}
