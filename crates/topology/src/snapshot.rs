//! Serializable copy of the topology tree

use crate::device::{DeviceNode, DeviceStrings};
use crate::port::PortNumber;
use common::DeviceIdentity;
use descriptor::{class_name, format_bcd};
use serde::Serialize;

/// One node of a captured tree, with its children in port order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    /// `None` for the root hub
    pub identity: Option<DeviceIdentity>,
    /// Port on the parent hub
    pub port: Option<PortNumber>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub usb_version: String,
    pub class: u8,
    pub class_name: &'static str,
    #[serde(flatten)]
    pub strings: DeviceStrings,
    pub hub: bool,
    /// Ports allocated so far; only meaningful for hubs
    pub port_count: usize,
    pub children: Vec<TreeSnapshot>,
}

impl TreeSnapshot {
    /// Capture `node` and everything below it
    ///
    /// Each hub's children are copied under that hub's port lock, so every
    /// level is a consistent view even while a rescan is running.
    pub fn capture(node: &DeviceNode) -> Self {
        let descriptor = node.descriptor();
        Self {
            identity: node.identity(),
            port: node.port_number(),
            vendor_id: descriptor.vendor_id,
            product_id: descriptor.product_id,
            usb_version: format_bcd(descriptor.bcd_usb),
            class: descriptor.device_class,
            class_name: class_name(descriptor.device_class),
            strings: node.strings().clone(),
            hub: node.is_hub(),
            port_count: node.port_count(),
            children: node
                .attached_devices()
                .iter()
                .map(|child| Self::capture(child))
                .collect(),
        }
    }

    /// Number of devices below this node
    pub fn device_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.device_count())
            .sum()
    }
}
