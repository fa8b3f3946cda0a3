//! Topology events and listener traits
//!
//! Every listener method has a no-op default, so implementors only
//! override the events they care about. Returning an error (or panicking)
//! is reported by the notifier and never reaches the topology.

use crate::device::DeviceNode;
use crate::port::PortNumber;
use common::{DeviceIdentity, Error};
use std::sync::Arc;

/// A device was attached to, or detached from, a hub port
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub device: Arc<DeviceNode>,
    pub hub: Arc<DeviceNode>,
    pub port: PortNumber,
}

/// A device could not be placed into the topology
#[derive(Debug)]
pub struct ErrorEvent<'a> {
    /// Affected device, when the failure can be tied to one
    pub identity: Option<DeviceIdentity>,
    pub error: &'a Error,
}

/// Observer of topology-wide changes
pub trait TopologyListener: Send + Sync {
    fn device_attached(&self, _event: &DeviceEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn device_detached(&self, _event: &DeviceEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn error_occurred(&self, _event: &ErrorEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Observer of a single device
pub trait DeviceListener: Send + Sync {
    /// The device has left the topology
    fn device_detached(&self, _device: &DeviceNode) -> anyhow::Result<()> {
        Ok(())
    }
}
