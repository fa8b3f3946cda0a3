//! Hub ports
//!
//! A port is one attachment slot on a hub. It holds at most one device and
//! keeps a non-owning reference back to the hub it belongs to. Ports only
//! change state through their [`PortSet`](crate::PortSet); the `Port`
//! values handed out by accessors are snapshots.

use crate::device::{DeviceNode, ParentLink};
use common::{Error, Result};
use std::fmt;
use std::sync::{Arc, Weak};

/// 1-based port number, stable for the lifetime of the port
pub type PortNumber = u16;

#[derive(Clone)]
pub struct Port {
    number: PortNumber,
    hub: Weak<DeviceNode>,
    device: Option<Arc<DeviceNode>>,
}

impl Port {
    pub(crate) fn new(number: PortNumber, hub: Weak<DeviceNode>) -> Self {
        Self {
            number,
            hub,
            device: None,
        }
    }

    pub fn number(&self) -> PortNumber {
        self.number
    }

    /// The hub owning this port, if it is still alive
    pub fn hub(&self) -> Option<Arc<DeviceNode>> {
        self.hub.upgrade()
    }

    pub fn device(&self) -> Option<&Arc<DeviceNode>> {
        self.device.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.device.is_some()
    }

    /// Attach `device` and point its parent link at this port
    pub(crate) fn connect(&mut self, device: Arc<DeviceNode>) -> Result<()> {
        if self.device.is_some() {
            return Err(Error::PortOccupied { port: self.number });
        }
        if device.parent_link().is_some() {
            return Err(Error::AlreadyAttached {
                device: device.label(),
            });
        }

        device.set_parent(Some(ParentLink {
            hub: self.hub.clone(),
            port: self.number,
        }));
        self.device = Some(device);
        Ok(())
    }

    /// Detach and return the current device; no-op on an empty port
    pub(crate) fn disconnect(&mut self) -> Option<Arc<DeviceNode>> {
        let device = self.device.take()?;
        device.set_parent(None);
        Some(device)
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("number", &self.number)
            .field("device", &self.device.as_ref().map(|d| d.label()))
            .finish()
    }
}
