//! Device nodes
//!
//! A [`DeviceNode`] is one device in the topology tree: its decoded device
//! descriptor, its parsed configurations and, for hubs, the [`PortSet`]
//! of downstream ports. Ownership flows downward (hub -> port set -> port
//! -> device); the link from a device back to its parent port is a `Weak`
//! reference that is never used to keep the hub alive.

use crate::events::DeviceListener;
use crate::port::{Port, PortNumber};
use crate::port_set::PortSet;
use common::{DeviceIdentity, DispatchReport, Error, EventNotifier, Result};
use descriptor::{Configuration, DescriptorError, DeviceDescriptor, class_name};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// String descriptors cached at construction time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStrings {
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

/// Where a device is plugged in
#[derive(Debug, Clone)]
pub(crate) struct ParentLink {
    pub(crate) hub: Weak<DeviceNode>,
    pub(crate) port: PortNumber,
}

pub struct DeviceNode {
    /// `None` only for the root hub
    identity: Option<DeviceIdentity>,
    descriptor: DeviceDescriptor,
    configurations: Vec<Configuration>,
    strings: DeviceStrings,
    parent: Mutex<Option<ParentLink>>,
    /// Present exactly when the device class is hub
    ports: Option<PortSet>,
    listeners: EventNotifier<dyn DeviceListener>,
}

impl DeviceNode {
    /// Create a node for a physical device
    ///
    /// Hubs must come with at least one configuration; anything else is a
    /// malformed descriptor set and no node is created.
    pub fn new(
        identity: DeviceIdentity,
        descriptor: DeviceDescriptor,
        configurations: Vec<Configuration>,
        strings: DeviceStrings,
    ) -> Result<Arc<Self>> {
        if descriptor.is_hub() && configurations.is_empty() {
            return Err(DescriptorError::NoConfiguration.into());
        }
        Ok(Self::build(
            Some(identity),
            descriptor,
            configurations,
            strings,
        ))
    }

    pub(crate) fn build(
        identity: Option<DeviceIdentity>,
        descriptor: DeviceDescriptor,
        configurations: Vec<Configuration>,
        strings: DeviceStrings,
    ) -> Arc<Self> {
        let is_hub = descriptor.is_hub();
        Arc::new_cyclic(|me| Self {
            identity,
            descriptor,
            configurations,
            strings,
            parent: Mutex::new(None),
            ports: is_hub.then(|| PortSet::new(me.clone())),
            listeners: EventNotifier::new("device listeners"),
        })
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Look up a configuration by its `bConfigurationValue`
    pub fn configuration(&self, value: u8) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.value() == value)
    }

    pub fn strings(&self) -> &DeviceStrings {
        &self.strings
    }

    pub fn is_hub(&self) -> bool {
        self.ports.is_some()
    }

    pub fn is_root_hub(&self) -> bool {
        self.identity.is_none()
    }

    /// Short human-readable label for logs
    pub fn label(&self) -> String {
        match self.identity {
            Some(identity) => format!(
                "{} {:04x}:{:04x} ({})",
                identity,
                self.descriptor.vendor_id,
                self.descriptor.product_id,
                class_name(self.descriptor.device_class)
            ),
            None => "root hub".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Parent port
    // ------------------------------------------------------------------

    pub(crate) fn parent_link(&self) -> Option<ParentLink> {
        self.lock_parent().clone()
    }

    pub(crate) fn set_parent(&self, link: Option<ParentLink>) {
        *self.lock_parent() = link;
    }

    /// The hub and port this device is attached to
    pub fn parent_port(&self) -> Option<(Arc<DeviceNode>, PortNumber)> {
        let link = self.parent_link()?;
        Some((link.hub.upgrade()?, link.port))
    }

    pub fn parent_hub(&self) -> Option<Arc<DeviceNode>> {
        self.parent_port().map(|(hub, _)| hub)
    }

    pub fn port_number(&self) -> Option<PortNumber> {
        self.parent_link().map(|link| link.port)
    }

    pub fn is_attached(&self) -> bool {
        self.parent_link().is_some()
    }

    // ------------------------------------------------------------------
    // Hub operations
    // ------------------------------------------------------------------

    pub fn port_set(&self) -> Option<&PortSet> {
        self.ports.as_ref()
    }

    /// Snapshot of the downstream ports; empty for non-hubs
    pub fn ports(&self) -> Vec<Port> {
        self.ports.as_ref().map(PortSet::ports).unwrap_or_default()
    }

    pub fn port(&self, number: PortNumber) -> Option<Port> {
        self.ports.as_ref()?.port(number)
    }

    pub fn port_count(&self) -> usize {
        self.ports.as_ref().map_or(0, PortSet::len)
    }

    /// Snapshot of the devices on this hub's ports
    ///
    /// The returned list is a copy; later attach or detach operations do
    /// not change it.
    pub fn attached_devices(&self) -> Vec<Arc<DeviceNode>> {
        self.ports
            .as_ref()
            .map(PortSet::attached_devices)
            .unwrap_or_default()
    }

    pub fn connect_device(&self, device: Arc<DeviceNode>) -> Result<PortNumber> {
        self.ports.as_ref().ok_or(Error::NotAHub)?.connect(device)
    }

    pub fn disconnect_device(&self, device: &Arc<DeviceNode>) -> Option<PortNumber> {
        self.ports.as_ref()?.disconnect(device)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn DeviceListener>) -> Result<()> {
        self.listeners.register(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DeviceListener>) -> Result<()> {
        self.listeners.unregister(listener)
    }

    pub(crate) fn notify_detached(&self) -> DispatchReport {
        self.listeners
            .dispatch("device detached", |listener| listener.device_detached(self))
    }

    fn lock_parent(&self) -> MutexGuard<'_, Option<ParentLink>> {
        self.parent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DeviceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceNode")
            .field("identity", &self.identity)
            .field("vendor_id", &format_args!("{:#06x}", self.descriptor.vendor_id))
            .field("product_id", &format_args!("{:#06x}", self.descriptor.product_id))
            .field("hub", &self.is_hub())
            .field("port", &self.port_number())
            .finish()
    }
}
