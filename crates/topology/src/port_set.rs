//! Ordered port collection of one hub
//!
//! Ports are numbered 1..=N with no gaps. They are never removed: a freed
//! port is reused by the next device that connects (first fit, lowest
//! number first), and a new port is appended only when every existing port
//! is occupied. All operations are serialized by a lock private to this
//! set, so two hubs never contend with each other.

use crate::device::DeviceNode;
use crate::port::{Port, PortNumber};
use common::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

pub struct PortSet {
    hub: Weak<DeviceNode>,
    ports: Mutex<Vec<Port>>,
}

impl PortSet {
    pub(crate) fn new(hub: Weak<DeviceNode>) -> Self {
        Self {
            hub,
            ports: Mutex::new(Vec::new()),
        }
    }

    /// Attach `device` to the first free port, growing the set if needed
    pub fn connect(&self, device: Arc<DeviceNode>) -> Result<PortNumber> {
        if device.parent_link().is_some() {
            return Err(Error::AlreadyAttached {
                device: device.label(),
            });
        }

        let mut ports = self.lock();
        let index = match ports.iter().position(|port| !port.is_occupied()) {
            Some(index) => index,
            None => {
                let number =
                    PortNumber::try_from(ports.len() + 1).map_err(|_| Error::PortsExhausted)?;
                ports.push(Port::new(number, self.hub.clone()));
                debug!("Allocated port {}", number);
                ports.len() - 1
            }
        };

        let port = &mut ports[index];
        port.connect(device)?;
        Ok(port.number())
    }

    /// Free the port holding `device`
    ///
    /// Returns the freed port number, or `None` when the device is not
    /// attached here; repeated or stale detach requests are harmless.
    pub fn disconnect(&self, device: &Arc<DeviceNode>) -> Option<PortNumber> {
        let mut ports = self.lock();
        let port = ports
            .iter_mut()
            .find(|port| port.device().is_some_and(|d| Arc::ptr_eq(d, device)))?;
        port.disconnect();
        Some(port.number())
    }

    /// Snapshot of every port, in port-number order
    pub fn ports(&self) -> Vec<Port> {
        self.lock().clone()
    }

    pub fn port(&self, number: PortNumber) -> Option<Port> {
        let index = usize::from(number).checked_sub(1)?;
        self.lock().get(index).cloned()
    }

    /// Snapshot of the attached devices, in port-number order
    pub fn attached_devices(&self) -> Vec<Arc<DeviceNode>> {
        self.lock()
            .iter()
            .filter_map(|port| port.device().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn free_ports(&self) -> usize {
        self.lock().iter().filter(|port| !port.is_occupied()).count()
    }

    // Port state is updated in single assignments, so a poisoned lock still
    // guards a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<Port>> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_mock_device, create_mock_hub};

    #[test]
    fn test_first_connect_allocates_port_one() {
        let hub = create_mock_hub(1);
        assert_eq!(hub.port_count(), 0);

        let number = hub.connect_device(create_mock_device(2)).unwrap();
        assert_eq!(number, 1);
        assert_eq!(hub.port_count(), 1);
        assert!(hub.ports()[0].is_occupied());
    }

    #[test]
    fn test_second_connect_appends() {
        let hub = create_mock_hub(1);
        let a = create_mock_device(2);
        let b = create_mock_device(3);

        assert_eq!(hub.connect_device(a.clone()).unwrap(), 1);
        assert_eq!(hub.connect_device(b.clone()).unwrap(), 2);

        let ports = hub.ports();
        assert_eq!(ports.len(), 2);
        assert!(Arc::ptr_eq(ports[0].device().unwrap(), &a));
        assert!(Arc::ptr_eq(ports[1].device().unwrap(), &b));
    }

    #[test]
    fn test_freed_port_is_reused() {
        let hub = create_mock_hub(1);
        let a = create_mock_device(2);
        let b = create_mock_device(3);
        let c = create_mock_device(4);
        hub.connect_device(a.clone()).unwrap();
        hub.connect_device(b.clone()).unwrap();

        assert_eq!(hub.disconnect_device(&a), Some(1));
        assert_eq!(hub.connect_device(c.clone()).unwrap(), 1);
        assert_eq!(hub.port_count(), 2);
        assert_eq!(c.port_number(), Some(1));
    }

    #[test]
    fn test_lowest_free_port_wins() {
        let hub = create_mock_hub(1);
        let devices: Vec<_> = (2..6).map(create_mock_device).collect();
        for device in &devices {
            hub.connect_device(device.clone()).unwrap();
        }

        hub.disconnect_device(&devices[3]);
        hub.disconnect_device(&devices[1]);
        assert_eq!(hub.connect_device(create_mock_device(9)).unwrap(), 2);
        assert_eq!(hub.connect_device(create_mock_device(10)).unwrap(), 4);
        assert_eq!(hub.connect_device(create_mock_device(11)).unwrap(), 5);
    }

    #[test]
    fn test_disconnect_absent_device_is_noop() {
        let hub = create_mock_hub(1);
        let attached = create_mock_device(2);
        hub.connect_device(attached.clone()).unwrap();

        assert_eq!(hub.disconnect_device(&create_mock_device(3)), None);
        assert_eq!(hub.disconnect_device(&attached), Some(1));
        assert_eq!(hub.disconnect_device(&attached), None);
        assert_eq!(hub.port_count(), 1);
    }

    #[test]
    fn test_snapshot_survives_disconnect() {
        let hub = create_mock_hub(1);
        let device = create_mock_device(2);
        hub.connect_device(device.clone()).unwrap();

        let snapshot = hub.attached_devices();
        hub.disconnect_device(&device);

        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &device));
        assert!(hub.attached_devices().is_empty());
    }

    #[test]
    fn test_port_lookup() {
        let hub = create_mock_hub(1);
        hub.connect_device(create_mock_device(2)).unwrap();
        assert!(hub.port(1).is_some());
        assert!(hub.port(0).is_none());
        assert!(hub.port(2).is_none());
    }
}
