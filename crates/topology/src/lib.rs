//! USB device topology
//!
//! Models the bus as a tree rooted at a virtual root hub: hubs own ordered
//! port sets, ports hold at most one device, and every device keeps a
//! non-owning link to the port it sits on. The [`TopologyManager`] keeps
//! the tree in sync with flat enumerations coming from a [`Transport`].
//!
//! # Example
//!
//! ```
//! use common::DeviceIdentity;
//! use topology::TopologyManager;
//! use topology::test_utils::{MockDevice, MockTransport};
//!
//! let a = DeviceIdentity::new(1, 2);
//! let manager = TopologyManager::new(MockTransport::new(vec![MockDevice::hub(a, None)]));
//! manager.rescan_transport().unwrap();
//!
//! let root = manager.root_hub();
//! assert_eq!(root.port_count(), 1);
//! assert_eq!(root.attached_devices()[0].identity(), Some(a));
//! ```

pub mod device;
pub mod events;
pub mod libusb;
pub mod manager;
pub mod port;
pub mod port_set;
pub mod root_hub;
pub mod snapshot;
pub mod test_utils;
pub mod transport;

pub use device::{DeviceNode, DeviceStrings};
pub use events::{DeviceEvent, DeviceListener, ErrorEvent, TopologyListener};
pub use libusb::{LibUsbHandle, LibUsbTransport};
pub use manager::{RescanReport, TopologyManager};
pub use port::{Port, PortNumber};
pub use port_set::PortSet;
pub use root_hub::create_root_hub;
pub use snapshot::TreeSnapshot;
pub use transport::{OpenHandle, Transport};
