//! Device identity and enumeration records shared by the core and its callers

use serde::Serialize;
use std::fmt;

/// Identity of a physical device as reported by the transport
///
/// Bus number plus the address assigned on that bus. Opaque to the
/// topology beyond equality and hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceIdentity {
    pub bus: u8,
    pub address: u8,
}

impl DeviceIdentity {
    pub const fn new(bus: u8, address: u8) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus, self.address)
    }
}

/// One entry of a flat bus enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumeratedDevice {
    pub identity: DeviceIdentity,
    /// Upstream hub, `None` for devices directly below the root hub
    pub parent: Option<DeviceIdentity>,
    /// Physical port on the parent as reported by the transport, if known
    pub port_number: Option<u8>,
}

impl EnumeratedDevice {
    pub fn new(identity: DeviceIdentity, parent: Option<DeviceIdentity>) -> Self {
        Self {
            identity,
            parent,
            port_number: None,
        }
    }
}
