//! Transport seam
//!
//! The topology never talks to hardware directly. Everything it needs from
//! the bus (enumeration, raw descriptor bytes, string descriptors) comes
//! through a [`Transport`]. Handles are always acquired through
//! [`OpenHandle`], which closes them when dropped.

use common::{DeviceIdentity, EnumeratedDevice, Error, Result};
use descriptor::DescriptorKind;
use tracing::debug;

/// Access to a USB bus
pub trait Transport: Send + Sync {
    /// Per-device handle returned by [`Transport::open`]
    type Handle;

    /// Flat list of the devices currently present
    fn enumerate(&self) -> Result<Vec<EnumeratedDevice>>;

    fn open(&self, identity: DeviceIdentity) -> Result<Self::Handle>;

    fn close(&self, handle: Self::Handle);

    /// Raw bytes of a standard descriptor
    ///
    /// For [`DescriptorKind::Configuration`] this is the whole bundle of
    /// `wTotalLength` bytes; `index` selects the configuration.
    fn raw_descriptor(
        &self,
        handle: &Self::Handle,
        kind: DescriptorKind,
        index: u8,
    ) -> Result<Vec<u8>>;

    /// ASCII rendering of a string descriptor
    fn string_descriptor(&self, handle: &Self::Handle, index: u8) -> Result<String>;
}

/// A transport handle that is closed on drop
pub struct OpenHandle<'a, T: Transport + ?Sized> {
    transport: &'a T,
    identity: DeviceIdentity,
    handle: Option<T::Handle>,
}

impl<'a, T: Transport + ?Sized> OpenHandle<'a, T> {
    pub fn open(transport: &'a T, identity: DeviceIdentity) -> Result<Self> {
        let handle = transport.open(identity)?;
        debug!("Opened transport handle for {}", identity);
        Ok(Self {
            transport,
            identity,
            handle: Some(handle),
        })
    }

    pub fn raw_descriptor(&self, kind: DescriptorKind, index: u8) -> Result<Vec<u8>> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::Transport(format!("handle for {} already closed", self.identity)))?;
        self.transport.raw_descriptor(handle, kind, index)
    }

    /// Read a string descriptor, treating index 0 and failures as absent
    pub fn optional_string(&self, index: u8) -> Option<String> {
        if index == 0 {
            return None;
        }
        let handle = self.handle.as_ref()?;
        match self.transport.string_descriptor(handle, index) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!(
                    "Could not read string {} from {}: {}",
                    index, self.identity, e
                );
                None
            }
        }
    }
}

impl<T: Transport + ?Sized> Drop for OpenHandle<'_, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.transport.close(handle);
            debug!("Closed transport handle for {}", self.identity);
        }
    }
}
