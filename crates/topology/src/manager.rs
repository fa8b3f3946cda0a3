//! Topology manager
//!
//! Owns the root hub and reconciles flat bus enumerations against the
//! tree. A rescan runs in two phases:
//!
//! 1. Removals: every tracked device that is gone, or whose reported parent
//!    changed, is detached together with its subtree (children first).
//! 2. Additions: every enumerated device that is not in the tree is built
//!    from its descriptors and connected below its parent hub. Parents are
//!    attached before their children whatever the enumeration order.
//!
//! A device that fails to build is skipped and reported on the error
//! channel; the rest of the rescan continues. Only one rescan runs at a
//! time, a second caller fails with [`Error::RescanInProgress`] instead of
//! waiting.

use crate::device::{DeviceNode, DeviceStrings};
use crate::events::{DeviceEvent, ErrorEvent, TopologyListener};
use crate::root_hub::create_root_hub;
use crate::transport::{OpenHandle, Transport};
use common::{DeviceIdentity, EnumeratedDevice, Error, EventNotifier, Result};
use descriptor::{DescriptorKind, decode_device, parse_configuration};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// What one rescan changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescanReport {
    pub attached: Vec<DeviceIdentity>,
    pub detached: Vec<DeviceIdentity>,
    /// Devices skipped because they could not be built or placed
    pub failed: Vec<DeviceIdentity>,
}

impl RescanReport {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty() && self.failed.is_empty()
    }
}

struct TrackedDevice {
    node: Arc<DeviceNode>,
    /// Parent as reported by the enumeration that attached the device
    parent: Option<DeviceIdentity>,
}

/// Per-rescan bookkeeping for the addition phase
struct AttachPass<'a> {
    present: HashMap<DeviceIdentity, &'a EnumeratedDevice>,
    visiting: HashSet<DeviceIdentity>,
    failed: HashSet<DeviceIdentity>,
    report: RescanReport,
}

/// Clears the reconciling flag when the rescan ends, on every path
struct ReconcileGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ReconcileGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RescanInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for ReconcileGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct TopologyManager<T: Transport> {
    transport: T,
    root: Arc<DeviceNode>,
    reconciling: AtomicBool,
    devices: Mutex<HashMap<DeviceIdentity, TrackedDevice>>,
    listeners: EventNotifier<dyn TopologyListener>,
}

impl<T: Transport> TopologyManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            root: create_root_hub(),
            reconciling: AtomicBool::new(false),
            devices: Mutex::new(HashMap::new()),
            listeners: EventNotifier::new("topology listeners"),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn root_hub(&self) -> &Arc<DeviceNode> {
        &self.root
    }

    pub fn device(&self, identity: DeviceIdentity) -> Option<Arc<DeviceNode>> {
        self.lock_devices()
            .get(&identity)
            .map(|tracked| tracked.node.clone())
    }

    /// Snapshot of every device below the root hub, ordered by identity
    pub fn devices(&self) -> Vec<Arc<DeviceNode>> {
        let devices = self.lock_devices();
        let mut identities: Vec<_> = devices.keys().copied().collect();
        identities.sort();
        identities
            .into_iter()
            .filter_map(|identity| devices.get(&identity).map(|t| t.node.clone()))
            .collect()
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling.load(Ordering::Acquire)
    }

    pub fn register_listener(&self, listener: Arc<dyn TopologyListener>) -> Result<()> {
        self.listeners.register(listener)
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn TopologyListener>) -> Result<()> {
        self.listeners.unregister(listener)
    }

    /// Enumerate through the transport, then reconcile
    pub fn rescan_transport(&self) -> Result<RescanReport> {
        if self.is_reconciling() {
            return Err(Error::RescanInProgress);
        }
        let enumeration = self.transport.enumerate()?;
        self.rescan(&enumeration)
    }

    /// Reconcile the tree against a fresh enumeration
    pub fn rescan(&self, enumeration: &[EnumeratedDevice]) -> Result<RescanReport> {
        let _guard = ReconcileGuard::acquire(&self.reconciling)?;
        debug!("Rescan started with {} enumerated devices", enumeration.len());

        let mut pass = AttachPass {
            present: enumeration.iter().map(|d| (d.identity, d)).collect(),
            visiting: HashSet::new(),
            failed: HashSet::new(),
            report: RescanReport::default(),
        };

        for identity in self.stale_devices(&pass.present) {
            // May already be gone as part of an earlier subtree
            if let Some(node) = self.device(identity) {
                self.detach_subtree(&node, &mut pass.report);
            }
        }

        for entry in enumeration {
            self.attach_enumerated(entry.identity, &mut pass);
        }

        let report = pass.report;
        if !report.is_empty() {
            info!(
                "Rescan complete: {} attached, {} detached, {} failed",
                report.attached.len(),
                report.detached.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    /// Tracked devices that vanished or moved to another parent
    fn stale_devices(
        &self,
        present: &HashMap<DeviceIdentity, &EnumeratedDevice>,
    ) -> Vec<DeviceIdentity> {
        let mut stale: Vec<_> = self
            .lock_devices()
            .iter()
            .filter(|(identity, tracked)| match present.get(identity) {
                Some(entry) => entry.parent != tracked.parent,
                None => true,
            })
            .map(|(identity, _)| *identity)
            .collect();
        stale.sort();
        stale
    }

    fn detach_subtree(&self, node: &Arc<DeviceNode>, report: &mut RescanReport) {
        for child in node.attached_devices() {
            self.detach_subtree(&child, report);
        }

        let parent = node.parent_port();
        if let Some((hub, _)) = &parent {
            hub.disconnect_device(node);
        }
        if let Some(identity) = node.identity() {
            self.lock_devices().remove(&identity);
            report.detached.push(identity);
        }

        info!("Device detached: {}", node.label());
        node.notify_detached();
        if let Some((hub, port)) = parent {
            let event = DeviceEvent {
                device: node.clone(),
                hub,
                port,
            };
            self.listeners
                .dispatch("device detached", |listener| listener.device_detached(&event));
        }
    }

    /// Place `identity` in the tree, attaching its ancestors first
    fn attach_enumerated(
        &self,
        identity: DeviceIdentity,
        pass: &mut AttachPass<'_>,
    ) -> Option<Arc<DeviceNode>> {
        if let Some(node) = self.device(identity) {
            return Some(node);
        }
        let entry = *pass.present.get(&identity)?;
        // A revisit while still resolving ancestors means a parent cycle.
        if pass.failed.contains(&identity) || !pass.visiting.insert(identity) {
            return None;
        }

        let hub = match entry.parent {
            None => Some(self.root.clone()),
            Some(parent) if pass.present.contains_key(&parent) => {
                self.attach_enumerated(parent, pass)
            }
            Some(_) => None,
        };
        pass.visiting.remove(&identity);

        let result = match hub {
            Some(hub) => self.attach_below(entry, &hub),
            None => Err(Error::OrphanDevice {
                device: identity.to_string(),
                parent: entry
                    .parent
                    .map(|parent| parent.to_string())
                    .unwrap_or_default(),
            }),
        };

        match result {
            Ok(node) => {
                pass.report.attached.push(identity);
                Some(node)
            }
            Err(e) => {
                pass.failed.insert(identity);
                pass.report.failed.push(identity);
                self.report_error(Some(identity), &e);
                None
            }
        }
    }

    fn attach_below(
        &self,
        entry: &EnumeratedDevice,
        hub: &Arc<DeviceNode>,
    ) -> Result<Arc<DeviceNode>> {
        let node = self.build_node(entry.identity)?;
        let port = hub.connect_device(node.clone())?;
        self.lock_devices().insert(
            entry.identity,
            TrackedDevice {
                node: node.clone(),
                parent: entry.parent,
            },
        );

        info!(
            "Device attached: {} on port {} of {}",
            node.label(),
            port,
            hub.label()
        );
        let event = DeviceEvent {
            device: node.clone(),
            hub: hub.clone(),
            port,
        };
        self.listeners
            .dispatch("device attached", |listener| listener.device_attached(&event));
        Ok(node)
    }

    /// Read and decode every descriptor of a device
    ///
    /// The transport handle is released when this returns, whether or not
    /// decoding succeeded.
    fn build_node(&self, identity: DeviceIdentity) -> Result<Arc<DeviceNode>> {
        let handle = OpenHandle::open(&self.transport, identity)?;

        let raw = handle.raw_descriptor(DescriptorKind::Device, 0)?;
        let descriptor = decode_device(&raw)?;

        let configurations = (0..descriptor.num_configurations)
            .map(|index| {
                let bundle = handle.raw_descriptor(DescriptorKind::Configuration, index)?;
                Ok(parse_configuration(&bundle)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let strings = DeviceStrings {
            manufacturer: handle.optional_string(descriptor.manufacturer_index),
            product: handle.optional_string(descriptor.product_index),
            serial_number: handle.optional_string(descriptor.serial_number_index),
        };

        DeviceNode::new(identity, descriptor, configurations, strings)
    }

    fn report_error(&self, identity: Option<DeviceIdentity>, error: &Error) {
        match identity {
            Some(identity) => warn!("Skipping device {}: {}", identity, error),
            None => warn!("Topology error: {}", error),
        }
        let event = ErrorEvent { identity, error };
        self.listeners
            .dispatch("error", |listener| listener.error_occurred(&event));
    }

    fn lock_devices(&self) -> MutexGuard<'_, HashMap<DeviceIdentity, TrackedDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
