//! Topology Integration Tests
//!
//! Drives the topology manager end to end over the in-memory transport.
//!
//! # Test Scenarios
//! - Attach/detach through rescans, including port reuse
//! - Malformed devices skipped while siblings attach
//! - Orphans, parent cycles and non-hub parents
//! - Parent changes rebuild the device
//! - Listener delivery order and failing listeners
//! - Transport handles released on every path
//! - Rescan exclusion and concurrent readers
//!
//! Run with: `cargo test -p topology --test topology_tests`

use common::{DeviceIdentity, Error};
use descriptor::{CLASS_HUB, format_configuration, format_device};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;
use topology::test_utils::{MockDevice, MockTransport, device_descriptor_bytes};
use topology::{
    DeviceEvent, DeviceListener, DeviceNode, ErrorEvent, TopologyListener, TopologyManager,
    Transport, TreeSnapshot,
};

fn id(address: u8) -> DeviceIdentity {
    DeviceIdentity::new(1, address)
}

fn manager_with(devices: Vec<MockDevice>) -> TopologyManager<MockTransport> {
    TopologyManager::new(MockTransport::new(devices))
}

/// Records every topology event as a short line
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.events.lock().unwrap().push(line);
    }
}

impl TopologyListener for Recorder {
    fn device_attached(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        self.push(format!(
            "attach {} port {}",
            event.device.identity().unwrap(),
            event.port
        ));
        Ok(())
    }

    fn device_detached(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        self.push(format!(
            "detach {} port {}",
            event.device.identity().unwrap(),
            event.port
        ));
        Ok(())
    }

    fn error_occurred(&self, event: &ErrorEvent<'_>) -> anyhow::Result<()> {
        self.push(format!(
            "error {} {}",
            event.identity.unwrap(),
            event.error
        ));
        Ok(())
    }
}

fn register_recorder<T: Transport>(manager: &TopologyManager<T>) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::default());
    manager.register_listener(recorder.clone()).unwrap();
    recorder
}

// ============================================================================
// Attach / Detach Tests
// ============================================================================

#[test]
fn test_hub_chain_attach_detach_and_port_reuse() {
    let manager = manager_with(vec![
        MockDevice::hub(id(2), None),
        MockDevice::hid(id(3), Some(id(2))),
    ]);

    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.attached, vec![id(2), id(3)]);

    // root -> port 1 -> A -> port 1 -> B
    let root = manager.root_hub();
    let a = root.port(1).unwrap().device().cloned().unwrap();
    assert_eq!(a.identity(), Some(id(2)));
    let b = a.port(1).unwrap().device().cloned().unwrap();
    assert_eq!(b.identity(), Some(id(3)));
    assert!(Arc::ptr_eq(&b.parent_hub().unwrap(), &a));

    manager.transport().unplug(id(3));
    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.detached, vec![id(3)]);
    assert!(report.attached.is_empty());

    assert_eq!(a.port_number(), Some(1));
    assert_eq!(a.port_count(), 1);
    assert!(!a.port(1).unwrap().is_occupied());
    assert!(b.parent_port().is_none());
    assert!(manager.device(id(3)).is_none());

    manager.transport().plug(MockDevice::hid(id(4), Some(id(2))));
    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.attached, vec![id(4)]);
    assert_eq!(manager.device(id(4)).unwrap().port_number(), Some(1));
    assert_eq!(a.port_count(), 1);
}

#[test]
fn test_subtree_detached_children_first() {
    let manager = manager_with(vec![
        MockDevice::hub(id(2), None),
        MockDevice::hub(id(3), Some(id(2))),
        MockDevice::hid(id(4), Some(id(3))),
    ]);
    let recorder = register_recorder(&manager);
    manager.rescan_transport().unwrap();

    manager.transport().set_devices(Vec::new());
    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.detached, vec![id(4), id(3), id(2)]);
    assert!(manager.devices().is_empty());
    assert_eq!(manager.root_hub().port_count(), 1);

    assert_eq!(
        recorder.events(),
        vec![
            "attach 001:002 port 1",
            "attach 001:003 port 1",
            "attach 001:004 port 1",
            "detach 001:004 port 1",
            "detach 001:003 port 1",
            "detach 001:002 port 1",
        ]
    );
}

#[test]
fn test_removals_free_ports_for_same_pass() {
    let manager = manager_with(vec![
        MockDevice::hid(id(2), None),
        MockDevice::hid(id(3), None),
    ]);
    manager.rescan_transport().unwrap();

    manager.transport().set_devices(vec![
        MockDevice::hid(id(3), None),
        MockDevice::hid(id(5), None),
    ]);
    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.detached, vec![id(2)]);
    assert_eq!(report.attached, vec![id(5)]);

    assert_eq!(manager.device(id(5)).unwrap().port_number(), Some(1));
    assert_eq!(manager.root_hub().port_count(), 2);
}

#[test]
fn test_parent_change_rebuilds_device() {
    let manager = manager_with(vec![
        MockDevice::hub(id(2), None),
        MockDevice::hub(id(3), None),
        MockDevice::hid(id(4), Some(id(2))),
    ]);
    manager.rescan_transport().unwrap();

    struct Detached(AtomicUsize);
    impl DeviceListener for Detached {
        fn device_detached(&self, _device: &DeviceNode) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
    let old = manager.device(id(4)).unwrap();
    let watcher = Arc::new(Detached(AtomicUsize::new(0)));
    old.add_listener(watcher.clone()).unwrap();

    manager.transport().set_devices(vec![
        MockDevice::hub(id(2), None),
        MockDevice::hub(id(3), None),
        MockDevice::hid(id(4), Some(id(3))),
    ]);
    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.detached, vec![id(4)]);
    assert_eq!(report.attached, vec![id(4)]);

    let new = manager.device(id(4)).unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert_eq!(watcher.0.load(Ordering::SeqCst), 1);

    let hub_a = manager.device(id(2)).unwrap();
    let hub_b = manager.device(id(3)).unwrap();
    assert!(!hub_a.port(1).unwrap().is_occupied());
    assert!(Arc::ptr_eq(&new.parent_hub().unwrap(), &hub_b));
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_malformed_device_skipped_siblings_attach() {
    let manager = manager_with(vec![
        MockDevice::hid(id(2), None),
        MockDevice::hid(id(3), None).with_device_descriptor(vec![18, 0x01, 0x00, 0x02]),
        MockDevice::hid(id(4), None),
    ]);
    let recorder = register_recorder(&manager);

    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.attached, vec![id(2), id(4)]);
    assert_eq!(report.failed, vec![id(3)]);
    assert!(manager.device(id(3)).is_none());

    assert_eq!(manager.device(id(4)).unwrap().port_number(), Some(2));

    let errors: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| e.starts_with("error"))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("error 001:003 Malformed"));
}

#[test]
fn test_truncated_configuration_fails_device() {
    let manager = manager_with(vec![
        MockDevice::hub(id(2), None)
            .with_configurations(vec![vec![9, 0x02, 40, 0, 1, 1, 0, 0xe0, 50]]),
    ]);
    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.failed, vec![id(2)]);
    assert_eq!(manager.root_hub().port_count(), 0);
}

#[test]
fn test_hub_without_configurations_fails() {
    let mut descriptor = device_descriptor_bytes(CLASS_HUB, 0x05e3, 0x0608);
    descriptor[17] = 0;
    let manager = manager_with(vec![
        MockDevice::hub(id(2), None).with_device_descriptor(descriptor),
    ]);
    let recorder = register_recorder(&manager);

    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.failed, vec![id(2)]);
    assert!(recorder.events()[0].contains("no configuration"));
}

#[test]
fn test_orphan_device_reported() {
    let manager = manager_with(vec![MockDevice::hid(id(2), Some(id(9)))]);
    let recorder = register_recorder(&manager);

    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.failed, vec![id(2)]);
    assert!(recorder.events()[0].contains("not in the topology"));
}

#[test]
fn test_parent_cycle_reported() {
    let manager = manager_with(vec![
        MockDevice::hub(id(2), Some(id(3))),
        MockDevice::hub(id(3), Some(id(2))),
    ]);

    let report = manager.rescan_transport().unwrap();
    assert!(report.attached.is_empty());
    let mut failed = report.failed.clone();
    failed.sort();
    assert_eq!(failed, vec![id(2), id(3)]);
    assert_eq!(manager.root_hub().port_count(), 0);
}

#[test]
fn test_child_of_non_hub_fails() {
    let manager = manager_with(vec![
        MockDevice::hid(id(2), None),
        MockDevice::hid(id(3), Some(id(2))),
    ]);
    let recorder = register_recorder(&manager);

    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.attached, vec![id(2)]);
    assert_eq!(report.failed, vec![id(3)]);
    assert!(recorder.events().iter().any(|e| e.contains("not a hub")));
}

#[test]
fn test_handles_released_on_every_path() {
    let manager = manager_with(vec![
        MockDevice::hub(id(2), None),
        MockDevice::hid(id(3), Some(id(2))),
        MockDevice::hid(id(4), None).with_device_descriptor(vec![1, 2, 3]),
        MockDevice::hub(id(5), None).with_configurations(vec![vec![9, 0x02, 9, 0]]),
    ]);

    manager.rescan_transport().unwrap();
    manager.rescan_transport().unwrap();

    let transport = manager.transport();
    assert_eq!(transport.open_count(), 6);
    assert_eq!(transport.open_count(), transport.close_count());
}

// ============================================================================
// Listener Tests
// ============================================================================

struct FailingListener;

impl TopologyListener for FailingListener {
    fn device_attached(&self, _event: &DeviceEvent) -> anyhow::Result<()> {
        anyhow::bail!("listener rejected the event")
    }
}

#[test]
fn test_failing_listener_does_not_break_rescan() {
    let manager = manager_with(vec![
        MockDevice::hid(id(2), None),
        MockDevice::hid(id(3), None),
    ]);
    manager.register_listener(Arc::new(FailingListener)).unwrap();
    let recorder = register_recorder(&manager);

    let report = manager.rescan_transport().unwrap();
    assert_eq!(report.attached.len(), 2);
    assert_eq!(
        recorder.events(),
        vec!["attach 001:002 port 1", "attach 001:003 port 2"]
    );
}

#[test]
fn test_listener_registration_errors() {
    let manager = manager_with(Vec::new());
    let listener: Arc<dyn TopologyListener> = Arc::new(Recorder::default());

    manager.register_listener(listener.clone()).unwrap();
    assert!(matches!(
        manager.register_listener(listener.clone()),
        Err(Error::DuplicateListener)
    ));
    manager.unregister_listener(&listener).unwrap();
    assert!(matches!(
        manager.unregister_listener(&listener),
        Err(Error::NotRegistered)
    ));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// Blocks the first device-descriptor read until released
struct GatedTransport {
    inner: MockTransport,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Transport for GatedTransport {
    type Handle = DeviceIdentity;

    fn enumerate(&self) -> common::Result<Vec<common::EnumeratedDevice>> {
        self.inner.enumerate()
    }

    fn open(&self, identity: DeviceIdentity) -> common::Result<Self::Handle> {
        self.inner.open(identity)
    }

    fn close(&self, handle: Self::Handle) {
        self.inner.close(handle)
    }

    fn raw_descriptor(
        &self,
        handle: &Self::Handle,
        kind: descriptor::DescriptorKind,
        index: u8,
    ) -> common::Result<Vec<u8>> {
        if kind == descriptor::DescriptorKind::Device {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
        }
        self.inner.raw_descriptor(handle, kind, index)
    }

    fn string_descriptor(&self, handle: &Self::Handle, index: u8) -> common::Result<String> {
        self.inner.string_descriptor(handle, index)
    }
}

#[test]
fn test_overlapping_rescan_fails_fast() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let transport = GatedTransport {
        inner: MockTransport::new(vec![MockDevice::hid(id(2), None)]),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let manager = Arc::new(TopologyManager::new(transport));

    let worker = {
        let manager = manager.clone();
        thread::spawn(move || manager.rescan_transport())
    };

    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first rescan reached the transport");
    assert!(manager.is_reconciling());
    assert!(matches!(manager.rescan(&[]), Err(Error::RescanInProgress)));

    // Reads do not wait for the rescan
    assert_eq!(manager.root_hub().port_count(), 0);
    assert!(manager.devices().is_empty());

    release_tx.send(()).unwrap();
    let report = worker.join().unwrap().unwrap();
    assert_eq!(report.attached, vec![id(2)]);
    assert!(!manager.is_reconciling());
}

fn assert_ports_ordered(snapshot: &TreeSnapshot) {
    let ports: Vec<_> = snapshot.children.iter().map(|c| c.port).collect();
    for pair in ports.windows(2) {
        assert!(pair[0] < pair[1], "ports out of order: {:?}", ports);
    }
    for child in &snapshot.children {
        assert_ports_ordered(child);
    }
}

#[test]
fn test_snapshots_during_rescans() {
    let full = || {
        let mut devices = vec![MockDevice::hub(id(2), None)];
        devices.extend((3..8).map(|a| MockDevice::hid(id(a), Some(id(2)))));
        devices
    };
    let partial = || {
        vec![
            MockDevice::hub(id(2), None),
            MockDevice::hid(id(3), Some(id(2))),
            MockDevice::hid(id(6), Some(id(2))),
        ]
    };

    let manager = Arc::new(manager_with(full()));
    manager.rescan_transport().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let manager = manager.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut captures = 0;
            loop {
                let snapshot = TreeSnapshot::capture(manager.root_hub());
                assert_ports_ordered(&snapshot);
                assert!(snapshot.device_count() <= 6);
                captures += 1;
                if stop.load(Ordering::SeqCst) {
                    break captures;
                }
            }
        })
    };

    for round in 0..50 {
        let devices = if round % 2 == 0 { partial() } else { full() };
        manager.transport().set_devices(devices);
        manager.rescan_transport().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    assert!(reader.join().unwrap() > 0);

    // Round 49 restored the full set
    assert_eq!(TreeSnapshot::capture(manager.root_hub()).device_count(), 6);
    assert_eq!(manager.device(id(2)).unwrap().port_count(), 5);
}

// ============================================================================
// Root Hub Tests
// ============================================================================

#[test]
fn test_root_hub_dump() {
    let manager = manager_with(Vec::new());
    let root = manager.root_hub();

    let device = format_device(root.descriptor());
    assert!(device.contains("Hub"));
    assert!(device.contains("2.00"));
    assert!(device.contains("0xffff"));

    let config = format_configuration(&root.configurations()[0]);
    assert!(config.contains("Interface Descriptor"));
    assert!(config.contains("Bus Powered"));
    assert!(!config.contains("Endpoint Descriptor"));
}
