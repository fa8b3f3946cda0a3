//! Event notifier integration tests
//!
//! # Test Scenarios
//! - Delivery in registration order
//! - Listeners unregistering themselves mid-dispatch
//! - Failing and panicking listeners do not block later listeners
//! - Registration during dispatch only affects later events
//!
//! Run with: `cargo test -p common --test notifier_tests`

use common::{Error, EventNotifier};
use std::sync::{Arc, Mutex, OnceLock, Weak};

trait AttachListener: Send + Sync {
    fn attached(&self, device: &str) -> anyhow::Result<()>;
}

type Log = Arc<Mutex<Vec<String>>>;
type Notifier = Arc<EventNotifier<dyn AttachListener>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

impl AttachListener for Recorder {
    fn attached(&self, device: &str) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, device));
        Ok(())
    }
}

/// Records the event, then removes itself from the notifier
struct OneShot {
    name: &'static str,
    log: Log,
    notifier: Notifier,
    me: OnceLock<Weak<OneShot>>,
}

impl AttachListener for OneShot {
    fn attached(&self, device: &str) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, device));
        if let Some(me) = self.me.get().and_then(Weak::upgrade) {
            let me: Arc<dyn AttachListener> = me;
            self.notifier.unregister(&me)?;
        }
        Ok(())
    }
}

struct Failing;

impl AttachListener for Failing {
    fn attached(&self, device: &str) -> anyhow::Result<()> {
        anyhow::bail!("refusing {}", device)
    }
}

struct Panicking;

impl AttachListener for Panicking {
    fn attached(&self, _device: &str) -> anyhow::Result<()> {
        panic!("listener blew up");
    }
}

/// Registers a new recorder the first time it sees an event
struct Spawner {
    notifier: Notifier,
    log: Log,
    spawned: OnceLock<()>,
}

impl AttachListener for Spawner {
    fn attached(&self, _device: &str) -> anyhow::Result<()> {
        if self.spawned.set(()).is_ok() {
            self.notifier.register(Arc::new(Recorder {
                name: "late",
                log: self.log.clone(),
            }))?;
        }
        Ok(())
    }
}

fn notifier() -> Notifier {
    Arc::new(EventNotifier::new("attach"))
}

fn fire(notifier: &Notifier, device: &str) -> common::DispatchReport {
    notifier.dispatch("attach", |l| l.attached(device))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn test_delivery_follows_registration_order() {
    let notifier = notifier();
    let log = Log::default();
    for name in ["first", "second", "third"] {
        notifier
            .register(Arc::new(Recorder {
                name,
                log: log.clone(),
            }))
            .unwrap();
    }

    let report = fire(&notifier, "A");
    assert_eq!(report.delivered, 3);
    assert_eq!(entries(&log), vec!["first:A", "second:A", "third:A"]);
}

#[test]
fn test_listener_unregisters_itself_during_dispatch() {
    let notifier = notifier();
    let log = Log::default();

    let l1 = Arc::new(OneShot {
        name: "L1",
        log: log.clone(),
        notifier: notifier.clone(),
        me: OnceLock::new(),
    });
    l1.me.set(Arc::downgrade(&l1)).unwrap();
    notifier.register(l1.clone()).unwrap();
    notifier
        .register(Arc::new(Recorder {
            name: "L2",
            log: log.clone(),
        }))
        .unwrap();

    let report = fire(&notifier, "A");
    assert!(report.is_clean());
    assert_eq!(report.delivered, 2);
    assert_eq!(entries(&log), vec!["L1:A", "L2:A"]);
    assert_eq!(notifier.len(), 1);

    fire(&notifier, "B");
    assert_eq!(entries(&log), vec!["L1:A", "L2:A", "L2:B"]);
}

#[test]
fn test_failures_do_not_stop_delivery() {
    let notifier = notifier();
    let log = Log::default();
    notifier.register(Arc::new(Failing)).unwrap();
    notifier.register(Arc::new(Panicking)).unwrap();
    notifier
        .register(Arc::new(Recorder {
            name: "after",
            log: log.clone(),
        }))
        .unwrap();

    let report = fire(&notifier, "A");
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].index, 0);
    assert!(report.failures[0].message.contains("refusing A"));
    assert_eq!(report.failures[1].index, 1);
    assert!(report.failures[1].message.contains("listener blew up"));
    assert_eq!(entries(&log), vec!["after:A"]);

    // Panicking listener stays registered and the notifier stays usable
    assert_eq!(notifier.len(), 3);
    assert_eq!(fire(&notifier, "B").delivered, 1);
}

#[test]
fn test_registration_during_dispatch_applies_to_next_event() {
    let notifier = notifier();
    let log = Log::default();
    notifier
        .register(Arc::new(Spawner {
            notifier: notifier.clone(),
            log: log.clone(),
            spawned: OnceLock::new(),
        }))
        .unwrap();

    let report = fire(&notifier, "A");
    assert_eq!(report.delivered, 1);
    assert!(entries(&log).is_empty());

    fire(&notifier, "B");
    assert_eq!(entries(&log), vec!["late:B"]);
}

#[test]
fn test_misuse_errors() {
    let notifier = notifier();
    let listener: Arc<dyn AttachListener> = Arc::new(Failing);

    assert!(matches!(
        notifier.unregister(&listener),
        Err(Error::NotRegistered)
    ));
    notifier.register(listener.clone()).unwrap();
    assert!(matches!(
        notifier.register(listener.clone()),
        Err(Error::DuplicateListener)
    ));
}
