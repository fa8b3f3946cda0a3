//! Listener lists with snapshot dispatch
//!
//! An [`EventNotifier`] keeps an ordered set of listeners, compared by
//! identity (`Arc` pointer), and delivers events in registration order.
//!
//! Dispatch iterates a copy of the list taken when the event fires, so a
//! listener may register or unregister listeners (itself included) from
//! inside a callback without affecting the pass in progress. A listener
//! that returns an error or panics is logged and recorded in the
//! [`DispatchReport`]; the remaining listeners still receive the event.

use crate::{Error, Result};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// A listener that failed during one dispatch pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Position of the listener in the dispatch snapshot
    pub index: usize,
    pub message: String,
}

/// Outcome of delivering one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    /// True when every listener accepted the event
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered, identity-keyed listener set
pub struct EventNotifier<L: ?Sized> {
    name: &'static str,
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> EventNotifier<L> {
    /// Create an empty notifier; `name` only appears in log output
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Add a listener at the end of the notification order
    pub fn register(&self, listener: Arc<L>) -> Result<()> {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return Err(Error::DuplicateListener);
        }
        listeners.push(listener);
        debug!("{}: registered listener ({} total)", self.name, listeners.len());
        Ok(())
    }

    /// Remove a previously registered listener
    pub fn unregister(&self, listener: &Arc<L>) -> Result<()> {
        let mut listeners = self.lock();
        let position = listeners
            .iter()
            .position(|l| same_listener(l, listener))
            .ok_or(Error::NotRegistered)?;
        listeners.remove(position);
        debug!(
            "{}: unregistered listener ({} remaining)",
            self.name,
            listeners.len()
        );
        Ok(())
    }

    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.lock().iter().any(|l| same_listener(l, listener))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current listener list
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.lock().clone()
    }

    /// Deliver an event to every listener registered at call time
    ///
    /// `event` names the event for log output; `notify` performs the call on
    /// one listener.
    pub fn dispatch<F>(&self, event: &str, mut notify: F) -> DispatchReport
    where
        F: FnMut(&L) -> anyhow::Result<()>,
    {
        let snapshot = self.snapshot();
        let mut report = DispatchReport::default();

        for (index, listener) in snapshot.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| notify(listener.as_ref())));
            let message = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => format!("{:#}", e),
                Err(payload) => format!("listener panicked: {}", panic_message(payload.as_ref())),
            };

            warn!(
                "{}: listener {} failed handling {}: {}",
                self.name, index, event, message
            );
            report.failures.push(ListenerFailure { index, message });
        }

        report
    }

    // Critical sections only push/remove/clone, so a poisoned list is still
    // consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<L>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: ?Sized> fmt::Debug for EventNotifier<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
