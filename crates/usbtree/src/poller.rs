//! Periodic bus poller
//!
//! Runs rescans on a dedicated thread because libusb calls block. A cycle
//! that collides with a rescan already in progress is skipped, not queued.

use anyhow::{Context, Result};
use common::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use topology::{TopologyManager, Transport};
use tracing::{debug, info, warn};

/// Granularity of the shutdown check while waiting between cycles
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

pub struct Poller {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<usize>,
}

impl Poller {
    /// Start polling `manager` every `interval`
    pub fn spawn<T>(manager: Arc<TopologyManager<T>>, interval: Duration) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = thread::Builder::new()
            .name("usb-poller".to_string())
            .spawn(move || poll_loop(&manager, interval, &flag))
            .context("Failed to spawn poller thread")?;

        Ok(Self { shutdown, handle })
    }

    /// Stop polling and wait for the thread; returns the completed cycles
    pub fn stop(self) -> Result<usize> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("Poller thread panicked"))
    }
}

fn poll_loop<T: Transport>(
    manager: &TopologyManager<T>,
    interval: Duration,
    shutdown: &AtomicBool,
) -> usize {
    info!("Poller started ({:?} interval)", interval);
    let mut cycles = 0;

    while !shutdown.load(Ordering::SeqCst) {
        match manager.rescan_transport() {
            Ok(report) => {
                if !report.is_empty() {
                    debug!("Poll cycle {}: {:?}", cycles, report);
                }
            }
            Err(Error::RescanInProgress) => {
                debug!("Rescan already running, skipping cycle");
            }
            Err(e) => {
                warn!("Bus rescan failed: {}", e);
            }
        }
        cycles += 1;

        let deadline = Instant::now() + interval;
        while !shutdown.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(SHUTDOWN_CHECK_INTERVAL.min(interval));
        }
    }

    info!("Poller stopped after {} cycles", cycles);
    cycles
}
