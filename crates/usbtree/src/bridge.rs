//! Event bridge from the poller thread to the Tokio runtime
//!
//! Topology listeners run on whichever thread performs the rescan. In watch
//! mode that is the blocking poller thread, so events are copied into plain
//! values and pushed through an `async_channel` for the runtime to print.

use async_channel::{Receiver, Sender, bounded};
use common::DeviceIdentity;
use std::fmt;
use topology::{DeviceEvent, DeviceNode, ErrorEvent, PortNumber, TopologyListener};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Owned copy of a topology event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    Attached {
        device: String,
        hub: String,
        port: PortNumber,
    },
    Detached {
        device: String,
        hub: String,
        port: PortNumber,
    },
    Error {
        identity: Option<DeviceIdentity>,
        message: String,
    },
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached { device, hub, port } => {
                write!(f, "+ {} (port {} of {})", device, port, hub)
            }
            Self::Detached { device, hub, port } => {
                write!(f, "- {} (port {} of {})", device, port, hub)
            }
            Self::Error {
                identity: Some(identity),
                message,
            } => write!(f, "! {}: {}", identity, message),
            Self::Error {
                identity: None,
                message,
            } => write!(f, "! {}", message),
        }
    }
}

/// Topology listener that forwards every event into a channel
pub struct ChannelListener {
    event_tx: Sender<TopologyEvent>,
}

impl ChannelListener {
    fn send(&self, event: TopologyEvent) -> anyhow::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| anyhow::anyhow!("Event channel closed: {}", e))
    }
}

fn hub_name(hub: &DeviceNode) -> String {
    match hub.identity() {
        Some(identity) => identity.to_string(),
        None => "root hub".to_string(),
    }
}

impl TopologyListener for ChannelListener {
    fn device_attached(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        self.send(TopologyEvent::Attached {
            device: event.device.label(),
            hub: hub_name(&event.hub),
            port: event.port,
        })
    }

    fn device_detached(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        self.send(TopologyEvent::Detached {
            device: event.device.label(),
            hub: hub_name(&event.hub),
            port: event.port,
        })
    }

    fn error_occurred(&self, event: &ErrorEvent<'_>) -> anyhow::Result<()> {
        self.send(TopologyEvent::Error {
            identity: event.identity,
            message: event.error.to_string(),
        })
    }
}

/// Create the listener and the receiving end consumed by the runtime
pub fn create_event_channel() -> (ChannelListener, Receiver<TopologyEvent>) {
    let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
    (ChannelListener { event_tx }, event_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Error;
    use topology::create_root_hub;
    use topology::test_utils::create_mock_device;

    #[tokio::test]
    async fn test_events_cross_threads() {
        let (listener, events) = create_event_channel();

        let handle = std::thread::spawn(move || {
            let root = create_root_hub();
            let device = create_mock_device(5);
            let port = root.connect_device(device.clone()).unwrap();
            let event = DeviceEvent {
                device,
                hub: root,
                port,
            };
            listener.device_attached(&event).unwrap();
            listener.device_detached(&event).unwrap();
        });

        let attached = events.recv().await.unwrap();
        assert!(matches!(
            &attached,
            TopologyEvent::Attached { hub, port: 1, .. } if hub == "root hub"
        ));
        assert!(attached.to_string().starts_with("+ 001:005"));

        let detached = events.recv().await.unwrap();
        assert!(detached.to_string().starts_with("- 001:005"));

        handle.join().unwrap();
    }

    #[test]
    fn test_closed_channel_reports_failure() {
        let (listener, events) = create_event_channel();
        drop(events);

        let error = Error::RescanInProgress;
        let event = ErrorEvent {
            identity: None,
            error: &error,
        };
        assert!(listener.error_occurred(&event).is_err());
    }

    #[test]
    fn test_error_display() {
        let event = TopologyEvent::Error {
            identity: Some(DeviceIdentity::new(2, 7)),
            message: "Malformed descriptor".to_string(),
        };
        assert_eq!(event.to_string(), "! 002:007: Malformed descriptor");
    }
}
