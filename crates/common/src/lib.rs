//! Common building blocks for the USB topology workspace
//!
//! This crate provides the pieces shared between the topology core and its
//! consumers: the error taxonomy, device identity and enumeration records,
//! tracing setup, and the listener list used for event delivery.

pub mod error;
pub mod logging;
pub mod notifier;
pub mod usb_types;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use notifier::{DispatchReport, EventNotifier, ListenerFailure};
pub use usb_types::{DeviceIdentity, EnumeratedDevice};
