//! Common error types

use descriptor::DescriptorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Port {port} is already occupied")]
    PortOccupied { port: u16 },

    #[error("Device {device} is already attached to another port")]
    AlreadyAttached { device: String },

    #[error("No port numbers left on hub")]
    PortsExhausted,

    #[error("Device is not a hub")]
    NotAHub,

    #[error("Rescan already in progress")]
    RescanInProgress,

    #[error("Listener is already registered")]
    DuplicateListener,

    #[error("Listener is not registered")]
    NotRegistered,

    #[error("Device {device} reports parent {parent} which is not in the topology")]
    OrphanDevice { device: String, parent: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the malformed-descriptor family
    pub fn is_malformed_descriptor(&self) -> bool {
        matches!(self, Self::Descriptor(e) if e.is_malformed())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
