//! Descriptor decoding errors

use crate::DescriptorKind;
use thiserror::Error;

/// Errors raised while decoding raw descriptor bytes
///
/// Every variant describes a malformed descriptor: the bytes handed to the
/// codec cannot be interpreted as the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Fewer bytes than the descriptor (or its declared length) requires
    #[error("Malformed {kind} descriptor: need {needed} bytes, got {available}")]
    TooShort {
        kind: DescriptorKind,
        needed: usize,
        available: usize,
    },

    /// `bLength` is smaller than the fixed layout of the kind
    #[error("Malformed {kind} descriptor: bLength {declared} is below the minimum of {minimum}")]
    BadLength {
        kind: DescriptorKind,
        declared: u8,
        minimum: u8,
    },

    /// `bDescriptorType` does not match the requested kind
    #[error("Malformed {kind} descriptor: bDescriptorType {found:#04x}, expected {expected:#04x}")]
    WrongType {
        kind: DescriptorKind,
        expected: u8,
        found: u8,
    },

    /// A hub or device reported no usable configuration
    #[error("Malformed descriptor set: device has no configuration")]
    NoConfiguration,
}

impl DescriptorError {
    /// Whether this error means the raw bytes were malformed
    ///
    /// Always true today; kept as a predicate so callers do not need to
    /// match on individual variants.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::TooShort { .. }
                | Self::BadLength { .. }
                | Self::WrongType { .. }
                | Self::NoConfiguration
        )
    }
}

/// Type alias for descriptor results
pub type Result<T> = std::result::Result<T, DescriptorError>;
