//! Static lookup tables for diagnostic output
//!
//! Plain constant tables; unknown values resolve to [`UNKNOWN`].

use crate::types::{Direction, SyncType, TransferType, UsageType};

/// Name returned for values missing from a table
pub const UNKNOWN: &str = "Unknown";

/// USB-IF base class codes
const CLASS_NAMES: &[(u8, &str)] = &[
    (0x00, "Per Interface"),
    (0x01, "Audio"),
    (0x02, "Communications"),
    (0x03, "HID"),
    (0x05, "Physical"),
    (0x06, "Image"),
    (0x07, "Printer"),
    (0x08, "Mass Storage"),
    (0x09, "Hub"),
    (0x0a, "CDC Data"),
    (0x0b, "Smart Card"),
    (0x0d, "Content Security"),
    (0x0e, "Video"),
    (0x0f, "Personal Healthcare"),
    (0x10, "Audio/Video"),
    (0x11, "Billboard"),
    (0x12, "Type-C Bridge"),
    (0xdc, "Diagnostic"),
    (0xe0, "Wireless"),
    (0xef, "Miscellaneous"),
    (0xfe, "Application Specific"),
    (0xff, "Vendor Specific"),
];

const DESCRIPTOR_TYPE_NAMES: &[(u8, &str)] = &[
    (0x01, "Device"),
    (0x02, "Configuration"),
    (0x03, "String"),
    (0x04, "Interface"),
    (0x05, "Endpoint"),
    (0x06, "Device Qualifier"),
    (0x07, "Other Speed Configuration"),
    (0x08, "Interface Power"),
    (0x0b, "Interface Association"),
    (0x0f, "BOS"),
    (0x10, "Device Capability"),
    (0x21, "HID"),
    (0x29, "Hub"),
    (0x2a, "SuperSpeed Hub"),
    (0x30, "SuperSpeed Endpoint Companion"),
];

fn lookup(table: &[(u8, &'static str)], value: u8) -> &'static str {
    table
        .iter()
        .find(|(code, _)| *code == value)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN)
}

/// Name of a device or interface class code
pub fn class_name(class: u8) -> &'static str {
    lookup(CLASS_NAMES, class)
}

/// Name of a `bDescriptorType` value
pub fn descriptor_type_name(descriptor_type: u8) -> &'static str {
    lookup(DESCRIPTOR_TYPE_NAMES, descriptor_type)
}

pub fn transfer_type_name(transfer_type: TransferType) -> &'static str {
    match transfer_type {
        TransferType::Control => "Control",
        TransferType::Isochronous => "Isochronous",
        TransferType::Bulk => "Bulk",
        TransferType::Interrupt => "Interrupt",
    }
}

pub fn sync_type_name(sync_type: SyncType) -> &'static str {
    match sync_type {
        SyncType::NoSync => "None",
        SyncType::Asynchronous => "Asynchronous",
        SyncType::Adaptive => "Adaptive",
        SyncType::Synchronous => "Synchronous",
    }
}

pub fn usage_type_name(usage_type: UsageType) -> &'static str {
    match usage_type {
        UsageType::Data => "Data",
        UsageType::Feedback => "Feedback",
        UsageType::ImplicitFeedback => "Implicit Feedback Data",
        UsageType::Reserved => "Reserved",
    }
}

pub fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::In => "IN",
        Direction::Out => "OUT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_lookup() {
        assert_eq!(class_name(0x03), "HID");
        assert_eq!(class_name(0x09), "Hub");
        assert_eq!(class_name(0xf3), UNKNOWN);
        assert_eq!(class_name(0x04), UNKNOWN);
    }

    #[test]
    fn test_descriptor_type_lookup() {
        assert_eq!(descriptor_type_name(0x05), "Endpoint");
        assert_eq!(descriptor_type_name(0x30), "SuperSpeed Endpoint Companion");
        assert_eq!(descriptor_type_name(0x99), UNKNOWN);
    }
}
