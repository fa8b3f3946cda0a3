//! Fixed-column diagnostic dumps
//!
//! Output is deterministic so it can be compared byte for byte in golden
//! tests. Every field line has the shape
//!
//! ```text
//! <indent>  <name, 20 cols left-aligned><value, 6 cols right-aligned>[ <resolved name>]
//! ```

use crate::config::{Configuration, Endpoint, Interface};
use crate::names::{
    class_name, direction_name, sync_type_name, transfer_type_name, usage_type_name,
};
use crate::types::{
    ConfigurationDescriptor, Descriptor, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor, TransferType,
};
use std::fmt::Display;

/// Render a binary-coded-decimal version number (`0x0210` -> `2.10`)
pub fn format_bcd(value: u16) -> String {
    format!("{:x}.{:02x}", value >> 8, value & 0xff)
}

/// Dump any single descriptor
pub fn format(descriptor: &Descriptor) -> String {
    let mut dump = Dump::new(0);
    match descriptor {
        Descriptor::Device(d) => dump.device(d),
        Descriptor::Configuration(d) => dump.configuration_header(d),
        Descriptor::Interface(d) => dump.interface_header(d),
        Descriptor::Endpoint(d) => dump.endpoint_header(d),
    }
    dump.finish()
}

pub fn format_device(descriptor: &DeviceDescriptor) -> String {
    format(&Descriptor::Device(*descriptor))
}

/// Dump a configuration with its interfaces and endpoints, nested
pub fn format_configuration(configuration: &Configuration) -> String {
    format_configuration_indented(configuration, 0)
}

/// Same as [`format_configuration`], shifted right by `indent` spaces
pub fn format_configuration_indented(configuration: &Configuration, indent: usize) -> String {
    let mut dump = Dump::new(indent);
    dump.configuration(configuration);
    dump.finish()
}

struct Dump {
    out: String,
    indent: usize,
}

impl Dump {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn heading(&mut self, title: &str) {
        self.out
            .push_str(&format!("{:indent$}{}:\n", "", title, indent = self.indent));
    }

    fn field(&mut self, name: &str, value: impl Display, resolved: Option<&str>) {
        let value = value.to_string();
        let mut line = format!(
            "{:indent$}  {:<20}{:>6}",
            "",
            name,
            value,
            indent = self.indent
        );
        if let Some(resolved) = resolved {
            line.push(' ');
            line.push_str(resolved);
        }
        line.push('\n');
        self.out.push_str(&line);
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 2;
        f(self);
        self.indent -= 2;
    }

    fn device(&mut self, d: &DeviceDescriptor) {
        self.heading("Device Descriptor");
        self.field("bLength", d.length, None);
        self.field("bDescriptorType", d.descriptor_type, None);
        self.field("bcdUSB", format_bcd(d.bcd_usb), None);
        self.field("bDeviceClass", d.device_class, Some(class_name(d.device_class)));
        self.field("bDeviceSubClass", d.device_sub_class, None);
        self.field("bDeviceProtocol", d.device_protocol, None);
        self.field("bMaxPacketSize0", d.max_packet_size0, None);
        self.field("idVendor", format!("0x{:04x}", d.vendor_id), None);
        self.field("idProduct", format!("0x{:04x}", d.product_id), None);
        self.field("bcdDevice", format_bcd(d.bcd_device), None);
        self.field("iManufacturer", d.manufacturer_index, None);
        self.field("iProduct", d.product_index, None);
        self.field("iSerial", d.serial_number_index, None);
        self.field("bNumConfigurations", d.num_configurations, None);
    }

    fn configuration_header(&mut self, d: &ConfigurationDescriptor) {
        self.heading("Configuration Descriptor");
        self.field("bLength", d.length, None);
        self.field("bDescriptorType", d.descriptor_type, None);
        self.field("wTotalLength", format!("0x{:04x}", d.total_length), None);
        self.field("bNumInterfaces", d.num_interfaces, None);
        self.field("bConfigurationValue", d.configuration_value, None);
        self.field("iConfiguration", d.configuration_index, None);

        let power = match (d.self_powered(), d.remote_wakeup()) {
            (true, true) => "Self Powered, Remote Wakeup",
            (true, false) => "Self Powered",
            (false, true) => "Bus Powered, Remote Wakeup",
            (false, false) => "Bus Powered",
        };
        self.field("bmAttributes", format!("0x{:02x}", d.attributes), Some(power));
        self.field(
            "bMaxPower",
            d.max_power,
            Some(&format!("{}mA", d.max_power_ma())),
        );
    }

    fn configuration(&mut self, configuration: &Configuration) {
        self.configuration_header(&configuration.descriptor);
        self.extra(&configuration.extra);
        for interface in &configuration.interfaces {
            self.nested(|dump| dump.interface(interface));
        }
    }

    fn interface_header(&mut self, d: &InterfaceDescriptor) {
        self.heading("Interface Descriptor");
        self.field("bLength", d.length, None);
        self.field("bDescriptorType", d.descriptor_type, None);
        self.field("bInterfaceNumber", d.interface_number, None);
        self.field("bAlternateSetting", d.alternate_setting, None);
        self.field("bNumEndpoints", d.num_endpoints, None);
        self.field(
            "bInterfaceClass",
            d.interface_class,
            Some(class_name(d.interface_class)),
        );
        self.field("bInterfaceSubClass", d.interface_sub_class, None);
        self.field("bInterfaceProtocol", d.interface_protocol, None);
        self.field("iInterface", d.interface_index, None);
    }

    fn interface(&mut self, interface: &Interface) {
        self.interface_header(&interface.descriptor);
        self.extra(&interface.extra);
        for endpoint in &interface.endpoints {
            self.nested(|dump| dump.endpoint(endpoint));
        }
    }

    fn endpoint_header(&mut self, d: &EndpointDescriptor) {
        self.heading("Endpoint Descriptor");
        self.field("bLength", d.length, None);
        self.field("bDescriptorType", d.descriptor_type, None);
        self.field(
            "bEndpointAddress",
            format!("0x{:02x}", d.endpoint_address),
            Some(&format!("EP {} {}", d.number(), direction_name(d.direction()))),
        );

        let transfer = transfer_type_name(d.transfer_type());
        let attributes = if d.transfer_type() == TransferType::Isochronous {
            format!(
                "{}, {}, {}",
                transfer,
                sync_type_name(d.sync_type()),
                usage_type_name(d.usage_type())
            )
        } else {
            transfer.to_string()
        };
        self.field("bmAttributes", d.attributes, Some(&attributes));
        self.field(
            "wMaxPacketSize",
            format!("0x{:04x}", d.max_packet_size),
            Some(&format!(
                "{}x {} bytes",
                d.transactions_per_microframe(),
                d.packet_size()
            )),
        );
        self.field("bInterval", d.interval, None);
        if d.length >= 9 {
            self.field("bRefresh", d.refresh, None);
            self.field("bSynchAddress", d.synch_address, None);
        }
    }

    fn endpoint(&mut self, endpoint: &Endpoint) {
        self.endpoint_header(&endpoint.descriptor);
        self.extra(&endpoint.extra);
    }

    fn extra(&mut self, extra: &[u8]) {
        if !extra.is_empty() {
            self.field("extra", extra.len(), Some("bytes"));
        }
    }
}
