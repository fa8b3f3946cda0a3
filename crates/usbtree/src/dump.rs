//! Text and JSON rendering of the topology tree

use anyhow::{Context, Result};
use descriptor::{class_name, format_configuration_indented, format_device};
use topology::{DeviceNode, TreeSnapshot};

/// Render the tree below `root`, one line per port
///
/// With `verbose`, every device is followed by its device and
/// configuration descriptor dumps.
pub fn render_tree(root: &DeviceNode, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&describe(root));
    out.push('\n');
    if verbose {
        push_descriptors(&mut out, root, 2);
    }
    push_ports(&mut out, root, 1, verbose);
    out
}

pub fn render_json(root: &DeviceNode) -> Result<String> {
    serde_json::to_string_pretty(&TreeSnapshot::capture(root))
        .context("Failed to serialize topology")
}

fn push_ports(out: &mut String, hub: &DeviceNode, depth: usize, verbose: bool) {
    let indent = depth * 2;
    for port in hub.ports() {
        match port.device() {
            Some(device) => {
                out.push_str(&format!(
                    "{:indent$}Port {}: {}\n",
                    "",
                    port.number(),
                    describe(device)
                ));
                if verbose {
                    push_descriptors(out, device, indent + 2);
                }
                push_ports(out, device, depth + 1, verbose);
            }
            None => {
                out.push_str(&format!("{:indent$}Port {}: empty\n", "", port.number()));
            }
        }
    }
}

fn describe(device: &DeviceNode) -> String {
    let descriptor = device.descriptor();
    let strings = device.strings();
    let name = [strings.manufacturer.as_deref(), strings.product.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let mut line = match device.identity() {
        Some(identity) => format!(
            "Bus {:03} Device {:03}: ID {:04x}:{:04x} {}",
            identity.bus,
            identity.address,
            descriptor.vendor_id,
            descriptor.product_id,
            class_name(descriptor.device_class)
        ),
        None => "Root Hub".to_string(),
    };
    if !name.is_empty() {
        line.push_str(&format!(" \"{}\"", name));
    }
    line
}

fn push_descriptors(out: &mut String, device: &DeviceNode, indent: usize) {
    for line in format_device(device.descriptor()).lines() {
        out.push_str(&format!("{:indent$}{}\n", "", line));
    }
    for configuration in device.configurations() {
        out.push_str(&format_configuration_indented(configuration, indent));
    }
}
