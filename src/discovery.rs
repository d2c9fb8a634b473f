//! Candidate device enumeration.
//!
//! Results are never cached; call again to refresh.

use crate::port::{PortConfiguration, PortError, PortOpener};
use serde::Serialize;
use serialport::SerialPortType;
use tracing::debug;

/// One enumerated device with what the OS reports about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Identifier to pass to `open`.
    pub name: String,
    /// "usb", "bluetooth", "pci" or "unknown".
    pub transport: &'static str,
    /// Manufacturer and product for USB adapters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<serialport::SerialPortInfo> for DeviceInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let (transport, description) = match info.port_type {
            SerialPortType::UsbPort(usb) => (
                "usb",
                Some(usb_description(usb.manufacturer, usb.product, usb.vid, usb.pid)),
            ),
            SerialPortType::BluetoothPort => ("bluetooth", None),
            SerialPortType::PciPort => ("pci", None),
            SerialPortType::Unknown => ("unknown", None),
        };
        Self {
            name: info.port_name,
            transport,
            description,
        }
    }
}

/// "Manufacturer Product", or "vid:pid" when the adapter reports neither.
fn usb_description(manufacturer: Option<String>, product: Option<String>, vid: u16, pid: u16) -> String {
    let parts: Vec<String> = [manufacturer, product].into_iter().flatten().collect();
    if parts.is_empty() {
        format!("{vid:04x}:{pid:04x}")
    } else {
        parts.join(" ")
    }
}

/// Sort by name and drop duplicate names.
fn normalize(mut devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices.dedup_by(|a, b| a.name == b.name);
    devices
}

/// Devices the OS currently reports.
pub fn list_devices() -> Result<Vec<DeviceInfo>, PortError> {
    let ports = serialport::available_ports()?;
    let devices = normalize(ports.into_iter().map(DeviceInfo::from).collect());
    debug!(count = devices.len(), "enumerated serial devices");
    Ok(devices)
}

/// Identifiers of the devices the OS currently reports, sorted.
pub fn list_candidate_devices() -> Result<Vec<String>, PortError> {
    Ok(list_devices()?.into_iter().map(|d| d.name).collect())
}

/// Keep only the candidates that can actually be opened right now.
///
/// Each device is opened and released immediately; busy or inaccessible
/// devices are dropped.
pub fn probe_openable(opener: &dyn PortOpener, candidates: &[String]) -> Vec<String> {
    let config = PortConfiguration::default();
    candidates
        .iter()
        .filter(|name| match opener.open(name, &config) {
            Ok(_) => true,
            Err(e) => {
                debug!(device = %name, error = %e, "probe failed");
                false
            }
        })
        .cloned()
        .collect()
}
