use std::io::Write;

use anyhow::{Context, Result};
use log::debug;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};

use crate::config::AcquireConfig;

/// A serial device as shown to the user when picking a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortEntry {
    pub name: String,
    pub description: String,
}

impl From<SerialPortInfo> for PortEntry {
    fn from(info: SerialPortInfo) -> Self {
        let description = match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let parts: Vec<String> = [usb.manufacturer, usb.product]
                    .into_iter()
                    .flatten()
                    .collect();

                if parts.is_empty() {
                    "USB Serial".to_string()
                } else {
                    parts.join(" ")
                }
            }
            SerialPortType::PciPort => "PCI".to_string(),
            SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            SerialPortType::Unknown => "n/a".to_string(),
        };

        PortEntry {
            name: info.port_name,
            description,
        }
    }
}

pub fn list_ports() -> Result<Vec<PortEntry>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(PortEntry::from).collect())
}

/// Console listing: each port's description, then the device path to pass as `--port`.
pub fn listing_lines(entries: &[PortEntry]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| [e.description.clone(), e.name.clone()])
        .collect()
}

/// Opens the configured port, 8N1, and throws away anything left over from a previous run.
pub fn open(config: &AcquireConfig) -> Result<Box<dyn SerialPort>> {
    let builder = serialport::new(&config.port_path, config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(config.timeout);
    debug!("{:?}", &builder);

    let mut port = builder
        .open()
        .with_context(|| format!("Failed to open \"{}\"", config.port_path))?;

    port.flush()
        .with_context(|| format!("Failed to flush \"{}\"", config.port_path))?;
    port.clear(serialport::ClearBuffer::Input)
        .with_context(|| format!("Failed to clear input of \"{}\"", config.port_path))?;

    Ok(port)
}
