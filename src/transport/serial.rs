//! Serial/USB transport implementation.
//!
//! This module finds the beacon's USB-serial bridge among the attached
//! ports and opens it with `tokio-serial`.

use std::io;

use futures::future::BoxFuture;
use tokio_serial::{
    ClearBuffer, SerialPort, SerialPortBuilderExt, SerialPortInfo, SerialPortType,
};

use crate::config::{DEFAULT_BAUD_RATE, UsbIdentity};
use crate::error::{Error, Result};
use crate::transport::{Connector, Link, PortLocator};

/// OS error code reported by the Windows line-status query.
const CLEAR_COMM_ERROR_CODE: i32 = 22;

/// Locates the beacon by USB vendor/product id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortLocator {
    identity: UsbIdentity,
}

impl SerialPortLocator {
    /// Creates a locator for the given identity.
    #[must_use]
    pub const fn new(identity: UsbIdentity) -> Self {
        Self { identity }
    }

    /// Returns the identity this locator searches for.
    #[must_use]
    pub const fn identity(&self) -> UsbIdentity {
        self.identity
    }
}

impl PortLocator for SerialPortLocator {
    fn find_device(&self) -> Option<String> {
        let ports = match tokio_serial::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::debug!("port enumeration failed: {e}");
                return None;
            }
        };
        first_matching(&ports, self.identity).map(str::to_owned)
    }
}

/// Returns the name of the first USB port matching `identity`.
fn first_matching(ports: &[SerialPortInfo], identity: UsbIdentity) -> Option<&str> {
    ports
        .iter()
        .find(|port| match &port.port_type {
            SerialPortType::UsbPort(usb) => identity.matches(usb.vid, usb.pid),
            _ => false,
        })
        .map(|port| port.port_name.as_str())
}

/// Opens serial ports at a fixed baud rate.
#[derive(Debug, Clone, Copy)]
pub struct SerialConnector {
    baud_rate: u32,
}

impl SerialConnector {
    /// Creates a connector using `baud_rate`.
    #[must_use]
    pub const fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

impl Connector for SerialConnector {
    fn open<'a>(&'a self, port: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>> {
        Box::pin(async move {
            tracing::debug!("opening serial port {port} at {} baud", self.baud_rate);

            let stream = tokio_serial::new(port, self.baud_rate)
                .open_native_async()
                .map_err(Error::Serial)?;

            // Drop whatever the device sent before we were listening
            stream.clear(ClearBuffer::All).map_err(Error::Serial)?;

            Ok(Box::new(stream) as Box<dyn Link>)
        })
    }
}

/// Returns true for the spurious line-status failure some USB-serial
/// drivers report while the port is still healthy.
#[must_use]
pub fn is_benign_line_status_error(err: &io::Error) -> bool {
    if err.to_string().contains("ClearCommError") {
        return true;
    }
    cfg!(windows) && err.raw_os_error() == Some(CLEAR_COMM_ERROR_CODE)
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use tokio_serial::UsbPortInfo;

    use super::*;

    fn usb(name: &str, vid: u16, pid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        }
    }

    #[test]
    fn test_first_matching_picks_beacon() {
        let ports = vec![
            SerialPortInfo {
                port_name: "/dev/ttyS0".into(),
                port_type: SerialPortType::Unknown,
            },
            usb("/dev/ttyUSB0", 0x10c4, 0xea60),
            usb("/dev/ttyUSB1", 0x1A86, 0x7523),
            usb("/dev/ttyUSB2", 0x1A86, 0x7523),
        ];
        assert_eq!(
            first_matching(&ports, UsbIdentity::BEACON),
            Some("/dev/ttyUSB1")
        );
    }

    #[test]
    fn test_first_matching_none() {
        let ports = vec![usb("COM3", 0x0403, 0x6001)];
        assert_eq!(first_matching(&ports, UsbIdentity::BEACON), None);
        assert_eq!(first_matching(&[], UsbIdentity::BEACON), None);
    }

    #[test]
    fn test_first_matching_custom_identity() {
        let ports = vec![usb("COM3", 0x0403, 0x6001)];
        let identity = UsbIdentity::new(0x0403, 0x6001);
        assert_eq!(first_matching(&ports, identity), Some("COM3"));
        assert_eq!(SerialPortLocator::new(identity).identity(), identity);
    }

    #[test]
    fn test_benign_error_by_message() {
        let err = io::Error::other("ClearCommError failed");
        assert!(is_benign_line_status_error(&err));

        let err = io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged");
        assert!(!is_benign_line_status_error(&err));
    }

    #[test]
    fn test_benign_error_by_code() {
        let err = io::Error::from_raw_os_error(CLEAR_COMM_ERROR_CODE);
        assert_eq!(is_benign_line_status_error(&err), cfg!(windows));
    }

    #[test]
    #[ignore = "Requires /sys/class/tty - not available in sandboxed builds"]
    fn test_list_ports() {
        // Just verify it doesn't panic
        let _ = list_ports();
    }
}
