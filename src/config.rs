//! Connection settings.

use std::fmt;
use std::time::Duration;

/// Default baud rate of the beacon's serial link.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default delay between port scans while searching.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time allowed for a cooperative shutdown before the task is aborted.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Default pause after a swallowed line-status error.
pub const DEFAULT_BENIGN_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// USB vendor/product id pair identifying the beacon.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbIdentity {
    /// USB vendor id.
    pub vid: u16,
    /// USB product id.
    pub pid: u16,
}

impl UsbIdentity {
    /// The beacon's USB-serial bridge (WCH CH340).
    pub const BEACON: Self = Self::new(0x1A86, 0x7523);

    /// Creates an identity.
    #[must_use]
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }

    /// Returns true if the given ids match.
    #[must_use]
    pub const fn matches(self, vid: u16, pid: u16) -> bool {
        self.vid == vid && self.pid == pid
    }
}

impl Default for UsbIdentity {
    fn default() -> Self {
        Self::BEACON
    }
}

impl fmt::Debug for UsbIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vid, self.pid)
    }
}

/// Configuration for the device connection.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Hardware identity of the beacon's serial port.
    pub identity: UsbIdentity,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay between port scans while searching.
    pub poll_interval: Duration,
    /// Maximum wait for a cooperative shutdown.
    pub shutdown_timeout: Duration,
    /// Pause after a swallowed line-status error.
    pub benign_error_backoff: Duration,
}

impl DeviceConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: UsbIdentity::BEACON,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            benign_error_backoff: DEFAULT_BENIGN_ERROR_BACKOFF,
        }
    }

    /// Sets the USB identity to search for.
    #[must_use]
    pub const fn identity(mut self, identity: UsbIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the port scan interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the pause after a swallowed line-status error.
    #[must_use]
    pub const fn benign_error_backoff(mut self, backoff: Duration) -> Self {
        self.benign_error_backoff = backoff;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}
