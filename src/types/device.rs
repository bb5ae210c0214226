//! Device settings and status types.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Smallest accepted manual calibration value.
pub const MIN_CAL_VALUE: i32 = -9999;

/// Largest accepted manual calibration value.
pub const MAX_CAL_VALUE: i32 = 9999;

/// How the beacon calibrates its frequency reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalibrationType {
    /// Self-calibration against GPS.
    #[default]
    Auto,
    /// Manually supplied adjustment value.
    Manual,
}

impl CalibrationType {
    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }
}

impl FromStr for CalibrationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AUTO" => Ok(Self::Auto),
            "MANUAL" => Ok(Self::Manual),
            _ => Err(Error::invalid(format!("unknown calibration type {s:?}"))),
        }
    }
}

impl fmt::Display for CalibrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the beacon is currently connected to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// No link to the device.
    #[default]
    NotConnected,
    /// Connected over USB serial.
    Usb,
    /// Connected over Wi-Fi.
    Wifi,
}

impl ConnectionStatus {
    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::Usb => "USB",
            Self::Wifi => "WIFI",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NOT_CONNECTED" => Ok(Self::NotConnected),
            "USB" => Ok(Self::Usb),
            "WIFI" => Ok(Self::Wifi),
            _ => Err(Error::invalid(format!("unknown connection status {s:?}"))),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wi-Fi access point credentials sent to the beacon.
///
/// Both fields travel as single protocol tokens, so neither may be empty
/// or contain whitespace.
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: String,
    password: String,
}

impl WifiCredentials {
    /// Validates and wraps an access point name and password.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let ssid = ssid.into();
        let password = password.into();
        check_token("access point name", &ssid)?;
        check_token("password", &password)?;
        Ok(Self { ssid, password })
    }

    /// Access point name.
    #[must_use]
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Access point password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn check_token(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid(format!("{what} must not be empty")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::invalid(format!("{what} must not contain whitespace")));
    }
    Ok(())
}

/// Reference frequency for manual calibration, in MHz with kHz resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalibrationFrequency {
    khz: u32,
}

impl CalibrationFrequency {
    /// Lowest accepted frequency (1.000 MHz).
    pub const MIN_KHZ: u32 = 1_000;
    /// Highest accepted frequency (99.999 MHz).
    pub const MAX_KHZ: u32 = 99_999;
    /// Default calibration frequency (28.000 MHz).
    pub const DEFAULT: Self = Self { khz: 28_000 };

    /// Creates a frequency from kHz.
    pub fn from_khz(khz: u32) -> Result<Self> {
        if (Self::MIN_KHZ..=Self::MAX_KHZ).contains(&khz) {
            Ok(Self { khz })
        } else {
            Err(Error::invalid(format!(
                "calibration frequency {khz} kHz outside 1.000-99.999 MHz"
            )))
        }
    }

    /// Creates a frequency from MHz, rounded to the nearest kHz.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_mhz(mhz: f64) -> Result<Self> {
        let khz = (mhz * 1000.0).round();
        if !khz.is_finite() || khz < f64::from(Self::MIN_KHZ) || khz > f64::from(Self::MAX_KHZ) {
            return Err(Error::invalid(format!(
                "calibration frequency {mhz} MHz outside 1.000-99.999 MHz"
            )));
        }
        Self::from_khz(khz as u32)
    }

    /// Frequency in kHz.
    #[must_use]
    pub const fn khz(self) -> u32 {
        self.khz
    }

    /// Frequency in MHz.
    #[must_use]
    pub fn mhz(self) -> f64 {
        f64::from(self.khz) / 1000.0
    }
}

impl Default for CalibrationFrequency {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for CalibrationFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mhz = s
            .parse::<f64>()
            .map_err(|_| Error::invalid(format!("calibration frequency {s:?} is not a number")))?;
        Self::from_mhz(mhz)
    }
}

impl fmt::Display for CalibrationFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.khz / 1000, self.khz % 1000)
    }
}

/// Validates a manual calibration value.
pub fn check_calibration_value(value: i32) -> Result<i32> {
    if (MIN_CAL_VALUE..=MAX_CAL_VALUE).contains(&value) {
        Ok(value)
    } else {
        Err(Error::invalid(format!(
            "calibration value {value} outside {MIN_CAL_VALUE}..={MAX_CAL_VALUE}"
        )))
    }
}
