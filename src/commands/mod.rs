//! Commands sent to the beacon.
//!
//! A [`Command`] is an immutable value: once queued, later changes made by
//! the caller to its own copies cannot affect what is transmitted.

use crate::protocol::OutgoingKind;
use crate::types::{ActiveTxMode, CalibrationFrequency, CalibrationType, WifiCredentials};

/// A command for the beacon, with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request device information.
    GetDeviceInfo,
    /// Set or clear the active transmission mode.
    SetActiveTxMode(ActiveTxMode),
    /// Run the hardware self-check.
    RunSelfCheck,
    /// Select the calibration method.
    SetCalibrationMethod(CalibrationType),
    /// Set the manual calibration value.
    SetCalibrationValue(i32),
    /// Generate the calibration frequency, or stop generating with `None`.
    GenerateCalibrationFrequency(Option<CalibrationFrequency>),
    /// Connect to a Wi-Fi access point.
    RunWifiConnection(WifiCredentials),
    /// Allow or forbid Wi-Fi connections.
    AllowWifiConnection(bool),
}

impl Command {
    /// Returns the kind of this command.
    #[must_use]
    pub const fn kind(&self) -> OutgoingKind {
        match self {
            Self::GetDeviceInfo => OutgoingKind::GetDeviceInfo,
            Self::SetActiveTxMode(_) => OutgoingKind::SetActiveTxMode,
            Self::RunSelfCheck => OutgoingKind::RunSelfCheck,
            Self::SetCalibrationMethod(_) => OutgoingKind::SetCalibrationMethod,
            Self::SetCalibrationValue(_) => OutgoingKind::SetCalibrationValue,
            Self::GenerateCalibrationFrequency(_) => OutgoingKind::GenerateCalibrationFrequency,
            Self::RunWifiConnection(_) => OutgoingKind::RunWifiConnection,
            Self::AllowWifiConnection(_) => OutgoingKind::AllowWifiConnection,
        }
    }
}
