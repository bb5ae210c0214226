//! Message kinds of the beacon line protocol.
//!
//! Every protocol line starts with the wire name of its kind.

/// Kinds of commands sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutgoingKind {
    // General
    /// Request hardware, firmware and settings information.
    GetDeviceInfo,

    // Transmission
    /// Set or clear the active transmission mode.
    SetActiveTxMode,

    // Self-check
    /// Run the on-device hardware diagnostic.
    RunSelfCheck,

    // Settings
    /// Select automatic or manual calibration.
    SetCalibrationMethod,
    /// Set the manual calibration value.
    SetCalibrationValue,
    /// Start or stop generating the calibration frequency.
    GenerateCalibrationFrequency,
    /// Connect the device to a Wi-Fi access point.
    RunWifiConnection,
    /// Allow or forbid Wi-Fi connections.
    AllowWifiConnection,
}

impl OutgoingKind {
    /// All outgoing kinds.
    pub const ALL: [Self; 8] = [
        Self::GetDeviceInfo,
        Self::SetActiveTxMode,
        Self::RunSelfCheck,
        Self::SetCalibrationMethod,
        Self::SetCalibrationValue,
        Self::GenerateCalibrationFrequency,
        Self::RunWifiConnection,
        Self::AllowWifiConnection,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetDeviceInfo => "GET_DEVICE_INFO",
            Self::SetActiveTxMode => "SET_ACTIVE_TX_MODE",
            Self::RunSelfCheck => "RUN_SELF_CHECK",
            Self::SetCalibrationMethod => "SET_CAL_METHOD",
            Self::SetCalibrationValue => "SET_CAL_VALUE",
            Self::GenerateCalibrationFrequency => "GEN_CAL_FREQUENCY",
            Self::RunWifiConnection => "RUN_WIFI_CONNECTION",
            Self::AllowWifiConnection => "ALLOW_WIFI_CONNECTION",
        }
    }

    /// Looks up a kind by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Kinds of events received from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomingKind {
    // Transmission
    /// Currently configured transmission mode.
    ActiveTxMode,
    /// Human readable transmission progress.
    TxActionStatus,
    /// GPS fix available.
    GpsStatus,
    /// Frequency reference calibrated.
    CalStatus,
    /// Transmitter keyed.
    TxStatus,

    // Self-check
    /// Human readable self-check step.
    SelfCheckAction,
    /// Self-check passed.
    SelfCheckStatus,
    /// Self-check running.
    SelfCheckActive,
    /// Hardware revision text.
    HardwareInfo,
    /// Firmware version text.
    FirmwareInfo,

    // Settings
    /// Current calibration value.
    CalValue,
    /// Calibration frequency output on or off.
    CalFreqGenerated,
    /// Link between device and application.
    ConnectionStatus,
    /// Wi-Fi connection result.
    WifiStatus,

    /// Anything that could not be decoded.
    Other,
}

impl IncomingKind {
    /// All kinds that have a wire name (everything except [`IncomingKind::Other`]).
    pub const WIRE: [Self; 14] = [
        Self::ActiveTxMode,
        Self::TxActionStatus,
        Self::GpsStatus,
        Self::CalStatus,
        Self::TxStatus,
        Self::SelfCheckAction,
        Self::SelfCheckStatus,
        Self::SelfCheckActive,
        Self::HardwareInfo,
        Self::FirmwareInfo,
        Self::CalValue,
        Self::CalFreqGenerated,
        Self::ConnectionStatus,
        Self::WifiStatus,
    ];

    /// Wire name of the kind. `Other` has no wire name of its own.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ActiveTxMode => "ACTIVE_TX_MODE",
            Self::TxActionStatus => "TX_ACTION_STATUS",
            Self::GpsStatus => "GPS_STATUS",
            Self::CalStatus => "CAL_STATUS",
            Self::TxStatus => "TX_STATUS",
            Self::SelfCheckAction => "SELF_CHECK_ACTION",
            Self::SelfCheckStatus => "SELF_CHECK_STATUS",
            Self::SelfCheckActive => "SELF_CHECK_ACTIVE",
            Self::HardwareInfo => "HARDWARE_INFO",
            Self::FirmwareInfo => "FIRMWARE_INFO",
            Self::CalValue => "CAL_VALUE",
            Self::CalFreqGenerated => "CAL_FREQ_GENERATED",
            Self::ConnectionStatus => "CONNECTION_STATUS",
            Self::WifiStatus => "WIFI_STATUS",
            Self::Other => "OTHER",
        }
    }

    /// Looks up a kind by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::WIRE.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns true for kinds whose payload is a `True`/`False` flag.
    #[must_use]
    pub const fn is_flag(self) -> bool {
        matches!(
            self,
            Self::GpsStatus
                | Self::CalStatus
                | Self::TxStatus
                | Self::SelfCheckStatus
                | Self::SelfCheckActive
                | Self::CalFreqGenerated
                | Self::WifiStatus
        )
    }

    /// Returns true for kinds whose payload is free text.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Self::TxActionStatus | Self::SelfCheckAction | Self::HardwareInfo | Self::FirmwareInfo
        )
    }
}
