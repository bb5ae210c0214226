//! Data types for beacon settings and state.
//!
//! This module contains the value types carried by commands and events:
//! - Transmission mode and its parameters
//! - Calibration and connection state
//! - Wi-Fi credentials

pub mod device;
pub mod tx_mode;

pub use device::{
    CalibrationFrequency, CalibrationType, ConnectionStatus, MAX_CAL_VALUE, MIN_CAL_VALUE,
    WifiCredentials, check_calibration_value,
};
pub use tx_mode::{
    ActiveTxMode, Band, CallSign, Locator, MAX_CALL_LEN, MAX_LOCATOR_LEN, MAX_POWER_DBM,
    OutputPower, TransmissionMode, TxInterval, TxParameters,
};
