//! Transmission mode parameters.
//!
//! Every field type validates on construction, so a [`TxParameters`]
//! value always holds something the beacon firmware accepts.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum call sign length.
pub const MAX_CALL_LEN: usize = 6;

/// Maximum locator length.
pub const MAX_LOCATOR_LEN: usize = 4;

/// Maximum output power in dBm.
pub const MAX_POWER_DBM: u8 = 99;

/// Transmission modes supported by the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransmissionMode {
    /// Weak Signal Propagation Reporter.
    Wspr,
}

impl TransmissionMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wspr => "WSPR",
        }
    }
}

impl FromStr for TransmissionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WSPR" => Ok(Self::Wspr),
            _ => Err(Error::invalid(format!("unknown transmission mode {s:?}"))),
        }
    }
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Station call sign: 1-6 uppercase letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSign(String);

impl CallSign {
    /// Validates and wraps a call sign.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_CALL_LEN {
            return Err(Error::invalid(format!(
                "call sign {value:?} must be 1-{MAX_CALL_LEN} characters"
            )));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(Error::invalid(format!(
                "call sign {value:?} must be uppercase letters and digits"
            )));
        }
        Ok(Self(value))
    }

    /// Returns the call sign text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CallSign {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for CallSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// QTH locator: up to two uppercase letters followed by up to two digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    /// Validates and wraps a locator.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let letters = value.bytes().take_while(u8::is_ascii_uppercase).count();
        let digits = value[letters..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();

        let valid = !value.is_empty()
            && value.len() <= MAX_LOCATOR_LEN
            && letters <= 2
            && digits <= 2
            && letters + digits == value.len();

        if valid {
            Ok(Self(value))
        } else {
            Err(Error::invalid(format!(
                "locator {value:?} must be up to 2 letters followed by up to 2 digits"
            )))
        }
    }

    /// Returns the locator text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output power in dBm (0-99).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPower(u8);

impl OutputPower {
    /// Validates an output power value.
    pub fn new(dbm: u8) -> Result<Self> {
        if dbm > MAX_POWER_DBM {
            return Err(Error::invalid(format!(
                "output power {dbm} dBm exceeds {MAX_POWER_DBM}"
            )));
        }
        Ok(Self(dbm))
    }

    /// Returns the power in dBm.
    #[must_use]
    pub const fn dbm(self) -> u8 {
        self.0
    }
}

impl FromStr for OutputPower {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let dbm = s
            .parse::<u8>()
            .map_err(|_| Error::invalid(format!("output power {s:?} is not a number")))?;
        Self::new(dbm)
    }
}

impl fmt::Display for OutputPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How often the beacon transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxInterval {
    /// Every 2 minutes (every WSPR slot).
    #[default]
    TwoMinutes,
    /// Every 10 minutes.
    TenMinutes,
    /// Every 30 minutes.
    ThirtyMinutes,
    /// Every 60 minutes.
    SixtyMinutes,
}

impl TxInterval {
    /// All intervals, shortest first.
    pub const ALL: [Self; 4] = [
        Self::TwoMinutes,
        Self::TenMinutes,
        Self::ThirtyMinutes,
        Self::SixtyMinutes,
    ];

    /// Interval length in minutes.
    #[must_use]
    pub const fn minutes(self) -> u32 {
        match self {
            Self::TwoMinutes => 2,
            Self::TenMinutes => 10,
            Self::ThirtyMinutes => 30,
            Self::SixtyMinutes => 60,
        }
    }

    /// Display text, e.g. `"2 minutes"`. Occupies two wire tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TwoMinutes => "2 minutes",
            Self::TenMinutes => "10 minutes",
            Self::ThirtyMinutes => "30 minutes",
            Self::SixtyMinutes => "60 minutes",
        }
    }
}

impl FromStr for TxInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| Error::invalid(format!("unknown transmit interval {s:?}")))
    }
}

impl fmt::Display for TxInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amateur radio bands the beacon can transmit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Band {
    /// 2200 m (136 kHz).
    M2200,
    /// 630 m (474 kHz).
    M600,
    /// 160 m.
    M160,
    /// 80 m.
    M80,
    /// 60 m.
    M60,
    /// 40 m.
    #[default]
    M40,
    /// 30 m.
    M30,
    /// 20 m.
    M20,
    /// 17 m.
    M17,
    /// 15 m.
    M15,
    /// 12 m.
    M12,
    /// 10 m.
    M10,
    /// 6 m.
    M6,
    /// 4 m.
    M4,
    /// 2 m.
    M2,
}

impl Band {
    /// All bands, longest wavelength first.
    pub const ALL: [Self; 15] = [
        Self::M2200,
        Self::M600,
        Self::M160,
        Self::M80,
        Self::M60,
        Self::M40,
        Self::M30,
        Self::M20,
        Self::M17,
        Self::M15,
        Self::M12,
        Self::M10,
        Self::M6,
        Self::M4,
        Self::M2,
    ];

    /// Band name as used on the wire, e.g. `"40m"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::M2200 => "2200m",
            Self::M600 => "600m",
            Self::M160 => "160m",
            Self::M80 => "80m",
            Self::M60 => "60m",
            Self::M40 => "40m",
            Self::M30 => "30m",
            Self::M20 => "20m",
            Self::M17 => "17m",
            Self::M15 => "15m",
            Self::M12 => "12m",
            Self::M10 => "10m",
            Self::M6 => "6m",
            Self::M4 => "4m",
            Self::M2 => "2m",
        }
    }

    /// Band code used by the wspr.live database (integer MHz, -1 for LF).
    #[must_use]
    pub const fn wspr_live_code(self) -> i16 {
        match self {
            Self::M2200 => -1,
            Self::M600 => 0,
            Self::M160 => 1,
            Self::M80 => 3,
            Self::M60 => 5,
            Self::M40 => 7,
            Self::M30 => 10,
            Self::M20 => 14,
            Self::M17 => 18,
            Self::M15 => 21,
            Self::M12 => 24,
            Self::M10 => 28,
            Self::M6 => 50,
            Self::M4 => 70,
            Self::M2 => 144,
        }
    }
}

impl FromStr for Band {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|band| band.name() == s)
            .ok_or_else(|| Error::InvalidBand { band: s.to_owned() })
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of an active WSPR transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParameters {
    /// Transmitting station call sign.
    pub call: CallSign,
    /// Transmitting station locator.
    pub locator: Locator,
    /// Reported output power.
    pub power: OutputPower,
    /// Transmission interval.
    pub interval: TxInterval,
    /// Band to transmit on.
    pub band: Band,
}

impl TxParameters {
    /// Builds parameters from raw values, validating each field.
    pub fn new(
        call: &str,
        locator: &str,
        power_dbm: u8,
        interval: TxInterval,
        band: Band,
    ) -> Result<Self> {
        Ok(Self {
            call: CallSign::new(call)?,
            locator: Locator::new(locator)?,
            power: OutputPower::new(power_dbm)?,
            interval,
            band,
        })
    }
}

/// The beacon's currently configured transmission.
///
/// `Inactive` means no transmission mode is set; none of the parameters
/// exist in that state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveTxMode {
    /// No active mode.
    #[default]
    Inactive,
    /// WSPR transmission with the given parameters.
    Wspr(TxParameters),
}

impl ActiveTxMode {
    /// Returns the transmission mode, if any.
    #[must_use]
    pub const fn transmission_mode(&self) -> Option<TransmissionMode> {
        match self {
            Self::Inactive => None,
            Self::Wspr(_) => Some(TransmissionMode::Wspr),
        }
    }

    /// Returns the parameters, if a mode is active.
    #[must_use]
    pub const fn parameters(&self) -> Option<&TxParameters> {
        match self {
            Self::Inactive => None,
            Self::Wspr(params) => Some(params),
        }
    }

    /// Returns true if a mode is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Wspr(_))
    }
}
