//! Conversion between typed messages and protocol lines.
//!
//! The application side uses [`encode_command`] and [`decode_event`]; the
//! device side (see [`crate::emulator`]) uses [`decode_command`] and
//! [`encode_event`].

use std::str::FromStr;

use bytes::Bytes;

use crate::commands::Command;
use crate::error::DecodeError;
use crate::event::Event;
use crate::protocol::kind::{IncomingKind, OutgoingKind};
use crate::protocol::line;
use crate::types::{
    ActiveTxMode, CalibrationFrequency, CalibrationType, CallSign, ConnectionStatus, Locator,
    OutputPower, TransmissionMode, TxInterval, TxParameters, WifiCredentials,
};

/// Token for an absent payload.
pub const NONE_TOKEN: &str = "None";

/// Token for `true`.
pub const TRUE_TOKEN: &str = "True";

/// Token for `false`.
pub const FALSE_TOKEN: &str = "False";

/// Token count of a line carrying active mode parameters.
const TX_MODE_TOKENS: usize = 8;

const fn flag_token(value: bool) -> &'static str {
    if value { TRUE_TOKEN } else { FALSE_TOKEN }
}

/// Appends the payload tokens of an [`ActiveTxMode`].
fn push_tx_mode(tokens: &mut Vec<String>, mode: &ActiveTxMode) {
    match mode {
        ActiveTxMode::Inactive => tokens.push(NONE_TOKEN.to_owned()),
        ActiveTxMode::Wspr(params) => {
            tokens.push(TransmissionMode::Wspr.name().to_owned());
            tokens.push(params.call.to_string());
            tokens.push(params.locator.to_string());
            tokens.push(params.power.to_string());
            // "2 minutes" becomes two tokens
            tokens.extend(params.interval.as_str().split(' ').map(str::to_owned));
            tokens.push(params.band.to_string());
        }
    }
}

/// Encodes a command into a protocol line.
///
/// ```text
/// SET_ACTIVE_TX_MODE WSPR N0CALL XX00 23 2 minutes 40m
/// SET_ACTIVE_TX_MODE None
/// GEN_CAL_FREQUENCY 28.000
/// GEN_CAL_FREQUENCY False
/// ```
#[must_use]
pub fn encode_command(command: &Command) -> Bytes {
    let mut tokens = vec![command.kind().name().to_owned()];

    match command {
        Command::GetDeviceInfo | Command::RunSelfCheck => {}
        Command::SetActiveTxMode(mode) => push_tx_mode(&mut tokens, mode),
        Command::SetCalibrationMethod(method) => tokens.push(method.name().to_owned()),
        Command::SetCalibrationValue(value) => tokens.push(value.to_string()),
        Command::GenerateCalibrationFrequency(frequency) => tokens.push(
            frequency.map_or_else(|| FALSE_TOKEN.to_owned(), |freq| freq.to_string()),
        ),
        Command::RunWifiConnection(credentials) => {
            tokens.push(credentials.ssid().to_owned());
            tokens.push(credentials.password().to_owned());
        }
        Command::AllowWifiConnection(allowed) => tokens.push(flag_token(*allowed).to_owned()),
    }

    line::encode(&tokens)
}

/// Encodes an event into a protocol line.
///
/// `Event::Other` is written back verbatim.
#[must_use]
pub fn encode_event(event: &Event) -> Bytes {
    let mut tokens = vec![event.kind().name().to_owned()];

    match event {
        Event::ActiveTxMode(mode) => push_tx_mode(&mut tokens, mode),
        Event::TxActionStatus(text)
        | Event::SelfCheckAction(text)
        | Event::HardwareInfo(text)
        | Event::FirmwareInfo(text) => {
            if !text.is_empty() {
                tokens.push(text.clone());
            }
        }
        Event::GpsStatus(flag)
        | Event::CalStatus(flag)
        | Event::TxStatus(flag)
        | Event::SelfCheckStatus(flag)
        | Event::SelfCheckActive(flag)
        | Event::CalFreqGenerated(flag)
        | Event::WifiStatus(flag) => tokens.push(flag_token(*flag).to_owned()),
        Event::CalValue(value) => tokens.push(value.to_string()),
        Event::ConnectionStatus(status) => tokens.push(status.name().to_owned()),
        Event::Other(raw) => return line::encode([raw.as_str()]),
    }

    line::encode(&tokens)
}

/// Decodes a line received from the device.
///
/// Never fails: anything that cannot be decoded becomes [`Event::Other`]
/// carrying the raw line.
#[must_use]
pub fn decode_event(raw: &str) -> Event {
    match try_decode_event(raw) {
        Ok(event) => event,
        Err(e @ (DecodeError::Empty | DecodeError::UnknownKind(_))) => {
            tracing::debug!("passing through {raw:?}: {e}");
            Event::Other(raw.to_owned())
        }
        Err(e) => {
            tracing::warn!("failed to decode {raw:?}: {e}");
            Event::Other(raw.to_owned())
        }
    }
}

fn try_decode_event(raw: &str) -> Result<Event, DecodeError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let (&name, _) = tokens.split_first().ok_or(DecodeError::Empty)?;
    let kind =
        IncomingKind::from_name(name).ok_or_else(|| DecodeError::UnknownKind(name.to_owned()))?;

    if kind.is_text() {
        let text = tokens[1..].join(" ");
        return Ok(match kind {
            IncomingKind::TxActionStatus => Event::TxActionStatus(text),
            IncomingKind::SelfCheckAction => Event::SelfCheckAction(text),
            IncomingKind::HardwareInfo => Event::HardwareInfo(text),
            _ => Event::FirmwareInfo(text),
        });
    }

    if kind == IncomingKind::ActiveTxMode {
        return parse_tx_mode(kind.name(), &tokens).map(Event::ActiveTxMode);
    }

    let value = single_payload(kind.name(), &tokens)?;

    if kind.is_flag() {
        // Anything but the literal "False" is true
        let flag = value != FALSE_TOKEN;
        return Ok(match kind {
            IncomingKind::GpsStatus => Event::GpsStatus(flag),
            IncomingKind::CalStatus => Event::CalStatus(flag),
            IncomingKind::TxStatus => Event::TxStatus(flag),
            IncomingKind::SelfCheckStatus => Event::SelfCheckStatus(flag),
            IncomingKind::SelfCheckActive => Event::SelfCheckActive(flag),
            IncomingKind::CalFreqGenerated => Event::CalFreqGenerated(flag),
            _ => Event::WifiStatus(flag),
        });
    }

    match kind {
        IncomingKind::CalValue => parse_token(kind.name(), value).map(Event::CalValue),
        IncomingKind::ConnectionStatus => {
            parse_token::<ConnectionStatus>(kind.name(), value).map(Event::ConnectionStatus)
        }
        _ => Err(DecodeError::UnknownKind(name.to_owned())),
    }
}

/// Decodes a command line, as the device would.
///
/// # Errors
///
/// Returns a [`DecodeError`] for unknown kinds, wrong token counts or
/// invalid payload tokens.
pub fn decode_command(raw: &str) -> Result<Command, DecodeError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let (&name, _) = tokens.split_first().ok_or(DecodeError::Empty)?;
    let kind =
        OutgoingKind::from_name(name).ok_or_else(|| DecodeError::UnknownKind(name.to_owned()))?;
    let label = kind.name();

    match kind {
        OutgoingKind::GetDeviceInfo => {
            expect_tokens(label, &tokens, 1)?;
            Ok(Command::GetDeviceInfo)
        }
        OutgoingKind::RunSelfCheck => {
            expect_tokens(label, &tokens, 1)?;
            Ok(Command::RunSelfCheck)
        }
        OutgoingKind::SetActiveTxMode => {
            parse_tx_mode(label, &tokens).map(Command::SetActiveTxMode)
        }
        OutgoingKind::SetCalibrationMethod => {
            let value = single_payload(label, &tokens)?;
            parse_token::<CalibrationType>(label, value).map(Command::SetCalibrationMethod)
        }
        OutgoingKind::SetCalibrationValue => {
            let value = single_payload(label, &tokens)?;
            parse_token(label, value).map(Command::SetCalibrationValue)
        }
        OutgoingKind::GenerateCalibrationFrequency => {
            let value = single_payload(label, &tokens)?;
            if value == FALSE_TOKEN {
                Ok(Command::GenerateCalibrationFrequency(None))
            } else {
                parse_token::<CalibrationFrequency>(label, value)
                    .map(|freq| Command::GenerateCalibrationFrequency(Some(freq)))
            }
        }
        OutgoingKind::RunWifiConnection => {
            expect_tokens(label, &tokens, 3)?;
            WifiCredentials::new(tokens[1], tokens[2])
                .map(Command::RunWifiConnection)
                .map_err(|_| invalid(label, tokens[1]))
        }
        OutgoingKind::AllowWifiConnection => {
            let value = single_payload(label, &tokens)?;
            Ok(Command::AllowWifiConnection(value != FALSE_TOKEN))
        }
    }
}

/// Parses the payload of an active mode line (shared by command and event).
fn parse_tx_mode(kind: &'static str, tokens: &[&str]) -> Result<ActiveTxMode, DecodeError> {
    match tokens.get(1) {
        None => Err(DecodeError::TokenCount {
            kind,
            expected: 2,
            got: tokens.len(),
        }),
        Some(&NONE_TOKEN) => {
            expect_tokens(kind, tokens, 2)?;
            Ok(ActiveTxMode::Inactive)
        }
        Some(_) => {
            expect_tokens(kind, tokens, TX_MODE_TOKENS)?;
            let mode: TransmissionMode = parse_token(kind, tokens[1])?;
            let interval = format!("{} {}", tokens[5], tokens[6]);
            let params = TxParameters {
                call: parse_token::<CallSign>(kind, tokens[2])?,
                locator: parse_token::<Locator>(kind, tokens[3])?,
                power: parse_token::<OutputPower>(kind, tokens[4])?,
                interval: parse_token::<TxInterval>(kind, &interval)?,
                band: parse_token(kind, tokens[7])?,
            };
            Ok(match mode {
                TransmissionMode::Wspr => ActiveTxMode::Wspr(params),
            })
        }
    }
}

fn expect_tokens(kind: &'static str, tokens: &[&str], expected: usize) -> Result<(), DecodeError> {
    if tokens.len() == expected {
        Ok(())
    } else {
        Err(DecodeError::TokenCount {
            kind,
            expected,
            got: tokens.len(),
        })
    }
}

/// Returns the only payload token of a two token line.
fn single_payload<'a>(kind: &'static str, tokens: &[&'a str]) -> Result<&'a str, DecodeError> {
    expect_tokens(kind, tokens, 2)?;
    Ok(tokens[1])
}

fn parse_token<T: FromStr>(kind: &'static str, token: &str) -> Result<T, DecodeError> {
    token.parse().map_err(|_| invalid(kind, token))
}

fn invalid(kind: &'static str, token: &str) -> DecodeError {
    DecodeError::InvalidToken {
        kind,
        token: token.to_owned(),
    }
}
