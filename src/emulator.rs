//! In-process beacon emulator.
//!
//! [`Emulator`] speaks the device side of the line protocol over any
//! byte stream and answers commands the way the beacon firmware does.
//! [`EmulatorLocator`] and [`EmulatorConnector`] plug it into a
//! [`Beacon`](crate::Beacon) so the whole stack can run without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::commands::Command;
use crate::error::Result;
use crate::event::Event;
use crate::protocol::{LineDecoder, decode_command, encode_event};
use crate::transport::{Connector, Link, PortLocator};
use crate::types::{ActiveTxMode, CalibrationType, ConnectionStatus};

/// Port name reported by [`EmulatorLocator`].
pub const EMULATOR_PORT: &str = "emulator";

/// Hardware revision reported by default.
pub const DEFAULT_HARDWARE_VERSION: &str = "3.0";

/// Firmware version reported by default.
pub const DEFAULT_FIRMWARE_VERSION: &str = "2.0";

/// Calibration value reported by default.
pub const DEFAULT_CAL_VALUE: i32 = 2000;

const SELF_CHECK_STEPS: [&str; 8] = [
    "- LEDs initialized! -",
    "- SI5351 successfully initialized at address 0x60 -",
    "- Establishing a serial connection to the GPS module ... -",
    "- Serial connection to GPS module successfully established! -",
    "- SI5351 successfully initialized at address 0x60 -",
    "- GPS data synchronization test ... -",
    "- Date & time (GMT) synchronized by GPS: 2/7/2024 17:17:44 -",
    "- Location synchronized by GPS: 52.2285, 20.9324 -",
];

/// Settings held by the emulated beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// Configured transmission mode.
    pub tx_mode: ActiveTxMode,
    /// Calibration method.
    pub calibration_type: CalibrationType,
    /// Calibration value.
    pub cal_value: i32,
    /// Whether Wi-Fi connections are allowed.
    pub wifi_allowed: bool,
    /// Hardware revision.
    pub hardware: String,
    /// Firmware version.
    pub firmware: String,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            tx_mode: ActiveTxMode::Inactive,
            calibration_type: CalibrationType::Auto,
            cal_value: DEFAULT_CAL_VALUE,
            wifi_allowed: false,
            hardware: DEFAULT_HARDWARE_VERSION.into(),
            firmware: DEFAULT_FIRMWARE_VERSION.into(),
        }
    }
}

impl DeviceState {
    /// Applies a command and returns the events the beacon answers with.
    pub fn apply(&mut self, command: &Command) -> Vec<Event> {
        match command {
            Command::GetDeviceInfo => vec![
                Event::ActiveTxMode(self.tx_mode.clone()),
                Event::ConnectionStatus(ConnectionStatus::Usb),
                Event::HardwareInfo(self.hardware.clone()),
                Event::FirmwareInfo(self.firmware.clone()),
                Event::CalStatus(true),
                Event::CalValue(self.cal_value),
            ],
            Command::SetActiveTxMode(mode) => {
                self.tx_mode = mode.clone();
                self.transmission_cycle()
            }
            Command::RunSelfCheck => {
                let mut events = vec![Event::SelfCheckActive(true)];
                events.extend(
                    SELF_CHECK_STEPS
                        .iter()
                        .map(|step| Event::SelfCheckAction((*step).to_owned())),
                );
                events.push(Event::SelfCheckStatus(true));
                events.push(Event::SelfCheckActive(false));
                events
            }
            Command::SetCalibrationMethod(method) => {
                self.calibration_type = *method;
                Vec::new()
            }
            Command::SetCalibrationValue(value) => {
                self.cal_value = *value;
                vec![Event::CalValue(*value)]
            }
            Command::GenerateCalibrationFrequency(frequency) => {
                vec![Event::CalFreqGenerated(frequency.is_some())]
            }
            // No access point is reachable from the emulator
            Command::RunWifiConnection(_) => vec![Event::WifiStatus(false)],
            Command::AllowWifiConnection(allowed) => {
                self.wifi_allowed = *allowed;
                Vec::new()
            }
        }
    }

    /// Echoes the mode and runs one transmission window.
    fn transmission_cycle(&self) -> Vec<Event> {
        let mut events = vec![Event::ActiveTxMode(self.tx_mode.clone())];
        let Some(params) = self.tx_mode.parameters() else {
            events.push(Event::TxActionStatus("- No active mode -".into()));
            return events;
        };
        events.extend([
            Event::GpsStatus(true),
            Event::CalStatus(true),
            Event::TxActionStatus("- Waiting for next transmission window... -".into()),
            Event::TxStatus(true),
            Event::TxActionStatus(format!(
                "- WSPR transmission {} {} {} at {} band -",
                params.call, params.locator, params.power, params.band
            )),
            Event::TxActionStatus("- WSPR transmission finished! -".into()),
            Event::TxStatus(false),
        ]);
        events
    }
}

/// Emulated beacon serving one byte stream.
pub struct Emulator<S> {
    stream: S,
    state: DeviceState,
    step_delay: Duration,
}

impl<S> Emulator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates an emulator with default device state.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: DeviceState::default(),
            step_delay: Duration::ZERO,
        }
    }

    /// Sets the initial device state.
    #[must_use]
    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    /// Sets the pause between lines of a multi-line answer.
    #[must_use]
    pub const fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Returns the current device state.
    #[must_use]
    pub const fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Serves commands until the host closes the stream.
    ///
    /// Returns the final device state.
    pub async fn run(mut self) -> Result<DeviceState> {
        let mut decoder = LineDecoder::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!("emulator: host closed the stream");
                return Ok(self.state);
            }
            decoder.feed(&buf[..n]);

            loop {
                let line = match decoder.decode() {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!("emulator: {e}");
                        continue;
                    }
                };
                match decode_command(&line) {
                    Ok(command) => self.answer(&command).await?,
                    Err(e) => tracing::debug!("emulator: ignoring {line:?}: {e}"),
                }
            }
        }
    }

    async fn answer(&mut self, command: &Command) -> Result<()> {
        let events = self.state.apply(command);
        for (i, event) in events.iter().enumerate() {
            if i > 0 && !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            self.stream.write_all(&encode_event(event)).await?;
            self.stream.flush().await?;
        }
        Ok(())
    }
}

/// Locator that reports the emulator while it is plugged in.
#[derive(Debug)]
pub struct EmulatorLocator {
    present: AtomicBool,
}

impl EmulatorLocator {
    /// Creates a plugged-in locator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            present: AtomicBool::new(true),
        }
    }

    /// Makes the emulator visible or invisible to port scans.
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }
}

impl Default for EmulatorLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortLocator for EmulatorLocator {
    fn find_device(&self) -> Option<String> {
        self.present
            .load(Ordering::SeqCst)
            .then(|| EMULATOR_PORT.to_owned())
    }
}

/// Connector that spawns a fresh [`Emulator`] for every opened link.
#[derive(Debug, Clone, Default)]
pub struct EmulatorConnector {
    state: DeviceState,
    step_delay: Duration,
}

impl EmulatorConnector {
    /// Creates a connector with default device state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the device state each new emulator starts from.
    #[must_use]
    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    /// Sets the emulator's pause between lines of an answer.
    #[must_use]
    pub const fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Wraps the connector for use with [`Beacon::start_with`](crate::Beacon::start_with).
    #[must_use]
    pub fn shared(self) -> Arc<dyn Connector> {
        Arc::new(self)
    }
}

impl Connector for EmulatorConnector {
    fn open<'a>(&'a self, port: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>> {
        Box::pin(async move {
            tracing::debug!("starting emulator on {port}");
            let (host, device) = tokio::io::duplex(4096);
            let emulator = Emulator::new(device)
                .with_state(self.state.clone())
                .step_delay(self.step_delay);
            tokio::spawn(async move {
                if let Err(e) = emulator.run().await {
                    tracing::debug!("emulator stopped: {e}");
                }
            });
            Ok(Box::new(host) as Box<dyn Link>)
        })
    }
}
