//! Main [`Beacon`] client implementation.
//!
//! This module provides the high-level [`Beacon`] client that combines
//! the connection supervisor, event dispatch, and typed commands into a
//! unified interface.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::commands::Command;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, Handlers, Subscription};
use crate::protocol::IncomingKind;
use crate::supervisor::{self, ConnectionState};
use crate::transport::{Connector, PortLocator, SerialConnector, SerialPortLocator};
use crate::types::{
    ActiveTxMode, CalibrationFrequency, CalibrationType, WifiCredentials, check_calibration_value,
};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Client for a USB-attached WSPR beacon.
///
/// Starting a client spawns a background task that searches for the
/// beacon, connects when it appears and reconnects after it is unplugged.
/// Command methods only queue; they never wait for the device.
pub struct Beacon {
    dispatcher: EventDispatcher,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Beacon {
    /// Starts a client that looks for the beacon on the serial ports.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn start(config: DeviceConfig) -> Self {
        let locator = Arc::new(SerialPortLocator::new(config.identity));
        let connector = Arc::new(SerialConnector::new(config.baud_rate));
        Self::start_with(locator, connector, config)
    }

    /// Starts a client with a custom locator and connector.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn start_with(
        locator: Arc<dyn PortLocator>,
        connector: Arc<dyn Connector>,
        config: DeviceConfig,
    ) -> Self {
        let dispatcher = EventDispatcher::new(EVENT_CAPACITY);
        let shutdown_timeout = config.shutdown_timeout;
        let handle = supervisor::spawn(locator, connector, config, dispatcher.clone());

        Self {
            dispatcher,
            commands: handle.commands,
            state: handle.state,
            shutdown: handle.shutdown,
            task: Some(handle.task),
            shutdown_timeout,
        }
    }

    /// Replaces all registered handlers.
    ///
    /// Handlers run on the supervisor task, in registration order, for
    /// every event of their kind. They must not block.
    pub fn register_handlers(&self, handlers: Handlers) {
        self.dispatcher.set_handlers(handlers);
    }

    /// Returns the current connection state.
    ///
    /// Always [`ConnectionState::Stopped`] once [`shutdown`](Self::shutdown)
    /// has returned, even if the task had to be aborted.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.task.is_none() {
            return ConnectionState::Stopped;
        }
        self.state.borrow().clone()
    }

    /// Returns true if the beacon is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.task.is_some() && self.state.borrow().is_connected()
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Waits for the next event of `kind`.
    pub async fn wait_for(&self, kind: IncomingKind, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(kind, timeout).await
    }

    // ==================== Commands ====================

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ChannelClosed)
    }

    /// Requests mode, connection, version and calibration information.
    pub fn get_device_info(&self) -> Result<()> {
        self.send(Command::GetDeviceInfo)
    }

    /// Sets the transmission mode, or clears it with [`ActiveTxMode::Inactive`].
    pub fn set_active_tx_mode(&self, mode: ActiveTxMode) -> Result<()> {
        self.send(Command::SetActiveTxMode(mode))
    }

    /// Starts the hardware self-check.
    pub fn run_self_check(&self) -> Result<()> {
        self.send(Command::RunSelfCheck)
    }

    /// Selects automatic or manual calibration.
    pub fn set_calibration_type(&self, method: CalibrationType) -> Result<()> {
        self.send(Command::SetCalibrationMethod(method))
    }

    /// Sets the manual calibration value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is out of range.
    pub fn set_calibration_value(&self, value: i32) -> Result<()> {
        let value = check_calibration_value(value)?;
        self.send(Command::SetCalibrationValue(value))
    }

    /// Starts generating `frequency`, or stops with `None`.
    pub fn gen_calibration_frequency(&self, frequency: Option<CalibrationFrequency>) -> Result<()> {
        self.send(Command::GenerateCalibrationFrequency(frequency))
    }

    /// Asks the beacon to join a Wi-Fi network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either value is empty or
    /// contains whitespace.
    pub fn run_wifi_connection(&self, ssid: &str, password: &str) -> Result<()> {
        let credentials = WifiCredentials::new(ssid, password)?;
        self.send(Command::RunWifiConnection(credentials))
    }

    /// Allows or forbids Wi-Fi connections.
    pub fn set_wifi_connection_allowed(&self, allowed: bool) -> Result<()> {
        self.send(Command::AllowWifiConnection(allowed))
    }

    /// Stops the background task.
    ///
    /// Waits up to the configured shutdown timeout, then aborts the task
    /// and waits for it to unwind. When this returns the link is closed and
    /// commands fail with [`Error::ChannelClosed`].
    pub async fn shutdown(&mut self) {
        self.shutdown.send_replace(true);
        let Some(mut task) = self.task.take() else {
            return;
        };

        if tokio::time::timeout(self.shutdown_timeout, &mut task)
            .await
            .is_err()
        {
            tracing::warn!(
                "supervisor did not stop within {:?}, aborting",
                self.shutdown_timeout
            );
            task.abort();
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for Beacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Beacon {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
