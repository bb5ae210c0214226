//! # wspr-beacon
//!
//! A Rust client library for USB-attached WSPR beacons.
//!
//! This library keeps a connection to the beacon alive over USB/Serial,
//! sends typed commands and delivers the beacon's reports as typed events.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Automatic discovery and reconnection by USB vendor/product id
//! - Event-driven architecture for handling device reports
//! - Type-safe line protocol implementation
//! - Optional wspr.live spot history client (feature `spots`)
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use wspr_beacon::{Beacon, DeviceConfig, Event, Handlers, IncomingKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wspr_beacon::Error> {
//!     let mut beacon = Beacon::start(DeviceConfig::new());
//!
//!     beacon.register_handlers(
//!         Handlers::new()
//!             .on(IncomingKind::FirmwareInfo, |event| println!("{event:?}"))
//!             .on(IncomingKind::SelfCheckAction, |event| {
//!                 if let Event::SelfCheckAction(text) = event {
//!                     println!("self-check: {text}");
//!                 }
//!             }),
//!     );
//!
//!     beacon.run_self_check()?;
//!     beacon
//!         .wait_for(IncomingKind::SelfCheckStatus, Duration::from_secs(30))
//!         .await;
//!
//!     beacon.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`types`] - Value types (transmission parameters, calibration, Wi-Fi)
//! - [`protocol`] - Line framing and the message codec
//! - [`commands`] / [`event`] - Outgoing and incoming messages
//! - [`transport`] - Port discovery and serial links
//! - [`supervisor`] - Background connection task
//! - [`client`] - High-level [`Beacon`] client
//! - [`emulator`] - In-process beacon for running without hardware
//! - `spots` - wspr.live spot history (feature `spots`)

pub mod client;
pub mod commands;
pub mod config;
pub mod emulator;
pub mod error;
pub mod event;
pub mod protocol;
#[cfg(feature = "spots")]
pub mod spots;
pub mod supervisor;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::Beacon;
pub use commands::Command;
pub use config::{DeviceConfig, UsbIdentity};
pub use error::{DecodeError, Error, LineError, Result};
pub use event::{Event, EventDispatcher, Handler, Handlers, Subscription};
pub use protocol::{IncomingKind, OutgoingKind};
#[cfg(feature = "spots")]
pub use spots::{SortDirection, SortField, Spot, SpotsClient};
pub use supervisor::ConnectionState;
pub use transport::{Connector, PortLocator, serial::list_ports};
pub use types::{
    ActiveTxMode, Band, CalibrationFrequency, CalibrationType, CallSign, ConnectionStatus,
    Locator, OutputPower, TransmissionMode, TxInterval, TxParameters, WifiCredentials,
};
