//! Transport layer for beacon communication.
//!
//! The supervisor finds and opens the beacon through two seams:
//! - [`PortLocator`] answers "which port is the beacon on right now?"
//! - [`Connector`] opens that port as a byte stream.
//!
//! The serial implementations live in [`serial`]; tests and the
//! emulator provide in-process ones.

pub mod serial;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// An open, bidirectional byte stream to the beacon.
pub trait Link: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Link for T {}

/// Finds the port the beacon is attached to.
pub trait PortLocator: Send + Sync {
    /// Returns the port name of the first attached beacon, if any.
    ///
    /// This is a snapshot; the answer may change on the next call.
    /// Implementations may block (port enumeration does); the supervisor
    /// calls this on Tokio's blocking pool.
    fn find_device(&self) -> Option<String>;
}

/// Opens a port found by a [`PortLocator`].
pub trait Connector: Send + Sync {
    /// Opens `port` and returns the stream.
    fn open<'a>(&'a self, port: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>>;
}

pub use serial::{SerialConnector, SerialPortLocator, is_benign_line_status_error, list_ports};
