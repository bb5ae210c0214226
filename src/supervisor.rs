//! Connection supervisor.
//!
//! A single background task owns the port locator, the connector, the open
//! link and the outbound queue. It alternates between two phases:
//!
//! - **Searching**: poll the locator every `poll_interval` until the
//!   beacon shows up, then open it.
//! - **Connected**: multiplex reading (bytes → lines → events → dispatch)
//!   and writing (queue → encoded line → link) until the link fails.
//!
//! A lost link produces exactly one `ConnectionStatus(NotConnected)` event
//! and sends the task back to searching. Commands still in the queue are
//! kept for the next connection.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::commands::Command;
use crate::config::DeviceConfig;
use crate::event::{Event, EventDispatcher};
use crate::protocol::{LineDecoder, decode_event, encode_command};
use crate::transport::{Connector, Link, PortLocator, is_benign_line_status_error};
use crate::types::ConnectionStatus;

/// Size of the read buffer.
const READ_BUFFER_SIZE: usize = 1024;

/// Benign line-status errors tolerated while writing one command.
const MAX_BENIGN_WRITE_RETRIES: usize = 3;

/// Connection state of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Polling for the beacon.
    #[default]
    Searching,
    /// Linked to the beacon on `port`.
    Connected {
        /// Port name.
        port: String,
    },
    /// Shut down; no further connection attempts are made.
    Stopped,
}

impl ConnectionState {
    /// Returns true if a link to the beacon is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Handles to a running supervisor task.
pub(crate) struct SupervisorHandle {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) state: watch::Receiver<ConnectionState>,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) task: JoinHandle<()>,
}

/// Spawns the supervisor on the current runtime.
pub(crate) fn spawn(
    locator: Arc<dyn PortLocator>,
    connector: Arc<dyn Connector>,
    config: DeviceConfig,
    dispatcher: EventDispatcher,
) -> SupervisorHandle {
    let (commands, outbound) = mpsc::unbounded_channel();
    let (state_tx, state) = watch::channel(ConnectionState::Searching);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let supervisor = Supervisor {
        locator,
        connector,
        config,
        dispatcher,
        outbound,
        state: state_tx,
        shutdown: shutdown_rx,
    };
    let task = tokio::spawn(supervisor.run());

    SupervisorHandle {
        commands,
        state,
        shutdown,
        task,
    }
}

/// How a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Lost,
    Shutdown,
}

struct Supervisor {
    locator: Arc<dyn PortLocator>,
    connector: Arc<dyn Connector>,
    config: DeviceConfig,
    dispatcher: EventDispatcher,
    outbound: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("searching for beacon ({:?})", self.config.identity);

        loop {
            tokio::select! {
                biased;
                () = cancelled(&mut self.shutdown) => break,
                _ = ticker.tick() => {}
            }

            let Some(port) = self.find_device().await else {
                continue;
            };

            let link = match self.connector.open(&port).await {
                Ok(link) => link,
                Err(e) => {
                    tracing::debug!("failed to open {port}: {e}");
                    continue;
                }
            };

            if self.session(port, link).await == SessionEnd::Shutdown {
                break;
            }
            ticker.reset();
        }

        self.state.send_replace(ConnectionState::Stopped);
        tracing::info!("supervisor stopped");
    }

    /// Runs the locator on the blocking pool; port enumeration may block.
    async fn find_device(&self) -> Option<String> {
        let locator = Arc::clone(&self.locator);
        match tokio::task::spawn_blocking(move || locator.find_device()).await {
            Ok(port) => port,
            Err(e) => {
                tracing::warn!("port search failed: {e}");
                None
            }
        }
    }

    /// Serves one open link until it fails or shutdown is requested.
    async fn session(&mut self, port: String, link: Box<dyn Link>) -> SessionEnd {
        let (mut reader, mut writer) = tokio::io::split(link);

        tracing::info!("connected to beacon on {port}");
        self.state.send_replace(ConnectionState::Connected { port });
        self.dispatcher
            .dispatch(Event::ConnectionStatus(ConnectionStatus::Usb));

        let end = match self.write_command(&mut writer, &Command::GetDeviceInfo).await {
            Ok(()) => self.serve(&mut reader, &mut writer).await,
            Err(e) => {
                tracing::warn!("write failed: {e}");
                SessionEnd::Lost
            }
        };

        if end == SessionEnd::Lost {
            tracing::info!("connection to beacon lost");
            self.dispatcher
                .dispatch(Event::ConnectionStatus(ConnectionStatus::NotConnected));
            self.state.send_replace(ConnectionState::Searching);
        }
        end
    }

    async fn serve<R, W>(&mut self, reader: &mut R, writer: &mut W) -> SessionEnd
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut decoder = LineDecoder::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                biased;
                () = cancelled(&mut self.shutdown) => return SessionEnd::Shutdown,
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        tracing::debug!("port closed");
                        return SessionEnd::Lost;
                    }
                    Ok(n) => {
                        tracing::trace!("received {n} bytes");
                        decoder.feed(&buf[..n]);
                        dispatch_lines(&mut decoder, &self.dispatcher);
                    }
                    Err(e) if is_benign_line_status_error(&e) => {
                        tracing::trace!("ignoring line status error: {e}");
                        tokio::time::sleep(self.config.benign_error_backoff).await;
                    }
                    Err(e) => {
                        tracing::warn!("read failed: {e}");
                        return SessionEnd::Lost;
                    }
                },
                command = self.outbound.recv() => {
                    let Some(command) = command else {
                        return SessionEnd::Shutdown;
                    };
                    if let Err(e) = self.write_command(writer, &command).await {
                        tracing::warn!("write of {:?} failed: {e}", command.kind());
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }

    /// Encodes and writes one command.
    ///
    /// A benign line-status error backs off and resumes the write where it
    /// stopped, up to [`MAX_BENIGN_WRITE_RETRIES`] times.
    async fn write_command<W>(&self, writer: &mut W, command: &Command) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        // Debug output of the command keeps credentials redacted
        tracing::debug!(kind = command.kind().name(), "tx {command:?}");
        let line = encode_command(command);
        let mut written = 0;
        let mut retries = 0;

        loop {
            let result = if written < line.len() {
                match writer.write(&line[written..]).await {
                    Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                    Ok(n) => {
                        written += n;
                        continue;
                    }
                    Err(e) => Err(e),
                }
            } else {
                writer.flush().await
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e)
                    if is_benign_line_status_error(&e) && retries < MAX_BENIGN_WRITE_RETRIES =>
                {
                    retries += 1;
                    tracing::trace!("line status error while writing, retry {retries}: {e}");
                    tokio::time::sleep(self.config.benign_error_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Decodes and dispatches every complete line buffered in `decoder`.
fn dispatch_lines(decoder: &mut LineDecoder, dispatcher: &EventDispatcher) {
    loop {
        match decoder.decode() {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                dispatcher.dispatch(decode_event(&line));
            }
            Ok(None) => break,
            Err(e) => tracing::warn!("dropping line: {e}"),
        }
    }
}

/// Resolves once shutdown is requested or the signal is dropped.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, ReadBuf};

    use super::*;
    use crate::error::{Error, Result};
    use crate::event::Subscription;
    use crate::types::CalibrationType;

    const PORT: &str = "mock0";
    const WAIT: Duration = Duration::from_secs(2);

    /// Reports the beacon after `hits_after` empty polls.
    struct ScriptedLocator {
        hits_after: usize,
        polls: AtomicUsize,
    }

    impl ScriptedLocator {
        fn new(hits_after: usize) -> Arc<Self> {
            Arc::new(Self {
                hits_after,
                polls: AtomicUsize::new(0),
            })
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl PortLocator for ScriptedLocator {
        fn find_device(&self) -> Option<String> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            (poll >= self.hits_after).then(|| PORT.to_owned())
        }
    }

    /// Blocks its caller until the test releases it.
    struct GatedLocator {
        gate: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
        entered: AtomicUsize,
        returned: AtomicUsize,
    }

    impl PortLocator for GatedLocator {
        fn find_device(&self) -> Option<String> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.lock().unwrap().recv_timeout(WAIT);
            self.returned.fetch_add(1, Ordering::SeqCst);
            Some(PORT.to_owned())
        }
    }

    /// Hands the device end of every opened link to the test.
    struct PipeConnector {
        devices: mpsc::UnboundedSender<DuplexStream>,
        open_failures: AtomicUsize,
        read_failures: usize,
        write_failures: usize,
    }

    impl PipeConnector {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
            Self::with(0, 0, 0)
        }

        /// Fails the first `open_failures` opens; every link then fails its
        /// first `read_failures` reads and `write_failures` writes with the
        /// benign line-status error.
        fn with(
            open_failures: usize,
            read_failures: usize,
            write_failures: usize,
        ) -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
            let (devices, rx) = mpsc::unbounded_channel();
            let connector = Arc::new(Self {
                devices,
                open_failures: AtomicUsize::new(open_failures),
                read_failures,
                write_failures,
            });
            (connector, rx)
        }
    }

    impl Connector for PipeConnector {
        fn open<'a>(&'a self, port: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>> {
            Box::pin(async move {
                assert_eq!(port, PORT);
                if self
                    .open_failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "port busy",
                    )));
                }
                let (host, device) = tokio::io::duplex(1024);
                self.devices.send(device).map_err(|_| Error::ChannelClosed)?;
                Ok(Box::new(FlakyLink {
                    inner: host,
                    read_failures: self.read_failures,
                    write_failures: self.write_failures,
                }) as Box<dyn Link>)
            })
        }
    }

    /// Fails its first reads and writes with the benign line-status error.
    struct FlakyLink {
        inner: DuplexStream,
        read_failures: usize,
        write_failures: usize,
    }

    fn line_status_error() -> io::Error {
        io::Error::other("ClearCommError failed")
    }

    impl AsyncRead for FlakyLink {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.read_failures > 0 {
                self.read_failures -= 1;
                return Poll::Ready(Err(line_status_error()));
            }
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for FlakyLink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.write_failures > 0 {
                self.write_failures -= 1;
                return Poll::Ready(Err(line_status_error()));
            }
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn config() -> DeviceConfig {
        init_tracing();
        DeviceConfig::new()
            .poll_interval(Duration::from_millis(10))
            .benign_error_backoff(Duration::from_millis(1))
    }

    async fn next_event(sub: &mut Subscription) -> Event {
        tokio::time::timeout(WAIT, sub.recv())
            .await
            .expect("timed out waiting for event")
            .expect("dispatcher closed")
    }

    async fn next_device(devices: &mut mpsc::UnboundedReceiver<DuplexStream>) -> DuplexStream {
        tokio::time::timeout(WAIT, devices.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("connector dropped")
    }

    async fn read_lines(device: &mut DuplexStream, count: usize) -> Vec<String> {
        let mut lines = BufReader::new(device).lines();
        let mut out = Vec::new();
        while out.len() < count {
            let line = tokio::time::timeout(WAIT, lines.next_line())
                .await
                .expect("timed out waiting for line")
                .unwrap()
                .expect("link closed");
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_searches_until_device_found() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let locator = ScriptedLocator::new(3);
        let (connector, mut devices) = PipeConnector::new();

        let handle = spawn(locator.clone(), connector, config(), dispatcher);
        let mut device = next_device(&mut devices).await;

        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );
        assert_eq!(read_lines(&mut device, 1).await, vec!["GET_DEVICE_INFO"]);
        assert_eq!(locator.polls(), 4);
        assert_eq!(
            *handle.state.borrow(),
            ConnectionState::Connected { port: PORT.into() }
        );

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_queued_commands_follow_device_info() {
        let dispatcher = EventDispatcher::new(64);
        let (connector, mut devices) = PipeConnector::new();
        let handle = spawn(ScriptedLocator::new(2), connector, config(), dispatcher);

        handle.commands.send(Command::RunSelfCheck).unwrap();
        handle
            .commands
            .send(Command::SetCalibrationMethod(CalibrationType::Manual))
            .unwrap();
        handle.commands.send(Command::SetCalibrationValue(-12)).unwrap();

        let mut device = next_device(&mut devices).await;
        assert_eq!(
            read_lines(&mut device, 4).await,
            vec![
                "GET_DEVICE_INFO",
                "RUN_SELF_CHECK",
                "SET_CAL_METHOD MANUAL",
                "SET_CAL_VALUE -12",
            ]
        );

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_inbound_lines_dispatched_in_order() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let (connector, mut devices) = PipeConnector::new();
        let handle = spawn(ScriptedLocator::new(0), connector, config(), dispatcher);

        let mut device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );

        device
            .write_all(b"GPS_STATUS True\r\n\nCAL_VAL")
            .await
            .unwrap();
        device.write_all(b"UE 5\nBOGUS line\n").await.unwrap();

        assert_eq!(next_event(&mut sub).await, Event::GpsStatus(true));
        assert_eq!(next_event(&mut sub).await, Event::CalValue(5));
        assert_eq!(
            next_event(&mut sub).await,
            Event::Other("BOGUS line".into())
        );

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_lost_link_reports_once_and_reconnects() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let locator = ScriptedLocator::new(0);
        let (connector, mut devices) = PipeConnector::new();
        let handle = spawn(locator.clone(), connector, config(), dispatcher);

        let device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );
        let polls = locator.polls();

        drop(device);

        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::NotConnected)
        );
        let mut device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );
        assert!(locator.polls() > polls);
        assert_eq!(read_lines(&mut device, 1).await, vec!["GET_DEVICE_INFO"]);

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_benign_error_keeps_connection() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let (connector, mut devices) = PipeConnector::with(0, 1, 0);
        let handle = spawn(ScriptedLocator::new(0), connector, config(), dispatcher);

        let mut device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );

        device.write_all(b"CAL_VALUE 2000\n").await.unwrap();
        assert_eq!(next_event(&mut sub).await, Event::CalValue(2000));
        assert!(handle.state.borrow().is_connected());

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_benign_write_error_resends_command() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let (connector, mut devices) = PipeConnector::with(0, 0, 1);
        let handle = spawn(ScriptedLocator::new(2), connector, config(), dispatcher);

        handle.commands.send(Command::RunSelfCheck).unwrap();

        let mut device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );
        assert_eq!(
            read_lines(&mut device, 2).await,
            vec!["GET_DEVICE_INFO", "RUN_SELF_CHECK"]
        );
        assert!(handle.state.borrow().is_connected());

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_persistent_write_errors_lose_link() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let (connector, _devices) = PipeConnector::with(0, 0, usize::MAX);
        let handle = spawn(ScriptedLocator::new(0), connector, config(), dispatcher);

        for status in [
            ConnectionStatus::Usb,
            ConnectionStatus::NotConnected,
            ConnectionStatus::Usb,
        ] {
            assert_eq!(next_event(&mut sub).await, Event::ConnectionStatus(status));
        }

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_is_retried() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let locator = ScriptedLocator::new(0);
        let (connector, mut devices) = PipeConnector::with(2, 0, 0);
        let handle = spawn(locator.clone(), connector, config(), dispatcher);

        let _device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );
        assert_eq!(locator.polls(), 3);

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_searching() {
        let dispatcher = EventDispatcher::new(64);
        let (connector, _devices) = PipeConnector::new();
        let handle = spawn(ScriptedLocator::new(usize::MAX), connector, config(), dispatcher);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*handle.state.borrow(), ConnectionState::Searching);

        handle.shutdown.send_replace(true);
        tokio::time::timeout(WAIT, handle.task)
            .await
            .expect("supervisor did not stop")
            .unwrap();
        assert_eq!(*handle.state.borrow(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_blocking_locator_does_not_stall_runtime() {
        let dispatcher = EventDispatcher::new(64);
        let mut sub = dispatcher.subscribe();
        let (release, gate) = std::sync::mpsc::channel();
        let locator = Arc::new(GatedLocator {
            gate: std::sync::Mutex::new(gate),
            entered: AtomicUsize::new(0),
            returned: AtomicUsize::new(0),
        });
        let (connector, mut devices) = PipeConnector::new();
        let handle = spawn(locator.clone(), connector, config(), dispatcher);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(locator.entered.load(Ordering::SeqCst), 1);
        assert_eq!(locator.returned.load(Ordering::SeqCst), 0);

        release.send(()).unwrap();
        let _device = next_device(&mut devices).await;
        assert_eq!(
            next_event(&mut sub).await,
            Event::ConnectionStatus(ConnectionStatus::Usb)
        );

        handle.shutdown.send_replace(true);
        handle.task.await.unwrap();
    }
}
