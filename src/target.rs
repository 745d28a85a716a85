//! A single remote endpoint and the connection currently open to it.
//!
//! Every state transition and every write happens with the target's lock held,
//! so one target carries at most one I/O operation at a time. Separate targets
//! share nothing and never wait on each other.

mod connect;
mod reporter;

pub use connect::{AddressFamily, Connection, Connector, Destination, SystemConnector, Transport};
pub use reporter::{LogReporter, Reporter, SilentReporter};

use crate::error::TargetError;
use std::{
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

type Handle = Option<Box<dyn Connection>>;

/// Per-target tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOptions {
    /// Keep the OS from raising `SIGPIPE` while a send is in progress.
    pub suppress_signals: bool,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            suppress_signals: true,
        }
    }
}

/// A remote endpoint plus its live connection.
///
/// The target starts out closed. `open` connects it, `reopen` swaps a live
/// connection for a fresh one, and the send operations write whole messages
/// under the target's lock. Transport and address family are fixed when the
/// target is built.
///
/// # Example
/// ```no_run
/// use metrics_net_target::NetworkTarget;
///
/// let target = NetworkTarget::udp4("127.0.0.1", 8125);
/// if target.open().is_ok() {
///     let _ = target.send_datagram(b"requests:1|c");
/// }
/// ```
#[derive(Debug)]
pub struct NetworkTarget {
    destination: Destination,
    port: u16,
    transport: Transport,
    family: AddressFamily,
    options: TargetOptions,
    connector: Arc<dyn Connector>,
    reporter: Arc<dyn Reporter>,
    handle: Mutex<Handle>,
}

impl NetworkTarget {
    /// Creates a closed target using the system connector and log reporter.
    #[must_use]
    pub fn new(
        destination: impl Into<Destination>,
        port: u16,
        transport: Transport,
        family: AddressFamily,
    ) -> Self {
        NetworkTargetBuilder::default()
            .destination(destination)
            .port(port)
            .transport(transport)
            .family(family)
            .build()
    }

    #[must_use]
    pub fn tcp4(destination: impl Into<Destination>, port: u16) -> Self {
        Self::new(destination, port, Transport::Stream, AddressFamily::Ipv4)
    }

    #[must_use]
    pub fn tcp6(destination: impl Into<Destination>, port: u16) -> Self {
        Self::new(destination, port, Transport::Stream, AddressFamily::Ipv6)
    }

    #[must_use]
    pub fn udp4(destination: impl Into<Destination>, port: u16) -> Self {
        Self::new(destination, port, Transport::Datagram, AddressFamily::Ipv4)
    }

    #[must_use]
    pub fn udp6(destination: impl Into<Destination>, port: u16) -> Self {
        Self::new(destination, port, Transport::Datagram, AddressFamily::Ipv6)
    }

    #[must_use]
    pub fn builder() -> NetworkTargetBuilder {
        NetworkTargetBuilder::default()
    }

    #[must_use]
    pub const fn destination(&self) -> &Destination {
        &self.destination
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }

    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    fn lock(&self) -> MutexGuard<'_, Handle> {
        // A panic mid-send leaves the handle either intact or closed, both valid.
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(&self) -> io::Result<Box<dyn Connection>> {
        self.connector
            .connect(&self.destination, self.port, self.family, self.transport)
    }

    /// Connects the target, replacing whatever handle it held.
    ///
    /// Connection failures are not reported; the target is left closed and can
    /// be opened again later.
    ///
    /// # Errors
    /// Returns [`TargetError::Connect`] if the connection attempt fails.
    pub fn open(&self) -> Result<&Self, TargetError> {
        let mut handle = self.lock();
        *handle = None;
        match self.connect() {
            Ok(conn) => {
                *handle = Some(conn);
                Ok(self)
            }
            Err(e) => {
                log::debug!(
                    "failed to open {:?} target {}:{}: {e}",
                    self.transport,
                    self.destination,
                    self.port
                );
                Err(TargetError::Connect(e))
            }
        }
    }

    /// Connects the target only if it is closed. The check and the connect
    /// happen under one lock, so concurrent callers open it at most once.
    ///
    /// # Errors
    /// Returns [`TargetError::Connect`] if the connection attempt fails.
    pub fn open_if_closed(&self) -> Result<&Self, TargetError> {
        let mut handle = self.lock();
        if handle.is_none() {
            *handle = Some(self.connect().map_err(TargetError::Connect)?);
        }
        Ok(self)
    }

    /// Closes a live connection and immediately connects a new one.
    ///
    /// A closed target stays closed and no connection is attempted. If the new
    /// connection fails the target ends up closed.
    pub fn reopen(&self) -> &Self {
        let mut handle = self.lock();
        if handle.take().is_some() {
            match self.connect() {
                Ok(conn) => *handle = Some(conn),
                Err(e) => log::debug!(
                    "failed to reopen target {}:{}: {e}",
                    self.destination,
                    self.port
                ),
            }
        }
        self
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Releases the connection, if any, and the target with it.
    pub fn destroy(self) {
        let handle = self
            .handle
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            log::trace!("closing target {}:{}", self.destination, self.port);
        }
    }

    // Runs with the lock released so a reporter may call back into the target.
    fn reported(&self, result: Result<(), TargetError>) -> Result<(), TargetError> {
        if let Err(error) = &result {
            self.reporter.report(error);
        }
        result
    }

    /// Sends `message` using the operation that fits the target's transport.
    ///
    /// # Errors
    /// See [`send_stream`](Self::send_stream) and
    /// [`send_datagram`](Self::send_datagram).
    pub fn send(&self, message: &[u8]) -> Result<(), TargetError> {
        match self.transport {
            Transport::Stream => self.send_stream(message),
            Transport::Datagram => self.send_datagram(message),
        }
    }

    /// Writes all of `message` to a connection-oriented target.
    ///
    /// Before every write the connection is probed for a graceful close from
    /// the peer; if one is found the target is closed. Partial writes are
    /// continued until the whole message is out.
    ///
    /// # Errors
    /// - [`TargetError::NetworkClosed`] if the peer closed the connection.
    /// - [`TargetError::SendFailed`] if the OS rejects a write or accepts zero
    ///   bytes; the connection is kept.
    /// - [`TargetError::NotOpen`] if the target is closed.
    pub fn send_stream(&self, message: &[u8]) -> Result<(), TargetError> {
        let result = self.write_stream(&mut self.lock(), message);
        self.reported(result)
    }

    fn write_stream(&self, handle: &mut Handle, message: &[u8]) -> Result<(), TargetError> {
        let mut sent = 0;

        while sent < message.len() {
            let Some(conn) = handle.as_mut() else {
                return Err(TargetError::NotOpen);
            };

            if conn.peer_closed() {
                *handle = None;
                return Err(TargetError::NetworkClosed);
            }

            match conn.send(&message[sent..], self.options.suppress_signals) {
                Ok(0) => {
                    return Err(TargetError::SendFailed(io::ErrorKind::WriteZero.into()));
                }
                Ok(n) => sent += n,
                Err(e) => return Err(TargetError::SendFailed(e)),
            }
        }

        Ok(())
    }

    /// Sends `message` as a single datagram.
    ///
    /// # Errors
    /// - [`TargetError::SendFailed`] if the OS rejects the datagram.
    /// - [`TargetError::NotOpen`] if the target is closed.
    pub fn send_datagram(&self, message: &[u8]) -> Result<(), TargetError> {
        let result = match self.lock().as_mut() {
            Some(conn) => conn
                .send(message, self.options.suppress_signals)
                .map(|_| ())
                .map_err(TargetError::SendFailed),
            None => Err(TargetError::NotOpen),
        };
        self.reported(result)
    }
}

/// Builds a [`NetworkTarget`].
#[derive(Debug)]
pub struct NetworkTargetBuilder {
    destination: Destination,
    port: u16,
    transport: Transport,
    family: AddressFamily,
    options: TargetOptions,
    connector: Arc<dyn Connector>,
    reporter: Arc<dyn Reporter>,
}

impl Default for NetworkTargetBuilder {
    fn default() -> Self {
        Self {
            destination: Destination::from("127.0.0.1"),
            port: 8125,
            transport: Transport::Datagram,
            family: AddressFamily::Ipv4,
            options: TargetOptions::default(),
            connector: Arc::new(SystemConnector),
            reporter: Arc::new(LogReporter),
        }
    }
}

impl NetworkTargetBuilder {
    #[must_use]
    pub fn destination(mut self, destination: impl Into<Destination>) -> Self {
        self.destination = destination.into();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub const fn family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    #[must_use]
    pub const fn options(mut self, options: TargetOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the connector used by `open` and `reopen`.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Replaces the reporter that send failures are handed to.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Builds the target in the closed state. No I/O happens here.
    #[must_use]
    pub fn build(self) -> NetworkTarget {
        NetworkTarget {
            destination: self.destination,
            port: self.port,
            transport: self.transport,
            family: self.family,
            options: self.options,
            connector: self.connector,
            reporter: self.reporter,
            handle: Mutex::new(None),
        }
    }
}
