use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{
    fmt,
    io,
    mem::MaybeUninit,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
};

/// Address family a target connects over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    #[must_use]
    pub const fn matches(self, ip: &IpAddr) -> bool {
        matches!(
            (self, ip),
            (Self::Ipv4, IpAddr::V4(_)) | (Self::Ipv6, IpAddr::V6(_))
        )
    }

    const fn domain(self) -> Domain {
        match self {
            Self::Ipv4 => Domain::IPV4,
            Self::Ipv6 => Domain::IPV6,
        }
    }
}

/// Socket type a target connects with.
///
/// `Stream` is TCP and `Datagram` is UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Stream,
    Datagram,
}

impl Transport {
    const fn socket_type(self) -> (Type, Protocol) {
        match self {
            Self::Stream => (Type::STREAM, Protocol::TCP),
            Self::Datagram => (Type::DGRAM, Protocol::UDP),
        }
    }
}

/// Where a target delivers to: a host name resolved on every connect, or an
/// address resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Host(String),
    Addr(IpAddr),
}

impl Destination {
    /// Resolves the destination to the socket addresses of the given family.
    ///
    /// # Errors
    /// Returns an error if name resolution fails or yields no address of `family`.
    pub fn resolve(&self, port: u16, family: AddressFamily) -> io::Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = match self {
            Self::Host(host) => (host.as_str(), port)
                .to_socket_addrs()?
                .filter(|addr| family.matches(&addr.ip()))
                .collect(),
            Self::Addr(ip) if family.matches(ip) => vec![SocketAddr::new(*ip, port)],
            Self::Addr(_) => Vec::new(),
        };

        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {family:?} address for {self}"),
            ));
        }
        Ok(addrs)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(host) => f.write_str(host),
            Self::Addr(ip) => write!(f, "{ip}"),
        }
    }
}

impl From<&str> for Destination {
    fn from(host: &str) -> Self {
        host.parse().map_or_else(|_| Self::Host(host.to_string()), Self::Addr)
    }
}

impl From<String> for Destination {
    fn from(host: String) -> Self {
        host.parse().map_or(Self::Host(host), Self::Addr)
    }
}

impl From<IpAddr> for Destination {
    fn from(ip: IpAddr) -> Self {
        Self::Addr(ip)
    }
}

/// A live OS connection owned by a target.
///
/// Dropping the value closes the underlying descriptor.
pub trait Connection: Send + fmt::Debug {
    /// Non-blocking probe for a graceful close from the peer. Returns `true`
    /// only when a one-byte peek reads zero bytes.
    fn peer_closed(&self) -> bool;

    /// Writes as much of `buf` as the OS accepts in one call.
    ///
    /// # Errors
    /// Returns the OS error of the failed send.
    fn send(&mut self, buf: &[u8], suppress_signals: bool) -> io::Result<usize>;
}

/// Establishes connections for a target.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Connects to `destination:port` with the given family and transport.
    ///
    /// # Errors
    /// Returns the error of the last failed attempt when no address connects.
    fn connect(
        &self,
        destination: &Destination,
        port: u16,
        family: AddressFamily,
        transport: Transport,
    ) -> io::Result<Box<dyn Connection>>;
}

/// Connects plain OS sockets, trying every resolved address in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn connect(
        &self,
        destination: &Destination,
        port: u16,
        family: AddressFamily,
        transport: Transport,
    ) -> io::Result<Box<dyn Connection>> {
        let (ty, protocol) = transport.socket_type();
        let mut last_err = None;

        for addr in destination.resolve(port, family)? {
            let socket = Socket::new(family.domain(), ty, Some(protocol))?;
            #[cfg(target_vendor = "apple")]
            socket.set_nosigpipe(true)?;

            match socket.connect(&SockAddr::from(addr)) {
                Ok(()) => {
                    log::debug!("connected {transport:?} socket to {addr}");
                    return Ok(Box::new(socket));
                }
                Err(e) => {
                    log::debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| io::ErrorKind::NotConnected.into()))
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
const NO_SIGNAL: libc::c_int = libc::MSG_NOSIGNAL;
// Apple sockets get SO_NOSIGPIPE at connect time instead.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
const NO_SIGNAL: std::os::raw::c_int = 0;

/// Peeks one byte with the socket switched to non-blocking mode for the call.
///
/// Used where no per-call `MSG_DONTWAIT` exists. If blocking mode cannot be
/// restored the socket is reported closed so the target drops it instead of
/// sending on a non-blocking descriptor.
#[cfg_attr(unix, allow(dead_code))]
fn peek_closed_nonblocking(socket: &Socket) -> bool {
    if let Err(e) = socket.set_nonblocking(true) {
        log::debug!("could not switch socket to non-blocking for peek: {e}");
        return false;
    }
    let mut buf = [MaybeUninit::<u8>::uninit(); 1];
    let closed = matches!(socket.peek(&mut buf), Ok(0));
    match socket.set_nonblocking(false) {
        Ok(()) => closed,
        Err(e) => {
            log::error!("could not restore blocking mode after peek: {e}");
            true
        }
    }
}

impl Connection for Socket {
    #[cfg(unix)]
    fn peer_closed(&self) -> bool {
        let mut buf = [MaybeUninit::<u8>::uninit(); 1];
        matches!(
            self.recv_with_flags(&mut buf, libc::MSG_PEEK | libc::MSG_DONTWAIT),
            Ok(0)
        )
    }

    #[cfg(not(unix))]
    fn peer_closed(&self) -> bool {
        peek_closed_nonblocking(self)
    }

    fn send(&mut self, buf: &[u8], suppress_signals: bool) -> io::Result<usize> {
        let flags = if suppress_signals { NO_SIGNAL } else { 0 };
        self.send_with_flags(buf, flags)
    }
}
