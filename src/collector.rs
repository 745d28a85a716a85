mod handlers;

use crate::{
    error::MetricsError,
    events::{MAX_DATAGRAM_LEN, MetricEvent, read_frame},
    target::Transport,
};
use handlers::handle_event;
use std::{
    io::BufReader,
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket},
    sync::Arc,
    thread,
};

type Sink = Option<Arc<dyn metrics::Recorder + Send + Sync>>;

/// Receives metric events from [`NetworkRecorder`](crate::NetworkRecorder)s
/// and replays them into a local recorder.
pub struct NetworkCollector {
    bind: IpAddr,
    port: u16,
    transport: Transport,
    sink: Sink,
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8125,
            transport: Transport::Datagram,
            sink: None,
        }
    }
}

impl NetworkCollector {
    /// Sets the address to listen on.
    #[must_use]
    pub const fn bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Sets the port to listen on. Port `0` picks a free one.
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

    /// Replays events into `recorder` instead of the global recorder.
    #[must_use]
    pub fn recorder(mut self, recorder: Arc<dyn metrics::Recorder + Send + Sync>) -> Self {
        self.sink = Some(recorder);
        self
    }

    /// Binds the listening socket and starts collecting metrics on a
    /// background thread. Stream collectors handle each connection on its own
    /// thread.
    /// The metrics collected can then be exported using any of the regular metric export crates.
    ///
    /// # Example
    /// ```no_run
    /// use metrics_net_target::{NetworkCollector, Transport};
    /// let collector = NetworkCollector::default().transport(Transport::Stream);
    /// match collector.start_collecting() {
    ///     Ok(addr) => println!("collecting on {addr}"),
    ///     Err(e) => eprintln!("Failed to start metrics collector: {}", e),
    /// }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the socket cannot be bound.
    pub fn start_collecting(self) -> Result<SocketAddr, MetricsError> {
        let addr = SocketAddr::new(self.bind, self.port);
        let sink = self.sink;

        match self.transport {
            Transport::Stream => {
                let listener = TcpListener::bind(addr)?;
                let local = listener.local_addr()?;
                thread::spawn(move || run_stream_collector(&listener, &sink));
                log::info!("collecting metrics over TCP on {local}");
                Ok(local)
            }
            Transport::Datagram => {
                let socket = UdpSocket::bind(addr)?;
                let local = socket.local_addr()?;
                thread::spawn(move || {
                    if let Err(e) = run_datagram_collector(&socket, &sink) {
                        log::error!("Metrics collector error: {e}");
                    }
                });
                log::info!("collecting metrics over UDP on {local}");
                Ok(local)
            }
        }
    }
}

fn dispatch(buffer: &[u8], sink: &Sink) {
    let event = match MetricEvent::try_from(buffer) {
        Ok(event) => event,
        Err(e) => {
            log::trace!("Failed to parse metric event: {e}");
            return;
        }
    };

    match sink {
        Some(recorder) => metrics::with_local_recorder(recorder.as_ref(), || handle_event(event)),
        None => handle_event(event),
    }
}

// We can safely filter out any errors from the incoming stream
fn filter_streams(conn: std::io::Result<TcpStream>) -> Option<TcpStream> {
    conn.ok()
}

fn run_stream_collector(listener: &TcpListener, sink: &Sink) {
    for stream in listener.incoming().filter_map(filter_streams) {
        let sink = sink.clone();
        thread::spawn(move || {
            let peer = stream.peer_addr().ok();
            let mut reader = BufReader::new(stream);
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                match read_frame(&mut reader, &mut buffer) {
                    Ok(true) => dispatch(&buffer, &sink),
                    Ok(false) => {
                        log::info!("Metrics sender {peer:?} closed");
                        break;
                    }
                    Err(e) => {
                        log::error!("Error reading from {peer:?}: {e}");
                        break;
                    }
                }
            }
        });
    }
}

fn run_datagram_collector(socket: &UdpSocket, sink: &Sink) -> Result<(), MetricsError> {
    let mut buffer = vec![0u8; MAX_DATAGRAM_LEN];
    loop {
        let (len, _) = socket.recv_from(&mut buffer)?;
        dispatch(&buffer[..len], sink);
    }
}
