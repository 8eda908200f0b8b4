//! Socket connection to the collector.

use std::{
    fmt, io,
    io::Write,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use log::{debug, warn};
use thiserror::Error;

/// Where the collector listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    /// Unix domain socket. Only connectable on unix platforms.
    Unix { path: PathBuf },
}

impl Endpoint {
    fn socket_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        (host, port).to_socket_addrs().map(|iter| iter.collect())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
            Endpoint::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Whether a live socket is currently held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to {endpoint}: {source}")]
    Send {
        endpoint: String,
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Whether the failure happened while opening the socket.
    pub fn is_connect(&self) -> bool {
        matches!(self, ConnectionError::Connect { .. })
    }

    /// The underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            ConnectionError::Connect { source, .. } | ConnectionError::Send { source, .. } => {
                source
            }
        }
    }
}

enum ActiveStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ActiveStream {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            ActiveStream::Tcp(stream) => {
                stream.write_all(buf)?;
                stream.flush()
            }
            #[cfg(unix)]
            ActiveStream::Unix(stream) => {
                stream.write_all(buf)?;
                stream.flush()
            }
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            ActiveStream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            ActiveStream::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

/// A single, lazily established socket to the collector.
pub struct Connection {
    endpoint: Endpoint,
    connect_timeout: Duration,
    write_timeout: Option<Duration>,
    stream: Option<ActiveStream>,
}

impl Connection {
    /// Create a disconnected connection. No socket is opened until the
    /// first [`send`](Self::send) or [`connect`](Self::connect).
    pub fn new(
        endpoint: Endpoint,
        connect_timeout: Duration,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            endpoint,
            connect_timeout,
            write_timeout,
            stream: None,
        }
    }

    /// The address this connection targets.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether a socket is currently open.
    pub fn connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        if self.connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Open a fresh socket, replacing any existing one.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        self.close();
        let stream = self.open().map_err(|source| ConnectionError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        })?;
        debug!("FluentLogger connected to {}", self.endpoint);
        self.stream = Some(stream);
        Ok(())
    }

    /// Write the whole payload, connecting first if necessary.
    ///
    /// Any write error drops the socket; nothing from `bytes` should be
    /// considered delivered.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        if self.stream.is_none() {
            self.connect()?;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(ConnectionError::Connect {
                endpoint: self.endpoint.to_string(),
                source: io::Error::from(io::ErrorKind::NotConnected),
            });
        };
        if let Err(source) = stream.write_all(bytes) {
            self.close();
            return Err(ConnectionError::Send {
                endpoint: self.endpoint.to_string(),
                source,
            });
        }
        Ok(())
    }

    /// Drop the socket if one is held. Safe to call repeatedly.
    pub fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if let Err(err) = stream.shutdown()
            && err.kind() != io::ErrorKind::NotConnected
        {
            warn!("FluentLogger: socket shutdown for {} failed: {err}", self.endpoint);
        }
    }

    fn open(&self) -> io::Result<ActiveStream> {
        match &self.endpoint {
            Endpoint::Tcp { host, port } => {
                let stream = connect_tcp(host, *port, self.connect_timeout)?;
                stream.set_nodelay(true)?;
                stream.set_write_timeout(self.write_timeout)?;
                Ok(ActiveStream::Tcp(stream))
            }
            Endpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    let stream = UnixStream::connect(path)?;
                    stream.set_write_timeout(self.write_timeout)?;
                    Ok(ActiveStream::Unix(stream))
                }
                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "unix domain sockets are not supported on this platform",
                    ))
                }
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Try every resolved address in turn, returning the last error if none
/// accepts.
fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in Endpoint::socket_addrs(host, port)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host}:{port} did not resolve to any address"),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::{io::Read, net::TcpListener, sync::mpsc, thread};

    #[fixture]
    fn tcp_listener() -> TcpListener {
        TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
    }

    fn endpoint_for(listener: &TcpListener) -> Endpoint {
        let addr = listener.local_addr().expect("listener has address");
        Endpoint::Tcp {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }

    fn refused_endpoint() -> Endpoint {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let endpoint = endpoint_for(&listener);
        drop(listener);
        endpoint
    }

    fn connection(endpoint: Endpoint) -> Connection {
        Connection::new(endpoint, Duration::from_secs(1), Some(Duration::from_secs(1)))
    }

    #[rstest]
    fn starts_disconnected() {
        let conn = connection(refused_endpoint());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[rstest]
    fn send_connects_lazily_and_delivers(tcp_listener: TcpListener) {
        let endpoint = endpoint_for(&tcp_listener);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = tcp_listener.accept().expect("accept connection");
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).expect("read payload");
            tx.send(buf.to_vec()).expect("forward payload");
        });

        let mut conn = connection(endpoint);
        conn.send(b"hello").expect("send payload");
        assert!(conn.connected());
        let received = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("payload received");
        assert_eq!(received, b"hello".to_vec());
    }

    #[rstest]
    fn failed_connect_leaves_connection_disconnected() {
        let mut conn = connection(refused_endpoint());
        let err = conn.send(b"data").expect_err("nothing is listening");
        assert!(err.is_connect());
        assert!(err.to_string().contains("failed to connect to 127.0.0.1:"));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[rstest]
    fn close_is_idempotent(tcp_listener: TcpListener) {
        let mut conn = connection(endpoint_for(&tcp_listener));
        conn.connect().expect("connect");
        assert!(conn.connected());
        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[rstest]
    fn endpoint_display_matches_host_port() {
        let endpoint = Endpoint::Tcp {
            host: "localhost".into(),
            port: 24224,
        };
        assert_eq!(endpoint.to_string(), "localhost:24224");
    }

    #[cfg(unix)]
    #[rstest]
    fn sends_over_unix_socket() {
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("collector.sock");
        let listener = UnixListener::bind(&path).expect("bind unix listener");
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept connection");
            let mut buf = [0u8; 3];
            stream.read_exact(&mut buf).expect("read payload");
            tx.send(buf.to_vec()).expect("forward payload");
        });

        let mut conn = connection(Endpoint::Unix { path });
        conn.send(b"abc").expect("send payload");
        let received = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("payload received");
        assert_eq!(received, b"abc".to_vec());
    }
}
