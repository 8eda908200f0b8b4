//! In-process stand-in for a forward collector.
//!
//! Accepts any number of TCP connections, decodes the concatenated
//! MessagePack `[tag, time, record]` arrays arriving on each, and hands the
//! events to the test through a channel.

use std::{
    io::{self, BufReader},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use serde::Deserialize;

/// An event as decoded by the collector.
pub type ObservedEvent = (String, i64, serde_json::Value);

pub struct TestCollector {
    addr: SocketAddr,
    events: mpsc::Receiver<ObservedEvent>,
}

impl TestCollector {
    /// Listen on an ephemeral loopback port.
    pub fn start() -> Self {
        Self::bind(0).expect("bind ephemeral collector")
    }

    /// Listen on a specific loopback port.
    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        let addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                let tx = tx.clone();
                thread::spawn(move || read_events(stream, tx));
            }
        });
        Ok(Self { addr, events: rx })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv(&self, timeout: Duration) -> Option<ObservedEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Gather `count` events, giving up once `timeout` has elapsed overall.
    pub fn collect(&self, count: usize, timeout: Duration) -> Vec<ObservedEvent> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => out.push(event),
                Err(_) => break,
            }
        }
        out
    }
}

fn read_events(stream: TcpStream, tx: mpsc::Sender<ObservedEvent>) {
    let mut de = rmp_serde::Deserializer::new(BufReader::new(stream));
    while let Ok(event) = ObservedEvent::deserialize(&mut de) {
        if tx.send(event).is_err() {
            break;
        }
    }
}

/// A loopback port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    listener.local_addr().expect("listener has address").port()
}
