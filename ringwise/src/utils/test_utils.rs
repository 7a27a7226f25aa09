use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::errors::ConnectionError;
use crate::network::{Connection, Transport};

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

/// Transport that opens in-memory connections and counts them.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    next_id: AtomicUsize,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    fail: bool,
    gate: Option<Arc<Notify>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A transport refusing every connection.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A transport whose every `open` waits for a notification on `gate`.
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct FakeConnection {
    pub(crate) id: usize,
    pub(crate) endpoint: IpAddr,
    in_use: AtomicBool,
    closed: Arc<AtomicUsize>,
}

impl FakeConnection {
    /// Returns false if the connection was already marked as in use.
    pub(crate) fn mark_in_use(&self) -> bool {
        !self.in_use.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn mark_idle(&self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Connection = FakeConnection;

    async fn open(&self, address: IpAddr) -> Result<FakeConnection, ConnectionError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(ConnectionError::IoError {
                address,
                error: Arc::new(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            endpoint: address,
            in_use: AtomicBool::new(false),
            closed: Arc::clone(&self.closed),
        })
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
