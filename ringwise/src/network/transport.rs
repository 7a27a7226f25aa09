use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::errors::ConnectionError;

/// Opens connections to cluster nodes.
///
/// The routing core never looks inside a connection: it only opens them
/// through this trait, lends them out and closes them.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug + 'static {
    /// The connection type this transport produces.
    type Connection: Connection;

    /// Opens a new connection to the node at `address`.
    async fn open(&self, address: IpAddr) -> Result<Self::Connection, ConnectionError>;
}

/// A live connection to a single node.
#[async_trait]
pub trait Connection: Send + fmt::Debug + 'static {
    /// Closes the connection, releasing whatever the transport holds for it.
    async fn close(self);
}
