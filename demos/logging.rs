use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ringwise::errors::ConnectionError;
use ringwise::{ClusterBuilder, Connection, PartitionKey, Peer, Token, Transport};
use tracing::info;

#[derive(Debug)]
struct NullTransport;

#[derive(Debug)]
struct NullConnection;

#[async_trait]
impl Transport for NullTransport {
    type Connection = NullConnection;

    async fn open(&self, _address: IpAddr) -> Result<NullConnection, ConnectionError> {
        Ok(NullConnection)
    }
}

#[async_trait]
impl Connection for NullConnection {
    async fn close(self) {}
}

// To run this example, and view logged messages, RUST_LOG env var needs to be set
// This can be done using shell command presented below
// RUST_LOG=ringwise=trace cargo run --example logging
#[tokio::main]
async fn main() -> Result<()> {
    // Install global collector configured based on RUST_LOG env var
    // This collector will receive logs from the routing core
    tracing_subscriber::fmt::init();

    let node = IpAddr::V4(Ipv4Addr::LOCALHOST);
    info!("Routing to {}", node);

    let cluster = ClusterBuilder::new(Arc::new(NullTransport))
        .known_peers([Peer::new(node, "datacenter1", "rack1", [Token::from(0)])])
        .build()
        .await?;

    let connection = cluster.connect(&PartitionKey::single("key")).await?;
    connection.release().await;
    cluster.shutdown().await;

    Ok(())
}
