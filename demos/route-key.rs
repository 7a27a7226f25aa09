use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ringwise::cql::CqlValue;
use ringwise::errors::ConnectionError;
use ringwise::{ClusterBuilder, Connection, PartitionKey, Peer, Token, Transport};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pretends to connect, taking a moment to do so.
#[derive(Debug, Default)]
struct SimulatedTransport {
    opened: AtomicUsize,
}

#[derive(Debug)]
struct SimulatedConnection {
    id: usize,
    address: IpAddr,
}

#[async_trait]
impl Transport for SimulatedTransport {
    type Connection = SimulatedConnection;

    async fn open(&self, address: IpAddr) -> Result<SimulatedConnection, ConnectionError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let id = self.opened.fetch_add(1, Ordering::Relaxed);
        info!(id, %address, "Opened simulated connection");
        Ok(SimulatedConnection { id, address })
    }
}

#[async_trait]
impl Connection for SimulatedConnection {
    async fn close(self) {
        info!(id = self.id, address = %self.address, "Closed simulated connection");
    }
}

fn node(dc: u8, rack: u8, n: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, dc, rack, n))
}

// Two datacenters with two racks each, every node owning a few evenly spread tokens.
fn topology() -> Vec<Peer> {
    let nodes = [
        (node(1, 1, 1), "dc1", "rack1"),
        (node(1, 1, 2), "dc1", "rack1"),
        (node(1, 2, 1), "dc1", "rack2"),
        (node(2, 1, 1), "dc2", "rack1"),
        (node(2, 2, 1), "dc2", "rack2"),
        (node(2, 2, 2), "dc2", "rack2"),
    ];
    let step = u64::MAX / (nodes.len() as u64 * 4);
    nodes
        .iter()
        .enumerate()
        .map(|(i, (address, dc, rack))| {
            let tokens = (0..4).map(|vnode| {
                let position = (vnode * nodes.len() + i) as u64 * step;
                Token::from(i64::MIN.wrapping_add_unsigned(position))
            });
            Peer::new(*address, *dc, *rack, tokens)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let transport = Arc::new(SimulatedTransport::default());
    let cluster = ClusterBuilder::new(Arc::clone(&transport))
        .partitioner("org.apache.cassandra.dht.Murmur3Partitioner")
        .snitch("org.apache.cassandra.locator.TopologySnitch")
        .endpoint_strategy("NearestStrategy")
        .local_address(node(1, 1, 1))
        .pool_capacity(2)
        .known_peers(topology())
        .build()
        .await?;

    let keys = [
        PartitionKey::single(42_i64),
        PartitionKey::single("alice"),
        PartitionKey::new([CqlValue::Int(1), CqlValue::Text("hello".to_owned())])?,
    ];

    for key in &keys {
        let plan = cluster.plan(key)?;
        println!(
            "{:?}\n  token:    {}\n  replicas: {:?}\n  picked:   {}",
            key.components(),
            plan.token(),
            plan.replicas(),
            plan.pick()?
        );
    }

    // The second round reuses the connections the first one released.
    for round in 0..2 {
        for key in &keys {
            let connection = cluster.connect(key).await?;
            println!(
                "round {}: connection #{} to {}",
                round,
                connection.id,
                connection.endpoint()
            );
            connection.release().await;
        }
    }
    println!(
        "Opened {} connections in total",
        transport.opened.load(Ordering::Relaxed)
    );

    cluster.shutdown().await;
    Ok(())
}
