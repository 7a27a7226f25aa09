use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use num_bigint::BigInt;
use ringwise::cql::CqlValue;
use ringwise::errors::{ConnectionError, ConnectionPoolError, RouteError};
use ringwise::routing::partitioner::{encode_partition_key, PartitionerName};
use ringwise::{ClusterBuilder, Connection, PartitionKey, Peer, Token, Transport};

fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

/// Records every open and close; refuses addresses listed as down.
#[derive(Debug, Default)]
struct RecordingTransport {
    next_id: AtomicUsize,
    opened: Mutex<Vec<IpAddr>>,
    closed: Arc<AtomicUsize>,
    down: HashSet<IpAddr>,
}

#[derive(Debug)]
struct RecordingConnection {
    id: usize,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for RecordingTransport {
    type Connection = RecordingConnection;

    async fn open(&self, address: IpAddr) -> Result<RecordingConnection, ConnectionError> {
        if self.down.contains(&address) {
            return Err(ConnectionError::IoError {
                address,
                error: Arc::new(io::Error::from(io::ErrorKind::ConnectionRefused)),
            });
        }
        self.opened.lock().unwrap().push(address);
        Ok(RecordingConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            closed: Arc::clone(&self.closed),
        })
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn ip(dc: u8, rack: u8, node: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, dc, rack, node))
}

// Murmur3 token of the composite key (int 1, text "hello").
const COMPOSITE_TOKEN: i64 = -5964652701051312773;

fn composite_key() -> PartitionKey {
    PartitionKey::new([CqlValue::Int(1), CqlValue::Text("hello".to_owned())]).unwrap()
}

fn peers() -> Vec<Peer> {
    vec![
        Peer::new(ip(1, 1, 1), "eu", "a", [Token::from(COMPOSITE_TOKEN - 10)]),
        Peer::new(ip(2, 1, 1), "us", "a", [Token::from(COMPOSITE_TOKEN)]),
        Peer::new(ip(1, 2, 1), "eu", "b", [Token::from(COMPOSITE_TOKEN + 10)]),
        Peer::new(ip(1, 1, 2), "eu", "a", [Token::from(COMPOSITE_TOKEN + 20)]),
    ]
}

#[test]
fn composite_key_layout() {
    let encoded = encode_partition_key(&composite_key()).unwrap();
    assert_eq!(
        encoded.as_ref(),
        [0, 4, 0, 0, 0, 1, 0, 0, 5, b'h', b'e', b'l', b'l', b'o', 0]
    );
    assert_eq!(
        PartitionerName::Murmur3.compute_token(&composite_key()).unwrap(),
        Some(Token::from(COMPOSITE_TOKEN))
    );
    assert_eq!(
        PartitionerName::Random
            .compute_token(&composite_key())
            .unwrap()
            .map(Token::into_value),
        Some(
            "98073655855330873326550470580557180958"
                .parse::<BigInt>()
                .unwrap()
        )
    );
}

#[tokio::test]
async fn routes_to_nearest_replica_using_reported_topology() {
    setup_tracing();
    let transport = Arc::new(RecordingTransport::default());
    let cluster = ClusterBuilder::new(Arc::clone(&transport))
        .snitch("TopologySnitch")
        .endpoint_strategy("org.example.NearestStrategy")
        .local_address(ip(1, 1, 1))
        .replication_factor(NonZeroUsize::new(3).unwrap())
        .known_peers(peers())
        .build()
        .await
        .unwrap();

    let plan = cluster.plan(&composite_key()).unwrap();
    // Ring order from the token: us/a, eu/b, eu/a. Ranked for eu/a.
    assert_eq!(plan.replicas(), &[ip(1, 1, 2), ip(1, 2, 1), ip(2, 1, 1)]);

    let leased = cluster.connect(&composite_key()).await.unwrap();
    assert_eq!(leased.endpoint(), ip(1, 1, 2));
    let id = leased.id;
    leased.release().await;

    let leased = cluster.connect(&composite_key()).await.unwrap();
    assert_eq!(leased.id, id);
    leased.release().await;
    assert_eq!(*transport.opened.lock().unwrap(), vec![ip(1, 1, 2)]);
}

#[tokio::test]
async fn no_reuse_policy_opens_per_request() {
    setup_tracing();
    let transport = Arc::new(RecordingTransport::default());
    let cluster = ClusterBuilder::new(Arc::clone(&transport))
        .endpoint_strategy("RoundRobinStrategy")
        .pool_policy("NoReusePool")
        .known_peers(peers())
        .build()
        .await
        .unwrap();

    for _ in 0..3 {
        let leased = cluster.connect(&composite_key()).await.unwrap();
        // Without a snitch the primary replica comes first.
        assert_eq!(leased.endpoint(), ip(2, 1, 1));
        leased.release().await;
    }
    assert_eq!(transport.opened.lock().unwrap().len(), 3);
    assert_eq!(transport.closed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unreachable_replica_surfaces_connection_error() {
    setup_tracing();
    let transport = Arc::new(RecordingTransport {
        down: HashSet::from([ip(2, 1, 1)]),
        ..RecordingTransport::default()
    });
    let cluster = ClusterBuilder::new(transport)
        .endpoint_strategy("")
        .known_peers(peers())
        .build()
        .await
        .unwrap();

    assert_matches!(
        cluster.connect(&composite_key()).await,
        Err(RouteError::ConnectionPool(ConnectionPoolError::Connection(
            ConnectionError::IoError { .. }
        )))
    );
}

#[tokio::test]
async fn keys_without_token_are_refused() {
    setup_tracing();
    let cluster = ClusterBuilder::new(Arc::new(RecordingTransport::default()))
        .partitioner("com.scylladb.dht.CDCPartitioner")
        .known_peers(peers())
        .build()
        .await
        .unwrap();

    // Four bytes are too short for the CDC partitioner.
    assert_matches!(
        cluster.plan(&PartitionKey::single(1_i32)),
        Err(RouteError::NoToken)
    );
    assert_matches!(
        cluster.plan(&PartitionKey::single(CqlValue::Empty)),
        Err(RouteError::TokenCalculation(_))
    );
}
