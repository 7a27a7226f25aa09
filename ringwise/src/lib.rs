//! Token- and topology-aware request routing for CQL clusters
//! ([Apache Cassandra®](https://cassandra.apache.org/) and [ScyllaDB](https://scylladb.com)).
//!
//! This crate is the routing core of a client driver. It knows where data
//! lives and which node to talk to; it does not speak the CQL protocol
//! itself, connections are opened through a user supplied [`Transport`].
//!
//! # Overview
//! ### Tokens
//! A partition key is hashed into a [`Token`], its position on the ring,
//! exactly like the cluster does it:
//!
//! ```rust
//! # use std::error::Error;
//! # fn check() -> Result<(), Box<dyn Error>> {
//! use ringwise::routing::partitioner::PartitionerName;
//! use ringwise::routing::{PartitionKey, Token};
//!
//! let key = PartitionKey::single(1_i32);
//! let token = PartitionerName::Murmur3.compute_token(&key)?;
//! assert_eq!(token, Some(Token::from(-4069959284402364209_i64)));
//! # Ok(())
//! # }
//! # check().unwrap();
//! ```
//!
//! ### Topology
//! Nodes are described by [`Peer`]s (address, datacenter, rack, tokens).
//! A [`Snitch`](policies::snitch::Snitch) tells which datacenter and rack an
//! address belongs to and ranks candidates by proximity.
//!
//! ### Routing
//! A [`Cluster`], built with a [`ClusterBuilder`], keeps the current cluster
//! view and plans every request: it computes the key's token, finds the
//! replicas, ranks them with the snitch and lets an
//! [`EndpointStrategy`](policies::endpoint_selection::EndpointStrategy) pick
//! one. Connections are lent by per-node [`ConnectionPool`]s.
//!
//! Snitches, strategies, pool policies and partitioners are chosen by name,
//! through the [`Activator`](policies::registry::Activator).

pub mod client;
pub mod cluster;
pub mod errors;
pub mod network;
pub mod policies;
pub mod routing;

pub(crate) mod utils;

pub use ringwise_cql as cql;

pub use client::{Cluster, ClusterBuilder, ClusterConfig};
pub use cluster::{ClusterState, Peer, Proximity};
pub use network::{Connection, ConnectionPool, Transport};
pub use routing::{PartitionKey, Token};
