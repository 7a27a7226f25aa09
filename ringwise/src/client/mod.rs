//! The entry point of the crate: a [`Cluster`] built from a [`ClusterConfig`]
//! through a [`ClusterBuilder`], routing partition keys to replicas.

mod cluster;
mod cluster_builder;
mod config;

pub use cluster::{Cluster, LeasedConnection, RoutingPlan};
pub use cluster_builder::ClusterBuilder;
pub use config::{ClusterConfig, PoolConfig, DEFAULT_POOL_CAPACITY, DEFAULT_REPLICATION_FACTOR};
