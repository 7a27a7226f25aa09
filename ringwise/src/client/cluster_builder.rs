use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::debug;

use super::cluster::Cluster;
use super::config::ClusterConfig;
use crate::cluster::Peer;
use crate::errors::ConfigurationError;
use crate::network::{EndpointPools, Transport};
use crate::policies::registry::Activator;

/// Builds a [`Cluster`] step by step.
///
/// Every setter consumes and returns the builder. Policy names are resolved
/// in [`build`](ClusterBuilder::build), which fails with a
/// [`ConfigurationError`] if any of them is unknown or cannot be constructed.
pub struct ClusterBuilder<T: Transport> {
    config: ClusterConfig,
    transport: Arc<T>,
    activator: Activator<T>,
    known_peers: Vec<Peer>,
}

impl<T: Transport> ClusterBuilder<T> {
    /// Creates a builder with the default configuration, opening
    /// connections through `transport`.
    pub fn new(transport: Arc<T>) -> Self {
        Self::from_config(transport, ClusterConfig::default())
    }

    /// Creates a builder starting from an existing configuration.
    pub fn from_config(transport: Arc<T>, config: ClusterConfig) -> Self {
        Self {
            config,
            transport,
            activator: Activator::with_defaults(),
            known_peers: Vec::new(),
        }
    }

    /// Sets the partitioner by name, e.g. `org.apache.cassandra.dht.Murmur3Partitioner`.
    pub fn partitioner(mut self, name: impl Into<String>) -> Self {
        self.config.partitioner = name.into();
        self
    }

    /// Sets the snitch by name. An empty name disables proximity ranking.
    pub fn snitch(mut self, name: impl Into<String>) -> Self {
        self.config.snitch = name.into();
        self
    }

    /// Sets the endpoint selection strategy by name.
    /// An empty name makes replicas be tried in ranked order.
    pub fn endpoint_strategy(mut self, name: impl Into<String>) -> Self {
        self.config.endpoint_strategy = name.into();
        self
    }

    /// Sets the connection pool policy by name.
    pub fn pool_policy(mut self, name: impl Into<String>) -> Self {
        self.config.pool.policy = name.into();
        self
    }

    /// Sets how many idle connections each endpoint's pool retains.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.pool.capacity = capacity;
        self
    }

    /// Sets the address proximity is measured from.
    pub fn local_address(mut self, address: IpAddr) -> Self {
        self.config.local_address = Some(address);
        self
    }

    /// Sets how many distinct replicas own each token.
    pub fn replication_factor(mut self, replication_factor: NonZeroUsize) -> Self {
        self.config.replication_factor = replication_factor;
        self
    }

    /// Fixes the seed of random strategies.
    pub fn strategy_seed(mut self, seed: u64) -> Self {
        self.config.strategy_seed = Some(seed);
        self
    }

    /// Peers the cluster view starts with, before the first refresh.
    pub fn known_peers(mut self, peers: impl IntoIterator<Item = Peer>) -> Self {
        self.known_peers.extend(peers);
        self
    }

    /// Replaces the activator, e.g. with one that also knows custom policies.
    pub fn activator(mut self, activator: Activator<T>) -> Self {
        self.activator = activator;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Resolves every configured policy and builds the cluster.
    pub async fn build(self) -> Result<Cluster<T>, ConfigurationError> {
        let ClusterBuilder {
            config,
            transport,
            activator,
            known_peers,
        } = self;

        let partitioner = activator
            .create_partitioner(&config.partitioner)?
            .unwrap_or_default();
        let snitch = activator.resolve_snitch(&config.snitch)?;
        let strategy = activator.resolve_strategy(&config.endpoint_strategy)?;
        let pools = match activator.resolve_pool(&config.pool.policy)? {
            Some(factory) => EndpointPools::new(transport, config.pool.capacity, factory),
            None => EndpointPools::bounded(transport, config.pool.capacity),
        };

        debug!(
            ?partitioner,
            snitch = %config.snitch,
            strategy = %config.endpoint_strategy,
            pool = %config.pool.policy,
            capacity = config.pool.capacity,
            "Building cluster"
        );

        let cluster = Cluster::new(
            partitioner,
            snitch,
            strategy,
            config.local_address,
            config.replication_factor,
            config.strategy_seed,
            pools,
        )?;
        if !known_peers.is_empty() {
            cluster.refresh(known_peers).await?;
        }
        Ok(cluster)
    }
}
