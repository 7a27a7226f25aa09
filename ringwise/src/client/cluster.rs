use std::fmt;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use rand::RngCore;
use rand_pcg::Pcg32;
use tracing::{debug, info, trace};

use crate::cluster::{ClusterState, Peer};
use crate::errors::{ConfigurationError, ConnectionPoolError, RouteError};
use crate::network::{EndpointPools, SharedPool, Transport};
use crate::policies::endpoint_selection::{
    EndpointStrategy, FallbackPlan, RoundRobinStrategy,
};
use crate::policies::registry::{Factory, SnitchArgs, StrategyArgs};
use crate::policies::snitch::Snitch;
use crate::routing::partitioner::PartitionerName;
use crate::routing::{PartitionKey, Token};

/// The cluster view and the snitch built from it, swapped together.
#[derive(Debug, Default)]
struct Topology {
    state: Arc<ClusterState>,
    snitch: Option<Arc<dyn Snitch>>,
}

/// Routes partition keys to the nodes replicating them.
///
/// A `Cluster` owns everything routing needs: the partitioner, the current
/// cluster view, the configured snitch and endpoint strategy, and one
/// connection pool per node. It is created with a
/// [`ClusterBuilder`](super::ClusterBuilder).
///
/// The cluster view is replaced as a whole by [`refresh`](Cluster::refresh);
/// routing concurrently with a refresh sees either the old view or the new
/// one, never a mix.
pub struct Cluster<T: Transport> {
    partitioner: PartitionerName,
    snitch: Option<Factory<dyn Snitch, SnitchArgs>>,
    strategy: Option<Factory<dyn EndpointStrategy, StrategyArgs>>,
    local_address: Option<IpAddr>,
    replication_factor: NonZeroUsize,
    // Seeds every strategy built by `plan`, so a fixed seed gives a
    // reproducible sequence of picks rather than one repeated pick.
    strategy_seeds: Option<Mutex<Pcg32>>,
    pools: EndpointPools<T>,
    topology: ArcSwap<Topology>,
    // Held for the whole of a refresh, so refreshes never interleave.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<T: Transport> Cluster<T> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        partitioner: PartitionerName,
        snitch: Option<Factory<dyn Snitch, SnitchArgs>>,
        strategy: Option<Factory<dyn EndpointStrategy, StrategyArgs>>,
        local_address: Option<IpAddr>,
        replication_factor: NonZeroUsize,
        strategy_seed: Option<u64>,
        pools: EndpointPools<T>,
    ) -> Result<Self, ConfigurationError> {
        let cluster = Self {
            partitioner,
            snitch,
            strategy,
            local_address,
            replication_factor,
            strategy_seeds: strategy_seed.map(|seed| Mutex::new(Pcg32::new(seed, 0))),
            pools,
            topology: ArcSwap::from_pointee(Topology::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        };
        // Builds the snitch and the strategy once over the empty view, so
        // that a policy refusing its arguments is reported at configuration
        // time and never while routing.
        let topology = cluster.build_topology(Arc::new(ClusterState::default()))?;
        cluster.build_strategy(&topology, Vec::new())?;
        cluster.topology.store(Arc::new(topology));
        Ok(cluster)
    }

    fn build_topology(&self, state: Arc<ClusterState>) -> Result<Topology, ConfigurationError> {
        let snitch: Option<Arc<dyn Snitch>> = match &self.snitch {
            Some(factory) => Some(Arc::from(factory(SnitchArgs {
                topology: Some(Arc::clone(&state)),
            })?)),
            None => None,
        };
        Ok(Topology { state, snitch })
    }

    fn build_strategy(
        &self,
        topology: &Topology,
        ranked: Vec<IpAddr>,
    ) -> Result<Box<dyn EndpointStrategy>, ConfigurationError> {
        match &self.strategy {
            Some(factory) => factory(StrategyArgs {
                endpoints: ranked,
                snitch: topology.snitch.clone(),
                local: self.local_address,
                seed: self.next_strategy_seed(),
            }),
            None => Ok(Box::new(RoundRobinStrategy::new(ranked))),
        }
    }

    fn next_strategy_seed(&self) -> Option<u64> {
        self.strategy_seeds.as_ref().map(|seeds| {
            seeds
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_u64()
        })
    }

    /// Replaces the cluster view with the peers of a metadata refresh.
    ///
    /// Peers without tokens are ignored. Pools for new peers are opened
    /// before the new view is published, and the pools of peers no longer
    /// present are disposed after it. Concurrent refreshes are applied one
    /// at a time.
    pub async fn refresh(
        &self,
        peers: impl IntoIterator<Item = Peer>,
    ) -> Result<(), ConfigurationError> {
        let state = Arc::new(ClusterState::new(peers));
        let _refreshing = self.refresh_lock.lock().await;

        let topology = self.build_topology(Arc::clone(&state))?;
        self.pools.open_missing(&state)?;
        self.topology.store(Arc::new(topology));
        info!(peers = state.peers().len(), "Cluster view refreshed");

        self.pools.retire_absent(&state).await;
        Ok(())
    }

    /// The current cluster view.
    pub fn state(&self) -> Arc<ClusterState> {
        Arc::clone(&self.topology.load().state)
    }

    /// The partitioner tokens are computed with.
    pub fn partitioner(&self) -> &PartitionerName {
        &self.partitioner
    }

    /// The per-endpoint connection pools.
    pub fn pools(&self) -> &EndpointPools<T> {
        &self.pools
    }

    /// Computes the token of `key` with the cluster's partitioner.
    pub fn compute_token(&self, key: &PartitionKey) -> Result<Token, RouteError> {
        self.partitioner
            .compute_token(key)?
            .ok_or(RouteError::NoToken)
    }

    /// Decides which nodes a request for `key` should go to.
    ///
    /// Replicas of the key's token are ranked by proximity to the local
    /// address (when both a snitch and a local address are configured) and
    /// handed to the configured endpoint strategy. Without a strategy the
    /// ranked replicas are tried in order.
    ///
    /// A key with no token or a token with no replicas is refused; the
    /// request is never routed to an arbitrary node.
    pub fn plan(&self, key: &PartitionKey) -> Result<RoutingPlan, RouteError> {
        self.plan_in(&self.topology.load(), key)
    }

    fn plan_in(&self, topology: &Topology, key: &PartitionKey) -> Result<RoutingPlan, RouteError> {
        let token = self.compute_token(key)?;

        let replicas: Vec<IpAddr> = topology
            .state
            .replicas(&token, self.replication_factor.get())
            .iter()
            .map(|peer| peer.address)
            .collect();
        if replicas.is_empty() {
            return Err(RouteError::NoReplicas(token));
        }

        let ranked = match (&topology.snitch, self.local_address) {
            (Some(snitch), Some(local)) => snitch.sorted_by_proximity(local, &replicas),
            _ => replicas,
        };
        let strategy = self.build_strategy(topology, ranked.clone())?;

        debug!(
            %token,
            replicas = ?ranked,
            strategy = strategy.name(),
            "Planned request routing"
        );
        Ok(RoutingPlan {
            token,
            replicas: ranked,
            strategy,
        })
    }

    /// Picks an endpoint for `key` and lends a connection to it.
    ///
    /// If a refresh removes the chosen endpoint meanwhile, the request is
    /// planned again against the new view.
    ///
    /// The connection must be given back with [`LeasedConnection::release`]
    /// (or closed by the caller) once the request is done.
    pub async fn connect(&self, key: &PartitionKey) -> Result<LeasedConnection<T>, RouteError> {
        loop {
            let topology = self.topology.load_full();
            let endpoint = self.plan_in(&topology, key)?.pick()?;

            let leased = match self.pools.get(endpoint) {
                Ok(pool) => {
                    let acquired = pool.acquire().await;
                    acquired.map(|connection| (connection, pool))
                }
                Err(err) => Err(err),
            };
            match leased {
                Ok((connection, pool)) => {
                    trace!(%endpoint, "Leased connection");
                    return Ok(LeasedConnection {
                        endpoint,
                        connection,
                        pool,
                    });
                }
                Err(
                    ConnectionPoolError::NoPoolForEndpoint(_) | ConnectionPoolError::Disposed(_),
                ) if !Arc::ptr_eq(&topology, &self.topology.load()) => {
                    debug!(%endpoint, "Endpoint left the cluster while connecting, planning again");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Disposes every connection pool.
    pub async fn shutdown(&self) {
        self.pools.dispose_all().await;
    }
}

impl<T: Transport> fmt::Debug for Cluster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("partitioner", &self.partitioner)
            .field("local_address", &self.local_address)
            .field("replication_factor", &self.replication_factor)
            .field("topology", &self.topology.load())
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

/// Where a request for one partition key should go.
#[derive(Debug)]
pub struct RoutingPlan {
    token: Token,
    replicas: Vec<IpAddr>,
    strategy: Box<dyn EndpointStrategy>,
}

impl RoutingPlan {
    /// The token of the key.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Replicas of the token, nearest first.
    pub fn replicas(&self) -> &[IpAddr] {
        &self.replicas
    }

    /// The endpoint to contact first.
    pub fn pick(&self) -> Result<IpAddr, RouteError> {
        Ok(self.strategy.pick()?)
    }

    /// The endpoints in the order the strategy would try them.
    pub fn fallback(&self) -> FallbackPlan<'_> {
        self.strategy.fallback()
    }
}

/// A connection lent out by an endpoint's pool.
///
/// Dereferences to the connection itself. Dropping it without calling
/// [`release`](LeasedConnection::release) drops the connection without
/// closing it through the transport.
pub struct LeasedConnection<T: Transport> {
    endpoint: IpAddr,
    connection: T::Connection,
    pool: SharedPool<T>,
}

impl<T: Transport> LeasedConnection<T> {
    /// The endpoint the connection leads to.
    pub fn endpoint(&self) -> IpAddr {
        self.endpoint
    }

    /// Gives the connection back to its pool.
    pub async fn release(self) {
        self.pool.release(self.connection).await;
    }
}

impl<T: Transport> Deref for LeasedConnection<T> {
    type Target = T::Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl<T: Transport> DerefMut for LeasedConnection<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}

impl<T: Transport> fmt::Debug for LeasedConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedConnection")
            .field("endpoint", &self.endpoint)
            .field("connection", &self.connection)
            .finish()
    }
}
