use std::net::IpAddr;
use std::num::NonZeroUsize;

/// Default number of replicas considered for each token.
pub const DEFAULT_REPLICATION_FACTOR: NonZeroUsize = match NonZeroUsize::new(3) {
    Some(rf) => rf,
    None => unreachable!(),
};

/// Default number of idle connections retained per endpoint.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Configuration of a [`Cluster`](super::Cluster).
///
/// Policies are named, not constructed: names are resolved through the
/// [`Activator`](crate::policies::registry::Activator) when the cluster is
/// built, so a bad name is rejected before anything is routed. An empty name
/// means the policy is not configured at all.
///
/// Loading this from a file is left to the application; with the `serde`
/// feature enabled the struct can be deserialized, missing fields taking
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "snake_case"))]
pub struct ClusterConfig {
    /// Partitioner the cluster computes tokens with. Defaults to `Murmur3Partitioner`.
    pub partitioner: String,

    /// Snitch ranking replicas by proximity to `local_address`.
    /// Empty by default: replicas are then tried in ring order.
    pub snitch: String,

    /// Strategy picking one of the ranked replicas. Defaults to `RandomStrategy`.
    pub endpoint_strategy: String,

    /// Per-endpoint connection pools.
    pub pool: PoolConfig,

    /// Address proximity is measured from, usually a node in the client's datacenter.
    pub local_address: Option<IpAddr>,

    /// How many distinct replicas own each token.
    pub replication_factor: NonZeroUsize,

    /// Fixed seed for random strategies, for reproducible routing in tests.
    ///
    /// It seeds one generator per cluster, which in turn seeds the strategy
    /// of every planned request: the sequence of picks is reproducible, and
    /// requests for the same replicas are still spread over all of them.
    pub strategy_seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            partitioner: "Murmur3Partitioner".to_owned(),
            snitch: String::new(),
            endpoint_strategy: "RandomStrategy".to_owned(),
            pool: PoolConfig::default(),
            local_address: None,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            strategy_seed: None,
        }
    }
}

/// Configuration of the per-endpoint connection pools.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Pool policy, `BoundedPool` or `NoReusePool` unless custom ones are registered.
    pub policy: String,

    /// How many idle connections each pool retains. It never limits how
    /// many connections are in use at once.
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            policy: "BoundedPool".to_owned(),
            capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}
