//! Choosing policy implementations by name.
//!
//! Configuration names the snitch, endpoint strategy, pool policy and
//! partitioner to use as plain strings. A [`Registry`] maps such names to
//! factories for one capability; the [`Activator`] bundles one registry per
//! capability and is populated once, when the cluster is being configured.
//!
//! A name matches a registered entry either exactly or by its last
//! `.`-separated segment, so qualified class names such as
//! `org.apache.cassandra.locator.RackInferringSnitch` resolve too.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use crate::cluster::ClusterState;
use crate::errors::ConfigurationError;
use crate::network::{BoundedPool, ConnectionPool, NoReusePool, Transport};
use crate::policies::endpoint_selection::{
    EndpointStrategy, NearestStrategy, RandomStrategy, RoundRobinStrategy,
};
use crate::policies::snitch::{RackInferringSnitch, SimpleSnitch, Snitch, TopologySnitch};
use crate::routing::partitioner::PartitionerName;

/// The kinds of component that can be chosen by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// A [`Snitch`].
    Snitch,
    /// An [`EndpointStrategy`].
    EndpointStrategy,
    /// A [`ConnectionPool`] policy.
    ConnectionPool,
    /// A partitioner, see [`PartitionerName`].
    Partitioner,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Snitch => "snitch",
            Capability::EndpointStrategy => "endpoint selection strategy",
            Capability::ConnectionPool => "connection pool",
            Capability::Partitioner => "partitioner",
        })
    }
}

/// Builds a `Cap` out of constructor arguments.
pub type Factory<Cap, Args> =
    Arc<dyn Fn(Args) -> Result<Box<Cap>, ConfigurationError> + Send + Sync>;

/// Maps names to factories of one capability.
pub struct Registry<Cap: ?Sized, Args> {
    capability: Capability,
    factories: HashMap<String, Factory<Cap, Args>>,
}

impl<Cap: ?Sized, Args> Registry<Cap, Args> {
    /// Creates an empty registry for `capability`.
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            factories: HashMap::new(),
        }
    }

    /// The capability every entry of this registry provides.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Registers `factory` under `name`, replacing a previous entry.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(Args) -> Result<Box<Cap>, ConfigurationError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Whether `name` resolves to an entry.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<&Factory<Cap, Args>> {
        self.factories.get(name).or_else(|| {
            let (_, short) = name.rsplit_once('.')?;
            self.factories.get(short)
        })
    }

    /// Resolves `name` to its factory without constructing anything.
    ///
    /// An empty name means nothing is configured and yields `Ok(None)`.
    /// A name that is not registered fails with
    /// [`ConfigurationError::UnknownType`].
    pub fn resolve(&self, name: &str) -> Result<Option<Factory<Cap, Args>>, ConfigurationError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        match self.lookup(name) {
            Some(factory) => Ok(Some(factory.clone())),
            None => Err(ConfigurationError::UnknownType {
                capability: self.capability,
                name: name.to_owned(),
            }),
        }
    }

    /// Resolves `name` and constructs an instance from `args`.
    ///
    /// `Ok(None)` means no name was configured, which is distinct from a
    /// misconfigured one.
    pub fn create(&self, name: &str, args: Args) -> Result<Option<Box<Cap>>, ConfigurationError> {
        match self.resolve(name)? {
            Some(factory) => factory(args).map(Some),
            None => Ok(None),
        }
    }
}

impl<Cap: ?Sized, Args> fmt::Debug for Registry<Cap, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Registry")
            .field("capability", &self.capability)
            .field("names", &names)
            .finish()
    }
}

/// Constructor arguments of a snitch.
#[derive(Debug, Clone, Default)]
pub struct SnitchArgs {
    /// Current cluster view, for snitches that read placement from it.
    pub topology: Option<Arc<ClusterState>>,
}

/// Constructor arguments of an endpoint selection strategy.
#[derive(Debug, Clone, Default)]
pub struct StrategyArgs {
    /// The candidate snapshot the strategy picks from.
    pub endpoints: Vec<IpAddr>,
    /// Snitch used by proximity-aware strategies.
    pub snitch: Option<Arc<dyn Snitch>>,
    /// Address proximity is measured from.
    pub local: Option<IpAddr>,
    /// Fixed seed, for reproducible random strategies.
    pub seed: Option<u64>,
}

/// Constructor arguments of a connection pool.
#[derive(Debug)]
pub struct PoolArgs<T: Transport> {
    /// The endpoint the pool serves.
    pub endpoint: IpAddr,
    /// How connections are opened.
    pub transport: Arc<T>,
    /// How many idle connections to retain.
    pub capacity: usize,
}

impl<T: Transport> Clone for PoolArgs<T> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint,
            transport: Arc::clone(&self.transport),
            capacity: self.capacity,
        }
    }
}

/// Registry of snitches.
pub type SnitchRegistry = Registry<dyn Snitch, SnitchArgs>;
/// Registry of endpoint selection strategies.
pub type StrategyRegistry = Registry<dyn EndpointStrategy, StrategyArgs>;
/// Registry of connection pool policies for transport `T`.
pub type PoolRegistry<T> =
    Registry<dyn ConnectionPool<<T as Transport>::Connection>, PoolArgs<T>>;
/// Registry of partitioners.
pub type PartitionerRegistry = Registry<PartitionerName, ()>;

/// One registry per capability.
///
/// Asking for a name under the wrong capability, e.g. a snitch name where an
/// endpoint strategy is expected, fails with
/// [`ConfigurationError::CapabilityMismatch`] rather than a bare
/// [`ConfigurationError::UnknownType`].
pub struct Activator<T: Transport> {
    snitches: SnitchRegistry,
    strategies: StrategyRegistry,
    pools: PoolRegistry<T>,
    partitioners: PartitionerRegistry,
}

impl<T: Transport> Activator<T> {
    /// An activator knowing no implementations at all.
    pub fn empty() -> Self {
        Self {
            snitches: Registry::new(Capability::Snitch),
            strategies: Registry::new(Capability::EndpointStrategy),
            pools: Registry::new(Capability::ConnectionPool),
            partitioners: Registry::new(Capability::Partitioner),
        }
    }

    /// An activator knowing every implementation shipped with this crate.
    pub fn with_defaults() -> Self {
        let mut activator = Self::empty();

        activator
            .snitches
            .register("RackInferringSnitch", |_| Ok(Box::new(RackInferringSnitch)))
            .register("SimpleSnitch", |_| Ok(Box::new(SimpleSnitch)))
            .register("TopologySnitch", |args: SnitchArgs| {
                let topology = args.topology.ok_or(ConfigurationError::MissingArgument {
                    name: "TopologySnitch".to_owned(),
                    argument: "cluster topology",
                })?;
                Ok(Box::new(TopologySnitch::from_cluster_state(&topology)))
            });

        activator
            .strategies
            .register(RandomStrategy::NAME, |args: StrategyArgs| {
                Ok(Box::new(match args.seed {
                    Some(seed) => RandomStrategy::with_seed(args.endpoints, seed),
                    None => RandomStrategy::new(args.endpoints),
                }))
            })
            .register(RoundRobinStrategy::NAME, |args: StrategyArgs| {
                Ok(Box::new(RoundRobinStrategy::new(args.endpoints)))
            })
            .register(NearestStrategy::NAME, |args: StrategyArgs| {
                let missing = |argument| ConfigurationError::MissingArgument {
                    name: NearestStrategy::NAME.to_owned(),
                    argument,
                };
                let snitch = args.snitch.ok_or_else(|| missing("a snitch"))?;
                let local = args.local.ok_or_else(|| missing("a local address"))?;
                Ok(Box::new(NearestStrategy::new(
                    snitch.as_ref(),
                    local,
                    args.endpoints,
                )))
            });

        activator
            .pools
            .register(BoundedPool::<T>::NAME, |args: PoolArgs<T>| {
                Ok(Box::new(BoundedPool::new(
                    args.endpoint,
                    args.transport,
                    args.capacity,
                )))
            })
            .register(NoReusePool::<T>::NAME, |args: PoolArgs<T>| {
                Ok(Box::new(NoReusePool::new(args.endpoint, args.transport)))
            });

        activator
            .partitioners
            .register("Murmur3Partitioner", |()| Ok(Box::new(PartitionerName::Murmur3)))
            .register("RandomPartitioner", |()| Ok(Box::new(PartitionerName::Random)))
            .register("CDCPartitioner", |()| Ok(Box::new(PartitionerName::CDC)));

        activator
    }

    /// Registry of snitches, to add custom implementations.
    pub fn snitches_mut(&mut self) -> &mut SnitchRegistry {
        &mut self.snitches
    }

    /// Registry of endpoint selection strategies, to add custom implementations.
    pub fn strategies_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.strategies
    }

    /// Registry of pool policies, to add custom implementations.
    pub fn pools_mut(&mut self) -> &mut PoolRegistry<T> {
        &mut self.pools
    }

    /// Registry of partitioners.
    pub fn partitioners_mut(&mut self) -> &mut PartitionerRegistry {
        &mut self.partitioners
    }

    /// Creates the snitch registered as `name`.
    pub fn create_snitch(
        &self,
        name: &str,
        args: SnitchArgs,
    ) -> Result<Option<Box<dyn Snitch>>, ConfigurationError> {
        let created = self
            .resolve_snitch(name)?
            .map(|factory| factory(args))
            .transpose()?;
        debug!(snitch = name, found = created.is_some(), "Activated snitch");
        Ok(created)
    }

    /// Resolves the snitch factory registered as `name`.
    ///
    /// Snitches reading the cluster topology are rebuilt on every metadata
    /// refresh, so the factory is kept rather than a single instance.
    pub fn resolve_snitch(
        &self,
        name: &str,
    ) -> Result<Option<Factory<dyn Snitch, SnitchArgs>>, ConfigurationError> {
        self.snitches.resolve(name).map_err(|err| self.explain(err))
    }

    /// Creates the endpoint strategy registered as `name`.
    pub fn create_strategy(
        &self,
        name: &str,
        args: StrategyArgs,
    ) -> Result<Option<Box<dyn EndpointStrategy>>, ConfigurationError> {
        self.resolve_strategy(name)?
            .map(|factory| factory(args))
            .transpose()
    }

    /// Resolves the endpoint strategy factory registered as `name`.
    ///
    /// Strategies are built over a fresh snapshot for every request, so the
    /// factory is resolved once and called many times.
    pub fn resolve_strategy(
        &self,
        name: &str,
    ) -> Result<Option<Factory<dyn EndpointStrategy, StrategyArgs>>, ConfigurationError> {
        self.strategies.resolve(name).map_err(|err| self.explain(err))
    }

    /// Creates the connection pool policy registered as `name`.
    pub fn create_pool(
        &self,
        name: &str,
        args: PoolArgs<T>,
    ) -> Result<Option<Box<dyn ConnectionPool<T::Connection>>>, ConfigurationError> {
        self.resolve_pool(name)?
            .map(|factory| factory(args))
            .transpose()
    }

    /// Resolves the pool policy factory registered as `name`.
    pub fn resolve_pool(
        &self,
        name: &str,
    ) -> Result<Option<Factory<dyn ConnectionPool<T::Connection>, PoolArgs<T>>>, ConfigurationError>
    {
        self.pools.resolve(name).map_err(|err| self.explain(err))
    }

    /// Resolves the partitioner registered as `name`.
    pub fn create_partitioner(
        &self,
        name: &str,
    ) -> Result<Option<PartitionerName>, ConfigurationError> {
        let created = self
            .partitioners
            .create(name, ())
            .map_err(|err| self.explain(err))?;
        Ok(created.map(|boxed| *boxed))
    }

    /// Turns "unknown name" into "wrong capability" when the name is
    /// registered for some other capability.
    fn explain(&self, err: ConfigurationError) -> ConfigurationError {
        let (capability, name) = match err {
            ConfigurationError::UnknownType { capability, name } => (capability, name),
            other => return other,
        };
        let registered = [
            (self.snitches.capability(), self.snitches.contains(&name)),
            (self.strategies.capability(), self.strategies.contains(&name)),
            (self.pools.capability(), self.pools.contains(&name)),
            (self.partitioners.capability(), self.partitioners.contains(&name)),
        ]
        .into_iter()
        .find_map(|(cap, known)| (known && cap != capability).then_some(cap));

        match registered {
            Some(registered) => ConfigurationError::CapabilityMismatch {
                name,
                requested: capability,
                registered,
            },
            None => ConfigurationError::UnknownType { capability, name },
        }
    }
}

impl<T: Transport> Default for Activator<T> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<T: Transport> fmt::Debug for Activator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("snitches", &self.snitches)
            .field("strategies", &self.strategies)
            .field("pools", &self.pools)
            .field("partitioners", &self.partitioners)
            .finish()
    }
}
