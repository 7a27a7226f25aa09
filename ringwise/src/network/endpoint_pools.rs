use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info};

use super::connection_pool::{BoundedPool, ConnectionPool};
use super::transport::Transport;
use crate::cluster::ClusterState;
use crate::errors::{ConfigurationError, ConnectionPoolError};
use crate::policies::registry::{Factory, PoolArgs};

/// A pool shared between every caller routing to one endpoint.
pub type SharedPool<T> = Arc<dyn ConnectionPool<<T as Transport>::Connection>>;

/// One connection pool per endpoint.
///
/// Every endpoint gets its own pool, so callers acquiring connections to
/// different endpoints never contend. The set of pools follows the cluster:
/// [`open_missing`](EndpointPools::open_missing) opens pools for new peers
/// and [`retire_absent`](EndpointPools::retire_absent) disposes the pools of
/// peers that left.
pub struct EndpointPools<T: Transport> {
    transport: Arc<T>,
    capacity: usize,
    factory: Factory<dyn ConnectionPool<T::Connection>, PoolArgs<T>>,
    pools: DashMap<IpAddr, SharedPool<T>>,
}

impl<T: Transport> EndpointPools<T> {
    /// Creates pools with `factory`, passing each the given transport and capacity.
    pub fn new(
        transport: Arc<T>,
        capacity: usize,
        factory: Factory<dyn ConnectionPool<T::Connection>, PoolArgs<T>>,
    ) -> Self {
        Self {
            transport,
            capacity,
            factory,
            pools: DashMap::new(),
        }
    }

    /// Creates [`BoundedPool`]s retaining up to `capacity` idle connections each.
    pub fn bounded(transport: Arc<T>, capacity: usize) -> Self {
        Self::new(
            transport,
            capacity,
            Arc::new(
                |args: PoolArgs<T>| -> Result<Box<dyn ConnectionPool<T::Connection>>, ConfigurationError> {
                    Ok(Box::new(BoundedPool::new(
                        args.endpoint,
                        args.transport,
                        args.capacity,
                    )))
                },
            ),
        )
    }

    /// The pool of `endpoint`, if the endpoint is known.
    pub fn get(&self, endpoint: IpAddr) -> Result<SharedPool<T>, ConnectionPoolError> {
        self.pools
            .get(&endpoint)
            .map(|pool| Arc::clone(pool.value()))
            .ok_or(ConnectionPoolError::NoPoolForEndpoint(endpoint))
    }

    /// Endpoints that currently have a pool, in no particular order.
    pub fn endpoints(&self) -> Vec<IpAddr> {
        self.pools.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether there are no pools.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    fn create_pool(&self, endpoint: IpAddr) -> Result<SharedPool<T>, ConfigurationError> {
        let pool = (self.factory)(PoolArgs {
            endpoint,
            transport: Arc::clone(&self.transport),
            capacity: self.capacity,
        })?;
        Ok(Arc::from(pool))
    }

    /// Creates a pool for every peer of `state` that has none yet.
    ///
    /// Existing pools are kept as they are, with their idle connections.
    pub fn open_missing(&self, state: &ClusterState) -> Result<(), ConfigurationError> {
        for address in state.addresses() {
            if self.pools.contains_key(&address) {
                continue;
            }
            let pool = self.create_pool(address)?;
            debug!(endpoint = %address, "Created connection pool for new peer");
            self.pools.entry(address).or_insert(pool);
        }
        Ok(())
    }

    /// Disposes the pools of endpoints that are not peers of `state`.
    pub async fn retire_absent(&self, state: &ClusterState) {
        let stale: Vec<IpAddr> = self
            .pools
            .iter()
            .map(|entry| *entry.key())
            .filter(|address| state.get_peer(address).is_none())
            .collect();
        // Removed before any `.await`, so no map guard is held while disposing.
        let removed: Vec<SharedPool<T>> = stale
            .iter()
            .filter_map(|address| self.pools.remove(address).map(|(_, pool)| pool))
            .collect();
        if !removed.is_empty() {
            info!(endpoints = ?stale, "Disposing connection pools of peers that left the cluster");
        }
        join_all(removed.iter().map(|pool| pool.dispose())).await;
    }

    /// Disposes every pool and forgets all endpoints.
    pub async fn dispose_all(&self) {
        let endpoints = self.endpoints();
        let removed: Vec<SharedPool<T>> = endpoints
            .iter()
            .filter_map(|address| self.pools.remove(address).map(|(_, pool)| pool))
            .collect();
        debug!(pools = removed.len(), "Disposing all connection pools");
        join_all(removed.iter().map(|pool| pool.dispose())).await;
    }
}

impl<T: Transport> fmt::Debug for EndpointPools<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointPools")
            .field("transport", &self.transport)
            .field("capacity", &self.capacity)
            .field("endpoints", &self.endpoints())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::EndpointPools;
    use crate::cluster::{ClusterState, Peer};
    use crate::errors::ConnectionPoolError;
    use crate::routing::Token;
    use crate::utils::test_utils::{setup_tracing, FakeTransport};

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn state(addresses: &[u8]) -> ClusterState {
        ClusterState::new(
            addresses
                .iter()
                .map(|last| Peer::new(ip(*last), "dc1", "r1", [Token::from(*last as i64)])),
        )
    }

    #[tokio::test]
    async fn pools_follow_cluster_membership() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pools = EndpointPools::bounded(transport.clone(), 2);

        pools.open_missing(&state(&[1, 2])).unwrap();
        let mut endpoints = pools.endpoints();
        endpoints.sort();
        assert_eq!(endpoints, vec![ip(1), ip(2)]);

        // Park an idle connection in each pool.
        for endpoint in [ip(1), ip(2)] {
            let pool = pools.get(endpoint).unwrap();
            let connection = pool.acquire().await.unwrap();
            assert_eq!(connection.endpoint, endpoint);
            pool.release(connection).await;
        }
        let kept = pools.get(ip(1)).unwrap();

        let next = state(&[1, 3]);
        pools.open_missing(&next).unwrap();
        // Old and new peers both have pools until the absent ones are retired.
        assert_eq!(pools.len(), 3);
        pools.retire_absent(&next).await;
        let mut endpoints = pools.endpoints();
        endpoints.sort();
        assert_eq!(endpoints, vec![ip(1), ip(3)]);

        // The surviving pool is the same one, idle connection included.
        assert!(Arc::ptr_eq(&kept, &pools.get(ip(1)).unwrap()));
        assert_eq!(kept.idle_count(), 1);
        // The removed peer's idle connection was closed.
        assert_eq!(transport.closed(), 1);
        assert_matches!(
            pools.get(ip(2)),
            Err(ConnectionPoolError::NoPoolForEndpoint(addr)) if addr == ip(2)
        );
    }

    #[tokio::test]
    async fn dispose_all_closes_everything() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pools = EndpointPools::bounded(transport.clone(), 2);
        pools.open_missing(&state(&[1, 2, 3])).unwrap();

        let pool = pools.get(ip(3)).unwrap();
        let connection = pool.acquire().await.unwrap();
        pool.release(connection).await;

        pools.dispose_all().await;
        assert!(pools.is_empty());
        assert!(pool.is_disposed());
        assert_eq!(transport.closed(), transport.opened());
    }
}
