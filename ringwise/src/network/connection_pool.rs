use std::fmt;
use std::mem;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, trace};

use super::transport::{Connection, Transport};
use crate::errors::ConnectionPoolError;

/// The connections to one endpoint.
///
/// A connection returned by `acquire` belongs to the caller until it is given
/// back with `release`; the pool never lends it to anybody else meanwhile.
///
/// Pools do not limit how many connections are in use at once. If nothing
/// idle is available, `acquire` opens a new connection instead of waiting or
/// failing; the capacity only bounds how many idle connections are retained.
#[async_trait]
pub trait ConnectionPool<C: Connection>: Send + Sync + fmt::Debug {
    /// The endpoint all connections of this pool lead to.
    fn endpoint(&self) -> IpAddr;

    /// Lends a connection to the caller, opening one if none is idle.
    ///
    /// Fails if the pool was disposed or the transport failed to connect.
    async fn acquire(&self) -> Result<C, ConnectionPoolError>;

    /// Gives a connection back. The pool either keeps it for reuse or closes it.
    async fn release(&self, connection: C);

    /// Closes every idle connection; the pool lends nothing afterwards.
    ///
    /// Connections lent out at this point are closed when they are released.
    async fn dispose(&self);

    /// Number of connections currently kept idle.
    fn idle_count(&self) -> usize;

    /// Whether [`dispose`](ConnectionPool::dispose) was called.
    fn is_disposed(&self) -> bool;
}

/// Retains up to `capacity` idle connections and reuses them.
///
/// The most recently released connection is the first to be reused.
/// With capacity 0 it behaves like [`NoReusePool`].
pub struct BoundedPool<T: Transport> {
    endpoint: IpAddr,
    transport: Arc<T>,
    capacity: usize,
    idle: Mutex<Vec<T::Connection>>,
    disposed: AtomicBool,
}

impl<T: Transport> BoundedPool<T> {
    /// Name the policy is registered under.
    pub const NAME: &'static str = "BoundedPool";

    /// Creates an empty pool; connections are opened lazily.
    pub fn new(endpoint: IpAddr, transport: Arc<T>, capacity: usize) -> Self {
        Self {
            endpoint,
            transport,
            capacity,
            idle: Mutex::new(Vec::with_capacity(capacity)),
            disposed: AtomicBool::new(false),
        }
    }

    /// How many idle connections the pool retains at most.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // The guard must never be held across an `.await`.
    fn idle(&self) -> MutexGuard<'_, Vec<T::Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> fmt::Debug for BoundedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedPool")
            .field("endpoint", &self.endpoint)
            .field("capacity", &self.capacity)
            .field("idle", &self.idle_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[async_trait]
impl<T: Transport> ConnectionPool<T::Connection> for BoundedPool<T> {
    fn endpoint(&self) -> IpAddr {
        self.endpoint
    }

    async fn acquire(&self) -> Result<T::Connection, ConnectionPoolError> {
        let reused = {
            let mut idle = self.idle();
            // `dispose` sets the flag under the same lock it drains with.
            if self.disposed.load(Ordering::Acquire) {
                return Err(ConnectionPoolError::Disposed(self.endpoint));
            }
            idle.pop()
        };
        if let Some(connection) = reused {
            trace!(endpoint = %self.endpoint, "Reusing idle connection");
            return Ok(connection);
        }

        debug!(endpoint = %self.endpoint, "No idle connection, opening a new one");
        let connection = self.transport.open(self.endpoint).await?;
        if self.is_disposed() {
            debug!(endpoint = %self.endpoint, "Pool disposed while connecting, closing new connection");
            connection.close().await;
            return Err(ConnectionPoolError::Disposed(self.endpoint));
        }
        Ok(connection)
    }

    async fn release(&self, connection: T::Connection) {
        let rejected = {
            let mut idle = self.idle();
            // Checked under the lock, so a concurrent `dispose` cannot miss it.
            if !self.disposed.load(Ordering::Acquire) && idle.len() < self.capacity {
                idle.push(connection);
                None
            } else {
                Some(connection)
            }
        };

        match rejected {
            None => trace!(endpoint = %self.endpoint, "Connection returned to the pool"),
            Some(connection) => {
                debug!(
                    endpoint = %self.endpoint,
                    capacity = self.capacity,
                    "Pool full or disposed, closing released connection"
                );
                connection.close().await;
            }
        }
    }

    async fn dispose(&self) {
        let drained = {
            let mut idle = self.idle();
            self.disposed.store(true, Ordering::Release);
            mem::take(&mut *idle)
        };
        debug!(
            endpoint = %self.endpoint,
            closed = drained.len(),
            "Disposing connection pool"
        );
        join_all(drained.into_iter().map(|connection| connection.close())).await;
    }

    fn idle_count(&self) -> usize {
        self.idle().len()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Opens a fresh connection for every `acquire` and closes every released one.
///
/// For short-lived processes, debugging, or when a connection must never
/// outlive the request it was opened for.
pub struct NoReusePool<T: Transport> {
    endpoint: IpAddr,
    transport: Arc<T>,
    disposed: AtomicBool,
}

impl<T: Transport> NoReusePool<T> {
    /// Name the policy is registered under.
    pub const NAME: &'static str = "NoReusePool";

    /// Creates a pool opening connections to `endpoint` through `transport`.
    pub fn new(endpoint: IpAddr, transport: Arc<T>) -> Self {
        Self {
            endpoint,
            transport,
            disposed: AtomicBool::new(false),
        }
    }
}

impl<T: Transport> fmt::Debug for NoReusePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoReusePool")
            .field("endpoint", &self.endpoint)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[async_trait]
impl<T: Transport> ConnectionPool<T::Connection> for NoReusePool<T> {
    fn endpoint(&self) -> IpAddr {
        self.endpoint
    }

    async fn acquire(&self) -> Result<T::Connection, ConnectionPoolError> {
        if self.is_disposed() {
            return Err(ConnectionPoolError::Disposed(self.endpoint));
        }
        trace!(endpoint = %self.endpoint, "Opening a dedicated connection");
        let connection = self.transport.open(self.endpoint).await?;
        if self.is_disposed() {
            connection.close().await;
            return Err(ConnectionPoolError::Disposed(self.endpoint));
        }
        Ok(connection)
    }

    async fn release(&self, connection: T::Connection) {
        trace!(endpoint = %self.endpoint, "Closing released connection");
        connection.close().await;
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn idle_count(&self) -> usize {
        0
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use futures::future::join_all;
    use tokio::sync::Notify;

    use super::{BoundedPool, ConnectionPool, NoReusePool};
    use crate::errors::{ConnectionError, ConnectionPoolError};
    use crate::utils::test_utils::{setup_tracing, FakeTransport};

    const ENDPOINT: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

    #[tokio::test]
    async fn bounded_pool_reuses_released_connection() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pool = BoundedPool::new(ENDPOINT, transport.clone(), 1);

        let first = pool.acquire().await.unwrap();
        let first_id = first.id;
        pool.release(first).await;
        assert_eq!(pool.idle_count(), 1);

        let second = pool.acquire().await.unwrap();
        assert_eq!(second.id, first_id);
        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.closed(), 0);
    }

    #[tokio::test]
    async fn no_reuse_pool_opens_fresh_connections() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pool = NoReusePool::new(ENDPOINT, transport.clone());

        let first = pool.acquire().await.unwrap();
        let first_id = first.id;
        pool.release(first).await;
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(transport.closed(), 1);

        let second = pool.acquire().await.unwrap();
        assert_ne!(second.id, first_id);
        assert_eq!(transport.opened(), 2);
    }

    #[tokio::test]
    async fn bounded_pool_retains_at_most_capacity() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pool = BoundedPool::new(ENDPOINT, transport.clone(), 2);

        // No exhaustion: more connections than capacity can be in use at once.
        let mut lent = Vec::new();
        for _ in 0..5 {
            lent.push(pool.acquire().await.unwrap());
        }
        assert_eq!(transport.opened(), 5);

        for connection in lent {
            pool.release(connection).await;
        }
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(transport.closed(), 3);
    }

    #[tokio::test]
    async fn zero_capacity_never_reuses() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pool = BoundedPool::new(ENDPOINT, transport.clone(), 0);

        let first = pool.acquire().await.unwrap();
        let first_id = first.id;
        pool.release(first).await;
        assert_eq!(pool.idle_count(), 0);
        assert_ne!(pool.acquire().await.unwrap().id, first_id);
    }

    #[tokio::test]
    async fn dispose_closes_idle_and_later_releases() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pool = BoundedPool::new(ENDPOINT, transport.clone(), 4);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        pool.release(a).await;
        pool.release(b).await;

        pool.dispose().await;
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(transport.closed(), 2);

        // Still lent out during dispose; closed on release instead of retained.
        pool.release(c).await;
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(transport.closed(), 3);

        assert_matches!(
            pool.acquire().await,
            Err(ConnectionPoolError::Disposed(addr)) if addr == ENDPOINT
        );
    }

    #[tokio::test]
    async fn dispose_during_connect_closes_the_new_connection() {
        setup_tracing();
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(FakeTransport::gated(Arc::clone(&gate)));
        let pool = Arc::new(BoundedPool::new(ENDPOINT, transport.clone(), 4));

        let acquiring = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.acquire().await }
        });
        // Let the acquire pass the disposed check and block inside `open`.
        tokio::task::yield_now().await;
        pool.dispose().await;
        gate.notify_one();

        assert_matches!(
            acquiring.await.unwrap(),
            Err(ConnectionPoolError::Disposed(addr)) if addr == ENDPOINT
        );
        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.closed(), 1);
        assert_eq!(pool.idle_count(), 0);

        let pool = NoReusePool::new(ENDPOINT, Arc::new(FakeTransport::new()));
        pool.dispose().await;
        assert_matches!(pool.acquire().await, Err(ConnectionPoolError::Disposed(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::failing());
        let pool = BoundedPool::new(ENDPOINT, transport, 1);
        assert_matches!(
            pool.acquire().await,
            Err(ConnectionPoolError::Connection(ConnectionError::IoError { .. }))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20000)]
    async fn concurrent_acquire_never_lends_twice() {
        setup_tracing();
        let transport = Arc::new(FakeTransport::new());
        let pool = Arc::new(BoundedPool::new(ENDPOINT, transport.clone(), 4));

        let tasks = (0..16).map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let connection = pool.acquire().await.unwrap();
                    assert!(connection.mark_in_use(), "connection lent out twice");
                    tokio::task::yield_now().await;
                    connection.mark_idle();
                    pool.release(connection).await;
                }
            })
        });
        for result in join_all(tasks).await {
            result.unwrap();
        }

        assert!(pool.idle_count() <= 4);
        assert_eq!(transport.opened(), transport.closed() + pool.idle_count());
    }
}
