//! Connections to cluster nodes and their per-endpoint pools.
//!
//! Actually talking to a node is the job of a [`Transport`] supplied by the
//! user; this module only opens, lends, retains and closes connections.

mod connection_pool;
mod endpoint_pools;
mod transport;

pub use connection_pool::{BoundedPool, ConnectionPool, NoReusePool};
pub use endpoint_pools::{EndpointPools, SharedPool};
pub use transport::{Connection, Transport};
