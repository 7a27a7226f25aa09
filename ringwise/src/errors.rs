//! Errors returned by the routing core.
//!
//! Nothing here is swallowed internally: every failure reaches the caller
//! that asked for the token, the endpoint, or the connection.

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

pub use ringwise_cql::{DeserializationError, SerializationError};

use crate::policies::registry::Capability;
use crate::routing::Token;

/// Failed to compute the token of a partition key.
///
/// A wrong token silently misroutes the request, so encoding problems are
/// reported instead of falling back to some default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenCalculationError {
    /// A key component has no canonical encoding, so no token can be hashed from it.
    #[error("Failed to encode partition key component #{index}: {error}")]
    Serialization {
        /// Position of the offending component in the key.
        index: usize,
        /// What went wrong.
        #[source]
        error: SerializationError,
    },

    /// A composite key component is longer than its `u16` length prefix allows.
    #[error("Value of partition key component is too long: {0} bytes, maximum is 65535")]
    ValueTooLong(usize),

    /// A partition key must name at least one value.
    #[error("Partition key must have at least one component")]
    EmptyPartitionKey,
}

/// An endpoint selection strategy was asked to pick from an empty set.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No endpoints available for the {strategy} endpoint selection strategy")]
pub struct NoEndpointsAvailable {
    /// Name of the strategy that had nothing to pick from.
    pub strategy: &'static str,
}

/// A named policy could not be activated.
///
/// These are raised while the cluster is being configured; a component whose
/// activation failed is never handed out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// No implementation is registered under this name.
    #[error("Unknown {capability} type: {name:?}")]
    UnknownType {
        /// The capability that was requested.
        capability: Capability,
        /// The offending name.
        name: String,
    },

    /// The name resolves, but to an implementation of another capability.
    #[error("Type {name:?} is a {registered}, it cannot be used as a {requested}")]
    CapabilityMismatch {
        /// The offending name.
        name: String,
        /// The capability that was requested.
        requested: Capability,
        /// The capability the name is registered for.
        registered: Capability,
    },

    /// The implementation needs a constructor argument that was not supplied.
    #[error("Type {name:?} requires {argument}, which was not configured")]
    MissingArgument {
        /// The type being constructed.
        name: String,
        /// The absent argument.
        argument: &'static str,
    },
}

/// The transport failed to open a connection.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Input/Output error while connecting.
    #[error("Failed to connect to {address}: {error}")]
    IoError {
        /// Endpoint that refused.
        address: IpAddr,
        /// Underlying error.
        #[source]
        error: Arc<std::io::Error>,
    },
}

/// Failed to obtain a connection from a pool.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConnectionPoolError {
    /// The pool was disposed; it lends no more connections.
    #[error("Connection pool for {0} has been disposed")]
    Disposed(IpAddr),

    /// No pool exists for the endpoint, e.g. it left the cluster.
    #[error("No connection pool for endpoint {0}")]
    NoPoolForEndpoint(IpAddr),

    /// The pool had no idle connection and opening a new one failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Failed to route a request to an endpoint.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum RouteError {
    /// The partition key could not be turned into a token.
    #[error(transparent)]
    TokenCalculation(#[from] TokenCalculationError),

    /// The partitioner produced no token for the key.
    #[error("Partitioner produced no token for the partition key")]
    NoToken,

    /// The current cluster view has no replica for the token.
    #[error("No replicas known for token {0}")]
    NoReplicas(Token),

    /// The strategy had nothing to pick from.
    #[error(transparent)]
    NoEndpoints(#[from] NoEndpointsAvailable),

    /// The configured strategy could not be built.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No connection could be obtained for the chosen endpoint.
    #[error(transparent)]
    ConnectionPool(#[from] ConnectionPoolError),
}
