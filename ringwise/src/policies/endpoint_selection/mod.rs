//! Endpoint selection strategies
//!
//! A strategy is built over a snapshot of candidate endpoints and decides
//! which of them to contact. Callers only see the [`EndpointStrategy`] trait,
//! so policies can be swapped through configuration.

use std::fmt;
use std::net::IpAddr;

use crate::errors::NoEndpointsAvailable;

mod nearest;
mod random;
mod round_robin;

pub use nearest::NearestStrategy;
pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;

/// The candidates to try, in the order a strategy prefers them.
///
/// It is computed on-demand, only if contacting the picked endpoint fails.
pub type FallbackPlan<'a> = Box<dyn Iterator<Item = IpAddr> + Send + Sync + 'a>;

/// Policy that decides which endpoint to contact next.
///
/// Most requests succeed on the first try, so `pick` returns only the single
/// most preferred endpoint. `fallback` lays out the whole preference order of
/// the snapshot; it may start with the endpoint `pick` returned.
pub trait EndpointStrategy: Send + Sync + fmt::Debug {
    /// Returns the endpoint to contact.
    ///
    /// Fails with [`NoEndpointsAvailable`] if the snapshot is empty.
    fn pick(&self) -> Result<IpAddr, NoEndpointsAvailable>;

    /// Returns the endpoints in the order this policy would try them.
    fn fallback(&self) -> FallbackPlan<'_>;

    /// Returns the name of the strategy.
    fn name(&self) -> &'static str;

    /// Number of endpoints in the snapshot.
    fn len(&self) -> usize;

    /// Whether the snapshot is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
