//! This module holds entities that represent the cluster as a whole:
//! the nodes it consists of, their placement in datacenters and racks,
//! and the token ring they form.

mod peer;
mod state;

pub use peer::{Peer, Proximity};
pub use state::ClusterState;
