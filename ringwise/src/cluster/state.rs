use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, warn};

use super::Peer;
use crate::routing::Token;

/// An immutable snapshot of the cluster as seen by one metadata refresh.
///
/// Refreshing the metadata never mutates a `ClusterState`; a new snapshot is
/// built and swapped in as a whole, so readers always see a consistent ring.
#[derive(Debug, Default)]
pub struct ClusterState {
    peers: Vec<Arc<Peer>>,
    known_peers: HashMap<IpAddr, Arc<Peer>>,
    /// Every (token, index into `peers`) pair, sorted by token.
    ring: Vec<(Token, usize)>,
}

impl ClusterState {
    /// Builds a snapshot from the peers reported by a metadata refresh.
    ///
    /// Peers without tokens are not ring members and are left out. If an
    /// address is reported twice, the later description wins.
    pub fn new(peers: impl IntoIterator<Item = Peer>) -> Self {
        let mut by_address: HashMap<IpAddr, Arc<Peer>> = HashMap::new();
        let mut order: Vec<IpAddr> = Vec::new();

        for peer in peers {
            if peer.tokens.is_empty() {
                warn!(
                    address = %peer.address,
                    "Peer reported with no tokens, it is not a valid ring member - skipping"
                );
                continue;
            }
            let address = peer.address;
            if by_address.insert(address, Arc::new(peer)).is_some() {
                warn!(%address, "Peer reported twice in one refresh, keeping the later entry");
            } else {
                order.push(address);
            }
        }

        let peers: Vec<Arc<Peer>> = order
            .iter()
            .filter_map(|address| by_address.get(address).cloned())
            .collect();

        let mut ring: Vec<(Token, usize)> = peers
            .iter()
            .enumerate()
            .flat_map(|(idx, peer)| peer.tokens.iter().map(move |t| (t.clone(), idx)))
            .collect();
        // Stable, so a token claimed by two peers keeps the peers' reported order.
        ring.sort_by(|(a, _), (b, _)| a.cmp(b));

        debug!(
            peers = peers.len(),
            ring_size = ring.len(),
            "Built cluster state snapshot"
        );

        Self {
            peers,
            known_peers: by_address,
            ring,
        }
    }

    /// All ring members, in the order they were reported.
    pub fn peers(&self) -> &[Arc<Peer>] {
        &self.peers
    }

    /// Looks a peer up by address.
    pub fn get_peer(&self, address: &IpAddr) -> Option<&Arc<Peer>> {
        self.known_peers.get(address)
    }

    /// Addresses of all ring members, in the order they were reported.
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.peers.iter().map(|peer| peer.address).collect()
    }

    /// The ring: every token with its owner, in token order.
    pub fn ring(&self) -> impl Iterator<Item = (&Token, &Arc<Peer>)> {
        self.ring
            .iter()
            .map(|(token, idx)| (token, &self.peers[*idx]))
    }

    /// Whether the snapshot has no ring members.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// The peer owning `token`: the owner of the first ring token not
    /// smaller than `token`, wrapping around past the largest one.
    pub fn primary_replica(&self, token: &Token) -> Option<&Arc<Peer>> {
        self.ring_walk(token).next()
    }

    /// The first `replication_factor` distinct peers met when walking the
    /// ring clockwise from `token`. Fewer are returned if the cluster is smaller.
    pub fn replicas(&self, token: &Token, replication_factor: usize) -> Vec<&Arc<Peer>> {
        let mut replicas: Vec<&Arc<Peer>> = Vec::with_capacity(replication_factor);
        for peer in self.ring_walk(token) {
            if replicas.len() == replication_factor {
                break;
            }
            if !replicas.iter().any(|r| Arc::ptr_eq(r, peer)) {
                replicas.push(peer);
            }
        }
        replicas
    }

    fn ring_walk<'a>(&'a self, token: &Token) -> impl Iterator<Item = &'a Arc<Peer>> + 'a {
        let start = self.ring.partition_point(|(t, _)| t < token);
        let (smaller, from_token) = self.ring.split_at(start);
        from_token
            .iter()
            .chain(smaller.iter())
            .map(|(_, idx)| &self.peers[*idx])
    }
}
