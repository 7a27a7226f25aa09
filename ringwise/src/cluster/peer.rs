use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use itertools::Itertools;

use crate::routing::Token;

/// Coarse distance between two nodes.
///
/// Ordered from nearest to farthest, so sorting by proximity puts the
/// closest nodes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Proximity {
    /// Same datacenter, same rack.
    SameRack = 0,
    /// Same datacenter, different rack.
    SameDatacenter = 1,
    /// Different datacenter; racks are not compared.
    RemoteDatacenter = 2,
}

impl Proximity {
    /// The numeric score: 0 for the same rack, 1 for the same datacenter, 2 otherwise.
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A cluster node as described by a metadata refresh: where it is and
/// which ring positions it owns.
///
/// Two peers are equal when their addresses, datacenters and racks are equal
/// and they own the same *set* of tokens; the order in which tokens were
/// listed and repeated entries do not matter.
///
/// Datacenter and rack names are compared as exact strings: `"DC1"` and
/// `"dc1"` are different datacenters.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Address the node is reachable at.
    pub address: IpAddr,
    /// Datacenter the node belongs to.
    pub datacenter: String,
    /// Rack the node belongs to, within its datacenter.
    pub rack: String,
    /// Ring positions owned by the node.
    pub tokens: Vec<Token>,
}

impl Peer {
    /// Creates a peer description.
    pub fn new(
        address: IpAddr,
        datacenter: impl Into<String>,
        rack: impl Into<String>,
        tokens: impl IntoIterator<Item = Token>,
    ) -> Self {
        Self {
            address,
            datacenter: datacenter.into(),
            rack: rack.into(),
            tokens: tokens.into_iter().collect(),
        }
    }

    /// How far `other` is from this peer.
    pub fn proximity_to(&self, other: &Peer) -> Proximity {
        if self.datacenter != other.datacenter {
            Proximity::RemoteDatacenter
        } else if self.rack != other.rack {
            Proximity::SameDatacenter
        } else {
            Proximity::SameRack
        }
    }

    /// Whether both peers own exactly the same tokens, as sets.
    pub fn same_token_set(&self, other: &Peer) -> bool {
        let mine: BTreeSet<&Token> = self.tokens.iter().collect();
        let theirs: BTreeSet<&Token> = other.tokens.iter().collect();
        mine == theirs
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.datacenter == other.datacenter
            && self.rack == other.rack
            && self.same_token_set(other)
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.datacenter.hash(state);
        self.rack.hash(state);
        // Canonical form of the token set, so equal peers hash equally.
        for token in self.tokens.iter().sorted().dedup() {
            token.hash(state);
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (dc: {}, rack: {}, {} tokens)",
            self.address,
            self.datacenter,
            self.rack,
            self.tokens.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::net::{IpAddr, Ipv4Addr};

    use super::{Peer, Proximity};
    use crate::routing::Token;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn peer(last: u8, dc: &str, rack: &str, tokens: &[i64]) -> Peer {
        Peer::new(
            addr(last),
            dc,
            rack,
            tokens.iter().map(|t| Token::from(*t)),
        )
    }

    fn hash_of(peer: &Peer) -> u64 {
        let mut hasher = DefaultHasher::new();
        peer.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_ignores_token_order_and_duplicates() {
        let a = peer(1, "dc1", "r1", &[1, 2, 3]);
        let b = peer(1, "dc1", "r1", &[3, 1, 2]);
        let c = peer(1, "dc1", "r1", &[2, 3, 1, 1, 3]);

        // reflexive
        assert_eq!(a, a);
        // symmetric
        assert_eq!(a, b);
        assert_eq!(b, a);
        // transitive
        assert_eq!(b, c);
        assert_eq!(a, c);

        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(hash_of(&a), hash_of(&c));
    }

    #[test]
    fn peers_differing_by_one_token_are_unequal() {
        let a = peer(1, "dc1", "r1", &[1, 2, 3]);
        assert_ne!(a, peer(1, "dc1", "r1", &[1, 2]));
        assert_ne!(a, peer(1, "dc1", "r1", &[1, 2, 4]));
    }

    #[test]
    fn placement_and_address_take_part_in_equality() {
        let a = peer(1, "dc1", "r1", &[1]);
        assert_ne!(a, peer(2, "dc1", "r1", &[1]));
        assert_ne!(a, peer(1, "dc2", "r1", &[1]));
        assert_ne!(a, peer(1, "dc1", "r2", &[1]));
        // Names are compared literally.
        assert_ne!(a, peer(1, "DC1", "r1", &[1]));
    }

    #[test]
    fn proximity_scores() {
        let a = peer(1, "1", "1", &[1]);
        let b = peer(2, "1", "1", &[2]);
        let c = peer(3, "1", "2", &[3]);
        let d = peer(4, "2", "1", &[4]);

        assert_eq!(a.proximity_to(&b).value(), 0);
        assert_eq!(a.proximity_to(&c).value(), 1);
        assert_eq!(a.proximity_to(&d).value(), 2);

        assert_eq!(a.proximity_to(&d), Proximity::RemoteDatacenter);
        assert_eq!(d.proximity_to(&a), Proximity::RemoteDatacenter);
        assert_eq!(c.proximity_to(&a), Proximity::SameDatacenter);
        assert!(Proximity::SameRack < Proximity::SameDatacenter);
    }

    #[test]
    fn proximity_is_case_sensitive() {
        let a = peer(1, "dc1", "rack1", &[1]);
        let b = peer(2, "DC1", "rack1", &[2]);
        assert_eq!(a.proximity_to(&b), Proximity::RemoteDatacenter);
    }
}
