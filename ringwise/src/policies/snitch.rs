//! Snitches map node addresses to their datacenter and rack, and rank
//! candidate nodes by how close they are to a reference node.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use crate::cluster::ClusterState;

/// Tells where a node lives in the cluster's topology.
///
/// Implementations only have to answer `rack` and `datacenter`; ranking
/// candidates by proximity is derived from those two answers.
pub trait Snitch: Send + Sync + fmt::Debug {
    /// The rack of the node at `address`.
    fn rack(&self, address: IpAddr) -> Cow<'_, str>;

    /// The datacenter of the node at `address`.
    fn datacenter(&self, address: IpAddr) -> Cow<'_, str>;

    /// Orders two candidates by how close they are to `reference`.
    ///
    /// In order of precedence:
    /// 1. the reference itself comes before any other node,
    /// 2. a node in the reference's datacenter comes before one that is not,
    /// 3. a node in the reference's rack comes before one that is not,
    /// 4. otherwise the two are equal.
    fn compare_by_proximity(&self, reference: IpAddr, a1: IpAddr, a2: IpAddr) -> Ordering {
        match (a1 == reference, a2 == reference) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => (),
        }

        let local_dc = self.datacenter(reference);
        let a1_local_dc = self.datacenter(a1) == local_dc;
        let a2_local_dc = self.datacenter(a2) == local_dc;
        if a1_local_dc != a2_local_dc {
            return if a1_local_dc {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        let local_rack = self.rack(reference);
        let a1_local_rack = self.rack(a1) == local_rack;
        let a2_local_rack = self.rack(a2) == local_rack;
        if a1_local_rack != a2_local_rack {
            return if a1_local_rack {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        Ordering::Equal
    }

    /// Returns `candidates` ordered from nearest to farthest from `reference`.
    ///
    /// The sort is stable: candidates the comparator considers equal keep
    /// their relative input order.
    fn sorted_by_proximity(&self, reference: IpAddr, candidates: &[IpAddr]) -> Vec<IpAddr> {
        let mut sorted = candidates.to_vec();
        // `sort_by` is stable, `sort_unstable_by` would not be.
        sorted.sort_by(|a1, a2| self.compare_by_proximity(reference, *a1, *a2));
        sorted
    }
}

/// Infers topology from the node's address: for IPv4 the second octet is
/// the datacenter and the third octet is the rack.
///
/// For IPv6 the second and third bytes of the address are used the same way.
///
/// This is only correct in deployments whose addressing scheme encodes the
/// topology like that, e.g. `10.<dc>.<rack>.<node>`. Nothing is looked up.
#[derive(Debug, Default, Clone, Copy)]
pub struct RackInferringSnitch;

impl RackInferringSnitch {
    fn octet(address: IpAddr, index: usize) -> u8 {
        match address {
            IpAddr::V4(v4) => v4.octets()[index],
            IpAddr::V6(v6) => v6.octets()[index],
        }
    }
}

impl Snitch for RackInferringSnitch {
    fn rack(&self, address: IpAddr) -> Cow<'_, str> {
        Cow::Owned(Self::octet(address, 2).to_string())
    }

    fn datacenter(&self, address: IpAddr) -> Cow<'_, str> {
        Cow::Owned(Self::octet(address, 1).to_string())
    }
}

/// Puts every node in the same datacenter and rack.
///
/// Sorting by proximity then only moves the reference node to the front.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleSnitch;

impl SimpleSnitch {
    /// The datacenter every node is placed in.
    pub const DATACENTER: &'static str = "datacenter1";
    /// The rack every node is placed in.
    pub const RACK: &'static str = "rack1";
}

impl Snitch for SimpleSnitch {
    fn rack(&self, _address: IpAddr) -> Cow<'_, str> {
        Cow::Borrowed(Self::RACK)
    }

    fn datacenter(&self, _address: IpAddr) -> Cow<'_, str> {
        Cow::Borrowed(Self::DATACENTER)
    }
}

/// Looks the topology up in a table, usually the placement the nodes
/// themselves reported in the last metadata refresh.
///
/// Addresses missing from the table are placed in the default datacenter
/// and rack.
#[derive(Debug, Clone)]
pub struct TopologySnitch {
    placement: HashMap<IpAddr, (String, String)>,
    default_datacenter: String,
    default_rack: String,
}

impl TopologySnitch {
    /// Default placement of unknown addresses.
    pub const UNKNOWN: &'static str = "UNKNOWN";

    /// Creates a snitch from explicit `(datacenter, rack)` placements.
    pub fn new(placement: HashMap<IpAddr, (String, String)>) -> Self {
        Self {
            placement,
            default_datacenter: Self::UNKNOWN.to_owned(),
            default_rack: Self::UNKNOWN.to_owned(),
        }
    }

    /// Creates a snitch answering with the placement each peer reported.
    pub fn from_cluster_state(state: &ClusterState) -> Self {
        Self::new(
            state
                .peers()
                .iter()
                .map(|peer| {
                    (
                        peer.address,
                        (peer.datacenter.clone(), peer.rack.clone()),
                    )
                })
                .collect(),
        )
    }

    /// Sets the placement reported for addresses missing from the table.
    pub fn with_default(
        mut self,
        datacenter: impl Into<String>,
        rack: impl Into<String>,
    ) -> Self {
        self.default_datacenter = datacenter.into();
        self.default_rack = rack.into();
        self
    }
}

impl Snitch for TopologySnitch {
    fn rack(&self, address: IpAddr) -> Cow<'_, str> {
        match self.placement.get(&address) {
            Some((_, rack)) => Cow::Borrowed(rack),
            None => Cow::Borrowed(&self.default_rack),
        }
    }

    fn datacenter(&self, address: IpAddr) -> Cow<'_, str> {
        match self.placement.get(&address) {
            Some((dc, _)) => Cow::Borrowed(dc),
            None => Cow::Borrowed(&self.default_datacenter),
        }
    }
}
