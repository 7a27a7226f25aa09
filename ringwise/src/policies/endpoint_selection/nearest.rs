use std::net::IpAddr;

use tracing::trace;

use super::{EndpointStrategy, FallbackPlan};
use crate::errors::NoEndpointsAvailable;
use crate::policies::snitch::Snitch;

/// Prefers endpoints close to the local node, falling through to farther ones.
///
/// The snapshot is ranked once, at construction, with
/// [`Snitch::sorted_by_proximity`] against the local address. `pick` always
/// returns the nearest endpoint; `fallback` walks outward from it.
#[derive(Debug)]
pub struct NearestStrategy {
    ranked: Vec<IpAddr>,
}

impl NearestStrategy {
    /// Name the strategy is registered under.
    pub const NAME: &'static str = "NearestStrategy";

    /// Ranks `endpoints` by proximity to `local` according to `snitch`.
    pub fn new(
        snitch: &dyn Snitch,
        local: IpAddr,
        endpoints: impl IntoIterator<Item = IpAddr>,
    ) -> Self {
        let endpoints: Vec<IpAddr> = endpoints.into_iter().collect();
        let ranked = snitch.sorted_by_proximity(local, &endpoints);
        trace!(%local, ?ranked, "Ranked endpoints by proximity");
        Self { ranked }
    }
}

impl EndpointStrategy for NearestStrategy {
    fn pick(&self) -> Result<IpAddr, NoEndpointsAvailable> {
        self.ranked.first().copied().ok_or(NoEndpointsAvailable {
            strategy: Self::NAME,
        })
    }

    fn fallback(&self) -> FallbackPlan<'_> {
        Box::new(self.ranked.iter().copied())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn len(&self) -> usize {
        self.ranked.len()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use assert_matches::assert_matches;

    use super::NearestStrategy;
    use crate::errors::NoEndpointsAvailable;
    use crate::policies::endpoint_selection::EndpointStrategy;
    use crate::policies::snitch::RackInferringSnitch;

    fn ip(dc: u8, rack: u8, node: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, dc, rack, node))
    }

    #[test]
    fn picks_nearest_and_falls_through_outward() {
        let local = ip(1, 1, 100);
        let remote = ip(2, 1, 1);
        let same_dc = ip(1, 2, 1);
        let same_rack = ip(1, 1, 1);

        let strategy = NearestStrategy::new(&RackInferringSnitch, local, [remote, same_dc, same_rack]);
        assert_eq!(strategy.pick().unwrap(), same_rack);
        assert_eq!(strategy.pick().unwrap(), same_rack);
        assert_eq!(
            strategy.fallback().collect::<Vec<_>>(),
            vec![same_rack, same_dc, remote]
        );
    }

    #[test]
    fn empty_snapshot_fails() {
        let strategy = NearestStrategy::new(&RackInferringSnitch, ip(1, 1, 1), Vec::new());
        assert_matches!(strategy.pick(), Err(NoEndpointsAvailable { .. }));
    }
}
