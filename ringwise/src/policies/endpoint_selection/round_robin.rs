use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{EndpointStrategy, FallbackPlan};
use crate::errors::NoEndpointsAvailable;

/// Cycles through the snapshot, wrapping around after the last endpoint.
#[derive(Debug)]
pub struct RoundRobinStrategy {
    endpoints: Vec<IpAddr>,
    index: AtomicUsize,
}

impl RoundRobinStrategy {
    /// Name the strategy is registered under.
    pub const NAME: &'static str = "RoundRobinStrategy";

    /// Creates a strategy over `endpoints`, starting at the first one.
    pub fn new(endpoints: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
            index: AtomicUsize::new(0),
        }
    }
}

impl EndpointStrategy for RoundRobinStrategy {
    fn pick(&self) -> Result<IpAddr, NoEndpointsAvailable> {
        if self.endpoints.is_empty() {
            return Err(NoEndpointsAvailable {
                strategy: Self::NAME,
            });
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Ok(self.endpoints[idx])
    }

    /// Starts at the endpoint the next `pick` would return, then wraps.
    /// Does not advance the rotation.
    fn fallback(&self) -> FallbackPlan<'_> {
        let len = self.endpoints.len();
        let start = match len {
            0 => 0,
            _ => self.index.load(Ordering::Relaxed) % len,
        };
        Box::new(
            self.endpoints[start..]
                .iter()
                .chain(self.endpoints[..start].iter())
                .copied(),
        )
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn len(&self) -> usize {
        self.endpoints.len()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use assert_matches::assert_matches;

    use super::RoundRobinStrategy;
    use crate::errors::NoEndpointsAvailable;
    use crate::policies::endpoint_selection::EndpointStrategy;

    fn endpoints(n: u8) -> Vec<IpAddr> {
        (1..=n)
            .map(|i| IpAddr::V4(Ipv4Addr::new(127, 0, 0, i)))
            .collect()
    }

    #[test]
    fn cycles_and_wraps() {
        let e = endpoints(3);
        let strategy = RoundRobinStrategy::new(e.clone());
        let picks: Vec<IpAddr> = (0..7).map(|_| strategy.pick().unwrap()).collect();
        assert_eq!(picks, vec![e[0], e[1], e[2], e[0], e[1], e[2], e[0]]);
    }

    #[test]
    fn fallback_starts_at_next_pick() {
        let e = endpoints(3);
        let strategy = RoundRobinStrategy::new(e.clone());
        strategy.pick().unwrap();
        assert_eq!(strategy.fallback().collect::<Vec<_>>(), vec![e[1], e[2], e[0]]);
        // fallback does not rotate
        assert_eq!(strategy.pick().unwrap(), e[1]);
    }

    #[test]
    fn empty_snapshot_fails() {
        let strategy = RoundRobinStrategy::new(Vec::new());
        assert_matches!(strategy.pick(), Err(NoEndpointsAvailable { .. }));
        assert_eq!(strategy.fallback().count(), 0);
    }
}
