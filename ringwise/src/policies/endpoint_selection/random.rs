use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

use rand::rng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand_pcg::Pcg32;

use super::{EndpointStrategy, FallbackPlan};
use crate::errors::NoEndpointsAvailable;

/// Picks uniformly at random from the snapshot on every call.
///
/// Picks are independent of each other: an endpoint may be returned twice
/// in a row, and there is no guarantee that every endpoint is returned
/// within some number of calls.
#[derive(Debug)]
pub struct RandomStrategy {
    endpoints: Vec<IpAddr>,
    // Only set when a fixed seed was requested; otherwise the thread rng is used.
    seeded: Option<Mutex<Pcg32>>,
}

impl RandomStrategy {
    /// Name the strategy is registered under.
    pub const NAME: &'static str = "RandomStrategy";

    /// Creates a strategy over `endpoints`.
    pub fn new(endpoints: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
            seeded: None,
        }
    }

    /// Creates a strategy whose picks are reproducible for a given seed.
    pub fn with_seed(endpoints: impl IntoIterator<Item = IpAddr>, seed: u64) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
            seeded: Some(Mutex::new(Pcg32::new(seed, 0))),
        }
    }

    fn with_rng<R>(&self, f: impl FnOnce(&mut dyn rand::RngCore) -> R) -> R {
        match &self.seeded {
            Some(generator) => {
                let mut generator = generator.lock().unwrap_or_else(PoisonError::into_inner);
                f(&mut *generator)
            }
            None => f(&mut rng()),
        }
    }
}

impl EndpointStrategy for RandomStrategy {
    fn pick(&self) -> Result<IpAddr, NoEndpointsAvailable> {
        self.with_rng(|rng| self.endpoints.choose(rng).copied())
            .ok_or(NoEndpointsAvailable {
                strategy: Self::NAME,
            })
    }

    fn fallback(&self) -> FallbackPlan<'_> {
        let mut shuffled = self.endpoints.clone();
        self.with_rng(|rng| shuffled.shuffle(rng));
        Box::new(shuffled.into_iter())
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
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};

    use assert_matches::assert_matches;

    use super::RandomStrategy;
    use crate::errors::NoEndpointsAvailable;
    use crate::policies::endpoint_selection::EndpointStrategy;

    fn endpoints() -> Vec<IpAddr> {
        (1..=4)
            .map(|i| IpAddr::V4(Ipv4Addr::new(127, 0, 0, i)))
            .collect()
    }

    #[test]
    fn seeded_picks_cover_every_endpoint() {
        let strategy = RandomStrategy::with_seed(endpoints(), 123);
        let seen: HashSet<IpAddr> = (0..10_000).map(|_| strategy.pick().unwrap()).collect();
        assert_eq!(seen, endpoints().into_iter().collect());
    }

    #[test]
    fn unseeded_picks_stay_in_snapshot() {
        let strategy = RandomStrategy::new(endpoints());
        for _ in 0..100 {
            assert!(endpoints().contains(&strategy.pick().unwrap()));
        }
    }

    #[test]
    fn same_seed_same_picks() {
        let a = RandomStrategy::with_seed(endpoints(), 7);
        let b = RandomStrategy::with_seed(endpoints(), 7);
        let picks = |s: &RandomStrategy| (0..50).map(|_| s.pick().unwrap()).collect::<Vec<_>>();
        assert_eq!(picks(&a), picks(&b));
    }

    #[test]
    fn fallback_is_a_permutation() {
        let strategy = RandomStrategy::with_seed(endpoints(), 1);
        let mut plan: Vec<IpAddr> = strategy.fallback().collect();
        plan.sort();
        assert_eq!(plan, endpoints());
    }

    #[test]
    fn empty_snapshot_fails() {
        let strategy = RandomStrategy::new(Vec::new());
        assert_matches!(
            strategy.pick(),
            Err(NoEndpointsAvailable {
                strategy: RandomStrategy::NAME
            })
        );
        assert_eq!(strategy.fallback().count(), 0);
    }
}
