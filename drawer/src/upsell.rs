use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::metrics_defs::UPSELL_PICKED;
use shared::counter;
use storefront::catalog::UpsellCandidate;

/// Owns the upsell pick for one controller. A drawn pick stays pinned
/// across refresh cycles until the next randomizing open replaces it.
pub struct UpsellSelector {
    pick: Option<UpsellCandidate>,
    rng: StdRng,
}

impl UpsellSelector {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic selector, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        UpsellSelector { pick: None, rng }
    }

    pub fn pick(&self) -> Option<&UpsellCandidate> {
        self.pick.as_ref()
    }

    /// Decides what the upsell slot should show. Draws a fresh pick when
    /// `randomize` is set or none is held yet; otherwise keeps the pinned
    /// one. An empty pool renders nothing and leaves the pick alone.
    pub fn select(&mut self, pool: &[UpsellCandidate], randomize: bool) -> Option<&UpsellCandidate> {
        if pool.is_empty() {
            return None;
        }
        if randomize || self.pick.is_none() {
            self.pick = Some(self.draw(pool));
            counter!(UPSELL_PICKED).increment(1);
        }
        self.pick.as_ref()
    }

    /// Uniform draw that avoids repeating the held pick back to back, as
    /// long as the pool offers an alternative.
    fn draw(&mut self, pool: &[UpsellCandidate]) -> UpsellCandidate {
        let exclude = self.pick.as_ref().map(|p| p.variant_id);
        let mut candidates: Vec<&UpsellCandidate> = match exclude {
            Some(previous) if pool.len() > 1 => {
                pool.iter().filter(|c| c.variant_id != previous).collect()
            }
            _ => pool.iter().collect(),
        };
        if candidates.is_empty() {
            // Every entry carries the excluded variant; waive the exclusion.
            candidates = pool.iter().collect();
        }
        candidates[self.rng.gen_range(0..candidates.len())].clone()
    }
}

impl Default for UpsellSelector {
    fn default() -> Self {
        Self::new()
    }
}
