use crate::models::MatchId;
use crate::site::SiteUrls;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::time::Duration;

/// Decides how long to dwell on a page and whether to wander off to a decoy page.
/// Only shapes the observable navigation pattern; extraction results do not depend on it.
pub trait PacingPolicy: Send + Sync {
    /// Time to stay on a page after it loads
    fn dwell(&self) -> Duration;

    /// An unrelated page to visit before returning, if any
    fn decoy(&self, id: &MatchId) -> Option<String>;
}

/// Randomized dwell from a small set of second counts plus occasional decoy visits
pub struct HumanPacing {
    dwell_seconds: Vec<u64>,
    decoy_probability: f64,
    site: SiteUrls,
}

impl HumanPacing {
    pub fn new(dwell_seconds: Vec<u64>, decoy_probability: f64, site: SiteUrls) -> Self {
        Self {
            dwell_seconds,
            decoy_probability: decoy_probability.clamp(0.0, 1.0),
            site,
        }
    }

    fn dwell_with<R: Rng>(&self, rng: &mut R) -> Duration {
        self.dwell_seconds
            .choose(rng)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_default()
    }

    fn decoy_with<R: Rng>(&self, id: &MatchId, rng: &mut R) -> Option<String> {
        if !rng.random_bool(self.decoy_probability) {
            return None;
        }
        self.site.decoys(id).choose(rng).cloned()
    }
}

impl PacingPolicy for HumanPacing {
    fn dwell(&self) -> Duration {
        self.dwell_with(&mut rand::rng())
    }

    fn decoy(&self, id: &MatchId) -> Option<String> {
        self.decoy_with(id, &mut rand::rng())
    }
}

/// Zero delay, no decoys
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

impl PacingPolicy for NoPacing {
    fn dwell(&self) -> Duration {
        Duration::ZERO
    }

    fn decoy(&self, _id: &MatchId) -> Option<String> {
        None
    }
}

pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
