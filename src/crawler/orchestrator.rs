use crate::browser::{BrowserSession, SessionFactory};
use crate::crawler::extractor::{ExtractionContext, MatchExtractor, Stage};
use crate::crawler::harvester::{HarvestSettings, ListingIdHarvester};
use crate::error::CrawlError;
use crate::models::{League, MatchId, MatchRecord};
use crate::pacing::{pause, PacingPolicy};
use crate::parser::PageParser;
use crate::proxy::ProxyPool;
use crate::site::SiteUrls;
use crate::table::{aggregate, ResultTable};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

/// Run-level knobs of a crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub sample_size: usize,
    pub rotation_probability: f64,
    pub rotation_pause: Duration,
    pub harvest: HarvestSettings,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            sample_size: 20,
            rotation_probability: 0.25,
            rotation_pause: Duration::from_secs(2),
            harvest: HarvestSettings::default(),
        }
    }
}

/// A match that stopped early, with where and why
#[derive(Debug, Clone, PartialEq)]
pub struct FailedMatch {
    pub id: MatchId,
    pub stage: Stage,
    pub error: CrawlError,
}

/// Everything a finished crawl produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub table: ResultTable,
    pub failures: Vec<FailedMatch>,
    pub harvested: usize,
    pub sampled: usize,
}

impl CrawlReport {
    fn empty(harvested: usize) -> Self {
        Self {
            table: ResultTable::default(),
            failures: Vec::new(),
            harvested,
            sampled: 0,
        }
    }

    pub fn failed_ids(&self) -> Vec<&MatchId> {
        self.failures.iter().map(|f| &f.id).collect()
    }
}

/// Harvests a league listing, samples matches and extracts them one by one,
/// rotating the browser session between matches now and then.
pub struct CrawlOrchestrator<'a> {
    factory: &'a dyn SessionFactory,
    proxies: &'a ProxyPool,
    pacing: &'a dyn PacingPolicy,
    site: SiteUrls,
    parser: PageParser,
    settings: CrawlSettings,
}

impl<'a> CrawlOrchestrator<'a> {
    pub fn new(
        factory: &'a dyn SessionFactory,
        proxies: &'a ProxyPool,
        pacing: &'a dyn PacingPolicy,
        site: SiteUrls,
        settings: CrawlSettings,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            factory,
            proxies,
            pacing,
            site,
            parser: PageParser::new()?,
            settings,
        })
    }

    /// Crawls one league season. Only a harvesting failure aborts the run;
    /// match failures are recorded in the report.
    pub async fn run(&self, league: &League) -> Result<CrawlReport, CrawlError> {
        let listing_url = self.site.listing(league);
        let harvested = self.harvest(&listing_url).await?;
        let harvested_count = harvested.len();

        let selected = self.select(harvested);
        if selected.is_empty() {
            tracing::info!("No matches to extract for {}", league);
            return Ok(CrawlReport::empty(harvested_count));
        }
        tracing::info!(
            "Extracting {} of {} harvested matches for {}",
            selected.len(),
            harvested_count,
            league
        );

        let ctx = ExtractionContext {
            site: &self.site,
            parser: &self.parser,
            pacing: self.pacing,
        };

        let mut session = self.open_session().await?;
        let mut records: Vec<MatchRecord> = Vec::with_capacity(selected.len());
        let mut failures = Vec::new();

        for (index, id) in selected.iter().enumerate() {
            tracing::info!("[{}/{}] Match {}", index + 1, selected.len(), id);

            let outcome = MatchExtractor::new(id.clone(), session.as_ref(), ctx).run().await;
            if let Some(failure) = outcome.failure {
                tracing::warn!(
                    "Match {} failed at {} ({}): {}",
                    id,
                    failure.stage,
                    failure.error.kind(),
                    failure.error
                );
                failures.push(FailedMatch {
                    id: id.clone(),
                    stage: failure.stage,
                    error: failure.error,
                });
            }
            if outcome.record.is_empty() {
                tracing::debug!("Match {} yielded no fields", id);
            } else if let (Some(home), Some(away)) =
                (outcome.record.get("home_team"), outcome.record.get("away_team"))
            {
                tracing::debug!("Match {}: {} vs {}", id, home, away);
            }
            records.push(outcome.record);

            let is_last = index + 1 == selected.len();
            if !is_last && self.should_rotate() {
                session = self.rotate(session).await;
            }
        }

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }

        tracing::info!(
            "Crawl finished: {} matches, {} failed",
            records.len(),
            failures.len()
        );

        Ok(CrawlReport {
            table: aggregate(&records),
            failures,
            harvested: harvested_count,
            sampled: selected.len(),
        })
    }

    async fn harvest(&self, listing_url: &str) -> Result<Vec<MatchId>, CrawlError> {
        let session = self.open_session().await?;
        let result = ListingIdHarvester::new(session.as_ref(), &self.parser, &self.settings.harvest)
            .harvest(listing_url)
            .await;
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close listing session: {}", e);
        }
        result
    }

    /// Dedups (first occurrence wins), shuffles and caps at the sample size
    fn select(&self, ids: Vec<MatchId>) -> Vec<MatchId> {
        select_sample(ids, self.settings.sample_size, &mut rand::rng())
    }

    fn should_rotate(&self) -> bool {
        rand::rng().random_bool(self.settings.rotation_probability.clamp(0.0, 1.0))
    }

    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
        let proxy = self.proxies.pick();
        if proxy.is_none() {
            tracing::warn!("No proxy available, connecting directly");
        }
        Ok(self.factory.create(proxy).await?)
    }

    /// Swaps in a fresh session on a new proxy. Keeps the current one if that fails.
    async fn rotate(&self, current: Box<dyn BrowserSession>) -> Box<dyn BrowserSession> {
        match self.open_session().await {
            Ok(fresh) => {
                tracing::debug!("Rotated browser session");
                if let Err(e) = current.close().await {
                    tracing::warn!("Failed to close rotated session: {}", e);
                }
                pause(self.settings.rotation_pause).await;
                fresh
            }
            Err(e) => {
                tracing::warn!("Session rotation failed, keeping current session: {}", e);
                current
            }
        }
    }
}

pub fn select_sample<R: Rng>(ids: Vec<MatchId>, sample_size: usize, rng: &mut R) -> Vec<MatchId> {
    let mut seen = HashSet::new();
    let mut unique: Vec<MatchId> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
    unique.shuffle(rng);
    unique.truncate(sample_size);
    unique
}
