use crate::browser::BrowserSession;
use crate::error::CrawlError;
use crate::models::{MatchId, MatchRecord};
use crate::pacing::{pause, PacingPolicy};
use crate::parser::{PageParser, CONSENT_SELECTOR};
use crate::site::SiteUrls;
use std::fmt;

/// Views a match extractor walks through, always in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    Statistics,
    Lineups,
    Odds,
    Done,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::Start => Stage::Statistics,
            Stage::Statistics => Stage::Lineups,
            Stage::Lineups => Stage::Odds,
            Stage::Odds | Stage::Done => Stage::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Statistics => "statistics",
            Stage::Lineups => "lineups",
            Stage::Odds => "odds",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage that could not be completed and why
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: CrawlError,
}

/// Whatever was collected for a match, plus the failure if it stopped early
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub record: MatchRecord,
    pub failure: Option<StageFailure>,
}

impl ExtractionOutcome {
    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Shared, read-only collaborators of every extractor in a run
#[derive(Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub site: &'a SiteUrls,
    pub parser: &'a PageParser,
    pub pacing: &'a dyn PacingPolicy,
}

/// Drives one match through Statistics, Lineups and Odds, filling its record as it goes.
/// Fields written by earlier stages are kept when a later stage fails.
pub struct MatchExtractor<'a> {
    id: MatchId,
    session: &'a dyn BrowserSession,
    ctx: ExtractionContext<'a>,
    stage: Stage,
    record: MatchRecord,
}

impl<'a> MatchExtractor<'a> {
    pub fn new(id: MatchId, session: &'a dyn BrowserSession, ctx: ExtractionContext<'a>) -> Self {
        Self {
            record: MatchRecord::new(id.clone()),
            id,
            session,
            ctx,
            stage: Stage::Start,
        }
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[cfg(test)]
    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    /// Runs every remaining stage; stops at the first failing one
    pub async fn run(mut self) -> ExtractionOutcome {
        while self.stage != Stage::Done {
            let attempted = self.stage.next();
            if let Err(error) = self.advance().await {
                tracing::debug!("Match {} failed at {}: {}", self.id, attempted, error);
                return ExtractionOutcome {
                    record: self.record,
                    failure: Some(StageFailure {
                        stage: attempted,
                        error,
                    }),
                };
            }
        }

        tracing::debug!("Match {} extracted with {} fields", self.id, self.record.len());
        ExtractionOutcome {
            record: self.record,
            failure: None,
        }
    }

    /// Performs the transition out of the current stage and returns the stage reached.
    /// On error the stage is left unchanged.
    pub async fn advance(&mut self) -> Result<Stage, CrawlError> {
        let target = self.stage.next();
        match target {
            Stage::Statistics => self.collect_statistics().await?,
            Stage::Lineups => self.collect_lineups().await?,
            Stage::Odds => self.collect_odds().await?,
            Stage::Start | Stage::Done => {}
        }
        self.stage = target;
        Ok(target)
    }

    async fn collect_statistics(&mut self) -> Result<(), CrawlError> {
        let url = self.ctx.site.statistics(&self.id);
        let html = self.visit(&url).await?;
        let parser = self.ctx.parser;

        let header = parser.header(&html)?;
        self.record.insert("home_team", header.home_team);
        self.record.insert("away_team", header.away_team);
        self.record.insert("date_time", header.date_time);

        let (home_goals, away_goals) = parser.score(&html)?;
        self.record.insert("home_goals", home_goals);
        self.record.insert("away_goals", away_goals);

        let rows = parser.stat_rows(&html);
        tracing::trace!("Match {}: {} statistics rows", self.id, rows.len());
        for row in rows {
            let line = parser.parse_stat_row(&row)?;
            self.record.insert(format!("{}_home", line.label), line.home);
            self.record.insert(format!("{}_away", line.label), line.away);
        }

        Ok(())
    }

    async fn collect_lineups(&mut self) -> Result<(), CrawlError> {
        let url = self.ctx.site.lineups(&self.id);
        let html = self.visit(&url).await?;

        let coaches = self.ctx.parser.coaches(&html)?;
        self.record.insert("coach_home", coaches.home);
        self.record.insert("coach_away", coaches.away);
        Ok(())
    }

    async fn collect_odds(&mut self) -> Result<(), CrawlError> {
        let url = self.ctx.site.odds(&self.id);
        let html = self.visit(&url).await?;

        let odds = self.ctx.parser.odds(&html)?;
        self.record.insert("odds_H", odds.home);
        self.record.insert("odds_X", odds.draw);
        self.record.insert("odds_A", odds.away);
        Ok(())
    }

    /// Opens `url` like a visitor would and returns the rendered page
    async fn visit(&self, url: &str) -> Result<String, CrawlError> {
        self.session.navigate(url).await?;
        pause(self.ctx.pacing.dwell()).await;

        if self.session.click(CONSENT_SELECTOR).await.is_ok() {
            tracing::debug!("Accepted cookie consent");
        }

        if let Some(decoy) = self.ctx.pacing.decoy(&self.id) {
            tracing::trace!("Detour to {}", decoy);
            match self.session.navigate(&decoy).await {
                Ok(()) => pause(self.ctx.pacing.dwell()).await,
                Err(e) => tracing::debug!("Decoy navigation failed: {}", e),
            }
            self.session.navigate(url).await?;
            pause(self.ctx.pacing.dwell()).await;
        }

        Ok(self.session.page_source().await?)
    }
}
