use crate::browser::BrowserSession;
use crate::error::{BrowserError, CrawlError};
use crate::models::MatchId;
use crate::pacing::pause;
use crate::parser::{PageParser, LOAD_MORE_SELECTOR, MATCH_ID_SELECTOR};
use std::time::Duration;

/// Waits and pauses used while expanding a listing page
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub control_timeout: Duration,
    pub ids_timeout: Duration,
    pub load_more_pause: Duration,
    pub max_load_more_clicks: usize,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            control_timeout: Duration::from_secs(10),
            ids_timeout: Duration::from_secs(30),
            load_more_pause: Duration::from_secs(3),
            max_load_more_clicks: 200,
        }
    }
}

/// Collects match ids from a results listing by clicking "show more" until it goes away
pub struct ListingIdHarvester<'a> {
    session: &'a dyn BrowserSession,
    parser: &'a PageParser,
    settings: &'a HarvestSettings,
}

impl<'a> ListingIdHarvester<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        parser: &'a PageParser,
        settings: &'a HarvestSettings,
    ) -> Self {
        Self {
            session,
            parser,
            settings,
        }
    }

    /// Returns ids in page order, duplicates included.
    /// Fails with `HarvestTimeout` when the listing never shows its "show more" control
    /// or its match rows; any other browser failure aborts the harvest as well.
    pub async fn harvest(&self, url: &str) -> Result<Vec<MatchId>, CrawlError> {
        tracing::info!("Harvesting match ids from {}", url);
        self.session.navigate(url).await?;

        self.session
            .wait_for(LOAD_MORE_SELECTOR, self.settings.control_timeout)
            .await
            .map_err(|e| self.harvest_error(e, LOAD_MORE_SELECTOR, self.settings.control_timeout))?;

        let clicks = self.expand().await?;
        tracing::debug!("Listing expanded {} time(s)", clicks);

        self.session
            .wait_for(MATCH_ID_SELECTOR, self.settings.ids_timeout)
            .await
            .map_err(|e| self.harvest_error(e, MATCH_ID_SELECTOR, self.settings.ids_timeout))?;

        let html = self.session.page_source().await?;
        let ids = self.parser.match_ids(&html);
        if ids.is_empty() {
            tracing::warn!("Listing {} carries no usable match ids", url);
        } else {
            tracing::info!("Found {} match ids", ids.len());
        }
        Ok(ids)
    }

    /// Clicks the control until a click reports it stale or missing
    async fn expand(&self) -> Result<usize, CrawlError> {
        let mut clicks = 0;
        while clicks < self.settings.max_load_more_clicks {
            match self.session.script_click(LOAD_MORE_SELECTOR).await {
                Ok(()) => {
                    clicks += 1;
                    pause(self.settings.load_more_pause).await;
                }
                Err(BrowserError::StaleElement { .. } | BrowserError::ElementNotFound { .. }) => {
                    return Ok(clicks);
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::warn!(
            "Listing still offered more results after {} clicks, stopping",
            clicks
        );
        Ok(clicks)
    }

    fn harvest_error(&self, err: BrowserError, selector: &str, timeout: Duration) -> CrawlError {
        match err {
            BrowserError::Timeout { .. } => CrawlError::HarvestTimeout {
                selector: selector.to_string(),
                waited_secs: timeout.as_secs(),
            },
            other => other.into(),
        }
    }
}
