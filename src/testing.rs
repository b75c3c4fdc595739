//! Scripted in-memory browser used by the crawler tests.

use crate::browser::{BrowserSession, SessionFactory};
use crate::error::BrowserError;
use crate::proxy::ProxyAddress;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BLANK_PAGE: &str = "<html><body></body></html>";

/// Pages served by URL. A URL may carry several views; each successful
/// `script_click` on a page advances to the next view, like a "load more" expansion.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, Vec<String>>,
    unreachable: HashSet<String>,
    click_failure: Option<BrowserError>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), vec![html.to_string()]);
        self
    }

    pub fn expanding_page(mut self, url: &str, views: Vec<String>) -> Self {
        self.pages.insert(url.to_string(), views);
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    /// Every `script_click` on a present element fails with `err`
    pub fn failing_clicks(mut self, err: BrowserError) -> Self {
        self.click_failure = Some(err);
        self
    }

    fn view(&self, url: &str, index: usize) -> String {
        self.pages
            .get(url)
            .and_then(|views| views.get(index.min(views.len().saturating_sub(1))))
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string())
    }

    fn view_count(&self, url: &str) -> usize {
        self.pages.get(url).map(|views| views.len()).unwrap_or(1)
    }
}

fn has_element(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

#[derive(Default)]
struct FakeState {
    current: String,
    clicks: usize,
}

/// Shared observation log across every session of a factory
#[derive(Default)]
pub struct FakeLog {
    pub visits: Mutex<Vec<String>>,
    pub proxies: Mutex<Vec<Option<ProxyAddress>>>,
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeLog {
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    site: Arc<FakeSite>,
    log: Arc<FakeLog>,
    state: Mutex<FakeState>,
}

impl FakeSession {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self::with_log(site, Arc::new(FakeLog::default()))
    }

    fn with_log(site: Arc<FakeSite>, log: Arc<FakeLog>) -> Self {
        Self {
            site,
            log,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn log(&self) -> Arc<FakeLog> {
        self.log.clone()
    }

    fn current_html(&self) -> String {
        let state = self.state.lock().unwrap();
        self.site.view(&state.current, state.clicks)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.log.visits.lock().unwrap().push(url.to_string());
        if self.site.unreachable.contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.current = url.to_string();
        state.clicks = 0;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        Ok(self.current_html())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        if has_element(&self.current_html(), selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn script_click(&self, selector: &str) -> Result<(), BrowserError> {
        if !has_element(&self.current_html(), selector) {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        if let Some(err) = &self.site.click_failure {
            return Err(err.clone());
        }
        let mut state = self.state.lock().unwrap();
        if state.clicks + 1 < self.site.view_count(&state.current) {
            state.clicks += 1;
            Ok(())
        } else {
            Err(BrowserError::StaleElement {
                selector: selector.to_string(),
            })
        }
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        if has_element(&self.current_html(), selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                selector: selector.to_string(),
                waited_secs: timeout.as_secs(),
            })
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeFactory {
    site: Arc<FakeSite>,
    log: Arc<FakeLog>,
    attempts: AtomicUsize,
    fail_first: usize,
    fail_from: usize,
}

impl FakeFactory {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            log: Arc::new(FakeLog::default()),
            attempts: AtomicUsize::new(0),
            fail_first: 0,
            fail_from: usize::MAX,
        }
    }

    /// The first `count` session creations fail
    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    /// Every creation attempt from the `attempt`-th on (zero based) fails
    pub fn failing_from(mut self, attempt: usize) -> Self {
        self.fail_from = attempt;
        self
    }

    pub fn log(&self) -> Arc<FakeLog> {
        self.log.clone()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(
        &self,
        proxy: Option<&ProxyAddress>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first || attempt >= self.fail_from {
            return Err(BrowserError::Session("proxy unreachable".to_string()));
        }

        self.log.created.fetch_add(1, Ordering::SeqCst);
        self.log.proxies.lock().unwrap().push(proxy.cloned());
        Ok(Box::new(FakeSession::with_log(
            self.site.clone(),
            self.log.clone(),
        )))
    }
}

/// Statistics page markup in the site's layout
pub fn statistics_page(home: &str, away: &str, score: &str, rows: &[(&str, &str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(home_value, label, away_value)| {
            format!(
                r#"<div class="_row_rz3ch_9"><div class="_homeValue">{}</div><div class="_category">{}</div><div class="_awayValue">{}</div></div>"#,
                home_value, label, away_value
            )
        })
        .collect();
    format!(
        r#"<html><body>
            <div class="duelParticipant">
                <div class="duelParticipant__startTime"><div>12.08.2023 13:30</div></div>
                <div class="duelParticipant__home"><div class="participant__participantName"><a>{}</a></div></div>
                <div class="duelParticipant__score"><div class="detailScore__wrapper"><span>{}</span></div></div>
                <div class="duelParticipant__away"><div class="participant__participantName"><a>{}</a></div></div>
            </div>
            <div class="section">{}</div>
        </body></html>"#,
        home, score, away, rows
    )
}

/// Lineups page with an optional coaches section
pub fn lineups_page(coaches: Option<(&str, &str)>) -> String {
    let coach_section = coaches
        .map(|(home, away)| {
            format!(
                r#"<div class="section"><div class="section__title">Coaches</div>
                    <div class="lf__side"><a class="lf__participantName" href="/player/a/">{}</a></div>
                    <div class="lf__side"><a class="lf__participantName" href="/player/b/">{}</a></div>
                </div>"#,
                home, away
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body>
            <div class="section"><div class="section__title">Starting Lineups</div>
                <a class="lf__participantName" href="/player/x/">Player One</a>
            </div>
            {}
        </body></html>"#,
        coach_section
    )
}

/// Odds comparison page whose first row carries the given odds cells
pub fn odds_page(odds: &[&str]) -> String {
    let cells: String = odds
        .iter()
        .map(|odd| format!(r#"<a class="oddsCell__odd"><span>{}</span></a>"#, odd))
        .collect();
    format!(
        r#"<html><body><div class="ui-table">
            <div class="ui-table__row"><div class="oddsCell__bookmaker"></div>{}</div>
            <div class="ui-table__row"><a class="oddsCell__odd"><span>9.99</span></a></div>
        </div></body></html>"#,
        cells
    )
}

/// Listing page view exposing the given match ids
pub fn listing_view(ids: &[&str], more_control: bool) -> String {
    let rows: String = ids
        .iter()
        .map(|id| format!(r#"<div id="g_1_{}" class="event__match">match</div>"#, id))
        .collect();
    let control = if more_control {
        r#"<div class="event__more"><span>Show more matches</span></div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><div class="sportName soccer">{}</div>{}</body></html>"#,
        rows, control
    )
}
