use thiserror::Error;

/// Failures reported by a browser session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("no element matches '{selector}'")]
    ElementNotFound { selector: String },
    #[error("element '{selector}' went stale")]
    StaleElement { selector: String },
    #[error("timed out after {waited_secs}s waiting for '{selector}'")]
    Timeout { selector: String, waited_secs: u64 },
    #[error("script execution failed: {0}")]
    Script(String),
    #[error("browser session error: {0}")]
    Session(String),
}

/// Errors raised while crawling a league or extracting a match
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrawlError {
    /// The listing page never exposed the expected elements. Aborts the run.
    #[error("listing page did not expose '{selector}' within {waited_secs}s")]
    HarvestTimeout { selector: String, waited_secs: u64 },
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("expected element missing: {what}")]
    ElementNotFound { what: String },
    #[error("{what}: expected {expected} token(s), found {found}")]
    ParseArity {
        what: String,
        expected: usize,
        found: usize,
    },
    #[error("{what}: malformed value '{text}'")]
    MalformedValue { what: String, text: String },
    #[error("could not open browser session: {0}")]
    Session(String),
}

impl CrawlError {
    /// Short tag used in logs and persisted failure rows
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::HarvestTimeout { .. } => "harvest_timeout",
            CrawlError::Navigation { .. } => "navigation",
            CrawlError::ElementNotFound { .. } => "element_not_found",
            CrawlError::ParseArity { .. } => "parse_arity",
            CrawlError::MalformedValue { .. } => "malformed_value",
            CrawlError::Session(_) => "session",
        }
    }
}

impl From<BrowserError> for CrawlError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Navigation { url, reason } => CrawlError::Navigation { url, reason },
            BrowserError::ElementNotFound { selector }
            | BrowserError::StaleElement { selector }
            | BrowserError::Timeout { selector, .. } => CrawlError::ElementNotFound { what: selector },
            BrowserError::Script(reason) => CrawlError::Navigation {
                url: String::new(),
                reason,
            },
            BrowserError::Session(reason) => CrawlError::Session(reason),
        }
    }
}
