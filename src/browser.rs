use crate::error::BrowserError;
use crate::proxy::ProxyAddress;
use async_trait::async_trait;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;

/// The operations the crawler needs from a rendered browser tab
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Loads `url` and waits for the document to be ready
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Current rendered HTML
    async fn page_source(&self) -> Result<String, BrowserError>;

    /// Native click on the first element matching `selector`
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Clicks through `element.click()` in page script; survives overlays
    async fn script_click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Waits until an element matching `selector` is present
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// Opens browser sessions bound to an optional outbound proxy
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(
        &self,
        proxy: Option<&ProxyAddress>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Sessions driven through a WebDriver server (chromedriver)
pub struct WebDriverFactory {
    webdriver_url: String,
    user_agent: String,
    headless: bool,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: &str, user_agent: &str, headless: bool) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            user_agent: user_agent.to_string(),
            headless,
        }
    }

    fn chrome_args(&self, proxy: Option<&ProxyAddress>) -> Vec<String> {
        let mut args = vec![
            "--start-maximized".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-first-run".to_string(),
            format!("--user-agent={}", self.user_agent),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        if let Some(proxy) = proxy {
            args.push(format!("--proxy-server=http://{}", proxy));
        }

        args
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn create(
        &self,
        proxy: Option<&ProxyAddress>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": self.chrome_args(proxy),
                "excludeSwitches": ["enable-automation"],
            }),
        );

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;

        match proxy {
            Some(proxy) => tracing::debug!("Opened browser session through proxy {}", proxy),
            None => tracing::debug!("Opened browser session without proxy"),
        }

        Ok(Box::new(WebDriverSession { client }))
    }
}

pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    fn classify(err: CmdError, selector: &str, timeout: Option<Duration>) -> BrowserError {
        if err.is_no_such_element() {
            return BrowserError::ElementNotFound {
                selector: selector.to_string(),
            };
        }

        match err {
            CmdError::WaitTimeout => BrowserError::Timeout {
                selector: selector.to_string(),
                waited_secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            },
            CmdError::Standard(ref wd) if matches!(wd.error, ErrorStatus::StaleElementReference) => {
                BrowserError::StaleElement {
                    selector: selector.to_string(),
                }
            }
            other => BrowserError::Script(other.to_string()),
        }
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        tracing::trace!("Navigating to {}", url);
        self.client
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.client
            .source()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|e| Self::classify(e, selector, None))?;
        element
            .click()
            .await
            .map_err(|e| Self::classify(e, selector, None))
    }

    async fn script_click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|e| Self::classify(e, selector, None))?;
        let argument =
            serde_json::to_value(&element).map_err(|e| BrowserError::Script(e.to_string()))?;
        self.client
            .execute("arguments[0].click();", vec![argument])
            .await
            .map(|_| ())
            .map_err(|e| Self::classify(e, selector, None))
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map(|_| ())
            .map_err(|e| Self::classify(e, selector, Some(timeout)))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))
    }
}
