use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use scraper::{Html, Selector};
use std::fmt;

pub const DEFAULT_PROXY_SOURCE: &str = "https://www.sslproxies.org/";

/// An outbound proxy in `ip:port` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyAddress(String);

impl ProxyAddress {
    pub fn new(ip: &str, port: &str) -> Self {
        ProxyAddress(format!("{}:{}", ip.trim(), port.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate proxies, fetched once and read-only afterwards.
/// Dead proxies are never removed; whatever uses one simply fails.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    addresses: Vec<ProxyAddress>,
}

impl ProxyPool {
    pub fn new(addresses: Vec<ProxyAddress>) -> Self {
        Self { addresses }
    }

    /// An empty pool; sessions will connect directly
    pub fn direct() -> Self {
        Self::default()
    }

    /// Downloads the proxy list page and parses its table
    pub async fn fetch(client: &reqwest::Client, source_url: &str) -> Result<Self> {
        tracing::debug!("Fetching proxy list from {}", source_url);

        let html = client
            .get(source_url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch proxy list from {}", source_url))?
            .error_for_status()?
            .text()
            .await?;

        let pool = Self::parse(&html);
        tracing::info!("Loaded {} proxies from {}", pool.len(), source_url);
        Ok(pool)
    }

    /// Reads `ip` and `port` from the first two cells of each table row.
    /// A row without a first cell ends the list.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let (Ok(row_sel), Ok(ip_sel), Ok(port_sel)) = (
            Selector::parse("table.table tbody tr"),
            Selector::parse("td"),
            Selector::parse("td:nth-of-type(2)"),
        ) else {
            return Self::default();
        };

        let mut addresses = Vec::new();
        for row in document.select(&row_sel) {
            let Some(ip_cell) = row.select(&ip_sel).next() else {
                break;
            };
            let ip: String = ip_cell.text().collect();
            let port: String = row
                .select(&port_sel)
                .next()
                .map(|cell| cell.text().collect())
                .unwrap_or_default();
            addresses.push(ProxyAddress::new(&ip, &port));
        }

        Self::new(addresses)
    }

    /// Uniform random choice; `None` when the pool is empty
    pub fn pick(&self) -> Option<&ProxyAddress> {
        self.pick_with(&mut rand::rng())
    }

    pub fn pick_with<R: Rng>(&self, rng: &mut R) -> Option<&ProxyAddress> {
        self.addresses.choose(rng)
    }

    pub fn addresses(&self) -> &[ProxyAddress] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
