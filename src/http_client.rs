use anyhow::Result;
use reqwest::{header, Client};

/// Headers a desktop browser sends with a top-level page load
fn browser_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();

    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8")
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en-US,en;q=0.9")
    );
    headers.insert(
        header::DNT,
        header::HeaderValue::from_static("1")
    );
    headers.insert(
        "Upgrade-Insecure-Requests",
        header::HeaderValue::from_static("1")
    );
    headers.insert(
        "Sec-Fetch-Dest",
        header::HeaderValue::from_static("document")
    );
    headers.insert(
        "Sec-Fetch-Mode",
        header::HeaderValue::from_static("navigate")
    );
    headers.insert(
        "Sec-Fetch-Site",
        header::HeaderValue::from_static("none")
    );

    headers
}

/// Plain HTTP client for pages that need no rendering, such as the proxy list
pub fn create_http_client(user_agent: &str) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .default_headers(browser_headers())
        .cookie_store(true)
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    Ok(client)
}
