// src/services/fetcher.rs

//! Page fetcher service.
//!
//! Downloads a page and extracts the text a reader would see in `<body>`.
//! Failures never escape: they are logged and reported as empty text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;
use crate::utils::{get_domain, http, parse_http_url};

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements rendered on their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "td", "th", "tr", "ul",
];

/// Capability to fetch the visible text of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the visible text at `url`. Returns an empty string on any failure.
    async fn fetch_rendered_text(&self, url: &str) -> String;
}

/// Fetches pages over HTTP and extracts their visible text.
pub struct HttpFetcher {
    client: Client,
    settle_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_fetch_client(config)?,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        })
    }

    async fn try_fetch(&self, url: &str) -> Result<String> {
        let parsed = parse_http_url(url)?;
        let response = self.client.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP status {status}")));
        }

        let html = response.text().await?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        Ok(visible_text(&html))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_rendered_text(&self, url: &str) -> String {
        log::debug!(
            "Fetching {} ({})",
            url,
            get_domain(url).unwrap_or_else(|| "unknown host".into())
        );

        match self.try_fetch(url).await {
            Ok(text) => {
                log::debug!("Fetched {} characters from {}", text.chars().count(), url);
                text
            }
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", url, e);
                String::new()
            }
        }
    }
}

/// Extract visible text from an HTML document.
///
/// Inline runs stay on one line; block-level elements and `<br>` start a new
/// one. Whitespace is collapsed and blank lines are dropped.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            // source line breaks are not rendered
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
            continue;
        }

        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if HIDDEN_ELEMENTS.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }

        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            out.push('\n');
        }
        collect_text(child, out);
        if block {
            out.push('\n');
        }
    }
}
