//! Utility functions and helpers.

pub mod http;
pub mod markup;

use url::Url;

use crate::error::{AppError, Result};

/// Parse a URL and require an http(s) scheme.
pub fn parse_http_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::validation(format!(
            "unsupported URL scheme '{other}' in {url_str}"
        ))),
    }
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}
