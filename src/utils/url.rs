// src/utils/url.rs

//! Endpoint URL construction.

use url::Url;

use crate::error::Result;
use crate::models::ApiConfig;

/// Resolve a site-relative path (and query) against the configured base URL.
///
/// # Examples
/// ```
/// use instascan::models::ApiConfig;
/// use instascan::utils::url::site_url;
///
/// let url = site_url(&ApiConfig::default(), "explore/tags/rust/", &[]).unwrap();
/// assert_eq!(url.as_str(), "https://www.instagram.com/explore/tags/rust/");
/// ```
pub fn site_url(config: &ApiConfig, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let mut url = base(config)?.join(path.trim_start_matches('/'))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Resolve a path under the private API prefix.
///
/// # Examples
/// ```
/// use instascan::models::ApiConfig;
/// use instascan::utils::url::api_url;
///
/// let url = api_url(&ApiConfig::default(), "feed/user/42/", &[("count", "12")]).unwrap();
/// assert_eq!(url.as_str(), "https://www.instagram.com/api/v1/feed/user/42/?count=12");
/// ```
pub fn api_url(config: &ApiConfig, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let prefix = config.api_prefix.trim_matches('/');
    let path = path.trim_start_matches('/');
    let full = if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    };
    site_url(config, &full, query)
}

/// Short label for logs and errors: the path without host or query.
pub fn endpoint_label(url: &Url) -> String {
    url.path().trim_start_matches('/').to_string()
}

fn base(config: &ApiConfig) -> Result<Url> {
    let raw = config.base_url.trim();
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{raw}/"))?)
    }
}
