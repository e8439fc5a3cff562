// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, Session};

const APP_ID: HeaderName = HeaderName::from_static("x-ig-app-id");
const ASBD_ID: HeaderName = HeaderName::from_static("x-asbd-id");
const WWW_CLAIM: HeaderName = HeaderName::from_static("x-ig-www-claim");
const CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrftoken");

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ApiConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Build the full header set for one request.
///
/// The identity headers are fixed by configuration. The anti-forgery header
/// is only present when the session carries a token, and every session entry
/// travels in a single `Cookie` header.
pub fn identity_headers(
    config: &ApiConfig,
    session: &Session,
    extra: &[(String, String)],
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value(&config.user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(APP_ID, header_value(&config.app_id)?);
    headers.insert(ASBD_ID, header_value(&config.asbd_id)?);
    headers.insert(WWW_CLAIM, header_value(&config.www_claim)?);

    if let Some(token) = session.csrf_token() {
        headers.insert(CSRF_TOKEN, header_value(token)?);
    }
    if !session.is_empty() {
        headers.insert(COOKIE, header_value(&session.cookie_header())?);
    }

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::validation(format!("invalid header name '{name}': {e}")))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::validation(format!("invalid header value: {e}")))
}
