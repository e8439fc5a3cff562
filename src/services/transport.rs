// src/services/transport.rs

//! Transport executor.
//!
//! Performs exactly one network call per `execute`, with the identity headers
//! and session cookies attached. It does not retry and does not interpret
//! status codes; that policy lives in the governor and the classifier.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::RETRY_AFTER;
use url::Url;

use crate::error::{Result, TransportError};
use crate::models::{ApiConfig, Session};
use crate::utils::http::{create_async_client, identity_headers};
use crate::utils::url::endpoint_label;

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Headers on top of the identity set, e.g. `Referer`
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Endpoint path used in logs and errors.
    pub fn label(&self) -> String {
        endpoint_label(&self.url)
    }
}

/// Raw upstream answer.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, in whole seconds
    pub retry_after: Option<Duration>,
    pub latency: Duration,
}

/// Executes single requests against the upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request, session: &Session) -> Result<Response>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request, session: &Session) -> Result<Response> {
        let headers = identity_headers(&self.config, session, &request.headers)?;
        let started = Instant::now();

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.map_err(TransportError::from)?;

        Ok(Response {
            status,
            body,
            retry_after,
            latency: started.elapsed(),
        })
    }
}
