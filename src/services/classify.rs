// src/services/classify.rs

//! Map raw upstream responses onto the error taxonomy.

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::transport::Response;
use crate::utils::text::{preview, strip_json_guard};

/// Body fragments upstream sends when the session is no longer accepted.
const AUTH_MARKERS: &[&str] = &[
    "Please try closing and re-opening your browser window",
    "\"require_login\":true",
    "login_required",
    "checkpoint_required",
];

/// Body fragments upstream sends when it throttles the caller.
const RATE_MARKERS: &[&str] = &[
    "Please wait a few minutes before you try again",
    "\"spam\":true",
];

/// Turn a response into its cleaned body, or the matching error.
///
/// Payload markers win over the status code, since upstream reports dead
/// sessions and throttling with a 200 as often as with a 4xx.
pub fn classify(response: &Response, endpoint: &str) -> Result<String> {
    let body = strip_json_guard(&response.body);

    if let Some(marker) = AUTH_MARKERS.iter().find(|m| body.contains(*m)) {
        return Err(AppError::AuthInvalid(format!("{endpoint}: {marker}")));
    }
    if RATE_MARKERS.iter().any(|m| body.contains(m)) {
        return Err(rate_limited(response, endpoint));
    }

    match response.status {
        200..=299 => {}
        401 => return Err(AppError::AuthInvalid(format!("{endpoint}: status 401"))),
        404 => return Err(AppError::NotFound(endpoint.to_string())),
        429 => return Err(rate_limited(response, endpoint)),
        status @ 400..=499 => {
            return Err(AppError::Rejected {
                endpoint: endpoint.to_string(),
                status,
                message: failure_message(body),
            });
        }
        status => {
            return Err(AppError::Upstream {
                endpoint: endpoint.to_string(),
                status,
            });
        }
    }

    if body.is_empty() {
        return Err(AppError::malformed(endpoint, "empty body"));
    }

    if body.starts_with('{') {
        if let Ok(payload) = serde_json::from_str::<Value>(body) {
            if payload.get("status").and_then(Value::as_str) == Some("fail") {
                return Err(AppError::Rejected {
                    endpoint: endpoint.to_string(),
                    status: response.status,
                    message: failure_message(body),
                });
            }
        }
    }

    Ok(body.to_string())
}

fn rate_limited(response: &Response, endpoint: &str) -> AppError {
    AppError::RateLimited {
        endpoint: endpoint.to_string(),
        retry_after: response.retry_after,
    }
}

/// Upstream `message` when the body is a JSON failure, else a body preview.
fn failure_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| {
            payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| preview(body, 120).to_string())
}
