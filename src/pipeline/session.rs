// src/pipeline/session.rs

//! Session validity check.

use serde::Serialize;

use super::Scanner;
use crate::error::{ErrorKind, Result};
use crate::models::Session;
use crate::services::{Request, Transport};

/// Page fragments that only appear when upstream shows the login form.
const LOGIN_MARKERS: &[&str] = &["\"loginPage\"", "/accounts/login/"];

/// Whether upstream still accepts a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Expired,
}

impl<T: Transport> Scanner<T> {
    /// Load the site root with `session` and look for the login form.
    ///
    /// Never modifies the session.
    pub async fn check_session(&self, session: &Session) -> Result<SessionState> {
        session.ensure_usable()?;
        let request = Request::get(self.site("", &[])?);

        let outcome = self
            .governor()
            .execute("check_session", || self.fetch(request.clone(), session))
            .await;

        let state = match outcome {
            Ok(body) if LOGIN_MARKERS.iter().any(|m| body.contains(m)) => SessionState::Expired,
            Ok(_) => SessionState::Active,
            Err(err) if err.kind() == ErrorKind::AuthInvalid => SessionState::Expired,
            Err(err) => return Err(err),
        };

        match state {
            SessionState::Active => log::info!("Session is active"),
            SessionState::Expired => log::warn!("Session has expired"),
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{scanner, session};
    use super::*;
    use crate::services::transport::testing::ScriptedTransport;

    #[tokio::test]
    async fn feed_page_means_active() {
        let transport = ScriptedTransport::new().on(
            "instagram.com/",
            200,
            r#"<html><script>{"viewer":{"username":"cat"}}</script></html>"#,
        );
        let scanner = scanner(transport);
        assert_eq!(
            scanner.check_session(&session()).await.unwrap(),
            SessionState::Active
        );
    }

    #[tokio::test]
    async fn login_page_means_expired() {
        let transport = ScriptedTransport::new().on(
            "instagram.com/",
            200,
            r#"<html><script>{"entry_data":{"LoginAndSignupPage":[{"loginPage":true}]}}</script></html>"#,
        );
        let scanner = scanner(transport);
        assert_eq!(
            scanner.check_session(&session()).await.unwrap(),
            SessionState::Expired
        );
    }

    #[tokio::test]
    async fn rejected_cookies_mean_expired() {
        let transport = ScriptedTransport::new().on("instagram.com/", 401, "");
        let scanner = scanner(transport);
        assert_eq!(
            scanner.check_session(&session()).await.unwrap(),
            SessionState::Expired
        );
    }

    #[tokio::test]
    async fn outage_is_an_error() {
        let transport = ScriptedTransport::new().on("instagram.com/", 502, "");
        let scanner = scanner(transport);
        let err = scanner.check_session(&session()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exhausted);
    }
}
