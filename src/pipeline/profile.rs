// src/pipeline/profile.rs

//! Profile lookup.

use serde_json::Value;

use super::{Scanner, required_input};
use crate::error::{AppError, Result};
use crate::models::{Profile, Session};
use crate::services::normalizer::{first_present, normalize, parse_json};
use crate::services::{Request, SourceChain, Transport, html};

const WEB_PROFILE_INFO: &str = "web-profile-info";
const PROFILE_PAGE: &str = "profile-page";

/// Where the profile-info payload keeps its user node.
const USER_NODES: &[&str] = &["/data/user", "/graphql/user", "/user"];

impl<T: Transport> Scanner<T> {
    /// Profile of `handle`.
    ///
    /// Tries the profile-info endpoint, then the data embedded in the public
    /// profile page.
    pub async fn get_profile(&self, handle: &str, session: &Session) -> Result<Profile> {
        let handle = required_input(handle, "handle")?;
        session.ensure_usable()?;
        log::info!("Fetching profile @{handle}");

        let name = handle.as_str();
        let info = Request::get(self.api("users/web_profile_info/", &[("username", name)])?);
        let page = Request::get(self.site(&format!("{name}/"), &[])?);

        let chain = SourceChain::new(format!("get_profile(@{handle})"))
            .then(self.source(WEB_PROFILE_INFO, info, session, move |body| {
                parse_profile_info(body, name)
            }))
            .then(self.source(PROFILE_PAGE, page, session, move |body| {
                html::profile(body)?.ok_or_else(|| {
                    AppError::malformed(PROFILE_PAGE, format!("no embedded profile for @{name}"))
                })
            }));

        let hit = chain.run(&self.governor()).await?;
        log::info!(
            "Profile @{} resolved via {} ({} followers)",
            hit.value.username,
            hit.source,
            hit.value.follower_count
        );
        Ok(hit.value)
    }
}

/// An explicit `null` user means the handle does not exist.
fn parse_profile_info(body: &str, handle: &str) -> Result<Profile> {
    let payload = parse_json(body, WEB_PROFILE_INFO)?;
    match first_present(&payload, USER_NODES) {
        Some(Value::Null) => Err(AppError::NotFound(format!("@{handle}"))),
        Some(node) => normalize(node),
        None => Err(AppError::malformed(WEB_PROFILE_INFO, "no user node")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::super::testing::{scanner, session};
    use crate::error::{ErrorKind, TransportError};
    use crate::services::transport::testing::ScriptedTransport;

    const PROFILE_PAGE_HTML: &str = r#"<html><body><script>window._sharedData = {"entry_data":{"ProfilePage":[{"graphql":{"user":{"id":"42","username":"cat"}}}]}};</script></body></html>"#;

    const PROFILE_JSON: &str = r#"{"data":{"user":{
        "id":"42","username":"cat","full_name":"Cat",
        "biography":"meow","profile_pic_url":"https://cdn/cat.jpg",
        "edge_followed_by":{"count":1200},"edge_follow":{"count":3},
        "edge_owner_to_timeline_media":{"count":88}
    }},"status":"ok"}"#;

    #[tokio::test]
    async fn profile_from_info_endpoint() {
        let transport = ScriptedTransport::new().on("web_profile_info", 200, PROFILE_JSON);
        let scanner = scanner(transport);

        let profile = scanner.get_profile("@cat", &session()).await.unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(profile.follower_count, 1200);
        assert_eq!(profile.avatar_url_hd, "https://cdn/cat.jpg");
        assert_eq!(scanner.transport.calls().len(), 1);
        assert!(scanner.transport.calls()[0].url.as_str().contains("username=cat"));
    }

    #[tokio::test]
    async fn falls_back_to_profile_page() {
        let transport = ScriptedTransport::new()
            .on("web_profile_info", 500, "")
            .on("instagram.com/cat/", 200, PROFILE_PAGE_HTML);
        let scanner = scanner(transport);

        let profile = scanner.get_profile("cat", &session()).await.unwrap();
        assert_eq!(profile.username, "cat");
        assert_eq!(scanner.transport.count("web_profile_info"), 2);
    }

    #[tokio::test]
    async fn timed_out_endpoint_is_retried_then_skipped() {
        let transport = ScriptedTransport::new()
            .fail("web_profile_info", TransportError::Timeout("30s elapsed".into()))
            .on("instagram.com/cat/", 200, PROFILE_PAGE_HTML);
        let scanner = scanner(transport);

        let profile = scanner.get_profile("cat", &session()).await.unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(scanner.transport.count("web_profile_info"), 2);
        assert_eq!(scanner.transport.count("instagram.com/cat/"), 1);
    }

    #[tokio::test]
    async fn unreachable_upstream_exhausts_every_source() {
        let transport = ScriptedTransport::new()
            .fail("web_profile_info", TransportError::Unreachable("reset".into()))
            .fail("instagram.com/cat/", TransportError::Unreachable("reset".into()));
        let scanner = scanner(transport);

        let err = scanner.get_profile("cat", &session()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exhausted);
        assert_eq!(scanner.transport.calls().len(), 4);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_pending_request() {
        let token = CancellationToken::new();
        let transport = ScriptedTransport::new()
            .stall("web_profile_info")
            .on("instagram.com/cat/", 200, PROFILE_PAGE_HTML);
        let scanner = scanner(transport).with_cancellation(token.clone());

        let session = session();
        let (result, ()) = tokio::join!(scanner.get_profile("cat", &session), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
        assert_eq!(scanner.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let transport = ScriptedTransport::new()
            .on("web_profile_info", 200, r#"{"data":{"user":null},"status":"ok"}"#);
        let scanner = scanner(transport);

        let err = scanner.get_profile("ghost", &session()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_session_is_refused_before_any_call() {
        let scanner = scanner(ScriptedTransport::new());
        let err = scanner
            .get_profile("cat", &crate::models::Session::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(scanner.transport.calls().is_empty());
    }
}
