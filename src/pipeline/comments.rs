// src/pipeline/comments.rs

//! Comments of a post.

use futures::FutureExt;

use super::{Scanner, cursor_token, required_input, serve_page};
use crate::error::{AppError, ErrorKind, Result};
use crate::models::{Comment, Cursor, Page, PageRequest, Session};
use crate::services::normalizer::parse_json;
use crate::services::{Governor, Layout, Request, Source, SourceChain, Transport, html, paginate};
use crate::utils::shortcode;

const MEDIA_COMMENTS: &str = "media-comments";
const POST_PAGE: &str = "post-page";

const COMMENTS_LAYOUT: Layout = Layout {
    nodes: &["/comments/*"],
    token: &["/next_min_id"],
    more: &["/has_more_comments", "/has_more_headload_comments"],
};

impl<T: Transport> Scanner<T> {
    /// Comments on the post with short code `code`.
    ///
    /// The post page is loaded once; it provides the media id for the
    /// comments endpoint and serves as the fallback source. A post without
    /// retrievable comments yields a single placeholder comment instead of
    /// an error.
    pub async fn get_comments(
        &self,
        code: &str,
        session: &Session,
        request: &PageRequest,
    ) -> Result<Vec<Comment>> {
        let code = required_input(code, "shortcode")?;
        session.ensure_usable()?;
        log::info!("Fetching comments for post {code}");

        let governor = self.governor();
        let post_page = self.load_post_page(&code, session, &governor).await?;
        let media_id = post_page
            .as_deref()
            .and_then(html::media_id)
            .or_else(|| shortcode::media_id(&code));
        match &media_id {
            Some(id) => log::debug!("Post {code} has media id {id}"),
            None => log::warn!("No media id for post {code}, comments endpoint skipped"),
        }

        let operation = format!("get_comments({code})");
        let result = paginate::collect(
            &operation,
            request.start_cursor(),
            request.page_budget,
            |cursor| {
                let chain = self.comment_chain(
                    &operation,
                    media_id.as_deref(),
                    post_page.as_deref(),
                    session,
                    cursor.as_ref(),
                );
                serve_page(chain, &governor)
            },
        )
        .await;

        match result {
            Ok(comments) if !comments.is_empty() => {
                log::info!("Found {} comments for post {code}", comments.len());
                Ok(comments)
            }
            Ok(_) => Ok(vec![Comment::placeholder()]),
            Err(AppError::Exhausted { last, .. }) => {
                match last {
                    Some(cause) => log::info!("No comments for post {code} ({cause})"),
                    None => log::info!("No comments for post {code}"),
                }
                Ok(vec![Comment::placeholder()])
            }
            Err(err) => Err(err),
        }
    }

    /// Post page body, or `None` when it could not be loaded for a reason
    /// that does not doom the whole operation.
    async fn load_post_page(
        &self,
        code: &str,
        session: &Session,
        governor: &Governor,
    ) -> Result<Option<String>> {
        let request = Request::get(self.site(&format!("p/{code}/"), &[])?);
        let outcome = governor
            .execute(POST_PAGE, || self.fetch(request.clone(), session))
            .await;

        match outcome {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.stops_fallback() || err.kind() == ErrorKind::NotFound => Err(err),
            Err(err) => {
                log::warn!("Post page for {code} unavailable: {err}");
                Ok(None)
            }
        }
    }

    fn comment_chain<'a>(
        &'a self,
        operation: &str,
        media_id: Option<&'a str>,
        post_page: Option<&'a str>,
        session: &'a Session,
        cursor: Option<&Cursor>,
    ) -> Result<SourceChain<'a, Page<Comment>>> {
        let mut chain = SourceChain::new(operation);

        if let Some(id) = media_id {
            let mut query = vec![
                ("can_support_threading", "true"),
                ("permalink_enabled", "false"),
            ];
            if let Some(token) = cursor_token(cursor) {
                query.push(("min_id", token));
            }
            let request = Request::get(self.api(&format!("media/{id}/comments/"), &query)?);
            chain = chain.then(self.source(MEDIA_COMMENTS, request, session, |body| {
                let payload = parse_json(body, MEDIA_COMMENTS)?;
                Ok(COMMENTS_LAYOUT.page(&payload))
            }));
        }

        if let Some(page) = post_page {
            chain = chain.then(Source::new(
                POST_PAGE,
                move || futures::future::ready(Ok::<_, AppError>(page.to_string())).boxed(),
                |body| Ok(Page::last(html::comments(body)?)),
            ));
        }

        Ok(chain.restrict_to(cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{scanner, session};
    use super::*;
    use crate::services::transport::testing::ScriptedTransport;

    const CODE: &str = "BpFGPuNB1dh";
    const CODE_MEDIA_ID: &str = "1892946687061088097";

    fn html_with_tuples() -> String {
        concat!(
            "<html><body><script>var c = [",
            r#"{"text":"great","created_at":1700000000,"owner":{"id":"1","profile_pic_url":"https:\/\/cdn\/1.jpg","username":"ann"}},"#,
            r#"{"text":"wow çok güzel","created_at":1700000050,"owner":{"id":"2","profile_pic_url":"https:\/\/cdn\/2.jpg","username":"bo"}}"#,
            "];</script></body></html>"
        )
        .to_string()
    }

    #[tokio::test]
    async fn comments_from_endpoint_using_page_media_id() {
        let page = r#"<html><script>{"media_id":"555"}</script></html>"#;
        let api = r#"{"comments":[
            {"pk":"c1","text":"first","created_at":1700000000,"user":{"username":"ann","profile_pic_url":"a.jpg"}},
            {"pk":"c2","text":"second","created_at":1700000001,"user":{"username":"bo","profile_pic_url":"b.jpg"}}
        ],"has_more_comments":false,"status":"ok"}"#;
        let transport = ScriptedTransport::new()
            .on("/p/BpFGPuNB1dh/", 200, page)
            .on("media/555/comments/", 200, api);
        let scanner = scanner(transport);

        let comments = scanner
            .get_comments(CODE, &session(), &PageRequest::new())
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].author, "bo");

        let calls = scanner.transport.calls();
        assert!(calls[1].url.as_str().contains("can_support_threading=true"));
        assert!(calls[1].url.as_str().contains("permalink_enabled=false"));
    }

    #[tokio::test]
    async fn failing_endpoint_falls_back_to_page_tuples() {
        let transport = ScriptedTransport::new()
            .on("/p/BpFGPuNB1dh/", 200, html_with_tuples())
            .on("/comments/", 500, "");
        let scanner = scanner(transport);

        let comments = scanner
            .get_comments(CODE, &session(), &PageRequest::new())
            .await
            .unwrap();

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, "1_1700000000");
        assert_eq!(comments[1].text, "wow çok güzel");
        assert!(comments.iter().all(|c| !c.is_placeholder()));
        assert_eq!(
            scanner.transport.count(&format!("media/{CODE_MEDIA_ID}/comments/")),
            2
        );
    }

    #[tokio::test]
    async fn post_without_comments_yields_placeholder() {
        let transport = ScriptedTransport::new()
            .on("/p/BpFGPuNB1dh/", 200, "<html><body>nothing here</body></html>")
            .on("/comments/", 200, r#"{"comments":[],"has_more_comments":false,"status":"ok"}"#);
        let scanner = scanner(transport);

        let comments = scanner
            .get_comments(CODE, &session(), &PageRequest::new())
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].is_placeholder());
        assert_eq!(comments[0].author, crate::models::SYSTEM_AUTHOR);
    }

    #[tokio::test]
    async fn unreachable_page_still_uses_decoded_media_id() {
        let api = r#"{"comments":[{"pk":"c1","text":"hi","created_at":1,"user":{"username":"ann"}}],"status":"ok"}"#;
        let transport = ScriptedTransport::new()
            .on("/p/BpFGPuNB1dh/", 503, "")
            .on("/comments/", 200, api);
        let scanner = scanner(transport);

        let comments = scanner
            .get_comments(CODE, &session(), &PageRequest::new())
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(
            scanner.transport.count(&format!("media/{CODE_MEDIA_ID}/comments/")),
            1
        );
    }

    #[tokio::test]
    async fn non_ascii_code_without_media_id_yields_placeholder() {
        let transport = ScriptedTransport::new().on(
            "/p/ABCDEFGHIJ",
            200,
            "<html><body>nothing here</body></html>",
        );
        let scanner = scanner(transport);

        let comments = scanner
            .get_comments("ABCDEFGHIJé", &session(), &PageRequest::new())
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].is_placeholder());
        assert_eq!(scanner.transport.count("/comments/"), 0);
    }

    #[tokio::test]
    async fn expired_session_is_not_masked_by_placeholder() {
        let transport = ScriptedTransport::new().on(
            "/p/BpFGPuNB1dh/",
            200,
            r#"<html><script>{"require_login":true}</script></html>"#,
        );
        let scanner = scanner(transport);

        let err = scanner
            .get_comments(CODE, &session(), &PageRequest::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthInvalid);
    }
}
