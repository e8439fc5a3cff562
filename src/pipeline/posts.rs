// src/pipeline/posts.rs

//! Post listings by tag and by user.

use futures::stream::{self, StreamExt};
use serde_json::json;

use super::{Scanner, cursor_token, required_input, serve_page};
use crate::error::Result;
use crate::models::{Cursor, MediaPost, Page, PageRequest, Session};
use crate::services::normalizer::{dedupe_posts, parse_json};
use crate::services::{Layout, Request, SourceChain, Transport, html, paginate};

const TAG_INFO: &str = "tag-info";
const EXPLORE_GRID: &str = "explore-grid";
const TAG_PAGE: &str = "tag-page";
const USER_FEED: &str = "user-feed";
const TIMELINE_QUERY: &str = "timeline-query";

const TAG_INFO_LAYOUT: Layout = Layout {
    nodes: &[
        "/data/top/sections/*/layout_content/medias/*/media",
        "/data/recent/sections/*/layout_content/medias/*/media",
        "/data/top/sections/*/media",
        "/data/recent/sections/*/media",
        "/data/hashtag/edge_hashtag_to_top_posts/edges/*/node",
        "/data/hashtag/edge_hashtag_to_media/edges/*/node",
    ],
    token: &[
        "/data/recent/next_max_id",
        "/data/next_max_id",
        "/data/hashtag/edge_hashtag_to_media/page_info/end_cursor",
    ],
    more: &[
        "/data/recent/more_available",
        "/data/more_available",
        "/data/hashtag/edge_hashtag_to_media/page_info/has_next_page",
    ],
};

const EXPLORE_LAYOUT: Layout = Layout {
    nodes: &[
        "/sectional_items/*/layout_content/medias/*/media",
        "/sectional_items/*/layout_content/fill_items/*/media",
        "/sectional_items/*/layout_content/one_by_two_item/clips/items/*/media",
        "/items/*/media",
    ],
    token: &["/next_max_id"],
    more: &["/more_available"],
};

const FEED_LAYOUT: Layout = Layout {
    nodes: &["/items/*"],
    token: &["/next_max_id"],
    more: &["/more_available"],
};

const TIMELINE_LAYOUT: Layout = Layout {
    nodes: &["/data/user/edge_owner_to_timeline_media/edges/*/node"],
    token: &["/data/user/edge_owner_to_timeline_media/page_info/end_cursor"],
    more: &["/data/user/edge_owner_to_timeline_media/page_info/has_next_page"],
};

impl<T: Transport> Scanner<T> {
    /// Posts under `tag`, newest sections first.
    ///
    /// Sources: tag-info endpoint, explore grid, rendered tag page.
    pub async fn get_posts_by_tag(
        &self,
        tag: &str,
        session: &Session,
        request: &PageRequest,
    ) -> Result<Vec<MediaPost>> {
        let tag = required_input(tag, "tag")?;
        session.ensure_usable()?;
        log::info!("Fetching posts for #{tag}");

        let governor = self.governor();
        let operation = format!("get_posts_by_tag(#{tag})");
        let posts = paginate::collect(
            &operation,
            request.start_cursor(),
            request.page_budget,
            |cursor| {
                let chain = self.tag_chain(&operation, &tag, session, cursor.as_ref());
                serve_page(chain, &governor)
            },
        )
        .await?;

        log::info!("Found {} posts for #{tag}", posts.len());
        Ok(posts)
    }

    /// Posts of the user with numeric id `user_id`.
    ///
    /// Sources: user feed endpoint, timeline GraphQL query.
    pub async fn get_posts_by_user(
        &self,
        user_id: &str,
        session: &Session,
        request: &PageRequest,
    ) -> Result<Vec<MediaPost>> {
        let user_id = required_input(user_id, "user id")?;
        session.ensure_usable()?;
        log::info!("Fetching posts for user {user_id}");

        let governor = self.governor();
        let operation = format!("get_posts_by_user({user_id})");
        let count = self.page_size(request);
        let posts = paginate::collect(
            &operation,
            request.start_cursor(),
            request.page_budget,
            |cursor| {
                let chain = self.user_chain(&operation, &user_id, count, session, cursor.as_ref());
                serve_page(chain, &governor)
            },
        )
        .await?;

        log::info!("Found {} posts for user {user_id}", posts.len());
        Ok(posts)
    }

    /// Run several tag searches at once, at most `scan.max_concurrent` in
    /// flight. Results come back in input order.
    pub async fn scan_tags<S>(
        &self,
        tags: &[S],
        session: &Session,
        request: &PageRequest,
    ) -> Vec<(String, Result<Vec<MediaPost>>)>
    where
        S: AsRef<str> + Sync,
    {
        let limit = self.config.scan.max_concurrent.max(1);
        log::info!("Scanning {} tags, {limit} at a time", tags.len());

        stream::iter(tags)
            .map(|tag| async move {
                let tag = tag.as_ref();
                let result = self.get_posts_by_tag(tag, session, request).await;
                if let Err(e) = &result {
                    log::warn!("Tag #{tag} failed: {e}");
                }
                (tag.to_string(), result)
            })
            .buffered(limit)
            .collect()
            .await
    }

    fn tag_chain<'a>(
        &'a self,
        operation: &str,
        tag: &'a str,
        session: &'a Session,
        cursor: Option<&Cursor>,
    ) -> Result<SourceChain<'a, Page<MediaPost>>> {
        let token = cursor_token(cursor);
        let tag_page = self.site(&format!("explore/tags/{tag}/"), &[])?;

        let mut info_query = vec![("tag_name", tag)];
        let mut explore_query = vec![("is_prefetch", "false")];
        if let Some(token) = token {
            info_query.push(("max_id", token));
            explore_query.push(("max_id", token));
        }

        let info = Request::get(self.api("tags/logged_out_web_info/", &info_query)?)
            .header("Referer", tag_page.as_str());
        let explore = Request::get(self.api("discover/web/explore_grid/", &explore_query)?);
        let page = Request::get(tag_page);

        Ok(SourceChain::new(operation)
            .then(self.source(TAG_INFO, info, session, |body| {
                layout_page(body, &TAG_INFO_LAYOUT, TAG_INFO)
            }))
            .then(self.source(EXPLORE_GRID, explore, session, |body| {
                layout_page(body, &EXPLORE_LAYOUT, EXPLORE_GRID)
            }))
            .then(self.source(TAG_PAGE, page, session, |body| {
                Ok(Page::last(html::posts(body)?))
            }))
            .restrict_to(cursor))
    }

    fn user_chain<'a>(
        &'a self,
        operation: &str,
        user_id: &'a str,
        count: usize,
        session: &'a Session,
        cursor: Option<&Cursor>,
    ) -> Result<SourceChain<'a, Page<MediaPost>>> {
        let token = cursor_token(cursor);
        let count_text = count.to_string();

        let mut feed_query = vec![("count", count_text.as_str())];
        if let Some(token) = token {
            feed_query.push(("max_id", token));
        }
        let feed = Request::get(self.api(&format!("feed/user/{user_id}/"), &feed_query)?);

        let mut variables = json!({ "id": user_id, "first": count });
        if let Some(token) = token {
            variables["after"] = json!(token);
        }
        let variables = variables.to_string();
        let timeline = Request::get(self.site(
            "graphql/query/",
            &[
                ("query_hash", self.config.api.timeline_query_hash.as_str()),
                ("variables", variables.as_str()),
            ],
        )?);

        Ok(SourceChain::new(operation)
            .then(self.source(USER_FEED, feed, session, |body| {
                layout_page(body, &FEED_LAYOUT, USER_FEED)
            }))
            .then(self.source(TIMELINE_QUERY, timeline, session, |body| {
                layout_page(body, &TIMELINE_LAYOUT, TIMELINE_QUERY)
            }))
            .restrict_to(cursor))
    }
}

/// Parse a JSON body with `layout`, dropping duplicate posts within the page.
fn layout_page(body: &str, layout: &Layout, context: &str) -> Result<Page<MediaPost>> {
    let payload = parse_json(body, context)?;
    let Page { items, next } = layout.page(&payload);
    Ok(Page::new(dedupe_posts(items), next))
}
