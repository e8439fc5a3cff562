// src/services/html.rs

//! HTML extractor.
//!
//! Last-resort source for every operation. Rendered pages embed their data
//! as JSON inside script tags; when that is missing, comments can still be
//! recovered by matching their serialized form directly.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Comment, MediaPost, Profile};
use crate::services::normalizer::{dedupe_posts, normalize, normalize_all, select_all};
use crate::utils::text::unescape_json_fragment;
use crate::utils::time::epoch_or_now;

/// Global data assignment in older page generations.
const SHARED_DATA_PREFIX: &str = "window._sharedData";

/// Post nodes inside embedded blobs.
const POST_NODES: &[&str] = &[
    "/entry_data/TagPage/0/graphql/hashtag/edge_hashtag_to_top_posts/edges/*/node",
    "/entry_data/TagPage/0/graphql/hashtag/edge_hashtag_to_media/edges/*/node",
    "/entry_data/TagPage/0/data/top/sections/*/layout_content/medias/*/media",
    "/entry_data/TagPage/0/data/recent/sections/*/layout_content/medias/*/media",
    "/hashtag/edge_hashtag_to_top_posts/edges/*/node",
    "/hashtag/edge_hashtag_to_media/edges/*/node",
    "/data/hashtag/edge_hashtag_to_media/edges/*/node",
    "/entry_data/ProfilePage/0/graphql/user/edge_owner_to_timeline_media/edges/*/node",
];

const PROFILE_NODES: &[&str] = &[
    "/entry_data/ProfilePage/0/graphql/user",
    "/graphql/user",
    "/data/user",
];

const MEDIA_ID_PATHS: &[&str] = &[
    "/entry_data/PostPage/0/graphql/shortcode_media/id",
    "/graphql/shortcode_media/id",
    "/items/0/id",
    "/items/0/pk",
];

const COMMENT_NODES: &[&str] = &[
    "/entry_data/PostPage/0/graphql/shortcode_media/edge_media_to_parent_comment/edges/*/node",
    "/entry_data/PostPage/0/graphql/shortcode_media/edge_media_to_comment/edges/*/node",
    "/graphql/shortcode_media/edge_media_to_parent_comment/edges/*/node",
    "/items/0/preview_comments/*",
    "/comments/*",
];

static MEDIA_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""media_id":"(\d+)""#).ok());

static COMMENT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#""text":"([^"\\]*(?:\\.[^"\\]*)*)","created_at":(\d+\.?\d*),"owner":\{"id":"(\d+)","profile_pic_url":"([^"]+)","username":"([^"]+)"\}"#,
    )
    .ok()
});

/// Every JSON blob embedded in the page.
///
/// `application/json` script tags come first (those marked `data-sj`
/// before the rest), then the global shared-data assignment.
pub fn embedded_blobs(html: &str) -> Result<Vec<Value>> {
    let document = Html::parse_document(html);
    let json_sel = parse_selector(r#"script[type="application/json"]"#)?;
    let script_sel = parse_selector("script")?;

    let mut marked = Vec::new();
    let mut unmarked = Vec::new();
    for script in document.select(&json_sel) {
        let text: String = script.text().collect();
        let Ok(blob) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };
        if script.value().attr("data-sj").is_some() {
            marked.push(blob);
        } else {
            unmarked.push(blob);
        }
    }

    let shared = document.select(&script_sel).find_map(|script| {
        let text: String = script.text().collect();
        shared_data(&text)
    });

    marked.extend(unmarked);
    marked.extend(shared);
    Ok(marked)
}

/// Parse a `window._sharedData = {...};` script body.
fn shared_data(script: &str) -> Option<Value> {
    let rest = script.trim().strip_prefix(SHARED_DATA_PREFIX)?;
    let json = rest.trim_start().strip_prefix('=')?.trim().trim_end_matches(';');
    serde_json::from_str(json).ok()
}

/// Posts embedded in a tag or profile page.
pub fn posts(html: &str) -> Result<Vec<MediaPost>> {
    let blobs = embedded_blobs(html)?;
    let nodes = blobs
        .iter()
        .flat_map(|blob| POST_NODES.iter().flat_map(move |path| select_all(blob, path)));
    let posts = dedupe_posts(normalize_all(nodes));
    log::debug!("Extracted {} posts from {} embedded blobs", posts.len(), blobs.len());
    Ok(posts)
}

/// Profile embedded in a profile page, if any.
pub fn profile(html: &str) -> Result<Option<Profile>> {
    let blobs = embedded_blobs(html)?;
    let node = blobs.iter().find_map(|blob| {
        PROFILE_NODES
            .iter()
            .filter_map(|path| blob.pointer(path))
            .find(|node| node.is_object())
    });
    node.map(normalize::<Profile>).transpose()
}

/// Media id of the post rendered by a post page.
///
/// Tries the inline marker, then embedded blobs, then the iOS deep-link meta
/// tag.
pub fn media_id(html: &str) -> Option<String> {
    if let Some(id) = MEDIA_ID_PATTERN
        .as_ref()
        .and_then(|re| re.captures(html))
        .map(|caps| caps[1].to_string())
    {
        log::debug!("Media id {id} found by inline marker");
        return Some(id);
    }

    let from_blobs = embedded_blobs(html).ok()?.iter().find_map(|blob| {
        MEDIA_ID_PATHS
            .iter()
            .filter_map(|path| blob.pointer(path))
            .find_map(|value| match value {
                Value::String(s) => s.split('_').next().map(str::to_string),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|id| !id.is_empty())
    });
    if from_blobs.is_some() {
        return from_blobs;
    }

    let document = Html::parse_document(html);
    let meta_sel = parse_selector(r#"meta[property="al:ios:url"]"#).ok()?;
    let content = document.select(&meta_sel).next()?.value().attr("content")?;
    let id = content.split("id=").nth(1)?;
    let id: String = id.chars().take_while(char::is_ascii_digit).collect();
    (!id.is_empty()).then_some(id)
}

/// Comments embedded in a post page.
///
/// Blob nodes are preferred. Without them every serialized comment tuple in
/// the raw markup is decoded on its own; a bad tuple is skipped.
pub fn comments(html: &str) -> Result<Vec<Comment>> {
    let blobs = embedded_blobs(html)?;
    let nodes = blobs
        .iter()
        .flat_map(|blob| COMMENT_NODES.iter().flat_map(move |path| select_all(blob, path)));
    let comments: Vec<Comment> = normalize_all(nodes);
    if !comments.is_empty() {
        log::debug!("Extracted {} comments from embedded blobs", comments.len());
        return Ok(comments);
    }

    let Some(pattern) = COMMENT_PATTERN.as_ref() else {
        return Err(AppError::config("comment pattern failed to compile"));
    };
    let comments: Vec<Comment> = pattern
        .captures_iter(html)
        .filter_map(|caps| {
            let created_at = match caps[2].parse::<f64>() {
                Ok(value) => value,
                Err(e) => {
                    log::debug!("Skipping comment tuple: bad timestamp: {e}");
                    return None;
                }
            };
            Some(Comment::new(
                format!("{}_{}", &caps[3], &caps[2]),
                &unescape_json_fragment(&caps[1]),
                epoch_or_now(Some(created_at)),
                unescape_json_fragment(&caps[5]),
                unescape_json_fragment(&caps[4]),
            ))
        })
        .collect();
    log::debug!("Extracted {} comments by pattern", comments.len());
    Ok(comments)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::config(format!("invalid selector '{s}': {e:?}")))
}
