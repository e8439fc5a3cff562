// src/services/normalizer.rs

//! Schema normalizer.
//!
//! Upstream payloads drift between API generations, so every canonical
//! attribute is read from an ordered list of candidate locations. The first
//! present, type-correct value wins. Supporting a new payload shape means
//! adding a location to one of the tables below.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Comment, Cursor, MediaKind, MediaPost, Page, Profile};
use crate::utils::time::epoch_or_now;

/// `media_type` value the private API uses for videos.
const VIDEO_MEDIA_TYPE: u64 = 2;

/// Canonical entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Profile,
    Post,
    Comment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Profile => "profile",
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// Canonical attributes across all entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Id,
    Username,
    FullName,
    Biography,
    Avatar,
    AvatarHd,
    Followers,
    Following,
    PostCount,
    Shortcode,
    Caption,
    IsVideo,
    MediaType,
    ImageUrl,
    ThumbnailUrl,
    CommentCount,
    LikeCount,
    TakenAt,
    Text,
    CreatedAt,
    Author,
    AuthorAvatar,
}

/// Candidate locations for one attribute, as JSON pointers.
#[derive(Debug)]
pub struct FieldRule {
    pub attr: Attr,
    pub required: bool,
    pub candidates: &'static [&'static str],
}

const fn rule(attr: Attr, candidates: &'static [&'static str]) -> FieldRule {
    FieldRule {
        attr,
        required: false,
        candidates,
    }
}

const fn required(attr: Attr, candidates: &'static [&'static str]) -> FieldRule {
    FieldRule {
        attr,
        required: true,
        candidates,
    }
}

/// All field rules of one entity kind.
#[derive(Debug)]
pub struct Schema {
    pub kind: EntityKind,
    pub rules: &'static [FieldRule],
}

pub static PROFILE_SCHEMA: Schema = Schema {
    kind: EntityKind::Profile,
    rules: &[
        required(Attr::Id, &["/id", "/pk", "/pk_id"]),
        required(Attr::Username, &["/username"]),
        rule(Attr::FullName, &["/full_name"]),
        rule(Attr::Biography, &["/biography"]),
        rule(Attr::Avatar, &["/profile_pic_url"]),
        rule(
            Attr::AvatarHd,
            &["/profile_pic_url_hd", "/hd_profile_pic_url_info/url"],
        ),
        rule(Attr::Followers, &["/edge_followed_by/count", "/follower_count"]),
        rule(Attr::Following, &["/edge_follow/count", "/following_count"]),
        rule(
            Attr::PostCount,
            &["/edge_owner_to_timeline_media/count", "/media_count"],
        ),
    ],
};

pub static POST_SCHEMA: Schema = Schema {
    kind: EntityKind::Post,
    rules: &[
        required(Attr::Id, &["/id", "/pk"]),
        required(Attr::Shortcode, &["/code", "/shortcode"]),
        rule(
            Attr::Caption,
            &[
                "/caption/text",
                "/edge_media_to_caption/edges/0/node/text",
                "/caption",
            ],
        ),
        rule(Attr::IsVideo, &["/is_video"]),
        rule(Attr::MediaType, &["/media_type"]),
        rule(
            Attr::ImageUrl,
            &[
                "/display_url",
                "/image_versions2/candidates/0/url",
                "/carousel_media/0/image_versions2/candidates/0/url",
                "/thumbnail_src",
            ],
        ),
        rule(
            Attr::ThumbnailUrl,
            &[
                "/thumbnail_src",
                "/thumbnail_resources/0/src",
                "/image_versions2/candidates/1/url",
            ],
        ),
        rule(
            Attr::CommentCount,
            &[
                "/comment_count",
                "/edge_media_to_comment/count",
                "/edge_media_preview_comment/count",
            ],
        ),
        rule(
            Attr::LikeCount,
            &[
                "/like_count",
                "/edge_liked_by/count",
                "/edge_media_preview_like/count",
            ],
        ),
        rule(Attr::TakenAt, &["/taken_at", "/taken_at_timestamp"]),
    ],
};

pub static COMMENT_SCHEMA: Schema = Schema {
    kind: EntityKind::Comment,
    rules: &[
        required(Attr::Id, &["/pk", "/id"]),
        rule(Attr::Text, &["/text"]),
        rule(Attr::CreatedAt, &["/created_at", "/created_at_utc"]),
        rule(Attr::Author, &["/user/username", "/owner/username"]),
        rule(
            Attr::AuthorAvatar,
            &["/user/profile_pic_url", "/owner/profile_pic_url"],
        ),
    ],
};

impl Schema {
    pub fn for_kind(kind: EntityKind) -> &'static Schema {
        match kind {
            EntityKind::Profile => &PROFILE_SCHEMA,
            EntityKind::Post => &POST_SCHEMA,
            EntityKind::Comment => &COMMENT_SCHEMA,
        }
    }

    /// Candidate locations of `attr`, empty when the kind has no such field.
    pub fn candidates(&self, attr: Attr) -> &'static [&'static str] {
        self.rules
            .iter()
            .find(|r| r.attr == attr)
            .map(|r| r.candidates)
            .unwrap_or(&[])
    }
}

/// Typed attribute lookups over one payload node.
pub struct Fields<'v> {
    schema: &'static Schema,
    node: &'v Value,
}

impl<'v> Fields<'v> {
    /// Bind `node` to `schema`, checking that every required field resolves.
    pub fn new(schema: &'static Schema, node: &'v Value) -> Result<Self> {
        if !node.is_object() {
            return Err(AppError::malformed(
                schema.kind.to_string(),
                "payload node is not an object",
            ));
        }
        let fields = Self { schema, node };
        for rule in schema.rules.iter().filter(|r| r.required) {
            if fields.ident(rule.attr).is_none() {
                return Err(AppError::malformed(
                    schema.kind.to_string(),
                    format!(
                        "missing required field {:?} (tried {})",
                        rule.attr,
                        rule.candidates.join(", ")
                    ),
                ));
            }
        }
        Ok(fields)
    }

    fn first<T>(&self, attr: Attr, convert: fn(&Value) -> Option<T>) -> Option<T> {
        self.schema
            .candidates(attr)
            .iter()
            .filter_map(|path| self.node.pointer(path))
            .find_map(convert)
    }

    /// Non-empty string value.
    pub fn text(&self, attr: Attr) -> Option<String> {
        self.first(attr, as_text)
    }

    /// Identifier: a non-empty string or an integer rendered as text.
    pub fn ident(&self, attr: Attr) -> Option<String> {
        self.first(attr, as_ident)
    }

    /// Non-negative count; numeric strings are accepted.
    pub fn count(&self, attr: Attr) -> Option<u64> {
        self.first(attr, as_count)
    }

    pub fn flag(&self, attr: Attr) -> Option<bool> {
        self.first(attr, Value::as_bool)
    }

    /// Epoch seconds; numeric strings are accepted.
    pub fn epoch(&self, attr: Attr) -> Option<f64> {
        self.first(attr, as_epoch)
    }
}

fn as_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn as_ident(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_epoch(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Canonical entities that can be built from a payload node.
pub trait Normalize: Sized {
    const KIND: EntityKind;

    fn from_fields(fields: &Fields<'_>) -> Self;
}

impl Normalize for Profile {
    const KIND: EntityKind = EntityKind::Profile;

    fn from_fields(f: &Fields<'_>) -> Self {
        let avatar_url = f.text(Attr::Avatar).unwrap_or_default();
        Profile {
            id: f.ident(Attr::Id).unwrap_or_default(),
            username: f.ident(Attr::Username).unwrap_or_default(),
            full_name: f.text(Attr::FullName).unwrap_or_default(),
            biography: f.text(Attr::Biography).unwrap_or_default(),
            avatar_url_hd: f.text(Attr::AvatarHd).unwrap_or_else(|| avatar_url.clone()),
            avatar_url,
            follower_count: f.count(Attr::Followers).unwrap_or(0),
            following_count: f.count(Attr::Following).unwrap_or(0),
            post_count: f.count(Attr::PostCount).unwrap_or(0),
        }
    }
}

impl Normalize for MediaPost {
    const KIND: EntityKind = EntityKind::Post;

    fn from_fields(f: &Fields<'_>) -> Self {
        let shortcode = f.ident(Attr::Shortcode).unwrap_or_default();
        let is_video = f
            .flag(Attr::IsVideo)
            .unwrap_or_else(|| f.count(Attr::MediaType) == Some(VIDEO_MEDIA_TYPE));
        let image_url = f.text(Attr::ImageUrl).unwrap_or_default();

        MediaPost {
            id: f.ident(Attr::Id).unwrap_or_default(),
            url: MediaPost::url_for(&shortcode),
            shortcode,
            caption: f.text(Attr::Caption).unwrap_or_default(),
            kind: MediaKind::from_is_video(is_video),
            thumbnail_url: f.text(Attr::ThumbnailUrl).unwrap_or_else(|| image_url.clone()),
            image_url,
            comment_count: f.count(Attr::CommentCount).unwrap_or(0),
            like_count: f.count(Attr::LikeCount).unwrap_or(0),
            taken_at: epoch_or_now(f.epoch(Attr::TakenAt)),
        }
    }
}

impl Normalize for Comment {
    const KIND: EntityKind = EntityKind::Comment;

    fn from_fields(f: &Fields<'_>) -> Self {
        Comment::new(
            f.ident(Attr::Id).unwrap_or_default(),
            &f.text(Attr::Text).unwrap_or_default(),
            epoch_or_now(f.epoch(Attr::CreatedAt)),
            f.text(Attr::Author).unwrap_or_default(),
            f.text(Attr::AuthorAvatar).unwrap_or_default(),
        )
    }
}

/// Build one canonical entity from a payload node.
pub fn normalize<T: Normalize>(node: &Value) -> Result<T> {
    let fields = Fields::new(Schema::for_kind(T::KIND), node)?;
    Ok(T::from_fields(&fields))
}

/// Normalize every node, skipping the ones that fail.
pub fn normalize_all<'v, T: Normalize>(nodes: impl IntoIterator<Item = &'v Value>) -> Vec<T> {
    nodes
        .into_iter()
        .filter_map(|node| match normalize(node) {
            Ok(entity) => Some(entity),
            Err(e) => {
                log::debug!("Skipping {} node: {e}", T::KIND);
                None
            }
        })
        .collect()
}

/// Drop posts whose id was already seen, keeping first occurrences.
pub fn dedupe_posts(posts: Vec<MediaPost>) -> Vec<MediaPost> {
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

/// Every value matched by a pointer-like path where `*` selects all array
/// elements.
pub fn select_all<'v>(value: &'v Value, path: &str) -> Vec<&'v Value> {
    let mut current = vec![value];
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = current
            .into_iter()
            .flat_map(|node| step(node, segment))
            .collect();
    }
    current
}

fn step<'v>(node: &'v Value, segment: &str) -> Vec<&'v Value> {
    match node {
        Value::Array(items) if segment == "*" => items.iter().collect(),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .into_iter()
            .collect(),
        Value::Object(map) => map.get(segment).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// First value present at any of `paths`, including an explicit `null`.
pub fn first_present<'v>(payload: &'v Value, paths: &[&str]) -> Option<&'v Value> {
    paths.iter().find_map(|path| payload.pointer(path))
}

/// Where one payload shape keeps its entity nodes and continuation cursor.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Node locations; `*` fans out over arrays
    pub nodes: &'static [&'static str],
    /// Next-page token candidates
    pub token: &'static [&'static str],
    /// More-available flag candidates
    pub more: &'static [&'static str],
}

impl Layout {
    /// All entity nodes in document order of the node locations.
    pub fn nodes<'v>(&self, payload: &'v Value) -> Vec<&'v Value> {
        self.nodes
            .iter()
            .flat_map(|path| select_all(payload, path))
            .filter(|node| node.is_object())
            .collect()
    }

    /// Continuation cursor; an absent flag means "more" whenever a token
    /// is present.
    pub fn cursor(&self, payload: &Value) -> Cursor {
        let token = self
            .token
            .iter()
            .filter_map(|path| payload.pointer(path))
            .find_map(as_ident)
            .unwrap_or_default();
        let more_available = self
            .more
            .iter()
            .filter_map(|path| payload.pointer(path))
            .find_map(Value::as_bool)
            .unwrap_or(!token.is_empty());
        Cursor {
            token,
            more_available,
            source: None,
        }
    }

    /// Normalized page of entities plus its cursor.
    pub fn page<T: Normalize>(&self, payload: &Value) -> Page<T> {
        Page::new(normalize_all(self.nodes(payload)), self.cursor(payload))
    }
}

/// Parse a body as JSON, reporting failures as malformed payloads.
pub fn parse_json(body: &str, context: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| AppError::malformed(context, e))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn post_from_private_api_shape() {
        let node = json!({
            "pk": 3141592653u64,
            "code": "C0de_1",
            "caption": {"text": "sunset"},
            "media_type": 2,
            "image_versions2": {"candidates": [
                {"url": "https://cdn/big.jpg"},
                {"url": "https://cdn/small.jpg"}
            ]},
            "comment_count": 4,
            "like_count": 99,
            "taken_at": 1700000000
        });
        let post: MediaPost = normalize(&node).unwrap();
        assert_eq!(post.id, "3141592653");
        assert_eq!(post.shortcode, "C0de_1");
        assert_eq!(post.url, "https://www.instagram.com/p/C0de_1");
        assert_eq!(post.caption, "sunset");
        assert!(post.is_video());
        assert_eq!(post.image_url, "https://cdn/big.jpg");
        assert_eq!(post.thumbnail_url, "https://cdn/small.jpg");
        assert_eq!(post.like_count, 99);
        assert_eq!(post.taken_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn post_from_graphql_shape() {
        let node = json!({
            "id": "17",
            "shortcode": "Gq",
            "is_video": false,
            "display_url": "https://cdn/full.jpg",
            "edge_media_to_caption": {"edges": [{"node": {"text": "hello"}}]},
            "edge_media_to_comment": {"count": 2},
            "edge_liked_by": {"count": "15"},
            "taken_at_timestamp": 1600000000
        });
        let post: MediaPost = normalize(&node).unwrap();
        assert_eq!(post.caption, "hello");
        assert!(!post.is_video());
        assert_eq!(post.thumbnail_url, "https://cdn/full.jpg");
        assert_eq!(post.comment_count, 2);
        assert_eq!(post.like_count, 15);
    }

    #[test]
    fn optional_fields_default() {
        let post: MediaPost = normalize(&json!({"id": "1", "code": "abc"})).unwrap();
        assert_eq!(post.caption, "");
        assert_eq!(post.comment_count, 0);
        assert_eq!(post.like_count, 0);
        assert_eq!(post.kind, MediaKind::Image);
        assert_eq!(post.image_url, "");
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let err = normalize::<MediaPost>(&json!({"id": "1", "caption": {"text": "x"}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
        assert!(err.to_string().contains("Shortcode"));

        let err = normalize::<Profile>(&json!({"username": "someone"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn wrong_typed_candidate_falls_through() {
        let node = json!({"id": "1", "code": "abc", "caption": {"text": 5}, "like_count": "n/a"});
        let post: MediaPost = normalize(&node).unwrap();
        assert_eq!(post.caption, "");
        assert_eq!(post.like_count, 0);
    }

    #[test]
    fn profile_counts_from_either_generation() {
        let graphql = json!({
            "id": "9", "username": "cat",
            "profile_pic_url": "a.jpg",
            "edge_followed_by": {"count": 10},
            "edge_follow": {"count": 3},
            "edge_owner_to_timeline_media": {"count": 7}
        });
        let api = json!({
            "pk": 9, "username": "cat",
            "profile_pic_url": "a.jpg",
            "hd_profile_pic_url_info": {"url": "a_hd.jpg"},
            "follower_count": 10, "following_count": 3, "media_count": 7
        });
        let a: Profile = normalize(&graphql).unwrap();
        let b: Profile = normalize(&api).unwrap();
        assert_eq!(a.follower_count, b.follower_count);
        assert_eq!(a.post_count, 7);
        assert_eq!(a.avatar_url_hd, "a.jpg");
        assert_eq!(b.avatar_url_hd, "a_hd.jpg");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn comment_reads_user_or_owner() {
        let node = json!({
            "pk": "55", "text": "nice",
            "created_at": 1700000000,
            "user": {"username": "dog", "profile_pic_url": "d.jpg"}
        });
        let comment: Comment = normalize(&node).unwrap();
        assert_eq!(comment.author, "dog");
        assert_eq!(comment.author_avatar_url, "d.jpg");
        assert_eq!(comment.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn wildcard_paths_fan_out() {
        let payload = json!({"sections": [
            {"medias": [{"media": {"id": 1}}, {"media": {"id": 2}}]},
            {"medias": [{"media": {"id": 3}}]},
            {"other": true}
        ]});
        let found = select_all(&payload, "/sections/*/medias/*/media");
        assert_eq!(found.len(), 3);
        assert_eq!(select_all(&payload, "/sections/1/medias/0/media/id"), vec![&json!(3)]);
    }

    #[test]
    fn layout_page_skips_bad_nodes_and_reads_cursor() {
        const FEED: Layout = Layout {
            nodes: &["/items/*"],
            token: &["/next_max_id"],
            more: &["/more_available"],
        };
        let payload = json!({
            "items": [{"pk": 1, "code": "a"}, {"pk": 2}, {"pk": 3, "code": "c"}],
            "next_max_id": "QVF",
            "more_available": true
        });
        let page: Page<MediaPost> = FEED.page(&payload);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next.token, "QVF");
        assert!(page.next.has_next());

        let last: Page<MediaPost> = FEED.page(&json!({"items": [], "more_available": false}));
        assert!(!last.next.has_next());
    }

    #[test]
    fn duplicate_posts_are_dropped() {
        let a: MediaPost = normalize(&json!({"id": "1", "code": "a"})).unwrap();
        let b: MediaPost = normalize(&json!({"id": "2", "code": "b"})).unwrap();
        let posts = dedupe_posts(vec![a.clone(), b, a]);
        assert_eq!(posts.len(), 2);
    }
}
