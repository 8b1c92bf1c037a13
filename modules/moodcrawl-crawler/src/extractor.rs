//! Pulls candidate posts out of a rendered post page.
//!
//! The site ships its data as JSON inside `<script type="application/json" data-sjs>`
//! blocks. Only blocks carrying the server payload marker and thread data are
//! parsed; each parsed document is searched for every `thread_items`
//! collection, and every entry is projected into a [`RawPostPayload`].

use std::collections::HashSet;
use std::sync::LazyLock;

use moodcrawl_common::{RawPostPayload, ReplyCount};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

/// Substring every relevant data block contains.
const SERVER_PAYLOAD_MARKER: &str = "\"ScheduledServerJS\"";
/// Key of the nested collections holding post groups.
pub const THREAD_ITEMS_KEY: &str = "thread_items";
/// Upper bound on nodes visited per parsed block.
pub const MAX_TREE_NODES: usize = 250_000;

static DATA_SCRIPT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/json"][data-sjs]"#).expect("valid selector")
});
static SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("valid selector"));

/// Everything one page load yields.
#[derive(Debug, Default)]
pub struct ExtractedPage {
    /// Candidates in discovery order, unique by id within this page.
    pub posts: Vec<RawPostPayload>,
    /// Visible span labels, scanned later for counters not present in the data.
    pub labels: Vec<String>,
    /// Candidate blocks that failed to parse.
    pub malformed_blocks: usize,
}

/// Extract candidate posts from page markup. An empty result is valid.
pub fn extract_page(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    let mut page = ExtractedPage::default();
    let mut seen_ids = HashSet::new();

    for script in document.select(&DATA_SCRIPT) {
        let raw: String = script.text().collect();
        if !raw.contains(SERVER_PAYLOAD_MARKER) || !raw.contains(THREAD_ITEMS_KEY) {
            continue;
        }

        let data: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, bytes = raw.len(), "Skipping malformed data block");
                page.malformed_blocks += 1;
                continue;
            }
        };

        for group in collect_by_key(&data, THREAD_ITEMS_KEY, MAX_TREE_NODES) {
            let Some(items) = group.as_array() else {
                continue;
            };
            for item in items {
                let candidate = project_post(item);
                if let Some(ref id) = candidate.id {
                    if !seen_ids.insert(id.clone()) {
                        continue;
                    }
                }
                page.posts.push(candidate);
            }
        }
    }

    page.labels = document
        .select(&SPAN)
        .map(|span| span.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    page
}

/// Depth-first search for every value stored under `key`, at any depth.
///
/// Matches are not leaves: the search continues inside a matched value, so
/// nested collections under the same key are found too. Stops after
/// `max_nodes` visits and returns what it found so far.
pub fn collect_by_key<'a>(root: &'a Value, key: &str, max_nodes: usize) -> Vec<&'a Value> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    let mut visited = 0usize;

    while let Some(node) = stack.pop() {
        visited += 1;
        if visited > max_nodes {
            warn!(max_nodes, key, "Tree walk cap reached, truncating search");
            break;
        }
        match node {
            Value::Object(map) => {
                for (k, v) in map.iter() {
                    if k == key {
                        found.push(v);
                    }
                }
                stack.extend(map.values().rev().filter(|v| is_container(v)));
            }
            Value::Array(items) => {
                stack.extend(items.iter().rev().filter(|v| is_container(v)));
            }
            _ => {}
        }
    }

    found
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Project one thread item into a raw payload.
///
/// | field        | source path                      | when absent   |
/// |--------------|----------------------------------|---------------|
/// | text         | `post.caption.text`              | `None`        |
/// | taken_at     | `post.taken_at` (unix seconds)   | `None`        |
/// | id           | `post.id` (string or number)     | `None`        |
/// | code         | `post.code`                      | `None`        |
/// | username     | `post.user.username`             | `None`        |
/// | like_count   | `post.like_count`                | `None`        |
/// | reply_count  | `view_replies_cta_string`        | `None`        |
/// | image_count  | `post.carousel_media_count`      | `None`        |
/// | video_urls   | `post.video_versions[].url`      | empty         |
pub fn project_post(item: &Value) -> RawPostPayload {
    let reply_count = item
        .get("view_replies_cta_string")
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64().map(ReplyCount::Count),
            Value::String(s) => Some(ReplyCount::Label(s.clone())),
            _ => None,
        });

    let video_urls = item
        .pointer("/post/video_versions")
        .and_then(Value::as_array)
        .map(|versions| {
            versions
                .iter()
                .filter_map(|v| v.get("url").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    RawPostPayload {
        text: string_at(item, "/post/caption/text"),
        taken_at: item.pointer("/post/taken_at").and_then(Value::as_i64),
        id: item.pointer("/post/id").and_then(scalar_to_string),
        code: string_at(item, "/post/code"),
        username: string_at(item, "/post/user/username"),
        like_count: item.pointer("/post/like_count").and_then(Value::as_i64),
        reply_count,
        image_count: item
            .pointer("/post/carousel_media_count")
            .and_then(Value::as_i64),
        video_urls,
    }
}

fn string_at(item: &Value, pointer: &str) -> Option<String> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(String::from)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
