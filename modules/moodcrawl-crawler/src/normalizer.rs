// Turns a raw discovered post into a canonical PostRecord.
//
// Required: id, code, username. Everything else is defaulted, never fatal.

use std::sync::LazyLock;

use chrono::DateTime;
use moodcrawl_common::{Emotion, PostRecord, RawPostPayload, ReplyCount};
use regex::Regex;

use crate::lang::LanguageDetector;
use crate::links::post_url;

/// First digit group in a label, allowing thousands separators (`1,234`, `1 234`).
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[,\u{a0}\u{202f}]\d{3})*").expect("valid regex"));

/// Contextual metadata attached to every record from one post page.
pub struct PostContext<'a> {
    pub keyword: &'a str,
    pub emotion: Emotion,
    pub locale: &'a str,
    pub site_base: &'a str,
    /// Span labels from the page the candidate came from.
    pub labels: &'a [String],
    pub detector: &'a dyn LanguageDetector,
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    MissingField(&'static str),
}

impl std::fmt::Display for Discard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discard::MissingField(field) => write!(f, "missing required field `{field}`"),
        }
    }
}

/// Normalize a candidate. Either a fully-populated record or a discard.
pub fn normalize(raw: RawPostPayload, ctx: &PostContext<'_>) -> Result<PostRecord, Discard> {
    let id = required(raw.id, "id")?;
    let code = required(raw.code, "code")?;
    let username = required(raw.username, "username")?;

    let text = raw.text.unwrap_or_default();
    let url = post_url(ctx.site_base, &username, &code);
    let lang_detect = ctx.detector.detect(&text);

    Ok(PostRecord {
        id,
        published_on: raw.taken_at.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        code,
        username,
        like_count: raw.like_count.unwrap_or(0),
        reply_count: parse_reply_count(raw.reply_count.as_ref()),
        image_count: raw.image_count.unwrap_or(0),
        video_urls: raw.video_urls,
        repost_count: repost_count(ctx.labels),
        url,
        keyword: ctx.keyword.to_string(),
        emotion: ctx.emotion,
        locale_context: ctx.locale.to_string(),
        lang_detect,
        text,
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, Discard> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(Discard::MissingField(field))
}

/// Numeric counts pass through; labels yield their leading token if numeric, else 0.
pub fn parse_reply_count(value: Option<&ReplyCount>) -> i64 {
    match value {
        None => 0,
        Some(ReplyCount::Count(n)) => *n,
        Some(ReplyCount::Label(label)) => label
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .unwrap_or(0),
    }
}

/// Repost counter from the first "repost" label on the page that carries digits.
pub fn repost_count(labels: &[String]) -> i64 {
    labels
        .iter()
        .filter(|label| label.to_lowercase().contains("repost"))
        .find_map(|label| {
            let run = DIGIT_RUN.find(label)?;
            let digits: String = run.as_str().chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::FixedLanguage;

    const BASE: &str = "https://www.threads.net";

    fn raw() -> RawPostPayload {
        RawPostPayload {
            text: Some("feeling sad tonight".into()),
            taken_at: Some(1_700_000_000),
            id: Some("3100_42".into()),
            code: Some("Cq1".into()),
            username: Some("someone".into()),
            like_count: Some(4),
            reply_count: Some(ReplyCount::Label("128 replies".into())),
            image_count: None,
            video_urls: vec![],
        }
    }

    fn normalize_with(raw: RawPostPayload, labels: &[String]) -> Result<PostRecord, Discard> {
        let detector = FixedLanguage("en");
        let ctx = PostContext {
            keyword: "sad",
            emotion: Emotion::Sad,
            locale: "en-US",
            site_base: BASE,
            labels,
            detector: &detector,
        };
        normalize(raw, &ctx)
    }

    #[test]
    fn reply_label_leading_number() {
        assert_eq!(parse_reply_count(Some(&ReplyCount::Label("128 replies".into()))), 128);
    }

    #[test]
    fn reply_label_not_numeric_is_zero() {
        assert_eq!(parse_reply_count(Some(&ReplyCount::Label("unknown".into()))), 0);
        assert_eq!(parse_reply_count(Some(&ReplyCount::Label(String::new()))), 0);
    }

    #[test]
    fn reply_integer_is_unchanged() {
        assert_eq!(parse_reply_count(Some(&ReplyCount::Count(7))), 7);
        assert_eq!(parse_reply_count(None), 0);
    }

    #[test]
    fn repost_label_digits_are_parsed() {
        let labels = vec!["Like".to_string(), "1,234 reposts".to_string()];
        assert_eq!(repost_count(&labels), 1234);
        assert_eq!(repost_count(&["Reposts 12".to_string()]), 12);
    }

    #[test]
    fn repost_defaults_to_zero() {
        assert_eq!(repost_count(&[]), 0);
        assert_eq!(repost_count(&["Repost".to_string(), "42 likes".to_string()]), 0);
    }

    #[test]
    fn full_record_is_populated() {
        let record = normalize_with(raw(), &["3 reposts".to_string()]).unwrap();
        assert_eq!(record.id, "3100_42");
        assert_eq!(record.url, "https://www.threads.net/@someone/post/Cq1");
        assert_eq!(record.reply_count, 128);
        assert_eq!(record.repost_count, 3);
        assert_eq!(record.image_count, 0);
        assert_eq!(record.like_count, 4);
        assert_eq!(record.keyword, "sad");
        assert_eq!(record.locale_context, "en-US");
        assert_eq!(record.lang_detect, "en");
        assert_eq!(record.published_on.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_required_fields_discard() {
        let mut no_id = raw();
        no_id.id = None;
        assert_eq!(normalize_with(no_id, &[]), Err(Discard::MissingField("id")));

        let mut blank_user = raw();
        blank_user.username = Some("  ".into());
        assert_eq!(
            normalize_with(blank_user, &[]),
            Err(Discard::MissingField("username"))
        );
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let mut no_text = raw();
        no_text.text = None;
        no_text.taken_at = None;
        let record = normalize_with(no_text, &[]).unwrap();
        assert_eq!(record.text, "");
        assert!(record.published_on.is_none());
    }
}
