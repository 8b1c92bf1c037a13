use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Sad,
    Neutral,
    Happy,
}

impl Emotion {
    pub const ALL: [Emotion; 3] = [Emotion::Sad, Emotion::Neutral, Emotion::Happy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Sad => "sad",
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language a keyword is written in. Used only to select lexicon subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Ru,
    Kk,
    En,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Ru, Language::Kk, Language::En];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Kk => "kk",
            Language::En => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ru" => Some(Language::Ru),
            "kk" => Some(Language::Kk),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// --- Crawl tasks ---

/// One emotion-tagged search keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeywordTask {
    pub emotion: Emotion,
    pub keyword: String,
    pub language: Language,
}

impl KeywordTask {
    pub fn new(emotion: Emotion, keyword: impl Into<String>, language: Language) -> Self {
        Self {
            emotion,
            keyword: keyword.into(),
            language,
        }
    }
}

/// Rendering language of a browser session and its `Accept-Language` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocaleProfile {
    pub tag: String,
    pub accept_language: String,
}

impl LocaleProfile {
    pub fn new(tag: impl Into<String>, accept_language: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            accept_language: accept_language.into(),
        }
    }
}

/// One (keyword, locale) pair driving a single crawl session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub keyword: KeywordTask,
    pub locale: LocaleProfile,
}

// --- Post data ---

/// The reply counter as it appears in page data: either already numeric or a
/// display label like `"128 replies"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyCount {
    Count(i64),
    Label(String),
}

/// Loosely-typed post fields projected out of a page's embedded data.
/// Every field is optional; the normalizer decides what is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPostPayload {
    pub text: Option<String>,
    pub taken_at: Option<i64>,
    pub id: Option<String>,
    pub code: Option<String>,
    pub username: Option<String>,
    pub like_count: Option<i64>,
    pub reply_count: Option<ReplyCount>,
    pub image_count: Option<i64>,
    pub video_urls: Vec<String>,
}

/// A canonical, fully-populated post. One row of a persisted shard.
///
/// Column order here is the shard header order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub published_on: Option<DateTime<Utc>>,
    pub code: String,
    pub username: String,
    pub like_count: i64,
    pub reply_count: i64,
    pub image_count: i64,
    #[serde(with = "json_list")]
    pub video_urls: Vec<String>,
    pub repost_count: i64,
    pub url: String,
    pub keyword: String,
    pub emotion: Emotion,
    pub locale_context: String,
    pub lang_detect: String,
}

/// Header row of every shard file, in column order.
pub const POST_RECORD_COLUMNS: [&str; 15] = [
    "id",
    "text",
    "published_on",
    "code",
    "username",
    "like_count",
    "reply_count",
    "image_count",
    "video_urls",
    "repost_count",
    "url",
    "keyword",
    "emotion",
    "locale_context",
    "lang_detect",
];

/// Sequences don't fit a flat CSV cell, so they travel as a JSON array string.
mod json_list {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = serde_json::to_string(items).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Emotion::Happy).unwrap(), "\"happy\"");
        assert_eq!(Emotion::Sad.to_string(), "sad");
    }

    #[test]
    fn language_codes_parse_case_insensitively() {
        assert_eq!(Language::from_code("EN"), Some(Language::En));
        assert_eq!(Language::from_code(" kk "), Some(Language::Kk));
        assert_eq!(Language::from_code("de"), None);
    }

    #[test]
    fn header_matches_serialized_field_order() {
        let record = PostRecord {
            id: "1".into(),
            text: "t".into(),
            published_on: None,
            code: "c".into(),
            username: "u".into(),
            like_count: 0,
            reply_count: 0,
            image_count: 0,
            video_urls: vec![],
            repost_count: 0,
            url: String::new(),
            keyword: "k".into(),
            emotion: Emotion::Neutral,
            locale_context: "en-US".into(),
            lang_detect: "en".into(),
        };
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, POST_RECORD_COLUMNS.join(","));
    }

    #[test]
    fn video_urls_survive_a_csv_cell() {
        let record = PostRecord {
            id: "42".into(),
            text: "hello, \"world\"".into(),
            published_on: DateTime::from_timestamp(1_700_000_000, 0),
            code: "Cx1".into(),
            username: "someone".into(),
            like_count: 3,
            reply_count: 1,
            image_count: 2,
            video_urls: vec!["https://v.example/a.mp4".into(), "https://v.example/b.mp4".into()],
            repost_count: 0,
            url: "https://www.threads.net/@someone/post/Cx1".into(),
            keyword: "hello".into(),
            emotion: Emotion::Happy,
            locale_context: "en-US".into(),
            lang_detect: "en".into(),
        };
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let back: PostRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(back, record);
    }
}
