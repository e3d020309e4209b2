use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: i64,
}

impl RedditPost {
    /// Title followed by the self text, the text keywords are matched against.
    pub fn searchable_text(&self) -> String {
        match self.content.as_deref().map(str::trim) {
            Some(body) if !body.is_empty() => format!("{}\n\n{}", self.title, body),
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedditComment {
    pub id: String,
    pub body: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Post,
    Comment,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Post => "post",
            MatchKind::Comment => "comment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchKind::Post => "Post",
            MatchKind::Comment => "Comment",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One keyword hit in a post or comment. The URL is the identity key.
///
/// Field names follow the on-disk column layout `date,type,subreddit,content,url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "date", with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub subreddit: String,
    pub content: String,
    pub url: String,
}

impl MatchRecord {
    pub fn from_post(post: &RedditPost) -> Self {
        Self {
            timestamp: local_timestamp(post.created_utc),
            kind: MatchKind::Post,
            subreddit: post.subreddit.clone(),
            content: post.searchable_text(),
            url: canonical_url(&post.permalink),
        }
    }

    pub fn from_comment(comment: &RedditComment) -> Self {
        Self {
            timestamp: local_timestamp(comment.created_utc),
            kind: MatchKind::Comment,
            subreddit: comment.subreddit.clone(),
            content: comment.body.clone(),
            url: canonical_url(&comment.permalink),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Full web URL for a Reddit permalink. Absolute URLs pass through unchanged.
pub fn canonical_url(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else if permalink.starts_with('/') {
        format!("{}{}", REDDIT_WEB_BASE, permalink)
    } else {
        format!("{}/{}", REDDIT_WEB_BASE, permalink)
    }
}

/// Converts a unix timestamp to local wall-clock time.
pub fn local_timestamp(unix_seconds: i64) -> NaiveDateTime {
    DateTime::from_timestamp(unix_seconds, 0)
        .unwrap_or_default()
        .with_timezone(&Local)
        .naive_local()
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

#[derive(Debug, Clone)]
pub struct Keyword {
    pub text: String,
    needle: String,
}

impl Keyword {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let needle = text.to_lowercase();
        Self { text, needle }
    }

    pub fn is_contained_in(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.needle)
    }
}

/// Case-insensitive substring matcher over the configured keyword list.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    keywords: Vec<Keyword>,
}

impl KeywordMatcher {
    /// Blank entries are dropped and case-insensitive duplicates keep their first spelling.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<Keyword> = Vec::new();
        for raw in keywords {
            let text = raw.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            let keyword = Keyword::new(text);
            if !unique.iter().any(|k| k.needle == keyword.needle) {
                unique.push(keyword);
            }
        }
        Self { keywords: unique }
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.keywords.iter().any(|k| haystack.contains(&k.needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(content: Option<&str>) -> RedditPost {
        RedditPost {
            id: "abc123".to_string(),
            title: "Looking for a tool".to_string(),
            content: content.map(str::to_string),
            subreddit: "rust".to_string(),
            url: "https://example.com/tool".to_string(),
            permalink: "/r/rust/comments/abc123/looking_for_a_tool/".to_string(),
            created_utc: 1_700_000_000,
        }
    }

    #[test]
    fn test_keyword_matching_is_case_insensitive() {
        let matcher = KeywordMatcher::new(["Airbnb", "help me"]);
        assert!(matcher.matches("Booked an AIRBNB for the weekend"));
        assert!(matcher.matches("please HELP ME with this"));
        assert!(!matcher.matches("nothing to see here"));
    }

    #[test]
    fn test_matcher_drops_blank_and_duplicate_keywords() {
        let matcher = KeywordMatcher::new(["airbnb", "  ", "AirBnB", "help me "]);
        assert_eq!(matcher.len(), 2);
        assert_eq!(matcher.keywords()[0].text, "airbnb");
        assert_eq!(matcher.keywords()[1].text, "help me");
    }

    #[test]
    fn test_post_searchable_text_concatenates_title_and_body() {
        let post = sample_post(Some("I need help for my landlord issue"));
        let text = post.searchable_text();
        assert!(text.starts_with("Looking for a tool"));
        assert!(text.ends_with("I need help for my landlord issue"));

        let matcher = KeywordMatcher::new(["i need help for"]);
        assert!(matcher.matches(&text));
        assert!(!matcher.matches(&post.title));
    }

    #[test]
    fn test_keyword_does_not_span_title_and_body() {
        let post = sample_post(Some("me with this"));
        let matcher = KeywordMatcher::new(["tool me"]);
        assert!(!matcher.matches(&post.searchable_text()));
    }

    #[test]
    fn test_post_without_body_uses_title_only() {
        assert_eq!(sample_post(None).searchable_text(), "Looking for a tool");
        assert_eq!(sample_post(Some("   ")).searchable_text(), "Looking for a tool");
    }

    #[test]
    fn test_record_from_post_uses_canonical_permalink() {
        let post = sample_post(None);
        let record = MatchRecord::from_post(&post);
        assert_eq!(record.kind, MatchKind::Post);
        assert_eq!(
            record.url,
            "https://www.reddit.com/r/rust/comments/abc123/looking_for_a_tool/"
        );
        assert_eq!(record.timestamp, local_timestamp(post.created_utc));
    }

    #[test]
    fn test_canonical_url_variants() {
        assert_eq!(
            canonical_url("/r/a/comments/1/x/"),
            "https://www.reddit.com/r/a/comments/1/x/"
        );
        assert_eq!(
            canonical_url("r/a/comments/1/x/"),
            "https://www.reddit.com/r/a/comments/1/x/"
        );
        assert_eq!(
            canonical_url("https://www.reddit.com/r/a/"),
            "https://www.reddit.com/r/a/"
        );
    }

    #[test]
    fn test_parse_timestamp_accepts_stored_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap();
        assert_eq!(parse_timestamp("2024-05-01 12:34:56"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:34:56"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01T12:34:56.000").map(|t| t.date()),
            Some(expected.date())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_record_json_uses_column_names() {
        let record = MatchRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            kind: MatchKind::Comment,
            subreddit: "smallbusiness".to_string(),
            content: "how can I do this".to_string(),
            url: "https://www.reddit.com/r/smallbusiness/comments/1/x/c1/".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-05-01 08:00:00");
        assert_eq!(json["type"], "comment");
        assert_eq!(json["subreddit"], "smallbusiness");
    }
}
