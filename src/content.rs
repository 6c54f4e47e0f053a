// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Content Entity Model
//!
//! Typed entities built from raw source text:
//!
//! - [`Item`]: a post or a page, with front matter, URL and dates
//! - [`Partial`]: a layout, include or snippet
//! - [`DataEntry`]: a JSON/YAML value exposed under `data`
//!
//! Construction never fails. Malformed front matter yields an empty
//! mapping and the full text as the body.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde_json::{Map, Value as JsonValue};

use crate::core::config::{Config, UrlFormat, PRETTY_TOKEN};
use crate::keys;

/// Date-time layouts accepted in front matter, tried in order.
const DATETIME_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Splits a source file into its front-matter mapping and body.
///
/// The first line must be exactly `---` and the block is closed by the next
/// line that is exactly `---`. Files with CRLF line endings are read with
/// their endings normalised to `\n`.
///
/// ```
/// use scribeflow::content::split_front_matter;
///
/// let (front, body) = split_front_matter("---\ntitle: Hi\n---\nBody");
/// assert_eq!(front["title"], "Hi");
/// assert_eq!(body, "Body");
/// ```
pub fn split_front_matter(source: &str) -> (Map<String, JsonValue>, String) {
    let unchanged = || (Map::new(), source.to_string());

    let normalized;
    let raw = if source.starts_with("---\r\n") {
        normalized = source.replace("\r\n", "\n");
        normalized.as_str()
    } else {
        source
    };

    if !raw.starts_with("---\n") {
        return unchanged();
    }

    // Search from the opening newline so an empty block closes immediately.
    let (yaml, body) = match raw[3..].find("\n---\n") {
        Some(pos) => {
            let end = 3 + pos;
            (&raw[4.max(end)..end + 1], &raw[end + 5..])
        }
        None if raw.ends_with("\n---") && raw.len() > 7 => {
            (&raw[4..raw.len() - 3], "")
        }
        None => return unchanged(),
    };

    if yaml.trim().is_empty() {
        return (Map::new(), body.to_string());
    }

    match serde_yml::from_str::<JsonValue>(yaml) {
        Ok(JsonValue::Object(front)) => (front, body.to_string()),
        Ok(JsonValue::Null) => (Map::new(), body.to_string()),
        Ok(_) => {
            debug!("Front matter is not a mapping; ignoring it");
            unchanged()
        }
        Err(e) => {
            debug!("Malformed front matter: {}", e);
            unchanged()
        }
    }
}

/// Parses a front-matter date value.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM:SS` and
/// plain `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(value: &JsonValue) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Formats a date with a `strftime` pattern.
///
/// An invalid pattern falls back to `YYYY-MM-DD` instead of panicking.
pub fn format_date(date: &NaiveDateTime, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(pattern)).is_err() {
        warn!("Invalid date format '{}'", pattern);
        out.clear();
        _ = write!(out, "{}", date.format("%Y-%m-%d"));
    }
    out
}

/// Splits a comma-separated front-matter field into trimmed, non-empty
/// values. YAML lists are accepted too.
pub fn split_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => Some(s.trim().to_string()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether an [`Item`] is a post or a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Dated entry under `posts/`.
    Post,
    /// Any other renderable entry.
    Page,
}

impl ItemKind {
    /// Lowercase name used in template contexts.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Post => "post",
            ItemKind::Page => "page",
        }
    }
}

/// A post or a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Post or page.
    pub kind: ItemKind,
    /// Path as supplied by the caller.
    pub raw_key: String,
    /// Canonical key, e.g. `posts/2013-11-13-hello.md`.
    pub short_key: String,
    /// Parsed front matter.
    pub front: Map<String, JsonValue>,
    /// Body without front matter.
    pub content: String,
    /// Full source text.
    pub original: String,
    /// Public URL, always starting with `/`.
    pub url: String,
    /// Output path relative to the output directory, never starting with `/`.
    pub file_path: String,
    /// Categories from front matter.
    pub categories: Vec<String>,
    /// Tags from front matter.
    pub tags: Vec<String>,
    /// Publication date (UTC).
    pub date: Option<NaiveDateTime>,
    /// Publication date as epoch milliseconds.
    pub timestamp: Option<i64>,
}

impl Item {
    /// Builds an item, choosing the kind from the short key.
    pub fn new(raw_key: &str, raw: &str, config: &Config) -> Self {
        let short_key = keys::normalize(raw_key);
        let kind = if keys::is_post(&short_key) {
            ItemKind::Post
        } else {
            ItemKind::Page
        };
        let (front, content) = split_front_matter(raw);

        let (file_path, url, key_date) = match kind {
            ItemKind::Post => post_paths(&short_key, config),
            ItemKind::Page => {
                let (file_path, url) = page_paths(&short_key, config);
                (file_path, url, None)
            }
        };

        let date = front
            .get("date")
            .and_then(parse_date)
            .or_else(|| key_date.and_then(|d| d.and_hms_opt(0, 0, 0)));

        Self {
            kind,
            raw_key: raw_key.to_string(),
            categories: split_list(front.get("categories")),
            tags: split_list(front.get("tags")),
            timestamp: date.map(|d| d.and_utc().timestamp_millis()),
            date,
            short_key,
            front,
            content,
            original: raw.to_string(),
            url,
            file_path,
        }
    }

    /// Builds a post. The kind still follows the key.
    pub fn post(raw_key: &str, raw: &str, config: &Config) -> Self {
        Self::new(raw_key, raw, config)
    }

    /// Builds a page. The kind still follows the key.
    pub fn page(raw_key: &str, raw: &str, config: &Config) -> Self {
        Self::new(raw_key, raw, config)
    }

    /// Applies a post-construction hook.
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Item),
    {
        f(&mut self);
        self
    }

    /// Front-matter string field.
    pub fn front_str(&self, key: &str) -> Option<&str> {
        self.front.get(key).and_then(JsonValue::as_str)
    }

    /// Front-matter title, if any.
    pub fn title(&self) -> Option<&str> {
        self.front_str("title")
    }

    /// `true` for posts.
    pub fn is_post(&self) -> bool {
        self.kind == ItemKind::Post
    }

    /// Template view of the item.
    ///
    /// Front-matter fields are promoted to the top level where no field of
    /// the same name exists, and `date` is formatted with `date_format`.
    pub fn to_value(&self, date_format: &str) -> JsonValue {
        let mut map = Map::new();
        _ = map.insert("type".into(), self.kind.as_str().into());
        _ = map.insert("key".into(), self.short_key.clone().into());
        _ = map.insert("short_key".into(), self.short_key.clone().into());
        _ = map.insert("url".into(), self.url.clone().into());
        _ = map.insert("file_path".into(), self.file_path.clone().into());
        _ = map.insert("content".into(), self.content.clone().into());
        _ = map.insert("categories".into(), self.categories.clone().into());
        _ = map.insert("tags".into(), self.tags.clone().into());
        _ = map.insert(
            "timestamp".into(),
            self.timestamp.map_or(JsonValue::Bool(false), JsonValue::from),
        );
        if let Some(date) = &self.date {
            _ = map.insert("date".into(), format_date(date, date_format).into());
        }
        _ = map.insert("front".into(), JsonValue::Object(self.front.clone()));

        for (key, value) in &self.front {
            if !map.contains_key(key) {
                _ = map.insert(key.clone(), value.clone());
            }
        }

        JsonValue::Object(map)
    }
}

/// File path, URL and filename date of a post.
fn post_paths(
    short_key: &str,
    config: &Config,
) -> (String, String, Option<NaiveDate>) {
    let stem = keys::strip_extension(
        short_key.strip_prefix("posts/").unwrap_or(short_key),
    );

    let (dir, name) = match stem.rfind('/') {
        Some(i) => (&stem[..=i], &stem[i + 1..]),
        None => ("", stem.as_str()),
    };
    let (date, name) = keys::split_date_prefix(name);
    let slug = format!("{}{}", dir, name);

    let (file_path, url) = match &config.post_url_format {
        Some(format) if short_key.contains('/') => {
            let pretty = format.replace(PRETTY_TOKEN, &slug);
            (format!("{}/index.html", pretty), pretty)
        }
        _ => (format!("{}.html", slug), format!("{}.html", slug)),
    };

    (
        keys::complete_path(&file_path),
        keys::complete_url(&url),
        date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
    )
}

/// File path and URL of a page.
fn page_paths(short_key: &str, config: &Config) -> (String, String) {
    let key = short_key.strip_prefix("pages/").unwrap_or(short_key);
    let key = key.strip_prefix('/').unwrap_or(key);
    let stem = keys::strip_extension(key);

    if stem == "index" {
        return ("index.html".to_string(), "/index.html".to_string());
    }

    let (file_path, url) = if let Some((parent, name)) = stem.rsplit_once('/') {
        if name == "index" {
            (format!("{}.html", stem), parent.to_string())
        } else {
            (format!("{}/index.html", stem), stem.clone())
        }
    } else {
        match config.url_format {
            UrlFormat::Pretty => (format!("{}/index.html", stem), stem.clone()),
            UrlFormat::Plain => {
                (format!("{}.html", stem), format!("{}.html", stem))
            }
        }
    };

    (keys::complete_path(&file_path), keys::complete_url(&url))
}

/// A layout, include or snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    /// Path as supplied by the caller.
    pub raw_key: String,
    /// Canonical key, e.g. `includes/blog/head.html`.
    pub short_key: String,
    /// Basename alias, e.g. `head`.
    pub partial_key: Option<String>,
    /// Template text.
    pub content: String,
}

impl Partial {
    /// Builds a partial from its path and text.
    pub fn new(raw_key: &str, content: &str) -> Self {
        let short_key = keys::normalize(raw_key);
        Self {
            raw_key: raw_key.to_string(),
            partial_key: keys::partial_key(&short_key),
            short_key,
            content: content.to_string(),
        }
    }
}

/// A structured value exposed to templates under `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEntry {
    /// Canonical key, e.g. `data/sub/file.json`.
    pub short_key: String,
    /// Parsed value.
    pub value: JsonValue,
}

impl DataEntry {
    /// Builds a data entry.
    ///
    /// Text under `.yml`/`.yaml` keys is parsed as YAML and text under
    /// `.json` keys as JSON; structured values pass through. A parse
    /// failure is logged and yields `None`.
    pub fn parse(raw_key: &str, value: JsonValue) -> Option<Self> {
        let short_key = keys::normalize(raw_key);

        let value = match value {
            JsonValue::String(text) if keys::is_yaml(&short_key) => {
                match serde_yml::from_str::<JsonValue>(&text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("Skipping data {}: {}", short_key, e);
                        return None;
                    }
                }
            }
            JsonValue::String(text) if keys::is_json(&short_key) => {
                match serde_json::from_str::<JsonValue>(&text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("Skipping data {}: {}", short_key, e);
                        return None;
                    }
                }
            }
            other => other,
        };

        Some(Self { short_key, value })
    }

    /// Property path of the entry inside the nested data view.
    ///
    /// `data/sub/file.json` becomes `["sub", "file"]`.
    pub fn property_path(&self) -> Vec<String> {
        let key = self
            .short_key
            .strip_prefix("data/")
            .unwrap_or(&self.short_key);
        keys::strip_extension(key)
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pretty_config() -> Config {
        Config {
            post_url_format: Some("/blog/:pretty".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_split_front_matter() {
        let (front, body) =
            split_front_matter("---\ntitle: Hello\nlayout: post\n---\nBody text");
        assert_eq!(front["title"], "Hello");
        assert_eq!(front["layout"], "post");
        assert_eq!(body, "Body text");
    }

    #[test]
    fn test_split_front_matter_empty_block() {
        let (front, body) = split_front_matter("---\n---\nBody");
        assert!(front.is_empty());
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_split_front_matter_crlf() {
        let (front, body) =
            split_front_matter("---\r\ntitle: Hi\r\n---\r\nLine one\r\nLine two");
        assert_eq!(front["title"], "Hi");
        assert_eq!(body, "Line one\nLine two");
    }

    #[test]
    fn test_split_front_matter_without_block() {
        let (front, body) = split_front_matter("# Just markdown\n---\n");
        assert!(front.is_empty());
        assert_eq!(body, "# Just markdown\n---\n");
    }

    #[test]
    fn test_split_front_matter_unclosed_or_malformed() {
        let raw = "---\ntitle: Hello\nBody";
        let (front, body) = split_front_matter(raw);
        assert!(front.is_empty());
        assert_eq!(body, raw);

        let raw = "---\ntitle: [oops\n---\nBody";
        let (front, body) = split_front_matter(raw);
        assert!(front.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_post_with_pretty_url() {
        let post = Item::post(
            "/site/_posts/2013-11-13-hello.md",
            "---\ntitle: Hello\n---\nHi",
            &pretty_config(),
        );
        assert_eq!(post.kind, ItemKind::Post);
        assert_eq!(post.short_key, "posts/2013-11-13-hello.md");
        assert_eq!(post.file_path, "blog/hello/index.html");
        assert_eq!(post.url, "/blog/hello");
        assert_eq!(post.timestamp, Some(1_384_300_800_000));
    }

    #[test]
    fn test_post_without_url_format() {
        let post = Item::post("_posts/js/post1.md", "Hi", &Config::default());
        assert_eq!(post.file_path, "js/post1.html");
        assert_eq!(post.url, "/js/post1.html");
        assert_eq!(post.timestamp, None);
    }

    #[test]
    fn test_front_matter_date_wins_over_filename() {
        let post = Item::post(
            "_posts/2013-11-13-hello.md",
            "---\ndate: 2014-01-02 10:30:00\n---\nHi",
            &Config::default(),
        );
        let expected = NaiveDate::from_ymd_opt(2014, 1, 2)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(post.date, Some(expected));
    }

    #[test]
    fn test_page_urls() {
        let config = Config::default();
        let index = Item::page("index.html", "", &config);
        assert_eq!(index.kind, ItemKind::Page);
        assert_eq!(index.file_path, "index.html");
        assert_eq!(index.url, "/index.html");

        let flat = Item::page("about.html", "", &config);
        assert_eq!(flat.file_path, "about/index.html");
        assert_eq!(flat.url, "/about");

        let nested = Item::page("docs/setup.html", "", &config);
        assert_eq!(nested.file_path, "docs/setup/index.html");
        assert_eq!(nested.url, "/docs/setup");

        let nested_index = Item::page("docs/index.html", "", &config);
        assert_eq!(nested_index.file_path, "docs/index.html");
        assert_eq!(nested_index.url, "/docs");

        let from_folder = Item::page("_pages/contact.md", "", &config);
        assert_eq!(from_folder.file_path, "contact/index.html");
    }

    #[test]
    fn test_plain_page_urls() {
        let config = Config {
            url_format: UrlFormat::Plain,
            ..Default::default()
        };
        let flat = Item::page("about.html", "", &config);
        assert_eq!(flat.file_path, "about.html");
        assert_eq!(flat.url, "/about.html");
    }

    #[test]
    fn test_categories_and_tags() {
        let post = Item::post(
            "_posts/a.md",
            "---\ncategories: js, , rust \ntags:\n  - one\n  - two\n---\n",
            &Config::default(),
        );
        assert_eq!(post.categories, vec!["js", "rust"]);
        assert_eq!(post.tags, vec!["one", "two"]);
    }

    #[test]
    fn test_to_value_promotes_front_matter() {
        let post = Item::post(
            "_posts/2013-11-13-hello.md",
            "---\ntitle: Hello\nurl: /ignored\n---\nHi",
            &Config::default(),
        );
        let value = post.to_value("%B %-d, %Y");
        assert_eq!(value["title"], "Hello");
        assert_eq!(value["url"], "/hello.html");
        assert_eq!(value["date"], "November 13, 2013");
        assert_eq!(value["type"], "post");
        assert_eq!(value["front"]["url"], "/ignored");
    }

    #[test]
    fn test_transform_hook() {
        let page = Item::page("blog.html", "---\ntitle: Blog\n---\n", &Config::default())
            .transform(|item| {
                _ = item.front.insert("title".into(), json!("Blog - Page 2"));
            });
        assert_eq!(page.title(), Some("Blog - Page 2"));
    }

    #[test]
    fn test_partial_keys() {
        let partial = Partial::new("/site/_includes/blog/head.html", "<head>");
        assert_eq!(partial.short_key, "includes/blog/head.html");
        assert_eq!(partial.partial_key.as_deref(), Some("head"));
    }

    #[test]
    fn test_data_entry_parsing() {
        let yaml = DataEntry::parse("_data/site.yml", json!("name: Blog\n")).unwrap();
        assert_eq!(yaml.value, json!({"name": "Blog"}));

        let json_text =
            DataEntry::parse("data/sub/file.json", json!("{\"a\": 1}")).unwrap();
        assert_eq!(json_text.value, json!({"a": 1}));
        assert_eq!(json_text.property_path(), vec!["sub", "file"]);

        let structured = DataEntry::parse("data/list.json", json!([1, 2])).unwrap();
        assert_eq!(structured.value, json!([1, 2]));

        assert!(DataEntry::parse("data/bad.json", json!("{nope")).is_none());
    }

    #[test]
    fn test_format_date_invalid_pattern() {
        let date = NaiveDate::from_ymd_opt(2013, 11, 13)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(format_date(&date, "%Y"), "2013");
        assert_eq!(format_date(&date, "%Q"), "2013-11-13");
    }
}
