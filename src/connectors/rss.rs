//! Tolerant RSS scanning
//!
//! Not an XML parser. Feeds in the wild are frequently malformed, so this
//! scans for a fixed set of tags with regular expressions and keeps whatever
//! it finds:
//! - channel title: the first `<title>` before the first `<item>`
//! - per item: title, link, description, pubDate, guid, author, category
//!
//! CDATA sections are unwrapped and the common XML entities are decoded.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tags extracted from each `<item>`, in output order.
pub const ITEM_TAGS: &[&str] = &[
    "title",
    "link",
    "description",
    "pubDate",
    "guid",
    "author",
    "category",
];

static ITEM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<item(?:\s[^>]*)?>(.*?)</item\s*>").expect("failed to compile regex: item")
});

static ITEM_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<item(?:\s[^>]*)?>").expect("failed to compile regex: item_start")
});

static FEED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:channel|item)[\s>]").expect("failed to compile regex: feed")
});

static CDATA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("failed to compile regex: cdata")
});

static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9A-Fa-f]+|[0-9]+);").expect("failed to compile regex: numeric_entity")
});

/// One compiled matcher per tag in [`ITEM_TAGS`].
static TAG_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ITEM_TAGS
        .iter()
        .map(|tag| {
            let pattern = format!(r"(?is)<{tag}(\s[^>]*)?>(.*?)</{tag}\s*>", tag = tag);
            let regex = Regex::new(&pattern).expect("failed to compile regex: rss tag");
            (*tag, regex)
        })
        .collect()
});

/// A scanned feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssFeed {
    pub channel_title: Option<String>,
    pub items: Vec<RssItem>,
}

/// One scanned `<item>`. Absent tags stay `None` and are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "pubDate", default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RssItem {
    /// Names of the tags present on this item, in [`ITEM_TAGS`] order.
    pub fn fields(&self) -> Vec<String> {
        ITEM_TAGS
            .iter()
            .filter(|tag| self.get(tag).is_some())
            .map(|tag| tag.to_string())
            .collect()
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        match tag {
            "title" => self.title.as_deref(),
            "link" => self.link.as_deref(),
            "description" => self.description.as_deref(),
            "pubDate" => self.pub_date.as_deref(),
            "guid" => self.guid.as_deref(),
            "author" => self.author.as_deref(),
            "category" => self.category.as_deref(),
            _ => None,
        }
    }

    fn set(&mut self, tag: &str, value: String) {
        let slot = match tag {
            "title" => &mut self.title,
            "link" => &mut self.link,
            "description" => &mut self.description,
            "pubDate" => &mut self.pub_date,
            "guid" => &mut self.guid,
            "author" => &mut self.author,
            "category" => &mut self.category,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// Whether the text has a `<channel>` or `<item>` element.
pub fn looks_like_feed(body: &str) -> bool {
    FEED_MARKER.is_match(body)
}

/// Scan a feed body. Never fails; missing pieces are simply absent.
pub fn parse_feed(body: &str) -> RssFeed {
    let head_end = ITEM_START.find(body).map(|m| m.start()).unwrap_or(body.len());
    let channel_title = extract_tag(&body[..head_end], "title");

    let items = ITEM_PATTERN
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|block| parse_item(block.as_str()))
        .collect();

    RssFeed {
        channel_title,
        items,
    }
}

fn parse_item(block: &str) -> RssItem {
    let mut item = RssItem::default();
    for tag in ITEM_TAGS {
        if let Some(value) = extract_tag(block, tag) {
            item.set(tag, value);
        }
    }
    item
}

/// First well-formed `<tag>…</tag>` in `text`, cleaned. Self-closing tags
/// (e.g. `<link href="…"/>`) are skipped.
fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let (_, regex) = TAG_PATTERNS.iter().find(|(name, _)| *name == tag)?;
    regex
        .captures_iter(text)
        .find(|caps| {
            caps.get(1)
                .map(|attrs| !attrs.as_str().trim_end().ends_with('/'))
                .unwrap_or(true)
        })
        .and_then(|caps| caps.get(2))
        .map(|m| clean_text(m.as_str()))
}

/// Unwrap CDATA (verbatim) and decode entities everywhere else.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_end = 0;

    for caps in CDATA_PATTERN.captures_iter(raw) {
        let (Some(full), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&decode_entities(&raw[last_end..full.start()]));
        out.push_str(inner.as_str());
        last_end = full.end();
    }
    out.push_str(&decode_entities(&raw[last_end..]));

    out.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let parsed = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    // &amp; last so "&amp;lt;" stays "&lt;"
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
