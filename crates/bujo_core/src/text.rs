//! Tag, mention and URL extraction from entry content.
//!
//! # Invariants
//! - Tags and mentions start with an ASCII letter after the sigil.
//! - Tags are lowercased, deduplicated and sorted.
//! - URL extraction preserves encounter order and returns an empty vector
//!   when nothing matches.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w#])#([A-Za-z][A-Za-z0-9-]*)").expect("valid tag regex")
});
static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w@])@([A-Za-z][A-Za-z0-9-]*(?:\.[A-Za-z][A-Za-z0-9-]*)*)")
        .expect("valid mention regex")
});
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)\]>]+").expect("valid url regex"));

/// Sorted, lowercased, deduplicated `#tags`.
pub fn extract_tags(content: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|tag| tag.as_str().to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, deduplicated `@mentions`, dotted forms kept whole.
pub fn extract_mentions(content: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|mention| mention.as_str().to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `http(s)://` links in encounter order.
pub fn extract_urls(content: &str) -> Vec<String> {
    URL_RE
        .find_iter(content)
        .map(|found| {
            found
                .as_str()
                .trim_end_matches(URL_TRAILING_PUNCTUATION)
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{extract_mentions, extract_tags, extract_urls};

    #[test]
    fn tags_need_a_leading_letter() {
        assert_eq!(extract_tags("#2024 #x1 #-bad"), vec!["x1"]);
    }

    #[test]
    fn anchors_inside_words_are_not_tags() {
        assert!(extract_tags("issue#12 and a#b").is_empty());
    }

    #[test]
    fn mention_keeps_dotted_form() {
        assert_eq!(extract_mentions("ping @alice.smith."), vec!["alice.smith"]);
    }

    #[test]
    fn url_drops_trailing_punctuation() {
        assert_eq!(
            extract_urls("see https://example.com/a, then"),
            vec!["https://example.com/a"]
        );
    }
}
