//! Resolving Trove URLs and persistent identifiers to `(category, id)` pairs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::Category;
use crate::error::{ArchiveError, Result};
use crate::utils::validate_record_id;

/// A record identifier resolved to its category and canonical URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentifier {
    /// The input that was resolved
    pub input: String,
    pub category: Category,
    pub id: String,
    /// Canonical (persistent where one exists) URL for the record
    pub url: String,
}

impl ResolvedIdentifier {
    /// Canonical URL for a record.
    ///
    /// Articles and parties have persistent `nla.gov.au` identifiers; works
    /// and lists use their Trove page.
    pub fn canonical_url(category: Category, id: &str) -> String {
        match category {
            Category::Newspaper => format!("https://nla.gov.au/nla.news-article{}", id),
            Category::People => format!("https://nla.gov.au/nla.party-{}", id),
            Category::List => format!("https://trove.nla.gov.au/list?id={}", id),
            _ => format!("https://trove.nla.gov.au/work/{}", id),
        }
    }
}

static PATTERNS: OnceLock<Vec<(Regex, Category)>> = OnceLock::new();

fn patterns() -> &'static [(Regex, Category)] {
    PATTERNS.get_or_init(|| {
        [
            (r"trove\.nla\.gov\.au/newspaper/article/(\d+)", Category::Newspaper),
            (r"nla\.gov\.au/nla\.news-article(\d+)", Category::Newspaper),
            (r"trove\.nla\.gov\.au/people/(\d+)", Category::People),
            (r"nla\.gov\.au/nla\.party-(\d+)", Category::People),
            (r"trove\.nla\.gov\.au/list/(\d+)", Category::List),
            (r"trove\.nla\.gov\.au/list\?(?:.*&)?id=(\d+)", Category::List),
            // all work categories share the work endpoint
            (r"trove\.nla\.gov\.au/work/(\d+)", Category::Book),
        ]
        .into_iter()
        .filter_map(|(pattern, category)| Regex::new(pattern).ok().map(|re| (re, category)))
        .collect()
    })
}

/// Resolve a Trove URL, persistent identifier or `category:id` pair.
///
/// ```rust
/// use trove_master::models::{resolve_identifier, Category};
///
/// let resolved = resolve_identifier("https://trove.nla.gov.au/newspaper/article/18342701").unwrap();
/// assert_eq!(resolved.category, Category::Newspaper);
/// assert_eq!(resolved.id, "18342701");
/// assert_eq!(resolved.url, "https://nla.gov.au/nla.news-article18342701");
/// ```
pub fn resolve_identifier(input: &str) -> Result<ResolvedIdentifier> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ArchiveError::InvalidArgument("empty identifier".to_string()));
    }

    for (re, category) in patterns() {
        if let Some(id) = re.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(resolved(trimmed, *category, id.as_str()));
        }
    }

    // category:id
    if !trimmed.contains("://") {
        if let Some((code, id)) = trimmed.split_once(':') {
            let category = code
                .parse::<Category>()
                .map_err(ArchiveError::InvalidArgument)?;
            let id = validate_record_id(category, id)?;
            return Ok(resolved(trimmed, category, &id));
        }
    }

    Err(ArchiveError::InvalidArgument(format!(
        "unrecognised identifier: {}",
        trimmed
    )))
}

fn resolved(input: &str, category: Category, id: &str) -> ResolvedIdentifier {
    ResolvedIdentifier {
        input: input.to_string(),
        category,
        id: id.to_string(),
        url: ResolvedIdentifier::canonical_url(category, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_urls() {
        let cases = [
            ("https://trove.nla.gov.au/newspaper/article/18342701", Category::Newspaper, "18342701"),
            ("http://nla.gov.au/nla.news-article18342701", Category::Newspaper, "18342701"),
            ("https://trove.nla.gov.au/work/9876543?q=x", Category::Book, "9876543"),
            ("https://trove.nla.gov.au/people/1478423", Category::People, "1478423"),
            ("https://nla.gov.au/nla.party-1478423", Category::People, "1478423"),
            ("https://trove.nla.gov.au/list/12345", Category::List, "12345"),
            ("https://trove.nla.gov.au/list?id=12345", Category::List, "12345"),
        ];
        for (input, category, id) in cases {
            let resolved = resolve_identifier(input).unwrap();
            assert_eq!(resolved.category, category, "{}", input);
            assert_eq!(resolved.id, id, "{}", input);
        }
    }

    #[test]
    fn test_resolve_pairs() {
        let resolved = resolve_identifier("people:1478423").unwrap();
        assert_eq!(resolved.category, Category::People);
        assert_eq!(resolved.url, "https://nla.gov.au/nla.party-1478423");

        let music = resolve_identifier(" music:24958 ").unwrap();
        assert_eq!(music.url, "https://trove.nla.gov.au/work/24958");
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(resolve_identifier("").is_err());
        assert!(resolve_identifier("18342701").is_err());
        assert!(resolve_identifier("gazette:1").is_err());
        assert!(resolve_identifier("newspaper:abc").is_err());
        assert!(resolve_identifier("https://example.com/article/1").is_err());
    }
}
