//! Trove search categories and what each one supports.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

bitflags::bitflags! {
    /// Operations a category supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CategoryCapabilities: u32 {
        const SEARCH = 1 << 0;
        const RECORD = 1 << 1;
        const FULL_TEXT = 1 << 2;
    }
}

impl CategoryCapabilities {
    /// Lowercase names of the set flags, in flag order
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::SEARCH) {
            names.push("search");
        }
        if self.contains(Self::RECORD) {
            names.push("record");
        }
        if self.contains(Self::FULL_TEXT) {
            names.push("full_text");
        }
        names
    }
}

/// A top-level search category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Book,
    Diary,
    Image,
    List,
    Magazine,
    Music,
    Newspaper,
    People,
    Research,
}

impl Category {
    /// Every category, in code order
    pub const ALL: [Category; 9] = [
        Category::Book,
        Category::Diary,
        Category::Image,
        Category::List,
        Category::Magazine,
        Category::Music,
        Category::Newspaper,
        Category::People,
        Category::Research,
    ];

    /// Code used in the `category` request parameter
    pub fn code(&self) -> &'static str {
        match self {
            Category::Book => "book",
            Category::Diary => "diary",
            Category::Image => "image",
            Category::List => "list",
            Category::Magazine => "magazine",
            Category::Music => "music",
            Category::Newspaper => "newspaper",
            Category::People => "people",
            Category::Research => "research",
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Category::Book => "Books & Libraries",
            Category::Diary => "Diaries, Letters & Archives",
            Category::Image => "Images, Maps & Artefacts",
            Category::List => "Lists",
            Category::Magazine => "Magazines & newsletters",
            Category::Music => "Music, Audio & Video",
            Category::Newspaper => "Newspapers & Gazettes",
            Category::People => "People & Organisations",
            Category::Research => "Research & Reports",
        }
    }

    /// Key holding the record array inside a search result group
    pub fn group_key(&self) -> &'static str {
        match self {
            Category::Newspaper => "article",
            Category::People => "people",
            Category::List => "list",
            _ => "work",
        }
    }

    /// First path segment of the single-record endpoint
    pub fn record_path(&self) -> &'static str {
        match self {
            Category::Newspaper => "newspaper",
            Category::People => "people",
            Category::List => "list",
            _ => "work",
        }
    }

    pub fn capabilities(&self) -> CategoryCapabilities {
        match self {
            Category::Newspaper => {
                CategoryCapabilities::SEARCH
                    | CategoryCapabilities::RECORD
                    | CategoryCapabilities::FULL_TEXT
            }
            _ => CategoryCapabilities::SEARCH | CategoryCapabilities::RECORD,
        }
    }

    pub fn supports(&self, capability: CategoryCapabilities) -> bool {
        self.capabilities().contains(capability)
    }

    /// All category codes, for schemas and help text
    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.code()).collect()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or_else(|| {
                format!(
                    "unknown category '{}', expected one of: {}",
                    s,
                    Self::codes().join(", ")
                )
            })
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    DateAsc,
    DateDesc,
}

impl SortBy {
    /// Value of the `sortby` request parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::DateAsc => "dateasc",
            SortBy::DateDesc => "datedesc",
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(SortBy::Relevance),
            "date_asc" | "dateasc" => Ok(SortBy::DateAsc),
            "date_desc" | "datedesc" => Ok(SortBy::DateDesc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}
