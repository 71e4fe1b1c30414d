//! Store and aisle categories
//!
//! Wire values are the upper-case tags. A tag this build does not know is
//! kept as received in an `Other` variant, so it is written back unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store a list is meant for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ListCategory {
    #[default]
    Rema,
    Coop,
    Andre,
    /// Unknown tag, kept verbatim
    Other(String),
}

impl ListCategory {
    pub const ALL: [Self; 3] = [Self::Rema, Self::Coop, Self::Andre];

    /// Wire tag
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rema => "REMA",
            Self::Coop => "COOP",
            Self::Andre => "ANDRE",
            Self::Other(tag) => tag,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Rema => "Rema",
            Self::Coop => "Coop",
            Self::Andre => "Andre",
            Self::Other(tag) => tag,
        }
    }

    /// Single-letter badge
    pub const fn letter(&self) -> char {
        match self {
            Self::Rema => 'R',
            Self::Coop => 'C',
            Self::Andre | Self::Other(_) => '?',
        }
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Parse a tag; a blank tag is [`ListCategory::Rema`]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return Self::default();
        }
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(tag))
            .unwrap_or_else(|| Self::Other(tag.to_string()))
    }
}

impl From<String> for ListCategory {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

impl From<ListCategory> for String {
    fn from(value: ListCategory) -> Self {
        match value {
            ListCategory::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ListCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Aisle an item belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Category {
    Broed,
    Groentsager,
    Frugt,
    Koed,
    Paalaeg,
    Mejeri,
    Frost,
    Toerstof,
    Drikkelse,
    Snacks,
    #[default]
    Diverse,
    /// Unknown tag, kept verbatim
    Other(String),
}

impl Category {
    pub const ALL: [Self; 11] = [
        Self::Broed,
        Self::Groentsager,
        Self::Frugt,
        Self::Koed,
        Self::Paalaeg,
        Self::Mejeri,
        Self::Frost,
        Self::Toerstof,
        Self::Drikkelse,
        Self::Snacks,
        Self::Diverse,
    ];

    /// Wire tag
    pub fn as_str(&self) -> &str {
        match self {
            Self::Broed => "BROED",
            Self::Groentsager => "GROENGSAGER",
            Self::Frugt => "FRUGT",
            Self::Koed => "KOED",
            Self::Paalaeg => "PAALAEG",
            Self::Mejeri => "MEJERI",
            Self::Frost => "FROST",
            Self::Toerstof => "TOERSTOF",
            Self::Drikkelse => "DRIKKELSE",
            Self::Snacks => "SNACKS",
            Self::Diverse => "DIVERSE",
            Self::Other(tag) => tag,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Broed => "Brød",
            Self::Groentsager => "Grøntsager",
            Self::Frugt => "Frugt",
            Self::Koed => "Kød",
            Self::Paalaeg => "Pålæg",
            Self::Mejeri => "Mejeri",
            Self::Frost => "Frost",
            Self::Toerstof => "Tørstof",
            Self::Drikkelse => "Drikkelse",
            Self::Snacks => "Snacks",
            Self::Diverse => "Diverse",
            Self::Other(tag) => tag,
        }
    }

    /// Position in the store walk, bread first and misc last
    pub const fn sort_order(&self) -> u8 {
        match self {
            Self::Broed => 1,
            Self::Groentsager => 2,
            Self::Frugt => 3,
            Self::Koed => 4,
            Self::Paalaeg => 5,
            Self::Mejeri => 6,
            Self::Frost => 7,
            Self::Toerstof => 8,
            Self::Drikkelse => 9,
            Self::Snacks => 10,
            Self::Diverse | Self::Other(_) => 11,
        }
    }

    /// Parse a tag; a blank tag is [`Category::Diverse`]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return Self::default();
        }
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(tag))
            .unwrap_or_else(|| Self::Other(tag.to_string()))
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
