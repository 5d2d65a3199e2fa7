//! Domain model types used throughout ldapdir.
//!
//! These types bridge the directory client, the assembly pipeline, the cache
//! stores and the web API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw directory entries
// ---------------------------------------------------------------------------

/// An entry as returned by the directory query capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub dn: String,
    /// Attribute name -> values, in server order.
    pub attributes: HashMap<String, Vec<String>>,
}

impl RawEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder helper: set all values of one attribute.
    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// First value of an attribute, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A projected attribute value: scalar when the server returned one value,
/// an ordered sequence otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    /// Build from raw attribute values. Returns `None` for an empty list.
    pub fn from_values(mut values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop().map(FieldValue::Single),
            _ => Some(FieldValue::Multi(values)),
        }
    }

    /// First (or only) value; used for sorting and link building.
    pub fn first(&self) -> &str {
        match self {
            FieldValue::Single(value) => value,
            FieldValue::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(value) => vec![value.as_str()],
            FieldValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_empty()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Single(value.to_string())
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.values().join(", "))
    }
}

// ---------------------------------------------------------------------------
// Directory entries & sections
// ---------------------------------------------------------------------------

/// A canonical directory record for one person within one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub dn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldValue>,
    /// `mailto:` link, present when the email is non-empty.
    pub email_link: Option<String>,
    pub user_page_link: Option<String>,
    pub user_image_link: Option<String>,
    /// Organizational rank; absent when ranking attributes are not configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
}

impl DirectoryEntry {
    /// Display name used for ordering; empty when unset.
    pub fn sort_name(&self) -> &str {
        self.name.as_ref().map(FieldValue::first).unwrap_or("")
    }
}

/// A fully assembled directory section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub id: String,
    pub label: String,
    pub description: String,
    pub abbrev: String,
    /// Set when the section's entries could not be resolved.
    pub error: bool,
    pub header: Vec<Vec<Option<String>>>,
    pub body: Vec<DirectoryEntry>,
    pub footer: Vec<Vec<Option<String>>>,
    pub weight: i32,
    pub exclude_from_directory: bool,
}

/// Which sections a caller wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionFilter {
    /// Every configured section.
    #[default]
    All,
    /// Only sections not flagged `exclude_from_directory`.
    DirectoryOnly,
}

impl SectionFilter {
    pub fn apply(self, sections: Vec<SectionResult>) -> Vec<SectionResult> {
        match self {
            SectionFilter::All => sections,
            SectionFilter::DirectoryOnly => sections
                .into_iter()
                .filter(|section| !section.exclude_from_directory)
                .collect(),
        }
    }
}

/// A directory snapshot along with the time it was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDirectory {
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<SectionResult>,
}
