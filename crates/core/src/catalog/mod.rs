//! Section and tweak catalog.
//!
//! Sections and tweaks are authored outside the core and loaded from a TOML
//! file:
//!
//! ```toml
//! [[sections]]
//! id = "it"
//! label = "Information Technology"
//! group_dn = "cn=it,ou=groups,dc=example,dc=com"
//! depth = 2
//! weight = 10
//! header = """
//! Help Desk, 555-0100
//! """
//!
//! [[tweaks]]
//! id = "cio-first"
//! section_id = "it"
//! user_dn = "cn=Jane Roe,ou=people,dc=example,dc=com"
//! absolute_position = 0
//! ```
//!
//! File order is storage order: sections keep it until sorted by weight and
//! tweaks are applied in it.

pub mod rows;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::CatalogError;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// A section as written in the catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SectionRecord {
    id: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    abbrev: String,
    group_dn: String,
    #[serde(default = "default_depth")]
    depth: i64,
    #[serde(default)]
    weight: i32,
    #[serde(default)]
    exclude_from_directory: bool,
    #[serde(default)]
    header: String,
    #[serde(default)]
    footer: String,
}

fn default_depth() -> i64 {
    1
}

/// An administrator-defined directory section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionConfig {
    pub id: String,
    pub label: String,
    pub description: String,
    pub abbrev: String,
    /// Root LDAP group of the section.
    pub group_dn: String,
    /// Subgroup iteration bound; `< 1` means unbounded.
    pub depth: i64,
    /// Static rows shown before the entries.
    pub header: Vec<Vec<String>>,
    /// Static rows shown after the entries.
    pub footer: Vec<Vec<String>>,
    pub weight: i32,
    pub exclude_from_directory: bool,
}

impl SectionConfig {
    /// A section with no static rows, depth 1 and weight 0.
    pub fn new(id: impl Into<String>, label: impl Into<String>, group_dn: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            abbrev: String::new(),
            group_dn: group_dn.into(),
            depth: default_depth(),
            header: Vec::new(),
            footer: Vec::new(),
            weight: 0,
            exclude_from_directory: false,
        }
    }

    fn from_record(record: SectionRecord) -> Result<Self, CatalogError> {
        let header = rows::parse_rows(&record.header).map_err(|source| CatalogError::Rows {
            section: record.id.clone(),
            field: "header",
            source,
        })?;
        let footer = rows::parse_rows(&record.footer).map_err(|source| CatalogError::Rows {
            section: record.id.clone(),
            field: "footer",
            source,
        })?;

        Ok(Self {
            id: record.id,
            label: record.label,
            description: record.description,
            abbrev: record.abbrev,
            group_dn: record.group_dn,
            depth: record.depth,
            header,
            footer,
            weight: record.weight,
            exclude_from_directory: record.exclude_from_directory,
        })
    }
}

// ---------------------------------------------------------------------------
// Tweaks
// ---------------------------------------------------------------------------

/// A curated adjustment to one user within one section.
///
/// Empty strings mean "no override" / "no directive".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweakRule {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub section_id: String,
    pub user_dn: String,
    #[serde(default)]
    pub name_override: String,
    #[serde(default)]
    pub phone_override: String,
    #[serde(default)]
    pub email_override: String,
    #[serde(default)]
    pub job_title_override: String,
    #[serde(default)]
    pub position_before_user_dn: String,
    #[serde(default)]
    pub position_after_user_dn: String,
    /// Absolute index; negative values are ignored.
    #[serde(default)]
    pub absolute_position: Option<i64>,
    #[serde(default)]
    pub exclude: bool,
}

impl TweakRule {
    pub fn new(
        id: impl Into<String>,
        section_id: impl Into<String>,
        user_dn: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            section_id: section_id.into(),
            user_dn: user_dn.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sections: Vec<SectionRecord>,
    #[serde(default)]
    tweaks: Vec<TweakRule>,
}

/// An immutable snapshot of all sections and tweaks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    sections: Vec<SectionConfig>,
    tweaks: Vec<TweakRule>,
}

impl Catalog {
    /// Build a catalog, checking section ids are unique and every tweak
    /// references a known section.
    pub fn new(sections: Vec<SectionConfig>, tweaks: Vec<TweakRule>) -> Result<Self, CatalogError> {
        let mut ids = HashSet::new();
        for section in &sections {
            if !ids.insert(section.id.as_str()) {
                return Err(CatalogError::DuplicateSection(section.id.clone()));
            }
        }
        for tweak in &tweaks {
            if !ids.contains(tweak.section_id.as_str()) {
                return Err(CatalogError::UnknownSection {
                    tweak: tweak.id.clone(),
                    section: tweak.section_id.clone(),
                });
            }
        }
        Ok(Self { sections, tweaks })
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(contents).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        let sections = file
            .sections
            .into_iter()
            .map(SectionConfig::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sections, file.tweaks)
    }

    /// Load the catalog file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading section catalog");

        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&contents)?;
        debug!(
            sections = catalog.sections.len(),
            tweaks = catalog.tweaks.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Sections in storage order.
    pub fn sections(&self) -> &[SectionConfig] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn tweaks(&self) -> &[TweakRule] {
        &self.tweaks
    }

    /// Tweaks targeting `section_id`, in storage order.
    pub fn tweaks_for(&self, section_id: &str) -> Vec<&TweakRule> {
        self.tweaks
            .iter()
            .filter(|tweak| tweak.section_id == section_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[sections]]
id = "it"
label = "Information Technology"
abbrev = "IT"
group_dn = "cn=it,ou=groups,dc=example,dc=com"
depth = 0
weight = 5
header = """
Help Desk, 555-0100
"Room 4, Annex", Mon-Fri, 8-5
"""

[[sections]]
id = "hr"
label = "Human Resources"
group_dn = "cn=hr,ou=groups,dc=example,dc=com"
exclude_from_directory = true

[[tweaks]]
id = "t1"
section_id = "it"
user_dn = "cn=a"
absolute_position = 0

[[tweaks]]
id = "t2"
section_id = "hr"
user_dn = "cn=b"
exclude = true

[[tweaks]]
id = "t3"
section_id = "it"
user_dn = "cn=c"
job_title_override = "CIO"
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.sections().len(), 2);

        let it = catalog.section("it").unwrap();
        assert_eq!(it.depth, 0);
        assert_eq!(it.weight, 5);
        assert_eq!(it.header.len(), 2);
        assert_eq!(it.header[1], ["Room 4, Annex", "Mon-Fri", "8-5"]);
        assert!(it.footer.is_empty());

        let hr = catalog.section("hr").unwrap();
        assert!(hr.exclude_from_directory);
        assert_eq!(hr.depth, 1);

        let ids: Vec<_> = catalog.tweaks_for("it").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t3"]);
        assert_eq!(catalog.tweaks_for("it")[1].job_title_override, "CIO");
    }

    #[test]
    fn test_omitted_depth_matches_constructor() {
        let text = r#"
[[sections]]
id = "x"
group_dn = "cn=x"
"#;
        let catalog = Catalog::from_toml_str(text).unwrap();
        let loaded = catalog.section("x").unwrap();
        assert_eq!(loaded.depth, 1);
        assert_eq!(loaded.depth, SectionConfig::new("x", "", "cn=x").depth);
        assert_eq!(crate::directory::resolver::effective_depth(loaded.depth), 1);
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let sections = vec![
            SectionConfig::new("a", "A", "cn=a"),
            SectionConfig::new("a", "A again", "cn=a2"),
        ];
        let result = Catalog::new(sections, vec![]);
        assert!(matches!(result, Err(CatalogError::DuplicateSection(ref id)) if id == "a"));
    }

    #[test]
    fn test_tweak_for_unknown_section_rejected() {
        let sections = vec![SectionConfig::new("a", "A", "cn=a")];
        let tweaks = vec![TweakRule::new("t", "missing", "cn=x")];
        let result = Catalog::new(sections, tweaks);
        assert!(matches!(result, Err(CatalogError::UnknownSection { .. })));
    }

    #[test]
    fn test_bad_header_rows_rejected() {
        let text = r#"
[[sections]]
id = "x"
group_dn = "cn=x"
footer = "\"unterminated"
"#;
        let result = Catalog::from_toml_str(text);
        assert!(matches!(
            result,
            Err(CatalogError::Rows { field: "footer", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();
        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.tweaks().len(), 3);

        let missing = Catalog::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(CatalogError::FileNotFound(_))));
    }
}
