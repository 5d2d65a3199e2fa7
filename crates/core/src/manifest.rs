//! Flat search manifest for client-side directory search.

use serde::{Deserialize, Serialize};

use crate::models::{FieldValue, SectionResult};

/// One section x entry pair. Keys are kept short since the manifest is
/// shipped to browsers in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    /// Name.
    pub n: Option<FieldValue>,
    /// Job title.
    pub j: Option<FieldValue>,
    /// Phone.
    pub p: Option<FieldValue>,
    /// Section label.
    pub d: String,
    /// Email.
    pub e: Option<FieldValue>,
    /// Profile page link.
    pub l: Option<String>,
}

/// Flatten sections into manifest rows, in section then body order.
pub fn build_manifest(sections: &[SectionResult]) -> Vec<ManifestRow> {
    sections
        .iter()
        .flat_map(|section| {
            section.body.iter().map(move |entry| ManifestRow {
                n: entry.name.clone(),
                j: entry.title.clone(),
                p: entry.phone.clone(),
                d: section.label.clone(),
                e: entry.email.clone(),
                l: entry.user_page_link.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DirectoryEntry;

    fn section(label: &str, body: Vec<DirectoryEntry>) -> SectionResult {
        SectionResult {
            id: label.to_lowercase(),
            label: label.into(),
            description: String::new(),
            abbrev: String::new(),
            error: false,
            header: vec![],
            body,
            footer: vec![],
            weight: 0,
            exclude_from_directory: false,
        }
    }

    #[test]
    fn test_one_row_per_section_entry() {
        let alice = DirectoryEntry {
            dn: "cn=alice".into(),
            name: Some("Alice".into()),
            title: Some("Engineer".into()),
            user_page_link: Some("/user/1".into()),
            ..Default::default()
        };
        let bob = DirectoryEntry {
            dn: "cn=bob".into(),
            name: Some("Bob".into()),
            ..Default::default()
        };
        let sections = vec![
            section("IT", vec![alice.clone(), bob]),
            section("Empty", vec![]),
            section("Board", vec![alice]),
        ];

        let manifest = build_manifest(&sections);
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest[0].d, "IT");
        assert_eq!(manifest[0].l.as_deref(), Some("/user/1"));
        assert_eq!(manifest[2].d, "Board");

        let json = serde_json::to_value(&manifest[1]).unwrap();
        assert_eq!(json["n"], "Bob");
        assert!(json["j"].is_null());
    }
}
