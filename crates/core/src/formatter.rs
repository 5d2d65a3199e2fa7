//! Conversion of raw directory entries into ranked, sorted section bodies.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::attributes::{AttributeMap, Field};
use crate::identity::ProfileResolver;
use crate::models::{DirectoryEntry, FieldValue, RawEntry};

/// An entry before ranking, still carrying its manager/report links.
struct Projected {
    entry: DirectoryEntry,
    manager: Option<String>,
    reports: Vec<String>,
}

/// Builds canonical [`DirectoryEntry`] lists from raw search results.
pub struct EntryFormatter<'a> {
    attributes: &'a AttributeMap,
    profiles: &'a dyn ProfileResolver,
}

impl<'a> EntryFormatter<'a> {
    pub fn new(attributes: &'a AttributeMap, profiles: &'a dyn ProfileResolver) -> Self {
        Self {
            attributes,
            profiles,
        }
    }

    /// Project, deduplicate by DN (first occurrence wins), rank and sort.
    pub fn format(&self, raw: Vec<RawEntry>) -> Vec<DirectoryEntry> {
        let total = raw.len();
        let mut seen = HashSet::new();
        let projected: Vec<Projected> = raw
            .into_iter()
            .filter(|entry| seen.insert(entry.dn.clone()))
            .map(|entry| self.project(entry))
            .collect();

        let ranked = if self.attributes.ranks_entries() {
            rank(projected, &seen)
        } else {
            projected.into_iter().map(|p| p.entry).collect()
        };

        let sorted = sort_entries(ranked);
        debug!(
            received = total,
            kept = sorted.len(),
            "formatted directory entries"
        );
        sorted
    }

    fn project(&self, raw: RawEntry) -> Projected {
        let mut entry = DirectoryEntry {
            dn: raw.dn.clone(),
            ..Default::default()
        };
        let mut manager = None;
        let mut reports = Vec::new();

        for (attr, values) in &raw.attributes {
            let Some(field) = self.attributes.field_for(attr) else {
                continue;
            };
            match field {
                Field::Name => entry.name = FieldValue::from_values(values.clone()),
                Field::Email => entry.email = FieldValue::from_values(values.clone()),
                Field::Title => entry.title = FieldValue::from_values(values.clone()),
                Field::Phone => entry.phone = FieldValue::from_values(values.clone()),
                Field::Manager => manager = values.first().filter(|v| !v.is_empty()).cloned(),
                Field::Reports => reports = values.clone(),
            }
        }

        entry.email_link = email_link(entry.email.as_ref());

        if let Some(links) = self.profiles.resolve(&raw) {
            entry.user_page_link = links.page;
            entry.user_image_link = links.image;
        }

        Projected {
            entry,
            manager,
            reports,
        }
    }
}

/// `mailto:` link for a non-empty email.
pub fn email_link(email: Option<&FieldValue>) -> Option<String> {
    email
        .filter(|value| !value.is_empty())
        .map(|value| format!("mailto:{}", value.first()))
}

/// Demote entries whose manager is in the group; promote entries with at
/// least one direct report in the group.
fn rank(projected: Vec<Projected>, group: &HashSet<String>) -> Vec<DirectoryEntry> {
    projected
        .into_iter()
        .map(|p| {
            let mut rank = 0;
            if p.manager.as_ref().is_some_and(|dn| group.contains(dn)) {
                rank -= 1;
            }
            if p.reports.iter().any(|dn| group.contains(dn)) {
                rank += 1;
            }
            DirectoryEntry {
                rank: Some(rank),
                ..p.entry
            }
        })
        .collect()
}

/// Stable sort: rank descending, then name ascending (byte order).
pub fn sort_entries(mut entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
    entries.sort_by(compare_entries);
    entries
}

fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.rank
        .cmp(&a.rank)
        .then_with(|| a.sort_name().as_bytes().cmp(b.sort_name().as_bytes()))
}
