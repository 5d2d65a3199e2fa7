//! Curated per-user adjustments to an assembled section body.
//!
//! Each rule is a small pipeline over the current list: overrides, then
//! relative positioning, then absolute positioning, then exclusion. Rules run
//! in catalog order and each one sees the list left by the previous rule.

use tracing::debug;

use crate::catalog::TweakRule;
use crate::formatter::email_link;
use crate::models::{DirectoryEntry, FieldValue};

/// Applies [`TweakRule`]s to one section's entry list.
pub struct TweakEngine<'a> {
    rules: Vec<&'a TweakRule>,
}

impl<'a> TweakEngine<'a> {
    pub fn new(rules: Vec<&'a TweakRule>) -> Self {
        Self { rules }
    }

    /// Apply every rule in order and return the resulting list.
    ///
    /// Rank is never recomputed; the output holds a subset of the input DNs.
    pub fn apply(&self, entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
        self.rules.iter().fold(entries, |entries, rule| apply_rule(entries, rule))
    }
}

fn position_of(entries: &[DirectoryEntry], dn: &str) -> Option<usize> {
    entries.iter().position(|entry| entry.dn == dn)
}

/// Run one rule against the list. Rules targeting an absent DN are no-ops.
pub fn apply_rule(entries: Vec<DirectoryEntry>, rule: &TweakRule) -> Vec<DirectoryEntry> {
    if position_of(&entries, &rule.user_dn).is_none() {
        debug!(tweak = %rule.id, dn = %rule.user_dn, "tweak target not in section");
        return entries;
    }

    let entries = apply_overrides(entries, rule);
    let entries = apply_relative(entries, rule);
    let entries = match rule.absolute_position {
        Some(index) if index >= 0 => move_to(entries, &rule.user_dn, index as usize),
        _ => entries,
    };
    if rule.exclude {
        exclude(entries, &rule.user_dn)
    } else {
        entries
    }
}

fn apply_overrides(mut entries: Vec<DirectoryEntry>, rule: &TweakRule) -> Vec<DirectoryEntry> {
    let Some(entry) = entries.iter_mut().find(|entry| entry.dn == rule.user_dn) else {
        return entries;
    };

    let overrides = [
        (&rule.name_override, &mut entry.name),
        (&rule.phone_override, &mut entry.phone),
        (&rule.job_title_override, &mut entry.title),
    ];
    for (value, field) in overrides {
        if !value.is_empty() {
            *field = Some(FieldValue::Single(value.clone()));
        }
    }

    if !rule.email_override.is_empty() {
        entry.email = Some(FieldValue::Single(rule.email_override.clone()));
        entry.email_link = email_link(entry.email.as_ref());
    }

    entries
}

/// "Before" takes precedence; "after" only applies when no before-target
/// is present.
fn apply_relative(entries: Vec<DirectoryEntry>, rule: &TweakRule) -> Vec<DirectoryEntry> {
    let dn = rule.user_dn.as_str();
    let before = rule.position_before_user_dn.as_str();
    let after = rule.position_after_user_dn.as_str();

    if !before.is_empty() && before != dn && position_of(&entries, before).is_some() {
        insert_relative(entries, dn, before, 0)
    } else if !after.is_empty() && after != dn && position_of(&entries, after).is_some() {
        insert_relative(entries, dn, after, 1)
    } else {
        entries
    }
}

/// Remove `dn` and reinsert it at the target's index plus `offset`.
fn insert_relative(
    mut entries: Vec<DirectoryEntry>,
    dn: &str,
    target: &str,
    offset: usize,
) -> Vec<DirectoryEntry> {
    let Some(current) = position_of(&entries, dn) else {
        return entries;
    };
    let entry = entries.remove(current);
    match position_of(&entries, target) {
        Some(index) => entries.insert(index + offset, entry),
        None => entries.insert(current, entry),
    }
    entries
}

/// Remove `dn` and reinsert it at `index`, clamped to the list length.
fn move_to(mut entries: Vec<DirectoryEntry>, dn: &str, index: usize) -> Vec<DirectoryEntry> {
    let Some(current) = position_of(&entries, dn) else {
        return entries;
    };
    let entry = entries.remove(current);
    let index = index.min(entries.len());
    entries.insert(index, entry);
    entries
}

fn exclude(mut entries: Vec<DirectoryEntry>, dn: &str) -> Vec<DirectoryEntry> {
    entries.retain(|entry| entry.dn != dn);
    entries
}
