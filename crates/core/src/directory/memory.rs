//! In-memory directory used by tests and local previews.
//!
//! Responses are keyed by the exact `(base_dn, filter)` pair a search would
//! send, built with the same [`format_filter`] the resolver uses, so fixtures
//! stay independent of escaping details.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{format_filter, DirectoryQuery, SearchSettings};
use crate::errors::DirectoryError;
use crate::models::RawEntry;

/// Fixture-backed [`DirectoryQuery`] that counts every search.
pub struct InMemoryDirectory {
    settings: SearchSettings,
    responses: RwLock<HashMap<(String, String), Vec<RawEntry>>>,
    failing: RwLock<HashSet<(String, String)>>,
    calls: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            responses: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn member_key(&self, group_dn: &str) -> (String, String) {
        (
            self.settings.base_dn.clone(),
            format_filter(&self.settings.filter, group_dn),
        )
    }

    fn group_key(&self, group_dn: &str) -> (String, String) {
        let base = self.settings.group_base_dn.clone().unwrap_or_default();
        let filter = self.settings.group_filter.as_deref().unwrap_or_default();
        (base, format_filter(filter, group_dn))
    }

    /// Register the direct members of a group.
    pub fn with_members(self, group_dn: &str, members: Vec<RawEntry>) -> Self {
        let key = self.member_key(group_dn);
        self.write_responses().entry(key).or_default().extend(members);
        self
    }

    /// Register the direct subgroups of a group.
    pub fn with_subgroups(self, group_dn: &str, subgroups: &[&str]) -> Self {
        let key = self.group_key(group_dn);
        self.write_responses()
            .entry(key)
            .or_default()
            .extend(subgroups.iter().map(|dn| RawEntry::new(*dn)));
        self
    }

    /// Make member searches for a group fail with a connection error.
    pub fn with_failing_group(self, group_dn: &str) -> Self {
        let key = self.member_key(group_dn);
        self.failing
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key);
        self
    }

    /// Number of searches issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write_responses(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<(String, String), Vec<RawEntry>>> {
        self.responses
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DirectoryQuery for InMemoryDirectory {
    fn search(
        &self,
        base_dn: &str,
        filter: &str,
        _attrs: &[String],
    ) -> Result<Vec<RawEntry>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = (base_dn.to_string(), filter.to_string());

        let failing = self
            .failing
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing.contains(&key) {
            return Err(DirectoryError::Connection(format!(
                "simulated outage for {}",
                filter
            )));
        }

        let responses = self
            .responses
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(responses.get(&key).cloned().unwrap_or_default())
    }
}
