//! Expansion of a section group into its member entries.
//!
//! Subgroups are walked with an explicit stack and an iteration counter
//! rather than recursion, so a cyclic group graph still terminates.
//!
//! The walk is single-path: as soon as one popped group reports no subgroups
//! the whole walk stops, even if other groups are still stacked.

use tracing::{debug, info};

use super::{format_filter, DirectoryQuery, SearchSettings};
use crate::errors::{AssemblyError, DirectoryError};
use crate::models::RawEntry;

/// Iteration bound used when a section asks for unbounded recursion.
pub const MAX_RECURSIVE_DEPTH: u32 = 10_000;

/// Attribute list requesting no attributes (RFC 4511 `1.1`).
const NO_ATTRIBUTES: &str = "1.1";

/// Map a configured depth onto an iteration bound. Values below 1 mean
/// unbounded and are capped at [`MAX_RECURSIVE_DEPTH`].
pub fn effective_depth(depth: i64) -> u32 {
    if depth < 1 {
        MAX_RECURSIVE_DEPTH
    } else {
        u32::try_from(depth).unwrap_or(MAX_RECURSIVE_DEPTH)
    }
}

/// Resolves a group DN into member entries, optionally through subgroups.
pub struct GroupResolver<'a> {
    directory: &'a dyn DirectoryQuery,
    settings: &'a SearchSettings,
    attrs: &'a [String],
}

impl<'a> GroupResolver<'a> {
    pub fn new(
        directory: &'a dyn DirectoryQuery,
        settings: &'a SearchSettings,
        attrs: &'a [String],
    ) -> Self {
        Self {
            directory,
            settings,
            attrs,
        }
    }

    /// Direct members of `group_dn`, followed by members found by walking
    /// its subgroups when `depth` allows and group search is configured.
    ///
    /// Entries are returned in encounter order and may contain duplicates.
    pub fn resolve(&self, group_dn: &str, depth: i64) -> Result<Vec<RawEntry>, AssemblyError> {
        let filter = self.settings.member_filter(group_dn)?;
        let mut entries = self
            .directory
            .search(&self.settings.base_dn, &filter, self.attrs)?;
        debug!(group_dn, count = entries.len(), "queried direct group members");

        let bound = effective_depth(depth);
        if bound > 1 {
            if let Some((group_base_dn, group_filter)) = self.settings.group_search() {
                let nested =
                    self.recurse_subgroups(group_base_dn, group_filter, group_dn, bound)?;
                entries.extend(nested);
            }
        }

        Ok(entries)
    }

    /// Walk subgroups of `root_dn` for at most `max_iterations - 1` passes.
    pub fn recurse_subgroups(
        &self,
        group_base_dn: &str,
        group_filter: &str,
        root_dn: &str,
        max_iterations: u32,
    ) -> Result<Vec<RawEntry>, DirectoryError> {
        let no_attrs = [NO_ATTRIBUTES.to_string()];
        let mut entries = Vec::new();
        let mut stack = vec![root_dn.to_string()];
        let mut iteration: u32 = 1;

        while iteration < max_iterations {
            let Some(parent) = stack.pop() else {
                break;
            };

            let filter = format_filter(group_filter, &parent);
            let subgroups = self.directory.search(group_base_dn, &filter, &no_attrs)?;
            if subgroups.is_empty() {
                debug!(parent = %parent, iteration, "no subgroups, ending walk");
                break;
            }

            for subgroup in subgroups {
                let member_filter = format_filter(&self.settings.filter, &subgroup.dn);
                let members =
                    self.directory
                        .search(&self.settings.base_dn, &member_filter, self.attrs)?;
                debug!(subgroup = %subgroup.dn, count = members.len(), "queried subgroup members");
                entries.extend(members);
                stack.push(subgroup.dn);
            }

            iteration += 1;
        }

        info!(
            root = root_dn,
            iterations = iteration,
            count = entries.len(),
            "subgroup walk finished"
        );
        Ok(entries)
    }
}
