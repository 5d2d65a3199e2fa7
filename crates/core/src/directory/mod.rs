//! Directory query capability and nested group resolution.
//!
//! [`DirectoryQuery`] is the seam between the assembly pipeline and the LDAP
//! server: [`ldap::LdapDirectory`] talks to a real server, while
//! [`memory::InMemoryDirectory`] answers from fixtures.

pub mod ldap;
pub mod memory;
pub mod resolver;

pub use ldap::LdapDirectory;
pub use memory::InMemoryDirectory;
pub use resolver::GroupResolver;

use crate::config::{LdapConfig, FILTER_TOKEN};
use crate::errors::{ConfigError, DirectoryError};
use crate::models::RawEntry;

/// Synchronous search capability over an LDAP-like directory.
pub trait DirectoryQuery: Send + Sync {
    /// Search `base_dn` (subtree) with `filter`, returning the requested
    /// attributes of each matching entry.
    fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attrs: &[String],
    ) -> Result<Vec<RawEntry>, DirectoryError>;
}

/// Base DNs and filter formats used to expand a section group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSettings {
    pub base_dn: String,
    pub filter: String,
    pub group_base_dn: Option<String>,
    pub group_filter: Option<String>,
}

impl SearchSettings {
    pub fn from_config(config: &LdapConfig) -> Self {
        Self {
            base_dn: config.base_dn.clone(),
            filter: config.filter.clone(),
            group_base_dn: config.group_base_dn.clone(),
            group_filter: config.group_filter.clone(),
        }
    }

    /// Filter selecting the direct members of `group_dn`.
    pub fn member_filter(&self, group_dn: &str) -> Result<String, ConfigError> {
        if self.base_dn.is_empty() {
            return Err(ConfigError::MissingSearchSetting("base_dn".into()));
        }
        if self.filter.is_empty() {
            return Err(ConfigError::MissingSearchSetting("filter".into()));
        }
        Ok(format_filter(&self.filter, group_dn))
    }

    /// Group base DN and filter format, when subgroup search is configured.
    pub fn group_search(&self) -> Option<(&str, &str)> {
        match (self.group_base_dn.as_deref(), self.group_filter.as_deref()) {
            (Some(base), Some(filter)) if !base.is_empty() && !filter.is_empty() => {
                Some((base, filter))
            }
            _ => None,
        }
    }
}

/// Substitute an escaped DN for every `%s` token in a filter format.
pub fn format_filter(format: &str, dn: &str) -> String {
    format.replace(FILTER_TOKEN, &ldap3::ldap_escape(dn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_filter_escapes_dn() {
        let filter = format_filter("(memberOf=%s)", "cn=R&D (East),ou=groups");
        assert_eq!(filter, "(memberOf=cn=R&D \\28East\\29,ou=groups)");
        assert_eq!(
            format_filter("(member=%s)", "cn=plain,dc=example"),
            "(member=cn=plain,dc=example)"
        );
    }

    #[test]
    fn test_member_filter_requires_settings() {
        let settings = SearchSettings {
            base_dn: String::new(),
            filter: "(memberOf=%s)".into(),
            ..Default::default()
        };
        assert!(matches!(
            settings.member_filter("cn=g"),
            Err(ConfigError::MissingSearchSetting(ref key)) if key == "base_dn"
        ));
    }

    #[test]
    fn test_group_search_needs_both_settings() {
        let mut settings = SearchSettings {
            base_dn: "dc=x".into(),
            filter: "(memberOf=%s)".into(),
            group_base_dn: Some("ou=groups,dc=x".into()),
            group_filter: None,
        };
        assert!(settings.group_search().is_none());
        settings.group_filter = Some("(memberOf=%s)".into());
        assert_eq!(
            settings.group_search(),
            Some(("ou=groups,dc=x", "(memberOf=%s)"))
        );
    }
}
