//! Profile identity mapping.
//!
//! Directory entries can be linked to a profile page and picture. The link
//! data is looked up by the entry's persistent unique id through a
//! [`ProfileResolver`]; an entry without a mapping simply has no links.

pub mod mapping_file;

pub use mapping_file::MappingFileResolver;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::errors::IdentityError;
use crate::models::RawEntry;

/// Links attached to a directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLinks {
    /// Profile page URL.
    #[serde(default)]
    pub page: Option<String>,
    /// Profile picture URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// Resolves profile links for raw directory entries.
pub trait ProfileResolver: Send + Sync {
    /// Links for `entry`, or `None` when it maps to no profile.
    fn resolve(&self, entry: &RawEntry) -> Option<ProfileLinks>;

    /// Extra LDAP attributes the resolver needs on each entry.
    fn required_attributes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Re-read backing data. Resolvers without any keep their state.
    fn reload(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// Resolver used when profile linking is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfiles;

impl ProfileResolver for NoProfiles {
    fn resolve(&self, _entry: &RawEntry) -> Option<ProfileLinks> {
        None
    }
}

/// Build the resolver selected by configuration.
///
/// Linking needs `directory.link_to_user_page`, `ldap.puid_attr` and
/// `identity.mapping_file`; otherwise entries carry no profile links.
pub fn resolver_from_config(config: &AppConfig) -> Result<Arc<dyn ProfileResolver>, IdentityError> {
    if !config.directory.link_to_user_page {
        return Ok(Arc::new(NoProfiles));
    }
    match (&config.ldap.puid_attr, &config.identity.mapping_file) {
        (Some(puid_attr), Some(path)) => {
            let resolver = MappingFileResolver::new(path, puid_attr.clone())?;
            info!(profiles = resolver.len(), "profile linking enabled");
            Ok(Arc::new(resolver))
        }
        _ => {
            info!("profile linking requested without a mapping file; links disabled");
            Ok(Arc::new(NoProfiles))
        }
    }
}
