//! TOML-based profile mapping file.
//!
//! The mapping file format:
//!
//! ```toml
//! [profiles.jdoe]
//! page = "/user/12"
//! image = "/files/pictures/jdoe.png"
//! ```
//!
//! Keys are values of the configured persistent id attribute (`puid_attr`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ProfileLinks, ProfileResolver};
use crate::errors::IdentityError;
use crate::models::RawEntry;

/// Wrapper around the TOML mapping file structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MappingFileData {
    /// The `[profiles]` table mapping persistent id -> links.
    #[serde(default)]
    pub profiles: HashMap<String, ProfileLinks>,
}

/// [`ProfileResolver`] backed by a TOML mapping file.
///
/// The table is held behind an `RwLock` so [`ProfileResolver::reload`] can swap
/// it while sections are being assembled.
pub struct MappingFileResolver {
    path: PathBuf,
    puid_attr: String,
    profiles: RwLock<HashMap<String, ProfileLinks>>,
}

impl MappingFileResolver {
    /// Load the mapping file and build a resolver keyed on `puid_attr`.
    pub fn new<P: AsRef<Path>>(path: P, puid_attr: impl Into<String>) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        let profiles = Self::load(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            puid_attr: puid_attr.into(),
            profiles: RwLock::new(profiles),
        })
    }

    /// Read the mapping file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<String, ProfileLinks>, IdentityError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading profile mapping file");

        if !path.exists() {
            return Err(IdentityError::MappingFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let data: MappingFileData =
            toml::from_str(&contents).map_err(|e| IdentityError::ParseError(e.to_string()))?;

        debug!(count = data.profiles.len(), "loaded profile mappings");
        Ok(data.profiles)
    }

    pub fn len(&self) -> usize {
        self.profiles
            .read()
            .map(|profiles| profiles.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProfileResolver for MappingFileResolver {
    fn resolve(&self, entry: &RawEntry) -> Option<ProfileLinks> {
        let puid = entry.first(&self.puid_attr).filter(|v| !v.is_empty())?;
        let profiles = match self.profiles.read() {
            Ok(profiles) => profiles,
            Err(poisoned) => {
                warn!("profile mapping lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        profiles.get(puid).cloned()
    }

    fn required_attributes(&self) -> Vec<String> {
        vec![self.puid_attr.clone()]
    }

    /// Swap in a fresh copy of the mapping file. On error the previous
    /// table stays in use.
    fn reload(&self) -> Result<(), IdentityError> {
        let profiles = Self::load(&self.path)?;
        let count = profiles.len();
        let mut guard = self
            .profiles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = profiles;
        info!(profiles = count, "profile mapping reloaded");
        Ok(())
    }
}
