//! TOML-based configuration system for ldapdir.
//!
//! Sensitive values (the LDAP bind password) are stored as `_env` fields that
//! reference environment variable names. The actual secrets are resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Token replaced by the escaped group DN in filter formats.
pub const FILTER_TOKEN: &str = "%s";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon / logging settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Directory page and cache behaviour.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// LDAP server connection and search settings.
    pub ldap: LdapConfig,

    /// LDAP attribute names mapped onto directory fields.
    pub attributes: AttributeConfig,

    /// Profile link mapping settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Web API settings.
    #[serde(default)]
    pub web: WebConfig,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for persistent data (the cache database).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds between cache warm-up runs. 0 disables warming.
    #[serde(default = "default_warm_interval")]
    pub warm_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/ldapdir")
}
fn default_warm_interval() -> u64 {
    300
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            warm_interval_secs: default_warm_interval(),
        }
    }
}

impl DaemonConfig {
    /// Location of the SQLite cache database.
    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("ldapdir-cache.db")
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Directory page configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Title shown on directory listing pages.
    #[serde(default = "default_title")]
    pub title: String,

    /// Active locale; cached payloads are scoped per locale.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Path to the TOML file holding sections and tweaks.
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,

    /// Seconds after which the cache is invalidated. `<= 0` never expires.
    #[serde(default)]
    pub invalidate_secs: i64,

    /// Resolve profile page / image links for each entry.
    #[serde(default)]
    pub link_to_user_page: bool,
}

fn default_title() -> String {
    "Directory".into()
}
fn default_locale() -> String {
    "en".into()
}
fn default_catalog_file() -> PathBuf {
    PathBuf::from("/etc/ldapdir/catalog.toml")
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            locale: default_locale(),
            catalog_file: default_catalog_file(),
            invalidate_secs: 0,
            link_to_user_page: false,
        }
    }
}

// ---------------------------------------------------------------------------
// LDAP
// ---------------------------------------------------------------------------

/// LDAP server connection and search settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LdapConfig {
    /// Server URL (e.g. `ldaps://ldap.example.com`).
    #[serde(default)]
    pub url: String,

    /// Bind DN for authenticated queries. Anonymous bind when unset.
    #[serde(default)]
    pub bind_dn: Option<String>,

    /// Environment variable holding the bind password.
    #[serde(default)]
    pub bind_password_env: Option<String>,

    /// Base DN for user searches.
    #[serde(default)]
    pub base_dn: String,

    /// User filter format; `%s` is replaced with the group DN.
    #[serde(default)]
    pub filter: String,

    /// Base DN for subgroup searches.
    #[serde(default)]
    pub group_base_dn: Option<String>,

    /// Subgroup filter format; `%s` is replaced with the parent group DN.
    #[serde(default)]
    pub group_filter: Option<String>,

    /// Persistent unique id attribute used to map entries to profiles.
    #[serde(default)]
    pub puid_attr: Option<String>,

    /// Connection and operation timeout. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Resolved bind password.
    #[serde(skip)]
    pub bind_password: Option<String>,
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// LDAP attribute names for each directory field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttributeConfig {
    /// Display name attribute (required).
    #[serde(default)]
    pub name_attr: String,

    /// Email attribute (required).
    #[serde(default)]
    pub email_attr: String,

    /// Job title attribute (required).
    #[serde(default)]
    pub title_attr: String,

    /// Phone attribute (required).
    #[serde(default)]
    pub phone_attr: String,

    /// Manager DN attribute, enables ranking.
    #[serde(default)]
    pub manager_attr: Option<String>,

    /// Direct reports DN attribute, enables ranking.
    #[serde(default)]
    pub reports_attr: Option<String>,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Profile link mapping configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    /// Path to the TOML profile mapping file.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Web
// ---------------------------------------------------------------------------

/// Web API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address (default `127.0.0.1:3080`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:3080".into()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning but does not fail; the LDAP client
    /// falls back to an anonymous bind without a password.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        if let Some(ref env_name) = self.ldap.bind_password_env {
            self.ldap.bind_password = resolve_optional_env(env_name, "ldap.bind_password_env");
        }

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ldap.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ldap.url".into(),
                detail: "LDAP URL must not be empty".into(),
            });
        }
        if self.ldap.base_dn.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ldap.base_dn".into(),
                detail: "user base DN must not be empty".into(),
            });
        }
        check_filter_format("ldap.filter", &self.ldap.filter)?;
        if let Some(ref group_filter) = self.ldap.group_filter {
            check_filter_format("ldap.group_filter", group_filter)?;
        }
        if self.directory.locale.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "directory.locale".into(),
                detail: "locale must not be empty".into(),
            });
        }
        if self.directory.link_to_user_page && self.ldap.puid_attr.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "ldap.puid_attr".into(),
                detail: "profile linking requires a persistent id attribute".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

fn check_filter_format(field: &str, format: &str) -> Result<(), ConfigError> {
    if format.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "filter format must not be empty".into(),
        });
    }
    if !format.contains(FILTER_TOKEN) {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: format!("filter format must contain the '{}' token", FILTER_TOKEN),
        });
    }
    Ok(())
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
