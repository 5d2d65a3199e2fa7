//! Error types for the ldapdir core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// A required LDAP attribute mapping is unset or empty.
    #[error("attribute '{0}' is not configured")]
    MissingAttribute(String),

    /// A search base DN or filter format needed to query a section is unset.
    #[error("cannot query directory info: '{0}' is not configured")]
    MissingSearchSetting(String),

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Directory (LDAP) errors
// ---------------------------------------------------------------------------

/// Errors raised by the directory query capability.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be reached or the bind was refused.
    #[error("LDAP connection error: {0}")]
    Connection(String),

    /// A search completed with a non-success result or a malformed response.
    #[error("LDAP protocol error: {0}")]
    Protocol(String),
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { .. } => DirectoryError::Protocol(err.to_string()),
            other => DirectoryError::Connection(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

/// Errors from loading the section / tweak catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be found.
    #[error("catalog file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("catalog parse error: {0}")]
    ParseError(String),

    /// Two sections share an id.
    #[error("duplicate section id '{0}'")]
    DuplicateSection(String),

    /// A tweak points at a section that is not defined.
    #[error("tweak '{tweak}' references unknown section '{section}'")]
    UnknownSection {
        tweak: String,
        section: String,
    },

    /// Header or footer text could not be split into rows.
    #[error("invalid {field} rows in section '{section}': {source}")]
    Rows {
        section: String,
        field: &'static str,
        source: RowParseError,
    },

    /// Generic I/O error.
    #[error("catalog I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Error produced while splitting a header/footer line into columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowParseError {
    /// A double-quoted column was never closed, or ends in a bare escape.
    #[error("invalid quoted string on line {line}")]
    UnterminatedQuote { line: usize },
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

/// Errors from the section cache stores.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying rusqlite error.
    #[error("cache database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("cache migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// The stored payload could not be encoded or decoded.
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A stored timestamp could not be parsed.
    #[error("invalid cache timestamp '{0}'")]
    InvalidTimestamp(String),

    /// Generic I/O error (e.g. file permissions).
    #[error("cache I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

/// Errors from the profile identity mapping subsystem.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The mapping file could not be loaded.
    #[error("profile mapping file error at '{path}': {detail}")]
    MappingFileError {
        path: String,
        detail: String,
    },

    /// TOML parse error when reading the mapping file.
    #[error("profile mapping parse error: {0}")]
    ParseError(String),

    /// Generic I/O error.
    #[error("identity I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Assembly errors
// ---------------------------------------------------------------------------

/// Errors from assembling directory sections.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The requested section is not part of the catalog.
    #[error("section '{0}' was not defined")]
    SectionNotFound(String),

    /// Section settings were incomplete.
    #[error("section configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The directory could not be queried.
    #[error("section directory error: {0}")]
    Directory(#[from] DirectoryError),
}
