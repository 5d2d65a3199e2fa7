//! ldapdir core library.
//!
//! Builds an organizational directory from LDAP group membership: sections
//! are expanded through nested groups, formatted and ranked, adjusted by
//! curated tweaks and cached per locale.

pub mod assembler;
pub mod attributes;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod errors;
pub mod formatter;
pub mod identity;
pub mod manifest;
pub mod models;
pub mod tweaks;

// Re-exports for convenience.
pub use assembler::DirectoryAssembler;
pub use cache::{SectionCache, SqliteCacheStore};
pub use catalog::Catalog;
pub use config::AppConfig;
pub use directory::LdapDirectory;
pub use models::{CachedDirectory, SectionFilter, SectionResult};
