//! ldapdir command-line management tool.
//!
//! Provides subcommands for generating and validating configuration,
//! inspecting assembled sections, exporting the search manifest and
//! managing the directory cache.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use ldapdir_core::cache::{SectionCache, SqliteCacheStore};
use ldapdir_core::catalog::Catalog;
use ldapdir_core::config::AppConfig;
use ldapdir_core::directory::LdapDirectory;
use ldapdir_core::identity;
use ldapdir_core::manifest::build_manifest;
use ldapdir_core::models::{DirectoryEntry, FieldValue, SectionFilter, SectionResult};
use ldapdir_core::DirectoryAssembler;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ldapdir command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "ldapdir",
    version,
    about = "Inspect and manage an LDAP-backed organizational directory"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "/etc/ldapdir/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file and a sample catalog.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./ldapdir.toml")]
        output: PathBuf,

        /// Output path for the sample section catalog.
        #[arg(long, default_value = "./catalog.toml")]
        catalog: PathBuf,
    },

    /// Validate the configuration and the files it references.
    Validate,

    /// List assembled sections.
    Sections {
        /// Include sections excluded from the directory view.
        #[arg(long)]
        all: bool,

        /// Ignore the cache and query LDAP.
        #[arg(long)]
        refresh: bool,
    },

    /// Show the entries of one section.
    Show {
        /// Section ID.
        id: String,

        /// Ignore the cache and query LDAP.
        #[arg(long)]
        refresh: bool,
    },

    /// Print the search manifest as JSON.
    Manifest {
        /// Ignore the cache and query LDAP.
        #[arg(long)]
        refresh: bool,
    },

    /// Manage the directory cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Drop the cached directory.
    Clear,
    /// Show whether a cached directory exists and how old it is.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output, catalog } => cmd_init(&output, &catalog),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Cache { action } => {
            let config = load_config(&cli.config)?;
            let cache = open_cache(&config)?;
            match action {
                CacheAction::Clear => cmd_cache_clear(&cache),
                CacheAction::Status => cmd_cache_status(&cache),
            }
        }
        Commands::Sections { all, refresh } => {
            let config = load_config(&cli.config)?;
            let assembler = build_assembler(&config)?;
            cmd_sections(&assembler, all, refresh)
        }
        Commands::Show { id, refresh } => {
            let config = load_config(&cli.config)?;
            let assembler = build_assembler(&config)?;
            cmd_show(&assembler, &id, refresh)
        }
        Commands::Manifest { refresh } => {
            let config = load_config(&cli.config)?;
            let assembler = build_assembler(&config)?;
            cmd_manifest(&assembler, refresh)
        }
    }
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration file")
}

fn open_cache(config: &AppConfig) -> Result<SectionCache> {
    let path = config.daemon.cache_db_path();
    let store = SqliteCacheStore::new(&path)
        .with_context(|| format!("failed to open cache database {}", path.display()))?;
    Ok(SectionCache::new(Arc::new(store), &config.directory.locale))
}

fn build_assembler(config: &AppConfig) -> Result<DirectoryAssembler> {
    let cache = open_cache(config)?;
    let catalog =
        Catalog::load(&config.directory.catalog_file).context("failed to load section catalog")?;
    let directory = Arc::new(LdapDirectory::from_config(&config.ldap));
    let profiles =
        identity::resolver_from_config(config).context("failed to load profile mapping")?;
    DirectoryAssembler::from_config(config, directory, cache, catalog, profiles)
        .context("failed to initialize directory assembler")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"# ldapdir configuration

[daemon]
log_level = "info"
data_dir = "/var/lib/ldapdir"
warm_interval_secs = 300

[directory]
title = "Staff Directory"
locale = "en"
catalog_file = "/etc/ldapdir/catalog.toml"
# Seconds between automatic cache invalidations; 0 disables.
invalidate_secs = 86400
link_to_user_page = false

[ldap]
url = "ldap://ldap.example.com"
bind_dn = "cn=reader,dc=example,dc=com"
bind_password_env = "LDAPDIR_BIND_PASSWORD"
base_dn = "ou=people,dc=example,dc=com"
# %s is replaced by the escaped group DN.
filter = "(&(objectClass=person)(memberOf=%s))"
group_base_dn = "ou=groups,dc=example,dc=com"
group_filter = "(&(objectClass=group)(memberOf=%s))"
# puid_attr = "uid"
timeout_secs = 10

[attributes]
name_attr = "displayName"
email_attr = "mail"
title_attr = "title"
phone_attr = "telephoneNumber"
manager_attr = "manager"
reports_attr = "directReports"

[identity]
# mapping_file = "/etc/ldapdir/profiles.toml"

[web]
listen = "127.0.0.1:3080"
"#;

const DEFAULT_CATALOG: &str = r#"# ldapdir section catalog

[[sections]]
id = "it"
label = "Information Technology"
abbrev = "IT"
group_dn = "cn=it,ou=groups,dc=example,dc=com"
depth = 2
weight = 0
header = """
Help Desk, 555-0100
"""

[[tweaks]]
id = "it-director-first"
section_id = "it"
user_dn = "uid=jroe,ou=people,dc=example,dc=com"
absolute_position = 0
"#;

fn write_new_file(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            path.display()
        );
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn cmd_init(output: &Path, catalog: &Path) -> Result<()> {
    write_new_file(output, DEFAULT_CONFIG)?;
    println!("{}", style::success(&format!("Configuration written to {}", output.display())));
    write_new_file(catalog, DEFAULT_CATALOG)?;
    println!("{}", style::success(&format!("Sample catalog written to {}", catalog.display())));

    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your LDAP server details");
    println!("  2. Point directory.catalog_file at {}", catalog.display());
    println!("  3. Set LDAPDIR_BIND_PASSWORD if your server requires a bind");
    println!("  4. Validate with: ldapdir validate --config {}", output.display());
    println!("  5. Start the daemon: ldapdir-daemon --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  {}", style::success("Environment variable references processed"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    let catalog = match Catalog::load(&config.directory.catalog_file) {
        Ok(catalog) => {
            println!(
                "  {}",
                style::success(&format!(
                    "Catalog has {} sections and {} tweaks",
                    catalog.sections().len(),
                    catalog.tweaks().len()
                ))
            );
            Some(catalog)
        }
        Err(e) => {
            println!("  {}", style::error(&format!("Catalog error: {}", e)));
            None
        }
    };

    if config.directory.link_to_user_page {
        match identity::resolver_from_config(&config) {
            Ok(_) => println!("  {}", style::success("Profile mapping loaded")),
            Err(e) => println!("  {}", style::error(&format!("Profile mapping error: {}", e))),
        }
    }

    // Summary
    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  LDAP URL      : {}", config.ldap.url);
    println!(
        "  Bind          : {}",
        config.ldap.bind_dn.as_deref().unwrap_or("anonymous")
    );
    println!(
        "  Bind password : {}",
        if config.ldap.bind_password.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!("  User base DN  : {}", config.ldap.base_dn);
    println!(
        "  Subgroups     : {}",
        if config.ldap.group_filter.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Locale        : {}", config.directory.locale);
    println!("  Invalidate    : {}s", config.directory.invalidate_secs);
    println!("  Web listen    : {}", config.web.listen);

    if catalog.is_none() {
        anyhow::bail!("catalog validation failed");
    }
    Ok(())
}

fn cmd_sections(assembler: &DirectoryAssembler, all: bool, refresh: bool) -> Result<()> {
    let filter = if all {
        SectionFilter::All
    } else {
        SectionFilter::DirectoryOnly
    };
    let directory = assembler.query_all_cached(refresh, filter);

    if directory.sections.is_empty() {
        println!("{}", style::warn("No sections configured."));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Weight", "ID", "Label", "Entries", "Status"]);

    for section in &directory.sections {
        table.add_row(section_row(section));
    }

    println!("{table}");
    println!(
        "{}",
        style::dim(&format!("Generated at {}", directory.generated_at.to_rfc3339()))
    );
    Ok(())
}

fn cmd_show(assembler: &DirectoryAssembler, id: &str, refresh: bool) -> Result<()> {
    let section = assembler
        .query_section_cached(id, refresh)
        .with_context(|| format!("failed to show section '{}'", id))?;

    println!("{}", style::header(&format!("{} ({})", section.label, section.id)));
    if !section.description.is_empty() {
        println!("{}", style::dim(&section.description));
    }
    if section.error {
        println!("{}", style::error("Section could not be resolved from LDAP."));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Title", "Phone", "Email", "Rank"]);
    for entry in &section.body {
        table.add_row(entry_row(entry));
    }
    println!("{table}");
    Ok(())
}

fn cmd_manifest(assembler: &DirectoryAssembler, refresh: bool) -> Result<()> {
    let directory = assembler.query_all_cached(refresh, SectionFilter::DirectoryOnly);
    let manifest = build_manifest(&directory.sections);
    let json = serde_json::to_string_pretty(&manifest).context("failed to encode manifest")?;
    println!("{json}");
    Ok(())
}

fn cmd_cache_clear(cache: &SectionCache) -> Result<()> {
    cache.invalidate().context("failed to clear cache")?;
    println!("{}", style::success("Directory cache cleared."));
    Ok(())
}

fn cmd_cache_status(cache: &SectionCache) -> Result<()> {
    let status = cache.status().context("failed to read cache status")?;

    println!("  Key             {}", status.key);
    match (status.present, status.age(Utc::now())) {
        (true, Some(age)) => {
            println!("  Cached          {}", style::success(&format!("{} sections", status.sections)));
            println!("  Age             {}s", age.num_seconds());
        }
        _ => println!("  Cached          {}", style::dim("no")),
    }
    match status.last_invalidate {
        Some(at) => println!("  Last written    {}", at.to_rfc3339()),
        None => println!("  Last written    {}", style::dim("never")),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

fn display(value: Option<&FieldValue>) -> String {
    value.map(ToString::to_string).unwrap_or_else(|| "-".to_string())
}

fn section_row(section: &SectionResult) -> Vec<Cell> {
    vec![
        Cell::new(section.weight),
        Cell::new(&section.id),
        Cell::new(&section.label),
        Cell::new(section.body.len()),
        Cell::new(style::section_status(section)),
    ]
}

fn entry_row(entry: &DirectoryEntry) -> Vec<String> {
    vec![
        display(entry.name.as_ref()),
        display(entry.title.as_ref()),
        display(entry.phone.as_ref()),
        display(entry.email.as_ref()),
        entry
            .rank
            .map(|rank| rank.to_string())
            .unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_files_are_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("ldapdir.toml");
        let catalog_path = dir.path().join("catalog.toml");
        cmd_init(&config_path, &catalog_path).unwrap();

        let config = AppConfig::load_from_file(&config_path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.daemon.warm_interval_secs, 300);

        let catalog = Catalog::load(&catalog_path).unwrap();
        assert_eq!(catalog.section("it").unwrap().header[0], ["Help Desk", "555-0100"]);
        assert_eq!(catalog.tweaks_for("it").len(), 1);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("ldapdir.toml");
        std::fs::write(&config_path, "keep me").unwrap();
        assert!(cmd_init(&config_path, &dir.path().join("catalog.toml")).is_err());
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "keep me");
    }

    #[test]
    fn test_entry_row() {
        let entry = DirectoryEntry {
            dn: "cn=a".into(),
            name: Some("Alice".into()),
            phone: Some(FieldValue::Multi(vec!["1".into(), "2".into()])),
            rank: Some(-1),
            ..Default::default()
        };
        assert_eq!(entry_row(&entry), ["Alice", "-", "1, 2", "-", "-1"]);
    }

    #[test]
    fn test_cache_commands_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCacheStore::new(dir.path().join("cache.db")).unwrap();
        let cache = SectionCache::new(Arc::new(store), "en");
        cmd_cache_status(&cache).unwrap();
        cmd_cache_clear(&cache).unwrap();
        assert!(!cache.status().unwrap().present);
    }
}
