//! Directory assembly: runs every section through group resolution,
//! formatting and tweaks, and decides between cached and live results.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::attributes::AttributeMap;
use crate::cache::SectionCache;
use crate::catalog::rows::pad_rows;
use crate::catalog::{Catalog, SectionConfig};
use crate::config::AppConfig;
use crate::directory::{DirectoryQuery, GroupResolver, SearchSettings};
use crate::errors::{AssemblyError, ConfigError, IdentityError};
use crate::formatter::EntryFormatter;
use crate::identity::ProfileResolver;
use crate::models::{CachedDirectory, DirectoryEntry, SectionFilter, SectionResult};
use crate::tweaks::TweakEngine;

/// Orchestrates section assembly over injected collaborators.
pub struct DirectoryAssembler {
    directory: Arc<dyn DirectoryQuery>,
    cache: SectionCache,
    catalog: RwLock<Arc<Catalog>>,
    settings: SearchSettings,
    attributes: AttributeMap,
    profiles: Arc<dyn ProfileResolver>,
    /// Mapped attributes plus whatever the profile resolver needs.
    request_attrs: Vec<String>,
}

impl DirectoryAssembler {
    pub fn new(
        directory: Arc<dyn DirectoryQuery>,
        cache: SectionCache,
        catalog: Catalog,
        settings: SearchSettings,
        attributes: AttributeMap,
        profiles: Arc<dyn ProfileResolver>,
    ) -> Self {
        let mut request_attrs = attributes.ldap_attributes();
        for attr in profiles.required_attributes() {
            if !request_attrs.contains(&attr) {
                request_attrs.push(attr);
            }
        }

        Self {
            directory,
            cache,
            catalog: RwLock::new(Arc::new(catalog)),
            settings,
            attributes,
            profiles,
            request_attrs,
        }
    }

    /// Wire an assembler from application configuration.
    ///
    /// Fails when the attribute mapping is incomplete; without it no section
    /// can be resolved at all.
    pub fn from_config(
        config: &AppConfig,
        directory: Arc<dyn DirectoryQuery>,
        cache: SectionCache,
        catalog: Catalog,
        profiles: Arc<dyn ProfileResolver>,
    ) -> Result<Self, ConfigError> {
        let attributes = AttributeMap::from_config(&config.attributes)?;
        let settings = SearchSettings::from_config(&config.ldap);
        Ok(Self::new(
            directory, cache, catalog, settings, attributes, profiles,
        ))
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Arc<Catalog> {
        match self.catalog.read() {
            Ok(catalog) => Arc::clone(&catalog),
            Err(poisoned) => {
                warn!("catalog lock poisoned, recovering");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    /// Swap in a new catalog. This is an administrative change, so the
    /// cache is invalidated immediately.
    pub fn replace_catalog(&self, catalog: Catalog) {
        let sections = catalog.sections().len();
        {
            let mut guard = self
                .catalog
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Arc::new(catalog);
        }
        info!(sections, "catalog replaced");
        self.invalidate_cache();
    }

    /// Re-read the profile mapping and drop the cached directory so new
    /// links show up. A failed reload leaves links and cache untouched.
    pub fn reload_profiles(&self) -> Result<(), IdentityError> {
        self.profiles.reload()?;
        self.invalidate_cache();
        Ok(())
    }

    pub fn cache(&self) -> &SectionCache {
        &self.cache
    }

    /// Drop the cached directory. Failures are logged; the next cached
    /// query simply recomputes.
    pub fn invalidate_cache(&self) {
        if let Err(e) = self.cache.invalidate() {
            warn!(error = %e, "failed to invalidate directory cache");
        }
    }

    /// Apply the interval auto-invalidation policy. Safe to call on every
    /// request.
    pub fn invalidate_if_elapsed(&self, interval_secs: i64) -> bool {
        match self.cache.invalidate_if_elapsed(interval_secs) {
            Ok(invalidated) => invalidated,
            Err(e) => {
                warn!(error = %e, "failed to check cache invalidation interval");
                false
            }
        }
    }

    // -- live queries -------------------------------------------------------

    /// Assemble every section, apply `filter` and order by weight.
    ///
    /// One failing section never aborts the run: it is returned empty with
    /// its `error` flag set.
    pub fn query_all(&self, filter: SectionFilter) -> Vec<SectionResult> {
        let started = Instant::now();
        let catalog = self.catalog();

        let sections: Vec<SectionResult> = catalog
            .sections()
            .iter()
            .map(|section| self.assemble(&catalog, section))
            .collect();

        let failed = sections.iter().filter(|s| s.error).count();
        let mut sections = filter.apply(sections);
        sections.sort_by_key(|section| section.weight);

        info!(
            sections = sections.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "directory assembled"
        );
        sections
    }

    /// Assemble one section, bypassing the cache.
    pub fn query_section(&self, id: &str) -> Result<SectionResult, AssemblyError> {
        let catalog = self.catalog();
        let section = catalog
            .section(id)
            .ok_or_else(|| AssemblyError::SectionNotFound(id.to_string()))?;
        Ok(self.assemble(&catalog, section))
    }

    // -- cached queries -----------------------------------------------------

    /// The full directory, from cache when possible.
    ///
    /// The cache always holds the unfiltered section list; `filter` is
    /// applied to the returned copy only. With `force` the cache is not
    /// read, but the recomputed result is still stored.
    pub fn query_all_cached(&self, force: bool, filter: SectionFilter) -> CachedDirectory {
        if !force {
            match self.cache.get() {
                Ok(Some(bucket)) => {
                    debug!(key = self.cache.key(), "serving directory from cache");
                    return CachedDirectory {
                        generated_at: bucket.created,
                        sections: filter.apply(bucket.payload),
                    };
                }
                Ok(None) => debug!(key = self.cache.key(), "directory cache miss"),
                Err(e) => warn!(error = %e, "directory cache read failed, recomputing"),
            }
        }

        let sections = self.query_all(SectionFilter::All);
        let generated_at = match self.cache.set(sections.clone()) {
            Ok(bucket) => bucket.created,
            Err(e) => {
                warn!(error = %e, "failed to store directory cache");
                Utc::now()
            }
        };

        CachedDirectory {
            generated_at,
            sections: filter.apply(sections),
        }
    }

    /// One section from the most recent cached payload, falling back to a
    /// live (uncached) run when it is absent or `force` is set.
    pub fn query_section_cached(
        &self,
        id: &str,
        force: bool,
    ) -> Result<SectionResult, AssemblyError> {
        if !force {
            match self.cache.get() {
                Ok(Some(bucket)) => {
                    if let Some(section) = bucket.payload.into_iter().find(|s| s.id == id) {
                        debug!(section = id, "serving section from cache");
                        return Ok(section);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "directory cache read failed, recomputing"),
            }
        }
        self.query_section(id)
    }

    // -- pipeline -----------------------------------------------------------

    fn assemble(&self, catalog: &Catalog, section: &SectionConfig) -> SectionResult {
        let started = Instant::now();
        let mut result = SectionResult {
            id: section.id.clone(),
            label: section.label.clone(),
            description: section.description.clone(),
            abbrev: section.abbrev.clone(),
            error: false,
            header: Vec::new(),
            body: Vec::new(),
            footer: Vec::new(),
            weight: section.weight,
            exclude_from_directory: section.exclude_from_directory,
        };

        match self.section_body(catalog, section) {
            Ok(body) => {
                debug!(
                    section = %section.id,
                    entries = body.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "section assembled"
                );
                result.header = pad_rows(&section.header);
                result.body = body;
                result.footer = pad_rows(&section.footer);
            }
            Err(e) => {
                warn!(section = %section.id, group_dn = %section.group_dn, error = %e, "section failed");
                result.error = true;
            }
        }
        result
    }

    fn section_body(
        &self,
        catalog: &Catalog,
        section: &SectionConfig,
    ) -> Result<Vec<DirectoryEntry>, AssemblyError> {
        let resolver =
            GroupResolver::new(self.directory.as_ref(), &self.settings, &self.request_attrs);
        let raw = resolver.resolve(&section.group_dn, section.depth)?;

        let formatter = EntryFormatter::new(&self.attributes, self.profiles.as_ref());
        let entries = formatter.format(raw);

        Ok(TweakEngine::new(catalog.tweaks_for(&section.id)).apply(entries))
    }
}
