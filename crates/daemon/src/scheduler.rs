//! Cache warming scheduler.
//!
//! Periodically applies the auto-invalidation policy and re-populates the
//! directory cache so visitors rarely pay for a live LDAP assembly. If a
//! warm-up is still running when the next tick fires, that tick is skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time;
use tracing::{error, info, warn};

use ldapdir_core::models::SectionFilter;
use ldapdir_core::DirectoryAssembler;

/// Aggregate statistics across warm-up cycles.
pub struct SchedulerStats {
    pub total_cycles: AtomicU64,
    pub skipped_cycles: AtomicU64,
    pub failed_sections: AtomicU64,
}

impl SchedulerStats {
    fn new() -> Self {
        Self {
            total_cycles: AtomicU64::new(0),
            skipped_cycles: AtomicU64::new(0),
            failed_sections: AtomicU64::new(0),
        }
    }
}

/// The warm-up scheduler.
pub struct Scheduler {
    assembler: Arc<DirectoryAssembler>,
    warm_interval: Duration,
    invalidate_secs: i64,
    running: Arc<AtomicBool>,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub fn new(
        assembler: Arc<DirectoryAssembler>,
        warm_interval: Duration,
        invalidate_secs: i64,
    ) -> Self {
        Self {
            assembler,
            warm_interval,
            invalidate_secs,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SchedulerStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    /// Run until `shutdown` is notified. The first warm-up happens
    /// immediately so the cache is populated right after startup.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!(
            warm_interval_secs = self.warm_interval.as_secs(),
            "scheduler started"
        );

        let mut interval = time::interval(self.warm_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        // Created once so a shutdown during a warm-up is not missed.
        let stopped = shutdown.notified();
        tokio::pin!(stopped);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.maybe_warm("scheduled").await;
                }
                _ = &mut stopped => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Warm the cache unless a previous warm-up is still in progress.
    /// Returns whether a warm-up ran.
    pub async fn maybe_warm(&self, trigger: &str) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.stats.skipped_cycles.fetch_add(1, Ordering::SeqCst);
            warn!(trigger, "skipping warm-up: previous warm-up still running");
            return false;
        }

        let cycle = self.stats.total_cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let assembler = self.assembler.clone();
        let invalidate_secs = self.invalidate_secs;
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let invalidated = assembler.invalidate_if_elapsed(invalidate_secs);
            let directory = assembler.query_all_cached(false, SectionFilter::All);
            (invalidated, directory)
        })
        .await;

        match result {
            Ok((invalidated, directory)) => {
                let failed = directory.sections.iter().filter(|s| s.error).count();
                self.stats
                    .failed_sections
                    .fetch_add(failed as u64, Ordering::SeqCst);
                info!(
                    cycle,
                    trigger,
                    invalidated,
                    sections = directory.sections.len(),
                    failed,
                    generated_at = %directory.generated_at,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "cache warm-up completed"
                );
            }
            Err(e) => {
                error!(cycle, error = %e, "cache warm-up task failed");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ldapdir_core::attributes::AttributeMap;
    use ldapdir_core::cache::{MemoryCacheStore, SectionCache};
    use ldapdir_core::catalog::{Catalog, SectionConfig};
    use ldapdir_core::config::AttributeConfig;
    use ldapdir_core::directory::{InMemoryDirectory, SearchSettings};
    use ldapdir_core::identity::NoProfiles;
    use ldapdir_core::models::RawEntry;

    fn scheduler(directory: Arc<InMemoryDirectory>, settings: SearchSettings) -> Scheduler {
        let catalog = Catalog::new(vec![SectionConfig::new("it", "IT", "cn=it")], vec![]).unwrap();
        let attributes = AttributeMap::from_config(&AttributeConfig {
            name_attr: "cn".into(),
            email_attr: "mail".into(),
            title_attr: "title".into(),
            phone_attr: "phone".into(),
            ..Default::default()
        })
        .unwrap();
        let assembler = DirectoryAssembler::new(
            directory,
            SectionCache::new(Arc::new(MemoryCacheStore::new()), "en"),
            catalog,
            settings,
            attributes,
            Arc::new(NoProfiles),
        );
        Scheduler::new(Arc::new(assembler), Duration::from_secs(60), 0)
    }

    fn settings() -> SearchSettings {
        SearchSettings {
            base_dn: "ou=people".into(),
            filter: "(memberOf=%s)".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_warm_populates_cache_once() {
        let directory = Arc::new(
            InMemoryDirectory::new(settings())
                .with_members("cn=it", vec![RawEntry::new("cn=a").with_attr("cn", ["A"])]),
        );
        let scheduler = scheduler(directory.clone(), settings());

        assert!(scheduler.maybe_warm("test").await);
        assert_eq!(directory.call_count(), 1);
        assert!(scheduler.assembler.cache().get().unwrap().is_some());

        // Cache is warm and auto-invalidation is disabled: no new queries.
        assert!(scheduler.maybe_warm("test").await);
        assert_eq!(directory.call_count(), 1);
        assert_eq!(scheduler.stats().total_cycles.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_skips_while_running() {
        let directory = Arc::new(InMemoryDirectory::new(settings()));
        let scheduler = scheduler(directory.clone(), settings());

        scheduler.running.store(true, Ordering::SeqCst);
        assert!(!scheduler.maybe_warm("test").await);
        assert_eq!(directory.call_count(), 0);
        assert_eq!(scheduler.stats().skipped_cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let directory = Arc::new(InMemoryDirectory::new(settings()));
        let scheduler = Arc::new(scheduler(directory, settings()));
        let shutdown = Arc::new(Notify::new());

        let task = {
            let scheduler = scheduler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        // Wait for the immediate first warm-up before signalling.
        while scheduler.stats().total_cycles.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        shutdown.notify_one();
        time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
