//! End-to-end tests for directory assembly.
//!
//! These tests wire the real `DirectoryAssembler` with:
//! - an in-memory directory fixture that counts every search
//! - both cache stores (memory and SQLite on disk)
//! - a catalog loaded from TOML
//!
//! No network I/O.

use std::collections::HashSet;
use std::sync::Arc;

use ldapdir_core::attributes::AttributeMap;
use ldapdir_core::cache::{CacheStore, MemoryCacheStore, SectionCache, SqliteCacheStore};
use ldapdir_core::catalog::Catalog;
use ldapdir_core::config::AttributeConfig;
use ldapdir_core::directory::{InMemoryDirectory, SearchSettings};
use ldapdir_core::identity::NoProfiles;
use ldapdir_core::manifest::build_manifest;
use ldapdir_core::models::{RawEntry, SectionFilter, SectionResult};
use ldapdir_core::DirectoryAssembler;

// ===========================================================================
// Fixtures
// ===========================================================================

const CATALOG: &str = r#"
[[sections]]
id = "it"
label = "Information Technology"
group_dn = "cn=it,ou=groups,dc=example,dc=com"
depth = 0
weight = 10
header = "Help Desk, 555-0100"

[[sections]]
id = "exec"
label = "Executive Office"
group_dn = "cn=exec,ou=groups,dc=example,dc=com"
weight = 0

[[sections]]
id = "broken"
label = "Facilities"
group_dn = "cn=broken,ou=groups,dc=example,dc=com"
weight = 5
footer = "Call ext. 9"

[[sections]]
id = "board"
label = "Board"
group_dn = "cn=exec,ou=groups,dc=example,dc=com"
weight = 20
exclude_from_directory = true

[[tweaks]]
id = "hide-contractor"
section_id = "it"
user_dn = "uid=carl,ou=people,dc=example,dc=com"
exclude = true

[[tweaks]]
id = "ceo-title"
section_id = "exec"
user_dn = "uid=erin,ou=people,dc=example,dc=com"
job_title_override = "Chief Executive Officer"
"#;

fn settings() -> SearchSettings {
    SearchSettings {
        base_dn: "ou=people,dc=example,dc=com".into(),
        filter: "(memberOf=%s)".into(),
        group_base_dn: Some("ou=groups,dc=example,dc=com".into()),
        group_filter: Some("(&(objectClass=group)(memberOf=%s))".into()),
    }
}

fn attributes() -> AttributeMap {
    AttributeMap::from_config(&AttributeConfig {
        name_attr: "cn".into(),
        email_attr: "mail".into(),
        title_attr: "title".into(),
        phone_attr: "telephoneNumber".into(),
        manager_attr: Some("manager".into()),
        reports_attr: Some("directReports".into()),
    })
    .unwrap()
}

fn person(uid: &str, name: &str) -> RawEntry {
    RawEntry::new(format!("uid={uid},ou=people,dc=example,dc=com"))
        .with_attr("cn", [name])
        .with_attr("mail", [format!("{uid}@example.com")])
}

fn dn(uid: &str) -> String {
    format!("uid={uid},ou=people,dc=example,dc=com")
}

fn directory() -> Arc<InMemoryDirectory> {
    let it = "cn=it,ou=groups,dc=example,dc=com";
    let ops = "cn=ops,ou=groups,dc=example,dc=com";
    let exec = "cn=exec,ou=groups,dc=example,dc=com";

    Arc::new(
        InMemoryDirectory::new(settings())
            .with_members(
                it,
                vec![
                    person("dana", "Dana").with_attr("directReports", [dn("bob")]),
                    person("bob", "Bob").with_attr("manager", [dn("dana")]),
                    person("carl", "Carl"),
                ],
            )
            .with_subgroups(it, &[ops])
            .with_members(ops, vec![person("bob", "Bob"), person("amy", "Amy")])
            .with_members(exec, vec![person("erin", "Erin")])
            .with_failing_group("cn=broken,ou=groups,dc=example,dc=com"),
    )
}

fn assembler(directory: Arc<InMemoryDirectory>, store: Arc<dyn CacheStore>) -> DirectoryAssembler {
    DirectoryAssembler::new(
        directory,
        SectionCache::new(store, "en"),
        Catalog::from_toml_str(CATALOG).unwrap(),
        settings(),
        attributes(),
        Arc::new(NoProfiles),
    )
}

fn ids(sections: &[SectionResult]) -> Vec<&str> {
    sections.iter().map(|s| s.id.as_str()).collect()
}

fn find<'a>(sections: &'a [SectionResult], id: &str) -> &'a SectionResult {
    sections.iter().find(|s| s.id == id).unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_full_directory_assembly() {
    let assembler = assembler(directory(), Arc::new(MemoryCacheStore::new()));
    let sections = assembler.query_all(SectionFilter::All);

    assert_eq!(ids(&sections), ["exec", "broken", "it", "board"]);

    let it = find(&sections, "it");
    assert!(!it.error);
    let names: Vec<_> = it.body.iter().map(|e| e.sort_name()).collect();
    // Dana manages Bob: promoted / demoted. Carl is excluded by a tweak and
    // Bob's second occurrence from the subgroup is dropped.
    assert_eq!(names, ["Dana", "Amy", "Bob"]);
    assert_eq!(it.body[0].rank, Some(1));
    assert_eq!(it.body[2].rank, Some(-1));
    assert_eq!(
        it.header,
        vec![vec![Some("Help Desk".to_string()), Some("555-0100".to_string())]]
    );

    let exec = find(&sections, "exec");
    assert_eq!(
        exec.body[0].title.as_ref().map(|t| t.first()),
        Some("Chief Executive Officer")
    );
    // Tweaks are scoped to their section.
    let board = find(&sections, "board");
    assert_eq!(board.body[0].title, None);
}

#[test]
fn test_section_bodies_have_unique_dns() {
    let assembler = assembler(directory(), Arc::new(MemoryCacheStore::new()));
    for section in assembler.query_all(SectionFilter::All) {
        let unique: HashSet<_> = section.body.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(unique.len(), section.body.len(), "section {}", section.id);
    }
}

#[test]
fn test_failing_section_is_isolated() {
    let assembler = assembler(directory(), Arc::new(MemoryCacheStore::new()));
    let sections = assembler.query_all(SectionFilter::All);

    let broken = find(&sections, "broken");
    assert!(broken.error);
    assert!(broken.header.is_empty());
    assert!(broken.body.is_empty());
    assert!(broken.footer.is_empty());

    assert!(sections.iter().filter(|s| s.id != "broken").all(|s| !s.error));
    assert!(!find(&sections, "it").body.is_empty());
}

#[test]
fn test_directory_filter_hides_excluded_sections() {
    let assembler = assembler(directory(), Arc::new(MemoryCacheStore::new()));
    let visible = assembler.query_all(SectionFilter::DirectoryOnly);
    assert_eq!(ids(&visible), ["exec", "broken", "it"]);
}

#[test]
fn test_cache_round_trip_issues_no_queries() {
    let directory = directory();
    let assembler = assembler(directory.clone(), Arc::new(MemoryCacheStore::new()));

    let first = assembler.query_all_cached(false, SectionFilter::All);
    let calls = directory.call_count();
    assert!(calls > 0);

    let second = assembler.query_all_cached(false, SectionFilter::All);
    assert_eq!(directory.call_count(), calls);
    assert_eq!(
        serde_json::to_vec(&second).unwrap(),
        serde_json::to_vec(&first).unwrap()
    );
}

#[test]
fn test_cache_holds_unfiltered_sections() {
    let directory = directory();
    let assembler = assembler(directory.clone(), Arc::new(MemoryCacheStore::new()));

    let visible = assembler.query_all_cached(false, SectionFilter::DirectoryOnly);
    assert_eq!(visible.sections.len(), 3);

    let calls = directory.call_count();
    let all = assembler.query_all_cached(false, SectionFilter::All);
    assert_eq!(all.sections.len(), 4);
    assert_eq!(directory.call_count(), calls);
    assert_eq!(assembler.cache().get().unwrap().unwrap().payload.len(), 4);
}

#[test]
fn test_forced_query_recomputes() {
    let directory = directory();
    let assembler = assembler(directory.clone(), Arc::new(MemoryCacheStore::new()));

    assembler.query_all_cached(false, SectionFilter::All);
    let calls = directory.call_count();
    assembler.query_all_cached(true, SectionFilter::All);
    assert!(directory.call_count() > calls);
}

#[test]
fn test_section_lookup_prefers_cache() {
    let directory = directory();
    let assembler = assembler(directory.clone(), Arc::new(MemoryCacheStore::new()));

    // Nothing cached yet: live run, not stored.
    let it = assembler.query_section_cached("it", false).unwrap();
    assert_eq!(it.body.len(), 3);
    assert!(assembler.cache().get().unwrap().is_none());

    assembler.query_all_cached(false, SectionFilter::All);
    let calls = directory.call_count();
    let cached = assembler.query_section_cached("it", false).unwrap();
    assert_eq!(cached, it);
    assert_eq!(directory.call_count(), calls);

    assembler.query_section_cached("it", true).unwrap();
    assert!(directory.call_count() > calls);
}

#[test]
fn test_sqlite_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let first = {
        let store = Arc::new(SqliteCacheStore::new(&path).unwrap());
        assembler(directory(), store).query_all_cached(false, SectionFilter::All)
    };

    let directory = directory();
    let store = Arc::new(SqliteCacheStore::new(&path).unwrap());
    let assembler = assembler(directory.clone(), store);
    let second = assembler.query_all_cached(false, SectionFilter::All);

    assert_eq!(directory.call_count(), 0);
    assert_eq!(second.sections, first.sections);
    assert_eq!(
        second.generated_at.timestamp_micros(),
        first.generated_at.timestamp_micros()
    );
}

#[test]
fn test_manifest_from_directory_view() {
    let assembler = assembler(directory(), Arc::new(MemoryCacheStore::new()));
    let sections = assembler.query_all(SectionFilter::DirectoryOnly);
    let manifest = build_manifest(&sections);

    // exec: Erin, broken: none, it: Dana, Amy, Bob.
    assert_eq!(manifest.len(), 4);
    assert_eq!(manifest[0].d, "Executive Office");
    assert_eq!(
        manifest[1].e.as_ref().map(|e| e.first()),
        Some("dana@example.com")
    );
}
