//! ldapdir web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Health endpoint
//! - The assembled directory, single sections and the search manifest
//! - Administrative cache and catalog endpoints

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ldapdir_core::config::AppConfig;
use ldapdir_core::DirectoryAssembler;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub assembler: Arc<DirectoryAssembler>,
    pub config: AppConfig,
}

/// Build the API router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(api::status::routes())
        .merge(api::directory::routes())
        .merge(api::admin::routes())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: AppConfig, assembler: Arc<DirectoryAssembler>) -> Self {
        Self {
            state: Arc::new(AppState { assembler, config }),
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = router(self.state);

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use ldapdir_core::attributes::AttributeMap;
    use ldapdir_core::cache::{MemoryCacheStore, SectionCache};
    use ldapdir_core::catalog::Catalog;
    use ldapdir_core::directory::{InMemoryDirectory, SearchSettings};
    use ldapdir_core::identity::{MappingFileResolver, NoProfiles, ProfileResolver};
    use ldapdir_core::models::RawEntry;

    const CATALOG: &str = r#"
[[sections]]
id = "it"
label = "IT"
group_dn = "cn=it"
weight = 1

[[sections]]
id = "hidden"
label = "Hidden"
group_dn = "cn=it"
weight = 2
exclude_from_directory = true
"#;

    fn config(catalog_file: &std::path::Path) -> AppConfig {
        let text = format!(
            r#"
[directory]
title = "Staff"
catalog_file = "{}"

[ldap]
url = "ldap://localhost"
base_dn = "ou=people"
filter = "(memberOf=%s)"

[attributes]
name_attr = "cn"
email_attr = "mail"
title_attr = "title"
phone_attr = "phone"
"#,
            catalog_file.display()
        );
        toml::from_str(&text).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        catalog_file: std::path::PathBuf,
        directory: Arc<InMemoryDirectory>,
        state: Arc<AppState>,
    }

    fn fixture() -> Fixture {
        fixture_with(|_| Arc::new(NoProfiles))
    }

    fn fixture_with(profiles: impl FnOnce(&std::path::Path) -> Arc<dyn ProfileResolver>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let catalog_file = dir.path().join("catalog.toml");
        std::fs::write(&catalog_file, CATALOG).unwrap();
        let config = config(&catalog_file);
        let profiles = profiles(dir.path());

        let settings = SearchSettings::from_config(&config.ldap);
        let directory = Arc::new(InMemoryDirectory::new(settings.clone()).with_members(
            "cn=it",
            vec![RawEntry::new("cn=amy")
                .with_attr("cn", ["Amy"])
                .with_attr("mail", ["amy@example.com"])
                .with_attr("uid", ["amy"])],
        ));
        let assembler = DirectoryAssembler::new(
            directory.clone(),
            SectionCache::new(Arc::new(MemoryCacheStore::new()), "en"),
            Catalog::load(&catalog_file).unwrap(),
            settings,
            AttributeMap::from_config(&config.attributes).unwrap(),
            profiles,
        );

        Fixture {
            _dir: dir,
            catalog_file,
            directory,
            state: Arc::new(AppState {
                assembler: Arc::new(assembler),
                config,
            }),
        }
    }

    async fn send(state: &Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let fx = fixture();
        let (status, body) = send(&fx.state, "GET", "/api/status/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_directory_filters_excluded_sections() {
        let fx = fixture();
        let (status, body) = send(&fx.state, "GET", "/api/directory").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Staff");
        assert_eq!(body["sections"].as_array().unwrap().len(), 1);
        assert_eq!(body["sections"][0]["body"][0]["emailLink"], "mailto:amy@example.com");

        let calls = fx.directory.call_count();
        let (_, all) = send(&fx.state, "GET", "/api/directory?all=true").await;
        assert_eq!(all["sections"].as_array().unwrap().len(), 2);
        assert_eq!(fx.directory.call_count(), calls);
    }

    #[tokio::test]
    async fn test_manifest() {
        let fx = fixture();
        let (status, body) = send(&fx.state, "GET", "/api/directory/manifest").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["n"], "Amy");
        assert_eq!(rows[0]["d"], "IT");
    }

    #[tokio::test]
    async fn test_section_lookup() {
        let fx = fixture();
        let (status, body) = send(&fx.state, "GET", "/api/sections/hidden").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "hidden");

        let (status, body) = send(&fx.state, "GET", "/api/sections/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_cache_clear_forces_recompute() {
        let fx = fixture();
        send(&fx.state, "GET", "/api/directory").await;
        let calls = fx.directory.call_count();

        let (status, body) = send(&fx.state, "POST", "/api/cache/clear").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, status_body) = send(&fx.state, "GET", "/api/cache/status").await;
        assert_eq!(status_body["present"], false);

        send(&fx.state, "GET", "/api/directory").await;
        assert!(fx.directory.call_count() > calls);
    }

    #[tokio::test]
    async fn test_catalog_reload() {
        let fx = fixture();
        send(&fx.state, "GET", "/api/directory").await;

        std::fs::write(
            &fx.catalog_file,
            format!("{CATALOG}\n[[sections]]\nid = \"new\"\nlabel = \"New\"\ngroup_dn = \"cn=new\"\n"),
        )
        .unwrap();
        let (status, body) = send(&fx.state, "POST", "/api/catalog/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sections"], 3);

        let (_, directory) = send(&fx.state, "GET", "/api/directory").await;
        assert_eq!(directory["sections"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_reload_error_keeps_old_catalog() {
        let fx = fixture();
        std::fs::write(&fx.catalog_file, "[[sections]]\nid = 1").unwrap();
        let (status, _) = send(&fx.state, "POST", "/api/catalog/reload").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fx.state.assembler.catalog().sections().len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_reload_picks_up_profile_links() {
        let fx = fixture_with(|dir| {
            let path = dir.join("profiles.toml");
            std::fs::write(&path, "[profiles.amy]\npage = \"/user/1\"\n").unwrap();
            Arc::new(MappingFileResolver::new(path, "uid").unwrap())
        });
        let (_, before) = send(&fx.state, "GET", "/api/sections/it").await;
        assert_eq!(before["body"][0]["userPageLink"], "/user/1");

        let mapping = fx.catalog_file.with_file_name("profiles.toml");
        std::fs::write(&mapping, "[profiles.amy]\npage = \"/user/9\"\n").unwrap();
        let (status, _) = send(&fx.state, "POST", "/api/catalog/reload").await;
        assert_eq!(status, StatusCode::OK);

        let (_, after) = send(&fx.state, "GET", "/api/directory").await;
        assert_eq!(after["sections"][0]["body"][0]["userPageLink"], "/user/9");

        std::fs::write(&mapping, "not toml [").unwrap();
        let (status, body) = send(&fx.state, "POST", "/api/catalog/reload").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("profile mapping"));
    }
}
