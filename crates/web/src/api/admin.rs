//! Administrative endpoints: cache control and catalog/profile reload.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use ldapdir_core::cache::CacheStatus;
use ldapdir_core::catalog::Catalog;
use ldapdir_core::errors::IdentityError;

use crate::api::status::{blocking, AppError};
use crate::AppState;

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ReloadResponse {
    ok: bool,
    sections: usize,
    tweaks: usize,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cache/clear", post(clear_cache))
        .route("/api/cache/status", get(cache_status))
        .route("/api/catalog/reload", post(reload_catalog))
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, AppError> {
    let assembler = state.assembler.clone();
    blocking(move || assembler.cache().invalidate())
        .await?
        .map_err(|e| AppError::Internal(format!("failed to clear cache: {}", e)))?;

    info!("directory cache cleared via API");
    Ok(Json(OkResponse { ok: true }))
}

async fn cache_status(State(state): State<Arc<AppState>>) -> Result<Json<CacheStatus>, AppError> {
    let assembler = state.assembler.clone();
    let status = blocking(move || assembler.cache().status())
        .await?
        .map_err(|e| AppError::Internal(format!("failed to read cache status: {}", e)))?;
    Ok(Json(status))
}

async fn reload_catalog(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, AppError> {
    let path = state.config.directory.catalog_file.clone();
    let catalog = blocking(move || Catalog::load(path)).await?.map_err(|e| {
        warn!(error = %e, "catalog reload rejected");
        AppError::BadRequest(format!("failed to reload catalog: {}", e))
    })?;

    let response = ReloadResponse {
        ok: true,
        sections: catalog.sections().len(),
        tweaks: catalog.tweaks().len(),
    };

    // Profile links come from a file too; both are picked up together.
    let assembler = state.assembler.clone();
    blocking(move || {
        assembler.reload_profiles()?;
        assembler.replace_catalog(catalog);
        Ok::<(), IdentityError>(())
    })
    .await?
    .map_err(|e| {
        warn!(error = %e, "profile mapping reload rejected");
        AppError::BadRequest(format!("failed to reload profile mapping: {}", e))
    })?;

    Ok(Json(response))
}
