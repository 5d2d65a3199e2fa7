//! Directory read endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ldapdir_core::errors::AssemblyError;
use ldapdir_core::manifest::{build_manifest, ManifestRow};
use ldapdir_core::models::{SectionFilter, SectionResult};

use crate::api::status::{blocking, AppError};
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct DirectoryParams {
    /// Include sections flagged `exclude_from_directory`.
    #[serde(default)]
    pub all: bool,
}

#[derive(Serialize)]
struct DirectoryResponse {
    generated_at: DateTime<Utc>,
    title: String,
    sections: Vec<SectionResult>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/directory", get(get_directory))
        .route("/api/directory/manifest", get(get_manifest))
        .route("/api/sections/:id", get(get_section))
}

async fn get_directory(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DirectoryParams>,
) -> Result<Json<DirectoryResponse>, AppError> {
    let filter = if params.all {
        SectionFilter::All
    } else {
        SectionFilter::DirectoryOnly
    };
    let interval = state.config.directory.invalidate_secs;
    let assembler = state.assembler.clone();

    let directory = blocking(move || {
        assembler.invalidate_if_elapsed(interval);
        assembler.query_all_cached(false, filter)
    })
    .await?;

    Ok(Json(DirectoryResponse {
        generated_at: directory.generated_at,
        title: state.config.directory.title.clone(),
        sections: directory.sections,
    }))
}

async fn get_manifest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ManifestRow>>, AppError> {
    let interval = state.config.directory.invalidate_secs;
    let assembler = state.assembler.clone();

    let directory = blocking(move || {
        assembler.invalidate_if_elapsed(interval);
        assembler.query_all_cached(false, SectionFilter::DirectoryOnly)
    })
    .await?;

    Ok(Json(build_manifest(&directory.sections)))
}

async fn get_section(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SectionResult>, AppError> {
    let interval = state.config.directory.invalidate_secs;
    let assembler = state.assembler.clone();

    let section = blocking(move || {
        assembler.invalidate_if_elapsed(interval);
        assembler.query_section_cached(&id, false)
    })
    .await?;

    match section {
        Ok(section) => Ok(Json(section)),
        Err(e @ AssemblyError::SectionNotFound(_)) => Err(AppError::NotFound(e.to_string())),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}
