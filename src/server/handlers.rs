use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::PoisonError;
use tracing::{debug, error, info, warn};

use super::state::AppState;
use crate::constants::THUMBNAIL_SIZE;
use crate::image_processing::create_thumbnail;
use crate::processing::{list_images, ImageEntry};
use crate::tagger::{OutputTarget, TagOutcome};
use crate::utils::{list_directories, DirectoryListing};

#[derive(RustEmbed)]
#[folder = "frontend/"]
struct Asset;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    pub folder: String,
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    pub folder: String,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub folder: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub filename: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub message: String,
}

impl TagResponse {
    fn error(filename: String, message: impl Into<String>) -> Self {
        TagResponse {
            filename,
            status: "error",
            output: None,
            message: message.into(),
        }
    }

    fn from_outcome(filename: String, outcome: &TagOutcome) -> Self {
        let message = match outcome {
            TagOutcome::Success(_) => "Tagged".to_string(),
            TagOutcome::Skipped(reason) => reason.to_string(),
            TagOutcome::Failed(kind, detail) => format!("{}: {}", kind, detail),
        };
        TagResponse {
            filename,
            status: outcome.status(),
            output: outcome.output().map(|p| p.to_string_lossy().to_string()),
            message,
        }
    }
}

/// Joins a client supplied relative name onto `folder`, refusing anything
/// that would leave it.
fn resolve_in_folder(folder: &str, filename: &str) -> Option<PathBuf> {
    let relative = Path::new(filename);
    if filename.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(Path::new(folder).join(relative))
}

fn remember_folder(state: &AppState, folder: &Path) {
    let mut settings = state.settings.lock().unwrap_or_else(PoisonError::into_inner);
    if settings.last_folder.as_deref() == folder.to_str() {
        return;
    }
    settings.update_last_folder(folder);
    if let Some(path) = &state.config_path {
        if let Err(e) = settings.save_to(path) {
            warn!("Failed to save settings: {:#}", e);
        }
    }
}

// GET /api/browse?path=
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<DirectoryListing>, StatusCode> {
    let dir = match query.path.filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => {
            let settings = state.settings.lock().unwrap_or_else(PoisonError::into_inner);
            settings
                .last_folder
                .clone()
                .map(PathBuf::from)
                .filter(|p| p.is_dir())
                .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("/"))
        }
    };

    if !dir.is_dir() {
        return Err(StatusCode::NOT_FOUND);
    }

    list_directories(&dir).map(Json).map_err(|e| {
        warn!("Cannot list {}: {}", dir.display(), e);
        StatusCode::FORBIDDEN
    })
}

// GET /api/images?folder=
pub async fn images(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<Vec<ImageEntry>>, StatusCode> {
    let folder = PathBuf::from(&query.folder);
    if !folder.is_dir() {
        return Err(StatusCode::NOT_FOUND);
    }
    remember_folder(&state, &folder);

    let tagger = state.tagger.clone();
    let entries = tokio::task::spawn_blocking(move || list_images(&tagger, &folder))
        .await
        .map_err(|e| {
            error!("Task join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("Listing failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(entries))
}

// GET /api/thumbnail/*filename?folder=&size=
pub async fn thumbnail(
    AxumPath(filename): AxumPath<String>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Response, StatusCode> {
    let path = resolve_in_folder(&query.folder, &filename).ok_or(StatusCode::BAD_REQUEST)?;
    if !path.is_file() {
        return Err(StatusCode::NOT_FOUND);
    }
    let size = query.size.unwrap_or(THUMBNAIL_SIZE);

    let jpeg_data = tokio::task::spawn_blocking(move || create_thumbnail(&path, size))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            debug!("Failed to create thumbnail for {}: {:#}", filename, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        jpeg_data,
    )
        .into_response())
}

// POST /api/tag {folder, filename}
pub async fn tag_image(
    State(state): State<AppState>,
    Json(request): Json<TagRequest>,
) -> (StatusCode, Json<TagResponse>) {
    let TagRequest { folder, filename } = request;

    let Some(path) = resolve_in_folder(&folder, &filename) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(TagResponse::error(filename, "Invalid file name")),
        );
    };
    if !path.is_file() {
        return (
            StatusCode::NOT_FOUND,
            Json(TagResponse::error(filename, "File not found")),
        );
    }

    let tagger = state.tagger.clone();
    let outcome = match tokio::task::spawn_blocking(move || tagger.tag(&path, &OutputTarget::Auto)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Tagging task for {} failed: {}", filename, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TagResponse::error(filename, "Tagging task failed")),
            );
        }
    };

    info!("{}: {}", filename, outcome);
    let status = if outcome.is_failed() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(TagResponse::from_outcome(filename, &outcome)))
}

fn embedded(name: &str, content_type: &'static str) -> Response {
    match Asset::get(name) {
        Some(file) => ([(header::CONTENT_TYPE, content_type)], file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn index_html() -> Response {
    match Asset::get("index.html") {
        Some(file) => Html(file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn style_css() -> Response {
    embedded("style.css", "text/css")
}

pub async fn script_js() -> Response {
    embedded("script.js", "application/javascript")
}
