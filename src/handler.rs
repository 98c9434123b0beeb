//! HTTP request handlers for the cliplink API
//!
//! This module wires the HTTP surface to the storage operations:
//! - Resolving short codes with view accounting (the public redirect)
//! - Registering and listing video metadata
//! - Publishing videos and managing their short codes
//! - The recent-views and stats reports
//!
//! Handlers stay thin: validation and response shaping happen here, every
//! transaction lives in [`crate::database`].

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::env;

use crate::context::VisitContext;
use crate::database::{self, AppState};
use crate::error::AppError;
use crate::model::{
    is_valid_short_code, random_id, CreateVideoRequest, ListParams, OwnerParams, PublishRequest,
    PublishResponse, SetShortCodeRequest, SetShortCodeResponse, VideoRecord, ViewsParams,
    VIDEO_ID_LEN,
};

/// Builds the public short link for a code.
///
/// Uses the `APP_URL` environment variable when set, otherwise falls back to
/// the local listen address derived from `PORT`.
fn short_link(code: &str) -> String {
    let base = env::var("APP_URL").unwrap_or_else(|_| {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        format!("http://localhost:{}", port)
    });
    format!("{}/v/{}", base.trim_end_matches('/'), code)
}

/// Resolves a short code and redirects to its destination
///
/// This is the public endpoint behind every shared link. When a client
/// visits `http://localhost:8080/v/AB12CD`, this handler:
/// 1. Captures the visit context from the request headers
/// 2. Records the visit and increments the video's view counter in one
///    storage transaction
/// 3. Sends a 302 Found response to the destination URL
///
/// # Path Parameters
///
/// - `code` - The public short code, matched case-insensitively
///
/// # Response
///
/// - **302 Found** - `Location` carries the destination URL verbatim
/// - **404 Not Found** - Unknown code, or the video is not published
/// - **500 Internal Server Error** - Storage failure; nothing was recorded
pub async fn resolve_code(
    Path(code): Path<String>,
    State(state): State<AppState>,
    context: VisitContext,
) -> Result<Response, AppError> {
    let destination =
        database::resolve_visit(&state.db, &code, &context)?.ok_or(AppError::NotFound)?;

    Ok((StatusCode::FOUND, [(header::LOCATION, destination)]).into_response())
}

/// Registers a new video record
///
/// The recording blob itself stays with the client; this endpoint stores the
/// metadata and assigns the video id. A fresh video has no short code and no
/// destination until it is published.
///
/// # Request Body
///
/// ```json
/// {
///   "owner_id": "user_123",
///   "title": "Sprint demo",
///   "file_name": "sprint-demo.webm",
///   "file_size": 10485760,
///   "duration": 92.4
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - The stored VideoRecord
/// - **400 Bad Request** - Missing owner, title, or file name
pub async fn create_video(
    State(state): State<AppState>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<Response, AppError> {
    let owner_id = payload.owner_id.trim();
    if owner_id.is_empty() {
        return Err(AppError::Validation("owner_id is required".to_string()));
    }
    // ':' is the separator in the owner index keys.
    if owner_id.contains(':') {
        return Err(AppError::Validation(
            "owner_id must not contain ':'".to_string(),
        ));
    }
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if payload.file_name.trim().is_empty() {
        return Err(AppError::Validation("file_name is required".to_string()));
    }

    let record = VideoRecord {
        id: random_id(VIDEO_ID_LEN),
        owner_id: owner_id.to_string(),
        title: payload.title,
        description: payload.description,
        file_name: payload.file_name,
        file_size: payload.file_size,
        duration: payload.duration,
        destination_url: None,
        short_code: None,
        view_count: 0,
        created_at: Utc::now(),
    };

    database::create_video(&state.db, &record)?;

    Ok((StatusCode::CREATED, Json(record)).into_response())
}

/// Lists videos with pagination and filtering by owner
///
/// # Query Parameters
///
/// - `owner_id` (optional) - Filter videos by this owner, newest first
/// - `page` (optional) - Page number, starts from 1 (default: 1)
/// - `limit` (optional) - Items per page, max 100 (default: 10)
///
/// # Example Request
///
/// `GET /api/videos?owner_id=user_123&page=2&limit=20`
///
/// # Response
///
/// ```json
/// {
///   "page": 2,
///   "limit": 20,
///   "total_fetched": 15,
///   "data": [...]
/// }
/// ```
pub async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).min(100);

    let records = database::list_videos(&state.db, params.owner_id.as_deref(), page, limit)?;

    Ok(Json(json!({
        "page": page,
        "limit": limit,
        "total_fetched": records.len(),
        "data": records
    }))
    .into_response())
}

/// Deletes a video together with its code mapping and visit history
///
/// # Query Parameters
///
/// - `owner_id` (optional) - When provided, the video must belong to this
///   owner; a mismatch reads the same as a missing video
///
/// # Response
///
/// - **200 OK** - Deleted; body reports the number of removed visit rows
/// - **404 Not Found** - No such video (or not this owner's)
pub async fn delete_video(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<OwnerParams>,
) -> Result<Response, AppError> {
    let removed_visits = database::delete_video(&state.db, &id, params.owner_id.as_deref())?
        .ok_or(AppError::NotFound)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Video deleted successfully",
            "deleted_id": id,
            "removed_visits": removed_visits
        })),
    )
        .into_response())
}

/// Publishes a video under a short public link
///
/// Stores the externally hosted destination and ensures the video carries a
/// short code, minting a 6-character one when the owner has not chosen any.
/// Publishing an already-published video returns the existing link unchanged.
///
/// # Request Body
///
/// ```json
/// {
///   "owner_id": "user_123",
///   "destination_url": "https://drive.example.com/file/d/abc/view"
/// }
/// ```
///
/// # Response
///
/// - **200 OK** - Code, short link, destination, and `already_published`
/// - **400 Bad Request** - Missing or non-http(s) destination
/// - **404 Not Found** - No such video (or not this owner's)
pub async fn publish_video(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<PublishRequest>,
) -> Result<Response, AppError> {
    let destination = payload.destination_url.trim();
    if destination.is_empty() {
        return Err(AppError::Validation(
            "destination_url is required".to_string(),
        ));
    }
    if !destination.starts_with("http://") && !destination.starts_with("https://") {
        return Err(AppError::Validation(
            "destination_url must be an http(s) URL".to_string(),
        ));
    }

    let outcome =
        database::publish_video(&state.db, &id, payload.owner_id.as_deref(), destination)?
            .ok_or(AppError::NotFound)?;

    let response = PublishResponse {
        short_link: short_link(&outcome.short_code),
        short_code: outcome.short_code,
        destination_url: outcome.destination_url,
        already_published: outcome.already_published,
    };

    Ok(Json(response).into_response())
}

/// Assigns or replaces a video's custom short code
///
/// The requested code must be 4-10 alphanumeric characters; it is stored
/// and served uppercase. Re-pointing frees the previous code in the same
/// transaction.
///
/// # Response
///
/// - **200 OK** - The stored code and its short link
/// - **400 Bad Request** - Malformed code
/// - **404 Not Found** - No such video (or not this owner's)
/// - **409 Conflict** - Code already belongs to a different video
pub async fn update_short_code(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<SetShortCodeRequest>,
) -> Result<Response, AppError> {
    let requested = payload.short_code.trim();
    if !is_valid_short_code(requested) {
        return Err(AppError::Validation(
            "short code must be 4-10 alphanumeric characters".to_string(),
        ));
    }
    let code = requested.to_ascii_uppercase();

    database::set_short_code(&state.db, &id, payload.owner_id.as_deref(), &code)?
        .ok_or(AppError::NotFound)?;

    let response = SetShortCodeResponse {
        short_link: short_link(&code),
        short_code: code,
    };

    Ok(Json(response).into_response())
}

/// Lists recent visits across the owner's videos (or all videos)
///
/// # Query Parameters
///
/// - `owner_id` (optional) - Restrict to this owner's videos
/// - `limit` (optional) - Maximum entries, max 500 (default: 100)
pub async fn list_views(
    State(state): State<AppState>,
    Query(params): Query<ViewsParams>,
) -> Result<Response, AppError> {
    let limit = params.limit.unwrap_or(100).min(500);

    let views = database::recent_visits(&state.db, params.owner_id.as_deref(), limit)?;

    Ok(Json(json!({ "views": views })).into_response())
}

/// Public service counters for the landing page.
pub async fn stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let summary = database::stats_summary(&state.db)?;
    Ok(Json(summary).into_response())
}
