//! Route definitions for the cliplink API
//!
//! This module configures all HTTP routes and maps them to their respective
//! handlers. It creates the Axum router with the application state.

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    create_video, delete_video, list_videos, list_views, publish_video, resolve_code, stats,
    update_short_code,
};

use crate::middleware::auth_middleware;
use axum::middleware;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /v/{code}` - Resolves a short code and redirects (public endpoint)
/// - `GET /api/videos` - Lists videos with pagination
/// - `POST /api/videos` - Registers a new video record
/// - `GET /api/videos/views` - Lists recent visits, newest first
/// - `DELETE /api/videos/{id}` - Deletes a video with its history
/// - `POST /api/videos/{id}/publish` - Publishes a video under a short link
/// - `PATCH /api/videos/{id}/short-code` - Assigns a custom short code
/// - `GET /api/stats` - Public service counters
///
/// The `/api/videos` routes sit behind the shared-secret authorization
/// middleware; `/api/stats` is registered after the layer and stays public,
/// as does the redirect endpoint.
///
/// # Arguments
///
/// * `state` - Application state containing the shared database instance
///
/// # Returns
///
/// Configured Axum Router ready to handle requests
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use cliplink::database::{init_db, AppState};
/// # use cliplink::route::create_app;
/// # let db = init_db("data.db").unwrap();
/// let state = AppState { db: Arc::new(db) };
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    // Owner-facing routes that require the authorization check
    let api_routes = Router::new()
        .route("/videos", get(list_videos).post(create_video))
        .route("/videos/views", get(list_views))
        .route("/videos/{id}", delete(delete_video))
        .route("/videos/{id}/publish", post(publish_video))
        .route("/videos/{id}/short-code", patch(update_short_code))
        .layer(middleware::from_fn(auth_middleware))
        // Registered after the layer so it stays public
        .route("/stats", get(stats));

    Router::new()
        // Public redirect endpoint with view accounting
        .route("/v/{code}", get(resolve_code))
        // Mount API routes under /api
        .nest("/api", api_routes)
        // Inject the application state into all handlers
        .with_state(state)
}
