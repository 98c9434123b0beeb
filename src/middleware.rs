use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::env;

/// Shared-secret check for the owner-facing API
///
/// When the `AUTHORIZATION` environment variable is set and non-empty, every
/// request must carry an `Authorization` header with the matching value.
/// When it is unset the check is skipped entirely: accounts and sessions
/// live outside this service, so deployments front it with their own auth
/// layer and pass the resolved owner id along.
pub async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if let Ok(auth_secret) = env::var("AUTHORIZATION") {
        if !auth_secret.is_empty() {
            let unauthorized_response = || {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "Unauthorized",
                        "message": "Invalid or missing authorization header"
                    })),
                )
                    .into_response()
            };

            match headers.get("Authorization").map(|value| value.to_str()) {
                Some(Ok(header_str)) if header_str == auth_secret => {}
                _ => return Err(unauthorized_response()),
            }
        }
    }

    Ok(next.run(request).await)
}
