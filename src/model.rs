//! Data models for the cliplink backend
//!
//! This module defines all data structures used throughout the application,
//! including request/response models, database record structures, and the
//! identifier helpers shared by handlers and storage.

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

/// Length of a generated video identifier.
pub const VIDEO_ID_LEN: usize = 12;

/// Length of a generated visit identifier.
pub const VISIT_ID_LEN: usize = 10;

/// Length of an auto-generated short code (publish without a chosen code).
pub const GENERATED_CODE_LEN: usize = 6;

/// Allowed length range for an owner-chosen short code.
pub const SHORT_CODE_MIN: usize = 4;
pub const SHORT_CODE_MAX: usize = 10;

/// Represents a video record stored in the database
///
/// This structure carries the upload metadata together with the sharing
/// state: once published, `destination_url` holds the playback location and
/// `short_code` the public code under `/v/{code}`. `view_count` counts the
/// recorded visits for this video.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VideoRecord {
    /// Unique identifier for this video (12 random alphanumerics)
    pub id: String,

    /// Opaque identifier of the owner, used for filtering and authorization
    pub owner_id: String,

    /// Display title of the recording
    pub title: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Original file name of the upload
    pub file_name: String,

    /// File size in bytes, if known
    pub file_size: Option<u64>,

    /// Recording duration in seconds, if known
    pub duration: Option<f64>,

    /// Playback destination the short link redirects to
    /// `None` until the video has been published
    pub destination_url: Option<String>,

    /// Public short code in its stored (uppercase) form
    /// `None` until published or assigned via the short-code endpoint
    pub short_code: Option<String>,

    /// Number of recorded visits to the short link
    /// Defaults to 0 if not present during deserialization
    #[serde(default)]
    pub view_count: u64,

    /// Timestamp when this video record was created
    pub created_at: DateTime<Utc>,
}

/// A single recorded visit to a short link.
///
/// One row is written per successful resolution, in the same transaction
/// that increments the owning video's `view_count`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VisitRecord {
    /// Unique identifier for this visit (10 random alphanumerics)
    pub id: String,

    /// Identifier of the video that was visited
    pub video_id: String,

    /// Client address taken from forwarding headers, `"unknown"` when absent
    pub ip_address: String,

    /// Raw `User-Agent` header, if present
    pub user_agent: Option<String>,

    /// Raw `Referer` header, if present
    pub referer: Option<String>,

    /// Timestamp when the visit was recorded
    pub created_at: DateTime<Utc>,
}

/// Request payload for registering a new video
///
/// # Example
/// ```json
/// {
///   "owner_id": "user_123",
///   "title": "Sprint demo",
///   "file_name": "sprint-demo.webm",
///   "file_size": 10485760,
///   "duration": 92.4
/// }
/// ```
#[derive(Deserialize)]
pub struct CreateVideoRequest {
    /// Owner of the new video; must be non-empty
    pub owner_id: String,

    /// Display title; must be non-empty
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Original file name; must be non-empty
    pub file_name: String,

    /// File size in bytes
    pub file_size: Option<u64>,

    /// Duration in seconds
    pub duration: Option<f64>,
}

/// Query parameters for listing videos with pagination
///
/// # Example
/// Query string: `?owner_id=user_123&page=2&limit=20`
#[derive(Deserialize)]
pub struct ListParams {
    /// Optional owner filter; without it, all videos are listed
    pub owner_id: Option<String>,

    /// Page number for pagination (starts from 1)
    /// Defaults to 1 if not provided
    pub page: Option<usize>,

    /// Number of items per page
    /// Defaults to 10 if not provided, maximum is 100
    pub limit: Option<usize>,
}

/// Query parameters carrying an optional owner check
///
/// When `owner_id` is provided the operation only applies to videos owned by
/// that identifier; a mismatch reads the same as a missing video.
#[derive(Deserialize)]
pub struct OwnerParams {
    pub owner_id: Option<String>,
}

/// Request payload for publishing a video
#[derive(Deserialize)]
pub struct PublishRequest {
    /// Optional owner check, same semantics as [`OwnerParams`]
    pub owner_id: Option<String>,

    /// Playback location the short link will redirect to
    pub destination_url: String,
}

/// Response returned after publishing a video
#[derive(Serialize)]
pub struct PublishResponse {
    /// The short code in its stored (uppercase) form
    pub short_code: String,

    /// Complete public link, e.g. `http://localhost:8080/v/AB12CD`
    pub short_link: String,

    /// The destination the link redirects to
    pub destination_url: String,

    /// `true` when the video was already published and the existing link
    /// was returned unchanged
    pub already_published: bool,
}

/// Request payload for assigning a custom short code
#[derive(Deserialize)]
pub struct SetShortCodeRequest {
    /// Optional owner check, same semantics as [`OwnerParams`]
    pub owner_id: Option<String>,

    /// Requested code, 4-10 alphanumerics in any case
    pub short_code: String,
}

/// Response returned after a short-code update
#[derive(Serialize)]
pub struct SetShortCodeResponse {
    /// The stored (uppercase) form of the new code
    pub short_code: String,

    /// Complete public link under the new code
    pub short_link: String,
}

/// Query parameters for the recent-views listing
#[derive(Deserialize)]
pub struct ViewsParams {
    /// Optional owner filter; without it, visits across all videos are listed
    pub owner_id: Option<String>,

    /// Maximum number of entries to return
    /// Defaults to 100 if not provided, maximum is 500
    pub limit: Option<usize>,
}

/// One entry in the recent-views listing: a visit joined with the video it
/// belongs to.
#[derive(Serialize)]
pub struct ViewEntry {
    pub id: String,
    pub video_id: String,
    pub video_title: String,
    pub short_code: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Service-wide counters returned by the stats endpoint.
#[derive(Serialize)]
pub struct StatsResponse {
    /// Total number of stored videos
    pub videos: u64,

    /// Sum of `view_count` across all videos
    pub views: u64,
}

/// Generates a random alphanumeric identifier of the given length.
pub fn random_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates a candidate short code in the stored (uppercase) form.
pub fn random_short_code() -> String {
    random_id(GENERATED_CODE_LEN).to_ascii_uppercase()
}

/// Checks the owner-facing short code format: 4-10 ASCII alphanumerics.
///
/// Case is accepted here; codes are uppercased before they are stored or
/// looked up.
pub fn is_valid_short_code(code: &str) -> bool {
    (SHORT_CODE_MIN..=SHORT_CODE_MAX).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric())
}
