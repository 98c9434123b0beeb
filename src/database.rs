//! Database initialization, table definitions, and storage operations
//!
//! This module owns every operation that touches the embedded redb database.
//! All multi-step writes run inside a single write transaction here; redb
//! serializes write transactions, which makes the visit insert plus
//! view-counter increment one atomic unit and keeps concurrent increments
//! from losing updates. Handlers never open transactions themselves.

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::context::VisitContext;
use crate::error::StoreError;
use crate::model::{
    random_id, random_short_code, StatsResponse, VideoRecord, ViewEntry, VisitRecord,
    VISIT_ID_LEN,
};

/// Main table for storing video records
///
/// Key: video id as string
/// Value: JSON-serialized VideoRecord as string
///
/// Example:
/// - Key: "9X2kLmQ04abc"
/// - Value: '{"id":"9X2kLmQ04abc","owner_id":"user_123",...}'
pub const TABLE_VIDEOS: TableDefinition<&str, &str> = TableDefinition::new("videos_v1");

/// Short-code lookup table
///
/// Key: short code in its stored (uppercase) form
/// Value: video id as string
///
/// Uniqueness is enforced by checking for the key inside the same write
/// transaction that inserts it.
pub const TABLE_CODES: TableDefinition<&str, &str> = TableDefinition::new("codes_v1");

/// Index table for efficient querying by owner
///
/// Key: composite key in format "{owner_id}:{timestamp_micros}:{video_id}"
/// Value: video id as string
///
/// The timestamp keeps entries in creation order; the trailing id keeps two
/// records created in the same microsecond apart. The value holds only the
/// video id, so the index can never serve a stale copy of the record.
pub const TABLE_OWNER_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("owner_index_v1");

/// Visit log table
///
/// Key: composite key in format "{video_id}:{timestamp_micros}:{visit_id}"
/// Value: JSON-serialized VisitRecord as string
///
/// Prefix range scans over the video id serve both the recent-views listing
/// and cascade deletion.
pub const TABLE_VISITS: TableDefinition<&str, &str> = TableDefinition::new("visits_v1");

/// Upper bound on generation attempts when publishing has to mint a code.
const CODE_ATTEMPTS: u32 = 32;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,
}

/// Result of a publish call.
pub struct PublishOutcome {
    pub short_code: String,
    pub destination_url: String,
    pub already_published: bool,
}

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Returns
///
/// * `Ok(Database)` - Successfully initialized database instance
/// * `Err(StoreError)` - Database initialization error
///
/// # Example
///
/// ```no_run
/// # use cliplink::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, StoreError> {
    let db = Database::create(db_path)?;

    // Open every table once so later read transactions find them.
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_VIDEOS)?;
        write_txn.open_table(TABLE_CODES)?;
        write_txn.open_table(TABLE_OWNER_INDEX)?;
        write_txn.open_table(TABLE_VISITS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Composite key for the owner index.
fn owner_key(record: &VideoRecord) -> String {
    format!(
        "{}:{}:{}",
        record.owner_id,
        record.created_at.timestamp_micros(),
        record.id
    )
}

/// Composite key for the visit log.
fn visit_key(visit: &VisitRecord) -> String {
    format!(
        "{}:{}:{}",
        visit.video_id,
        visit.created_at.timestamp_micros(),
        visit.id
    )
}

/// Range bounds covering every composite key with the given prefix.
///
/// '{' is the first character after ':' that the key alphabet can never
/// contain, so `"{prefix}:" .. "{prefix}:{"` spans exactly the prefix's
/// entries.
fn prefix_bounds(prefix: &str) -> (String, String) {
    (format!("{}:", prefix), format!("{}:{{", prefix))
}

/// Inserts a new video record together with its owner index entry.
pub fn create_video(db: &Database, record: &VideoRecord) -> Result<(), StoreError> {
    let record_json = serde_json::to_string(record)?;

    let write_txn = db.begin_write()?;
    {
        let mut videos = write_txn.open_table(TABLE_VIDEOS)?;
        videos.insert(record.id.as_str(), record_json.as_str())?;

        let mut owner_index = write_txn.open_table(TABLE_OWNER_INDEX)?;
        let index_key = owner_key(record);
        owner_index.insert(index_key.as_str(), record.id.as_str())?;
    }
    write_txn.commit()?;

    Ok(())
}

/// Fetches a video by id, optionally scoped to an owner.
///
/// A video owned by someone else reads the same as a missing one.
pub fn find_video(
    db: &Database,
    id: &str,
    owner_id: Option<&str>,
) -> Result<Option<VideoRecord>, StoreError> {
    let read_txn = db.begin_read()?;
    let videos = read_txn.open_table(TABLE_VIDEOS)?;

    let Some(guard) = videos.get(id)? else {
        return Ok(None);
    };
    let record: VideoRecord = serde_json::from_str(guard.value())?;

    if owner_id.is_some_and(|owner| owner != record.owner_id) {
        return Ok(None);
    }

    Ok(Some(record))
}

/// Lists videos with pagination.
///
/// With an owner filter this walks the owner index backwards (newest first)
/// and resolves each entry against the main table. Without a filter it scans
/// the main table, whose ordering follows the random id rather than creation
/// time.
pub fn list_videos(
    db: &Database,
    owner_id: Option<&str>,
    page: usize,
    limit: usize,
) -> Result<Vec<VideoRecord>, StoreError> {
    let offset = page.saturating_sub(1) * limit;

    let read_txn = db.begin_read()?;
    let videos = read_txn.open_table(TABLE_VIDEOS)?;

    let records: Vec<VideoRecord> = match owner_id {
        Some(owner) => {
            let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
            let (start_key, end_key) = prefix_bounds(owner);

            index
                .range(start_key.as_str()..end_key.as_str())?
                .rev()
                .skip(offset)
                .take(limit)
                .filter_map(|entry| {
                    let (_, id_guard) = entry.ok()?;
                    let guard = videos.get(id_guard.value()).ok()??;
                    serde_json::from_str::<VideoRecord>(guard.value()).ok()
                })
                .collect()
        }
        None => videos
            .iter()?
            .skip(offset)
            .take(limit)
            .filter_map(|entry| {
                let (_, value) = entry.ok()?;
                serde_json::from_str::<VideoRecord>(value.value()).ok()
            })
            .collect(),
    };

    Ok(records)
}

/// Publishes a video: sets the destination and ensures it carries a short
/// code, all in one write transaction.
///
/// Idempotent: a video that already has both a code and a destination is
/// returned unchanged with `already_published` set. A video that carries an
/// owner-assigned code but no destination keeps its code; generation only
/// fills absence.
///
/// Returns `Ok(None)` when the video does not exist or the owner check
/// fails.
pub fn publish_video(
    db: &Database,
    id: &str,
    owner_id: Option<&str>,
    destination_url: &str,
) -> Result<Option<PublishOutcome>, StoreError> {
    let write_txn = db.begin_write()?;
    let outcome = {
        let mut videos = write_txn.open_table(TABLE_VIDEOS)?;

        let record_json = match videos.get(id)? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let mut record: VideoRecord = serde_json::from_str(&record_json)?;

        if owner_id.is_some_and(|owner| owner != record.owner_id) {
            return Ok(None);
        }

        match (record.short_code.clone(), record.destination_url.clone()) {
            (Some(code), Some(destination)) => PublishOutcome {
                short_code: code,
                destination_url: destination,
                already_published: true,
            },
            (existing_code, _) => {
                let code = match existing_code {
                    Some(code) => code,
                    None => {
                        // Mint a code that is free in the code table; the
                        // check and the insert share this transaction.
                        let mut codes = write_txn.open_table(TABLE_CODES)?;
                        let mut minted = None;
                        for _ in 0..CODE_ATTEMPTS {
                            let candidate = random_short_code();
                            if codes.get(candidate.as_str())?.is_none() {
                                codes.insert(candidate.as_str(), id)?;
                                minted = Some(candidate);
                                break;
                            }
                        }
                        match minted {
                            Some(code) => code,
                            None => return Err(StoreError::CodeSpaceExhausted(CODE_ATTEMPTS)),
                        }
                    }
                };

                record.short_code = Some(code.clone());
                record.destination_url = Some(destination_url.to_string());
                let updated_json = serde_json::to_string(&record)?;
                videos.insert(id, updated_json.as_str())?;

                PublishOutcome {
                    short_code: code,
                    destination_url: destination_url.to_string(),
                    already_published: false,
                }
            }
        }
    };
    write_txn.commit()?;

    Ok(Some(outcome))
}

/// Assigns or replaces a video's short code.
///
/// The caller is expected to validate the format and uppercase the code.
/// A code held by a different video fails with [`StoreError::CodeTaken`];
/// re-submitting a video's own code is a no-op. The old mapping is removed
/// and the new one inserted in the same transaction, so the code table and
/// the record can never disagree.
///
/// Returns `Ok(None)` when the video does not exist or the owner check
/// fails.
pub fn set_short_code(
    db: &Database,
    id: &str,
    owner_id: Option<&str>,
    new_code: &str,
) -> Result<Option<()>, StoreError> {
    let write_txn = db.begin_write()?;
    {
        let mut videos = write_txn.open_table(TABLE_VIDEOS)?;

        let record_json = match videos.get(id)? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let mut record: VideoRecord = serde_json::from_str(&record_json)?;

        if owner_id.is_some_and(|owner| owner != record.owner_id) {
            return Ok(None);
        }

        if record.short_code.as_deref() == Some(new_code) {
            return Ok(Some(()));
        }

        let mut codes = write_txn.open_table(TABLE_CODES)?;
        let held_by_other = match codes.get(new_code)? {
            Some(existing) => existing.value() != record.id,
            None => false,
        };
        if held_by_other {
            return Err(StoreError::CodeTaken(new_code.to_string()));
        }

        if let Some(old_code) = record.short_code.take() {
            codes.remove(old_code.as_str())?;
        }
        codes.insert(new_code, record.id.as_str())?;

        record.short_code = Some(new_code.to_string());
        let updated_json = serde_json::to_string(&record)?;
        videos.insert(id, updated_json.as_str())?;
    }
    write_txn.commit()?;

    Ok(Some(()))
}

/// Deletes a video and cascades to everything that references it: the owner
/// index entry, the code mapping, and all visit rows, in one transaction.
///
/// Returns the number of removed visit rows, or `Ok(None)` when the video
/// does not exist or the owner check fails.
pub fn delete_video(
    db: &Database,
    id: &str,
    owner_id: Option<&str>,
) -> Result<Option<u64>, StoreError> {
    let write_txn = db.begin_write()?;
    let removed_visits = {
        let mut videos = write_txn.open_table(TABLE_VIDEOS)?;

        let record_json = match videos.get(id)? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let record: VideoRecord = serde_json::from_str(&record_json)?;

        if owner_id.is_some_and(|owner| owner != record.owner_id) {
            return Ok(None);
        }

        videos.remove(id)?;

        if let Some(code) = &record.short_code {
            let mut codes = write_txn.open_table(TABLE_CODES)?;
            codes.remove(code.as_str())?;
        }

        let mut owner_index = write_txn.open_table(TABLE_OWNER_INDEX)?;
        let index_key = owner_key(&record);
        owner_index.remove(index_key.as_str())?;

        // Cascade: the visit history goes with its video.
        let mut visits = write_txn.open_table(TABLE_VISITS)?;
        let (start_key, end_key) = prefix_bounds(id);
        let visit_keys: Vec<String> = visits
            .range(start_key.as_str()..end_key.as_str())?
            .filter_map(|entry| entry.ok().map(|(key, _)| key.value().to_string()))
            .collect();
        for visit_key in &visit_keys {
            visits.remove(visit_key.as_str())?;
        }

        visit_keys.len() as u64
    };
    write_txn.commit()?;

    Ok(Some(removed_visits))
}

/// Resolves a short code, recording the visit.
///
/// The incoming code is normalized to uppercase; stored codes are already
/// uppercase, so links survive case-insensitive clients. A read-only
/// pre-check keeps probe traffic for unknown codes off the single writer.
///
/// On a hit, one write transaction re-validates the code, inserts the
/// VisitRecord built from `context`, and rewrites the video with
/// `view_count + 1`. Both writes commit together or neither persists.
/// A video without a destination reads the same as an unknown code.
///
/// Returns the destination URL to redirect to, or `Ok(None)` for a miss.
pub fn resolve_visit(
    db: &Database,
    code: &str,
    context: &VisitContext,
) -> Result<Option<String>, StoreError> {
    let code = code.to_ascii_uppercase();

    {
        let read_txn = db.begin_read()?;
        let codes = read_txn.open_table(TABLE_CODES)?;
        if codes.get(code.as_str())?.is_none() {
            return Ok(None);
        }
    }

    let write_txn = db.begin_write()?;
    let destination = {
        // Re-check under the write transaction; the mapping may have been
        // removed or re-pointed since the read.
        let codes = write_txn.open_table(TABLE_CODES)?;
        let video_id = match codes.get(code.as_str())? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        drop(codes);

        let mut videos = write_txn.open_table(TABLE_VIDEOS)?;
        let record_json = match videos.get(video_id.as_str())? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let mut record: VideoRecord = serde_json::from_str(&record_json)?;

        let Some(destination) = record.destination_url.clone() else {
            return Ok(None);
        };

        let visit = VisitRecord {
            id: random_id(VISIT_ID_LEN),
            video_id: record.id.clone(),
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            referer: context.referer.clone(),
            created_at: Utc::now(),
        };
        let visit_json = serde_json::to_string(&visit)?;

        let mut visits = write_txn.open_table(TABLE_VISITS)?;
        let log_key = visit_key(&visit);
        visits.insert(log_key.as_str(), visit_json.as_str())?;

        // The increment rides in the same transaction as the visit row.
        record.view_count += 1;
        let updated_json = serde_json::to_string(&record)?;
        videos.insert(record.id.as_str(), updated_json.as_str())?;

        destination
    };
    write_txn.commit()?;

    Ok(Some(destination))
}

/// Flattened recent-visit listing, newest first, bounded by `limit`.
///
/// Each entry joins the visit with the title and code of the video it
/// belongs to. With an owner filter only that owner's videos contribute.
pub fn recent_visits(
    db: &Database,
    owner_id: Option<&str>,
    limit: usize,
) -> Result<Vec<ViewEntry>, StoreError> {
    let read_txn = db.begin_read()?;
    let videos_table = read_txn.open_table(TABLE_VIDEOS)?;
    let visits_table = read_txn.open_table(TABLE_VISITS)?;

    // Collect the videos in scope first; their visit rows are then pulled
    // with per-video prefix ranges.
    let videos: Vec<VideoRecord> = match owner_id {
        Some(owner) => {
            let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
            let (start_key, end_key) = prefix_bounds(owner);

            index
                .range(start_key.as_str()..end_key.as_str())?
                .filter_map(|entry| {
                    let (_, id_guard) = entry.ok()?;
                    let guard = videos_table.get(id_guard.value()).ok()??;
                    serde_json::from_str::<VideoRecord>(guard.value()).ok()
                })
                .collect()
        }
        None => videos_table
            .iter()?
            .filter_map(|entry| {
                let (_, value) = entry.ok()?;
                serde_json::from_str::<VideoRecord>(value.value()).ok()
            })
            .collect(),
    };

    let mut entries: Vec<ViewEntry> = Vec::new();
    for video in &videos {
        let (start_key, end_key) = prefix_bounds(&video.id);
        for entry in visits_table.range(start_key.as_str()..end_key.as_str())? {
            let Ok((_, value)) = entry else { continue };
            let Ok(visit) = serde_json::from_str::<VisitRecord>(value.value()) else {
                continue;
            };
            entries.push(ViewEntry {
                id: visit.id,
                video_id: visit.video_id,
                video_title: video.title.clone(),
                short_code: video.short_code.clone(),
                ip_address: visit.ip_address,
                user_agent: visit.user_agent,
                referer: visit.referer,
                created_at: visit.created_at,
            });
        }
    }

    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries.truncate(limit);

    Ok(entries)
}

/// Service-wide counters: stored videos and the sum of their view counts.
pub fn stats_summary(db: &Database) -> Result<StatsResponse, StoreError> {
    let read_txn = db.begin_read()?;
    let videos = read_txn.open_table(TABLE_VIDEOS)?;

    let mut video_count: u64 = 0;
    let mut view_total: u64 = 0;
    for entry in videos.iter()? {
        let Ok((_, value)) = entry else { continue };
        video_count += 1;
        if let Ok(record) = serde_json::from_str::<VideoRecord>(value.value()) {
            view_total += record.view_count;
        }
    }

    Ok(StatsResponse {
        videos: video_count,
        views: view_total,
    })
}
