// src/job.rs
//
// Value types for the migration data model: the job itself, listed object
// metadata, and per-object transfer accounting.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One user-initiated migration run. Immutable; identifies one checkpoint
/// lineage via `id`.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_profile: String,
    pub source_bucket: String,
    pub source_prefix: String,
    pub target_profile: String,
    pub target_bucket: String,
    pub target_prefix: String,
}

impl MigrationJob {
    /// New job with a freshly generated id (a new checkpoint lineage).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_profile: &str,
        source_bucket: &str,
        source_prefix: &str,
        target_profile: &str,
        target_bucket: &str,
        target_prefix: &str,
    ) -> Self {
        Self::with_id(
            &Uuid::new_v4().to_string(),
            source_profile,
            source_bucket,
            source_prefix,
            target_profile,
            target_bucket,
            target_prefix,
        )
    }

    /// Reconstruct a job under a known id. This is the resumption path: a
    /// re-run with the same id reuses the checkpoint store of the earlier
    /// run and skips everything already committed there.
    #[allow(clippy::too_many_arguments)]
    pub fn with_id(
        id: &str,
        source_profile: &str,
        source_bucket: &str,
        source_prefix: &str,
        target_profile: &str,
        target_bucket: &str,
        target_prefix: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            source_profile: source_profile.to_string(),
            source_bucket: source_bucket.to_string(),
            source_prefix: source_prefix.to_string(),
            target_profile: target_profile.to_string(),
            target_bucket: target_bucket.to_string(),
            target_prefix: target_prefix.to_string(),
        }
    }
}

/// Metadata for one listed object. Produced by the listing backend and
/// read-only during migration.
#[derive(Debug, Clone, Default)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub version_id: Option<String>,
    pub is_versioned: bool,
    pub is_delete_marker: bool,
    pub is_deleted: bool,
    pub is_latest: bool,
    pub storage_class: Option<String>,
    pub blob_type: Option<String>,
}

impl ObjectDescriptor {
    /// Listing conventions represent folders as zero-size keys ending in '/'.
    /// Those placeholders are never copy targets; anything ending in '/' is
    /// dropped from the work list.
    pub fn is_folder_placeholder(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// Accounting for one completed object copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub bytes_transferred: u64,
    pub request_count: u64,
}
