// src/constants.rs
//
// Centralized constants for migrio to avoid hardcoded values throughout the codebase

/// Default chunk size for streaming copies (256 MB).
/// Oversized chunks trade memory for fewer round trips.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024 * 1024;

/// Effective minimum chunk size (128 MB). Settings below this are clamped up.
pub const MIN_CHUNK_SIZE: usize = 128 * 1024 * 1024;

/// Default number of concurrently copied objects.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 2;

/// Lower bound for concurrent object copies.
pub const MIN_CONCURRENT_TRANSFERS: usize = 1;

/// Upper bound for concurrent object copies.
pub const MAX_CONCURRENT_TRANSFERS: usize = 8;

/// Maximum attempts per retryable operation (chunk upload, initiate, complete).
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between retries.
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound (exclusive) of the random jitter added to each backoff delay.
pub const RETRY_JITTER_MS: u64 = 200;

/// Backoff growth is capped at this attempt number; later attempts reuse it.
pub const RETRY_BACKOFF_CAP_ATTEMPT: u32 = 5;

/// Region assumed when an endpoint carries none.
pub const DEFAULT_REGION: &str = "us-east-1";

/// SigV4 sentinel for payloads that are not hashed (presigned URLs).
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// `x-ms-version` sent on every Azure Blob request.
pub const AZURE_API_VERSION: &str = "2024-11-04";

/// Width of the zero-padded sequence number inside an Azure block id.
/// All ids for one blob must have equal length; fixed width guarantees it.
pub const AZURE_BLOCK_ID_WIDTH: usize = 20;

/// Default HTTP connect timeout (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-request HTTP timeout (seconds). Chunk uploads are large, so
/// this is generous; retry handles the stragglers.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Interval between progress snapshots recorded by the job sampler.
pub const PROGRESS_SAMPLE_INTERVAL_MS: u64 = 1_000;

/// Number of progress snapshots retained (oldest are dropped first).
pub const PROGRESS_SAMPLE_CAP: usize = 300;

/// Build the checkpoint file name for a `(jobId, profile)` pair.
/// Content is one raw object key per line, not JSON records; the extension
/// is historical.
pub fn checkpoint_file_name(sanitized_profile: &str, job_id: &str) -> String {
    format!("checkpoint-{}-{}.ndjson", sanitized_profile, job_id)
}
