// src/endpoint.rs
//
// Typed endpoints plus the two collaborator seams the engine calls into:
// an EndpointResolver that turns a profile into an EndpointContext, and a
// StorageBackend that can list/head/get/put/delete objects for one provider.
// Both are black boxes from the engine's point of view.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::job::ObjectDescriptor;

/// Storage providers the engine can copy between. Closed on purpose: the
/// upload-protocol switch matches exhaustively on this, so a missing case is
/// a compile error rather than a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    S3,
    AzureBlob,
}

/// One side (source or target) of a migration job. Immutable for the job's
/// lifetime and shared by `Arc` across copy tasks.
#[derive(Debug, Clone)]
pub struct EndpointContext {
    pub provider: Provider,
    /// Scheme + host (+ optional port), no trailing slash.
    pub base_url: String,
    /// S3 bucket or Azure container.
    pub bucket: String,
    /// Empty means `DEFAULT_REGION` for signing purposes.
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Pre-issued SAS query string (without leading '?'), Azure only.
    pub sas_token: Option<String>,
    pub allow_insecure_tls: bool,
}

impl EndpointContext {
    /// True when requests to this endpoint go out unsigned. Local test
    /// endpoints run without credentials; that must keep working.
    pub fn is_anonymous(&self) -> bool {
        self.access_key.is_empty() || self.secret_key.is_empty()
    }
}

/// Named endpoint + credential record as handed over by profile storage.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    /// User-entered endpoint string; the resolver owns its grammar.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub allow_insecure_tls: bool,
}

/// Resolves a profile's endpoint string into a typed endpoint for one bucket.
/// Parsing the endpoint grammar lives outside this crate.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, profile: &Profile, bucket: &str) -> Result<EndpointContext>;
}

/// Object operations for one provider. Listing pagination and response
/// parsing are internal to the implementation; the engine only consumes the
/// flattened result.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// All objects under `prefix`, fully paginated.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>>;

    /// HEAD-like metadata for a single key.
    async fn head(&self, key: &str) -> Result<ObjectDescriptor>;

    /// Entire object into memory. Only suitable for small objects; the copy
    /// path streams instead.
    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Normalize a user-supplied prefix: non-empty prefixes always end with '/'.
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// Map a source key to its target key: strip the source prefix, prepend the
/// target prefix. Keys outside the source prefix pass through unchanged.
pub fn relative_target_key(source_key: &str, source_prefix: &str, target_prefix: &str) -> String {
    let relative = source_key.strip_prefix(source_prefix).unwrap_or(source_key);
    format!("{}{}", target_prefix, relative)
}
