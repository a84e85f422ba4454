// src/lib.rs
//
// Crate root — module list plus public re-exports.
//
// migrio copies objects between S3-compatible and Azure Blob endpoints
// without buffering whole objects: streaming chunked download, provider-
// specific multi-part upload, bounded concurrency, retry with backoff, and
// crash-resumable checkpointing. Job creation, profile storage, endpoint
// parsing, and listing are external collaborators reached through the
// traits in `endpoint`.

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod job;
pub mod object_client;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod sigv4;
pub mod sink;
pub mod streamer;

pub use checkpoint::CheckpointStore;
pub use config::{FailurePolicy, TransferSettings};
pub use endpoint::{
    EndpointContext, EndpointResolver, Profile, Provider, StorageBackend,
};
pub use error::TransferError;
pub use job::{MigrationJob, ObjectDescriptor, TransferStats};
pub use object_client::ObjectClient;
pub use progress::{JobProgress, ProgressSample};
pub use runner::{
    CopyEngineFactory, MigrationRunner, StorageBackendFactory, StreamerFactory,
    STATUS_COMPLETE, STATUS_FAILED, STATUS_MISSING_PROFILES,
};
pub use sigv4::RequestSigner;
pub use streamer::{CopyEngine, ObjectStreamer};
