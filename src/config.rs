// src/config.rs
//
// Engine settings. Values are clamped into their supported ranges at use
// time via the accessors, so a settings struct deserialized from anywhere
// can never push the engine outside its envelope.

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT_TRANSFERS, MAX_CONCURRENT_TRANSFERS,
    MIN_CHUNK_SIZE, MIN_CONCURRENT_TRANSFERS,
};

/// What happens to sibling copy tasks when one object exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First object-level failure cancels all in-flight and pending copies.
    StopOnFirstError,
    /// Record the failure and keep copying the remaining objects.
    BestEffortContinue,
}

#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Concurrently copied objects; bounds outstanding HTTP connections.
    pub max_concurrent_transfers: usize,
    /// Fixed chunk buffer per in-flight upload; bounds memory.
    pub chunk_size_bytes: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            failure_policy: FailurePolicy::StopOnFirstError,
        }
    }
}

impl TransferSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent_transfers(mut self, n: usize) -> Self {
        self.max_concurrent_transfers = n;
        self
    }

    pub fn with_chunk_size_bytes(mut self, bytes: usize) -> Self {
        self.chunk_size_bytes = bytes;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Concurrency clamped into [1, 8].
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrent_transfers
            .clamp(MIN_CONCURRENT_TRANSFERS, MAX_CONCURRENT_TRANSFERS)
    }

    /// Chunk size floored at the 128 MB minimum.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size_bytes.max(MIN_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = TransferSettings::default();
        assert_eq!(s.effective_concurrency(), 2);
        assert_eq!(s.effective_chunk_size(), 256 * 1024 * 1024);
        assert_eq!(s.failure_policy, FailurePolicy::StopOnFirstError);
    }

    #[test]
    fn clamping() {
        let s = TransferSettings::new().with_max_concurrent_transfers(0);
        assert_eq!(s.effective_concurrency(), 1);
        let s = TransferSettings::new().with_max_concurrent_transfers(64);
        assert_eq!(s.effective_concurrency(), 8);
        let s = TransferSettings::new().with_chunk_size_bytes(1024);
        assert_eq!(s.effective_chunk_size(), 128 * 1024 * 1024);
    }
}
