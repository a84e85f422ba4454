// src/sink.rs
//
// Target-side upload protocol behind one seam. The streamer feeds chunks in
// source order; the sink speaks whichever multi-part protocol the target
// provider requires and owns the per-chunk retry.

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::constants::AZURE_BLOCK_ID_WIDTH;
use crate::endpoint::Provider;
use crate::object_client::ObjectClient;
use crate::retry::with_retries;

/// Ordered chunk consumer for one target object.
///
/// Chunks arrive serially in source order; `finish` commits them in that
/// same order (S3 part numbers, Azure block-id sequence). `abort` releases
/// provider-side state after an unrecoverable failure and is best-effort.
#[async_trait]
pub trait ChunkSink: Send {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()>;
    async fn finish(&mut self) -> Result<()>;
    async fn abort(&mut self);
    fn parts_written(&self) -> usize;
}

/// Shared tally of HTTP request attempts, fed into `TransferStats`.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU64);

impl RequestCounter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Build the sink for the target provider. The match is exhaustive on the
/// closed `Provider` enum; adding a provider without a sink is a compile
/// error.
pub async fn sink_for_target(
    client: Arc<ObjectClient>,
    key: &str,
    content_type: Option<&str>,
    requests: Arc<RequestCounter>,
) -> Result<Box<dyn ChunkSink>> {
    match client.endpoint().provider {
        Provider::S3 => Ok(Box::new(
            S3MultipartSink::create(client, key, content_type, requests).await?,
        )),
        Provider::AzureBlob => Ok(Box::new(AzureBlockSink::new(client, key, requests))),
    }
}

// --------------------------------------------------------------------------
// S3 multipart
// --------------------------------------------------------------------------

pub struct S3MultipartSink {
    client: Arc<ObjectClient>,
    key: String,
    upload_id: String,
    next_part_number: i32,
    parts: Vec<(i32, String)>,
    requests: Arc<RequestCounter>,
    finished: bool,
}

impl S3MultipartSink {
    /// Issues CreateMultipartUpload (retried) before any chunk is accepted.
    pub async fn create(
        client: Arc<ObjectClient>,
        key: &str,
        content_type: Option<&str>,
        requests: Arc<RequestCounter>,
    ) -> Result<Self> {
        let upload_id = with_retries("CreateMultipartUpload", || {
            requests.bump();
            client.initiate_multipart(key, content_type)
        })
        .await?;
        Ok(Self {
            client,
            key: key.to_string(),
            upload_id,
            next_part_number: 1,
            parts: Vec::new(),
            requests,
            finished: false,
        })
    }
}

#[async_trait]
impl ChunkSink for S3MultipartSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        let part_number = self.next_part_number;
        let etag = with_retries("UploadPart", || {
            self.requests.bump();
            self.client
                .upload_part(&self.key, &self.upload_id, part_number, chunk.clone())
        })
        .await?;
        self.parts.push((part_number, etag));
        self.next_part_number += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        with_retries("CompleteMultipartUpload", || {
            self.requests.bump();
            self.client
                .complete_multipart(&self.key, &self.upload_id, &self.parts)
        })
        .await?;
        self.finished = true;
        Ok(())
    }

    async fn abort(&mut self) {
        if self.finished {
            return;
        }
        self.requests.bump();
        if let Err(err) = self.client.abort_multipart(&self.key, &self.upload_id).await {
            warn!("AbortMultipartUpload for {} failed: {}", self.key, err);
        }
    }

    fn parts_written(&self) -> usize {
        self.parts.len()
    }
}

// --------------------------------------------------------------------------
// Azure block blob
// --------------------------------------------------------------------------

pub struct AzureBlockSink {
    client: Arc<ObjectClient>,
    key: String,
    block_ids: Vec<String>,
    requests: Arc<RequestCounter>,
}

impl AzureBlockSink {
    pub fn new(client: Arc<ObjectClient>, key: &str, requests: Arc<RequestCounter>) -> Self {
        Self {
            client,
            key: key.to_string(),
            block_ids: Vec::new(),
            requests,
        }
    }
}

#[async_trait]
impl ChunkSink for AzureBlockSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        let block_id = block_id_for(self.block_ids.len() as u64);
        with_retries("PutBlock", || {
            self.requests.bump();
            self.client.stage_block(&self.key, &block_id, chunk.clone())
        })
        .await?;
        self.block_ids.push(block_id);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        with_retries("PutBlockList", || {
            self.requests.bump();
            self.client.commit_block_list(&self.key, &self.block_ids)
        })
        .await
    }

    async fn abort(&mut self) {
        // Uncommitted blocks are garbage-collected server-side after a week;
        // there is no abort call to make.
    }

    fn parts_written(&self) -> usize {
        self.block_ids.len()
    }
}

/// Base64 of the zero-padded sequence number. All ids for one blob must be
/// equal length or the service rejects the block list.
pub fn block_id_for(sequence: u64) -> String {
    BASE64.encode(format!("{:0width$}", sequence, width = AZURE_BLOCK_ID_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_are_fixed_width_base64() {
        let id0 = block_id_for(0);
        let id1 = block_id_for(1);
        let id_big = block_id_for(9_999);

        assert_eq!(BASE64.decode(&id0).unwrap(), b"00000000000000000000");
        assert_eq!(BASE64.decode(&id1).unwrap(), b"00000000000000000001");
        assert_eq!(BASE64.decode(&id_big).unwrap(), b"00000000000000009999");

        // Equal-length ids, ordered like their sequence numbers.
        assert_eq!(id0.len(), id_big.len());
        assert!(id0 < id1);
    }
}
