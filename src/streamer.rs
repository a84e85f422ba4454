// src/streamer.rs
//
// Streaming copy engine: reads one source object as a byte stream, cuts it
// into fixed-size chunks, and feeds each chunk straight into the target
// provider's upload sink. Memory per in-flight copy is bounded by the chunk
// buffer; the object is never held whole.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::job::TransferStats;
use crate::object_client::ObjectClient;
use crate::retry::with_retries;
use crate::sink::{sink_for_target, ChunkSink, RequestCounter};

/// Fires after each chunk is durably accepted by the target, carrying the
/// delta in bytes. Keeps the engine decoupled from any presentation layer.
pub type ProgressFn = dyn Fn(u64) + Send + Sync;

/// One-object copy contract the orchestrator drives.
#[async_trait]
pub trait CopyEngine: Send + Sync {
    async fn copy_object(
        &self,
        source_key: &str,
        target_key: &str,
        content_type: Option<&str>,
        on_chunk: &ProgressFn,
    ) -> Result<TransferStats>;
}

pub struct ObjectStreamer {
    source: Arc<ObjectClient>,
    target: Arc<ObjectClient>,
    chunk_size: usize,
}

impl ObjectStreamer {
    pub fn new(source: Arc<ObjectClient>, target: Arc<ObjectClient>, chunk_size: usize) -> Self {
        Self { source, target, chunk_size }
    }

    /// One full attempt: fresh source stream from byte 0, fresh target sink.
    /// There is no partial-object resume below checkpoint granularity.
    async fn copy_once(
        &self,
        source_key: &str,
        target_key: &str,
        content_type: Option<&str>,
        on_chunk: &(dyn Fn(u64) + Send + Sync),
        requests: Arc<RequestCounter>,
    ) -> Result<u64> {
        requests.bump();
        let stream = self.source.get_stream(source_key).await?;
        let mut sink =
            sink_for_target(self.target.clone(), target_key, content_type, requests).await?;

        let result = async {
            let bytes = pump(stream, self.chunk_size, sink.as_mut(), on_chunk).await?;
            sink.finish().await?;
            Ok(bytes)
        }
        .await;

        if result.is_err() {
            sink.abort().await;
        }
        result
    }
}

#[async_trait]
impl CopyEngine for ObjectStreamer {
    async fn copy_object(
        &self,
        source_key: &str,
        target_key: &str,
        content_type: Option<&str>,
        on_chunk: &ProgressFn,
    ) -> Result<TransferStats> {
        let requests = Arc::new(RequestCounter::default());

        // A retried attempt re-uploads chunks whose bytes were already
        // reported; only bytes beyond the high-water mark are delivered.
        let high_water = Arc::new(AtomicU64::new(0));

        let bytes_transferred = with_retries("CopyObject", || {
            let requests = requests.clone();
            let high_water = high_water.clone();
            let attempt_total = AtomicU64::new(0);
            let guarded = move |delta: u64| {
                let reached = attempt_total.fetch_add(delta, Ordering::SeqCst) + delta;
                let previous = high_water.fetch_max(reached, Ordering::SeqCst);
                if reached > previous {
                    on_chunk(reached - previous);
                }
            };
            async move {
                self.copy_once(source_key, target_key, content_type, &guarded, requests)
                    .await
            }
        })
        .await?;

        debug!(
            "copied {} -> {} ({} bytes, {} requests)",
            source_key,
            target_key,
            bytes_transferred,
            requests.get()
        );
        Ok(TransferStats { bytes_transferred, request_count: requests.get() })
    }
}

/// Accumulate the source stream into `chunk_size` pieces and write each one
/// (then the final partial piece) to the sink. Returns total bytes written.
///
/// A zero-length source still writes a single empty chunk so the committed
/// target object exists.
pub(crate) async fn pump<S>(
    mut stream: S,
    chunk_size: usize,
    sink: &mut dyn ChunkSink,
    on_chunk: &(dyn Fn(u64) + Send + Sync),
) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut total: u64 = 0;

    while let Some(piece) = stream.next().await {
        let piece = piece?;
        buf.extend_from_slice(&piece);
        while buf.len() >= chunk_size {
            let chunk: Vec<u8> = buf.drain(..chunk_size).collect();
            sink.write_chunk(Bytes::from(chunk)).await?;
            total += chunk_size as u64;
            on_chunk(chunk_size as u64);
        }
    }

    if !buf.is_empty() || total == 0 {
        let len = buf.len() as u64;
        sink.write_chunk(Bytes::from(std::mem::take(&mut buf))).await?;
        total += len;
        on_chunk(len);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use futures::stream;

    /// Sink that records every chunk in memory.
    #[derive(Default)]
    struct RecordingSink {
        chunks: Vec<Bytes>,
        finished: bool,
        aborted: bool,
        fail_on_chunk: Option<usize>,
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
            if self.fail_on_chunk == Some(self.chunks.len()) {
                bail!("injected chunk failure");
            }
            self.chunks.push(chunk);
            Ok(())
        }

        async fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }

        async fn abort(&mut self) {
            self.aborted = true;
        }

        fn parts_written(&self) -> usize {
            self.chunks.len()
        }
    }

    fn byte_stream(data: Vec<u8>, piece: usize) -> impl Stream<Item = Result<Bytes>> + Unpin + Send {
        let pieces: Vec<Result<Bytes>> = data
            .chunks(piece.max(1))
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(pieces)
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn chunk_count_is_ceil_of_size_over_chunk() -> Result<()> {
        // 10 MB at 4 MB chunks -> 3 parts (4 + 4 + 2).
        let mb = 1024 * 1024;
        let data = patterned(10 * mb);
        let mut sink = RecordingSink::default();
        let total = pump(byte_stream(data.clone(), 64 * 1024), 4 * mb, &mut sink, &|_| {}).await?;

        assert_eq!(total, 10 * mb as u64);
        assert_eq!(sink.parts_written(), 3);
        assert_eq!(sink.chunks[0].len(), 4 * mb);
        assert_eq!(sink.chunks[1].len(), 4 * mb);
        assert_eq!(sink.chunks[2].len(), 2 * mb);

        // Concatenation in sequence order reproduces the source bytes.
        let mut rebuilt = Vec::new();
        for c in &sink.chunks {
            rebuilt.extend_from_slice(c);
        }
        assert_eq!(rebuilt, data);
        Ok(())
    }

    #[tokio::test]
    async fn exact_multiple_produces_no_empty_tail() -> Result<()> {
        let data = patterned(8 * 1024);
        let mut sink = RecordingSink::default();
        let total = pump(byte_stream(data, 1000), 4 * 1024, &mut sink, &|_| {}).await?;
        assert_eq!(total, 8 * 1024);
        assert_eq!(sink.parts_written(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn small_object_is_one_part() -> Result<()> {
        let data = patterned(1024);
        let mut sink = RecordingSink::default();
        let total = pump(byte_stream(data, 100), 4 * 1024 * 1024, &mut sink, &|_| {}).await?;
        assert_eq!(total, 1024);
        assert_eq!(sink.parts_written(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn zero_length_object_still_writes_one_chunk() -> Result<()> {
        let mut sink = RecordingSink::default();
        let total = pump(byte_stream(Vec::new(), 1), 4 * 1024, &mut sink, &|_| {}).await?;
        assert_eq!(total, 0);
        assert_eq!(sink.parts_written(), 1);
        assert!(sink.chunks[0].is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn progress_deltas_sum_to_object_size() -> Result<()> {
        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = seen.clone();
        let data = patterned(9 * 1024);
        let mut sink = RecordingSink::default();
        pump(
            byte_stream(data, 512),
            4 * 1024,
            &mut sink,
            &move |delta| {
                seen_cb.fetch_add(delta, Ordering::SeqCst);
            },
        )
        .await?;
        assert_eq!(seen.load(Ordering::SeqCst), 9 * 1024);
        Ok(())
    }

    #[tokio::test]
    async fn chunk_failure_propagates() {
        let data = patterned(10 * 1024);
        let mut sink = RecordingSink { fail_on_chunk: Some(1), ..Default::default() };
        let result = pump(byte_stream(data, 1024), 4 * 1024, &mut sink, &|_| {}).await;
        assert!(result.is_err());
        assert_eq!(sink.parts_written(), 1);
    }
}
