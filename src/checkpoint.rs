// src/checkpoint.rs
//
// Durable record of fully copied object keys, scoped to one (jobId, source
// profile) pair. One append-only file, one raw key per line; a crash
// mid-append loses at most the in-flight line, never committed ones. The
// file is never rewritten or compacted.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use crate::constants::checkpoint_file_name;

struct CheckpointInner {
    completed: HashSet<String>,
    file: File,
}

/// Concurrent-safe completed-key store. All mutation funnels through one
/// async mutex, so copy tasks need no external locking.
pub struct CheckpointStore {
    path: PathBuf,
    inner: Mutex<CheckpointInner>,
}

impl CheckpointStore {
    /// Open (or create) the store for `(job_id, profile)` under `dir`.
    /// Existing lines are loaded into memory; a resumed job sees every key
    /// committed by earlier runs with the same id.
    pub fn open(dir: &Path, job_id: &str, profile: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating checkpoint directory {:?}", dir))?;
        let path = dir.join(checkpoint_file_name(&sanitize_profile(profile), job_id));

        let mut completed = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(
                File::open(&path).with_context(|| format!("opening checkpoint {:?}", path))?,
            );
            for line in reader.lines() {
                let line = line?;
                if !line.is_empty() {
                    completed.insert(line);
                }
            }
            info!("loaded {} checkpointed key(s) from {:?}", completed.len(), path);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening checkpoint {:?} for append", path))?;

        Ok(Self { path, inner: Mutex::new(CheckpointInner { completed, file }) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when `key` was fully copied by this job lineage.
    pub async fn is_completed(&self, key: &str) -> bool {
        self.inner.lock().await.completed.contains(key)
    }

    /// Record `key` as fully copied. Appends one whole line and flushes;
    /// duplicate marks are no-ops.
    pub async fn mark_completed(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.completed.insert(key.to_string()) {
            return Ok(());
        }
        let line = format!("{}\n", key);
        inner
            .file
            .write_all(line.as_bytes())
            .with_context(|| format!("appending to checkpoint {:?}", self.path))?;
        inner.file.flush()?;
        Ok(())
    }

    /// Number of keys known to be completed.
    pub async fn completed_count(&self) -> usize {
        self.inner.lock().await.completed.len()
    }
}

/// Keep profile names filesystem-safe: alphanumerics, dash, underscore;
/// everything else becomes an underscore.
fn sanitize_profile(profile: &str) -> String {
    profile
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
