// src/progress.rs
//
// Live job state published by the orchestrator: atomic counters updated from
// copy-task callbacks, derived throughput, and a once-per-second snapshot
// ring for later charting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::constants::PROGRESS_SAMPLE_CAP;

/// One timestamped progress snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    /// Time since job start.
    pub elapsed: Duration,
    pub bytes_copied: u64,
    pub request_count: u64,
}

/// Published progress fields for one job run. Cheap to share (`Arc`) and to
/// read from a UI poll loop while copy tasks update it.
pub struct JobProgress {
    pub total_objects: AtomicU64,
    pub completed_objects: AtomicU64,
    pub bytes_copied: AtomicU64,
    pub request_count: AtomicU64,
    started_at: Mutex<Instant>,
    status: Mutex<String>,
    errors: Mutex<Vec<String>>,
    samples: Mutex<VecDeque<ProgressSample>>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            total_objects: AtomicU64::new(0),
            completed_objects: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
            started_at: Mutex::new(Instant::now()),
            status: Mutex::new(String::new()),
            errors: Mutex::new(Vec::new()),
            samples: Mutex::new(VecDeque::with_capacity(PROGRESS_SAMPLE_CAP)),
        }
    }
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all fields for a fresh run.
    pub fn reset(&self, total_objects: u64) {
        self.total_objects.store(total_objects, Ordering::SeqCst);
        self.completed_objects.store(0, Ordering::SeqCst);
        self.bytes_copied.store(0, Ordering::SeqCst);
        self.request_count.store(0, Ordering::SeqCst);
        *self.started_at.lock().unwrap() = Instant::now();
        self.errors.lock().unwrap().clear();
        self.samples.lock().unwrap().clear();
    }

    pub fn add_bytes(&self, delta: u64) {
        self.bytes_copied.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn add_requests(&self, delta: u64) {
        self.request_count.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn object_completed(&self) {
        self.completed_objects.fetch_add(1, Ordering::Relaxed);
    }

    /// Derived, never stored: bytes since start over wall-clock elapsed.
    pub fn throughput_bytes_per_sec(&self) -> f64 {
        let elapsed = self.started_at.lock().unwrap().elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes_copied.load(Ordering::Relaxed) as f64 / elapsed
    }

    pub fn set_status(&self, message: &str) {
        *self.status.lock().unwrap() = message.to_string();
    }

    pub fn status(&self) -> String {
        self.status.lock().unwrap().clone()
    }

    pub fn record_error(&self, message: String) {
        self.errors.lock().unwrap().push(message);
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    /// Append a snapshot of the cumulative counters, dropping the oldest
    /// once the ring is full.
    pub fn record_sample(&self) {
        let sample = ProgressSample {
            elapsed: self.started_at.lock().unwrap().elapsed(),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            request_count: self.request_count.load(Ordering::Relaxed),
        };
        let mut samples = self.samples.lock().unwrap();
        if samples.len() == PROGRESS_SAMPLE_CAP {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn samples(&self) -> Vec<ProgressSample> {
        self.samples.lock().unwrap().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let p = JobProgress::new();
        p.reset(3);
        p.add_bytes(100);
        p.add_bytes(50);
        p.object_completed();
        p.add_requests(4);

        assert_eq!(p.total_objects.load(Ordering::SeqCst), 3);
        assert_eq!(p.completed_objects.load(Ordering::SeqCst), 1);
        assert_eq!(p.bytes_copied.load(Ordering::SeqCst), 150);
        assert_eq!(p.request_count.load(Ordering::SeqCst), 4);
        assert!(p.throughput_bytes_per_sec() >= 0.0);
    }

    #[test]
    fn sample_ring_is_capped() {
        let p = JobProgress::new();
        for _ in 0..(PROGRESS_SAMPLE_CAP + 25) {
            p.record_sample();
        }
        assert_eq!(p.samples().len(), PROGRESS_SAMPLE_CAP);
    }

    #[test]
    fn reset_clears_state() {
        let p = JobProgress::new();
        p.add_bytes(10);
        p.record_error("boom".into());
        p.record_sample();
        p.reset(5);

        assert_eq!(p.bytes_copied.load(Ordering::SeqCst), 0);
        assert!(p.error_messages().is_empty());
        assert!(p.samples().is_empty());
        assert_eq!(p.total_objects.load(Ordering::SeqCst), 5);
    }
}
