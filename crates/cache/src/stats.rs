//! Append-only adaptive statistics
//!
//! This module provides:
//! - `StatsRecord`: one JSON-Lines record per `find` invocation
//! - `AdaptiveStats`: a channel-fed writer thread plus threshold feedback
//!
//! The sink is an append-only JSONL file drained by a dedicated writer;
//! write failures are swallowed (with a warning) and never fail a query.
//! Records carry counters and hashes only, never document text.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::warn;

// ============================================================================
// StatsRecord
// ============================================================================

/// One stats record per `find` invocation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatsRecord {
    /// Epoch milliseconds at completion
    pub ts: u64,
    /// Truncated SHA-256 of the raw query
    pub query_hash: String,
    /// Files opened during the scan
    pub scanned_files: u32,
    /// Candidates returned
    pub candidates: u32,
    /// True when a cache entry was served
    pub sem_cache_hit: bool,
    /// Cache consultation outcome (wire name)
    pub sem_cache_mode: String,
    /// Similarity score for a semantic hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sem_cache_score: Option<f32>,
    /// Pipeline latency recovered by a cache hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_saved_ms: Option<u64>,
    /// Scoring mode (`lexical`)
    pub scoring_mode: String,
    /// Rough token estimate of the exchange
    pub est_tokens: u64,
    /// Candidates per estimated response token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal_gain: Option<f32>,
    /// Cutoff reason, if any (wire name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff_reason: Option<String>,
    /// Low-candidate threshold in effect for this query
    pub candidate_low_threshold: u32,
    /// File-bias threshold in effect for this query
    pub file_bias_threshold: f32,
}

/// Truncated query hash for stats records (no text leaves the process)
pub fn query_hash(query: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(query.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// AdaptiveStats
// ============================================================================

enum StatsMessage {
    Record(Box<StatsRecord>),
    Flush(mpsc::SyncSender<()>),
}

/// Channel-fed JSONL stats sink with threshold feedback
pub struct AdaptiveStats {
    path: PathBuf,
    sender: Mutex<Option<mpsc::Sender<StatsMessage>>>,
}

impl AdaptiveStats {
    /// Create the sink and spawn its writer thread
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let (sender, receiver) = mpsc::channel::<StatsMessage>();
        let writer_path = path.clone();
        thread::Builder::new()
            .name("adaptive-stats".to_string())
            .spawn(move || writer_loop(&writer_path, receiver))
            .ok();
        AdaptiveStats {
            path,
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Queue one record; never blocks, never fails the caller
    pub fn append(&self, record: StatsRecord) {
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(StatsMessage::Record(Box::new(record)));
        }
    }

    /// Block until every queued record reached the file
    pub fn flush(&self) {
        let receiver = {
            let guard = self.sender.lock();
            let Some(sender) = guard.as_ref() else { return };
            let (ack, receiver) = mpsc::sync_channel(1);
            if sender.send(StatsMessage::Flush(ack)).is_err() {
                return;
            }
            receiver
        };
        let _ = receiver.recv();
    }

    /// Read the last `limit` records from the file
    pub fn tail(&self, limit: usize) -> Vec<StatsRecord> {
        let Ok(file) = std::fs::File::open(&self.path) else {
            return Vec::new();
        };
        let mut rows: Vec<StatsRecord> = Vec::new();
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { continue };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<StatsRecord>(line) {
                rows.push(record);
            }
        }
        if limit > 0 && rows.len() > limit {
            rows.split_off(rows.len() - limit)
        } else {
            rows
        }
    }

    // ========================================================================
    // Threshold feedback
    // ========================================================================

    /// Effective `(candidate_low, file_bias)` thresholds
    ///
    /// Starts from the last recorded values, steps at most once per 24h
    /// window based on the recent cutoff rate, and resets to the bases when
    /// the rollback guard detects recall or cutoff regressions across the
    /// last two 100-run windows. Clamped to `[2, 6]` and `[0.70, 0.90]`.
    pub fn thresholds(
        &self,
        base_candidate_low: u32,
        base_file_bias: f32,
        adaptive_tuning: bool,
        now_ms: u64,
    ) -> (u32, f32) {
        if !adaptive_tuning {
            return (base_candidate_low, base_file_bias);
        }

        let rows = self.tail(220);
        let Some(last) = rows.last() else {
            return (base_candidate_low, base_file_bias);
        };
        let mut candidate_low = i64::from(last.candidate_low_threshold.max(1));
        let mut file_bias = last.file_bias_threshold;

        let day_ms = 24 * 60 * 60 * 1000;
        let recent: Vec<&StatsRecord> = rows
            .iter()
            .filter(|r| now_ms.saturating_sub(r.ts) <= day_ms)
            .collect();

        // Thresholds move at most once per 24h window.
        let mut can_adjust = true;
        if !recent.is_empty() {
            let candidate_values: std::collections::HashSet<u32> =
                recent.iter().map(|r| r.candidate_low_threshold).collect();
            let bias_values: std::collections::HashSet<i64> = recent
                .iter()
                .map(|r| (r.file_bias_threshold * 100.0).round() as i64)
                .collect();
            if candidate_values.len() > 1 || bias_values.len() > 1 {
                can_adjust = false;
            }
        }
        if !recent.is_empty() && can_adjust {
            let cutoff_rate = recent.iter().filter(|r| r.cutoff_reason.is_some()).count() as f32
                / recent.len() as f32;
            if cutoff_rate > 0.20 {
                candidate_low -= 1;
                file_bias -= 0.03;
            } else if cutoff_rate < 0.05 {
                candidate_low += 1;
                file_bias += 0.03;
            }
        }

        // Rollback guard over the last two 100-run windows.
        if rows.len() >= 200 {
            let prev = &rows[rows.len() - 200..rows.len() - 100];
            let curr = &rows[rows.len() - 100..];
            let prev_rate =
                prev.iter().filter(|r| r.cutoff_reason.is_some()).count() as f32 / prev.len() as f32;
            let curr_rate =
                curr.iter().filter(|r| r.cutoff_reason.is_some()).count() as f32 / curr.len() as f32;
            let prev_recall = recall_proxy(prev);
            let curr_recall = recall_proxy(curr);
            if (prev_recall - curr_recall) > 0.03
                || (curr_rate - prev_rate) > 0.05
                || curr_recall < 0.90
            {
                candidate_low = base_candidate_low as i64;
                file_bias = base_file_bias;
            }
        }

        let candidate_low = candidate_low.clamp(2, 6) as u32;
        let file_bias = ((file_bias.clamp(0.70, 0.90)) * 100.0).round() / 100.0;
        (candidate_low, file_bias)
    }
}

impl Drop for AdaptiveStats {
    fn drop(&mut self) {
        // Closing the channel lets the writer thread exit.
        self.sender.lock().take();
    }
}

fn recall_proxy(rows: &[StatsRecord]) -> f32 {
    if rows.is_empty() {
        return 0.0;
    }
    let good = rows
        .iter()
        .filter(|r| r.cutoff_reason.is_none() && r.candidates > 0)
        .count();
    good as f32 / rows.len() as f32
}

fn writer_loop(path: &Path, receiver: mpsc::Receiver<StatsMessage>) {
    while let Ok(message) = receiver.recv() {
        match message {
            StatsMessage::Record(record) => {
                if let Err(err) = append_record(path, &record) {
                    warn!(%err, path = %path.display(), "stats append failed; record dropped");
                }
            }
            StatsMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

fn append_record(path: &Path, record: &StatsRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")
}

// ============================================================================
// Tests
// ============================================================================
