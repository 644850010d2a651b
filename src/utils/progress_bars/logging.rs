// src/utils/progress_bars/logging.rs - Logging helpers for pipeline stages
use log::{debug, error, info, warn};
use std::time::Instant;

use crate::models::metadata::{JobState, StageMetadata};

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    job_id: String,
    start_time: Instant,
}

fn stage_label(stage: JobState) -> (&'static str, &'static str) {
    match stage {
        JobState::Initialized => ("INIT", "🧭"),
        JobState::Loaded => ("LOAD", "📥"),
        JobState::Preprocessed => ("PREPROCESS", "🧹"),
        JobState::Blocked => ("BLOCK", "🧱"),
        JobState::Contrasted => ("CONTRAST", "⚖️"),
        JobState::Clustered => ("CLUSTER", "🕸️"),
        JobState::Written => ("WRITE", "💾"),
        JobState::Failed => ("FAILED", "❌"),
    }
}

impl StageLogger {
    pub fn new(stage: JobState, job_id: &str) -> Self {
        let (stage_name, stage_emoji) = stage_label(stage);
        Self {
            stage_name,
            stage_emoji,
            job_id: job_id.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, details: Option<&str>) {
        match details {
            Some(details) => info!(
                "[{}] {} 🚀 Starting {} stage (job {}): {}",
                self.stage_name,
                self.stage_emoji,
                self.stage_name.to_lowercase(),
                self.job_id,
                details
            ),
            None => info!(
                "[{}] {} 🚀 Starting {} stage (job {})",
                self.stage_name,
                self.stage_emoji,
                self.stage_name.to_lowercase(),
                self.job_id
            ),
        }
    }

    pub fn log_completion(&self, stage: &StageMetadata, memory_mb: Option<u64>) {
        let pairs = stage
            .pairs
            .map(|p| format!(", {} pairs", p))
            .unwrap_or_default();
        let memory = memory_mb
            .map(|m| format!(", memory {} MB", m))
            .unwrap_or_default();
        info!(
            "[{}] {} ✅ Completed in {:.2}s: rows {} → {}, columns {} → {}{}{}",
            self.stage_name,
            self.stage_emoji,
            stage.duration_secs,
            stage.rows_in,
            stage.rows_out,
            stage.columns_in,
            stage.columns_out,
            pairs,
            memory
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!(
            "[{}] {} ❌ {} [+{:.1}s]",
            self.stage_name,
            self.stage_emoji,
            message,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.stage_name, self.stage_emoji, message);
    }
}

pub fn log_job_start(job_id: &str, base_data_directory: &str, event_types: &[String], workers: usize) {
    info!("🚀 ===== MATCH JOB STARTING =====");
    info!("📅 Match job ID: {}", job_id);
    info!("📂 Source location: {}", base_data_directory);
    info!("🏷️  Event types requested: {:?}", event_types);
    info!("⚙️  Worker pool: {} threads", workers);
    info!("================================");
}

pub fn log_job_completion(job_id: &str, success: bool, runtime_secs: f64, matched_ids: Option<usize>) {
    if success {
        info!("🎉 ===== MATCH JOB COMPLETED =====");
        info!("📅 Match job ID: {}", job_id);
        info!("⏱️  Runtime: {:.2}s", runtime_secs);
        if let Some(n) = matched_ids {
            info!("🎯 Distinct matched ids: {}", n);
        }
    } else {
        error!("❌ ===== MATCH JOB FAILED =====");
        error!("📅 Match job ID: {}", job_id);
        error!("⏱️  Runtime before failure: {:.2}s", runtime_secs);
    }
    info!("=================================");
}
