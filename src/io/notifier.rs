// src/io/notifier.rs

use log::{error, info, warn};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::pipeline::collaborators::{JobCompletion, JobNotifier};

/// Logs job completions.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl JobNotifier for LogNotifier {
    fn notify_job_completion(&self, completion: &JobCompletion) {
        if completion.success {
            info!(
                "Match job {} finished in {:.2}s; outputs: {:?}",
                completion.job_id, completion.runtime_secs, completion.output_locations
            );
        } else {
            warn!(
                "Match job {} failed after {:.2}s",
                completion.job_id, completion.runtime_secs
            );
        }
    }
}

/// Appends one JSON line per completion to a spool file read by the
/// external job system.
#[derive(Debug, Clone)]
pub struct SpoolNotifier {
    path: PathBuf,
}

impl SpoolNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, completion: &JobCompletion) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(completion)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl JobNotifier for SpoolNotifier {
    fn notify_job_completion(&self, completion: &JobCompletion) {
        if let Err(e) = self.append(completion) {
            error!(
                "Failed to spool completion of job {} to {}: {}",
                completion.job_id,
                self.path.display(),
                e
            );
        }
    }
}
