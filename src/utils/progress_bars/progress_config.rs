// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

/// Configuration for progress tracking of match jobs
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show per-stage sub-progress bars
    pub detailed: bool,
    /// Whether to show memory usage in stage logs
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_env_with_prefix("PROGRESS")
    }

    fn from_env_with_prefix(prefix: &str) -> Self {
        Self {
            enabled: env_flag(&format!("{}_ENABLED", prefix), true),
            detailed: env_flag(&format!("{}_DETAILED", prefix), true),
            show_memory: env_flag(&format!("{}_SHOW_MEMORY", prefix), true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

/// Bar used for the job's stage progression.
pub fn stage_progress_bar(multi_progress: &MultiProgress, stages: u64) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(stages));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb
}

/// Bar used for item-level work inside a stage (pairs contrasted, ...).
pub fn item_progress_bar(multi_progress: &MultiProgress, len: u64, message: &str) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(len));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Environment variable configuration example
pub fn print_env_config_example() {
    println!("# Progress Tracking Configuration");
    println!();
    println!("# Enable/disable all progress bars (default: true)");
    println!("export PROGRESS_ENABLED=true");
    println!();
    println!("# Show per-stage sub-progress bars (default: true)");
    println!("export PROGRESS_DETAILED=true");
    println!();
    println!("# Show memory usage in stage logs (default: true)");
    println!("export PROGRESS_SHOW_MEMORY=true");
    println!();
    println!("# For minimal output (CI/automated environments):");
    println!("export PROGRESS_ENABLED=false");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.detailed);
        assert!(config.show_memory);
    }

    #[test]
    fn test_env_config() {
        // A private prefix keeps this test independent of the process env.
        env::set_var("MATCHER_TEST_PROGRESS_ENABLED", "false");
        env::set_var("MATCHER_TEST_PROGRESS_DETAILED", "false");
        env::set_var("MATCHER_TEST_PROGRESS_SHOW_MEMORY", "not-a-bool");

        let config = ProgressConfig::from_env_with_prefix("MATCHER_TEST_PROGRESS");
        assert!(!config.enabled);
        assert!(!config.detailed);
        assert!(config.show_memory);

        env::remove_var("MATCHER_TEST_PROGRESS_ENABLED");
        env::remove_var("MATCHER_TEST_PROGRESS_DETAILED");
        env::remove_var("MATCHER_TEST_PROGRESS_SHOW_MEMORY");
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();

        config.enabled = true;
        assert!(config.create_multi_progress().is_some());

        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
    }

    #[test]
    fn test_should_show_methods() {
        let mut config = ProgressConfig::default();
        assert!(config.should_show_detailed());
        assert!(config.should_show_memory());

        config.enabled = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());

        config.enabled = true;
        config.detailed = false;
        config.show_memory = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
    }
}
