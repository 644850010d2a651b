// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use matcher_lib::candidate_generation::KeyExtractorRegistry;
use matcher_lib::config::MatcherConfig;
use matcher_lib::io::{file_collaborators, LogNotifier, SpoolNotifier};
use matcher_lib::matching::ComparatorRegistry;
use matcher_lib::pipeline::{JobNotifier, MatchOrchestrator, SchemaLookup};
use matcher_lib::utils::env::load_env;
use matcher_lib::utils::progress_bars::progress_config::{print_env_config_example, ProgressConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one match job over the CSV extracts in a data directory
    Run {
        /// Directory holding `{event_type}.csv` files
        #[arg(long, env = "MATCHER_DATA_DIR")]
        data_dir: String,

        /// Event type and its primary key column, as `event_type=pk_column`
        #[arg(long = "schema", value_parser = parse_schema_entry, required = true)]
        schema: Vec<(String, String)>,

        /// Matcher configuration (YAML). The built-in person config is used when absent.
        #[arg(long, env = "MATCHER_CONFIG")]
        config: Option<PathBuf>,

        /// Upload this job belongs to, passed through to the completion notice
        #[arg(long)]
        upload_id: Option<String>,

        /// Append completion notices to this JSON-lines file instead of only logging them
        #[arg(long, env = "MATCHER_NOTIFY_SPOOL")]
        notify_spool: Option<PathBuf>,

        /// Override the configured worker pool size
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Load and validate a configuration without running a job
    CheckConfig {
        #[arg(long, env = "MATCHER_CONFIG")]
        config: Option<PathBuf>,

        /// Print the effective configuration as YAML
        #[arg(long)]
        print: bool,

        /// Print the PROGRESS_* environment variables the binary reads
        #[arg(long)]
        progress_env: bool,

        /// List the built-in blocking key and comparator methods
        #[arg(long)]
        methods: bool,
    },
}

fn parse_schema_entry(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((event_type, pk)) if !event_type.trim().is_empty() && !pk.trim().is_empty() => {
            Ok((event_type.trim().to_string(), pk.trim().to_string()))
        }
        _ => Err(format!("expected `event_type=pk_column`, got '{}'", value)),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<MatcherConfig> {
    match path {
        Some(path) => MatcherConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load matcher config from {}", path.display())),
        None => {
            info!("No config file given; using the built-in person matching config");
            let config = MatcherConfig::default();
            config.validate().context("Built-in config is invalid")?;
            Ok(config)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig {
            config,
            print,
            progress_env,
            methods,
        } => {
            let config = load_config(config.as_ref())?;
            config
                .clusterer
                .args
                .validate()
                .context("Invalid clusterer arguments")?;
            MatchOrchestrator::new(config.clone(), file_collaborators(), Box::new(LogNotifier))
                .context("Configuration references unknown strategies")?;
            info!("Configuration OK (fingerprint {})", config.fingerprint());
            if print {
                println!(
                    "{}",
                    serde_yaml::to_string(&config).context("Failed to render config")?
                );
            }
            if progress_env {
                print_env_config_example();
            }
            if methods {
                println!(
                    "blocking keys: {}",
                    KeyExtractorRegistry::default().methods().join(", ")
                );
                println!(
                    "comparators: {}",
                    ComparatorRegistry::default().methods().join(", ")
                );
            }
            Ok(())
        }
        Command::Run {
            data_dir,
            schema,
            config,
            upload_id,
            notify_spool,
            workers,
        } => {
            let mut config = load_config(config.as_ref())?;
            if workers.is_some() {
                config.workers = workers;
            }

            let progress_config = ProgressConfig::from_env();
            info!(
                "Progress tracking: enabled={}, detailed={}",
                progress_config.enabled, progress_config.detailed
            );

            let schema_lookup: SchemaLookup = schema.into_iter().collect();
            let notifier: Box<dyn JobNotifier> = match notify_spool {
                Some(path) => Box::new(SpoolNotifier::new(path)),
                None => Box::new(LogNotifier),
            };

            let orchestrator = MatchOrchestrator::new(config, file_collaborators(), notifier)
                .context("Failed to build match orchestrator")?
                .with_progress(&progress_config);

            match orchestrator.run(&data_dir, &schema_lookup, upload_id) {
                Ok(output) => {
                    for (event_type, location) in &output.output_locations {
                        println!("{}\t{}", event_type, location);
                    }
                    Ok(())
                }
                Err(failure) => bail!(failure),
            }
        }
    }
}
