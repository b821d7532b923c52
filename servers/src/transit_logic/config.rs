use anyhow::{Context, Result, bail};
use clap::Parser;
use lib_common::core::dispatcher::DEFAULT_OUTBOX_CAPACITY;
use lib_common::ingestors::PollerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "server_transit.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "GTFS-Realtime vehicle position relay", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "TRANSIT_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "TRANSIT_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TRANSIT_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TRANSIT_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TRANSIT_FEED_URL", help = "GTFS-Realtime VehiclePositions feed URL.")]
    pub feed_url: Option<String>,

    #[clap(long, env = "TRANSIT_API_KEY", hide_env_values = true, help = "API key sent as the `key` query parameter.")]
    pub api_key: Option<String>,

    #[clap(long, env = "TRANSIT_POLL_INTERVAL_SECONDS", help = "Seconds between the starts of two poll cycles.")]
    pub poll_interval_seconds: Option<f64>,

    #[clap(long, env = "TRANSIT_FETCH_TIMEOUT_SECONDS", help = "Upper bound in seconds for a single feed fetch.")]
    pub fetch_timeout_seconds: Option<f64>,

    #[clap(long, env = "TRANSIT_FETCH_RETRIES", help = "Retries for transient HTTP failures within one fetch.")]
    pub fetch_retries: Option<u32>,

    #[clap(long, env = "TRANSIT_OUTBOX_CAPACITY", help = "Snapshots buffered per subscriber before it is dropped.")]
    pub outbox_capacity: Option<usize>,
}

/// Fully resolved settings the server runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub feed_url: String,
    pub api_key: String,
    pub poller: PollerConfig,
    pub fetch_retries: u32,
    pub outbox_capacity: usize,
}

impl Config {
    fn defaults() -> Config {
        let poller = PollerConfig::default();
        Config {
            port: Some(5001),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            feed_url: Some("https://otd.delhi.gov.in/api/realtime/VehiclePositions.pb".to_string()),
            poll_interval_seconds: Some(poller.poll_interval.as_secs_f64()),
            fetch_timeout_seconds: Some(poller.fetch_timeout.as_secs_f64()),
            fetch_retries: Some(2),
            outbox_capacity: Some(DEFAULT_OUTBOX_CAPACITY),
            ..Default::default()
        }
    }

    // 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            feed_url: other.feed_url.or(self.feed_url),
            api_key: other.api_key.or(self.api_key),
            poll_interval_seconds: other.poll_interval_seconds.or(self.poll_interval_seconds),
            fetch_timeout_seconds: other.fetch_timeout_seconds.or(self.fetch_timeout_seconds),
            fetch_retries: other.fetch_retries.or(self.fetch_retries),
            outbox_capacity: other.outbox_capacity.or(self.outbox_capacity),
        }
    }

    fn resolve(self) -> Result<Settings> {
        let api_key = match self.api_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => bail!("no API key configured (set TRANSIT_API_KEY or --api-key)"),
        };
        let outbox_capacity = self.outbox_capacity.unwrap_or(DEFAULT_OUTBOX_CAPACITY);
        if outbox_capacity == 0 {
            bail!("outbox capacity must be at least 1");
        }
        let poller = match (self.poll_interval_seconds, self.fetch_timeout_seconds) {
            (Some(interval), Some(timeout)) => {
                PollerConfig::from_secs(interval, timeout).context("invalid poller timing")?
            }
            _ => PollerConfig::default(),
        };

        Ok(Settings {
            port: self.port.unwrap_or(5001),
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
            feed_url: self.feed_url.context("no feed URL configured")?,
            api_key,
            poller,
            fetch_retries: self.fetch_retries.unwrap_or(2),
            outbox_capacity,
        })
    }
}

// Runs before the logger exists, so failures are returned rather than logged
fn read_config_file(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let file_config = serde_json::from_str::<Config>(&config_str)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(file_config))
}

/// Layers defaults, then the JSON config file, then CLI/env values.
pub fn resolve_config(cli: Config) -> Result<Settings> {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path)? {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli).resolve()
}

pub fn load_config() -> Result<Settings> {
    resolve_config(Config::parse())
}
