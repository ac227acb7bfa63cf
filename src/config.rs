// Harness configuration sourced from a YAML file.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

// Default location mirrors where deployments mount the config.
pub const DEFAULT_CONFIG_PATH: &str = "conf.d/config.yml";
// Environment override for the config path.
pub const CONFIG_PATH_ENV: &str = "NATS_BENCH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Connection for the log-based (JetStream) delivery model.
    pub jetstream: BrokerConnection,
    // Connection for the core pub/sub delivery model.
    pub core: BrokerConnection,
    // Scenario keys to run, in order. Duplicates re-run the scenario.
    #[serde(default)]
    pub enabled_testers: Vec<String>,
    #[serde(default)]
    pub testers: Testers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConnection {
    pub servers: Vec<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// One optional block per scenario; a block may be present without the
// scenario being enabled, but not the other way around.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Testers {
    pub jetstream_publish_tester: Option<StreamWorkload>,
    pub jetstream_async_publish_tester: Option<StreamWorkload>,
    pub jetstream_subscribe_tester: Option<StreamWorkload>,
    pub jetstream_chan_subscribe_tester: Option<StreamWorkload>,
    pub jetstream_pull_subscribe_tester: Option<PullWorkload>,
    pub jetstream_latency_tester: Option<StreamLatencyWorkload>,
    pub jetstream_purge_stream_tester: Option<PurgeWorkload>,
    pub jetstream_memory_storage_tester: Option<StreamWorkload>,
    pub nats_publish_tester: Option<SubjectWorkload>,
    pub nats_subscribe_tester: Option<SubjectWorkload>,
    pub nats_latency_tester: Option<SubjectLatencyWorkload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamWorkload {
    pub stream: String,
    pub subject: String,
    pub times: usize,
    pub message_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullWorkload {
    pub stream: String,
    pub subject: String,
    pub times: usize,
    pub message_sizes: Vec<usize>,
    // Messages requested per fetch call; one measurement per entry.
    pub fetch_counts: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamLatencyWorkload {
    pub stream: String,
    pub subject: String,
    pub times: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurgeWorkload {
    pub stream: String,
    pub subject: String,
    // Stream fill levels to purge; one measurement per (size, count) pair.
    pub counts: Vec<usize>,
    pub message_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectWorkload {
    pub subject: String,
    pub times: usize,
    pub message_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectLatencyWorkload {
    pub subject: String,
    pub times: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(Path::new(&path))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("parse configuration yaml")
    }
}
