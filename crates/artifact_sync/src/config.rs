use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "artifact-sync.yaml";
const ENV_PREFIX: &str = "ARTIFACT_SYNC";

// Custom deserializer for Duration that accepts integer seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    /// Project the client is bound to. No binding means no endpoints.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_ref_id")]
    pub ref_id: String,
    #[serde(default)]
    pub service_token_path: Option<PathBuf>,
    #[serde(
        default = "default_api_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub api_timeout: Duration,
}

fn default_ref_id() -> String {
    "master".to_string()
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Where metadata payloads are staged. Unset keeps them in memory.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source_tag: default_source_tag(),
            max_retries: default_max_retries(),
            staging_dir: None,
        }
    }
}

fn default_source_tag() -> String {
    "magicdraw".to_string()
}

fn default_max_retries() -> u32 {
    3
}

/// What `submit_commit` does when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Wait for a free slot.
    Block,
    /// Fail the submission with `QueueFull`.
    Reject,
    /// Ignore `queue_capacity`.
    Unbounded,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_backpressure")]
    pub backpressure: BackpressurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            backpressure: default_backpressure(),
        }
    }
}

fn default_queue_capacity() -> usize {
    16
}

fn default_backpressure() -> BackpressurePolicy {
    BackpressurePolicy::Block
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml_str(
            r#"
server:
  base_url: "https://mms.example.org"
  project_id: "PROJECT-1"
"#,
        )
        .unwrap();

        assert_eq!(config.server.ref_id, "master");
        assert_eq!(config.server.api_timeout, Duration::from_secs(60));
        assert_eq!(config.upload.source_tag, "magicdraw");
        assert_eq!(config.upload.max_retries, 3);
        assert_eq!(config.scheduler.queue_capacity, 16);
        assert_eq!(config.scheduler.backpressure, BackpressurePolicy::Block);
        assert_eq!(config.logging.format, "json");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml_str(
            r#"
server:
  base_url: "https://mms.example.org"
  project_id: "PROJECT-1"
  ref_id: "develop"
  api_timeout: 15
upload:
  source_tag: "exporter"
  max_retries: 0
  staging_dir: "/tmp/staging"
scheduler:
  queue_capacity: 4
  backpressure: reject
logging:
  level: debug
  format: pretty
metrics:
  enabled: false
"#,
        )
        .unwrap();

        assert_eq!(config.server.ref_id, "develop");
        assert_eq!(config.server.api_timeout, Duration::from_secs(15));
        assert_eq!(config.upload.source_tag, "exporter");
        assert_eq!(config.upload.max_retries, 0);
        assert_eq!(
            config.upload.staging_dir,
            Some(PathBuf::from("/tmp/staging"))
        );
        assert_eq!(config.scheduler.queue_capacity, 4);
        assert_eq!(config.scheduler.backpressure, BackpressurePolicy::Reject);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_missing_server_section_fails() {
        assert!(Config::from_yaml_str("upload:\n  max_retries: 1\n").is_err());
    }
}
