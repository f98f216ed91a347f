use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::gateway::PollPolicy;
use crate::core::manager::ManagerSettings;

pub const DEFAULT_CONFIG_PATH: &str = "./config.yml";
pub const CONFIG_PATH_ENV: &str = "FLINK_MANAGER_CONFIG";

const DEFAULT_JOBS_ENDPOINT: &str = "http://localhost:9090/api/v2/worker/stateless/jobs";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub flink_sql_gateway: GatewayConfig,

    #[serde(default)]
    pub kafka_group_id: String,

    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_jobs_endpoint")]
    pub behavior_get_job: String,
    #[serde(default = "default_jobs_endpoint")]
    pub rule_get_job: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Passes a failed job may stay absent from the job source before it is
    /// forgotten. `0` keeps failed jobs forever.
    #[serde(default = "default_failed_job_retention_passes")]
    pub failed_job_retention_passes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9999
}
fn default_jobs_endpoint() -> String {
    DEFAULT_JOBS_ENDPOINT.to_string()
}
fn default_gateway_url() -> String {
    "http://localhost:8083".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_poll_max_attempts() -> u32 {
    5
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_reconcile_interval_secs() -> u64 {
    600
}
fn default_failed_job_retention_passes() -> u64 {
    6
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            behavior_get_job: default_jobs_endpoint(),
            rule_get_job: default_jobs_endpoint(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_max_attempts: default_poll_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            failed_job_retention_passes: default_failed_job_retention_passes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            bail!("configuration file not found: {}", path.display());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        // An empty file is a valid document with every default.
        let config: AppConfig = if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(content).context("invalid configuration")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_http_url("flink_sql_gateway.url", &self.flink_sql_gateway.url)?;
        check_http_url("endpoint.behavior_get_job", &self.endpoint.behavior_get_job)?;
        check_http_url("endpoint.rule_get_job", &self.endpoint.rule_get_job)?;
        ensure!(
            self.flink_sql_gateway.poll_max_attempts >= 1,
            "flink_sql_gateway.poll_max_attempts must be at least 1"
        );
        ensure!(
            self.flink_sql_gateway.request_timeout_secs >= 1,
            "flink_sql_gateway.request_timeout_secs must be at least 1"
        );
        ensure!(
            self.manager.reconcile_interval_secs >= 1,
            "manager.reconcile_interval_secs must be at least 1"
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.flink_sql_gateway.request_timeout_secs)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.flink_sql_gateway.poll_max_attempts,
            Duration::from_millis(self.flink_sql_gateway.poll_interval_ms),
        )
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.manager.reconcile_interval_secs)
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            kafka_group_id: self.kafka_group_id.clone(),
            failed_job_retention_passes: self.manager.failed_job_retention_passes,
        }
    }
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("{field} is not a valid URL: {value}"))?;
    ensure!(
        matches!(url.scheme(), "http" | "https"),
        "{field} must be an http(s) URL, got {value}"
    );
    Ok(())
}
