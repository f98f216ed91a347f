mod render;
mod service;

use anyhow::{Context, Result, bail};
use console::style;
use std::path::PathBuf;

use crate::core::config::{AppConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use crate::core::terminal::{self, GuideSection, print_error, print_success};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Service")
        .command("run", "Start the job manager (default)")
        .command("check-config", "Load and validate the configuration")
        .print();

    GuideSection::new("Tools")
        .command(
            "render <behavior|rule> <job.json>",
            "Print the statements a job would submit",
        )
        .command("help", "Show this message")
        .print();

    GuideSection::new("Flags")
        .command("--config <path>", "Configuration file (default ./config.yml)")
        .command("--log-level <level>", "trace, debug, info, warn or error")
        .command("--api-host <host>", "Bind host of the jobs API")
        .command("--api-port <port>", "Bind port of the jobs API")
        .command("--kafka-group-id <id>", "Consumer group used by render")
        .print();

    println!(
        "\n {} {} [command] [flags]\n",
        style("Usage:").bold(),
        style("flink-job-manager").green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServiceFlags {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
    pub kafka_group_id: Option<String>,
}

impl ServiceFlags {
    pub fn api_address(&self, config: &AppConfig) -> (String, u16) {
        (
            self.api_host
                .clone()
                .unwrap_or_else(|| config.service.host.clone()),
            self.api_port.unwrap_or(config.service.port),
        )
    }
}

pub(crate) fn parse_service_flags(args: &[String], start: usize) -> Result<ServiceFlags> {
    let mut flags = ServiceFlags::default();
    let mut i = start;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--config" | "-c" => {
                flags.config_path = Some(value.context("--config needs a path")?);
                i += 2;
            }
            "--log-level" => {
                flags.log_level = Some(value.context("--log-level needs a level")?);
                i += 2;
            }
            "--api-host" => {
                flags.api_host = Some(value.context("--api-host needs a host")?);
                i += 2;
            }
            "--api-port" => {
                let raw = value.context("--api-port needs a port")?;
                flags.api_port = Some(
                    raw.parse()
                        .with_context(|| format!("invalid --api-port `{}`", raw))?,
                );
                i += 2;
            }
            "--kafka-group-id" => {
                flags.kafka_group_id = Some(value.context("--kafka-group-id needs a value")?);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(flags)
}

/// `--config` wins over the environment, which wins over `./config.yml`.
pub(crate) fn resolve_config_path(flag: Option<&str>, env: Option<String>) -> PathBuf {
    flag.map(PathBuf::from)
        .or_else(|| env.filter(|p| !p.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads the configuration and returns it with the path it came from.
/// Nothing is logged here: the subscriber is installed from the loaded level.
pub(crate) async fn load_config(flags: &ServiceFlags) -> Result<(PathBuf, AppConfig)> {
    let path = resolve_config_path(
        flags.config_path.as_deref(),
        std::env::var(CONFIG_PATH_ENV).ok(),
    );
    let config = AppConfig::load(&path).await?;
    Ok((path, config))
}

async fn check_config(flags: ServiceFlags) -> Result<()> {
    let (path, config) = load_config(&flags).await?;
    let (api_host, api_port) = flags.api_address(&config);

    GuideSection::new("Configuration")
        .status("File", &path.display().to_string())
        .status("Jobs API", &format!("http://{}:{}/api/v1/jobs", api_host, api_port))
        .status("SQL Gateway", &config.flink_sql_gateway.url)
        .status(
            "Result polling",
            &format!(
                "{} attempts, {} ms apart",
                config.poll_policy().max_attempts,
                config.flink_sql_gateway.poll_interval_ms
            ),
        )
        .status("Behavior jobs", &config.endpoint.behavior_get_job)
        .status("Rule jobs", &config.endpoint.rule_get_job)
        .status("Kafka group", &config.kafka_group_id)
        .status(
            "Reconcile every",
            &format!("{}s", config.manager.reconcile_interval_secs),
        )
        .status("Log level", &config.logging.level)
        .print();
    print_success("Configuration is valid.");
    Ok(())
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("run");

    match cmd {
        "run" => service::run_service(parse_service_flags(&args, 2)?).await,
        "render" => render::run_render(&args, 2).await,
        "check-config" => check_config(parse_service_flags(&args, 2)?).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        flag if flag.starts_with('-') => service::run_service(parse_service_flags(&args, 1)?).await,
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            bail!("unknown command `{}`", other)
        }
    }
}
