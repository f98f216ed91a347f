use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::{ServiceFlags, load_config};
use crate::core::gateway::GatewayClient;
use crate::core::jobs::HttpJobSource;
use crate::core::lifecycle::LifecycleManager;
use crate::core::manager::{JobManager, JobRegistry, attach_reconciler};
use crate::core::terminal::{self, GuideSection};
use crate::interfaces::web::ApiServer;
use crate::logging;

pub async fn run_service(flags: ServiceFlags) -> Result<()> {
    let (config_path, config) = load_config(&flags).await?;
    let level = logging::parse_level(
        flags
            .log_level
            .as_deref()
            .unwrap_or(config.logging.level.as_str()),
    )?;
    logging::init(level);
    info!("Loaded configuration from {}", config_path.display());

    let (api_host, api_port) = flags.api_address(&config);
    info!("Starting flink-job-manager...");

    let client = GatewayClient::new(
        &config.flink_sql_gateway.url,
        config.request_timeout(),
        config.poll_policy(),
    )?;
    let session = client.create_session().await.with_context(|| {
        format!(
            "cannot open a session on the SQL gateway at {}",
            config.flink_sql_gateway.url
        )
    })?;
    let session_id = session.id().to_string();
    let source = HttpJobSource::new(
        config.endpoint.behavior_get_job.clone(),
        config.endpoint.rule_get_job.clone(),
        config.request_timeout(),
    )?;

    let manager = JobManager::new(
        Arc::new(source),
        Arc::new(session),
        JobRegistry::new_shared(),
        config.manager_settings(),
    );

    let mut lifecycle = LifecycleManager::new().await?;
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(
        manager.registry(),
        api_host.clone(),
        api_port,
    ))));
    attach_reconciler(&mut lifecycle, manager, config.reconcile_interval()).await?;
    lifecycle.start().await?;

    GuideSection::new("Job Manager Running")
        .status(
            "Jobs API",
            &format!("http://{}:{}/api/v1/jobs", api_host, api_port),
        )
        .status("SQL Gateway", &config.flink_sql_gateway.url)
        .status("Gateway session", &session_id)
        .status(
            "Reconcile every",
            &format!("{}s", config.manager.reconcile_interval_secs),
        )
        .blank()
        .status(
            "Press Ctrl+C to stop the manager.",
            &format!("{}", style("Ctrl+C").bold().yellow()),
        )
        .print();

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    terminal::print_goodbye();
    Ok(())
}
