//! Turns job definitions into ordered SQL programs and runs them through a
//! gateway session.
//!
//! Compilation happens in two phases. Planning renders every statement up
//! front, so a malformed definition fails before anything is created
//! remotely. Execution then submits the statements one by one; later
//! statements depend on the objects earlier ones created, so the first
//! failure stops the job.

mod behavior;
mod rule;

#[cfg(test)]
mod tests;

pub use behavior::{BehaviorObjects, plan_behavior};
pub use rule::{RuleObjects, plan_rule};

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::gateway::{GatewayError, StatementExecutor};
use crate::core::jobs::{JobConfig, StreamDescriptor};
use crate::core::sql::{ConnectorBuilder, SetConfigBuilder, SqlError};

/// Derived event-time column added to behavior sources.
pub const TIMESTAMP_FIELD: &str = "converted_ts";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid job definition: {0}")]
    Sql(#[from] SqlError),

    #[error("step `{step}` ({object}) failed: {source}")]
    Step {
        step: &'static str,
        object: String,
        #[source]
        source: GatewayError,
    },
}

/// Inputs that are not part of the job definition itself.
#[derive(Debug, Clone)]
pub struct CompileContext {
    pub kafka_group_id: String,
    pub compiled_at: NaiveDateTime,
}

impl CompileContext {
    pub fn now(kafka_group_id: impl Into<String>) -> Self {
        Self {
            kafka_group_id: kafka_group_id.into(),
            compiled_at: Local::now().naive_local(),
        }
    }

    pub fn alert_time(&self) -> String {
        self.compiled_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    CreateTable,
    CreateView,
    SetConfig,
    StatementSet,
}

impl StepKind {
    fn creates_object(self) -> bool {
        matches!(self, StepKind::CreateTable | StepKind::CreateView)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStatement {
    pub step: &'static str,
    pub kind: StepKind,
    pub object: String,
    pub sql: String,
}

/// Every statement one job submits, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    pub job_id: String,
    pub pipeline_name: String,
    pub steps: Vec<PlannedStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledJob {
    pub pipeline_name: String,
    pub flink_job_id: Option<String>,
}

impl JobPlan {
    pub async fn execute(
        &self,
        executor: &dyn StatementExecutor,
    ) -> Result<CompiledJob, CompileError> {
        let mut created: Vec<&str> = Vec::new();
        let mut flink_job_id = None;

        for step in &self.steps {
            debug!(job = %self.job_id, step = step.step, "{}", step.sql);
            let result = match executor.execute(&step.sql).await {
                Ok(result) => result,
                Err(source) => {
                    if !created.is_empty() {
                        warn!(
                            job = %self.job_id,
                            "Pipeline {} stopped at `{}`; objects left on the cluster: {}",
                            self.pipeline_name,
                            step.step,
                            created.join(", ")
                        );
                    }
                    return Err(CompileError::Step {
                        step: step.step,
                        object: step.object.clone(),
                        source,
                    });
                }
            };
            debug!(job = %self.job_id, result_type = %result.result_type, "Operation ready");
            info!(job = %self.job_id, "Step `{}` done ({})", step.step, step.object);
            if step.kind.creates_object() {
                created.push(&step.object);
            }
            if step.kind == StepKind::StatementSet {
                flink_job_id = result.job_id;
            }
        }

        Ok(CompiledJob {
            pipeline_name: self.pipeline_name.clone(),
            flink_job_id,
        })
    }
}

pub fn plan_job(job: &JobConfig, ctx: &CompileContext) -> Result<JobPlan, SqlError> {
    match job {
        JobConfig::Behavior(cfg) => plan_behavior(cfg, ctx),
        JobConfig::Rule(cfg) => plan_rule(cfg, ctx),
    }
}

pub async fn compile(
    job: &JobConfig,
    ctx: &CompileContext,
    executor: &dyn StatementExecutor,
) -> Result<CompiledJob, CompileError> {
    let plan = plan_job(job, ctx)?;
    plan.execute(executor).await
}

fn kafka_connector(stream: &StreamDescriptor, ctx: &CompileContext) -> ConnectorBuilder {
    ConnectorBuilder::new()
        .with_option("connector", "kafka")
        .with_option("topic", &stream.topic)
        .with_option("properties.bootstrap.servers", &stream.bootstrap_servers)
        .with_option("properties.group.id", &ctx.kafka_group_id)
        .with_option("format", "json")
}

/// Kafka source options: read from the earliest offset and tolerate
/// malformed or partial JSON records.
fn source_connector(stream: &StreamDescriptor, ctx: &CompileContext) -> Result<String, SqlError> {
    kafka_connector(stream, ctx)
        .with_option("scan.startup.mode", "earliest-offset")
        .with_option("json.timestamp-format.standard", "ISO-8601")
        .with_option("json.ignore-parse-errors", "true")
        .with_option("json.fail-on-missing-field", "false")
        .build()
}

fn sink_connector(stream: &StreamDescriptor, ctx: &CompileContext) -> Result<String, SqlError> {
    kafka_connector(stream, ctx).build()
}

fn pipeline_name_step(pipeline_name: &str) -> Result<PlannedStatement, SqlError> {
    Ok(PlannedStatement {
        step: "set pipeline name",
        kind: StepKind::SetConfig,
        object: pipeline_name.to_string(),
        sql: SetConfigBuilder::new()
            .with_config("pipeline.name", pipeline_name)
            .build()?,
    })
}
