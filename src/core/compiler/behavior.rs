use super::{
    CompileContext, JobPlan, PlannedStatement, StepKind, TIMESTAMP_FIELD, pipeline_name_step,
    sink_connector, source_connector,
};
use crate::core::jobs::{BehaviorJobConfig, JobKind};
use crate::core::sql::{
    InsertBuilder, SchemaBuilder, SelectBuilder, SqlError, StatementSetBuilder, TableBuilder,
    TumbleCountBuilder, ViewBuilder, data_type, require,
};

/// Names of everything a behavior job creates on the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorObjects {
    pub source_table: String,
    pub filter_view: String,
    pub profile_view: String,
    pub behavior_sink: String,
    pub profiling_sink: String,
    pub pipeline_name: String,
}

impl BehaviorObjects {
    pub fn for_job(id: &str) -> Self {
        Self {
            source_table: format!("source_{id}"),
            filter_view: format!("behavior_{id}"),
            profile_view: format!("profile_{id}"),
            behavior_sink: format!("behavior_sink_{id}"),
            profiling_sink: format!("profiling_sink_{id}"),
            pipeline_name: JobKind::Behavior.namespaced(id),
        }
    }
}

pub fn plan_behavior(job: &BehaviorJobConfig, ctx: &CompileContext) -> Result<JobPlan, SqlError> {
    require(&job.id, "job id")?;
    let names = BehaviorObjects::for_job(&job.id);
    let raw_ts = job
        .source
        .timestamp_field
        .as_deref()
        .filter(|field| !field.trim().is_empty())
        .ok_or(SqlError::Missing("source timestamp field"))?;
    let source_columns = job.source.ordered_columns();

    let source_table = TableBuilder::new(&names.source_table)
        .with_schema(
            SchemaBuilder::new()
                .with_columns(source_columns.iter().copied())
                .with_timestamp_field(raw_ts, TIMESTAMP_FIELD)
                .build()?,
        )
        .with_connector(source_connector(&job.source, ctx)?)
        .build()?;

    let filter_view = ViewBuilder::new(&names.filter_view)
        .with_expression(
            SelectBuilder::new()
                .with_query_table(&names.source_table)
                .with_fields("*")
                .with_filter(&job.filter)
                .build()?,
        )
        .build()?;

    let profile_view = ViewBuilder::new(&names.profile_view)
        .with_expression(
            TumbleCountBuilder::new()
                .with_query_table(&names.filter_view)
                .with_entities(job.profile.entity_names())
                .with_attributes(job.profile.attribute_names())
                .with_timestamp_field(TIMESTAMP_FIELD)
                .with_minute_interval(job.profile.saving_duration_minutes)
                .build()?,
        )
        .build()?;

    let timestamp_type = data_type::timestamp(3);
    let behavior_sink = TableBuilder::new(&names.behavior_sink)
        .with_schema(
            SchemaBuilder::new()
                .with_columns(source_columns.iter().copied())
                .with_column(TIMESTAMP_FIELD, &timestamp_type)
                .build()?,
        )
        .with_connector(sink_connector(&job.behavior_output, ctx)?)
        .build()?;

    let profiling_sink = TableBuilder::new(&names.profiling_sink)
        .with_schema(
            SchemaBuilder::new()
                .with_column("window_start", &timestamp_type)
                .with_column("window_end", &timestamp_type)
                .with_column("cnt", data_type::BIGINT)
                .with_column("entities", data_type::STRING)
                .with_column("attributes", data_type::STRING)
                .build()?,
        )
        .with_connector(sink_connector(&job.profile_output, ctx)?)
        .build()?;

    let statement_set = StatementSetBuilder::new()
        .with_insert_statement(copy_all(&names.behavior_sink, &names.filter_view)?)
        .with_insert_statement(copy_all(&names.profiling_sink, &names.profile_view)?)
        .build()?;

    let steps = vec![
        PlannedStatement {
            step: "create source table",
            kind: StepKind::CreateTable,
            object: names.source_table.clone(),
            sql: source_table,
        },
        PlannedStatement {
            step: "create filter view",
            kind: StepKind::CreateView,
            object: names.filter_view.clone(),
            sql: filter_view,
        },
        PlannedStatement {
            step: "create profile view",
            kind: StepKind::CreateView,
            object: names.profile_view.clone(),
            sql: profile_view,
        },
        PlannedStatement {
            step: "create behavior sink",
            kind: StepKind::CreateTable,
            object: names.behavior_sink.clone(),
            sql: behavior_sink,
        },
        PlannedStatement {
            step: "create profiling sink",
            kind: StepKind::CreateTable,
            object: names.profiling_sink.clone(),
            sql: profiling_sink,
        },
        pipeline_name_step(&names.pipeline_name)?,
        PlannedStatement {
            step: "submit statement set",
            kind: StepKind::StatementSet,
            object: names.pipeline_name.clone(),
            sql: statement_set,
        },
    ];

    Ok(JobPlan {
        job_id: job.id.clone(),
        pipeline_name: names.pipeline_name,
        steps,
    })
}

fn copy_all(destination: &str, source: &str) -> Result<String, SqlError> {
    InsertBuilder::new()
        .with_destination_table(destination)
        .with_expression(
            SelectBuilder::new()
                .with_query_table(source)
                .with_fields("*")
                .build()?,
        )
        .build()
}
