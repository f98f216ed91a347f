use super::{
    CompileContext, JobPlan, PlannedStatement, StepKind, pipeline_name_step, sink_connector,
    source_connector,
};
use crate::core::jobs::{JobKind, RuleJobConfig};
use crate::core::sql::{
    InsertBuilder, SchemaBuilder, SelectBuilder, SqlError, StatementSetBuilder, TableBuilder,
    ViewBuilder, data_type, quote_literal, require,
};

/// Alert columns appended after the upstream columns of the rule sink.
const ALERT_COLUMNS: [(&str, &str); 8] = [
    ("alert_id", data_type::STRING),
    ("alert_time", data_type::STRING),
    ("rule_id", data_type::STRING),
    ("rule_name", data_type::STRING),
    ("technique", data_type::STRING),
    ("severity", data_type::STRING),
    ("risk_score", data_type::BIGINT),
    ("object", data_type::STRING),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleObjects {
    pub source_table: String,
    pub filter_view: String,
    pub rule_sink: String,
    pub pipeline_name: String,
}

impl RuleObjects {
    pub fn for_job(id: &str) -> Self {
        Self {
            source_table: format!("profiling_predictor_{id}"),
            filter_view: format!("rule_{id}"),
            rule_sink: format!("rule_sink_{id}"),
            pipeline_name: JobKind::Rule.namespaced(id),
        }
    }
}

pub fn plan_rule(job: &RuleJobConfig, ctx: &CompileContext) -> Result<JobPlan, SqlError> {
    require(&job.id, "job id")?;
    let object = require(&job.object, "rule object column")?;
    let names = RuleObjects::for_job(&job.id);
    let upstream_columns = job.upstream.ordered_columns();

    let source_table = TableBuilder::new(&names.source_table)
        .with_schema(
            SchemaBuilder::new()
                .with_columns(upstream_columns.iter().copied())
                .build()?,
        )
        .with_connector(source_connector(&job.upstream, ctx)?)
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

    let rule_sink = TableBuilder::new(&names.rule_sink)
        .with_schema(
            SchemaBuilder::new()
                .with_columns(upstream_columns.iter().copied())
                .with_columns(ALERT_COLUMNS)
                .build()?,
        )
        .with_connector(sink_connector(&job.sink, ctx)?)
        .build()?;

    // Row layout must line up with the sink: upstream columns, then ALERT_COLUMNS.
    let projection = format!(
        "*,UUID(),{},{},{},{},{},{},{} AS object",
        quote_literal(&ctx.alert_time()),
        quote_literal(&names.filter_view),
        quote_literal(&job.name),
        quote_literal(&job.technique),
        quote_literal(&job.severity),
        job.risk_score,
        object,
    );
    let statement_set = StatementSetBuilder::new()
        .with_insert_statement(
            InsertBuilder::new()
                .with_destination_table(&names.rule_sink)
                .with_expression(
                    SelectBuilder::new()
                        .with_query_table(&names.filter_view)
                        .with_fields(projection)
                        .build()?,
                )
                .build()?,
        )
        .build()?;

    let steps = vec![
        PlannedStatement {
            step: "create predictor source",
            kind: StepKind::CreateTable,
            object: names.source_table.clone(),
            sql: source_table,
        },
        PlannedStatement {
            step: "create rule view",
            kind: StepKind::CreateView,
            object: names.filter_view.clone(),
            sql: filter_view,
        },
        PlannedStatement {
            step: "create rule sink",
            kind: StepKind::CreateTable,
            object: names.rule_sink.clone(),
            sql: rule_sink,
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
