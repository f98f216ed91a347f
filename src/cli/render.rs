use anyhow::{Context, Result, bail};
use console::style;

use super::parse_service_flags;
use crate::core::compiler::{CompileContext, JobPlan};
use crate::core::jobs::{JobConfig, JobKind};
use crate::core::manager::JobWorker;

pub async fn run_render(args: &[String], start: usize) -> Result<()> {
    let (Some(kind), Some(path)) = (args.get(start), args.get(start + 1)) else {
        bail!("usage: flink-job-manager render <behavior|rule> <job.json>");
    };
    let flags = parse_service_flags(args, start + 2)?;
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let ctx = CompileContext::now(flags.kafka_group_id.unwrap_or_default());

    let plan = render_job(kind, &raw, &ctx)?;
    for step in &plan.steps {
        println!(
            "{}",
            style(format!("-- {} ({})", step.step, step.object)).dim()
        );
        println!("{};\n", step.sql);
    }
    Ok(())
}

pub(crate) fn render_job(kind: &str, raw: &str, ctx: &CompileContext) -> Result<JobPlan> {
    let Some(kind) = JobKind::from_name(kind) else {
        bail!("unknown job kind `{}` (expected behavior or rule)", kind);
    };
    let job = JobConfig::from_json(kind, raw)
        .with_context(|| format!("invalid {} job definition", kind.as_str()))?;
    Ok(JobWorker::new(job).plan(ctx)?)
}
