use crate::core::compiler::{CompileContext, CompileError, CompiledJob, JobPlan, compile, plan_job};
use crate::core::gateway::StatementExecutor;
use crate::core::jobs::{JobConfig, JobKind};
use crate::core::sql::SqlError;

/// One desired job paired with the key it is tracked under.
#[derive(Debug, Clone)]
pub struct JobWorker {
    id: String,
    job: JobConfig,
}

impl JobWorker {
    pub fn new(job: JobConfig) -> Self {
        Self {
            id: job.namespaced_id(),
            job,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.job.kind()
    }

    pub fn plan(&self, ctx: &CompileContext) -> Result<JobPlan, SqlError> {
        plan_job(&self.job, ctx)
    }

    pub async fn run(
        &self,
        ctx: &CompileContext,
        executor: &dyn StatementExecutor,
    ) -> Result<CompiledJob, CompileError> {
        compile(&self.job, ctx, executor).await
    }
}
