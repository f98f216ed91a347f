use std::time::Duration;

use super::fixed_context;
use crate::core::compiler::{CompileError, compile, plan_job};
use crate::core::gateway::{GatewayClient, GatewayError, PollPolicy};
use crate::core::jobs::JobConfig;
use crate::core::sql::SqlError;
use crate::core::test_support::{
    MockGateway, MockGatewayConfig, RecordingExecutor, behavior_job, rule_job,
};

#[tokio::test]
async fn behavior_job_runs_every_step_and_returns_job_id() {
    let executor = RecordingExecutor::default();
    let job = JobConfig::Behavior(behavior_job("b1"));

    let compiled = compile(&job, &fixed_context(), &executor).await.unwrap();

    assert_eq!(compiled.pipeline_name, "behavior_b1");
    assert_eq!(compiled.flink_job_id.as_deref(), Some("job-7"));
    let planned: Vec<String> = plan_job(&job, &fixed_context())
        .unwrap()
        .steps
        .into_iter()
        .map(|s| s.sql)
        .collect();
    assert_eq!(executor.statements(), planned);
}

#[tokio::test]
async fn failing_step_stops_the_pipeline() {
    let executor = RecordingExecutor::failing_on("CREATE TABLE behavior_sink_b1");
    let job = JobConfig::Behavior(behavior_job("b1"));

    let err = compile(&job, &fixed_context(), &executor).await.unwrap_err();

    match err {
        CompileError::Step {
            step,
            object,
            source,
        } => {
            assert_eq!(step, "create behavior sink");
            assert_eq!(object, "behavior_sink_b1");
            assert!(matches!(source, GatewayError::Remote(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    // source table, filter view and profile view went through before the failure
    assert_eq!(executor.statements().len(), 3);
}

#[tokio::test]
async fn invalid_definition_submits_nothing() {
    let executor = RecordingExecutor::default();
    let mut cfg = rule_job("r1");
    cfg.filter.clear();

    let err = compile(&JobConfig::Rule(cfg), &fixed_context(), &executor)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::Sql(SqlError::Missing("filter predicate"))
    ));
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn rule_job_compiles_against_gateway() {
    let gateway = MockGateway::start(MockGatewayConfig {
        not_ready_polls: 1,
        ..MockGatewayConfig::default()
    })
    .await;
    let client = GatewayClient::new(
        gateway.base_url(),
        Duration::from_secs(5),
        PollPolicy::new(5, Duration::from_millis(20)),
    )
    .unwrap();
    let session = client.create_session().await.unwrap();

    let compiled = compile(&JobConfig::Rule(rule_job("r1")), &fixed_context(), &session)
        .await
        .unwrap();

    assert_eq!(compiled.pipeline_name, "rule_r1");
    assert_eq!(compiled.flink_job_id.as_deref(), Some("flink-job-1"));
    let statements = gateway.statements();
    assert_eq!(statements.len(), 5);
    assert!(statements[0].starts_with("CREATE TABLE profiling_predictor_r1("));
    assert!(statements[4].starts_with("EXECUTE STATEMENT SET BEGIN INSERT INTO rule_sink_r1"));
    // one NOT_READY answer per operation before it turned ready
    assert_eq!(gateway.total_polls(), 10);
    gateway.server.shutdown().await;
}
