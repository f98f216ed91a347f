//! In-process stand-ins for the SQL gateway and the job hub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use crate::core::gateway::{GatewayError, OperationResult, StatementExecutor};
use crate::core::jobs::{BehaviorJobConfig, JobSource, RuleJobConfig};
use crate::core::remote::RemoteError;

pub const SESSION_ID: &str = "session-1";

#[derive(Debug, Clone)]
pub struct MockGatewayConfig {
    /// NOT_READY answers per operation before it turns ready.
    pub not_ready_polls: usize,
    /// Statements containing this text are answered with a 500.
    pub fail_statements_containing: Option<String>,
    pub job_id: Option<String>,
    pub session_handle: Option<String>,
}

impl Default for MockGatewayConfig {
    fn default() -> Self {
        Self {
            not_ready_polls: 0,
            fail_statements_containing: None,
            job_id: Some("flink-job-1".to_string()),
            session_handle: Some(SESSION_ID.to_string()),
        }
    }
}

#[derive(Default)]
struct GatewayLog {
    statements: Vec<String>,
    polls: HashMap<String, usize>,
    sessions: usize,
}

#[derive(Clone)]
struct GatewayState {
    config: MockGatewayConfig,
    log: Arc<Mutex<GatewayLog>>,
}

pub struct MockServer {
    pub base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockServer {
    async fn start(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        Self {
            base_url: format!("http://{}", addr),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub struct MockGateway {
    pub server: MockServer,
    log: Arc<Mutex<GatewayLog>>,
}

impl MockGateway {
    pub async fn start(config: MockGatewayConfig) -> Self {
        let log = Arc::new(Mutex::new(GatewayLog::default()));
        let state = GatewayState {
            config,
            log: Arc::clone(&log),
        };
        let app = Router::new()
            .route("/v1/sessions", post(create_session))
            .route("/v1/sessions/{sid}/statements", post(submit_statement))
            .route(
                "/v1/sessions/{sid}/operations/{oid}/result/{index}",
                get(fetch_result),
            )
            .with_state(state);
        Self {
            server: MockServer::start(app).await,
            log,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.server.base_url
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).statements.clone()
    }

    pub fn total_polls(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .polls
            .values()
            .sum()
    }

    pub fn sessions_created(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).sessions
    }
}

async fn create_session(State(state): State<GatewayState>) -> Json<Value> {
    state.log.lock().unwrap_or_else(|e| e.into_inner()).sessions += 1;
    match &state.config.session_handle {
        Some(handle) => Json(json!({ "sessionHandle": handle })),
        None => Json(json!({ "unexpected": true })),
    }
}

async fn submit_statement(
    State(state): State<GatewayState>,
    Path(_sid): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    let statement = payload
        .get("statement")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Some(pattern) = &state.config.fail_statements_containing
        && statement.contains(pattern.as_str())
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, "statement rejected").into_response();
    }
    let mut log = state.log.lock().unwrap_or_else(|e| e.into_inner());
    log.statements.push(statement);
    let op = format!("op-{}", log.statements.len());
    Json(json!({ "operationHandle": op })).into_response()
}

async fn fetch_result(
    State(state): State<GatewayState>,
    Path((_sid, oid, _index)): Path<(String, String, u64)>,
) -> Json<Value> {
    let mut log = state.log.lock().unwrap_or_else(|e| e.into_inner());
    let seen = log.polls.entry(oid.clone()).or_insert(0);
    *seen += 1;
    if *seen <= state.config.not_ready_polls {
        return Json(json!({ "resultType": "NOT_READY", "nextResultUri": null }));
    }

    let statement = oid
        .strip_prefix("op-")
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| log.statements.get(n - 1))
        .cloned()
        .unwrap_or_default();
    let mut body = json!({
        "resultType": "EOS",
        "results": { "columns": [], "data": [] },
    });
    if statement.starts_with("EXECUTE STATEMENT SET")
        && let Some(job_id) = &state.config.job_id
    {
        body["jobID"] = json!(job_id);
    }
    Json(body)
}

#[derive(Clone)]
struct HubState {
    behavior: Arc<Mutex<(StatusCode, Value)>>,
    rule: Arc<Mutex<(StatusCode, Value)>>,
}

/// Serves `/behavior` and `/rule` with whatever was last set.
pub struct MockJobHub {
    pub server: MockServer,
    state: HubState,
}

impl MockJobHub {
    pub async fn start(behavior: Value, rule: Value) -> Self {
        let state = HubState {
            behavior: Arc::new(Mutex::new((StatusCode::OK, behavior))),
            rule: Arc::new(Mutex::new((StatusCode::OK, rule))),
        };
        let app = Router::new()
            .route("/behavior", get(serve_behavior))
            .route("/rule", get(serve_rule))
            .with_state(state.clone());
        Self {
            server: MockServer::start(app).await,
            state,
        }
    }

    pub fn behavior_url(&self) -> String {
        format!("{}/behavior", self.server.base_url)
    }

    pub fn rule_url(&self) -> String {
        format!("{}/rule", self.server.base_url)
    }

    pub fn set_rule(&self, status: StatusCode, body: Value) {
        *self.state.rule.lock().unwrap_or_else(|e| e.into_inner()) = (status, body);
    }
}

async fn serve_behavior(State(state): State<HubState>) -> Response {
    let (status, body) = state
        .behavior
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    (status, Json(body)).into_response()
}

async fn serve_rule(State(state): State<HubState>) -> Response {
    let (status, body) = state.rule.lock().unwrap_or_else(|e| e.into_inner()).clone();
    (status, Json(body)).into_response()
}

/// Records statements and answers each one as ready, failing any statement
/// that contains `fail_on`.
#[derive(Default)]
pub struct RecordingExecutor {
    pub statements: Mutex<Vec<String>>,
    pub fail_on: Option<String>,
    pub closed: Mutex<bool>,
}

impl RecordingExecutor {
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(&self, statement: &str) -> Result<OperationResult, GatewayError> {
        if let Some(pattern) = &self.fail_on
            && statement.contains(pattern.as_str())
        {
            return Err(GatewayError::Remote(RemoteError::Status {
                endpoint: "mock".to_string(),
                status: 500,
                body: "statement rejected".to_string(),
            }));
        }
        let mut statements = self.statements.lock().unwrap_or_else(|e| e.into_inner());
        statements.push(statement.to_string());
        let job_id = statement
            .starts_with("EXECUTE STATEMENT SET")
            .then(|| format!("job-{}", statements.len()));
        Ok(OperationResult {
            result_type: "EOS".to_string(),
            results: json!({ "data": [] }),
            job_id,
        })
    }

    async fn close(&self) -> Result<(), GatewayError> {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }
}

/// Fixed desired state served from memory.
#[derive(Default)]
pub struct StaticJobSource {
    pub behavior: Mutex<Vec<BehaviorJobConfig>>,
    pub rule: Mutex<Vec<RuleJobConfig>>,
    pub fail_rule_fetch: bool,
}

#[async_trait]
impl JobSource for StaticJobSource {
    async fn behavior_jobs(&self) -> Result<Vec<BehaviorJobConfig>, RemoteError> {
        Ok(self
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn rule_jobs(&self) -> Result<Vec<RuleJobConfig>, RemoteError> {
        if self.fail_rule_fetch {
            return Err(RemoteError::Status {
                endpoint: "mock-rule".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.rule.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

pub fn behavior_job_json(id: &str) -> Value {
    json!({
        "id": id,
        "filter": "action = 'login'",
        "source_config": {
            "bootstrap.servers": "kafka:9092",
            "topic": "raw-logs",
            "schema": {
                "user": "STRING",
                "host": "STRING",
                "action": "STRING",
                "event_time": "STRING"
            },
            "timestamp_field": "event_time"
        },
        "profile_config": {
            "id": "p1",
            "name": "login profile",
            "entity": [{ "field_name": "user", "type": "original" }],
            "attribute": [{ "field_name": "host", "type": "original" }],
            "saving_duration_minute": 5,
            "threshold": 0.8
        },
        "profile_output_config": {
            "bootstrap.servers": "kafka:9092",
            "topic": "profiles"
        },
        "behavior_output_config": {
            "bootstrap.servers": "kafka:9092",
            "topic": "behaviors"
        }
    })
}

pub fn rule_job_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "rare login",
        "filter": "score > 0.9",
        "object": "entities",
        "technique": "T1078",
        "severity": "high",
        "risk_score": 70,
        "profile_predictor_config": {
            "bootstrap.servers": "kafka:9092",
            "topic": "predictions",
            "schema": { "entities": "STRING", "score": "DOUBLE" }
        },
        "rule_output_config": {
            "bootstrap.servers": "kafka:9092",
            "topic": "alerts"
        }
    })
}

pub fn behavior_job(id: &str) -> BehaviorJobConfig {
    serde_json::from_value(behavior_job_json(id)).expect("valid behavior job")
}

pub fn rule_job(id: &str) -> RuleJobConfig {
    serde_json::from_value(rule_job_json(id)).expect("valid rule job")
}
