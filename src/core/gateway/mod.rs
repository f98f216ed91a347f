//! Client for the Flink SQL gateway REST protocol.
//!
//! The gateway nests its resources as session → statement → operation: a
//! session scopes every statement, submitting a statement yields an operation
//! handle, and the operation's result is polled until the engine reports it
//! ready.


use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::remote::{self, RemoteError};

const NOT_READY: &str = "NOT_READY";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build gateway http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(
        "timeout while trying {attempts} times to get operation result. \
         SessionID: {session_id}, OperationID: {operation_id}"
    )]
    PollTimeout {
        attempts: u32,
        session_id: String,
        operation_id: String,
    },
}

/// How often and how long to wait for an operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// A ready operation result. `job_id` is set when the statement started a
/// streaming job on the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub result_type: String,
    pub results: Value,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Poll {
    NotReady,
    Ready(OperationResult),
}

#[derive(Deserialize)]
struct ResultResponse {
    #[serde(rename = "resultType")]
    result_type: Option<String>,
    results: Option<Value>,
    #[serde(rename = "jobID")]
    job_id: Option<Value>,
}

/// Runs single statements against the remote engine and returns their
/// result. Compilers and the job manager only depend on this seam.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<OperationResult, GatewayError>;

    async fn close(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    http: Client,
    poll: PollPolicy,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        poll: PollPolicy,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            poll,
        })
    }

    pub async fn create_session(&self) -> Result<GatewaySession, GatewayError> {
        let endpoint = format!("{}/v1/sessions", self.base_url);
        let body = remote::send_json(&self.http, Method::POST, &endpoint, None).await?;
        let parsed: Value = remote::decode(&endpoint, &body)?;
        let id = remote::handle_field(&parsed, "sessionHandle", &endpoint)?;
        info!("Opened SQL gateway session {}", id);
        Ok(GatewaySession {
            id,
            client: self.clone(),
        })
    }
}

pub struct GatewaySession {
    id: String,
    client: GatewayClient,
}

impl GatewaySession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn submit_statement(
        &self,
        statement: &str,
    ) -> Result<StatementHandle<'_>, GatewayError> {
        let endpoint = format!("{}/v1/sessions/{}/statements", self.client.base_url, self.id);
        let payload = json!({ "statement": statement });
        let body =
            remote::send_json(&self.client.http, Method::POST, &endpoint, Some(&payload)).await?;
        let parsed: Value = remote::decode(&endpoint, &body)?;
        let id = remote::handle_field(&parsed, "operationHandle", &endpoint)?;
        debug!(session = %self.id, operation = %id, "Statement submitted");
        Ok(StatementHandle { id, session: self })
    }

    /// The gateway expires idle sessions on its own; there is nothing to
    /// release on our side.
    pub async fn close(&self) -> Result<(), GatewayError> {
        info!("Releasing SQL gateway session {}", self.id);
        Ok(())
    }
}

#[async_trait]
impl StatementExecutor for GatewaySession {
    async fn execute(&self, statement: &str) -> Result<OperationResult, GatewayError> {
        let handle = self.submit_statement(statement).await?;
        handle.operation_result(0).await
    }

    async fn close(&self) -> Result<(), GatewayError> {
        GatewaySession::close(self).await
    }
}

pub struct StatementHandle<'a> {
    id: String,
    session: &'a GatewaySession,
}

impl StatementHandle<'_> {
    /// Polls result page `index` until it is ready or the poll budget runs
    /// out. Sleeps only between attempts.
    pub async fn operation_result(&self, index: u64) -> Result<OperationResult, GatewayError> {
        let policy = self.session.client.poll;
        for attempt in 1..=policy.max_attempts {
            match self.poll_once(index).await? {
                Poll::Ready(result) => return Ok(result),
                Poll::NotReady => {
                    debug!(
                        operation = %self.id,
                        attempt,
                        "Operation result not ready"
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.interval).await;
                    }
                }
            }
        }
        Err(GatewayError::PollTimeout {
            attempts: policy.max_attempts,
            session_id: self.session.id.clone(),
            operation_id: self.id.clone(),
        })
    }

    async fn poll_once(&self, index: u64) -> Result<Poll, GatewayError> {
        let client = &self.session.client;
        let endpoint = format!(
            "{}/v1/sessions/{}/operations/{}/result/{}",
            client.base_url, self.session.id, self.id, index
        );
        let body = remote::send_json(&client.http, Method::GET, &endpoint, None).await?;
        let parsed: ResultResponse = remote::decode(&endpoint, &body)?;
        let result_type = parsed.result_type.ok_or_else(|| RemoteError::MissingField {
            endpoint: endpoint.clone(),
            field: "resultType",
        })?;
        if result_type == NOT_READY {
            return Ok(Poll::NotReady);
        }
        let results = parsed.results.ok_or_else(|| RemoteError::MissingField {
            endpoint: endpoint.clone(),
            field: "results",
        })?;
        let job_id = parsed.job_id.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        Ok(Poll::Ready(OperationResult {
            result_type,
            results,
            job_id,
        }))
    }
}
