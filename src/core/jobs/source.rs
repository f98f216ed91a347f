use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{BehaviorJobConfig, RuleJobConfig};
use crate::core::remote::{self, RemoteError};

/// Where the desired set of jobs comes from.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn behavior_jobs(&self) -> Result<Vec<BehaviorJobConfig>, RemoteError>;
    async fn rule_jobs(&self) -> Result<Vec<RuleJobConfig>, RemoteError>;
}

pub struct HttpJobSource {
    behavior_endpoint: String,
    rule_endpoint: String,
    http: Client,
}

impl HttpJobSource {
    pub fn new(
        behavior_endpoint: String,
        rule_endpoint: String,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            behavior_endpoint,
            rule_endpoint,
            http: Client::builder().timeout(timeout).build()?,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, RemoteError> {
        let body = remote::send_json(&self.http, Method::GET, endpoint, None).await?;
        // The hub answers `null` when it has nothing scheduled.
        let jobs: Option<Vec<T>> = remote::decode(endpoint, &body)?;
        let jobs = jobs.unwrap_or_default();
        debug!("Fetched {} job(s) from {}", jobs.len(), endpoint);
        Ok(jobs)
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn behavior_jobs(&self) -> Result<Vec<BehaviorJobConfig>, RemoteError> {
        self.fetch(&self.behavior_endpoint).await
    }

    async fn rule_jobs(&self) -> Result<Vec<RuleJobConfig>, RemoteError> {
        self.fetch(&self.rule_endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{MockJobHub, behavior_job_json, rule_job_json};
    use axum::http::StatusCode;
    use serde_json::json;

    fn source_for(hub: &MockJobHub) -> HttpJobSource {
        HttpJobSource::new(hub.behavior_url(), hub.rule_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_typed_job_lists() {
        let hub = MockJobHub::start(
            json!([behavior_job_json("b1"), behavior_job_json("b2")]),
            json!([rule_job_json("r1")]),
        )
        .await;
        let source = source_for(&hub);

        let behavior = source.behavior_jobs().await.unwrap();
        assert_eq!(
            behavior.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(),
            vec!["b1", "b2"]
        );
        let rule = source.rule_jobs().await.unwrap();
        assert_eq!(rule.len(), 1);
        assert_eq!(rule[0].name, "rare login");
        hub.server.shutdown().await;
    }

    #[tokio::test]
    async fn null_body_means_no_jobs() {
        let hub = MockJobHub::start(json!(null), json!([])).await;
        let source = source_for(&hub);
        assert!(source.behavior_jobs().await.unwrap().is_empty());
        assert!(source.rule_jobs().await.unwrap().is_empty());
        hub.server.shutdown().await;
    }

    #[tokio::test]
    async fn non_200_is_an_error_for_that_kind_only() {
        let hub = MockJobHub::start(json!([behavior_job_json("b1")]), json!([])).await;
        hub.set_rule(StatusCode::BAD_GATEWAY, json!({ "error": "down" }));
        let source = source_for(&hub);

        assert_eq!(source.behavior_jobs().await.unwrap().len(), 1);
        match source.rule_jobs().await.unwrap_err() {
            RemoteError::Status { status, body, .. } => {
                assert_eq!(status, 502);
                assert!(body.contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
        hub.server.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let hub = MockJobHub::start(json!({ "not": "a list" }), json!([])).await;
        let source = source_for(&hub);
        assert!(matches!(
            source.behavior_jobs().await.unwrap_err(),
            RemoteError::Decode { .. }
        ));
        hub.server.shutdown().await;
    }
}
