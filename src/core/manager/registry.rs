use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::core::jobs::JobKind;

pub type SharedJobRegistry = Arc<Mutex<JobRegistry>>;

/// Outcome of the latest compile attempt for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMetadata {
    pub id: String,
    pub kind: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flink_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub last_seen_pass: u64,
}

impl JobMetadata {
    pub fn running(
        id: impl Into<String>,
        kind: JobKind,
        flink_job_id: Option<String>,
        attempted_at: DateTime<Utc>,
        pass: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            flink_job_id,
            error: None,
            attempted_at,
            last_seen_pass: pass,
        }
    }

    pub fn failed(
        id: impl Into<String>,
        kind: JobKind,
        error: impl Into<String>,
        attempted_at: DateTime<Utc>,
        pass: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            flink_job_id: None,
            error: Some(error.into()),
            attempted_at,
            last_seen_pass: pass,
        }
    }
}

/// Running and failed jobs keyed by namespaced id. An id lives in at most
/// one of the two maps.
#[derive(Debug, Default)]
pub struct JobRegistry {
    running: HashMap<String, JobMetadata>,
    failed: HashMap<String, JobMetadata>,
}

impl JobRegistry {
    pub fn new_shared() -> SharedJobRegistry {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    #[cfg(test)]
    pub fn failure(&self, id: &str) -> Option<&JobMetadata> {
        self.failed.get(id)
    }

    pub fn clear_failed(&mut self, id: &str) -> Option<JobMetadata> {
        self.failed.remove(id)
    }

    pub fn record_running(&mut self, meta: JobMetadata) {
        self.failed.remove(&meta.id);
        self.running.insert(meta.id.clone(), meta);
    }

    pub fn record_failed(&mut self, meta: JobMetadata) {
        self.running.remove(&meta.id);
        self.failed.insert(meta.id.clone(), meta);
    }

    pub fn touch(&mut self, id: &str, pass: u64) {
        if let Some(meta) = self.running.get_mut(id).or_else(|| self.failed.get_mut(id)) {
            meta.last_seen_pass = pass;
        }
    }

    /// Marks every entry of `kind` as seen; used when that kind's desired
    /// state could not be fetched.
    pub fn touch_kind(&mut self, kind: JobKind, pass: u64) {
        for meta in self.running.values_mut().chain(self.failed.values_mut()) {
            if meta.kind == kind {
                meta.last_seen_pass = pass;
            }
        }
    }

    /// Running jobs that were not seen during `pass`, sorted by id.
    pub fn unseen_running(&self, pass: u64) -> Vec<String> {
        let mut ids: Vec<String> = self
            .running
            .values()
            .filter(|meta| meta.last_seen_pass < pass)
            .map(|meta| meta.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Drops failed entries unseen for `retention` passes. `0` keeps them
    /// forever.
    pub fn evict_failed(&mut self, pass: u64, retention: u64) -> Vec<String> {
        if retention == 0 {
            return Vec::new();
        }
        let mut evicted: Vec<String> = self
            .failed
            .values()
            .filter(|meta| pass.saturating_sub(meta.last_seen_pass) >= retention)
            .map(|meta| meta.id.clone())
            .collect();
        for id in &evicted {
            self.failed.remove(id);
        }
        evicted.sort();
        evicted
    }

    pub fn running(&self) -> Vec<JobMetadata> {
        sorted(&self.running)
    }

    pub fn failed(&self) -> Vec<JobMetadata> {
        sorted(&self.failed)
    }
}

fn sorted(map: &HashMap<String, JobMetadata>) -> Vec<JobMetadata> {
    let mut entries: Vec<JobMetadata> = map.values().cloned().collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}
