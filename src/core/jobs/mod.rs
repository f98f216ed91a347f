//! Job definitions as published by the job hub.

mod source;

pub use source::{HttpJobSource, JobSource};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A Kafka topic together with the columns its JSON records carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDescriptor {
    #[serde(rename = "bootstrap.servers")]
    pub bootstrap_servers: String,
    pub topic: String,
    #[serde(rename = "authen_type", skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keytab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub schema: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_field: Option<String>,
}

impl StreamDescriptor {
    /// Columns sorted by name, so rendered schemas do not depend on map
    /// iteration order.
    pub fn ordered_columns(&self) -> Vec<(&str, &str)> {
        let mut columns: Vec<(&str, &str)> = self
            .schema
            .iter()
            .map(|(name, data_type)| (name.as_str(), data_type.as_str()))
            .collect();
        columns.sort_unstable_by(|a, b| a.0.cmp(b.0));
        columns
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileField {
    #[serde(rename = "field_name")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub extra_data: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub id: String,
    pub name: String,
    pub status: i64,
    pub profile_type: String,
    #[serde(rename = "entity")]
    pub entities: Vec<ProfileField>,
    #[serde(rename = "attribute")]
    pub attributes: Vec<ProfileField>,
    pub profile_time: String,
    #[serde(rename = "saving_duration_minute")]
    pub saving_duration_minutes: i64,
    pub threshold: f64,
}

impl ProfileConfig {
    pub fn entity_names(&self) -> Vec<String> {
        self.entities.iter().map(|f| f.name.clone()).collect()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorJobConfig {
    pub id: String,
    #[serde(rename = "source_config")]
    pub source: StreamDescriptor,
    #[serde(rename = "profile_config")]
    pub profile: ProfileConfig,
    #[serde(rename = "profile_output_config")]
    pub profile_output: StreamDescriptor,
    #[serde(rename = "behavior_output_config")]
    pub behavior_output: StreamDescriptor,
    pub filter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleJobConfig {
    pub id: String,
    pub name: String,
    pub filter: String,
    pub object: String,
    pub technique: String,
    pub severity: String,
    pub risk_score: i64,
    #[serde(rename = "profile_predictor_config")]
    pub upstream: StreamDescriptor,
    #[serde(rename = "rule_output_config")]
    pub sink: StreamDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Behavior,
    Rule,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Behavior => "behavior",
            JobKind::Rule => "rule",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "behavior" => Some(JobKind::Behavior),
            "rule" => Some(JobKind::Rule),
            _ => None,
        }
    }

    /// `behavior_<id>` / `rule_<id>`: the key jobs are tracked under and the
    /// pipeline name they run as.
    pub fn namespaced(self, id: &str) -> String {
        format!("{}_{}", self.as_str(), id)
    }
}

/// One desired job of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum JobConfig {
    Behavior(BehaviorJobConfig),
    Rule(RuleJobConfig),
}

impl JobConfig {
    pub fn kind(&self) -> JobKind {
        match self {
            JobConfig::Behavior(_) => JobKind::Behavior,
            JobConfig::Rule(_) => JobKind::Rule,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            JobConfig::Behavior(cfg) => &cfg.id,
            JobConfig::Rule(cfg) => &cfg.id,
        }
    }

    pub fn namespaced_id(&self) -> String {
        self.kind().namespaced(self.id())
    }

    pub fn from_json(kind: JobKind, raw: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            JobKind::Behavior => JobConfig::Behavior(serde_json::from_str(raw)?),
            JobKind::Rule => JobConfig::Rule(serde_json::from_str(raw)?),
        })
    }
}
