//! Contribution records and the stages that aggregate them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::params::parse_instant;
use crate::pipeline::fields::{
    CONTRIBUTIONS, COUNT, CREATED, PENDING_PAYOUT, PROJECT, PROJECT_ID, TOTAL_PAYOUT,
};
use crate::pipeline::Stage;

/// Executes aggregation stages over contribution records.
#[async_trait]
pub trait ContributionStore: Send + Sync {
    /// Runs `stages` in order and returns the resulting documents.
    async fn aggregate(&self, stages: &[Stage]) -> Result<Vec<Value>>;
}

/// Contribution records held in memory.
///
/// Records whose `created` field is missing or unparseable never match.
#[derive(Debug, Clone, Default)]
pub struct MemoryContributionStore {
    records: Arc<Vec<Value>>,
}

impl MemoryContributionStore {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// Loads a JSON array of records.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<Value> = serde_json::from_str(&content)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ContributionStore for MemoryContributionStore {
    async fn aggregate(&self, stages: &[Stage]) -> Result<Vec<Value>> {
        let mut documents: Option<Vec<Value>> = None;
        for stage in stages {
            let input = documents.take().unwrap_or_else(|| self.records.as_ref().clone());
            documents = Some(match stage {
                Stage::Match {
                    created_from,
                    created_before,
                } => match_created(input, *created_from, *created_before),
                Stage::Group { with_rewards } => group_by_project(input, *with_rewards),
                Stage::Sort { field, descending } => sort_by_field(input, field, *descending),
            });
        }
        Ok(documents.unwrap_or_else(|| self.records.as_ref().clone()))
    }
}

fn created(doc: &Value) -> Option<DateTime<Utc>> {
    doc.get(CREATED).and_then(Value::as_str).and_then(parse_instant)
}

fn match_created(
    documents: Vec<Value>,
    from: Option<DateTime<Utc>>,
    before: DateTime<Utc>,
) -> Vec<Value> {
    documents
        .into_iter()
        .filter(|doc| {
            created(doc).is_some_and(|at| at < before && from.is_none_or(|from| at >= from))
        })
        .collect()
}

/// Identity used to group a record: the project's `id` when it has one,
/// else the whole project value.
fn project_key(doc: &Value) -> String {
    let project = doc.get(PROJECT).unwrap_or(&Value::Null);
    project.get(PROJECT_ID).unwrap_or(project).to_string()
}

fn group_by_project(documents: Vec<Value>, with_rewards: bool) -> Vec<Value> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    let projected: &[&str] = if with_rewards {
        &[CREATED, PENDING_PAYOUT, TOTAL_PAYOUT]
    } else {
        &[CREATED]
    };

    for doc in documents {
        let member: Map<String, Value> = projected
            .iter()
            .filter_map(|field| doc.get(*field).map(|v| (field.to_string(), v.clone())))
            .collect();

        let slot = *index.entry(project_key(&doc)).or_insert_with(|| {
            let project = doc.get(PROJECT).cloned().unwrap_or(Value::Null);
            groups.push((project, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(Value::Object(member));
    }

    groups
        .into_iter()
        .map(|(project, members)| {
            json!({
                PROJECT: project,
                COUNT: members.len(),
                CONTRIBUTIONS: members,
            })
        })
        .collect()
}

fn sort_by_field(mut documents: Vec<Value>, field: &str, descending: bool) -> Vec<Value> {
    let key = |doc: &Value| doc.get(field).and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY);
    documents.sort_by(|a, b| {
        let ord = key(a).total_cmp(&key(b));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    documents
}
