//! Post-processing of aggregated documents.
//!
//! Filtering goes through iterator adapters so no entry is ever skipped by
//! index arithmetic while the list shrinks.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::fields::{CONTRIBUTIONS, CREATED, NET_VOTES, REWARDS};
use super::payout::{reward_of, take_reward};
use crate::error::{Error, Result};
use crate::params::{parse_instant, QueryParams, RetrieveBy, SortBy};

/// Shapes aggregated documents into the final ranked list.
pub fn rank(params: &QueryParams, documents: Vec<Value>) -> Result<Vec<Value>> {
    let mut entries = match params.retrieve_by {
        RetrieveBy::Projects => project_entries(params, documents)?,
        RetrieveBy::Contributions => contribution_entries(params, documents)?,
    };

    if params.include_rewards && params.sort_by == SortBy::Rewards {
        sort_desc_by(&mut entries, REWARDS);
    }
    entries.truncate(params.limit as usize);
    Ok(entries)
}

fn project_entries(params: &QueryParams, groups: Vec<Value>) -> Result<Vec<Value>> {
    groups
        .into_iter()
        .map(|group| -> Result<Option<Value>> {
            let mut group = into_object(group)?;
            let members = match group.remove(CONTRIBUTIONS) {
                Some(Value::Array(members)) => members,
                Some(_) => {
                    return Err(Error::Aggregation(
                        "group members are not an array".to_string(),
                    ))
                },
                None => Vec::new(),
            };

            if params.only_new && any_predates(&members, params.start_date)? {
                return Ok(None);
            }
            if params.include_rewards {
                let total = members
                    .iter()
                    .map(reward_of)
                    .sum::<Result<f64>>()?;
                group.insert(REWARDS.to_string(), json!(total));
            }
            Ok(Some(Value::Object(group)))
        })
        .filter_map(Result::transpose)
        .collect()
}

fn contribution_entries(params: &QueryParams, records: Vec<Value>) -> Result<Vec<Value>> {
    let mut entries = records
        .into_iter()
        .map(|record| -> Result<Option<Value>> {
            let mut record = into_object(record)?;
            if params.only_new && created_at(&record)? < params.start_date {
                return Ok(None);
            }
            if params.include_rewards {
                let total = take_reward(&mut record)?;
                record.insert(REWARDS.to_string(), json!(total));
            }
            Ok(Some(Value::Object(record)))
        })
        .filter_map(Result::transpose)
        .collect::<Result<Vec<_>>>()?;

    if params.sort_by == SortBy::Contributions {
        sort_desc_by(&mut entries, NET_VOTES);
    }
    Ok(entries)
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Aggregation(format!(
            "expected a document, got {other}"
        ))),
    }
}

fn created_at(doc: &Map<String, Value>) -> Result<DateTime<Utc>> {
    doc.get(CREATED)
        .and_then(Value::as_str)
        .and_then(parse_instant)
        .ok_or_else(|| Error::Aggregation("contribution without a valid creation time".to_string()))
}

fn any_predates(members: &[Value], start: DateTime<Utc>) -> Result<bool> {
    for member in members {
        let member = member
            .as_object()
            .ok_or_else(|| Error::Aggregation("group member is not a document".to_string()))?;
        if created_at(member)? < start {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Stable descending sort on a numeric field; entries without it sink.
fn sort_desc_by(entries: &mut [Value], field: &str) {
    let key = |entry: &Value| entry.get(field).and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY);
    entries.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}
