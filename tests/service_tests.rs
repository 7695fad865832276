//! Integration tests for the ranking service.
//!
//! Tests:
//! - Deduplication: concurrent identical admissions share one computation
//! - Failure handling: error tasks are served once, then recomputed
//! - Retention: reward results live 12h, cheap results 5m, failures until read
//! - Throttling: only expensive cache misses consult the limiter
//! - Ranking shape: only_new, vote order, reward totals, truncation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use toprank::sources::{GovernorLimiter, MemoryContributionStore, RewardEnrichment};
use toprank::tasks::{ManualClock, TaskStatus};
use toprank::{AdmissionOutcome, Error, RankingService, RawQuery, ValidationError};

#[derive(Default)]
struct CountingEnrichment {
    calls: AtomicUsize,
    caps: Mutex<Vec<Option<usize>>>,
}

#[async_trait]
impl RewardEnrichment for CountingEnrichment {
    async fn refresh(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        cap: Option<usize>,
    ) -> toprank::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.caps.lock().unwrap().push(cap);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(())
    }
}

struct FailingEnrichment;

#[async_trait]
impl RewardEnrichment for FailingEnrichment {
    async fn refresh(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _cap: Option<usize>,
    ) -> toprank::Result<()> {
        Err(Error::Enrichment("ledger unreachable".to_string()))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap()
}

fn contribution(project: u32, created: &str, votes: i64, pending: &str, paid: &str) -> Value {
    json!({
        "project": {"id": project, "name": format!("project-{project}")},
        "created": created,
        "net_votes": votes,
        "pending_payout_value": pending,
        "total_payout_value": paid,
    })
}

fn records() -> Vec<Value> {
    vec![
        contribution(1, "2020-01-02T10:00:00", 4, "1.000 SBD", "0.500 SBD"),
        contribution(1, "2020-01-03T10:00:00", 9, "0.250 SBD", "0.000 SBD"),
        contribution(1, "2020-01-04T10:00:00", 1, "0.000 SBD", "0.250 SBD"),
        contribution(2, "2020-01-05T10:00:00", 12, "8.000 SBD", "2.000 SBD"),
        contribution(3, "2019-12-20T10:00:00", 3, "1.000 SBD", "1.000 SBD"),
        contribution(3, "2020-01-06T10:00:00", 7, "0.500 SBD", "0.500 SBD"),
        contribution(3, "2020-01-07T10:00:00", 2, "0.500 SBD", "0.500 SBD"),
    ]
}

fn query(pairs: &[(&str, &str)]) -> RawQuery {
    let mut raw = RawQuery {
        start_date: Some("2020-01-01".to_string()),
        end_date: Some("2020-01-08".to_string()),
        ..RawQuery::default()
    };
    for (key, value) in pairs {
        let value = Some((*value).to_string());
        match *key {
            "limit" => raw.limit = value,
            "start_date" => raw.start_date = value,
            "end_date" => raw.end_date = value,
            "sort_by" => raw.sort_by = value,
            "retrieve_by" => raw.retrieve_by = value,
            "include_rewards" => raw.include_rewards = value,
            "only_new" => raw.only_new = value,
            other => panic!("unknown key {other}"),
        }
    }
    raw
}

fn service_with(records: Vec<Value>, clock: &ManualClock) -> RankingService {
    RankingService::builder()
        .contributions(MemoryContributionStore::new(records))
        .clock(Arc::new(clock.clone()))
        .build()
}

/// Admits `raw`, waits for its runner, and returns the polled results.
async fn results_of(service: &RankingService, raw: &RawQuery) -> Vec<Value> {
    let admission = service.admit(raw).await;
    if let Some(runner) = admission.runner {
        runner.await.unwrap();
    }
    match service.admit(raw).await.outcome {
        AdmissionOutcome::Snapshot(task) => {
            assert_eq!(task.status, TaskStatus::Success, "{}", task.status_message);
            task.results.unwrap()
        },
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

fn status_of(outcome: &AdmissionOutcome) -> i8 {
    match outcome {
        AdmissionOutcome::Snapshot(task) => task.status.code(),
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_queries_enrich_once() {
    let enrichment = Arc::new(CountingEnrichment::default());
    let service = RankingService::builder()
        .contributions(MemoryContributionStore::new(records()))
        .enrichment_arc(enrichment.clone())
        .build();
    let raw = query(&[("include_rewards", "true")]);

    let admissions = futures::future::join_all((0..16).map(|_| {
        let service = service.clone();
        let raw = raw.clone();
        tokio::spawn(async move { service.admit(&raw).await })
    }))
    .await;

    let mut runners = Vec::new();
    for admission in admissions {
        let admission = admission.unwrap();
        assert!(matches!(admission.outcome, AdmissionOutcome::Snapshot(_)));
        runners.extend(admission.runner);
    }
    assert_eq!(runners.len(), 1);
    for runner in runners {
        runner.await.unwrap();
    }

    assert_eq!(enrichment.calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.tasks().len(), 1);
}

#[tokio::test]
async fn enrichment_cap_only_for_projects_by_count() {
    let enrichment = Arc::new(CountingEnrichment::default());
    let service = RankingService::builder()
        .contributions(MemoryContributionStore::new(records()))
        .enrichment_arc(enrichment.clone())
        .build();

    results_of(&service, &query(&[("include_rewards", "true"), ("limit", "2")])).await;
    results_of(
        &service,
        &query(&[("include_rewards", "true"), ("sort_by", "rewards")]),
    )
    .await;
    results_of(&service, &query(&[("retrieve_by", "contributions")])).await;
    // Cheap: no enrichment at all.
    results_of(&service, &query(&[])).await;

    assert_eq!(*enrichment.caps.lock().unwrap(), vec![Some(2), None, None]);
}

#[tokio::test]
async fn failed_task_is_served_once_then_recomputed() {
    let clock = ManualClock::new(now());
    let service = RankingService::builder()
        .contributions(MemoryContributionStore::new(records()))
        .enrichment(FailingEnrichment)
        .clock(Arc::new(clock.clone()))
        .build();
    let raw = query(&[("include_rewards", "true")]);

    let first = service.admit(&raw).await;
    first.runner.unwrap().await.unwrap();
    // Not removed until someone reads it.
    assert_eq!(service.tasks().len(), 1);

    let failed = service.admit(&raw).await;
    match &failed.outcome {
        AdmissionOutcome::Snapshot(task) => {
            assert_eq!(task.status, TaskStatus::Error);
            assert_eq!(
                task.status_message,
                "reward enrichment failed: ledger unreachable"
            );
        },
        other => panic!("expected a snapshot, got {other:?}"),
    }
    assert!(failed.runner.is_none());
    assert!(service.tasks().is_empty());

    clock.advance(Duration::hours(1));
    let retried = service.admit(&raw).await;
    assert_eq!(status_of(&retried.outcome), 1);
    let runner = retried.runner.expect("a fresh runner");
    runner.await.unwrap();

    // Failures have no retention: the second one outlives every window and
    // is only removed by the next read.
    clock.advance(Duration::hours(13));
    assert_eq!(service.tasks().run_pending_evictions().await.unwrap(), 0);
    assert_eq!(service.tasks().len(), 1);

    let failed_again = service.admit(&raw).await;
    assert_eq!(status_of(&failed_again.outcome), -1);
    assert!(failed_again.runner.is_none());
    assert!(service.tasks().is_empty());
}

#[tokio::test]
async fn expired_result_is_recomputed_without_reaper() {
    let clock = ManualClock::new(now());
    let service = service_with(records(), &clock);
    let raw = query(&[]);
    let first = results_of(&service, &raw).await;

    // No sweep runs; the read alone must notice the expiry.
    clock.advance(Duration::hours(24));
    let readmitted = service.admit(&raw).await;
    assert_eq!(status_of(&readmitted.outcome), 1);
    let runner = readmitted.runner.expect("a fresh runner");
    runner.await.unwrap();
    assert_eq!(service.tasks().len(), 1);

    assert_eq!(results_of(&service, &raw).await, first);
}

#[tokio::test]
async fn reward_results_are_retained_for_twelve_hours() {
    let clock = ManualClock::new(now());
    let service = service_with(records(), &clock);
    let raw = query(&[("include_rewards", "true")]);
    results_of(&service, &raw).await;

    clock.advance(Duration::hours(12) - Duration::seconds(1));
    assert_eq!(service.tasks().run_pending_evictions().await.unwrap(), 0);
    assert_eq!(status_of(&service.admit(&raw).await.outcome), 0);

    clock.advance(Duration::seconds(1));
    assert_eq!(service.tasks().run_pending_evictions().await.unwrap(), 1);
    assert!(service.tasks().is_empty());
}

#[tokio::test]
async fn cheap_results_are_retained_for_five_minutes() {
    let clock = ManualClock::new(now());
    let service = service_with(records(), &clock);
    let raw = query(&[]);
    results_of(&service, &raw).await;

    clock.advance(Duration::minutes(5) - Duration::seconds(1));
    assert_eq!(service.tasks().run_pending_evictions().await.unwrap(), 0);

    clock.advance(Duration::seconds(1));
    assert_eq!(service.tasks().run_pending_evictions().await.unwrap(), 1);

    let again = service.admit(&raw).await;
    assert_eq!(status_of(&again.outcome), 1);
    assert!(again.runner.is_some());
}

#[tokio::test]
async fn only_expensive_misses_are_throttled() {
    let service = RankingService::builder()
        .contributions(MemoryContributionStore::new(records()))
        .limiter(GovernorLimiter::new(1, 1))
        .build();
    let expensive = query(&[("include_rewards", "true")]);

    let admitted = service.admit(&expensive).await;
    assert_eq!(status_of(&admitted.outcome), 1);
    admitted.runner.unwrap().await.unwrap();

    // Cache hit: no permit needed.
    assert_eq!(status_of(&service.admit(&expensive).await.outcome), 0);

    let other = query(&[("include_rewards", "true"), ("limit", "3")]);
    let throttled = service.admit(&other).await;
    assert_eq!(throttled.outcome, AdmissionOutcome::Throttled);
    assert!(throttled.runner.is_none());
    assert_eq!(service.tasks().len(), 1);

    for limit in 1..=5 {
        let cheap = query(&[("limit", &limit.to_string())]);
        assert_eq!(status_of(&service.admit(&cheap).await.outcome), 1);
    }
}

#[tokio::test]
async fn oversized_limit_is_rejected_without_a_task() {
    let service = service_with(records(), &ManualClock::new(now()));
    let admission = service.admit(&query(&[("limit", "150")])).await;
    assert_eq!(
        admission.outcome,
        AdmissionOutcome::Invalid(ValidationError::Limit)
    );
    assert_eq!(
        serde_json::to_value(&admission.outcome).unwrap(),
        json!({"error": "limit is invalid or too high"})
    );
    assert!(service.tasks().is_empty());
}

#[tokio::test]
async fn wide_reward_range_reports_error_but_still_runs() {
    let service = service_with(records(), &ManualClock::new(now()));
    let raw = query(&[("include_rewards", "true"), ("end_date", "2020-01-20")]);

    let admission = service.admit(&raw).await;
    assert_eq!(
        admission.outcome,
        AdmissionOutcome::Invalid(ValidationError::DateRange)
    );
    admission.runner.expect("runner still spawned").await.unwrap();
    assert_eq!(service.tasks().len(), 1);
}

#[tokio::test]
async fn seven_day_reward_query_ranks_by_rewards() {
    let service = service_with(records(), &ManualClock::new(now()));
    let raw = query(&[
        ("include_rewards", "true"),
        ("retrieve_by", "projects"),
        ("sort_by", "rewards"),
        ("limit", "2"),
    ]);

    let admission = service.admit(&raw).await;
    assert_eq!(status_of(&admission.outcome), 1);
    admission.runner.unwrap().await.unwrap();

    let polled = serde_json::to_value(service.admit(&raw).await.outcome).unwrap();
    assert_eq!(polled["status"], json!(0));
    assert_eq!(
        polled["results"],
        json!([
            {"project": {"id": 2, "name": "project-2"}, "count": 1, "rewards": 10.0},
            {"project": {"id": 1, "name": "project-1"}, "count": 3, "rewards": 2.0},
        ])
    );
}

#[tokio::test]
async fn only_new_excludes_projects_with_older_work() {
    let service = service_with(records(), &ManualClock::new(now()));
    let results = results_of(&service, &query(&[("only_new", "true"), ("limit", "10")])).await;

    let ids: Vec<_> = results.iter().map(|r| r["project"]["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2)]);
    assert!(results.iter().all(|r| r.get("contributions").is_none()));
}

#[tokio::test]
async fn contributions_are_ordered_by_votes() {
    let service = service_with(records(), &ManualClock::new(now()));
    let results = results_of(
        &service,
        &query(&[("retrieve_by", "contributions"), ("limit", "10")]),
    )
    .await;

    let votes: Vec<i64> = results
        .iter()
        .map(|r| r["net_votes"].as_i64().unwrap())
        .collect();
    assert_eq!(votes, vec![12, 9, 7, 4, 2, 1]);
}

#[tokio::test]
async fn contribution_rewards_replace_raw_payouts() {
    let service = service_with(records(), &ManualClock::new(now()));
    let results = results_of(
        &service,
        &query(&[
            ("retrieve_by", "contributions"),
            ("include_rewards", "true"),
            ("limit", "10"),
        ]),
    )
    .await;

    assert_eq!(results.len(), 6);
    for entry in &results {
        assert!(entry.get("pending_payout_value").is_none());
        assert!(entry.get("total_payout_value").is_none());
    }
    assert_eq!(results[0]["net_votes"], json!(12));
    assert_eq!(results[0]["rewards"], json!(10.0));
}

#[tokio::test]
async fn results_are_truncated_to_limit() {
    let ten: Vec<Value> = (0..10)
        .map(|i| contribution(i, "2020-01-03T00:00:00", i64::from(i), "1 SBD", "0 SBD"))
        .collect();
    let service = service_with(ten, &ManualClock::new(now()));
    let results = results_of(
        &service,
        &query(&[("retrieve_by", "contributions"), ("limit", "3")]),
    )
    .await;

    let votes: Vec<i64> = results
        .iter()
        .map(|r| r["net_votes"].as_i64().unwrap())
        .collect();
    assert_eq!(votes, vec![9, 8, 7]);
}

#[tokio::test]
async fn malformed_payout_fails_the_task() {
    let mut bad = records();
    bad.push(contribution(4, "2020-01-03T00:00:00", 1, "soon", "0 SBD"));
    let service = service_with(bad, &ManualClock::new(now()));
    let raw = query(&[("retrieve_by", "contributions"), ("include_rewards", "true")]);

    service.admit(&raw).await.runner.unwrap().await.unwrap();
    match service.admit(&raw).await.outcome {
        AdmissionOutcome::Snapshot(task) => {
            assert_eq!(task.status, TaskStatus::Error);
            assert_eq!(
                task.status_message,
                "invalid payout in field 'pending_payout_value': soon"
            );
        },
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn default_end_date_comes_from_the_clock() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2020, 1, 4, 15, 30, 0).unwrap());
    let service = service_with(records(), &clock);
    let raw = RawQuery {
        retrieve_by: Some("contributions".to_string()),
        start_date: Some("2020-01-01".to_string()),
        limit: Some("10".to_string()),
        ..RawQuery::default()
    };

    let results = results_of(&service, &raw).await;
    // Window ends at 2020-01-04T00:00:00.
    assert_eq!(results.len(), 2);
}
