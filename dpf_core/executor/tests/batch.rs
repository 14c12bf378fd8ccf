use alerts::AlertSeverity;
use catalog::{DataSourceType, Getter, JobSettings, NewJob};
use executor::{RunStatus, SystemHealth};
use shared_clients::SourceAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{api_config, records, FlakyAdapter, Harness, SlowAdapter};

#[tokio::test]
async fn batch_reports_every_job_in_request_order() {
    let h = Harness::new();
    h.memory_source("a", records(2, "a"));
    h.job(NewJob::new("first").with_id("j1").source("a"));
    h.job(NewJob::new("no sources").with_id("j2-throws"));
    h.job(NewJob::new("third").with_id("j3").source("a"));

    let summary = h.batch().execute_batch_jobs(&["j1", "j2-throws", "j3"]).await;
    assert_eq!(summary.total_jobs, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);

    let ids: Vec<&str> = summary.results.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(ids, ["j1", "j2-throws", "j3"]);
    assert!(summary.results[0].success);
    assert!(!summary.results[1].success);
    assert!(summary.results[1].message.contains("has no sources configured"));
    assert!(summary.results[1].job_run_id.is_none());
    assert!(summary.results[2].success);
    assert!(summary.results[2].job_run_id.is_some());

    // j1 and j3 were attempted, j2 never got a run
    assert_eq!(h.executor.list_runs().len(), 2);
}

#[tokio::test]
async fn batch_emits_one_summary_alert() {
    let h = Harness::new();
    h.memory_source("a", records(1, "a"));
    h.job(NewJob::new("ok").with_id("ok").source("a"));

    let summary = h.batch().execute_batch_jobs(&["ok", "missing"]).await;
    assert_eq!(summary.failure_count, 1);

    let alerts = h.alerts.by_category("batch");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    assert_eq!(alerts[0].message, "Batch execution finished: 1 of 2 jobs succeeded");
    let details = alerts[0].details.as_ref().expect("details");
    assert_eq!(details["failedJobs"][0], "missing");
}

#[tokio::test]
async fn failed_runs_count_as_batch_failures() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(FlakyAdapter::broken()) as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("api", api_config("https://example.com/orders"));
    h.job(NewJob::new("fails").with_id("fails").source("api"));

    let summary = h.batch().execute_batch_jobs(&["fails"]).await;
    assert_eq!(summary.failure_count, 1);
    assert!(!summary.results[0].success);
    // a run exists even though the job failed
    let run_id = summary.results[0].job_run_id.clone().expect("run id");
    assert_eq!(
        h.executor.get_run(&run_id).expect("run").status,
        RunStatus::Error
    );
}

#[tokio::test]
async fn empty_batch_is_a_successful_no_op() {
    let h = Harness::new();
    let none: [&str; 0] = [];
    let summary = h.batch().execute_batch_jobs(&none).await;
    assert_eq!(summary.total_jobs, 0);
    assert!(summary.results.is_empty());
    assert_eq!(h.alerts.by_category("batch")[0].severity, AlertSeverity::Success);
}

#[tokio::test]
async fn concurrent_batch_serialises_shared_destinations() {
    let h = Harness::new();
    h.memory_source("a", records(5, "a"));
    h.memory_source("b", records(7, "b"));
    h.destination("shared");
    h.job(NewJob::new("a").with_id("ja").source("a").destination("shared"));
    h.job(NewJob::new("b").with_id("jb").source("b").destination("shared"));

    let summary = h
        .batch()
        .with_concurrency(4)
        .execute_batch_jobs(&["ja", "jb"])
        .await;
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.results[0].job_id, "ja");
    assert_eq!(summary.results[1].job_id, "jb");
    assert_eq!(h.sink.loaded("shared").len(), 12);
    assert!(!h.executor.locks().is_locked("shared"));
}

#[tokio::test]
async fn status_reflects_finished_runs() {
    let h = Harness::new();
    assert_eq!(h.status().snapshot().status, SystemHealth::Starting);

    h.memory_source("a", records(3, "a"));
    h.job(NewJob::new("ok").with_id("ok").source("a"));
    h.executor.execute_job("ok").await.expect("run");

    let snapshot = h.status().snapshot();
    assert_eq!(snapshot.status, SystemHealth::Healthy);
    assert_eq!(snapshot.jobs.total, 1);
    assert_eq!(snapshot.runs.succeeded, 1);
    assert_eq!(snapshot.records.processed, 3);
    assert_eq!(snapshot.recent_runs[0].job_id, "ok");
    assert_eq!(snapshot.running_jobs, 0);
}

#[tokio::test]
async fn status_turns_degraded_after_aborted_runs() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(SlowAdapter {
            delay: Duration::from_millis(500),
        }) as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("slow", api_config("https://example.com/slow"));
    h.job(
        NewJob::new("slow")
            .with_id("slow")
            .source("slow")
            .settings(JobSettings {
                timeout_ms: 10,
                ..Default::default()
            }),
    );

    h.executor.execute_job("slow").await.expect("run");
    let snapshot = h.status().snapshot();
    assert_eq!(snapshot.status, SystemHealth::Degraded);
    assert_eq!(snapshot.runs.failed, 1);
    assert!(snapshot.unacknowledged_alerts >= 1);
}

#[tokio::test]
async fn connection_tester_uses_the_same_adapters() {
    let h = Harness::new();
    h.memory_source("a", records(8, "a"));
    let source = h.catalog.get_data_source("a").expect("source");

    let tester = h.tester();
    let probe = tester.test_connection(&source).await;
    assert!(probe.success);

    let extraction = tester.test_extraction(&source).await;
    assert!(extraction.success);
    assert_eq!(extraction.details.record_count, Some(5));
}
