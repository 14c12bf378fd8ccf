use alerts::AlertSeverity;
use catalog::{
    DataSourceType, Getter, JobSettings, JoinReference, MapOperation, NewJob, NewTransformation,
    FilterOp, Predicate, TransformationConfig,
};
use executor::{ExecutorError, LogLevel, RunStatus};
use matches::assert_matches;
use serde_json::json;
use shared_clients::SourceAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{api_config, records, FlakyAdapter, Harness, SlowAdapter};

fn has_log(run: &executor::JobRun, level: LogLevel, needle: &str) -> bool {
    run.logs
        .iter()
        .any(|l| l.level == level && l.message.contains(needle))
}

#[tokio::test]
async fn two_sources_without_transformations_load_everything() {
    let h = Harness::new();
    h.memory_source("a", records(10, "a"));
    h.memory_source("b", records(15, "b"));
    h.destination("d");
    h.job(
        NewJob::new("two sources")
            .with_id("j")
            .source("a")
            .source("b")
            .destination("d"),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert!(result.success);
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_processed, 25);
    assert_eq!(result.metrics.records_success, 25);
    assert_eq!(result.metrics.progress, 100);

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Info, "Starting execution of job: two sources"));
    assert!(has_log(&run, LogLevel::Info, "Connected to 'a source' (memory"));
    assert!(has_log(&run, LogLevel::Info, "skipping transform phase"));
    assert_eq!(h.sink.loaded("d").len(), 25);
    assert!(h
        .catalog
        .get_data_source("d")
        .expect("destination")
        .last_sync_date
        .is_some());
}

#[tokio::test]
async fn completed_runs_have_consistent_timing() {
    let h = Harness::new();
    h.memory_source("a", records(3, "a"));
    h.job(NewJob::new("timed").with_id("j").source("a"));

    let result = h.executor.execute_job("j").await.expect("execute");
    let run = h.executor.get_run(&result.job_run_id).expect("run");
    let end = run.end_time.expect("terminal run has end time");
    assert!(end >= run.start_time);
    assert_eq!(
        run.metrics.execution_time_ms as i64,
        (end - run.start_time).num_milliseconds()
    );
    assert!(run
        .logs
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[tokio::test]
async fn missing_source_is_a_warning_not_a_failure() {
    let h = Harness::new();
    h.job(NewJob::new("ghost").with_id("j").source("missing-1"));

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_processed, 0);

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Warning, "missing-1 not found"));
    assert!(has_log(&run, LogLevel::Warning, "No destinations resolved"));
}

#[tokio::test]
async fn job_without_sources_fails_before_any_run() {
    let h = Harness::new();
    h.job(NewJob::new("empty").with_id("j").destination("d"));

    let err = h.executor.execute_job("j").await.expect_err("no sources");
    assert_matches!(err, ExecutorError::NoSources { .. });
    assert!(err.is_preflight());
    assert!(h.executor.list_runs().is_empty());

    let err = h.executor.execute_job("nope").await.expect_err("unknown");
    assert_matches!(err, ExecutorError::JobNotFound { .. });
    assert!(h.executor.list_runs().is_empty());
}

#[tokio::test]
async fn disabled_transformation_is_skipped_and_logged() {
    let h = Harness::new();
    h.memory_source("a", records(4, "a"));
    h.transformation(
        NewTransformation::new(
            "drop everything",
            1,
            TransformationConfig::Filter {
                predicate: Predicate {
                    field: "amount".into(),
                    op: FilterOp::Gt,
                    value: Some(json!(1_000_000)),
                },
            },
        )
        .with_id("t")
        .disabled(),
    );
    h.job(NewJob::new("skips").with_id("j").source("a").transformation("t"));

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_success, result.metrics.records_processed);
    assert_eq!(result.metrics.records_error, 0);

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Info, "'drop everything' is disabled, skipped"));
}

#[tokio::test]
async fn transformations_run_in_ascending_order() {
    let h = Harness::new();
    h.memory_source("a", records(5, "a"));
    h.destination("d");
    // order 2 filters on the field that order 1 sets
    h.transformation(
        NewTransformation::new(
            "keep flagged",
            2,
            TransformationConfig::Filter {
                predicate: Predicate {
                    field: "flag".into(),
                    op: FilterOp::Eq,
                    value: Some(json!("yes")),
                },
            },
        )
        .with_id("filter"),
    );
    h.transformation(
        NewTransformation::new(
            "flag",
            1,
            TransformationConfig::Map {
                operations: vec![MapOperation::Set {
                    field: "flag".into(),
                    value: json!("yes"),
                }],
            },
        )
        .with_id("map"),
    );
    h.job(
        NewJob::new("ordered")
            .with_id("j")
            .source("a")
            .transformation("filter")
            .transformation("map")
            .destination("d"),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(h.sink.loaded("d").len(), 5);
}

#[tokio::test]
async fn failing_transformation_stops_the_run_by_default() {
    let h = Harness::new();
    h.memory_source("a", records(3, "a"));
    h.transformation(
        NewTransformation::new(
            "unknown fn",
            1,
            TransformationConfig::Custom {
                function: "does-not-exist".into(),
                args: json!(null),
            },
        )
        .with_id("t"),
    );
    h.job(NewJob::new("breaks").with_id("j").source("a").transformation("t"));

    let result = h.executor.execute_job("j").await.expect("execute");
    assert!(!result.success);
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(
        result.error.as_deref(),
        Some("custom function 'does-not-exist' is not registered")
    );
    assert_eq!(result.metrics.records_error, 1);

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Error, "Transformation 'unknown fn' failed"));
    let failures = h.alerts.by_category("job");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].severity, AlertSeverity::Error);
}

#[tokio::test]
async fn failing_transformation_is_absorbed_without_stop_on_error() {
    let h = Harness::new();
    h.memory_source("a", records(3, "a"));
    h.destination("d");
    h.transformation(
        NewTransformation::new(
            "broken",
            1,
            TransformationConfig::Custom {
                function: "explode".into(),
                args: json!(null),
            },
        )
        .with_id("bad"),
    );
    h.transformation(
        NewTransformation::new(
            "tag",
            2,
            TransformationConfig::Map {
                operations: vec![MapOperation::Set {
                    field: "tagged".into(),
                    value: json!(true),
                }],
            },
        )
        .with_id("good"),
    );
    h.executor
        .custom_functions()
        .register("explode", |_, _| Err("kaboom".to_string()));
    h.job(
        NewJob::new("lenient")
            .with_id("j")
            .source("a")
            .transformation("bad")
            .transformation("good")
            .destination("d")
            .settings(JobSettings {
                stop_on_error: false,
                ..Default::default()
            }),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_error, 1);
    let loaded = h.sink.loaded("d");
    assert_eq!(loaded.len(), 3);
    assert!(loaded.iter().all(|r| r["tagged"] == json!(true)));
}

#[tokio::test]
async fn join_against_a_data_source_enriches_records() {
    let h = Harness::new();
    h.memory_source(
        "orders",
        vec![
            json!({"orderId": 1, "customerId": "c1"}).as_object().cloned().expect("obj"),
            json!({"orderId": 2, "customerId": "c9"}).as_object().cloned().expect("obj"),
        ],
    );
    h.memory_source(
        "customers",
        vec![json!({"id": "c1", "name": "Ada"}).as_object().cloned().expect("obj")],
    );
    h.destination("d");
    h.transformation(
        NewTransformation::new(
            "customers",
            1,
            TransformationConfig::Join {
                reference: JoinReference::DataSource {
                    id: "customers".into(),
                },
                left_key: "customerId".into(),
                right_key: "id".into(),
                prefix: Some("customer_".into()),
            },
        )
        .with_id("join"),
    );
    h.job(
        NewJob::new("enrich")
            .with_id("j")
            .source("orders")
            .transformation("join")
            .destination("d"),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    let loaded = h.sink.loaded("d");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0]["customer_name"], json!("Ada"));
    assert!(!loaded[1].contains_key("customer_name"));
}

#[tokio::test]
async fn validation_drops_empty_records() {
    let h = Harness::new();
    let mut input = records(2, "a");
    input.push(serde_json::Map::new());
    input.push(json!({"x": null}).as_object().cloned().expect("obj"));
    h.memory_source("a", input);
    h.destination("d");
    h.job(
        NewJob::new("validated")
            .with_id("j")
            .source("a")
            .destination("d")
            .settings(JobSettings {
                validate_data: true,
                ..Default::default()
            }),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.metrics.records_processed, 4);
    assert_eq!(result.metrics.records_skipped, 2);
    assert_eq!(result.metrics.records_success, 2);
    assert_eq!(h.sink.loaded("d").len(), 2);
}

#[tokio::test]
async fn flaky_extraction_is_retried() {
    let flaky = Arc::new(FlakyAdapter::new(2, records(4, "api")));
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        flaky.clone() as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("api", api_config("https://example.com/orders"));
    h.job(
        NewJob::new("retrying")
            .with_id("j")
            .source("api")
            .settings(JobSettings {
                max_retries: 2,
                ..Default::default()
            }),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_processed, 4);
    assert_eq!(flaky.calls(), 3);

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Warning, "retrying (1/2)"));
    assert!(has_log(&run, LogLevel::Warning, "retrying (2/2)"));
}

#[tokio::test]
async fn extraction_failure_without_retries_errors_the_run() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(FlakyAdapter::broken()) as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("api", api_config("https://example.com/orders"));
    h.job(NewJob::new("fragile").with_id("j").source("api"));

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error.as_deref(), Some("extract refused (attempt 1)"));
}

fn lenient() -> JobSettings {
    JobSettings {
        stop_on_error: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn failing_source_is_skipped_without_stop_on_error() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(FlakyAdapter::broken()) as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("api", api_config("https://example.com/orders"));
    h.memory_source("good", records(10, "good"));
    h.destination("d");
    h.job(
        NewJob::new("partial")
            .with_id("j")
            .source("api")
            .source("good")
            .destination("d")
            .settings(lenient()),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_processed, 10);
    assert_eq!(result.metrics.records_error, 1);
    assert_eq!(h.sink.loaded("d").len(), 10);

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(
        &run,
        LogLevel::Error,
        "Extraction from 'api source' failed: extract refused"
    ));
    assert!(has_log(&run, LogLevel::Warning, "Skipping source 'api source'"));
}

#[tokio::test]
async fn failing_destination_is_skipped_without_stop_on_error() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(FlakyAdapter::broken()) as Arc<dyn SourceAdapter>,
    )]));
    h.memory_source("a", records(10, "a"));
    h.source_with("bad", api_config("https://example.com/ingest"));
    h.destination("d");
    h.job(
        NewJob::new("fan out")
            .with_id("j")
            .source("a")
            .destination("bad")
            .destination("d")
            .settings(lenient()),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_error, 1);
    assert_eq!(h.sink.loaded("d").len(), 10);
    assert!(h.catalog.get_data_source("bad").expect("bad").last_sync_date.is_none());

    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Error, "Load into 'bad source' failed"));
}

#[tokio::test]
async fn failing_destination_errors_the_run_by_default() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(FlakyAdapter::broken()) as Arc<dyn SourceAdapter>,
    )]));
    h.memory_source("a", records(3, "a"));
    h.source_with("bad", api_config("https://example.com/ingest"));
    h.destination("d");
    h.job(
        NewJob::new("strict")
            .with_id("j")
            .source("a")
            .destination("bad")
            .destination("d"),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error.as_deref(), Some("load refused (attempt 1)"));
    assert!(h.sink.loaded("d").is_empty());
}

#[tokio::test]
async fn unreachable_source_fails_before_extraction() {
    let adapter = Arc::new(FlakyAdapter::unreachable(records(5, "api")));
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        adapter.clone() as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("api", api_config("https://example.com/orders"));
    h.memory_source("good", records(2, "good"));
    h.job(NewJob::new("strict").with_id("strict").source("api"));
    h.job(
        NewJob::new("lenient")
            .with_id("lenient")
            .source("api")
            .source("good")
            .settings(lenient()),
    );

    let result = h.executor.execute_job("strict").await.expect("strict");
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error.as_deref(), Some("probe refused (attempt 1)"));
    assert_eq!(adapter.probes(), 1);
    assert_eq!(adapter.calls(), 0);
    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(
        &run,
        LogLevel::Error,
        "Extraction from 'api source' failed: probe refused"
    ));

    let result = h.executor.execute_job("lenient").await.expect("lenient");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.metrics.records_processed, 2);
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn waiting_for_a_busy_source_does_not_use_the_deadline() {
    let h = Harness::new();
    h.memory_source("a", records(3, "a"));
    h.job(
        NewJob::new("patient")
            .with_id("j")
            .source("a")
            .settings(JobSettings {
                timeout_ms: 100,
                ..Default::default()
            }),
    );

    let held = h.executor.locks().acquire(["a"]).await;
    let executor = h.executor.clone();
    let handle = tokio::spawn(async move { executor.execute_job("j").await });
    tokio::time::sleep(Duration::from_millis(250)).await;
    drop(held);

    let result = handle.await.expect("join").expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    let run = h.executor.get_run(&result.job_run_id).expect("run");
    assert!(has_log(&run, LogLevel::Info, "Waiting for data source lock(s): a"));
    assert!(has_log(&run, LogLevel::Info, "Data source locks acquired"));
}

#[tokio::test]
async fn writes_are_chunked_by_batch_size() {
    let counter = Arc::new(FlakyAdapter::new(0, Vec::new()));
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        counter.clone() as Arc<dyn SourceAdapter>,
    )]));
    h.memory_source("a", records(10, "a"));
    h.source_with("sink", api_config("https://example.com/ingest"));
    h.job(
        NewJob::new("chunked")
            .with_id("j")
            .source("a")
            .destination("sink")
            .settings(JobSettings {
                batch_size: 4,
                ..Default::default()
            }),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(counter.calls(), 3);
}

#[tokio::test]
async fn slow_runs_are_aborted_at_the_deadline() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(SlowAdapter {
            delay: Duration::from_secs(5),
        }) as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("slow", api_config("https://example.com/slow"));
    h.job(
        NewJob::new("deadline")
            .with_id("j")
            .source("slow")
            .settings(JobSettings {
                timeout_ms: 50,
                ..Default::default()
            }),
    );

    let result = h.executor.execute_job("j").await.expect("execute");
    assert_eq!(result.status, RunStatus::Aborted);
    assert_eq!(result.error.as_deref(), Some("Execution timed out after 50ms"));
    assert_eq!(h.alerts.by_category("job").len(), 1);
}

#[tokio::test]
async fn running_jobs_can_be_cancelled() {
    let h = Harness::with_adapters(HashMap::from([(
        DataSourceType::Api,
        Arc::new(SlowAdapter {
            delay: Duration::from_secs(5),
        }) as Arc<dyn SourceAdapter>,
    )]));
    h.source_with("slow", api_config("https://example.com/slow"));
    h.job(NewJob::new("cancellable").with_id("j").source("slow"));

    let executor = h.executor.clone();
    let handle = tokio::spawn(async move { executor.execute_job("j").await });

    let mut run_id = None;
    for _ in 0..200 {
        if let Some(run) = h.executor.list_runs().first() {
            run_id = Some(run.id.clone());
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let run_id = run_id.expect("run started");
    assert!(h.executor.cancel_run(&run_id));

    let result = handle.await.expect("join").expect("execute");
    assert_eq!(result.status, RunStatus::Aborted);
    assert!(!h.executor.cancel_run(&run_id));

    let run = h.executor.get_run(&run_id).expect("run");
    assert!(run.end_time.is_some());
    assert!(has_log(&run, LogLevel::Error, "Execution cancelled"));
}

#[tokio::test]
async fn success_alert_is_opt_in() {
    let h = Harness::new();
    h.memory_source("a", records(1, "a"));
    h.job(NewJob::new("quiet").with_id("quiet").source("a"));
    h.job(
        NewJob::new("loud")
            .with_id("loud")
            .source("a")
            .settings(JobSettings {
                alert_on_success: true,
                ..Default::default()
            }),
    );

    h.executor.execute_job("quiet").await.expect("quiet");
    assert!(h.alerts.by_category("job").is_empty());

    h.executor.execute_job("loud").await.expect("loud");
    let alerts = h.alerts.by_category("job");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Success);
}

#[tokio::test]
async fn runs_are_listed_per_job() {
    let h = Harness::new();
    h.memory_source("a", records(1, "a"));
    h.job(NewJob::new("one").with_id("one").source("a"));
    h.job(NewJob::new("two").with_id("two").source("a"));

    h.executor.execute_job("one").await.expect("one");
    h.executor.execute_job("one").await.expect("one again");
    h.executor.execute_job("two").await.expect("two");

    assert_eq!(h.executor.runs_for_job("one").len(), 2);
    assert_eq!(h.executor.list_runs().len(), 3);
    assert_matches!(
        h.executor.get_run("missing"),
        Err(ExecutorError::RunNotFound { .. })
    );
}
