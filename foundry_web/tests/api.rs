use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::config::OrchestratorConfig;
use foundry_web::{configure_routes, AppState};
use serde_json::{json, Value};
use shared_clients::AdapterRegistry;
use test_utils::records;

fn state() -> AppState {
    AppState::in_memory(&OrchestratorConfig::default(), AdapterRegistry::with_defaults())
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

fn memory_source(id: &str, n: usize) -> Value {
    json!({
        "id": id,
        "name": format!("{id} source"),
        "config": { "type": "memory", "records": records(n, id) },
    })
}

#[actix_web::test]
async fn healthz_is_ok() {
    let state = state();
    let app = app!(state);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/healthz").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn register_and_execute_a_job() {
    let state = state();
    let app = app!(state);

    for body in [memory_source("orders", 3), memory_source("warehouse", 0)] {
        let req = test::TestRequest::post()
            .uri("/api/data-sources")
            .set_json(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::post()
        .uri("/api/jobs")
        .set_json(json!({
            "id": "nightly",
            "name": "nightly copy",
            "source": "orders",
            "destination": "warehouse",
        }))
        .to_request();
    let job: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(job["sources"], json!(["orders"]));

    let req = test::TestRequest::post()
        .uri("/api/jobs/nightly/execute")
        .to_request();
    let result: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["status"], json!("SUCCESS"));
    assert_eq!(result["metrics"]["recordsProcessed"], json!(3));

    let run_id = result["jobRunId"].as_str().expect("run id").to_string();
    let req = test::TestRequest::get()
        .uri(&format!("/api/jobs/runs/{run_id}"))
        .to_request();
    let run: Value = test::call_and_read_body_json(&app, req).await;
    assert!(!run["logs"].as_array().expect("logs").is_empty());

    let req = test::TestRequest::get()
        .uri("/api/system/status")
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["status"], json!("HEALTHY"));
    assert_eq!(status["runs"]["succeeded"], json!(1));
}

#[actix_web::test]
async fn errors_map_to_status_codes() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/jobs/ghost").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("job 'ghost' not found"));

    let source = memory_source("dup", 1);
    let req = test::TestRequest::post()
        .uri("/api/data-sources")
        .set_json(&source)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    let req = test::TestRequest::post()
        .uri("/api/data-sources")
        .set_json(&source)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/jobs")
        .set_json(json!({ "id": "empty", "name": "no sources" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    let req = test::TestRequest::post()
        .uri("/api/jobs/empty/execute")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/jobs")
        .set_json(json!({ "sources": ["dup"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn batch_execute_reports_each_job() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/data-sources")
        .set_json(memory_source("a", 2))
        .to_request();
    test::call_service(&app, req).await;
    let req = test::TestRequest::post()
        .uri("/api/jobs")
        .set_json(json!({ "id": "j1", "name": "j1", "source": "a" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/jobs/batch-execute")
        .set_json(json!({ "jobIds": ["j1", "missing"] }))
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary["totalJobs"], json!(2));
    assert_eq!(summary["successCount"], json!(1));
    assert_eq!(summary["failureCount"], json!(1));
    assert_eq!(summary["results"][1]["jobId"], json!("missing"));
}

#[actix_web::test]
async fn connection_tests_and_toggles() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/data-sources")
        .set_json(json!({
            "id": "feed",
            "name": "feed",
            "config": { "type": "file", "path": "/definitely/not/here.json" },
        }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/data-sources/feed/test-connection")
        .to_request();
    let result: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result["success"], json!(false));
    assert!(result["details"]["error"].is_string());

    let req = test::TestRequest::patch()
        .uri("/api/data-sources/feed/disable")
        .to_request();
    let source: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(source["status"], json!("inactive"));

    let req = test::TestRequest::patch()
        .uri("/api/data-sources/ghost/enable")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri("/api/data-sources/feed")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn alerts_can_be_acknowledged() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/data-sources")
        .set_json(memory_source("a", 1))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/api/alerts?unacknowledged=true")
        .to_request();
    let alerts: Value = test::call_and_read_body_json(&app, req).await;
    let id = alerts[0]["id"].as_str().expect("alert id").to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/alerts/{id}/acknowledge"))
        .to_request();
    let acked: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(acked["acknowledged"], json!(true));

    let req = test::TestRequest::post()
        .uri("/api/alerts/nope/acknowledge")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
