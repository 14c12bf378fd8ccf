//! REST routes.
//!
//! - `/api/jobs` CRUD, `/api/jobs/{id}/execute`, `/api/jobs/batch-execute`,
//!   run lookup and cancellation under `/api/jobs/runs/{runId}`
//! - `/api/data-sources` CRUD plus connection and extraction tests
//! - `/api/transformations` CRUD
//! - `/api/system/status`, `/api/alerts`
//! - `/healthz`

mod alerts;
mod data_sources;
mod jobs;
mod system;
mod transformations;

use crate::error::ApiError;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // malformed bodies get the same `{ "error": .. }` shape as everything else
    let json = web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into());

    cfg.service(
        web::scope("/api")
            .app_data(json)
            // fixed paths before `{id}` ones
            .route("/jobs/batch-execute", web::post().to(jobs::batch_execute))
            .route("/jobs/runs/{run_id}", web::get().to(jobs::get_run))
            .route("/jobs/runs/{run_id}/cancel", web::post().to(jobs::cancel_run))
            .route("/jobs", web::post().to(jobs::create))
            .route("/jobs", web::get().to(jobs::list))
            .route("/jobs/{id}", web::get().to(jobs::get))
            .route("/jobs/{id}", web::delete().to(jobs::delete))
            .route("/jobs/{id}/enable", web::patch().to(jobs::enable))
            .route("/jobs/{id}/disable", web::patch().to(jobs::disable))
            .route("/jobs/{id}/execute", web::post().to(jobs::execute))
            .route("/jobs/{id}/runs", web::get().to(jobs::runs))
            .route(
                "/data-sources/test-connections",
                web::post().to(data_sources::batch_test),
            )
            .route("/data-sources", web::post().to(data_sources::create))
            .route("/data-sources", web::get().to(data_sources::list))
            .route("/data-sources/{id}", web::get().to(data_sources::get))
            .route("/data-sources/{id}", web::delete().to(data_sources::delete))
            .route("/data-sources/{id}/enable", web::patch().to(data_sources::enable))
            .route("/data-sources/{id}/disable", web::patch().to(data_sources::disable))
            .route(
                "/data-sources/{id}/test-connection",
                web::post().to(data_sources::test_connection),
            )
            .route(
                "/data-sources/{id}/test-extraction",
                web::post().to(data_sources::test_extraction),
            )
            .route("/transformations", web::post().to(transformations::create))
            .route("/transformations", web::get().to(transformations::list))
            .route("/transformations/{id}", web::get().to(transformations::get))
            .route("/transformations/{id}", web::delete().to(transformations::delete))
            .route("/transformations/{id}/enable", web::patch().to(transformations::enable))
            .route("/transformations/{id}/disable", web::patch().to(transformations::disable))
            .route("/system/status", web::get().to(system::status))
            .route("/alerts", web::get().to(alerts::list))
            .route("/alerts/acknowledge-all", web::post().to(alerts::acknowledge_all))
            .route("/alerts/{id}/acknowledge", web::post().to(alerts::acknowledge)),
    )
    .route("/healthz", web::get().to(system::healthz));
}
