use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use catalog::{CatalogEntity, Getter, NewJob, Register};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub job_ids: Vec<String>,
}

pub async fn create(
    state: web::Data<AppState>,
    body: web::Json<NewJob>,
) -> Result<HttpResponse, ApiError> {
    let job = state.catalog.create_job(body.into_inner())?;
    Ok(HttpResponse::Created().json(job))
}

pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.catalog.list_jobs())
}

pub async fn get(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.catalog.get_job(&id)?))
}

pub async fn enable(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.catalog.enable(CatalogEntity::Job, &id);
    Ok(HttpResponse::Ok().json(state.catalog.get_job(&id)?))
}

pub async fn disable(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.catalog.disable(CatalogEntity::Job, &id);
    Ok(HttpResponse::Ok().json(state.catalog.get_job(&id)?))
}

pub async fn delete(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    state.catalog.delete(CatalogEntity::Job, &id);
    HttpResponse::NoContent().finish()
}

pub async fn execute(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = state.executor.execute_job(&id).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn batch_execute(
    state: web::Data<AppState>,
    body: web::Json<BatchRequest>,
) -> HttpResponse {
    let summary = state.batch.execute_batch_jobs(body.job_ids.as_slice()).await;
    HttpResponse::Ok().json(summary)
}

pub async fn runs(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    HttpResponse::Ok().json(state.executor.runs_for_job(&id))
}

pub async fn get_run(
    state: web::Data<AppState>,
    run_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.executor.get_run(&run_id)?))
}

pub async fn cancel_run(
    state: web::Data<AppState>,
    run_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    // unknown runs are a 404, finished ones just report `false`
    state.executor.get_run(&run_id)?;
    let cancelled = state.executor.cancel_run(&run_id);
    Ok(HttpResponse::Ok().json(json!({ "cancelled": cancelled })))
}
