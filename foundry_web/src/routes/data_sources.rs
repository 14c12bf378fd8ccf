use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use catalog::{CatalogEntity, Getter, NewDataSource, Register};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTestRequest {
    /// every registered source when omitted
    #[serde(default)]
    pub data_source_ids: Option<Vec<String>>,
}

pub async fn create(
    state: web::Data<AppState>,
    body: web::Json<NewDataSource>,
) -> Result<HttpResponse, ApiError> {
    let source = state.catalog.create_data_source(body.into_inner())?;
    Ok(HttpResponse::Created().json(source))
}

pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.catalog.list_data_sources())
}

pub async fn get(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.catalog.get_data_source(&id)?))
}

pub async fn enable(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.catalog.enable(CatalogEntity::DataSource, &id);
    Ok(HttpResponse::Ok().json(state.catalog.get_data_source(&id)?))
}

pub async fn disable(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.catalog.disable(CatalogEntity::DataSource, &id);
    Ok(HttpResponse::Ok().json(state.catalog.get_data_source(&id)?))
}

pub async fn delete(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    state.catalog.delete(CatalogEntity::DataSource, &id);
    HttpResponse::NoContent().finish()
}

pub async fn test_connection(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let source = state.catalog.get_data_source(&id)?;
    Ok(HttpResponse::Ok().json(state.tester.test_connection(&source).await))
}

pub async fn test_extraction(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let source = state.catalog.get_data_source(&id)?;
    Ok(HttpResponse::Ok().json(state.tester.test_extraction(&source).await))
}

pub async fn batch_test(
    state: web::Data<AppState>,
    body: Option<web::Json<BatchTestRequest>>,
) -> Result<HttpResponse, ApiError> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let sources = match request.data_source_ids {
        Some(ids) => ids
            .iter()
            .map(|id| state.catalog.get_data_source(id))
            .collect::<Result<Vec<_>, _>>()?,
        None => state.catalog.list_data_sources(),
    };
    Ok(HttpResponse::Ok().json(state.tester.batch_test_connections(&sources).await))
}
