use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use catalog::{CatalogEntity, Getter, NewTransformation, Register};

pub async fn create(
    state: web::Data<AppState>,
    body: web::Json<NewTransformation>,
) -> Result<HttpResponse, ApiError> {
    let transformation = state.catalog.create_transformation(body.into_inner())?;
    Ok(HttpResponse::Created().json(transformation))
}

pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.catalog.list_transformations())
}

pub async fn get(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.catalog.get_transformation(&id)?))
}

pub async fn enable(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.catalog.enable(CatalogEntity::Transformation, &id);
    Ok(HttpResponse::Ok().json(state.catalog.get_transformation(&id)?))
}

pub async fn disable(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.catalog.disable(CatalogEntity::Transformation, &id);
    Ok(HttpResponse::Ok().json(state.catalog.get_transformation(&id)?))
}

pub async fn delete(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    state.catalog.delete(CatalogEntity::Transformation, &id);
    HttpResponse::NoContent().finish()
}
