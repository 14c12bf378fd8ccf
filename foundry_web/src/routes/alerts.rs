use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQuery {
    #[serde(default)]
    pub unacknowledged: bool,
    #[serde(default)]
    pub category: Option<String>,
}

/// Newest first.
pub async fn list(state: web::Data<AppState>, query: web::Query<AlertQuery>) -> HttpResponse {
    let mut alerts = match &query.category {
        Some(category) => state.alerts.by_category(category),
        None => state.alerts.list(),
    };
    if query.unacknowledged {
        alerts.retain(|a| !a.acknowledged);
    }
    HttpResponse::Ok().json(alerts)
}

pub async fn acknowledge(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.alerts.acknowledge(&id)?))
}

pub async fn acknowledge_all(state: web::Data<AppState>) -> HttpResponse {
    let acknowledged = state.alerts.acknowledge_all();
    HttpResponse::Ok().json(json!({ "acknowledged": acknowledged }))
}
