use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::dto;
use crate::app::services::AppServices;

pub async fn list_depots(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.call(|engine| engine.depots()).await {
        Ok(depots) => Json(depots.into_iter().map(dto::depot_to_json).collect::<Vec<_>>()).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_items(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.call(|engine| engine.ledger().items()).await {
        Ok(items) => Json(items.into_iter().map(dto::item_to_json).collect::<Vec<_>>()).into_response(),
        Err(resp) => resp,
    }
}
