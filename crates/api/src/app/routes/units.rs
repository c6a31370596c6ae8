use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use dronedispatch_fleet::{UnitId, UnitStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(provision_unit).get(list_units))
        .route("/:id", get(get_unit))
        .route("/:id/activate", post(activate_unit))
        .route("/:id/deactivate", post(deactivate_unit))
        .route("/:id/retire", post(retire_unit))
}

pub async fn provision_unit(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.call(|engine| engine.registry().provision()).await {
        Ok(unit) => (StatusCode::CREATED, Json(dto::unit_to_json(unit))).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_units(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.call(|engine| engine.registry().list()).await {
        Ok(units) => Json(units.into_iter().map(dto::unit_to_json).collect::<Vec<_>>()).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let unit_id: UnitId = match errors::parse_id(&id, "unit") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.call(move |engine| engine.registry().get(unit_id)).await {
        Ok(unit) => Json(dto::unit_to_json(unit)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn activate_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_status(services, &id, UnitStatus::Active).await
}

pub async fn deactivate_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_status(services, &id, UnitStatus::Inactive).await
}

pub async fn retire_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_status(services, &id, UnitStatus::Retired).await
}

async fn change_status(
    services: Arc<AppServices>,
    raw_id: &str,
    status: UnitStatus,
) -> axum::response::Response {
    let unit_id: UnitId = match errors::parse_id(raw_id, "unit") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .call(move |engine| match status {
            UnitStatus::Active => engine.registry().activate(unit_id),
            UnitStatus::Inactive => engine.registry().deactivate(unit_id),
            UnitStatus::Retired => engine.registry().retire(unit_id),
        })
        .await;

    match result {
        Ok(unit) => Json(dto::unit_to_json(unit)).into_response(),
        Err(resp) => resp,
    }
}
