use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use dronedispatch_delivery::{ItemId, OrderId};
use dronedispatch_fleet::UnitId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_open_orders))
        .route("/queue", get(list_queue))
        .route("/:id", get(get_order))
        .route("/:id/assign", post(assign_order))
        .route("/:id/confirm", post(confirm_order))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::PlaceOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id: ItemId = match errors::parse_id(&body.item_id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let address = body.address;

    match services.call(move |engine| engine.ledger().place(item_id, &address)).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(order))).into_response(),
        Err(resp) => resp,
    }
}

/// Orders not yet delivered.
pub async fn list_open_orders(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.call(|engine| engine.ledger().non_finished()).await {
        Ok(orders) => Json(orders.into_iter().map(dto::order_to_json).collect::<Vec<_>>()).into_response(),
        Err(resp) => resp,
    }
}

/// Orders waiting for a unit.
pub async fn list_queue(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.call(|engine| engine.ledger().pending_unassigned()).await {
        Ok(orders) => Json(orders.into_iter().map(dto::order_to_json).collect::<Vec<_>>()).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.call(move |engine| engine.ledger().get(order_id)).await {
        Ok(order) => Json(dto::order_to_json(order)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn assign_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body: dto::AssignOrderRequest = match errors::optional_json_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let unit_id: Option<UnitId> = match body.unit_id.as_deref() {
        Some(raw) => match errors::parse_id(raw, "unit") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        },
        None => None,
    };

    let result = services
        .call(move |engine| match unit_id {
            Some(unit_id) => engine.assignment().assign_to(order_id, unit_id),
            None => engine.assignment().assign(order_id),
        })
        .await;

    match result {
        Ok(order) => Json(dto::order_to_json(order)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.call(move |engine| engine.confirmation().confirm(order_id)).await {
        Ok(order) => Json(dto::order_to_json(order)).into_response(),
        Err(resp) => resp,
    }
}
