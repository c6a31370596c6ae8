use serde::Deserialize;

use dronedispatch_delivery::{Item, Order};
use dronedispatch_fleet::{Depot, Unit};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub item_id: String,
    pub address: String,
}

/// Body of `POST /orders/:id/assign`. Without `unit_id` a random ACTIVE unit is picked.
#[derive(Debug, Default, Deserialize)]
pub struct AssignOrderRequest {
    pub unit_id: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn depot_to_json(depot: Depot) -> serde_json::Value {
    let location = depot.location();
    serde_json::json!({
        "id": depot.id_typed().to_string(),
        "latitude": location.latitude(),
        "longitude": location.longitude(),
    })
}

pub fn unit_to_json(unit: Unit) -> serde_json::Value {
    serde_json::json!({
        "id": unit.id_typed().to_string(),
        "serial": unit.serial().to_string(),
        "status": unit.status().as_str(),
        "depot_id": unit.depot_id().to_string(),
    })
}

pub fn item_to_json(item: Item) -> serde_json::Value {
    serde_json::json!({
        "id": item.id_typed().to_string(),
        "title": item.title(),
        "price": item.price(),
    })
}

pub fn order_to_json(order: Order) -> serde_json::Value {
    serde_json::json!({
        "id": order.id_typed().to_string(),
        "item_id": order.item_id().to_string(),
        "address": order.address(),
        "status": order.status(),
        "placed_at": order.placed_at().to_rfc3339(),
        "due_at": order.due_at().to_rfc3339(),
        "delivered_at": order.delivered_at().map(|t| t.to_rfc3339()),
        "unit_id": order.unit_id().map(|u| u.to_string()),
    })
}
