use axum::{routing::get, Router};

pub mod catalog;
pub mod orders;
pub mod system;
pub mod units;

/// Router for every dispatch endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/depots", get(catalog::list_depots))
        .route("/items", get(catalog::list_items))
        .nest("/units", units::router())
        .nest("/orders", orders::router())
}
