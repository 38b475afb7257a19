pub mod company;
pub mod customers;
pub mod products;
pub mod public;
pub mod quotes;
pub mod team;

use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
