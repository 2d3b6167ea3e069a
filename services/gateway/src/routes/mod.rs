use axum::Json;
use serde_json::{Value, json};

pub mod chat;
pub mod tts;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
